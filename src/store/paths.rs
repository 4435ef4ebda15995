// Data file path utilities.
// Constructs platform-appropriate paths for the save file and lookup cache.

use std::path::PathBuf;

use chrono::Local;
use directories::ProjectDirs;

/// Base data directory for the app's files.
pub fn data_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "pillarbox").map(|dirs| dirs.data_dir().to_path_buf())
}

/// Path to the postbox save file.
pub fn save_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join("save.json"))
}

/// Path to the nearby-lookup cache file.
pub fn nearby_cache_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join("nearby_postboxes_cache.json"))
}

/// Timestamped filename for an exported save snapshot.
pub fn export_filename() -> String {
    format!(
        "postboxes_{}.json",
        Local::now().format("%Y-%m-%d_%H:%M:%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_paths_sit_in_data_dir() {
        let save = save_path().unwrap();
        assert!(save.ends_with("save.json"));
        let cache = nearby_cache_path().unwrap();
        assert!(cache.ends_with("nearby_postboxes_cache.json"));
        assert_eq!(save.parent(), cache.parent());
    }

    #[test]
    fn test_export_filename_shape() {
        let name = export_filename();
        assert!(name.starts_with("postboxes_"));
        assert!(name.ends_with(".json"));
    }
}
