// Postbox save store.
// Owns the registered-postbox collection: versioned on-disk persistence,
// schema migration, import/export, and write-through mutation.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PillarboxError, Result};
use crate::model::Postbox;

/// Current save-file schema version.
pub const SAVE_VERSION: u32 = 2;

/// Legacy schema: postboxes as a plain array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveDataV1 {
    pub version: u32,
    pub postboxes: Vec<Postbox>,
}

/// Current schema: postboxes keyed by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveDataV2 {
    pub version: u32,
    pub postboxes: BTreeMap<String, Postbox>,
}

impl SaveDataV2 {
    fn empty() -> Self {
        Self {
            version: SAVE_VERSION,
            postboxes: BTreeMap::new(),
        }
    }
}

/// Migrate a v1 dataset to the map form. Duplicate ids collapse to the last
/// record in array order.
fn v1_to_v2(v1: SaveDataV1) -> SaveDataV2 {
    let mut postboxes = BTreeMap::new();
    for pb in v1.postboxes {
        postboxes.insert(pb.id.clone(), pb);
    }
    SaveDataV2 {
        version: SAVE_VERSION,
        postboxes,
    }
}

// Version probe: the postboxes payload shape depends on the version field,
// so it stays opaque until the version is known.
#[derive(Deserialize)]
struct RawSave {
    version: u32,
    postboxes: serde_json::Value,
}

/// Decode save-file contents under any known schema version, migrating to
/// the current form. Unrecognized payloads fail with
/// [`PillarboxError::CorruptSaveData`].
pub fn decode(contents: &str) -> Result<SaveDataV2> {
    let raw: RawSave =
        serde_json::from_str(contents).map_err(|_| PillarboxError::CorruptSaveData)?;

    match raw.version {
        1 => {
            let postboxes: Vec<Postbox> = serde_json::from_value(raw.postboxes)
                .map_err(|_| PillarboxError::CorruptSaveData)?;
            Ok(v1_to_v2(SaveDataV1 {
                version: 1,
                postboxes,
            }))
        }
        version if version >= SAVE_VERSION => {
            // absent optional fields are default-filled by serde
            let postboxes: BTreeMap<String, Postbox> = serde_json::from_value(raw.postboxes)
                .map_err(|_| PillarboxError::CorruptSaveData)?;
            Ok(SaveDataV2 { version, postboxes })
        }
        _ => Err(PillarboxError::CorruptSaveData),
    }
}

/// Durable store of the user's registered postboxes.
///
/// The in-memory dataset is the single source of truth for the process
/// lifetime; the file is a mirror rewritten synchronously after every
/// mutation.
#[derive(Debug)]
pub struct SaveStore {
    path: PathBuf,
    data: SaveDataV2,
}

impl SaveStore {
    /// Open the store at `path`. A missing file starts an empty dataset; a
    /// file that fails to decode under any known schema also starts empty
    /// rather than refusing to start.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match fs::read_to_string(&path) {
            Ok(contents) => match decode(&contents) {
                Ok(data) => data,
                Err(_) => {
                    warn!("save file {} is corrupt, starting empty", path.display());
                    SaveDataV2::empty()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => SaveDataV2::empty(),
            Err(e) => {
                warn!("failed to read save file {}: {e}", path.display());
                SaveDataV2::empty()
            }
        };
        Self { path, data }
    }

    /// All registered postboxes, keyed by id. Canonical mutation goes
    /// through [`add`](Self::add) / [`remove`](Self::remove).
    pub fn postboxes(&self) -> &BTreeMap<String, Postbox> {
        &self.data.postboxes
    }

    pub fn get(&self, id: &str) -> Option<&Postbox> {
        self.data.postboxes.get(id)
    }

    /// Upsert a postbox by id and write through to disk.
    pub fn add(&mut self, postbox: Postbox) -> Result<()> {
        self.data.postboxes.insert(postbox.id.clone(), postbox);
        self.save()
    }

    /// Remove a postbox by id. Writes to disk only if something was actually
    /// removed; removing an absent record is a no-op.
    pub fn remove(&mut self, postbox: &Postbox) -> Result<bool> {
        if self.data.postboxes.remove(&postbox.id).is_some() {
            self.save()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Serialize the current dataset for export. Pure; no mutation.
    pub fn export_snapshot(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.data)?)
    }

    /// Decode `contents` and replace the whole dataset with it, then
    /// persist. All-or-nothing: a decode failure leaves the existing data
    /// untouched. Returns the number of postboxes imported.
    pub fn import_and_replace(&mut self, contents: &str) -> Result<usize> {
        let data = decode(contents)?;
        self.data = data;
        self.save()?;
        info!("imported save data with {} postboxes", self.data.postboxes.len());
        Ok(self.data.postboxes.len())
    }

    // Write atomically via temp file so a crash mid-write never leaves a
    // half-written save.
    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(&self.data)?;

        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Coords, Monarch};
    use tempfile::TempDir;

    fn postbox(id: &str, monarch: Monarch) -> Postbox {
        Postbox {
            id: id.to_string(),
            coords: Coords {
                latitude: 51.5,
                longitude: -0.1,
            },
            monarch,
            date_registered: "2025-03-14T09:26:53.589".to_string(),
            name: "TEST BOX".to_string(),
            box_type: Some("Pillar Box".to_string()),
            verified: true,
            inactive: false,
            paired_id: None,
        }
    }

    #[test]
    fn test_open_missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let store = SaveStore::open(dir.path().join("save.json"));
        assert!(store.postboxes().is_empty());
    }

    #[test]
    fn test_open_corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("save.json");
        fs::write(&path, "{\"version\": \"what\"").unwrap();
        let store = SaveStore::open(&path);
        assert!(store.postboxes().is_empty());
    }

    #[test]
    fn test_add_remove_scenario() {
        let dir = TempDir::new().unwrap();
        let mut store = SaveStore::open(dir.path().join("save.json"));

        let a = postbox("AB1 1", Monarch::Unmarked);
        let b = postbox("AB1 2", Monarch::Elizabeth2);
        store.add(a.clone()).unwrap();
        store.add(b).unwrap();
        assert_eq!(store.postboxes().len(), 2);

        assert!(store.remove(&a).unwrap());
        assert_eq!(store.postboxes().len(), 1);
        assert!(!store.postboxes().contains_key("AB1 1"));
        assert!(store.get("AB1 2").is_some());
    }

    #[test]
    fn test_add_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("save.json");

        let mut store = SaveStore::open(&path);
        store.add(postbox("AB1 1", Monarch::George5)).unwrap();
        drop(store);

        let reopened = SaveStore::open(&path);
        assert_eq!(reopened.get("AB1 1").unwrap().monarch, Monarch::George5);
    }

    #[test]
    fn test_remove_is_idempotent_and_skips_second_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("save.json");
        let mut store = SaveStore::open(&path);

        let a = postbox("AB1 1", Monarch::Unmarked);
        store.add(a.clone()).unwrap();
        assert!(store.remove(&a).unwrap());

        // if the second remove wrote anything the file would reappear
        fs::remove_file(&path).unwrap();
        assert!(!store.remove(&a).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_export_round_trips() {
        let dir = TempDir::new().unwrap();
        let mut store = SaveStore::open(dir.path().join("save.json"));
        store.add(postbox("AB1 1", Monarch::Victoria)).unwrap();
        store.add(postbox("CD2 9", Monarch::Charles3)).unwrap();

        let snapshot = store.export_snapshot().unwrap();
        let decoded = decode(&snapshot).unwrap();
        assert_eq!(&decoded.postboxes, store.postboxes());
    }

    #[test]
    fn test_decode_v1_migrates_last_duplicate_wins() {
        let mut first = postbox("AB1 1", Monarch::Victoria);
        first.name = "FIRST".to_string();
        let mut second = postbox("AB1 1", Monarch::George6);
        second.name = "SECOND".to_string();
        let v1 = SaveDataV1 {
            version: 1,
            postboxes: vec![first, second],
        };

        let decoded = decode(&serde_json::to_string(&v1).unwrap()).unwrap();
        assert_eq!(decoded.version, SAVE_VERSION);
        assert_eq!(decoded.postboxes.len(), 1);
        assert_eq!(decoded.postboxes["AB1 1"].name, "SECOND");
    }

    #[test]
    fn test_decode_v2_fills_defaults_for_old_fields() {
        let json = r#"{
            "version": 2,
            "postboxes": {
                "AB1 1": {
                    "id": "AB1 1",
                    "coords": {"latitude": 51.5, "longitude": -0.1},
                    "monarch": "ELIZABETH2",
                    "dateRegistered": "2023-06-01T09:30:00",
                    "name": "TEST BOX",
                    "type": "Pillar Box"
                }
            }
        }"#;
        let decoded = decode(json).unwrap();
        let pb = &decoded.postboxes["AB1 1"];
        assert!(pb.verified);
        assert!(!pb.inactive);
        assert_eq!(pb.paired_id, None);
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let err = decode(r#"{"version": 0, "postboxes": []}"#).unwrap_err();
        assert!(matches!(err, PillarboxError::CorruptSaveData));
    }

    #[test]
    fn test_decode_rejects_mismatched_payload() {
        // v2 header with a v1 array payload
        let err = decode(r#"{"version": 2, "postboxes": []}"#).unwrap_err();
        assert!(matches!(err, PillarboxError::CorruptSaveData));
    }

    #[test]
    fn test_import_replaces_dataset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("save.json");
        let mut store = SaveStore::open(&path);
        store.add(postbox("OLD 1", Monarch::Unmarked)).unwrap();

        let incoming = SaveDataV2 {
            version: SAVE_VERSION,
            postboxes: BTreeMap::from([(
                "NEW 1".to_string(),
                postbox("NEW 1", Monarch::Edward7),
            )]),
        };
        let count = store
            .import_and_replace(&serde_json::to_string(&incoming).unwrap())
            .unwrap();
        assert_eq!(count, 1);
        assert!(store.get("OLD 1").is_none());

        // replacement reached disk too
        let reopened = SaveStore::open(&path);
        assert!(reopened.get("NEW 1").is_some());
    }

    #[test]
    fn test_import_failure_leaves_data_untouched() {
        let dir = TempDir::new().unwrap();
        let mut store = SaveStore::open(dir.path().join("save.json"));
        store.add(postbox("AB1 1", Monarch::Unmarked)).unwrap();

        let err = store.import_and_replace("not a save file").unwrap_err();
        assert!(matches!(err, PillarboxError::CorruptSaveData));
        assert_eq!(store.postboxes().len(), 1);
        assert!(store.get("AB1 1").is_some());
    }

    #[test]
    fn test_v1_file_migrates_on_open_and_persists_as_v2() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("save.json");
        let v1 = SaveDataV1 {
            version: 1,
            postboxes: vec![postbox("AB1 1", Monarch::Victoria)],
        };
        fs::write(&path, serde_json::to_string(&v1).unwrap()).unwrap();

        let mut store = SaveStore::open(&path);
        assert_eq!(store.postboxes().len(), 1);

        // next write-through lands in the current schema
        store.add(postbox("AB1 2", Monarch::Charles3)).unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["version"], 2);
        assert!(raw["postboxes"].is_object());
    }
}
