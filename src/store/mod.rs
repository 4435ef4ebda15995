// Persistent storage for registered postboxes.
// The versioned save store plus platform path helpers.

pub mod paths;
pub mod save;

pub use save::{SAVE_VERSION, SaveDataV1, SaveDataV2, SaveStore, decode};
