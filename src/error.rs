// Error types for the pillarbox data layer.
// Covers save-file decoding, geocoding gates, lookup transport, and I/O.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PillarboxError {
    /// Save file present but unparsable under any known schema version.
    /// Recovered to an empty dataset on load; rejected outright on import.
    #[error("save data does not match any known schema version")]
    CorruptSaveData,

    /// Reverse geocoding returned nothing usable for the position.
    #[error("could not resolve a postcode for the given position")]
    PostcodeUnresolved,

    /// The resolved address is outside Royal Mail's coverage area.
    #[error("position resolves outside UK postbox coverage ({0})")]
    PostcodeOutOfCoverage(String),

    /// The branch-finder service call failed or returned non-success.
    #[error("postbox lookup unavailable: {0}")]
    LookupUnavailable(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PillarboxError>;
