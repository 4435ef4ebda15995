// Pillarbox: the local data layer for a UK postbox spotting app.
//
// Owns the persistent postbox save store (versioned save file with schema
// migration) and the nearby-lookup cache (postcode-keyed, TTL-based,
// double-postbox-merging), plus the client for the external branch-finder
// service. UI, maps, and location plumbing live elsewhere and talk to this
// crate through `SaveStore`, `LookupClient`, and `NearbyCache`.

pub mod cache;
pub mod error;
pub mod geo;
pub mod lookup;
pub mod model;
pub mod store;

pub use cache::{CACHE_TTL, NearbyCache};
pub use error::{PillarboxError, Result};
pub use geo::Position;
pub use lookup::{Geocoder, GeocodedAddress, LookupClient, RawPostbox};
pub use model::{Monarch, Postbox};
pub use store::SaveStore;
