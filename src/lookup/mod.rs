// Nearby-postbox lookup.
// Wire types from the branch-finder service and the client that fetches,
// filters, and double-merges them.

pub mod client;
pub mod types;

pub use client::{DOUBLE_MERGE_RADIUS_M, Geocoder, GeocodedAddress, LookupClient, normalize_results};
pub use types::{LocationDetails, OfficeDetails, RawPostbox};
