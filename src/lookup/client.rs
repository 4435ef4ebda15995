// Branch-finder HTTP client.
// Resolves a position to a postcode, fetches nearby postboxes (or serves
// them from the cache), and normalizes the raw results.

use std::sync::Arc;

use reqwest::{
    Client,
    header::{ACCEPT, HeaderMap, HeaderValue, REFERER, USER_AGENT},
};
use tracing::warn;

use crate::cache::NearbyCache;
use crate::error::{PillarboxError, Result};
use crate::geo::{Position, distance_between_m};

use super::types::RawPostbox;

const BRANCH_FINDER_BASE: &str = "https://www.royalmail.com";
const BRANCH_FINDER_PATH: &str = "/capi/rml/bf/v1/locations/branchFinder";

// Setting the searchRadius at 40 yields more postboxes than smaller values,
// even ones well inside that radius.
const SEARCH_RADIUS: u32 = 40;
const RESULT_COUNT: u32 = 10;

/// Two double-half candidates closer than this are the same physical unit.
/// Tuned against observed service behaviour, not from first principles.
pub const DOUBLE_MERGE_RADIUS_M: f64 = 100.0;

/// What reverse geocoding reports for a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocodedAddress {
    pub postcode: Option<String>,
    /// ISO country code, e.g. "GB".
    pub country_code: String,
}

/// External reverse-geocoding capability. The implementation lives with the
/// platform layer; this crate only gates on its output.
#[allow(async_fn_in_trait)]
pub trait Geocoder {
    async fn reverse_geocode(&self, position: Position) -> Result<Option<GeocodedAddress>>;
}

/// Client for the nearby-postbox lookup service, backed by the shared cache.
pub struct LookupClient<G> {
    http: Client,
    geocoder: G,
    cache: Arc<NearbyCache>,
    base_url: String,
}

impl<G: Geocoder> LookupClient<G> {
    pub fn new(geocoder: G, cache: Arc<NearbyCache>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        // The service fronts a public web page; plain API-client headers get
        // refused, so look like the page's own requests.
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(
                "Mozilla/5.0 (X11; Linux x86_64; rv:140.0) Gecko/20100101 Firefox/140.0",
            ),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(
            REFERER,
            HeaderValue::from_static("https://www.royalmail.com/services-near-you"),
        );

        let http = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            geocoder,
            cache,
            base_url: BRANCH_FINDER_BASE.to_string(),
        })
    }

    /// Point the client at a different service base URL (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Resolve a position to a postcode, gating on the lookup service's
    /// coverage area. Royal Mail only operates in the UK; no overseas
    /// territory uses UK-style postcodes.
    pub async fn resolve_postcode(&self, position: Position) -> Result<String> {
        let address = self
            .geocoder
            .reverse_geocode(position)
            .await?
            .ok_or(PillarboxError::PostcodeUnresolved)?;

        if address.country_code != "GB" && address.country_code != "GBR" {
            return Err(PillarboxError::PostcodeOutOfCoverage(address.country_code));
        }
        address.postcode.ok_or(PillarboxError::PostcodeUnresolved)
    }

    /// Fetch nearby postboxes for a position, serving from the cache when a
    /// fresh entry exists. Results are filtered to real postboxes, doubles
    /// merged, and ordered by distance from the query point. One attempt, no
    /// retry; the caller decides whether to surface the failure.
    pub async fn fetch_nearby(&self, position: Position) -> Result<Vec<RawPostbox>> {
        let postcode = self.resolve_postcode(position).await?;

        // cached entries were merged at store time, return them verbatim
        if let Some(hit) = self.cache.lookup(&postcode).await {
            return Ok(hit);
        }

        let url = format!("{}{}", self.base_url, BRANCH_FINDER_PATH);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("postCode", postcode.as_str()),
                ("searchRadius", &SEARCH_RADIUS.to_string()),
                ("count", &RESULT_COUNT.to_string()),
                ("officeType", "postboxes"),
                ("type", "2"),
                ("appliedFilters", "null"),
            ])
            .send()
            .await
            .map_err(|e| PillarboxError::LookupUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PillarboxError::LookupUnavailable(format!(
                "HTTP {} for postcode {postcode}",
                response.status()
            )));
        }

        let entries: Vec<RawPostbox> = response
            .json()
            .await
            .map_err(|e| PillarboxError::LookupUnavailable(e.to_string()))?;

        let postboxes = normalize_results(entries);
        if !postboxes.is_empty() {
            // best effort: a failed cache write must not fail the fetch
            if let Err(e) = self.cache.store(&postcode, &postboxes).await {
                warn!("failed to cache lookup results for {postcode}: {e}");
            }
        }
        Ok(postboxes)
    }
}

/// Filter raw entries to actual postboxes, merge double halves, and sort by
/// distance from the query point.
pub fn normalize_results(entries: Vec<RawPostbox>) -> Vec<RawPostbox> {
    let mut merged =
        merge_doubles(entries.into_iter().filter(|pb| pb.entry_type == "PB").collect());
    merged.sort_by(|a, b| {
        a.location_details
            .distance
            .total_cmp(&b.location_details.distance)
    });
    merged
}

/// Pair up the two halves of each double postbox.
///
/// Two candidates merge when they share a postcode, their names match once
/// the L/R marker is stripped, and they sit within [`DOUBLE_MERGE_RADIUS_M`]
/// of each other. The matched half nests inside the survivor; unmatched
/// halves come out standalone. Quadratic over a per-postcode result set of at
/// most a few dozen entries.
fn merge_doubles(entries: Vec<RawPostbox>) -> Vec<RawPostbox> {
    let mut out = Vec::with_capacity(entries.len());
    let mut unpaired: Vec<RawPostbox> = Vec::new();

    for mut pb in entries {
        if !pb.is_double() {
            out.push(pb);
            continue;
        }
        let matched = unpaired.iter().position(|other| {
            other.office_details.postcode == pb.office_details.postcode
                && other.comparison_name() == pb.comparison_name()
                && distance_between_m(other.position(), pb.position()) < DOUBLE_MERGE_RADIUS_M
        });
        match matched {
            Some(i) => {
                pb.double = Some(Box::new(unpaired.remove(i)));
                out.push(pb);
            }
            None => unpaired.push(pb),
        }
    }

    // halves we never found a partner for still count as postboxes
    out.extend(unpaired);
    out
}
