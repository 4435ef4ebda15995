// Geographic helpers shared by the lookup client and the UI seams.
// Distance math, location-fetch throttling, and proximity verification.

use std::time::{Duration, Instant};

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Maximum distance from a postbox at which a visit counts as verified.
pub const VERIFY_RADIUS_M: f64 = 2500.0;

/// Minimum interval between fresh device-location fetches.
pub const LOCATION_REFRESH_INTERVAL: Duration = Duration::from_secs(10 * 60);

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two positions in metres (haversine).
pub fn distance_between_m(a: Position, b: Position) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Whether a user at `user` is close enough to `postbox` to count as a
/// physical visit. The location plumbing itself lives outside this crate.
pub fn within_verify_range(user: Position, postbox: Position) -> bool {
    distance_between_m(user, postbox) <= VERIFY_RADIUS_M
}

/// Tracks when the device location was last refreshed so callers can decide
/// between a cached fix and a fresh one. Owned by whichever component issues
/// location requests rather than living in module-level state, so it can be
/// reset per test.
#[derive(Debug, Default)]
pub struct FetchThrottle {
    last_fetch: Option<Instant>,
    interval: Option<Duration>,
}

impl FetchThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the refresh interval (tests).
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            last_fetch: None,
            interval: Some(interval),
        }
    }

    fn interval(&self) -> Duration {
        self.interval.unwrap_or(LOCATION_REFRESH_INTERVAL)
    }

    /// Whether a fresh location fetch is due.
    pub fn should_refresh(&self) -> bool {
        match self.last_fetch {
            Some(at) => at.elapsed() >= self.interval(),
            None => true,
        }
    }

    /// Record that a fresh fetch just completed.
    pub fn mark_fetched(&mut self) {
        self.last_fetch = Some(Instant::now());
    }

    /// Forget the last fetch, forcing the next check to refresh.
    pub fn reset(&mut self) {
        self.last_fetch = None;
    }
}
