//! API constants

/// Versioned prefix every media route is nested under
pub const API_PREFIX: &str = "/api/v1";

/// Shortest accepted media URL, scheme included.
pub const MIN_MEDIA_URL_LEN: usize = 10;

/// Schemes a media URL may use.
pub const ALLOWED_URL_SCHEMES: [&str; 3] = ["http://", "https://", "gs://"];
