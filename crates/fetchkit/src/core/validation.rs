use crate::data::{CacheEntry, Headers};

use super::format_http_date;

/// How the pipeline treats a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 200..=299
    Success,
    /// 304
    NotModified,
    /// 301 or 302
    Moved,
    /// 401 or 403
    AuthFailure,
    /// Anything else.
    Failure,
}

/// Returns `true` for the redirect codes the pipeline reports to callers.
///
/// Only 301 and 302 are recognised; other 3xx codes are ordinary failures.
///
/// ```
/// use fetchkit::core::is_moved;
///
/// assert!(is_moved(301));
/// assert!(is_moved(302));
/// assert!(!is_moved(307));
/// assert!(!is_moved(304));
/// ```
pub fn is_moved(status: u16) -> bool {
    matches!(status, 301 | 302)
}

pub fn classify(status: u16) -> StatusClass {
    match status {
        200..=299 => StatusClass::Success,
        304 => StatusClass::NotModified,
        s if is_moved(s) => StatusClass::Moved,
        401 | 403 => StatusClass::AuthFailure,
        _ => StatusClass::Failure,
    }
}

/// Validator headers for a conditional request against `entry`.
pub fn conditional_headers(entry: &CacheEntry) -> Headers {
    let mut headers = Headers::new();
    if let Some(etag) = &entry.etag {
        headers.insert("If-None-Match", etag.as_str());
    }
    if let Some(last_modified) = entry.last_modified {
        headers.insert("If-Modified-Since", format_http_date(last_modified));
    }
    headers
}
