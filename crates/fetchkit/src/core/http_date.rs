use chrono::{DateTime, NaiveDateTime, Utc};

const RFC1123: &str = "%a, %d %b %Y %H:%M:%S GMT";
const RFC850: &str = "%A, %d-%b-%y %H:%M:%S GMT";
const ASCTIME: &str = "%a %b %e %H:%M:%S %Y";

/// Format a timestamp the way `If-Modified-Since` expects it.
pub fn format_http_date(date: DateTime<Utc>) -> String {
    date.format(RFC1123).to_string()
}

/// Parse any of the three date formats HTTP/1.1 allows.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.with_timezone(&Utc));
    }
    [RFC850, ASCTIME]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}
