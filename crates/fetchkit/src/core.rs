//! Pure rules: retry decisions, status classification and HTTP dates.
//!
//! Nothing in here performs I/O; the pipeline in
//! [`effects`](crate::effects) drives these functions.

mod http_date;
mod retry;
mod validation;

pub use http_date::{format_http_date, parse_http_date};
pub use retry::{
    DefaultRetryPolicy, RetryCause, RetryMarker, RetryPolicy, RetryState, retry_delay,
};
pub use validation::{StatusClass, classify, conditional_headers, is_moved};
