//! Request body assembly.
//!
//! A body is written in exactly one of three modes, picked by the first
//! write: raw bytes, URL-encoded form fields, or multipart parts. Writing in
//! a second mode is recorded and reported by
//! [`RequestBuilder::build`](crate::RequestBuilder::build).

mod builder;
mod form;
mod multipart;

use std::fmt;

pub use builder::RequestBuilder;
pub use form::{FORM_CONTENT_TYPE, encode_component};
pub use multipart::{BOUNDARY, MULTIPART_CONTENT_TYPE, Part};

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Which body encoding a request is using.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyMode {
    Raw,
    Form,
    Multipart,
}

impl fmt::Display for BodyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BodyMode::Raw => "raw",
            BodyMode::Form => "form",
            BodyMode::Multipart => "multipart",
        })
    }
}
