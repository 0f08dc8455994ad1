use std::fmt;

use serde::{Deserialize, Serialize};

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Trace,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Patch => "PATCH",
        }
    }

    /// Whether a request body is transmitted for this method.
    pub fn permits_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_post_put_patch_carry_bodies() {
        let with_body = [Method::Post, Method::Put, Method::Patch];
        let without = [
            Method::Get,
            Method::Delete,
            Method::Head,
            Method::Options,
            Method::Trace,
        ];

        assert!(with_body.iter().all(Method::permits_body));
        assert!(!without.iter().any(Method::permits_body));
    }

    #[test]
    fn display_is_wire_name() {
        assert_eq!(Method::Options.to_string(), "OPTIONS");
        assert_eq!(Method::default(), Method::Get);
    }
}
