use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered header mapping with case-insensitive names.
///
/// A later write to a name replaces the earlier value no matter how either
/// name is capitalised. The spelling of the first write is kept, so
/// `Content-Type` stays `Content-Type` after `content-type` overrides it.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<(String, String)>", into = "Vec<(String, String)>")]
pub struct Headers {
    entries: IndexMap<String, (String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to `value`, returning the replaced value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let name = name.into();
        let value = value.into();
        match self.entries.get_mut(&fold(&name)) {
            Some(slot) => Some(std::mem::replace(&mut slot.1, value)),
            None => {
                self.entries.insert(fold(&name), (name, value));
                None
            }
        }
    }

    /// Set `name` only when no value is present yet.
    pub fn insert_default(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.entries
            .entry(fold(&name))
            .or_insert_with(|| (name, value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(&fold(name)).map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&fold(name))
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries.shift_remove(&fold(name)).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(name, value)` pairs in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.values().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Overlay `other` on top of `self`; values from `other` win.
    pub fn merge(&mut self, other: &Headers) {
        for (name, value) in other.iter() {
            self.insert(name, value);
        }
    }

    /// Fill in every name from `defaults` that `self` does not set.
    pub fn merge_defaults(&mut self, defaults: &Headers) {
        for (name, value) in defaults.iter() {
            self.insert_default(name, value);
        }
    }
}

fn fold(name: &str) -> String {
    name.to_ascii_lowercase()
}

impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        headers.extend(iter);
        headers
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Headers {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.insert(name, value);
        }
    }
}

impl From<Vec<(String, String)>> for Headers {
    fn from(pairs: Vec<(String, String)>) -> Self {
        pairs.into_iter().collect()
    }
}

impl From<Headers> for Vec<(String, String)> {
    fn from(headers: Headers) -> Self {
        headers.entries.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn later_write_wins_ignoring_case() {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "text/plain");
        let previous = headers.insert("content-type", "application/json");

        assert_eq!(previous.as_deref(), Some("text/plain"));
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(headers.iter().next(), Some(("Content-Type", "application/json")));
    }

    #[test]
    fn repeated_identical_writes_are_idempotent() {
        let mut once = Headers::new();
        once.insert("Accept", "*/*");

        let mut twice = once.clone();
        twice.insert("Accept", "*/*");
        twice.insert("accept", "*/*");

        assert_eq!(once, twice);
    }

    #[test]
    fn merge_defaults_keeps_caller_values() {
        let mut headers: Headers = [("user-agent", "custom/1.0")].into_iter().collect();
        let defaults: Headers = [("User-Agent", "fetchkit"), ("Accept-Charset", "UTF-8")]
            .into_iter()
            .collect();

        headers.merge_defaults(&defaults);

        assert_eq!(headers.get("User-Agent"), Some("custom/1.0"));
        assert_eq!(headers.get("accept-charset"), Some("UTF-8"));
    }

    #[test]
    fn merge_overrides_existing_values() {
        let mut headers: Headers = [("ETag", "\"a\""), ("Content-Length", "10")]
            .into_iter()
            .collect();
        let fresh: Headers = [("etag", "\"b\"")].into_iter().collect();

        headers.merge(&fresh);

        assert_eq!(headers.get("ETag"), Some("\"b\""));
        assert_eq!(headers.get("Content-Length"), Some("10"));
    }

    #[test]
    fn remove_is_case_insensitive() {
        let mut headers: Headers = [("X-Trace", "1")].into_iter().collect();
        assert_eq!(headers.remove("x-trace").as_deref(), Some("1"));
        assert!(headers.is_empty());
    }

    #[test]
    fn serde_preserves_order_and_spelling() {
        let headers: Headers = [("B-Header", "2"), ("A-Header", "1")].into_iter().collect();
        let json = serde_json::to_string(&headers).unwrap();
        assert_eq!(json, r#"[["B-Header","2"],["A-Header","1"]]"#);

        let back: Headers = serde_json::from_str(&json).unwrap();
        assert_eq!(back, headers);
    }

    proptest! {
        #[test]
        fn last_write_wins_for_any_casing(name in "[A-Za-z][A-Za-z-]{0,15}", a in ".*", b in ".*") {
            let mut headers = Headers::new();
            headers.insert(name.to_ascii_uppercase(), a);
            headers.insert(name.to_ascii_lowercase(), b.clone());

            prop_assert_eq!(headers.len(), 1);
            prop_assert_eq!(headers.get(&name), Some(b.as_str()));
        }
    }
}
