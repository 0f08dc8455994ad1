use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use url::Url;

use super::form::{Charset, FormWriter};
use super::multipart::{MultipartWriter, Part};
use super::{BodyMode, JSON_CONTENT_TYPE, MULTIPART_CONTENT_TYPE, OCTET_STREAM};
use crate::core::RetryPolicy;
use crate::data::{Body, CacheEntry, CancelHandle, Headers, Method, Request, Timeouts};
use crate::error::BuildError;

#[derive(Debug, Default)]
enum BodyBuffer {
    #[default]
    Empty,
    Raw(Vec<u8>),
    Form(FormWriter),
    Multipart(MultipartWriter),
}

impl BodyBuffer {
    fn mode(&self) -> Option<BodyMode> {
        match self {
            BodyBuffer::Empty => None,
            BodyBuffer::Raw(_) => Some(BodyMode::Raw),
            BodyBuffer::Form(_) => Some(BodyMode::Form),
            BodyBuffer::Multipart(_) => Some(BodyMode::Multipart),
        }
    }
}

/// Incremental builder for a [`Request`].
///
/// Every method consumes and returns the builder so calls chain. Errors
/// (a second body mode, an unreadable file, a malformed header) do not
/// interrupt the chain; the first one is returned from [`build`](Self::build).
///
/// ```
/// use fetchkit::Request;
///
/// let request = Request::post("https://example.com/login")
///     .accept_json()
///     .field("user", "ada")
///     .field("note", "x y")
///     .build()
///     .unwrap();
///
/// let body = request.body().unwrap();
/// assert_eq!(&body.bytes[..], b"user=ada&note=x+y");
/// ```
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    url: String,
    params: Vec<(String, String)>,
    headers: Headers,
    content_type: Option<String>,
    body: BodyBuffer,
    timeouts: Timeouts,
    retry_policy: Option<Arc<dyn RetryPolicy>>,
    cache_entry: Option<Arc<CacheEntry>>,
    cache_key: Option<String>,
    should_cache: Option<bool>,
    error: Option<BuildError>,
}

impl RequestBuilder {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            params: Vec::new(),
            headers: Headers::new(),
            content_type: None,
            body: BodyBuffer::Empty,
            timeouts: Timeouts::default(),
            retry_policy: None,
            cache_entry: None,
            cache_key: None,
            should_cache: None,
            error: None,
        }
    }

    // ----- headers -----

    /// Set a header. A later call with the same name, in any case, wins.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        let name = name.into();
        if !is_token(&name) {
            self.record(BuildError::InvalidHeader(name));
            return self;
        }
        let value = value.to_string();
        if !is_field_value(&value) {
            self.record(BuildError::InvalidHeaderValue { name });
            return self;
        }
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn headers<K, V, I>(self, headers: I) -> Self
    where
        K: Into<String>,
        V: ToString,
        I: IntoIterator<Item = (K, V)>,
    {
        headers
            .into_iter()
            .fold(self, |builder, (name, value)| builder.header(name, value))
    }

    #[must_use]
    pub fn accept(self, accept: &str) -> Self {
        self.header("Accept", accept)
    }

    #[must_use]
    pub fn accept_json(self) -> Self {
        self.accept(JSON_CONTENT_TYPE)
    }

    #[must_use]
    pub fn accept_encoding(self, encoding: &str) -> Self {
        self.header("Accept-Encoding", encoding)
    }

    #[must_use]
    pub fn accept_gzip(self) -> Self {
        self.accept_encoding("gzip")
    }

    #[must_use]
    pub fn accept_charset(self, charset: &str) -> Self {
        self.header("Accept-Charset", charset)
    }

    #[must_use]
    pub fn user_agent(self, user_agent: &str) -> Self {
        self.header("User-Agent", user_agent)
    }

    #[must_use]
    pub fn referer(self, referer: &str) -> Self {
        self.header("Referer", referer)
    }

    #[must_use]
    pub fn bearer_auth(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {token}"))
    }

    /// Override the content type the body mode would pick.
    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        let content_type = content_type.into();
        if !is_field_value(&content_type) {
            self.record(BuildError::InvalidHeaderValue {
                name: "Content-Type".to_owned(),
            });
            return self;
        }
        self.content_type = Some(content_type);
        self
    }

    // ----- url -----

    /// Append a query parameter to the URL.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    #[must_use]
    pub fn params<K, V, I>(self, params: I) -> Self
    where
        K: Into<String>,
        V: ToString,
        I: IntoIterator<Item = (K, V)>,
    {
        params
            .into_iter()
            .fold(self, |builder, (key, value)| builder.param(key, value))
    }

    // ----- form mode -----

    /// Append a URL-encoded form field (UTF-8).
    #[must_use]
    pub fn field(self, name: &str, value: impl ToString) -> Self {
        self.field_with_charset(name, value, "UTF-8")
    }

    /// Append a form field encoded in `charset` (any WHATWG encoding label)
    /// before URL-encoding. The first field's charset goes into the content
    /// type.
    #[must_use]
    pub fn field_with_charset(mut self, name: &str, value: impl ToString, charset: &str) -> Self {
        let charset = match Charset::resolve(charset) {
            Ok(charset) => charset,
            Err(e) => {
                self.record(e);
                return self;
            }
        };
        if let Some(BodyBuffer::Form(form)) = self.select(BodyMode::Form) {
            form.field(name, &value.to_string(), charset);
        }
        self
    }

    #[must_use]
    pub fn form<K, V, I>(self, fields: I) -> Self
    where
        K: AsRef<str>,
        V: ToString,
        I: IntoIterator<Item = (K, V)>,
    {
        fields
            .into_iter()
            .fold(self, |builder, (name, value)| builder.field(name.as_ref(), value))
    }

    // ----- multipart mode -----

    #[must_use]
    pub fn part(mut self, name: &str, part: Part) -> Self {
        let result = match self.select(BodyMode::Multipart) {
            Some(BodyBuffer::Multipart(writer)) => writer.part(name, part),
            _ => Ok(()),
        };
        if let Err(e) = result {
            self.record(e.into());
        }
        self
    }

    #[must_use]
    pub fn text_part(self, name: &str, value: impl Into<String>) -> Self {
        self.part(name, Part::text(value))
    }

    // ----- raw mode -----

    /// Append raw bytes to the body.
    #[must_use]
    pub fn send(mut self, bytes: impl AsRef<[u8]>) -> Self {
        if let Some(BodyBuffer::Raw(buf)) = self.select(BodyMode::Raw) {
            buf.extend_from_slice(bytes.as_ref());
        }
        self
    }

    #[must_use]
    pub fn send_text(self, text: &str) -> Self {
        self.send(text.as_bytes())
    }

    #[must_use]
    pub fn send_file(mut self, path: impl AsRef<Path>) -> Self {
        match fs::read(path) {
            Ok(bytes) => self.send(bytes),
            Err(e) => {
                self.record(e.into());
                self
            }
        }
    }

    #[must_use]
    pub fn send_reader(mut self, mut reader: impl Read) -> Self {
        let mut bytes = Vec::new();
        match reader.read_to_end(&mut bytes) {
            Ok(_) => self.send(bytes),
            Err(e) => {
                self.record(e.into());
                self
            }
        }
    }

    /// Serialize `value` as the raw body with a JSON content type.
    #[must_use]
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                self.content_type.get_or_insert_with(|| JSON_CONTENT_TYPE.to_string());
                self.send(bytes)
            }
            Err(e) => {
                self.record(e.into());
                self
            }
        }
    }

    // ----- dispatch settings -----

    #[must_use]
    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connect = Some(timeout);
        self
    }

    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.read = Some(timeout);
        self
    }

    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.write = Some(timeout);
        self
    }

    #[must_use]
    pub fn fast(self) -> Self {
        self.timeouts(Timeouts::fast())
    }

    #[must_use]
    pub fn long_read(self) -> Self {
        self.timeouts(Timeouts::long_read())
    }

    #[must_use]
    pub fn long_write(self) -> Self {
        self.timeouts(Timeouts::long_write())
    }

    #[must_use]
    pub fn retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.retry_policy = Some(Arc::new(policy));
        self
    }

    /// Validate against a previously cached response.
    #[must_use]
    pub fn cache_entry(mut self, entry: Arc<CacheEntry>) -> Self {
        self.cache_entry = Some(entry);
        self
    }

    /// Key under which the response is cached. Defaults to the final URL.
    #[must_use]
    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    /// Whether the client may store the response. Defaults to `true` for GET.
    #[must_use]
    pub fn should_cache(mut self, should_cache: bool) -> Self {
        self.should_cache = Some(should_cache);
        self
    }

    pub fn build(self) -> Result<Request, BuildError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let origin_url = Url::parse(&self.url).map_err(|source| BuildError::InvalidUrl {
            url: self.url.clone(),
            source,
        })?;
        let mut url = origin_url.clone();
        if !self.params.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.params);
        }

        let body = match self.body {
            BodyBuffer::Empty => None,
            BodyBuffer::Raw(bytes) => Some((OCTET_STREAM.to_string(), bytes)),
            BodyBuffer::Form(form) => Some((form.content_type(), form.finish())),
            BodyBuffer::Multipart(writer) => {
                Some((MULTIPART_CONTENT_TYPE.to_string(), writer.finish()))
            }
        }
        .map(|(default_type, bytes)| Body {
            content_type: self.content_type.unwrap_or(default_type),
            bytes: bytes.into(),
        });

        if body.is_some() && !self.method.permits_body() {
            return Err(BuildError::BodyNotAllowed {
                method: self.method,
            });
        }

        Ok(Request {
            method: self.method,
            cache_key: self.cache_key.unwrap_or_else(|| url.to_string()),
            should_cache: self.should_cache.unwrap_or(self.method == Method::Get),
            url,
            origin_url,
            headers: self.headers,
            body,
            timeouts: self.timeouts,
            retry_policy: self.retry_policy,
            cache_entry: self.cache_entry,
            cancel: CancelHandle::default(),
        })
    }

    /// Switch the body into `mode`, or record a conflict and return `None`.
    fn select(&mut self, mode: BodyMode) -> Option<&mut BodyBuffer> {
        match self.body.mode() {
            None => {
                self.body = match mode {
                    BodyMode::Raw => BodyBuffer::Raw(Vec::new()),
                    BodyMode::Form => BodyBuffer::Form(FormWriter::default()),
                    BodyMode::Multipart => BodyBuffer::Multipart(MultipartWriter::default()),
                };
                Some(&mut self.body)
            }
            Some(current) if current == mode => Some(&mut self.body),
            Some(current) => {
                self.record(BuildError::MixedBodyModes {
                    current,
                    attempted: mode,
                });
                None
            }
        }
    }

    fn record(&mut self, error: BuildError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

/// RFC 9110 token characters.
fn is_token(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

/// RFC 9110 field-value bytes: HTAB, SP, VCHAR and obs-text.
fn is_field_value(value: &str) -> bool {
    value
        .bytes()
        .all(|b| b == b'\t' || b == b' ' || b.is_ascii_graphic() || b >= 0x80)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{BOUNDARY, FORM_CONTENT_TYPE};
    use crate::core::DefaultRetryPolicy;

    #[test]
    fn form_body_and_content_type() {
        let request = Request::post("https://example.com/")
            .form([("a", "1"), ("b", "x y")])
            .build()
            .unwrap();

        let body = request.body().unwrap();
        assert_eq!(&body.bytes[..], b"a=1&b=x+y");
        assert_eq!(body.content_type, FORM_CONTENT_TYPE);
    }

    #[test]
    fn multipart_body_is_closed_on_build() {
        let request = Request::post("https://example.com/upload")
            .text_part("f", "hi")
            .build()
            .unwrap();

        let body = request.body().unwrap();
        let text = std::str::from_utf8(&body.bytes).unwrap();
        assert!(text.starts_with(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"f\"\r\n\r\nhi"
        )));
        assert!(text.ends_with(&format!("--{BOUNDARY}--\r\n")));
        assert_eq!(
            body.content_type,
            format!("multipart/form-data; boundary={BOUNDARY}")
        );
    }

    #[test]
    fn mixing_modes_fails_at_build() {
        let err = Request::post("https://example.com/")
            .field("a", "1")
            .text_part("f", "hi")
            .send(b"raw")
            .build()
            .unwrap_err();

        assert!(matches!(
            err,
            BuildError::MixedBodyModes {
                current: BodyMode::Form,
                attempted: BodyMode::Multipart
            }
        ));
    }

    #[test]
    fn raw_chunks_accumulate() {
        let request = Request::put("https://example.com/blob")
            .send(b"ab")
            .send_text("cd")
            .send_reader(&b"ef"[..])
            .build()
            .unwrap();

        let body = request.body().unwrap();
        assert_eq!(&body.bytes[..], b"abcdef");
        assert_eq!(body.content_type, OCTET_STREAM);
    }

    #[test]
    fn json_body_uses_json_content_type() {
        let request = Request::post("https://example.com/")
            .json(&serde_json::json!({"id": 7}))
            .build()
            .unwrap();

        let body = request.body().unwrap();
        assert_eq!(&body.bytes[..], br#"{"id":7}"#);
        assert_eq!(body.content_type, JSON_CONTENT_TYPE);
    }

    #[test]
    fn explicit_content_type_wins() {
        let request = Request::post("https://example.com/")
            .content_type("text/csv")
            .send_text("a,b")
            .build()
            .unwrap();
        assert_eq!(request.body().unwrap().content_type, "text/csv");
    }

    #[test]
    fn unreadable_file_fails_at_build() {
        let err = Request::post("https://example.com/")
            .send_file("/no/such/file")
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::Io(_)));
    }

    #[test]
    fn control_bytes_in_header_values_are_rejected() {
        let err = Request::get("https://example.com/")
            .header("X-Note", "a\r\nInjected: 1")
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidHeaderValue { name } if name == "X-Note"));

        let err = Request::post("https://example.com/")
            .send_text("x")
            .content_type("text/plain\0")
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidHeaderValue { name } if name == "Content-Type"));
    }

    #[test]
    fn tabs_and_non_ascii_header_values_are_kept() {
        let request = Request::get("https://example.com/")
            .header("X-Note", "a\tb c")
            .header("X-Name", "Zoë")
            .build()
            .unwrap();
        assert_eq!(request.headers().get("x-note"), Some("a\tb c"));
        assert_eq!(request.headers().get("x-name"), Some("Zoë"));
    }

    #[test]
    fn latin1_form_field() {
        let request = Request::post("https://example.com/")
            .field_with_charset("q", "é", "ISO-8859-1")
            .build()
            .unwrap();

        let body = request.body().unwrap();
        assert_eq!(&body.bytes[..], b"q=%E9");
        assert_eq!(
            body.content_type,
            "application/x-www-form-urlencoded; charset=ISO-8859-1"
        );
    }

    #[test]
    fn unknown_charset_is_rejected() {
        let err = Request::post("https://example.com/")
            .field_with_charset("a", "1", "klingon")
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::UnsupportedCharset(name) if name == "klingon"));
    }

    #[test]
    fn body_on_get_is_rejected() {
        let err = Request::get("https://example.com/")
            .field("a", "1")
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::BodyNotAllowed { method: Method::Get }));
    }

    #[test]
    fn invalid_url_and_header() {
        assert!(matches!(
            Request::get("not a url").build(),
            Err(BuildError::InvalidUrl { .. })
        ));
        assert!(matches!(
            Request::get("https://example.com/").header("bad name", "x").build(),
            Err(BuildError::InvalidHeader(name)) if name == "bad name"
        ));
    }

    #[test]
    fn params_extend_url_and_keep_origin() {
        let request = Request::get("https://example.com/search?q=1")
            .param("page", 2)
            .params([("tag", "a b")])
            .build()
            .unwrap();

        assert_eq!(request.url().as_str(), "https://example.com/search?q=1&page=2&tag=a+b");
        assert_eq!(request.origin_url().as_str(), "https://example.com/search?q=1");
        assert_eq!(request.cache_key(), request.url().as_str());
    }

    #[test]
    fn header_helpers_last_write_wins() {
        let request = Request::get("https://example.com/")
            .user_agent("first")
            .header("user-agent", "second")
            .bearer_auth("t0k")
            .accept_gzip()
            .build()
            .unwrap();

        let headers = request.headers();
        assert_eq!(headers.get("User-Agent"), Some("second"));
        assert_eq!(headers.get("Authorization"), Some("Bearer t0k"));
        assert_eq!(headers.get("Accept-Encoding"), Some("gzip"));
        assert_eq!(headers.len(), 3);
    }

    #[test]
    fn dispatch_settings() {
        let request = Request::get("https://example.com/")
            .long_read()
            .write_timeout(Duration::from_secs(9))
            .retry_policy(DefaultRetryPolicy::never())
            .cache_key("custom")
            .build()
            .unwrap();

        assert_eq!(request.timeouts().read, Some(Timeouts::LONG));
        assert_eq!(request.timeouts().write, Some(Duration::from_secs(9)));
        assert_eq!(request.retry_policy().unwrap().start().max_attempts, 0);
        assert_eq!(request.cache_key(), "custom");
        assert!(request.should_cache());

        let post = Request::post("https://example.com/").build().unwrap();
        assert!(!post.should_cache());
        assert!(post.retry_policy().is_none());
    }
}
