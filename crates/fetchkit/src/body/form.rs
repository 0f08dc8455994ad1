use encoding_rs::{Encoding, UTF_8};

use crate::error::BuildError;

/// Content type of a UTF-8 form body.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

const UTF8: &str = "UTF-8";

/// URL-encode one form component. Spaces become `+`.
///
/// ```
/// assert_eq!(fetchkit::body::encode_component("x y&z"), "x+y%26z");
/// ```
pub fn encode_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// A resolved form charset: the encoder plus the label written into the
/// content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Charset {
    encoding: &'static Encoding,
    label: String,
}

impl Charset {
    pub(crate) fn utf8() -> Self {
        Self {
            encoding: UTF_8,
            label: UTF8.to_owned(),
        }
    }

    /// Resolve a caller-supplied label. Empty means UTF-8; unknown labels
    /// are an error.
    pub(crate) fn resolve(label: &str) -> Result<Self, BuildError> {
        let trimmed = label.trim();
        if trimmed.is_empty() {
            return Ok(Self::utf8());
        }
        match Encoding::for_label(trimmed.as_bytes()) {
            Some(encoding) if encoding == UTF_8 => Ok(Self::utf8()),
            Some(encoding) => Ok(Self {
                encoding,
                label: trimmed.to_owned(),
            }),
            None => Err(BuildError::UnsupportedCharset(trimmed.to_owned())),
        }
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    /// Encode `value` in this charset, then percent-encode the bytes.
    /// Characters the charset cannot represent become numeric character
    /// references.
    pub(crate) fn encode_component(&self, value: &str) -> String {
        let (bytes, _, _) = self.encoding.encode(value);
        url::form_urlencoded::byte_serialize(&bytes).collect()
    }
}

/// `name=value` pairs joined by `&`.
#[derive(Debug, Default)]
pub(crate) struct FormWriter {
    buf: Vec<u8>,
    charset: Option<Charset>,
}

impl FormWriter {
    /// Append a field. The first field's charset names the body's charset.
    pub(crate) fn field(&mut self, name: &str, value: &str, charset: Charset) {
        if self.charset.is_some() {
            self.buf.push(b'&');
        }
        self.buf.extend_from_slice(charset.encode_component(name).as_bytes());
        self.buf.push(b'=');
        self.buf.extend_from_slice(charset.encode_component(value).as_bytes());
        self.charset.get_or_insert(charset);
    }

    pub(crate) fn content_type(&self) -> String {
        format!(
            "application/x-www-form-urlencoded; charset={}",
            self.charset.as_ref().map_or(UTF8, Charset::label)
        )
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.buf
    }
}
