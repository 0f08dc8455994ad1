use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::PathBuf;

use bytes::Bytes;

/// Fixed multipart boundary token.
pub const BOUNDARY: &str = "00fetchkit0multipart0boundary00";

/// Content type of a multipart body using [`BOUNDARY`].
pub const MULTIPART_CONTENT_TYPE: &str = "multipart/form-data; boundary=00fetchkit0multipart0boundary00";

const CRLF: &str = "\r\n";

enum Payload {
    Bytes(Bytes),
    File(PathBuf),
    Reader(Box<dyn Read + Send>),
}

/// One `form-data` part of a multipart body.
///
/// ```
/// use fetchkit::body::Part;
///
/// let avatar = Part::bytes(vec![0x89, 0x50, 0x4e, 0x47])
///     .filename("avatar.png")
///     .content_type("image/png");
/// ```
pub struct Part {
    payload: Payload,
    filename: Option<String>,
    content_type: Option<String>,
    headers: Vec<(String, String)>,
}

impl Part {
    fn with_payload(payload: Payload) -> Self {
        Self {
            payload,
            filename: None,
            content_type: None,
            headers: Vec::new(),
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::with_payload(Payload::Bytes(Bytes::from(value.into())))
    }

    pub fn bytes(value: impl Into<Bytes>) -> Self {
        Self::with_payload(Payload::Bytes(value.into()))
    }

    /// Contents are read when the part is added to a builder.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::with_payload(Payload::File(path.into()))
    }

    /// Drained when the part is added to a builder.
    pub fn reader(reader: impl Read + Send + 'static) -> Self {
        Self::with_payload(Payload::Reader(Box::new(reader)))
    }

    #[must_use]
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Extra part header written after `Content-Disposition`.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

impl fmt::Debug for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let payload = match &self.payload {
            Payload::Bytes(b) => format!("{} bytes", b.len()),
            Payload::File(path) => format!("file {}", path.display()),
            Payload::Reader(_) => "reader".to_string(),
        };
        f.debug_struct("Part")
            .field("payload", &payload)
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("headers", &self.headers)
            .finish()
    }
}

#[derive(Debug, Default)]
pub(crate) struct MultipartWriter {
    buf: Vec<u8>,
    started: bool,
}

impl MultipartWriter {
    pub(crate) fn part(&mut self, name: &str, part: Part) -> io::Result<()> {
        if self.started {
            self.write(CRLF);
        }
        self.started = true;
        self.write("--");
        self.write(BOUNDARY);
        self.write(CRLF);

        let mut disposition = format!("form-data; name=\"{}\"", escape_quoted(name));
        if let Some(filename) = &part.filename {
            disposition.push_str(&format!("; filename=\"{}\"", escape_quoted(filename)));
        }
        self.header("Content-Disposition", &disposition);
        if let Some(content_type) = &part.content_type {
            self.header("Content-Type", content_type);
        }
        for (name, value) in &part.headers {
            self.header(name, value);
        }
        self.write(CRLF);

        match part.payload {
            Payload::Bytes(bytes) => self.buf.extend_from_slice(&bytes),
            Payload::File(path) => {
                let mut file = BufReader::new(File::open(path)?);
                io::copy(&mut file, &mut self.buf)?;
            }
            Payload::Reader(mut reader) => {
                io::copy(&mut reader, &mut self.buf)?;
            }
        }
        Ok(())
    }

    /// Append the closing delimiter.
    pub(crate) fn finish(mut self) -> Vec<u8> {
        self.write(CRLF);
        self.write("--");
        self.write(BOUNDARY);
        self.write("--");
        self.write(CRLF);
        self.buf
    }

    fn header(&mut self, name: &str, value: &str) {
        self.write(name);
        self.write(": ");
        self.write(value);
        self.write(CRLF);
    }

    fn write(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
    }
}

/// Percent-encode `"`, CR and LF inside a quoted `Content-Disposition`
/// parameter, as browsers do for `multipart/form-data`.
fn escape_quoted(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => escaped.push_str("%22"),
            '\r' => escaped.push_str("%0D"),
            '\n' => escaped.push_str("%0A"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn as_text(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn single_text_part() {
        let mut writer = MultipartWriter::default();
        writer.part("f", Part::text("hi")).unwrap();

        let body = as_text(writer.finish());
        assert_eq!(
            body,
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"f\"\r\n\r\nhi\r\n--{BOUNDARY}--\r\n"
            )
        );
    }

    #[test]
    fn part_with_filename_type_and_header() {
        let mut writer = MultipartWriter::default();
        writer.part("a", Part::text("1")).unwrap();
        writer
            .part(
                "upload",
                Part::bytes(&b"\x00\x01"[..])
                    .filename("data.bin")
                    .content_type("application/octet-stream")
                    .header("Content-Transfer-Encoding", "binary"),
            )
            .unwrap();

        let body = writer.finish();
        let expected_tail = format!(
            "1\r\n--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"upload\"; filename=\"data.bin\"\r\n\
             Content-Type: application/octet-stream\r\n\
             Content-Transfer-Encoding: binary\r\n\r\n"
        );
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains(&expected_tail), "{text}");
        assert!(body.ends_with(format!("\x00\x01\r\n--{BOUNDARY}--\r\n").as_bytes()));
    }

    #[test]
    fn file_and_reader_payloads() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"from disk").unwrap();

        let mut writer = MultipartWriter::default();
        writer.part("doc", Part::file(file.path())).unwrap();
        writer
            .part("stream", Part::reader(io::Cursor::new(b"from reader".to_vec())))
            .unwrap();

        let body = as_text(writer.finish());
        assert!(body.contains("name=\"doc\"\r\n\r\nfrom disk\r\n"));
        assert!(body.contains("name=\"stream\"\r\n\r\nfrom reader\r\n"));
    }

    #[test]
    fn disposition_parameters_are_escaped() {
        let mut writer = MultipartWriter::default();
        writer
            .part(
                "a\"b",
                Part::text("x").filename("evil\r\nContent-Type: text/html\".txt"),
            )
            .unwrap();

        let body = as_text(writer.finish());
        assert!(body.contains(
            "Content-Disposition: form-data; name=\"a%22b\"; \
             filename=\"evil%0D%0AContent-Type: text/html%22.txt\"\r\n\r\nx"
        ));
        assert!(!body.contains("\r\nContent-Type: text/html"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut writer = MultipartWriter::default();
        let err = writer
            .part("doc", Part::file("/definitely/not/here.txt"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
