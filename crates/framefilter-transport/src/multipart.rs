//! `multipart/form-data` body encoding.
//!
//! Only what the upload needs: file parts with a filename and content type,
//! framed by a random boundary (RFC 7578).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{BufMut, Bytes, BytesMut};

const CRLF: &[u8] = b"\r\n";
const DASHES: &[u8] = b"--";

/// Generate a boundary that is unique per call within the process.
pub fn generate_boundary() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);

    format!("----framefilter{:016x}{:08x}", nanos, count)
}

/// A `multipart/form-data` request body under construction.
#[derive(Debug)]
pub struct MultipartBody {
    boundary: String,
    buf: BytesMut,
}

impl MultipartBody {
    /// Start a body with a fresh boundary.
    pub fn new() -> Self {
        Self::with_boundary(generate_boundary())
    }

    /// Start a body with a caller-chosen boundary.
    pub fn with_boundary(boundary: String) -> Self {
        Self {
            boundary,
            buf: BytesMut::new(),
        }
    }

    /// The boundary delimiting parts.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Append a file part.
    pub fn add_file(&mut self, field: &str, filename: &str, content_type: &str, data: &[u8]) {
        let header = format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            escape_quoted(field),
            escape_quoted(filename),
            content_type
        );

        self.buf
            .reserve(DASHES.len() + self.boundary.len() + header.len() + data.len() + 2 * CRLF.len());
        self.buf.put_slice(DASHES);
        self.buf.put_slice(self.boundary.as_bytes());
        self.buf.put_slice(CRLF);
        self.buf.put_slice(header.as_bytes());
        self.buf.put_slice(data);
        self.buf.put_slice(CRLF);
    }

    /// Close the body and return its bytes.
    pub fn finish(mut self) -> Bytes {
        self.buf.put_slice(DASHES);
        self.buf.put_slice(self.boundary.as_bytes());
        self.buf.put_slice(DASHES);
        self.buf.put_slice(CRLF);
        self.buf.freeze()
    }
}

impl Default for MultipartBody {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_quoted(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
