//! Buffered response sink handed to route handlers.

use std::io;

use bytes::BytesMut;
use tracing::warn;

use super::{Headers, Response, StatusCode};

/// The outbound side of a request, as seen by a handler.
///
/// Writes are buffered; the dispatcher turns the writer into a [`Response`]
/// once the handler returns. The status is fixed by the first call to
/// [`write_header`](Self::write_header) (or implicitly set to `200 OK` by the
/// first body write). Later status writes are superfluous: they are counted,
/// logged, and otherwise ignored.
///
/// # Examples
///
/// ```
/// use std::io::Write;
/// use pathmux::http::{ResponseWriter, StatusCode};
///
/// let mut w = ResponseWriter::new();
/// w.set_header("Content-Type", "text/plain");
/// write!(w, "hello {}", "world").unwrap();
///
/// assert_eq!(w.status(), Some(StatusCode::OK));
/// assert_eq!(w.body(), b"hello world");
/// ```
#[derive(Debug, Default)]
pub struct ResponseWriter {
    status: Option<StatusCode>,
    status_writes: usize,
    headers: Headers,
    body: BytesMut,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Response headers; changes after the status was written still apply,
    /// because nothing reaches the wire before dispatch completes.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Sets a header, replacing any previous value.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    /// Writes the status line.
    pub fn write_header(&mut self, status: StatusCode) {
        self.status_writes += 1;
        match self.status {
            Some(current) => warn!(
                current = current.as_u16(),
                ignored = status.as_u16(),
                "superfluous write_header call"
            ),
            None => self.status = Some(status),
        }
    }

    /// Appends to the body, writing `200 OK` first if no status was written yet.
    pub fn write(&mut self, data: impl AsRef<[u8]>) {
        if self.status.is_none() {
            self.write_header(StatusCode::OK);
        }
        self.body.extend_from_slice(data.as_ref());
    }

    /// The status written so far, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// How many times a status line was written, superfluous writes included.
    pub fn status_writes(&self) -> usize {
        self.status_writes
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns `true` once a status or any body byte was written.
    pub fn is_written(&self) -> bool {
        self.status.is_some()
    }

    /// Discards everything written so far.
    pub fn reset(&mut self) {
        self.status = None;
        self.status_writes = 0;
        self.headers.clear();
        self.body.clear();
    }

    /// Converts the buffered writes into a wire [`Response`].
    ///
    /// A handler that wrote nothing produces an empty `200 OK`.
    pub fn into_response(self) -> Response {
        Response::from_parts(
            self.status.unwrap_or(StatusCode::OK),
            self.headers,
            self.body.to_vec(),
        )
    }
}

impl io::Write for ResponseWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        ResponseWriter::write(self, buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_status_wins() {
        let mut w = ResponseWriter::new();
        w.write_header(StatusCode::NOT_FOUND);
        w.write_header(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(w.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(w.status_writes(), 2);
    }

    #[test]
    fn body_write_implies_ok() {
        let mut w = ResponseWriter::new();
        w.write("hi");
        assert_eq!(w.status(), Some(StatusCode::OK));
        assert_eq!(w.status_writes(), 1);
        w.write(" there");
        assert_eq!(w.status_writes(), 1);
        assert_eq!(w.body(), b"hi there");
    }

    #[test]
    fn empty_writer_is_ok_response() {
        let response = ResponseWriter::new().into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.payload().is_empty());
    }

    #[test]
    fn reset_discards_partial_output() {
        let mut w = ResponseWriter::new();
        w.set_header("X-Partial", "1");
        w.write("half a page");
        w.reset();
        assert!(!w.is_written());
        assert!(w.headers().is_empty());
        assert!(w.body().is_empty());
        assert_eq!(w.status_writes(), 0);
    }

    #[test]
    fn into_response_keeps_headers() {
        let mut w = ResponseWriter::new();
        w.set_header("Location", "/blog/");
        w.write_header(StatusCode::MOVED_PERMANENTLY);
        let response = w.into_response();
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers().get("location"), Some("/blog/"));
    }
}
