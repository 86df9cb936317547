use crate::{
    errors::Error,
    http::{
        dictionary::{duplicate, Dictionary, Entries, Field},
        request::{header_line, next_line},
        response::write::{BodyWriter, WriteBuffer},
        types::{write_number, StatusCode},
    },
    limits::RespLimits,
};
use std::{fmt, mem};

const SERVER: &[u8] = concat!("restwire/", env!("CARGO_PKG_VERSION")).as_bytes();

/// An HTTP response: status code, header dictionary and body.
///
/// The header block is rendered by [`write_header`](Self::write_header),
/// which never trusts a `content-length` header set by the caller: the
/// length is computed from the body at serialization time, or left out
/// when a `transfer-encoding` header is present.
///
/// # Examples
/// ```
/// use restwire::{Response, StatusCode};
///
/// let mut resp = Response::new(StatusCode::Ok);
/// resp.set_header(b"Content-Type", b"application/json").unwrap()
///     .append(r#"{"ok":true}"#);
///
/// let mut out = Vec::new();
/// resp.write(&mut out);
///
/// let text = String::from_utf8(out).unwrap();
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(text.contains("\r\ncontent-type: application/json\r\n"));
/// assert!(text.ends_with("\r\ncontent-length: 11\r\n\r\n{\"ok\":true}"));
/// ```
#[derive(Clone)]
pub struct Response {
    code: StatusCode,

    arena: Vec<u8>,
    headers: Dictionary,
    body: Vec<u8>,

    head_size: Option<usize>,
}

impl Response {
    /// Creates a response with the default `server`, `connection` and
    /// `content-type` headers, all of which may be overridden.
    pub fn new(code: StatusCode) -> Self {
        let mut resp = Self::empty(code);
        resp.set_defaults();
        resp
    }

    #[inline]
    fn empty(code: StatusCode) -> Self {
        Self {
            code,
            arena: Vec::new(),
            headers: Dictionary::with_capacity(8),
            body: Vec::new(),
            head_size: None,
        }
    }

    fn set_defaults(&mut self) {
        #[rustfmt::skip]
        let defaults: [(&'static [u8], &'static [u8]); 3] = [
            (b"server",       SERVER),
            (b"connection",   b"keep-alive"),
            (b"content-type", b"text/plain; charset=utf-8"),
        ];

        for (key, value) in defaults {
            self.headers
                .insert(&self.arena, Field::Static(key), Field::Static(value));
        }
    }

    /// Decodes a raw status line and header block, as received by a client.
    ///
    /// The status line is optional. If the first line does not start with
    /// `HTTP/` the code falls back to
    /// [`NotImplemented`](StatusCode::NotImplemented) and the line is read as
    /// a header. Header lines follow the request header rules. Parsing
    /// stops at the first empty line; nothing after it is read.
    ///
    /// ```
    /// use restwire::{Response, StatusCode};
    ///
    /// let resp = Response::from_wire(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n").unwrap();
    /// assert_eq!(resp.code(), StatusCode::NotFound);
    /// assert_eq!(resp.header(b"content-length"), Some(&b"0"[..]));
    ///
    /// let resp = Response::from_wire(b"garbage\r\n").unwrap();
    /// assert_eq!(resp.code(), StatusCode::NotImplemented);
    /// ```
    pub fn from_wire(raw: &[u8]) -> Result<Self, Error> {
        let mut resp = Self::empty(StatusCode::NotImplemented);
        resp.arena = duplicate(raw)?.into_vec();

        let end = resp.arena.len();
        let mut start = 0;
        let mut line_num = 0usize;

        while start < end {
            let (content_end, next) = next_line(&resp.arena, start, end);

            if content_end == start {
                break;
            }

            match line_num == 0 && resp.arena[start..content_end].starts_with(b"HTTP/") {
                true => resp.code = Self::status_line_code(&resp.arena[start..content_end]),
                false => {
                    if line_num == 0 {
                        tracing::debug!(
                            line = %String::from_utf8_lossy(&resp.arena[start..content_end]),
                            "response without status line"
                        );
                    }
                    let (key, value) = header_line(&mut resp.arena, start, content_end);
                    resp.headers.insert(&resp.arena, key, value);
                }
            }

            line_num += 1;
            start = next;
        }

        Ok(resp)
    }

    fn status_line_code(line: &[u8]) -> StatusCode {
        match memchr::memchr(b' ', line) {
            Some(pos) => StatusCode::from_response_string(&line[pos + 1..]),
            None => StatusCode::NotImplemented,
        }
    }

    /// Restores the state of [`new`](Self::new) for the next request of a
    /// connection, keeping the body allocation within `limits`.
    pub(crate) fn reset(&mut self, code: StatusCode, limits: &RespLimits) {
        self.code = code;
        self.arena.clear();
        self.headers.clear();
        limits.recycle(&mut self.body);
        self.head_size = None;

        self.set_defaults();
    }
}

// Public API
impl Response {
    #[inline(always)]
    pub const fn code(&self) -> StatusCode {
        self.code
    }

    #[inline(always)]
    pub fn set_code(&mut self, code: StatusCode) -> &mut Self {
        self.code = code;
        self
    }

    /// Returns the header value with case-insensitive name matching.
    #[inline]
    pub fn header(&self, name: &[u8]) -> Option<&[u8]> {
        self.headers.get(&self.arena, name)
    }

    #[inline]
    pub fn header_str(&self, name: &str) -> Option<&str> {
        simdutf8::basic::from_utf8(self.header(name.as_bytes())?).ok()
    }

    #[inline]
    pub fn headers(&self) -> Entries<'_> {
        self.headers.iter(&self.arena)
    }

    /// Sets a header. The name is trimmed and lowercased; an empty value
    /// removes the header instead.
    ///
    /// ```
    /// use restwire::{Response, StatusCode};
    ///
    /// let mut resp = Response::new(StatusCode::Ok);
    /// resp.set_header(b"Server", b"").unwrap();
    /// assert_eq!(resp.header(b"server"), None);
    /// ```
    #[inline]
    pub fn set_header(&mut self, name: &[u8], value: &[u8]) -> Result<&mut Self, Error> {
        self.headers.set(&self.arena, name, value)?;
        Ok(self)
    }

    #[inline]
    pub fn set_content_type(&mut self, value: &[u8]) -> Result<&mut Self, Error> {
        self.set_header(b"content-type", value)
    }

    #[inline(always)]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    #[inline(always)]
    pub fn body_mut(&mut self) -> &mut Vec<u8> {
        &mut self.body
    }

    /// Appends to the body.
    ///
    /// ```
    /// use restwire::{Response, StatusCode};
    ///
    /// let mut resp = Response::new(StatusCode::Ok);
    /// resp.append("id=").append(42u32).append(&b"; ok="[..]).append(true);
    /// assert_eq!(resp.body(), b"id=42; ok=true");
    /// ```
    #[inline]
    pub fn append<T: WriteBuffer>(&mut self, data: T) -> &mut Self {
        data.write_to(&mut self.body);
        self
    }

    /// Writes to the body through a [`BodyWriter`].
    #[inline]
    pub fn body_with<F: FnOnce(&mut BodyWriter)>(&mut self, f: F) -> &mut Self {
        f(&mut BodyWriter(&mut self.body));
        self
    }

    /// Whether `transfer-encoding` is exactly `chunked`.
    #[inline]
    pub fn is_chunked(&self) -> bool {
        self.headers
            .get_exact(&self.arena, b"transfer-encoding")
            .is_some_and(|value| value == b"chunked")
    }

    /// Marks this as the reply to a `HEAD` request for a resource of
    /// `size` bytes: the header block announces `size` and
    /// [`write`](Self::write) leaves the body out.
    #[inline]
    pub fn head_response(&mut self, size: usize) -> &mut Self {
        self.head_size = Some(size);
        self
    }

    #[inline(always)]
    pub const fn is_head_response(&self) -> bool {
        self.head_size.is_some()
    }

    /// Hands the headers and body over to a new response with the same
    /// code, leaving this one with no headers and an empty body.
    ///
    /// ```
    /// use restwire::{Response, StatusCode};
    ///
    /// let mut resp = Response::new(StatusCode::Created);
    /// resp.append("payload");
    ///
    /// let taken = resp.swap();
    /// assert_eq!(taken.code(), StatusCode::Created);
    /// assert_eq!(taken.body(), b"payload");
    /// assert!(resp.body().is_empty());
    /// assert_eq!(resp.headers().len(), 0);
    /// ```
    pub fn swap(&mut self) -> Response {
        Response {
            code: self.code,
            arena: mem::take(&mut self.arena),
            headers: mem::take(&mut self.headers),
            body: mem::take(&mut self.body),
            head_size: self.head_size.take(),
        }
    }
}

// Serializer
impl Response {
    /// Renders the status line and header block, terminated by a blank line.
    ///
    /// - `content-length` set through the headers is ignored.
    /// - `transfer-encoding: chunked` is written as is and no length follows.
    /// - any other `transfer-encoding` value is echoed and no length follows.
    /// - without `transfer-encoding`, `content-length` is the body length,
    ///   or the size given to [`head_response`](Self::head_response).
    ///
    /// ```
    /// use restwire::{Response, StatusCode};
    ///
    /// let mut resp = Response::new(StatusCode::Ok);
    /// resp.set_header(b"Transfer-Encoding", b"chunked").unwrap().append("data");
    ///
    /// let mut out = Vec::new();
    /// resp.write_header(&mut out);
    /// let text = String::from_utf8(out).unwrap();
    ///
    /// assert!(text.contains("transfer-encoding: chunked\r\n"));
    /// assert!(!text.contains("content-length:"));
    /// ```
    pub fn write_header(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(b"HTTP/1.1 ");
        out.extend_from_slice(self.code.response_string().as_bytes());
        out.extend_from_slice(b"\r\n");

        let mut has_transfer_encoding = false;

        for (key, value) in self.headers() {
            match key {
                b"content-length" => continue,
                b"transfer-encoding" if value == b"chunked" => {
                    has_transfer_encoding = true;
                    out.extend_from_slice(b"transfer-encoding: chunked\r\n");
                    continue;
                }
                b"transfer-encoding" => has_transfer_encoding = true,
                _ => {}
            }

            out.extend_from_slice(key);
            out.extend_from_slice(b": ");
            out.extend_from_slice(value);
            out.extend_from_slice(b"\r\n");
        }

        if !has_transfer_encoding {
            out.extend_from_slice(b"content-length: ");
            write_number(self.head_size.unwrap_or(self.body.len()), out);
            out.extend_from_slice(b"\r\n");
        }

        out.extend_from_slice(b"\r\n");
    }

    /// Renders the header block followed by the body.
    ///
    /// The body is left out for [`head_response`](Self::head_response)s.
    pub fn write(&self, out: &mut Vec<u8>) {
        self.write_header(out);

        if self.head_size.is_none() {
            out.extend_from_slice(&self.body);
        }
    }
}

impl Default for Response {
    #[inline]
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("code", &self.code)
            .field("headers", &self.headers())
            .field("body_len", &self.body.len())
            .field("head_size", &self.head_size)
            .finish()
    }
}

pub mod write {
    use std::{borrow::Cow, rc::Rc, sync::Arc};

    /// Writer for constructing the response body.
    /// Used in [body_with](super::Response::body_with).
    ///
    /// With [WriteBuffer]:
    /// ```
    /// use restwire::{Response, StatusCode};
    ///
    /// let mut resp = Response::new(StatusCode::Ok);
    /// resp.body_with(|w| {
    ///     w.write("<html>");
    ///     w.write(404u16);
    ///     w.write('!');
    /// });
    /// assert_eq!(resp.body(), b"<html>404!");
    /// ```
    /// With [std::io::Write]:
    /// ```
    /// use restwire::{Response, StatusCode};
    /// use std::io::Write;
    ///
    /// let mut resp = Response::new(StatusCode::Ok);
    /// resp.body_with(|w| {
    ///     let _ = write!(w, "{} - {} = {}", 6, 2, 4);
    /// });
    /// assert_eq!(resp.body(), b"6 - 2 = 4");
    /// ```
    #[derive(Debug)]
    pub struct BodyWriter<'a>(pub(crate) &'a mut Vec<u8>);

    impl BodyWriter<'_> {
        /// Appends content to the response body.
        #[inline]
        pub fn write<T: WriteBuffer>(&mut self, value: T) {
            value.write_to(self.0);
        }
    }

    impl std::io::Write for BodyWriter<'_> {
        #[inline]
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        #[inline]
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Trait for writing values into a response body.
    ///
    /// Implemented for strings, bytes, booleans, chars and integers.
    /// Floating-point numbers are left out; format them explicitly.
    ///
    /// # Example
    /// ```
    /// use restwire::WriteBuffer;
    ///
    /// struct Csv<'a>(&'a [&'a str]);
    ///
    /// impl WriteBuffer for Csv<'_> {
    ///     fn write_to(&self, buffer: &mut Vec<u8>) {
    ///         for (i, field) in self.0.iter().enumerate() {
    ///             if i > 0 {
    ///                 buffer.push(b',');
    ///             }
    ///             buffer.extend_from_slice(field.as_bytes());
    ///         }
    ///     }
    /// }
    ///
    /// let mut out = Vec::new();
    /// Csv(&["a", "b"]).write_to(&mut out);
    /// assert_eq!(out, b"a,b");
    /// ```
    pub trait WriteBuffer {
        /// Writes the value's representation directly to the buffer.
        fn write_to(&self, buffer: &mut Vec<u8>);
    }

    macro_rules! impl_write_buffer {
        (bytes, $conn:expr => $($t:ty),*) => {
            $(impl WriteBuffer for $t {
                #[inline] fn write_to(&self, buffer: &mut Vec<u8>) {
                    let closure = $conn;
                    closure(self, buffer);
                }
            })*
        };
        (number($type:ty), $conn:expr => $($t:ty),*) => {
            $(impl WriteBuffer for $t {
                #[inline] fn write_to(&self, buffer: &mut Vec<u8>) {
                    $conn(*self as $type, buffer);
                }
            })*
        };
    }

    impl<T: WriteBuffer + ?Sized> WriteBuffer for &T {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            T::write_to(*self, buffer);
        }
    }
    impl_write_buffer! {
        bytes, |value: &str, buffer: &mut Vec<u8>| {
            buffer.extend_from_slice(value.as_bytes());
        } => str, String, Box<str>, Cow<'_, str>, Arc<str>, Rc<str>
    }
    impl_write_buffer! {
        bytes, |value: &[u8], buffer: &mut Vec<u8>| {
            buffer.extend_from_slice(value);
        } => [u8], Vec<u8>, Box<[u8]>, Cow<'_, [u8]>, Arc<[u8]>, Rc<[u8]>
    }
    impl<const N: usize> WriteBuffer for [u8; N] {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            buffer.extend_from_slice(self);
        }
    }
    impl_write_buffer! {
        number(u128), write_unsigned => u8, u16, u32, u64, u128, usize
    }
    impl_write_buffer! {
        number(i128), write_signed => i8, i16, i32, i64, i128, isize
    }
    impl WriteBuffer for bool {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            buffer.extend_from_slice(match self {
                true => b"true",
                false => b"false",
            });
        }
    }
    impl WriteBuffer for char {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            let mut buf = [0u8; 4];
            buffer.extend_from_slice(self.encode_utf8(&mut buf).as_bytes());
        }
    }

    #[inline(always)]
    fn write_unsigned(value: u128, buffer: &mut Vec<u8>) {
        let (arr, start) = crate::http::types::number_to_bytes(value);
        buffer.extend_from_slice(&arr[start..]);
    }

    #[inline(always)]
    fn write_signed(value: i128, buffer: &mut Vec<u8>) {
        if value < 0 {
            buffer.push(b'-');
        }
        write_unsigned(value.unsigned_abs(), buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::*;

    fn header_block(resp: &Response) -> String {
        let mut out = Vec::new();
        resp.write_header(&mut out);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn defaults() {
        let resp = Response::new(StatusCode::Ok);

        assert_eq!(
            header_block(&resp),
            concat!(
                "HTTP/1.1 200 OK\r\n",
                "server: restwire/", env!("CARGO_PKG_VERSION"), "\r\n",
                "connection: keep-alive\r\n",
                "content-type: text/plain; charset=utf-8\r\n",
                "content-length: 0\r\n",
                "\r\n",
            )
        );
    }

    #[test]
    fn set_header_case_insensitive() {
        let mut resp = Response::new(StatusCode::Ok);

        for (name, value) in [("X-Trace", "a"), ("ETAG", "\"v1\""), (" Vary ", "Accept")] {
            resp.set_header(name.as_bytes(), value.as_bytes()).unwrap();
            let lower = name.trim().to_ascii_lowercase();
            assert_eq!(resp.header_str(&lower), Some(value));
            assert_eq!(resp.header_str(name.trim()), Some(value));
        }
    }

    #[test]
    fn empty_value_erases() {
        let mut resp = Response::new(StatusCode::Ok);
        resp.set_header(b"X-Gone", b"soon").unwrap();
        resp.set_header(b"x-gone", b"").unwrap();
        resp.set_header(b"Content-Type", b"").unwrap();

        assert_eq!(resp.header(b"x-gone"), None);
        assert_eq!(resp.header(b"content-type"), None);
        assert!(!header_block(&resp).contains("content-type"));
    }

    #[test]
    fn chunked_omits_length() {
        let mut resp = Response::new(StatusCode::Ok);
        resp.set_header(b"Transfer-Encoding", b"chunked").unwrap();
        resp.append(&[b'x'; 100][..]);

        let block = header_block(&resp);
        assert!(resp.is_chunked());
        assert!(block.contains("\r\ntransfer-encoding: chunked\r\n"));
        assert!(!block.contains("content-length:"));
    }

    #[test]
    fn other_transfer_encoding_is_echoed() {
        let mut resp = Response::new(StatusCode::Ok);
        resp.set_header(b"transfer-encoding", b"gzip, chunked").unwrap();
        resp.append("abc");

        let block = header_block(&resp);
        assert!(!resp.is_chunked());
        assert!(block.contains("\r\ntransfer-encoding: gzip, chunked\r\n"));
        assert!(!block.contains("content-length:"));
    }

    #[test]
    fn length_from_live_body() {
        let mut resp = Response::new(StatusCode::Ok);
        resp.set_header(b"Content-Length", b"7").unwrap();
        resp.append(&[b'a'; 42][..]);

        let block = header_block(&resp);
        assert!(block.contains("\r\ncontent-length: 42\r\n"));
        assert!(!block.contains("content-length: 7"));
        assert_eq!(block.matches("content-length").count(), 1);

        resp.body_mut().truncate(5);
        assert!(header_block(&resp).contains("\r\ncontent-length: 5\r\n"));
    }

    #[test]
    fn head_response() {
        let mut resp = Response::new(StatusCode::Ok);
        resp.append("ignored").head_response(1234);

        let mut out = Vec::new();
        resp.write(&mut out);
        let text = str_op(&out);

        assert!(resp.is_head_response());
        assert!(text.contains("content-length: 1234\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn write_appends_body() {
        let mut resp = Response::new(StatusCode::NotFound);
        resp.set_content_type(b"text/html").unwrap().append("<h1>no</h1>");

        let mut out = Vec::new();
        resp.write(&mut out);
        let text = str_op(&out);

        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.contains("content-type: text/html\r\n"));
        assert!(text.ends_with("\r\ncontent-length: 11\r\n\r\n<h1>no</h1>"));
    }

    #[test]
    fn from_wire() {
        #[rustfmt::skip]
        let cases = [
            (
                "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nX-A:  b \r\n\r\nbody",
                StatusCode::Ok,
                vec![("content-type", "text/plain"), ("x-a", "b")],
            ),
            (
                "HTTP/1.0 503 Service Unavailable\r\n",
                StatusCode::ServiceUnavailable,
                vec![],
            ),
            (
                "HTTP/1.1 299 Custom\r\n\r\n",
                StatusCode::NotImplemented,
                vec![],
            ),
            (
                "HTTP/1.1\r\n\r\n",
                StatusCode::NotImplemented,
                vec![],
            ),
            (
                "Server: nope\r\nETag: 1\r\n\r\n",
                StatusCode::NotImplemented,
                vec![("server", "nope"), ("etag", "1")],
            ),
            (
                "HTTP/1.1 204 No Content\nNoColon\n\n",
                StatusCode::NoContent,
                vec![("nocolon", "")],
            ),
            (
                "",
                StatusCode::NotImplemented,
                vec![],
            ),
        ];

        for (raw, code, headers) in cases {
            let resp = Response::from_wire(raw.as_bytes()).unwrap();
            assert_eq!(resp.code(), code, "raw: {raw:?}");
            assert_eq!(resp.headers().map(str_2).collect::<Vec<_>>(), headers, "raw: {raw:?}");
            assert!(resp.body().is_empty());
        }
    }

    #[test]
    fn swap() {
        let mut resp = Response::from_wire(b"HTTP/1.1 201 Created\r\nLocation: /x\r\n\r\n").unwrap();
        resp.append("made");

        let taken = resp.swap();
        assert_eq!(taken.code(), StatusCode::Created);
        assert_eq!(taken.header_str("location"), Some("/x"));
        assert_eq!(taken.body(), b"made");

        assert_eq!(resp.code(), StatusCode::Created);
        assert_eq!(resp.header(b"location"), None);
        assert!(resp.body().is_empty());
    }

    #[test]
    fn reset() {
        let limits = RespLimits::default();
        let mut resp = Response::new(StatusCode::Ok);
        resp.set_header(b"connection", b"close").unwrap();
        resp.set_header(b"x-extra", b"1").unwrap();
        resp.append("old").head_response(3);

        resp.reset(StatusCode::Accepted, &limits);

        assert_eq!(resp.code(), StatusCode::Accepted);
        assert_eq!(resp.header_str("connection"), Some("keep-alive"));
        assert_eq!(resp.header(b"x-extra"), None);
        assert!(resp.body().is_empty());
        assert!(!resp.is_head_response());
    }

    #[test]
    fn write_buffer() {
        let mut resp = Response::new(StatusCode::Ok);
        resp.append("s")
            .append(String::from("S"))
            .append(&b"b"[..])
            .append(*b"B")
            .append(vec![b'v'])
            .append(0u8)
            .append(-12i64)
            .append(u128::MAX)
            .append(false)
            .append('ж');

        assert_eq!(
            str_op(resp.body()),
            "sSbBv0-12340282366920938463463374607431768211455falseж"
        );
    }
}
