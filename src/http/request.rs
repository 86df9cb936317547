use crate::{
    errors::Error,
    http::{
        dictionary::{duplicate, Dictionary, Entries, Field, Span},
        query::Query,
        types::{skip_spaces, slice_to_usize, to_lower_case, trim, trim_end, write_number},
    },
    RequestType, Version,
};
use memchr::memchr;
use std::{
    fmt,
    net::{IpAddr, Ipv4Addr, SocketAddr},
};

/// One decoded HTTP request.
///
/// The request owns a copy of the raw head (the arena) and tokenizes it in
/// place: the method token and header names are lowercased inside the
/// arena, the query string is percent-decoded over itself, and headers,
/// query parameters and the path are stored as spans into it. Values set
/// later through the setters are owned copies.
///
/// # Wire format
///
/// ```text
/// <METHOD> SP <PATH>[?<QUERY>] SP HTTP/<VERSION> CRLF
/// <NAME>: <VALUE> CRLF
/// ...
/// CRLF
/// ```
///
/// Bare `LF` line endings are accepted as well.
///
/// #### Method
///
/// `GET`, `POST`, `PUT` and `DELETE` are recognized, in any letter case.
/// Any other token yields [`RequestType::Illegal`] and the rest of the
/// request line is ignored: no path, no query parameters. Rejecting such
/// requests is left to the caller.
///
/// #### Path
///
/// The path is **not** percent-decoded, `/a%2fb` and `/a/b` stay distinct:
///
/// ```
/// use restwire::{Request, RequestType};
///
/// let req = Request::from_bytes(b"GET /a%2fb?x=1&name=John%20Doe HTTP/1.1\r\n\r\n").unwrap();
///
/// assert_eq!(req.request_type(), RequestType::Get);
/// assert_eq!(req.path(), b"/a%2fb");
/// assert_eq!(req.value(b"x"), Some(&b"1"[..]));
/// assert_eq!(req.value(b"name"), Some(&b"John Doe"[..]));
/// ```
///
/// #### Headers
///
/// Names are case-folded, values are kept as sent minus surrounding
/// spaces. A line without a colon becomes a name with an empty value.
/// Parsing never fails: malformed input degrades into an illegal request
/// type or odd header entries.
///
/// ```
/// use restwire::Request;
///
/// let req = Request::from_bytes(b"POST /x HTTP/1.1\r\nX-Token:  abc  \r\nstray\r\n\r\n").unwrap();
///
/// assert_eq!(req.header(b"x-token"), Some(&b"abc"[..]));
/// assert_eq!(req.header(b"X-TOKEN"), Some(&b"abc"[..]));
/// assert_eq!(req.header(b"stray"), Some(&b""[..]));
/// ```
#[derive(Clone)]
pub struct Request {
    request_type: RequestType,
    version: Version,
    path: Field,
    suffixes: Vec<String>,

    arena: Vec<u8>,
    headers: Dictionary,
    values: Dictionary,

    body: Vec<u8>,

    pub(crate) client_addr: SocketAddr,
    pub(crate) server_addr: SocketAddr,
}

impl Default for Request {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Request {
    const UNKNOWN_CLIENT: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0);
    const DEFAULT_SERVER: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);

    /// Creates an empty request of type [`Illegal`](RequestType::Illegal),
    /// to be filled through the setters.
    #[inline]
    pub fn new() -> Self {
        Request {
            request_type: RequestType::Illegal,
            version: Version::Http11,
            path: Field::EMPTY,
            suffixes: Vec::new(),

            arena: Vec::new(),
            headers: Dictionary::default(),
            values: Dictionary::default(),

            body: Vec::new(),

            client_addr: Self::UNKNOWN_CLIENT,
            server_addr: Self::DEFAULT_SERVER,
        }
    }

    /// Parses a request head from a copy of `head`.
    ///
    /// Fails only if the copy cannot be allocated.
    pub fn from_bytes(head: &[u8]) -> Result<Self, Error> {
        let mut request = Self::new();
        request.arena = duplicate(head)?.into_vec();
        request.parse_head();

        Ok(request)
    }

    /// Parses a request head, taking ownership of the buffer.
    pub fn from_vec(head: Vec<u8>) -> Self {
        let mut request = Self::new();
        request.arena = head;
        request.parse_head();

        request
    }

    /// Reparses this request from `head`, reusing its allocations.
    pub(crate) fn parse_from(&mut self, head: &[u8]) -> Result<(), Error> {
        self.reset();
        self.arena
            .try_reserve(head.len())
            .map_err(|_| Error::OutOfMemory(head.len()))?;
        self.arena.extend_from_slice(head);
        self.parse_head();

        Ok(())
    }

    #[inline]
    pub(crate) fn reset(&mut self) {
        self.request_type = RequestType::Illegal;
        self.version = Version::Http11;
        self.path = Field::EMPTY;
        self.suffixes.clear();

        self.arena.clear();
        self.headers.clear();
        self.values.clear();

        self.body.clear();
    }
}

// Parser
impl Request {
    fn parse_head(&mut self) {
        let end = self.arena.len();
        let mut start = 0;
        let mut line_num = 0usize;

        while start < end {
            let (content_end, next) = next_line(&self.arena, start, end);

            if line_num == 0 {
                self.parse_first_line(start, content_end);
            } else if content_end == start {
                break;
            } else {
                self.parse_header_line(start, content_end);
            }

            line_num += 1;
            start = next;
        }
    }

    fn parse_first_line(&mut self, start: usize, end: usize) {
        let method_end = self.arena[start..end]
            .iter()
            .position(|&byte| byte == b' ' || byte == b'\t')
            .map_or(end, |pos| start + pos);

        to_lower_case(&mut self.arena[start..method_end]);
        self.request_type = RequestType::from_bytes(&self.arena[start..method_end]);

        if self.request_type == RequestType::Illegal {
            tracing::debug!(
                method = %String::from_utf8_lossy(&self.arena[start..method_end]),
                "illegal request type"
            );
            return;
        }
        if method_end == end || self.arena[method_end] != b' ' {
            return;
        }

        let path_start = skip_spaces(&self.arena, method_end, end);
        let token_end = memchr(b' ', &self.arena[path_start..end]).map_or(end, |pos| path_start + pos);

        match memchr(b'?', &self.arena[path_start..token_end]) {
            Some(pos) => {
                let mark = path_start + pos;
                self.path = Field::Span(Span::new(path_start, mark));
                self.decode_values(mark + 1, token_end);
            }
            None => self.path = Field::Span(Span::new(path_start, token_end)),
        }

        let version_start = skip_spaces(&self.arena, token_end, end);
        let version_end = trim_end(&self.arena, version_start, end);
        self.version = Version::from_bytes(&self.arena[version_start..version_end]);
    }

    fn parse_header_line(&mut self, start: usize, end: usize) {
        let (key, value) = header_line(&mut self.arena, start, end);
        self.headers.insert(&self.arena, key, value);
    }

    fn decode_values(&mut self, start: usize, end: usize) {
        let mut pairs = Vec::new();
        Query::decode(&mut self.arena, start..end, &mut pairs);

        for (key, value) in pairs {
            self.values
                .insert(&self.arena, Field::Span(key), Field::Span(value));
        }
    }
}

/// Finds the line starting at `start`.
///
/// Returns the end of its content, without `\n` or `\r\n`, and the start
/// of the next line.
#[inline]
pub(crate) fn next_line(arena: &[u8], start: usize, end: usize) -> (usize, usize) {
    let (line_end, next) = match memchr(b'\n', &arena[start..end]) {
        Some(pos) => (start + pos, start + pos + 1),
        None => (end, end),
    };

    match line_end > start && arena[line_end - 1] == b'\r' {
        true => (line_end - 1, next),
        false => (line_end, next),
    }
}

/// Splits one header line at its first colon, lowercasing the name in place.
///
/// Both sides are trimmed of spaces. A line without a colon is all name.
pub(crate) fn header_line(arena: &mut [u8], start: usize, end: usize) -> (Field, Field) {
    match memchr(b':', &arena[start..end]) {
        Some(pos) => {
            let colon = start + pos;
            to_lower_case(&mut arena[start..colon]);

            let key_end = trim_end(arena, start, colon);
            let value_start = skip_spaces(arena, colon + 1, end);
            let value_end = trim_end(arena, value_start, end);

            (
                Field::Span(Span::new(start, key_end)),
                Field::Span(Span::new(value_start, value_end)),
            )
        }
        None => {
            to_lower_case(&mut arena[start..end]);
            (Field::Span(Span::new(start, end)), Field::EMPTY)
        }
    }
}

// Public API
impl Request {
    #[inline(always)]
    pub const fn request_type(&self) -> RequestType {
        self.request_type
    }

    #[inline(always)]
    pub const fn version(&self) -> Version {
        self.version
    }

    /// Raw request path, without the query string and not percent-decoded.
    #[inline(always)]
    pub fn path(&self) -> &[u8] {
        self.path.bytes(&self.arena)
    }

    /// [`path`](Self::path) as `&str`, if it is valid UTF-8.
    #[inline]
    pub fn path_str(&self) -> Option<&str> {
        simdutf8::basic::from_utf8(self.path()).ok()
    }

    /// Path segments assigned by the routing layer.
    #[inline(always)]
    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    /// Returns the header value with case-insensitive name matching.
    #[inline]
    pub fn header(&self, name: &[u8]) -> Option<&[u8]> {
        self.headers.get(&self.arena, name)
    }

    /// [`header`](Self::header) as `&str`, if the value is valid UTF-8.
    #[inline]
    pub fn header_str(&self, name: &str) -> Option<&str> {
        simdutf8::basic::from_utf8(self.header(name.as_bytes())?).ok()
    }

    /// All headers in the order they were first seen.
    #[inline]
    pub fn headers(&self) -> Entries<'_> {
        self.headers.iter(&self.arena)
    }

    /// Returns a decoded query parameter. Names are case-sensitive.
    #[inline]
    pub fn value(&self, name: &[u8]) -> Option<&[u8]> {
        self.values.get_exact(&self.arena, name)
    }

    /// [`value`](Self::value) as `&str`, if the value is valid UTF-8.
    #[inline]
    pub fn value_str(&self, name: &str) -> Option<&str> {
        simdutf8::basic::from_utf8(self.value(name.as_bytes())?).ok()
    }

    /// All decoded query parameters in the order they were first seen.
    #[inline]
    pub fn values(&self) -> Entries<'_> {
        self.values.iter(&self.arena)
    }

    #[inline(always)]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Value of the `content-length` header, if present and numeric.
    #[inline]
    pub fn content_length(&self) -> Option<usize> {
        slice_to_usize(trim(self.headers.get_exact(&self.arena, b"content-length")?))
    }

    /// Whether the connection should stay open after this request.
    ///
    /// An explicit `connection` header wins; otherwise HTTP/1.1 keeps the
    /// connection alive and HTTP/1.0 closes it.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get_exact(&self.arena, b"connection") {
            Some(value) if value.eq_ignore_ascii_case(b"close") => false,
            Some(value) if value.eq_ignore_ascii_case(b"keep-alive") => true,
            _ => self.version == Version::Http11,
        }
    }

    #[inline(always)]
    pub const fn client_addr(&self) -> &SocketAddr {
        &self.client_addr
    }

    #[inline(always)]
    pub const fn server_addr(&self) -> &SocketAddr {
        &self.server_addr
    }
}

// Setters
impl Request {
    #[inline(always)]
    pub fn set_request_type(&mut self, request_type: RequestType) -> &mut Self {
        self.request_type = request_type;
        self
    }

    #[inline(always)]
    pub fn set_version(&mut self, version: Version) -> &mut Self {
        self.version = version;
        self
    }

    /// Replaces the path with an owned copy of `path`, stored verbatim.
    pub fn set_path(&mut self, path: &[u8]) -> Result<&mut Self, Error> {
        self.path = Field::owned(path)?;
        Ok(self)
    }

    /// Sets a header. The name is trimmed and lowercased; an empty value
    /// removes the header instead.
    ///
    /// ```
    /// use restwire::Request;
    ///
    /// let mut req = Request::new();
    /// req.set_header(b"X-Request-Id", b"42").unwrap();
    /// assert_eq!(req.header(b"x-request-id"), Some(&b"42"[..]));
    ///
    /// req.set_header(b"x-request-id", b"").unwrap();
    /// assert_eq!(req.header(b"x-request-id"), None);
    /// ```
    pub fn set_header(&mut self, name: &[u8], value: &[u8]) -> Result<&mut Self, Error> {
        self.headers.set(&self.arena, name, value)?;
        Ok(self)
    }

    /// Decodes a raw query string (`a=1&b=x%20y`) into the parameters.
    ///
    /// Parameters already present with the same name are overwritten.
    pub fn set_values(&mut self, query: &[u8]) -> Result<&mut Self, Error> {
        let start = self.arena.len();
        self.arena
            .try_reserve(query.len())
            .map_err(|_| Error::OutOfMemory(query.len()))?;
        self.arena.extend_from_slice(query);

        let end = self.arena.len();
        self.decode_values(start, end);

        Ok(self)
    }

    #[inline]
    pub fn set_body(&mut self, body: Vec<u8>) -> &mut Self {
        self.body = body;
        self
    }

    #[inline]
    pub fn add_suffix(&mut self, suffix: impl Into<String>) -> &mut Self {
        self.suffixes.push(suffix.into());
        self
    }

    #[inline(always)]
    pub(crate) fn body_mut(&mut self) -> &mut Vec<u8> {
        &mut self.body
    }

    #[inline(always)]
    pub(crate) fn set_connection_info(&mut self, client: SocketAddr, server: SocketAddr) {
        self.client_addr = client;
        self.server_addr = server;
    }
}

// Serializer
impl Request {
    /// Renders the request in wire format.
    ///
    /// Query parameters are percent-encoded, `content-length` is always
    /// computed from the body.
    ///
    /// ```
    /// use restwire::{Request, RequestType};
    ///
    /// let mut req = Request::new();
    /// req.set_request_type(RequestType::Post)
    ///     .set_path(b"/api/users").unwrap()
    ///     .set_values(b"q=a%20b").unwrap()
    ///     .set_header(b"Host", b"example.com").unwrap()
    ///     .set_body(b"{}".to_vec());
    ///
    /// let mut out = Vec::new();
    /// req.write(&mut out);
    ///
    /// assert_eq!(
    ///     out,
    ///     b"POST /api/users?q=a%20b HTTP/1.1\r\nhost: example.com\r\ncontent-length: 2\r\n\r\n{}"
    /// );
    /// ```
    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.request_type.as_str().as_bytes());
        out.push(b' ');
        out.extend_from_slice(self.path());

        for (i, (key, value)) in self.values().enumerate() {
            out.push(if i == 0 { b'?' } else { b'&' });
            Query::encode(key, out);
            out.push(b'=');
            Query::encode(value, out);
        }

        out.push(b' ');
        out.extend_from_slice(self.version.as_str().as_bytes());
        out.extend_from_slice(b"\r\n");

        for (key, value) in self.headers() {
            if key == b"content-length" {
                continue;
            }
            out.extend_from_slice(key);
            out.extend_from_slice(b": ");
            out.extend_from_slice(value);
            out.extend_from_slice(b"\r\n");
        }

        out.extend_from_slice(b"content-length: ");
        write_number(self.body.len(), out);
        out.extend_from_slice(b"\r\n\r\n");
        out.extend_from_slice(&self.body);
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("request_type", &self.request_type)
            .field("version", &self.version)
            .field("path", &String::from_utf8_lossy(self.path()))
            .field("suffixes", &self.suffixes)
            .field("headers", &self.headers())
            .field("values", &self.values())
            .field("body_len", &self.body.len())
            .field("client_addr", &self.client_addr)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::*;

    fn parse(head: &str) -> Request {
        Request::from_bytes(head.as_bytes()).unwrap()
    }

    fn collect(entries: Entries<'_>) -> Vec<(&str, &str)> {
        entries.map(str_2).collect()
    }

    #[test]
    fn parse_request_type() {
        #[rustfmt::skip]
        let cases = [
            ("GET / HTTP/1.1\r\n\r\n",     RequestType::Get),
            ("get / HTTP/1.1\r\n\r\n",     RequestType::Get),
            ("Post / HTTP/1.1\r\n\r\n",    RequestType::Post),
            ("PUT / HTTP/1.1\r\n\r\n",     RequestType::Put),
            ("DELETE / HTTP/1.1\r\n\r\n",  RequestType::Delete),
            ("HEAD / HTTP/1.1\r\n\r\n",    RequestType::Illegal),
            ("PATCH / HTTP/1.1\r\n\r\n",   RequestType::Illegal),
            ("GETT / HTTP/1.1\r\n\r\n",    RequestType::Illegal),
            (" GET / HTTP/1.1\r\n\r\n",    RequestType::Illegal),
            ("GET",                        RequestType::Get),
            ("",                           RequestType::Illegal),
        ];

        for (head, expected) in cases {
            assert_eq!(parse(head).request_type(), expected, "head: {head:?}");
        }
    }

    #[test]
    fn path_is_not_decoded() {
        let req = parse("GET /a%2fb?x=1 HTTP/1.1\r\n\r\n");

        assert_eq!(req.path(), b"/a%2fb");
        assert_eq!(str(req.value(b"x")), Some("1"));
        assert_eq!(req.version(), Version::Http11);
    }

    #[test]
    fn illegal_skips_path_and_query() {
        let req = parse("FOO /x?y=1 HTTP/1.1\r\n\r\n");

        assert_eq!(req.request_type(), RequestType::Illegal);
        assert_eq!(req.path(), b"");
        assert_eq!(req.values().len(), 0);
    }

    #[test]
    fn parse_path() {
        #[rustfmt::skip]
        let cases = [
            ("GET / HTTP/1.1\r\n",            "/",       vec![]),
            ("GET /api/users HTTP/1.1\r\n",   "/api/users", vec![]),
            ("GET    /spaced HTTP/1.1\r\n",   "/spaced", vec![]),
            ("GET /rest",                     "/rest",   vec![]),
            ("GET /rest\r\n",                 "/rest",   vec![]),
            ("GET /q?a=1&b=%41 HTTP/1.1\r\n", "/q",      vec![("a", "1"), ("b", "A")]),
            ("GET /q? HTTP/1.1\r\n",          "/q",      vec![]),
            ("GET ?only=1 HTTP/1.1\r\n",      "",        vec![("only", "1")]),
            ("DELETE /x?flag HTTP/1.1\r\n",   "/x",      vec![("flag", "")]),
            ("GET /e?k=w&=v HTTP/1.1\r\n",    "/e",      vec![("k", "w"), ("", "v")]),
            ("GET /e?=v HTTP/1.1\r\n",        "/e",      vec![("", "v")]),
            ("GET\t/tab HTTP/1.1\r\n",        "",        vec![]),
        ];

        for (head, path, values) in cases {
            let req = parse(head);
            assert_eq!(str_op(req.path()), path, "head: {head:?}");
            assert_eq!(collect(req.values()), values, "head: {head:?}");
        }
    }

    #[test]
    fn parse_version() {
        #[rustfmt::skip]
        let cases = [
            ("GET / HTTP/1.0\r\n\r\n",   Version::Http10),
            ("GET / http/1.0 \r\n\r\n",  Version::Http10),
            ("GET / HTTP/1.1\r\n\r\n",   Version::Http11),
            ("GET /\r\n\r\n",            Version::Http11),
            ("GET / HTTP/2\r\n\r\n",     Version::Http11),
        ];

        for (head, expected) in cases {
            assert_eq!(parse(head).version(), expected, "head: {head:?}");
        }
    }

    #[test]
    fn parse_headers() {
        #[rustfmt::skip]
        let cases = [
            (
                "GET / HTTP/1.1\r\nHost: localhost\r\nUser-Agent: curl\r\n\r\n",
                vec![("host", "localhost"), ("user-agent", "curl")],
            ),
            (
                "GET / HTTP/1.1\r\nX-Mixed:   Keep CASE  \r\n\r\n",
                vec![("x-mixed", "Keep CASE")],
            ),
            (
                "GET / HTTP/1.1\r\nX-Key   : v\r\n\r\n",
                vec![("x-key", "v")],
            ),
            (
                "GET / HTTP/1.1\r\nX-Empty:\r\nX-Space:   \r\n\r\n",
                vec![("x-empty", ""), ("x-space", "")],
            ),
            (
                "GET / HTTP/1.1\r\nNoColon\r\n\r\n",
                vec![("nocolon", "")],
            ),
            (
                "GET / HTTP/1.1\r\nurl: http://a:8080/\r\n\r\n",
                vec![("url", "http://a:8080/")],
            ),
            (
                "GET / HTTP/1.1\nHost: lf-only\n\nbody: ignored",
                vec![("host", "lf-only")],
            ),
            (
                "GET / HTTP/1.1\r\nA: 1\r\na: 2\r\n\r\n",
                vec![("a", "2")],
            ),
            (
                "FOO / HTTP/1.1\r\nHost: still-parsed\r\n\r\n",
                vec![("host", "still-parsed")],
            ),
            (
                "GET / HTTP/1.1\r\nTruncated: val",
                vec![("truncated", "val")],
            ),
        ];

        for (head, expected) in cases {
            let req = parse(head);
            assert_eq!(collect(req.headers()), expected, "head: {head:?}");
        }
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let req = parse("GET / HTTP/1.1\r\nContent-Type: Text/HTML\r\n\r\n");

        for name in ["content-type", "Content-Type", "CONTENT-TYPE"] {
            assert_eq!(req.header_str(name), Some("Text/HTML"));
        }
        assert_eq!(req.header(b"content"), None);
    }

    #[test]
    fn set_header_round_trip() {
        let mut req = Request::new();

        for (name, value) in [("X-A", "1"), ("x-b", "2"), ("  X-C-D ", "three")] {
            req.set_header(name.as_bytes(), value.as_bytes()).unwrap();
            let lower = name.trim().to_ascii_lowercase();
            assert_eq!(req.header_str(&lower), Some(value));
        }

        req.set_header(b"X-A", b"").unwrap();
        assert_eq!(req.header(b"x-a"), None);
        assert_eq!(req.headers().len(), 2);
    }

    #[test]
    fn set_header_over_parsed() {
        let mut req = parse("GET / HTTP/1.1\r\nHost: old\r\nAccept: */*\r\n\r\n");

        req.set_header(b"HOST", b"new").unwrap();
        assert_eq!(collect(req.headers()), vec![("host", "new"), ("accept", "*/*")]);

        req.set_header(b"accept", b"").unwrap();
        assert_eq!(collect(req.headers()), vec![("host", "new")]);
    }

    #[test]
    fn set_values() {
        let mut req = parse("GET /s?a=1 HTTP/1.1\r\nHost: h\r\n\r\n");

        req.set_values(b"b=x+y&a=%32").unwrap();
        assert_eq!(collect(req.values()), vec![("a", "2"), ("b", "x y")]);
        assert_eq!(req.header_str("host"), Some("h"));
        assert_eq!(req.path(), b"/s");
    }

    #[test]
    fn semantic_headers() {
        #[rustfmt::skip]
        let cases = [
            ("GET / HTTP/1.1\r\n\r\n",                          None,     true),
            ("GET / HTTP/1.0\r\n\r\n",                          None,     false),
            ("GET / HTTP/1.0\r\nConnection: Keep-Alive\r\n\r\n", None,    true),
            ("GET / HTTP/1.1\r\nConnection: close\r\n\r\n",     None,     false),
            ("POST / HTTP/1.1\r\nContent-Length: 12\r\n\r\n",   Some(12), true),
            ("POST / HTTP/1.1\r\nContent-Length: x\r\n\r\n",    None,     true),
        ];

        for (head, length, keep_alive) in cases {
            let req = parse(head);
            assert_eq!(req.content_length(), length, "head: {head:?}");
            assert_eq!(req.is_keep_alive(), keep_alive, "head: {head:?}");
        }
    }

    #[test]
    fn reparse_resets() {
        let mut req = parse("POST /first?a=1 HTTP/1.0\r\nX: y\r\n\r\n");
        req.add_suffix("first").set_body(b"data".to_vec());

        req.parse_from(b"GET /second HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.request_type(), RequestType::Get);
        assert_eq!(req.path(), b"/second");
        assert_eq!(req.version(), Version::Http11);
        assert_eq!(req.headers().len(), 0);
        assert_eq!(req.values().len(), 0);
        assert!(req.suffixes().is_empty());
        assert!(req.body().is_empty());
    }

    #[test]
    fn from_vec_matches_from_bytes() {
        let head = "PUT /v?k=v HTTP/1.1\r\nHost: h\r\n\r\n";
        let a = parse(head);
        let b = Request::from_vec(head.as_bytes().to_vec());

        assert_eq!(a.request_type(), b.request_type());
        assert_eq!(a.path(), b.path());
        assert_eq!(collect(a.headers()), collect(b.headers()));
        assert_eq!(collect(a.values()), collect(b.values()));
    }

    #[test]
    fn write() {
        let mut req = parse("PUT /item?name=a%20b&x HTTP/1.1\r\nHost: h\r\nContent-Length: 99\r\n\r\n");
        req.set_body(b"hello".to_vec());

        let mut out = Vec::new();
        req.write(&mut out);

        assert_eq!(
            str_op(&out),
            "PUT /item?name=a%20b&x= HTTP/1.1\r\nhost: h\r\ncontent-length: 5\r\n\r\nhello"
        );

        let again = Request::from_bytes(&out).unwrap();
        assert_eq!(again.value_str("name"), Some("a b"));
        assert_eq!(again.content_length(), Some(5));
    }

    #[test]
    fn programmatic_request() {
        let mut req = Request::new();
        assert_eq!(req.request_type(), RequestType::Illegal);

        req.set_request_type(RequestType::Head)
            .set_version(Version::Http10)
            .add_suffix("a")
            .add_suffix(String::from("b"));
        req.set_path(b"/a/b").unwrap();

        assert_eq!(req.request_type(), RequestType::Head);
        assert_eq!(req.path_str(), Some("/a/b"));
        assert_eq!(req.suffixes(), ["a".to_string(), "b".to_string()]);

        let mut out = Vec::new();
        req.write(&mut out);
        assert_eq!(str_op(&out), "HEAD /a/b HTTP/1.0\r\ncontent-length: 0\r\n\r\n");
    }
}
