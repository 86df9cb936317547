use crate::Version;
use std::io;
use thiserror::Error;

/// Errors surfaced to callers of the parsing and serialization API.
///
/// Malformed input never produces an error: it degrades into an
/// [`Illegal`](crate::RequestType::Illegal) request or a
/// [`NotImplemented`](crate::StatusCode::NotImplemented) response.
#[derive(Debug, Error)]
pub enum Error {
    /// Duplicating header, key, value or query bytes failed.
    #[error("out of memory while duplicating {0} bytes")]
    OutOfMemory(usize),

    /// [`ServerBuilder::build`](crate::ServerBuilder::build) was called
    /// without a required part.
    #[error("server builder is missing `{0}`")]
    MissingPart(&'static str),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Connection-level failures, each answered with a fixed reply before
/// the connection is closed.
#[derive(Debug, Error)]
pub(crate) enum ErrorKind {
    #[error("illegal request type")]
    IllegalMethod,

    #[error("request head exceeds the size limit")]
    HeadTooLarge,
    #[error("too many headers")]
    TooManyHeaders,
    #[error("invalid content-length")]
    InvalidContentLength,
    #[error("request body exceeds the size limit")]
    BodyTooLarge,
    #[error("transfer-encoding is not supported for requests")]
    UnsupportedTransferEncoding,

    #[error("service unavailable")]
    ServiceUnavailable,
    #[error("timed out")]
    Timeout,
    #[error("allocation failed")]
    OutOfMemory,
    #[error("io: {0}")]
    Io(#[from] io::Error),
}

impl From<Error> for ErrorKind {
    fn from(err: Error) -> Self {
        match err {
            Error::OutOfMemory(_) => ErrorKind::OutOfMemory,
            Error::Io(err) => ErrorKind::Io(err),
            err @ Error::MissingPart(_) => ErrorKind::Io(io::Error::other(err)),
        }
    }
}

macro_rules! http_errors {
    ($($name:ident: $status_code:expr, $len:literal => $json:literal; )*) => {
        /// Returns the full wire reply for this error.
        pub(crate) const fn as_http(
            &self,
            version: Version,
            json: bool,
        ) -> &'static [u8] {
            match (json, self, version) { $(
                (true, Self::$name { .. }, Version::Http11) => concat!(
                    "HTTP/1.1 ", $status_code, "\r\n",
                    "connection: close\r\n",
                    "content-length: ", $len, "\r\n",
                    "content-type: application/json\r\n",
                    "\r\n",
                    $json
                ),
                (false, Self::$name { .. }, Version::Http11) => concat!(
                    "HTTP/1.1 ", $status_code, "\r\n",
                    "connection: close\r\n",
                    "content-length: 0\r\n\r\n",
                ),
                (true, Self::$name { .. }, Version::Http10) => concat!(
                    "HTTP/1.0 ", $status_code, "\r\n",
                    "connection: close\r\n",
                    "content-length: ", $len, "\r\n",
                    "content-type: application/json\r\n",
                    "\r\n",
                    $json
                ),
                (false, Self::$name { .. }, Version::Http10) => concat!(
                    "HTTP/1.0 ", $status_code, "\r\n",
                    "connection: close\r\n",
                    "content-length: 0\r\n\r\n",
                ),
            )* }.as_bytes()
        }
    };
}

impl ErrorKind {
    http_errors! {
        IllegalMethod: "400 Bad Request", "56"
            => r#"{"error":"Illegal request type","code":"ILLEGAL_METHOD"}"#;

        HeadTooLarge: "431 Request Header Fields Too Large", "58"
            => r#"{"error":"Request head too large","code":"HEAD_TOO_LARGE"}"#;
        TooManyHeaders: "431 Request Header Fields Too Large", "54"
            => r#"{"error":"Too many headers","code":"TOO_MANY_HEADERS"}"#;
        InvalidContentLength: "400 Bad Request", "66"
            => r#"{"error":"Invalid Content-Length","code":"INVALID_CONTENT_LENGTH"}"#;
        BodyTooLarge: "413 Payload Too Large", "58"
            => r#"{"error":"Request body too large","code":"BODY_TOO_LARGE"}"#;
        UnsupportedTransferEncoding: "501 Not Implemented", "82"
            => r#"{"error":"Transfer-Encoding not supported","code":"UNSUPPORTED_TRANSFER_ENCODING"}"#;

        ServiceUnavailable: "503 Service Unavailable", "72"
            => r#"{"error":"Service temporarily unavailable","code":"SERVICE_UNAVAILABLE"}"#;
        Timeout: "408 Request Timeout", "46"
            => r#"{"error":"Request timed out","code":"TIMEOUT"}"#;
        OutOfMemory: "500 Internal Server Error", "48"
            => r#"{"error":"Out of memory","code":"OUT_OF_MEMORY"}"#;
        Io: "503 Service Unavailable", "48"
            => r#"{"error":"I/O error occurred","code":"IO_ERROR"}"#;
    }

    /// Status line text of the reply, for logging.
    pub(crate) fn status(&self) -> &'static str {
        let reply = self.as_http(Version::Http11, false);
        let line_end = memchr::memchr(b'\r', reply).unwrap_or(reply.len());
        // "HTTP/1.1 " prefix, the rest is ASCII
        std::str::from_utf8(&reply[9..line_end]).unwrap_or_default()
    }
}
