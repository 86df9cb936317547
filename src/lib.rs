//! restwire - a compact HTTP/1.x request/response layer for REST services
//!
//! The core parses a request head in place inside one arena buffer:
//! header keys are folded to lower case, keys and values are trimmed,
//! and the query string is percent-decoded back into the same bytes, so
//! every header, path and parameter is a view into that buffer until a
//! caller replaces it.
//!
//! # Components
//!
//! - [`Request`]: request-line and header parser, query decoding, setters
//!   and serialization for client use
//! - [`Response`]: status, headers and body, with [`Response::write_header`]
//!   deriving `content-length` from the live body
//! - [`query`]: the query-string decoder and encoder on their own
//! - [`Server`]: a small Tokio server driving the above, configured
//!   through [`limits`]
//!
//! # Examples
//!
//! Parsing a head:
//! ```
//! use restwire::{Request, RequestType};
//!
//! let req = Request::from_vec(
//!     b"POST /users?name=J%C3%BCrgen+K HTTP/1.1\r\nContent-Type: application/json\r\n\r\n".to_vec(),
//! );
//!
//! assert_eq!(req.request_type(), RequestType::Post);
//! assert_eq!(req.path(), b"/users");
//! assert_eq!(req.value_str("name"), Some("Jürgen K"));
//! assert_eq!(req.header_str("CONTENT-TYPE"), Some("application/json"));
//! ```
//!
//! Building a reply:
//! ```
//! use restwire::{Response, StatusCode};
//!
//! let mut resp = Response::new(StatusCode::Created);
//! resp.set_content_type(b"application/json")?.append(r#"{"id":7}"#);
//!
//! let mut out = Vec::new();
//! resp.write(&mut out);
//! assert!(out.starts_with(b"HTTP/1.1 201 Created\r\n"));
//! assert!(out.ends_with(b"content-length: 8\r\n\r\n{\"id\":7}"));
//! # Ok::<(), restwire::Error>(())
//! ```
//!
//! Serving:
//! ```no_run
//! use restwire::{Handler, Request, RequestType, Response, Server, StatusCode};
//!
//! struct Api;
//!
//! impl Handler for Api {
//!     async fn handle(&self, req: &Request, resp: &mut Response) {
//!         match (req.request_type(), req.path()) {
//!             (RequestType::Get, b"/ping") => {
//!                 resp.append("pong");
//!             }
//!             _ => {
//!                 resp.set_code(StatusCode::NotFound).append("no such route");
//!             }
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), restwire::Error> {
//!     Server::builder()
//!         .bind("127.0.0.1:8080".parse().unwrap())?
//!         .handler(Api)
//!         .build()?
//!         .launch()
//!         .await;
//!
//!     Ok(())
//! }
//! ```

pub(crate) mod http {
    pub(crate) mod dictionary;
    pub mod query;
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod server_impl;
}
pub(crate) mod errors;
pub mod limits;

pub use crate::{
    errors::Error,
    http::{
        dictionary::{Entries, Span},
        query,
        request::Request,
        response::{
            write::{BodyWriter, WriteBuffer},
            Response,
        },
        types::{RequestType, StatusCode, Version},
    },
    server::server_impl::{bind, Handler, Server, ServerBuilder},
};

#[doc(hidden)]
#[macro_export]
macro_rules! impl_default_handler {
    ($name:ident) => {
        use restwire::{Handler, Request, Response};
        struct $name;

        impl Handler for $name {
            async fn handle(&self, _: &Request, resp: &mut Response) {
                resp.append("Hello world!");
            }
        }
    };
}

#[cfg(test)]
pub mod tools {
    use std::str::from_utf8;

    #[inline]
    pub fn str(value: Option<&[u8]>) -> Option<&str> {
        Some(from_utf8(value?).unwrap())
    }

    #[inline]
    pub fn str_op(value: &[u8]) -> &str {
        from_utf8(value).unwrap()
    }

    #[inline]
    pub fn str_2<'a>(value: (&'a [u8], &'a [u8])) -> (&'a str, &'a str) {
        (from_utf8(value.0).unwrap(), from_utf8(value.1).unwrap())
    }
}
