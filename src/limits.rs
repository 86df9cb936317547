//! Server configuration limits and timeouts
//!
//! Every struct has conservative defaults and public fields, so a
//! configuration only names what it changes:
//!
//! ```no_run
//! # restwire::impl_default_handler!{MyHandler}
//! use restwire::{Server, limits::{ConnLimits, ReqLimits, ServerLimits}};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), restwire::Error> {
//!     Server::builder()
//!         .bind("127.0.0.1:8080".parse().unwrap())?
//!         .handler(MyHandler)
//!         .server_limits(ServerLimits {
//!             max_connections: 5000, // Higher concurrency
//!             ..ServerLimits::default()
//!         })
//!         .connection_limits(ConnLimits {
//!             socket_read_timeout: Duration::from_secs(5),
//!             ..ConnLimits::default()
//!         })
//!         .request_limits(ReqLimits {
//!             header_count: 32,
//!             body_size: 64 * 1024,
//!             ..ReqLimits::default()
//!         })
//!         .build()?
//!         .launch()
//!         .await;
//!
//!     Ok(())
//! }
//! ```

use std::time::Duration;

/// Controls server-level concurrency, queueing and overload behavior.
///
/// # Connection management
/// ```text
///                            [------------]
///                            [ Tcp accept ]
///                            [------------]
///                                  ||
///                                  || TCP_STREAM
///                                  \/
/// [--------------]   Yes   /----------------\   No   [-------------]
/// [ Add to queue ] <====== | Queue has room? | ====> [ Sending 503 ]
/// [--------------]         \----------------/        [-------------]
///        ||
///        \==================\\          //====================\
///                            V          V                    ||
/// [---------]   Yes   /--------------------------\   No   [------]
/// [ Worker  ] <====== | Is there a free worker?  | =====> [ Wait ]
/// [---------]         \--------------------------/        [------]
/// ```
///
/// Workers are spawned once when the server is built and then pull
/// accepted streams from a shared queue for the lifetime of the server.
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Number of worker tasks, i.e. connections served at once (default: `100`).
    pub max_connections: usize,

    /// Maximum number of accepted streams waiting for a worker (default: `250`).
    ///
    /// Streams accepted while the queue is full receive an immediate `503`.
    pub max_pending_connections: usize,

    /// How idle workers wait for the queue (default: `Sleep(50μs)`).
    pub wait_strategy: WaitStrategy,

    /// Tasks answering overflow streams with `503` (default: `1`).
    ///
    /// Set to 0 to close overflow streams silently.
    pub count_503_handlers: usize,

    /// Format of protocol error replies (default: `true`)
    ///
    /// If `true`, a rejected request receives:
    /// ```text
    /// HTTP/1.1 400 Bad Request\r
    /// connection: close\r
    /// content-length: 56\r
    /// content-type: application/json\r
    /// \r
    /// {"error":"Illegal request type","code":"ILLEGAL_METHOD"}
    /// ```
    /// If `false`, the body is omitted and `content-length` is `0`.
    pub json_errors: bool,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            max_connections: 100,
            max_pending_connections: 250,
            wait_strategy: WaitStrategy::Sleep(Duration::from_micros(50)),
            count_503_handlers: 1,
            json_errors: true,

            _priv: (),
        }
    }
}

/// Strategy for worker tasks waiting on an empty queue
#[derive(Debug, Clone)]
pub enum WaitStrategy {
    /// Uses [`tokio::task::yield_now()`]. Keeps a core busy.
    Yield,
    /// Uses [`tokio::time::sleep()`]
    Sleep(Duration),
}

/// Connection-level limits and timeouts
#[derive(Debug, Clone)]
pub struct ConnLimits {
    /// Maximum wait for data from the socket (default: `2 seconds`)
    ///
    /// An idle keep-alive connection is closed once this elapses.
    pub socket_read_timeout: Duration,

    /// Maximum duration of a single reply write (default: `3 seconds`)
    pub socket_write_timeout: Duration,

    /// Requests served before the connection is closed (default: `100`)
    pub max_requests_per_connection: usize,

    /// Maximum lifetime of a connection (default: `2 minutes`)
    ///
    /// Checked between requests; a request in flight is finished first.
    pub connection_lifetime: Duration,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ConnLimits {
    #[inline(always)]
    fn default() -> Self {
        Self {
            socket_read_timeout: Duration::from_secs(2),
            socket_write_timeout: Duration::from_secs(3),
            max_requests_per_connection: 100,
            connection_lifetime: Duration::from_secs(120),

            _priv: (),
        }
    }
}

/// Limits applied while reading a request
///
/// A request exceeding one of them is answered with an error reply
/// and the connection is closed:
///
/// | Limit | Reply |
/// |-------|-------|
/// | `head_size` | `431 Request Header Fields Too Large` |
/// | `header_count` | `431 Request Header Fields Too Large` |
/// | `body_size` | `413 Payload Too Large` |
#[derive(Debug, Clone)]
pub struct ReqLimits {
    /// Maximum size of the request line plus headers, terminator included
    /// (default: `8 KB`)
    pub head_size: usize,

    /// Maximum number of header lines (default: `32`)
    pub header_count: usize,

    /// Maximum body size announced by `content-length` (default: `64 KB`)
    pub body_size: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ReqLimits {
    fn default() -> Self {
        Self {
            head_size: 8 * 1024,
            header_count: 32,
            body_size: 64 * 1024,

            _priv: (),
        }
    }
}

/// Response buffer sizing
///
/// Reply buffers are reused between requests of a connection:
/// ```rust
/// # use restwire::limits::RespLimits;
/// # let limits = RespLimits::default();
/// # let mut buffer: Vec<u8> = Vec::with_capacity(limits.default_capacity);
/// #
/// if buffer.capacity() > limits.max_capacity {
///     buffer = Vec::with_capacity(limits.default_capacity);
/// } else {
///     buffer.clear();
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RespLimits {
    /// Initial buffer capacity for responses (default: `1024 B`)
    pub default_capacity: usize,
    /// Capacity above which a buffer is reallocated on reset (default: `8192 B`)
    pub max_capacity: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for RespLimits {
    fn default() -> Self {
        Self {
            default_capacity: 1024,
            max_capacity: 8 * 1024,

            _priv: (),
        }
    }
}

impl RespLimits {
    /// Clears `buffer`, replacing it when it grew past `max_capacity`.
    #[inline]
    pub(crate) fn recycle(&self, buffer: &mut Vec<u8>) {
        match buffer.capacity() > self.max_capacity {
            true => *buffer = Vec::with_capacity(self.default_capacity),
            false => buffer.clear(),
        }
    }
}
