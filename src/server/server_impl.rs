use crate::{
    errors::{Error, ErrorKind},
    http::{request::Request, response::Response},
    limits::{ConnLimits, ReqLimits, RespLimits, ServerLimits, WaitStrategy},
    server::connection::HttpConnection,
    Version,
};
use crossbeam::queue::SegQueue;
use socket2::{Domain, Protocol, Socket, Type};
use std::{
    future::Future,
    marker::{Send, Sync},
    net::SocketAddr,
    sync::Arc,
};
use tokio::{
    net::{TcpListener, TcpStream},
    task::yield_now,
    time::sleep as tokio_sleep,
};

/// Turns parsed requests into responses.
///
/// `&self` is shared by every worker, so it is the place for read-only
/// state such as routing tables or connection pools.
///
/// The response arrives reset to `200 OK` with the default headers.
/// Setting `connection: close` on it ends the connection after the reply.
///
/// # Examples
///
/// ```
/// use restwire::{Handler, Request, RequestType, Response, StatusCode};
///
/// struct Greeter;
///
/// impl Handler for Greeter {
///     async fn handle(&self, req: &Request, resp: &mut Response) {
///         match (req.request_type(), req.path()) {
///             (RequestType::Get, b"/hello") => {
///                 let name = req.value_str("name").unwrap_or("world");
///                 resp.append("Hello, ").append(name);
///             }
///             _ => {
///                 resp.set_code(StatusCode::NotFound).append("Not found");
///             }
///         }
///     }
/// }
/// ```
pub trait Handler
where
    Self: Sync + Send + 'static,
{
    /// Fills `response` for `request`.
    ///
    /// Panics terminate the worker's current connection.
    fn handle(&self, request: &Request, response: &mut Response) -> impl Future<Output = ()> + Send;
}

/// Binds a listening socket with `SO_REUSEADDR` and the given backlog.
///
/// Must be called from within a Tokio runtime.
pub fn bind(addr: SocketAddr, backlog: i32) -> Result<TcpListener, Error> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;
    socket.set_nonblocking(true)?;

    Ok(TcpListener::from_std(socket.into())?)
}

/// An HTTP/1.x server feeding accepted connections to a fixed pool of
/// workers.
///
/// # Examples
///
/// ```no_run
/// use restwire::{Handler, Request, Response, Server};
///
/// struct MyHandler;
///
/// impl Handler for MyHandler {
///     async fn handle(&self, _: &Request, resp: &mut Response) {
///         resp.append("Hello world!");
///     }
/// }
///
/// #[tokio::main]
/// async fn main() -> Result<(), restwire::Error> {
///     Server::builder()
///         .bind("127.0.0.1:8080".parse().unwrap())?
///         .handler(MyHandler)
///         .build()?
///         .launch()
///         .await;
///
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    stream_queue: TcpQueue,
    error_queue: TcpQueue,
    server_limits: ServerLimits,
}

impl Server {
    /// Creates a new builder for configuring the server instance.
    #[inline]
    pub fn builder<H: Handler>() -> ServerBuilder<H> {
        ServerBuilder {
            listener: None,
            handler: None,

            server_limits: None,
            request_limits: None,
            response_limits: None,
            connection_limits: None,
        }
    }

    /// Address the server is listening on.
    #[inline]
    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections forever, queueing them for the workers.
    ///
    /// Streams accepted while `max_pending_connections` are already queued
    /// go to the overflow queue and receive `503 Service Unavailable`.
    pub async fn launch(self) {
        tracing::info!(
            addr = ?self.listener.local_addr().ok(),
            workers = self.server_limits.max_connections,
            "server launched"
        );

        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(value) => value,
                Err(err) => {
                    tracing::warn!(error = %err, "accept failed");
                    continue;
                }
            };
            let _ = stream.set_nodelay(true);

            match self.stream_queue.len() < self.server_limits.max_pending_connections {
                true => self.stream_queue.push((stream, addr)),
                false => {
                    tracing::debug!(%addr, "queue full, rejecting connection");
                    self.error_queue.push((stream, addr))
                }
            }
        }
    }

    #[inline]
    async fn get_stream(queue: &TcpQueue, wait: &WaitStrategy) -> (TcpStream, SocketAddr) {
        loop {
            if let Some(value) = queue.pop() {
                return value;
            }

            match wait {
                WaitStrategy::Yield => yield_now().await,
                WaitStrategy::Sleep(time) => tokio_sleep(*time).await,
            }
        }
    }
}

//

/// Builder for configuring and creating [`Server`] instances.
///
/// A listener (through [`bind`](Self::bind) or [`listener`](Self::listener))
/// and a [`handler`](Self::handler) are required; every limit falls back to
/// its default.
pub struct ServerBuilder<H: Handler> {
    listener: Option<TcpListener>,
    handler: Option<Arc<H>>,

    server_limits: Option<ServerLimits>,
    request_limits: Option<ReqLimits>,
    response_limits: Option<RespLimits>,
    connection_limits: Option<ConnLimits>,
}

impl<H: Handler> ServerBuilder<H> {
    const BACKLOG: i32 = 1024;

    /// Sets the TCP listener that the server will use to accept connections.
    #[inline(always)]
    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Binds a new listener on `addr` through [`bind`](crate::bind).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # restwire::impl_default_handler!{ MyStruct }
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), restwire::Error> {
    /// use restwire::Server;
    ///
    /// let server = Server::builder()
    ///     .bind("0.0.0.0:8080".parse().unwrap())?
    ///     .handler(MyStruct)
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    #[inline]
    pub fn bind(self, addr: SocketAddr) -> Result<Self, Error> {
        Ok(self.listener(bind(addr, Self::BACKLOG)?))
    }

    /// Sets the request handler that will process incoming requests.
    #[inline(always)]
    pub fn handler(mut self, handler: H) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Configures worker count, queueing and error reply format.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # restwire::impl_default_handler!{ MyStruct }
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), restwire::Error> {
    /// use restwire::{Server, limits::ServerLimits};
    ///
    /// let server = Server::builder()
    ///     .bind("127.0.0.1:8080".parse().unwrap())?
    ///     .handler(MyStruct)
    ///     .server_limits(ServerLimits {
    ///         max_connections: 2500,
    ///         max_pending_connections: 10000,
    ///         ..ServerLimits::default()
    ///     })
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    #[inline(always)]
    pub fn server_limits(mut self, limits: ServerLimits) -> Self {
        self.server_limits = Some(limits);
        self
    }

    /// Configures socket timeouts and keep-alive limits.
    #[inline(always)]
    pub fn connection_limits(mut self, limits: ConnLimits) -> Self {
        self.connection_limits = Some(limits);
        self
    }

    /// Configures request size limits.
    #[inline(always)]
    pub fn request_limits(mut self, limits: ReqLimits) -> Self {
        self.request_limits = Some(limits);
        self
    }

    /// Configures response buffer sizing.
    #[inline(always)]
    pub fn response_limits(mut self, limits: RespLimits) -> Self {
        self.response_limits = Some(limits);
        self
    }

    /// Spawns the workers and returns the server, ready to
    /// [`launch`](Server::launch).
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// [`Error::MissingPart`] if no listener or no handler was set.
    pub fn build(self) -> Result<Server, Error> {
        let (listener, handler, limits) = self.get_all_parts()?;

        let stream_queue = Arc::new(SegQueue::new());
        let error_queue = Arc::new(SegQueue::new());

        for _ in 0..limits.0.max_connections {
            Self::spawn_worker(&stream_queue, &limits, &handler);
        }
        if limits.0.count_503_handlers != 0 {
            for _ in 0..limits.0.count_503_handlers {
                Self::spawn_alarmist(&error_queue, &limits);
            }
        } else {
            Self::spawn_quiet_alarmist(&error_queue, &limits);
        }

        Ok(Server {
            listener,
            stream_queue,
            error_queue,
            server_limits: limits.0,
        })
    }

    fn spawn_worker(queue: &TcpQueue, limits: &AllLimits, handler: &Arc<H>) {
        let queue = queue.clone();
        let mut conn = HttpConnection::new(handler.clone(), limits.clone());

        tokio::spawn(async move {
            loop {
                let (mut stream, addr) =
                    Server::get_stream(&queue, &conn.server_limits.wait_strategy).await;

                let Ok(local_addr) = stream.local_addr() else {
                    continue;
                };

                if let Err(err) = conn.run(&mut stream, addr, local_addr).await {
                    tracing::debug!(%addr, error = %err, "connection dropped");
                }
            }
        });
    }

    fn spawn_alarmist(queue: &TcpQueue, limits: &AllLimits) {
        let queue = queue.clone();
        let (server_limits, conn_limits, ..) = limits.clone();

        tokio::spawn(async move {
            loop {
                let (mut stream, _) =
                    Server::get_stream(&queue, &server_limits.wait_strategy).await;

                let _ = conn_limits
                    .send_error(
                        &mut stream,
                        ErrorKind::ServiceUnavailable,
                        Version::Http11,
                        server_limits.json_errors,
                    )
                    .await;
            }
        });
    }

    fn spawn_quiet_alarmist(queue: &TcpQueue, limits: &AllLimits) {
        let queue = queue.clone();
        let (server_limits, ..) = limits.clone();

        tokio::spawn(async move {
            loop {
                let (stream, _) = Server::get_stream(&queue, &server_limits.wait_strategy).await;

                drop(stream);
            }
        });
    }

    fn get_all_parts(self) -> Result<(TcpListener, Arc<H>, AllLimits), Error> {
        Ok((
            self.listener.ok_or(Error::MissingPart("listener"))?,
            self.handler.ok_or(Error::MissingPart("handler"))?,
            (
                self.server_limits.unwrap_or_default(),
                self.connection_limits.unwrap_or_default(),
                self.request_limits.unwrap_or_default(),
                self.response_limits.unwrap_or_default(),
            ),
        ))
    }
}

type TcpQueue = Arc<SegQueue<(TcpStream, SocketAddr)>>;
pub(crate) type AllLimits = (ServerLimits, ConnLimits, ReqLimits, RespLimits);
