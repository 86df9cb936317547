use crate::{
    errors::ErrorKind,
    http::{request::Request, response::Response, types::RequestType},
    limits::{ConnLimits, ReqLimits, RespLimits, ServerLimits},
    server::server_impl::{AllLimits, Handler},
    StatusCode, Version,
};
use memchr::memmem;
use std::{io, net::SocketAddr, sync::Arc, time::Instant};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    time::timeout,
};

const HEAD_END: &[u8] = b"\r\n\r\n";
const READ_CHUNK: usize = 4096;

/// Serves one stream at a time, reusing its buffers across connections.
pub(crate) struct HttpConnection<H: Handler> {
    handler: Arc<H>,

    connection: Connection,
    buffer: Vec<u8>,
    out: Vec<u8>,
    pub(crate) request: Request,
    pub(crate) response: Response,

    pub(crate) server_limits: ServerLimits,
    pub(crate) conn_limits: ConnLimits,
    req_limits: ReqLimits,
    resp_limits: RespLimits,
}

impl<H: Handler> HttpConnection<H> {
    #[inline]
    pub(crate) fn new(handler: Arc<H>, limits: AllLimits) -> Self {
        let (server_limits, conn_limits, req_limits, resp_limits) = limits;

        Self {
            handler,

            connection: Connection::new(),
            buffer: Vec::with_capacity(req_limits.head_size.min(READ_CHUNK)),
            out: Vec::with_capacity(resp_limits.default_capacity),
            request: Request::new(),
            response: Response::default(),

            server_limits,
            conn_limits,
            req_limits,
            resp_limits,
        }
    }

    /// Serves requests from `stream` until the peer closes it, a limit is
    /// reached or a request is rejected.
    ///
    /// Rejections are answered with a fixed reply and count as a clean
    /// close. Only transport failures are returned.
    pub(crate) async fn run<S>(
        &mut self,
        stream: &mut S,
        client: SocketAddr,
        server: SocketAddr,
    ) -> Result<(), io::Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match self.impl_run(stream, client, server).await {
            Ok(()) => Ok(()),
            Err(ErrorKind::Io(err)) => Err(err),
            // idle keep-alive connection
            Err(ErrorKind::Timeout) if self.buffer.is_empty() => {
                tracing::debug!(%client, "idle connection timed out");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(%client, error = %err, reply = err.status(), "rejecting request");
                let version = self.request.version();
                self.conn_limits
                    .send_error(stream, err, version, self.server_limits.json_errors)
                    .await
            }
        }
    }

    async fn impl_run<S>(
        &mut self,
        stream: &mut S,
        client: SocketAddr,
        server: SocketAddr,
    ) -> Result<(), ErrorKind>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.connection.reset();
        self.buffer.clear();
        self.request.reset();

        while !self.is_expired() {
            let Some(head_end) = self.read_head(stream).await? else {
                tracing::debug!(%client, requests = self.connection.request_count, "connection closed by peer");
                break;
            };

            self.request.parse_from(&self.buffer[..head_end])?;
            self.request.set_connection_info(client, server);

            let body_len = self.check_request()?;
            self.read_body(stream, head_end, body_len).await?;
            self.buffer.drain(..head_end + body_len);

            self.connection.request_count += 1;
            self.response.reset(StatusCode::Ok, &self.resp_limits);

            self.handler.handle(&self.request, &mut self.response).await;

            let keep_alive = self.request.is_keep_alive()
                && !self.is_expired()
                && !self
                    .response
                    .header(b"connection")
                    .is_some_and(|value| value.eq_ignore_ascii_case(b"close"));
            if !keep_alive {
                self.response.set_header(b"connection", b"close")?;
            }

            self.out.clear();
            self.response.write(&mut self.out);
            self.conn_limits.write_bytes(stream, &self.out).await?;
            self.resp_limits.recycle(&mut self.out);

            if !keep_alive {
                break;
            }
        }

        Ok(())
    }

    /// Reads until the buffer holds a complete head and returns its length,
    /// terminator included. `None` means the peer closed between requests.
    async fn read_head<S>(&mut self, stream: &mut S) -> Result<Option<usize>, ErrorKind>
    where
        S: AsyncRead + Unpin,
    {
        let mut searched = 0;

        loop {
            if let Some(pos) = memmem::find(&self.buffer[searched..], HEAD_END) {
                let end = searched + pos + HEAD_END.len();
                return match end > self.req_limits.head_size {
                    true => Err(ErrorKind::HeadTooLarge),
                    false => Ok(Some(end)),
                };
            }
            if self.buffer.len() >= self.req_limits.head_size {
                return Err(ErrorKind::HeadTooLarge);
            }

            // the terminator may straddle two reads
            searched = self.buffer.len().saturating_sub(HEAD_END.len() - 1);

            if self.read_more(stream).await? == 0 {
                return match self.buffer.is_empty() {
                    true => Ok(None),
                    false => Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
                };
            }
        }
    }

    async fn read_body<S>(
        &mut self,
        stream: &mut S,
        head_end: usize,
        len: usize,
    ) -> Result<(), ErrorKind>
    where
        S: AsyncRead + Unpin,
    {
        while self.buffer.len() < head_end + len {
            if self.read_more(stream).await? == 0 {
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
            }
        }

        let body = self.request.body_mut();
        body.try_reserve_exact(len)
            .map_err(|_| ErrorKind::OutOfMemory)?;
        body.extend_from_slice(&self.buffer[head_end..head_end + len]);

        Ok(())
    }

    #[inline]
    async fn read_more<S>(&mut self, stream: &mut S) -> Result<usize, ErrorKind>
    where
        S: AsyncRead + Unpin,
    {
        self.buffer.reserve(READ_CHUNK);

        match timeout(
            self.conn_limits.socket_read_timeout,
            stream.read_buf(&mut self.buffer),
        )
        .await
        {
            Ok(read) => Ok(read?),
            Err(_) => Err(ErrorKind::Timeout),
        }
    }

    /// Validates a parsed head against the request limits and returns the
    /// announced body length.
    fn check_request(&self) -> Result<usize, ErrorKind> {
        let request = &self.request;

        if request.request_type() == RequestType::Illegal {
            tracing::debug!(head = ?request, "illegal request type");
            return Err(ErrorKind::IllegalMethod);
        }
        if request.headers().len() > self.req_limits.header_count {
            return Err(ErrorKind::TooManyHeaders);
        }
        if request.header(b"transfer-encoding").is_some() {
            return Err(ErrorKind::UnsupportedTransferEncoding);
        }

        match (request.header(b"content-length"), request.content_length()) {
            (None, _) => Ok(0),
            (Some(_), None) => Err(ErrorKind::InvalidContentLength),
            (Some(_), Some(len)) if len > self.req_limits.body_size => Err(ErrorKind::BodyTooLarge),
            (Some(_), Some(len)) => Ok(len),
        }
    }

    #[inline]
    fn is_expired(&self) -> bool {
        self.connection.request_count >= self.conn_limits.max_requests_per_connection
            || self.connection.created.elapsed() > self.conn_limits.connection_lifetime
    }
}

impl ConnLimits {
    /// Writes `bytes` and flushes them within `socket_write_timeout`.
    pub(crate) async fn write_bytes<S>(&self, stream: &mut S, bytes: &[u8]) -> Result<(), io::Error>
    where
        S: AsyncWrite + Unpin,
    {
        let write = async {
            stream.write_all(bytes).await?;
            stream.flush().await
        };

        timeout(self.socket_write_timeout, write).await?
    }

    #[inline]
    pub(crate) async fn send_error<S>(
        &self,
        stream: &mut S,
        error: ErrorKind,
        version: Version,
        json: bool,
    ) -> Result<(), io::Error>
    where
        S: AsyncWrite + Unpin,
    {
        self.write_bytes(stream, error.as_http(version, json)).await
    }
}

#[derive(Debug)]
pub(crate) struct Connection {
    created: Instant,
    request_count: usize,
}

impl Connection {
    #[inline(always)]
    pub(crate) fn new() -> Self {
        Self {
            created: Instant::now(),
            request_count: 0,
        }
    }

    #[inline(always)]
    pub(crate) fn reset(&mut self) {
        self.created = Instant::now();
        self.request_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::*;
    use std::time::Duration;
    use tokio::io::duplex;

    struct Echo;

    impl Handler for Echo {
        async fn handle(&self, request: &Request, response: &mut Response) {
            response
                .append(request.request_type().as_str())
                .append(" ")
                .append(request.path())
                .append(" ");
            for (key, value) in request.values() {
                response.append(key).append("=").append(value).append(";");
            }
            response.append(request.body());
        }
    }

    struct Closer;

    impl Handler for Closer {
        async fn handle(&self, _: &Request, response: &mut Response) {
            let _ = response.set_header(b"Connection", b"close");
            response.append("bye");
        }
    }

    fn addrs() -> (SocketAddr, SocketAddr) {
        ("10.0.0.7:4000".parse().unwrap(), "127.0.0.1:80".parse().unwrap())
    }

    fn limits() -> AllLimits {
        (
            ServerLimits::default(),
            ConnLimits {
                socket_read_timeout: Duration::from_millis(200),
                ..ConnLimits::default()
            },
            ReqLimits::default(),
            RespLimits::default(),
        )
    }

    async fn exchange<H: Handler>(handler: H, limits: AllLimits, input: &[u8]) -> String {
        let (mut client, mut server) = duplex(256 * 1024);
        client.write_all(input).await.unwrap();
        client.shutdown().await.unwrap();

        let mut conn = HttpConnection::new(Arc::new(handler), limits);
        let (client_addr, server_addr) = addrs();
        conn.run(&mut server, client_addr, server_addr).await.unwrap();
        drop(server);

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        str_op(&out).to_string()
    }

    fn replies(output: &str) -> usize {
        output.matches("HTTP/1.1 ").count()
    }

    #[tokio::test]
    async fn pipelined_keep_alive() {
        let output = exchange(
            Echo,
            limits(),
            b"GET /a?x=1 HTTP/1.1\r\nHost: h\r\n\r\n\
              POST /b HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello",
        )
        .await;

        assert_eq!(replies(&output), 2, "{output}");
        assert!(output.contains("GET /a x=1;"), "{output}");
        assert!(output.contains("POST /b hello"), "{output}");
        assert!(output.contains("connection: keep-alive"), "{output}");
    }

    #[tokio::test]
    async fn body_split_across_reads() {
        let (mut client, mut server) = duplex(1024);
        let (client_addr, server_addr) = addrs();
        let mut conn = HttpConnection::new(Arc::new(Echo), limits());

        let writer = tokio::spawn(async move {
            client
                .write_all(b"PUT /p HTTP/1.1\r\nContent-Length: 6\r\nConnection: close\r\n\r\nab")
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            client.write_all(b"cdef").await.unwrap();

            let mut out = Vec::new();
            client.read_to_end(&mut out).await.unwrap();
            out
        });

        conn.run(&mut server, client_addr, server_addr).await.unwrap();
        drop(server);

        let out = writer.await.unwrap();
        let output = str_op(&out);
        assert!(output.ends_with("PUT /p abcdef"), "{output}");
        assert!(output.contains("connection: close"), "{output}");
        assert_eq!(*conn.request.client_addr(), client_addr);
    }

    #[tokio::test]
    async fn http10_closes_after_one() {
        let output = exchange(
            Echo,
            limits(),
            b"GET /one HTTP/1.0\r\n\r\nGET /two HTTP/1.0\r\n\r\n",
        )
        .await;

        assert_eq!(replies(&output), 1, "{output}");
        assert!(output.contains("connection: close"), "{output}");
        assert!(!output.contains("/two"), "{output}");
    }

    #[tokio::test]
    async fn handler_closes() {
        let output = exchange(
            Closer,
            limits(),
            b"GET / HTTP/1.1\r\n\r\nGET / HTTP/1.1\r\n\r\n",
        )
        .await;

        assert_eq!(replies(&output), 1, "{output}");
        assert!(output.ends_with("bye"), "{output}");
    }

    #[tokio::test]
    async fn request_count_limit() {
        let (server_limits, _, req_limits, resp_limits) = limits();
        let conn_limits = ConnLimits {
            max_requests_per_connection: 2,
            ..ConnLimits::default()
        };

        let output = exchange(
            Echo,
            (server_limits, conn_limits, req_limits, resp_limits),
            b"GET /1 HTTP/1.1\r\n\r\nGET /2 HTTP/1.1\r\n\r\nGET /3 HTTP/1.1\r\n\r\n",
        )
        .await;

        assert_eq!(replies(&output), 2, "{output}");
        let (first, second) = output.split_at(output.rfind("HTTP/1.1 ").unwrap());
        assert!(first.contains("connection: keep-alive"), "{first}");
        assert!(second.contains("connection: close"), "{second}");
    }

    #[tokio::test]
    async fn rejections() {
        #[rustfmt::skip]
        let cases: [(&[u8], &str); 6] = [
            (b"BREW /pot HTTP/1.1\r\n\r\n", "400 Bad Request"),
            (b"HEAD / HTTP/1.1\r\n\r\n", "400 Bad Request"),
            (b"POST / HTTP/1.1\r\nContent-Length: ten\r\n\r\n", "400 Bad Request"),
            (b"POST / HTTP/1.1\r\nContent-Length: 999999999\r\n\r\n", "413 Payload Too Large"),
            (b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n", "501 Not Implemented"),
            (b"GET / HTTP/1.1\r\na: 1\r\nb: 2\r\nc: 3\r\n\r\n", "431 Request Header Fields Too Large"),
        ];

        for (input, status) in cases {
            let (server_limits, conn_limits, _, resp_limits) = limits();
            let req_limits = ReqLimits {
                header_count: 2,
                ..ReqLimits::default()
            };

            let output = exchange(Echo, (server_limits, conn_limits, req_limits, resp_limits), input).await;
            assert!(output.starts_with(&format!("HTTP/1.1 {status}\r\n")), "{output}");
            assert!(output.contains("connection: close"), "{output}");
            assert!(output.contains("application/json"), "{output}");
        }
    }

    #[tokio::test]
    async fn rejection_uses_request_version() {
        let output = exchange(
            Echo,
            limits(),
            b"POST / HTTP/1.0\r\nTransfer-Encoding: gzip\r\n\r\n",
        )
        .await;

        assert!(output.starts_with("HTTP/1.0 501 Not Implemented\r\n"), "{output}");
    }

    #[tokio::test]
    async fn head_too_large() {
        let (server_limits, conn_limits, _, resp_limits) = limits();
        let req_limits = ReqLimits {
            head_size: 64,
            ..ReqLimits::default()
        };
        let mut input = b"GET / HTTP/1.1\r\nx-long: ".to_vec();
        input.extend_from_slice(&[b'a'; 200]);
        input.extend_from_slice(b"\r\n\r\n");

        let output = exchange(Echo, (server_limits, conn_limits, req_limits, resp_limits), &input).await;
        assert!(output.starts_with("HTTP/1.1 431"), "{output}");
    }

    #[tokio::test]
    async fn plain_error_replies() {
        let (_, conn_limits, req_limits, resp_limits) = limits();
        let server_limits = ServerLimits {
            json_errors: false,
            ..ServerLimits::default()
        };

        let output = exchange(
            Echo,
            (server_limits, conn_limits, req_limits, resp_limits),
            b"TRACE / HTTP/1.1\r\n\r\n",
        )
        .await;
        assert_eq!(
            output,
            "HTTP/1.1 400 Bad Request\r\nconnection: close\r\ncontent-length: 0\r\n\r\n"
        );
    }

    #[tokio::test]
    async fn idle_timeout_is_silent() {
        let (client, mut server) = duplex(1024);
        let mut conn = HttpConnection::new(Arc::new(Echo), limits());
        let (client_addr, server_addr) = addrs();

        conn.run(&mut server, client_addr, server_addr).await.unwrap();
        drop(client);
    }

    #[tokio::test]
    async fn partial_head_times_out() {
        let (mut client, mut server) = duplex(1024);
        let mut conn = HttpConnection::new(Arc::new(Echo), limits());
        let (client_addr, server_addr) = addrs();

        client.write_all(b"GET / HTTP/1.1\r\nHost").await.unwrap();
        conn.run(&mut server, client_addr, server_addr).await.unwrap();
        drop(server);

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        assert!(str_op(&out).starts_with("HTTP/1.1 408 Request Timeout"));
    }
}
