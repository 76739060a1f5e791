//! JSON-over-HTTP/1.1 clients for node monitors and frontends.
//!
//! Each client owns one keep-alive connection. Requests on a connection
//! are sequential, which matches how pooled clients are used: one call
//! per borrow.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HOST, USER_AGENT};
use http::{Method, Request};
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1::SendRequest;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use tern_core::{FullTaskId, LaunchSpec};

use crate::client::{Connector, FrontendClient, NodeMonitorClient};
use crate::error::{RpcError, RpcResult};
use crate::wire::{
    FrontendMessage, LAUNCH_PATH, LOAD_PATH, LoadRequest, LoadResponse, MESSAGES_PATH,
};

const AGENT: &str = concat!("tern/", env!("CARGO_PKG_VERSION"));

/// A single HTTP/1.1 connection to a remote endpoint.
pub struct HttpConnection {
    addr: SocketAddr,
    sender: SendRequest<Full<Bytes>>,
    request_timeout: Duration,
}

impl HttpConnection {
    /// Open a connection, giving up after `connect_timeout`. Each request
    /// on it is then bounded by `request_timeout`.
    pub async fn connect(
        addr: SocketAddr,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> RpcResult<Self> {
        let stream = tokio::time::timeout(connect_timeout, tokio::net::TcpStream::connect(addr))
            .await
            .map_err(|_| RpcError::Timeout(addr))?
            .map_err(|e| RpcError::Connect {
                addr,
                reason: e.to_string(),
            })?;
        // Probes are tiny; don't let Nagle hold them back.
        let _ = stream.set_nodelay(true);

        let io = hyper_util::rt::TokioIo::new(stream);
        let (sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| RpcError::Connect {
                addr,
                reason: e.to_string(),
            })?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(%addr, error = %e, "connection closed with error");
            }
        });

        Ok(Self {
            addr,
            sender,
            request_timeout,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// POST `body` as JSON to `path` and return the raw response body.
    ///
    /// The whole exchange, including reading the body, must finish within
    /// the request timeout. A timed out connection is left in an unknown
    /// state; callers drop it rather than pooling it again.
    async fn post<T: Serialize + Sync>(&mut self, path: &str, body: &T) -> RpcResult<Bytes> {
        let addr = self.addr;
        let limit = self.request_timeout;
        match tokio::time::timeout(limit, self.exchange(path, body)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(%addr, %path, timeout_ms = limit.as_millis() as u64, "request timed out");
                Err(RpcError::Timeout(addr))
            }
        }
    }

    async fn exchange<T: Serialize + Sync>(&mut self, path: &str, body: &T) -> RpcResult<Bytes> {
        let addr = self.addr;
        let transport = |e: &dyn std::fmt::Display| RpcError::Transport {
            addr,
            reason: e.to_string(),
        };

        let payload = serde_json::to_vec(body).map_err(|e| transport(&e))?;
        let req = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(HOST, addr.to_string())
            .header(USER_AGENT, AGENT)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(payload)))
            .map_err(|e| transport(&e))?;

        self.sender.ready().await.map_err(|e| transport(&e))?;
        let resp = self
            .sender
            .send_request(req)
            .await
            .map_err(|e| transport(&e))?;

        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| transport(&e))?
            .to_bytes();

        if !status.is_success() {
            debug!(%addr, %path, %status, "non-2xx response");
            return Err(RpcError::Status {
                addr,
                status: status.as_u16(),
            });
        }
        Ok(body)
    }

    async fn post_json<T, R>(&mut self, path: &str, body: &T) -> RpcResult<R>
    where
        T: Serialize + Sync,
        R: DeserializeOwned,
    {
        let bytes = self.post(path, body).await?;
        serde_json::from_slice(&bytes).map_err(|e| RpcError::Decode {
            addr: self.addr,
            reason: e.to_string(),
        })
    }
}

// ── Node monitors ─────────────────────────────────────────────────

/// Node monitor client speaking the `/v1/load` and `/v1/launch` endpoints.
pub struct HttpNodeMonitorClient {
    conn: HttpConnection,
}

#[async_trait]
impl NodeMonitorClient for HttpNodeMonitorClient {
    async fn probe_load(&mut self, app_id: &str, request_id: &str) -> RpcResult<u32> {
        let req = LoadRequest {
            app_id: app_id.to_string(),
            request_id: request_id.to_string(),
        };
        let resp: LoadResponse = self.conn.post_json(LOAD_PATH, &req).await?;
        Ok(resp.queue_length)
    }

    async fn launch_task(&mut self, spec: &LaunchSpec) -> RpcResult<()> {
        self.conn.post(LAUNCH_PATH, spec).await.map(|_| ())
    }
}

/// Opens [`HttpNodeMonitorClient`]s.
#[derive(Debug, Clone)]
pub struct HttpNodeMonitorConnector {
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl HttpNodeMonitorConnector {
    /// Requests are bounded by `connect_timeout` too unless
    /// [`with_request_timeout`](Self::with_request_timeout) says otherwise.
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            request_timeout: connect_timeout,
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

#[async_trait]
impl Connector<Box<dyn NodeMonitorClient>> for HttpNodeMonitorConnector {
    async fn connect(&self, addr: SocketAddr) -> RpcResult<Box<dyn NodeMonitorClient>> {
        let conn =
            HttpConnection::connect(addr, self.connect_timeout, self.request_timeout).await?;
        Ok(Box::new(HttpNodeMonitorClient { conn }))
    }
}

// ── Frontends ─────────────────────────────────────────────────────

/// Frontend client posting to `/v1/messages`.
pub struct HttpFrontendClient {
    conn: HttpConnection,
}

#[async_trait]
impl FrontendClient for HttpFrontendClient {
    async fn frontend_message(
        &mut self,
        task: &FullTaskId,
        status: i32,
        message: &[u8],
    ) -> RpcResult<()> {
        let msg = FrontendMessage {
            task: task.clone(),
            status,
            message: message.to_vec(),
        };
        self.conn.post(MESSAGES_PATH, &msg).await.map(|_| ())
    }
}

/// Opens [`HttpFrontendClient`]s.
#[derive(Debug, Clone)]
pub struct HttpFrontendConnector {
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl HttpFrontendConnector {
    /// Requests are bounded by `connect_timeout` too unless
    /// [`with_request_timeout`](Self::with_request_timeout) says otherwise.
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            request_timeout: connect_timeout,
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

#[async_trait]
impl Connector<Box<dyn FrontendClient>> for HttpFrontendConnector {
    async fn connect(&self, addr: SocketAddr) -> RpcResult<Box<dyn FrontendClient>> {
        let conn =
            HttpConnection::connect(addr, self.connect_timeout, self.request_timeout).await?;
        Ok(Box::new(HttpFrontendClient { conn }))
    }
}
