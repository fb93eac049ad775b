//! Client for a remoclip server
//!
//! Requests go over HTTP(S) with reqwest, or over the server's Unix socket
//! with a plain hyper HTTP/1 connection when a socket is configured. Every
//! request carries the local hostname and, when configured, the token.

use std::path::{Path, PathBuf};
use std::time::Duration;

use hyper::body::HttpBody;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::UnixStream;
use tracing::{debug, warn};

use crate::auth::TOKEN_HEADER;
use crate::config::Config;
use crate::store::ClipboardEvent;

/// Client-side errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP transport error
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("Server returned {code}: {message}")]
    Status { code: u16, message: String },

    /// IO error on the Unix socket
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error on the Unix socket
    #[error("Socket request failed: {0}")]
    Hyper(#[from] hyper::Error),

    /// Request could not be built or the response could not be read
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Serialize)]
struct RequestBody<'a> {
    hostname: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
}

impl<'a> RequestBody<'a> {
    fn new(hostname: &'a str) -> Self {
        Self {
            hostname,
            content: None,
            id: None,
            limit: None,
        }
    }
}

#[derive(Deserialize)]
struct ContentResponse {
    content: String,
}

#[derive(Deserialize)]
struct HistoryResponse {
    history: Vec<ClipboardEvent>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

enum Transport {
    Http {
        client: reqwest::Client,
        base_url: String,
    },
    Unix {
        socket: PathBuf,
        timeout: Duration,
    },
}

/// Client for the four server operations
pub struct RemoClipClient {
    transport: Transport,
    token: Option<String>,
    hostname: String,
}

impl RemoClipClient {
    /// Build a client from the `[client]` section and the shared token
    pub fn from_config(config: &Config) -> Result<Self, ClientError> {
        let timeout = Duration::from_secs(config.client.timeout_secs);
        let client = match &config.client.socket {
            Some(socket) => Self::unix(socket, timeout),
            None => Self::http(&config.client.url, timeout)?,
        };
        Ok(client.with_token(config.security_token.clone()))
    }

    /// Client talking HTTP(S) to `base_url`
    pub fn http(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            transport: Transport::Http {
                client,
                base_url: base_url.trim_end_matches('/').to_string(),
            },
            token: None,
            hostname: local_hostname(),
        })
    }

    /// Client talking to the server's Unix socket
    pub fn unix(socket: &Path, timeout: Duration) -> Self {
        Self {
            transport: Transport::Unix {
                socket: socket.to_path_buf(),
                timeout,
            },
            token: None,
            hostname: local_hostname(),
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Override the hostname reported to the server
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Put `content` on the server clipboard
    pub async fn copy(&self, content: &str) -> Result<(), ClientError> {
        let body = RequestBody {
            content: Some(content),
            ..RequestBody::new(&self.hostname)
        };
        let _: serde_json::Value = self.send(Method::POST, "/copy", &body).await?;
        Ok(())
    }

    /// Current clipboard text, or the content of history entry `id`
    pub async fn paste(&self, id: Option<i64>) -> Result<String, ClientError> {
        let body = RequestBody {
            id,
            ..RequestBody::new(&self.hostname)
        };
        let response: ContentResponse = self.send(Method::GET, "/paste", &body).await?;
        Ok(response.content)
    }

    /// Clipboard history, newest first
    pub async fn history(
        &self,
        limit: Option<u32>,
        id: Option<i64>,
    ) -> Result<Vec<ClipboardEvent>, ClientError> {
        let body = RequestBody {
            id,
            limit,
            ..RequestBody::new(&self.hostname)
        };
        let response: HistoryResponse = self.send(Method::GET, "/history", &body).await?;
        Ok(response.history)
    }

    /// Delete history entry `id`
    pub async fn delete(&self, id: i64) -> Result<(), ClientError> {
        let body = RequestBody {
            id: Some(id),
            ..RequestBody::new(&self.hostname)
        };
        let _: serde_json::Value = self.send(Method::DELETE, "/history", &body).await?;
        Ok(())
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &RequestBody<'_>,
    ) -> Result<T, ClientError> {
        let payload = serde_json::to_vec(body)
            .map_err(|e| ClientError::InvalidArgument(e.to_string()))?;

        debug!("{} {}", method, path);
        let (status, bytes) = match &self.transport {
            Transport::Http { client, base_url } => {
                let mut request = client
                    .request(method, format!("{}{}", base_url, path))
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(payload);
                if let Some(token) = &self.token {
                    request = request.header(TOKEN_HEADER, token.as_bytes());
                }

                let response = request.send().await?;
                let status = response.status().as_u16();
                (status, response.bytes().await?.to_vec())
            }
            Transport::Unix { socket, timeout } => {
                tokio::time::timeout(
                    *timeout,
                    send_unix(socket, method, path, self.token.as_deref(), payload),
                )
                .await
                .map_err(|_| {
                    ClientError::Io(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "request timed out",
                    ))
                })??
            }
        };

        if !(200..300).contains(&status) {
            return Err(ClientError::Status {
                code: status,
                message: error_message(&bytes),
            });
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| ClientError::InvalidArgument(format!("malformed response: {}", e)))
    }
}

async fn send_unix(
    socket: &Path,
    method: Method,
    path: &str,
    token: Option<&str>,
    payload: Vec<u8>,
) -> Result<(u16, Vec<u8>), ClientError> {
    let stream = UnixStream::connect(socket).await?;
    let (mut sender, connection) = hyper::client::conn::handshake(stream).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            warn!("Socket connection error: {}", e);
        }
    });

    let method = hyper::Method::from_bytes(method.as_str().as_bytes())
        .map_err(|e| ClientError::InvalidArgument(e.to_string()))?;
    let mut builder = hyper::Request::builder()
        .method(method)
        .uri(path)
        .header(hyper::header::HOST, "localhost")
        .header(hyper::header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(TOKEN_HEADER, token.as_bytes());
    }
    let request = builder
        .body(hyper::Body::from(payload))
        .map_err(|e| ClientError::InvalidArgument(e.to_string()))?;

    let response = sender.send_request(request).await?;
    let status = response.status().as_u16();
    let mut body = response.into_body();
    let mut bytes = Vec::new();
    while let Some(chunk) = body.data().await {
        bytes.extend_from_slice(&chunk?);
    }

    Ok((status, bytes))
}

/// The server's `error` field, or the raw body if there is none
fn error_message(body: &[u8]) -> String {
    match serde_json::from_slice::<ErrorResponse>(body) {
        Ok(response) => response.error,
        Err(_) => String::from_utf8_lossy(body).trim().to_string(),
    }
}

fn local_hostname() -> String {
    gethostname::gethostname().to_string_lossy().into_owned()
}
