//! Transport for the chat backend: `POST {base_url}/chat` returning a byte
//! stream of `data: {json}` frames.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::{FutureExt, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::debug_trace::{DebugTrace, wrap_stream};
use crate::session::ConversationTurn;

/// User-Agent header for graphchat requests.
pub const USER_AGENT: &str = concat!("graphchat/", env!("CARGO_PKG_VERSION"));

/// Body of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub model: String,
    pub history: Vec<ConversationTurn>,
}

/// Categories of transport errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// Connection refused, reset or DNS failure
    Connect,
    /// Connect or request timeout
    Timeout,
    /// Non-2xx response
    HttpStatus,
    /// Request could not be built or sent
    Request,
    /// Body read failed after the stream opened
    Stream,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Connect => write!(f, "connect"),
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::HttpStatus => write!(f, "http_status"),
            TransportErrorKind::Request => write!(f, "request"),
            TransportErrorKind::Stream => write!(f, "stream"),
        }
    }
}

/// Structured transport failure. Always fatal to the current request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Raw error body, when there is one
    pub details: Option<String>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an HTTP status error, lifting a readable message out of a
    /// JSON body (`error.message` or `detail`) when present.
    pub fn http_status(status: u16, body: &str) -> Self {
        let details = (!body.is_empty()).then(|| body.to_string());
        let message = match serde_json::from_str::<Value>(body) {
            Ok(json) => json
                .get("error")
                .and_then(|e| e.get("message"))
                .or_else(|| json.get("detail"))
                .and_then(Value::as_str)
                .map_or_else(|| format!("HTTP {status}"), |msg| format!("HTTP {status}: {msg}")),
            Err(_) => format!("HTTP {status}"),
        };
        Self {
            kind: TransportErrorKind::HttpStatus,
            message,
            details,
        }
    }

    pub fn stream(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Stream, message)
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TransportError {}

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Response body as raw chunks in arrival order.
pub type ByteStream = BoxStream<'static, TransportResult<Bytes>>;

/// Source of chat response streams.
///
/// The controller only ever needs "open a request, read chunks". Tests plug
/// in scripted transports here.
pub trait ChatTransport: Send + Sync {
    fn open(&self, request: ChatRequest) -> BoxFuture<'static, TransportResult<ByteStream>>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    url: String,
}

impl HttpTransport {
    /// Creates a transport posting to `{base_url}/chat`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, connect_timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            url: format!("{}/chat", base_url.trim_end_matches('/')),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ChatTransport for HttpTransport {
    fn open(&self, request: ChatRequest) -> BoxFuture<'static, TransportResult<ByteStream>> {
        let http = self.http.clone();
        let url = self.url.clone();
        send_chat_request(http, url, request).boxed()
    }
}

async fn send_chat_request(
    http: reqwest::Client,
    url: String,
    request: ChatRequest,
) -> TransportResult<ByteStream> {
    let trace = DebugTrace::from_env(&request.model);
    let body = serde_json::to_vec(&request)
        .map_err(|e| TransportError::new(TransportErrorKind::Request, e.to_string()))?;
    if let Some(trace) = &trace {
        trace.write_request(&body);
    }

    let response = http
        .post(&url)
        .header("content-type", "application/json")
        .header("accept", "text/event-stream")
        .header("user-agent", USER_AGENT)
        .body(body)
        .send()
        .await
        .map_err(|e| classify_reqwest_error(&e))?;

    let status = response.status();
    if !status.is_success() {
        let error_body = response.text().await.unwrap_or_default();
        return Err(TransportError::http_status(status.as_u16(), &error_body));
    }

    let byte_stream = response
        .bytes_stream()
        .map_err(|e| classify_reqwest_error(&e))
        .boxed();
    Ok(wrap_stream(trace.as_ref(), byte_stream))
}

fn classify_reqwest_error(e: &reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::new(TransportErrorKind::Timeout, format!("Request timed out: {e}"))
    } else if e.is_connect() {
        TransportError::new(TransportErrorKind::Connect, format!("Connection failed: {e}"))
    } else if e.is_body() || e.is_decode() {
        TransportError::stream(format!("Stream interrupted: {e}"))
    } else if e.is_request() {
        TransportError::new(TransportErrorKind::Request, format!("Request error: {e}"))
    } else {
        TransportError::new(TransportErrorKind::Stream, format!("Network error: {e}"))
    }
}
