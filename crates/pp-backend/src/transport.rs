//! How a chat request reaches the agent proxy.

use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use pp_protocol::ChatRequest;
use reqwest::header::ACCEPT;
use reqwest::Client;

use crate::error::BackendError;

/// Raw response body, chunk by chunk.
pub type ByteStream = BoxStream<'static, Result<Bytes, BackendError>>;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
const MAX_ERROR_BODY: usize = 512;

/// Opens a streaming response for a chat request.
pub trait Transport: Send + Sync {
    /// Send the request. Resolves once response headers arrive; a non-2xx
    /// status is an error.
    fn open(&self, request: ChatRequest) -> BoxFuture<'_, Result<ByteStream, BackendError>>;
}

/// Transport that POSTs JSON to the agent proxy over HTTP.
pub struct HttpTransport {
    endpoint: String,
    http: Client,
}

/// Build an HTTP client. `None` leaves the corresponding timeout unset.
fn build_http_client(
    connect: Option<Duration>,
    request: Option<Duration>,
) -> Result<Client, BackendError> {
    let mut builder = Client::builder().pool_max_idle_per_host(2);
    if let Some(connect) = connect {
        builder = builder.connect_timeout(connect);
    }
    if let Some(request) = request {
        builder = builder.timeout(request);
    }
    Ok(builder.build()?)
}

impl HttpTransport {
    /// Create a transport for the given endpoint URL.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, BackendError> {
        Self::with_timeouts(
            endpoint,
            Some(DEFAULT_CONNECT_TIMEOUT),
            Some(DEFAULT_REQUEST_TIMEOUT),
        )
    }

    /// Create a transport with custom timeouts. The request timeout covers
    /// the whole streamed response, not just the headers: an answer still
    /// streaming when it elapses ends with `on_error`. `None` disables it.
    pub fn with_timeouts(
        endpoint: impl Into<String>,
        connect: Option<Duration>,
        request: Option<Duration>,
    ) -> Result<Self, BackendError> {
        Ok(Self {
            endpoint: endpoint.into(),
            http: build_http_client(connect, request)?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Transport for HttpTransport {
    fn open(&self, request: ChatRequest) -> BoxFuture<'_, Result<ByteStream, BackendError>> {
        Box::pin(async move {
            tracing::debug!(
                endpoint = %self.endpoint,
                messages = request.messages.len(),
                region = %request.region,
                "opening agent stream"
            );

            let response = self
                .http
                .post(&self.endpoint)
                .header(ACCEPT, "text/event-stream")
                .json(&request)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let mut body = response.text().await.unwrap_or_default();
                truncate_on_char_boundary(&mut body, MAX_ERROR_BODY);
                tracing::warn!(status, body = %body, "agent proxy returned an error status");
                return Err(BackendError::Status { status, body });
            }

            let body = response
                .bytes_stream()
                .map_err(|e| BackendError::Body(e.to_string()))
                .boxed();
            Ok(body)
        })
    }
}

fn truncate_on_char_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}
