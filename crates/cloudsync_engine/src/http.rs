//! HTTP transport implementation.
//!
//! The blob endpoint is plain JSON over HTTPS with a bearer token. The
//! actual HTTP client is abstracted via [`HttpClient`] so hosts can plug in
//! their own stack; a `reqwest` client is available behind the
//! `reqwest-client` feature.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::BlobTransport;
use async_trait::async_trait;
use cloudsync_protocol::Envelope;
use serde::Serialize;

/// HTTP method used by the blob endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// Fetch the blob.
    Get,
    /// Replace the blob.
    Put,
}

/// A request to the sync server.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Method.
    pub method: HttpMethod,
    /// Absolute URL.
    pub url: String,
    /// Bearer token sent in the `Authorization` header.
    pub bearer_token: String,
    /// JSON body, if any.
    pub body: Option<Vec<u8>>,
}

/// A response from the sync server.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Reason phrase, possibly empty.
    pub reason: String,
    /// Raw body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// Implementations return `Err` only when no response was received
/// (DNS, TLS, connection reset, timeout); HTTP error statuses are returned
/// as ordinary responses.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a request and returns the response.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, String>;
}

#[derive(Serialize)]
struct PutBlobBody<'a> {
    blob: &'a Envelope,
}

/// HTTP-based blob transport.
pub struct HttpTransport<C: HttpClient> {
    /// Full URL of the blob endpoint.
    blob_url: String,
    /// HTTP client implementation.
    client: C,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport.
    pub fn new(config: &SyncConfig, client: C) -> Self {
        Self {
            blob_url: config.blob_url(),
            client,
        }
    }

    /// Returns the blob endpoint URL.
    pub fn blob_url(&self) -> &str {
        &self.blob_url
    }

    async fn send(&self, method: HttpMethod, token: &str, body: Option<Vec<u8>>) -> SyncResult<HttpResponse> {
        let request = HttpRequest {
            method,
            url: self.blob_url.clone(),
            bearer_token: token.to_string(),
            body,
        };
        self.client
            .send(request)
            .await
            .map_err(SyncError::network)
    }

    fn parse_envelope(response: &HttpResponse) -> SyncResult<Envelope> {
        serde_json::from_slice(&response.body)
            .map_err(|e| SyncError::MalformedEnvelope(format!("invalid response body: {}", e)))
    }
}

#[async_trait]
impl<C: HttpClient> BlobTransport for HttpTransport<C> {
    async fn get_blob(&self, token: &str) -> SyncResult<Option<Envelope>> {
        let response = self.send(HttpMethod::Get, token, None).await?;

        if response.status == 404 || response.status == 204 {
            return Ok(None);
        }
        if !response.is_success() {
            return Err(SyncError::http_status(response.status, &response.reason));
        }

        Self::parse_envelope(&response).map(Some)
    }

    async fn put_blob(&self, token: &str, envelope: &Envelope) -> SyncResult<Envelope> {
        let body = serde_json::to_vec(&PutBlobBody { blob: envelope })
            .map_err(|e| SyncError::MalformedEnvelope(e.to_string()))?;
        let response = self.send(HttpMethod::Put, token, Some(body)).await?;

        if !response.is_success() {
            return Err(SyncError::http_status(response.status, &response.reason));
        }

        Self::parse_envelope(&response)
    }
}

/// [`HttpClient`] backed by `reqwest`.
#[cfg(feature = "reqwest-client")]
pub struct ReqwestClient {
    client: reqwest::Client,
}

#[cfg(feature = "reqwest-client")]
impl ReqwestClient {
    /// Builds a client with the configured request timeout.
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SyncError::network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[cfg(feature = "reqwest-client")]
#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        let builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Put => self.client.put(&request.url),
        };
        let mut builder = builder.bearer_auth(&request.bearer_token);
        if let Some(body) = request.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = builder.send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| e.to_string())?;

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            body: body.to_vec(),
        })
    }
}
