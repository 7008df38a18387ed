//! HTTP client for the screening pipeline APIs.
//!
//! Gated behind the `client` cargo feature so downstream crates that only
//! need the shared types do not pull in `reqwest`.
//!
//! The ingestion and fraud-detection services listen on different ports.
//! Point one [`AmlClient`] at each service, or a single one at a server
//! running both roles.

use reqwest::{Client, StatusCode};
use url::Url;

use crate::objects::{
    BlacklistAccountRequest, ClearResponse, ListTransactionsQuery, ListTransactionsResponse,
    ProcessingResponse, ReplayPendingQuery, ReplayPendingResponse, RiskStatsResponse,
    TransactionPayload, TransactionStatusResponse,
};

/// Errors produced by the SDK HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection reset, …).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("api error: status {status}, body: {body}")]
    Api { status: StatusCode, body: String },

    /// Response body could not be deserialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The base URL could not be joined with the endpoint path.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

/// Typed HTTP client for the screening pipeline.
#[derive(Debug, Clone)]
pub struct AmlClient {
    http: Client,
    base_url: Url,
}

impl AmlClient {
    /// Create a new `AmlClient`.
    ///
    /// * `base_url`: root URL of the service (e.g. `http://localhost:8080`).
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one (e.g. to
    /// configure timeouts or a proxy).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `POST /api/v1/transactions`: submit a transaction for screening.
    pub async fn submit(
        &self,
        payload: &TransactionPayload,
    ) -> Result<ProcessingResponse, ClientError> {
        let url = self.base_url.join("/api/v1/transactions")?;
        let resp = self.http.post(url).json(payload).send().await?;
        parse_response(resp).await
    }

    /// `GET /api/v1/transactions/{processing_id}`: screening status of one
    /// submission.
    pub async fn status(
        &self,
        processing_id: &str,
    ) -> Result<TransactionStatusResponse, ClientError> {
        let path = format!(
            "/api/v1/transactions/{}",
            urlencoding::encode(processing_id)
        );
        let url = self.base_url.join(&path)?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `GET /api/v1/transactions`: most recent submissions first.
    pub async fn list(
        &self,
        query: &ListTransactionsQuery,
    ) -> Result<ListTransactionsResponse, ClientError> {
        let url = self.base_url.join("/api/v1/transactions")?;
        let resp = self.http.get(url).query(query).send().await?;
        parse_response(resp).await
    }

    /// `DELETE /api/v1/transactions`: drop every submission and cached
    /// screening artifact. Blacklists survive.
    pub async fn clear(&self) -> Result<ClearResponse, ClientError> {
        let url = self.base_url.join("/api/v1/transactions")?;
        let resp = self.http.delete(url).send().await?;
        parse_response(resp).await
    }

    /// `POST /api/v1/transactions/replay-pending`: republish screening jobs
    /// for submissions stuck in `pending_review`.
    pub async fn replay_pending(
        &self,
        query: &ReplayPendingQuery,
    ) -> Result<ReplayPendingResponse, ClientError> {
        let url = self.base_url.join("/api/v1/transactions/replay-pending")?;
        let resp = self.http.post(url).query(query).send().await?;
        parse_response(resp).await
    }

    /// `POST /api/v1/blacklist/accounts`: add a counterparty account to the
    /// blacklist.
    pub async fn add_to_blacklist(&self, account_number: &str) -> Result<(), ClientError> {
        let url = self.base_url.join("/api/v1/blacklist/accounts")?;
        let body = BlacklistAccountRequest {
            account_number: account_number.to_string(),
        };
        let resp = self.http.post(url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, body });
        }
        Ok(())
    }

    /// `GET /api/v1/stats`: screening counters per risk level.
    pub async fn stats(&self) -> Result<RiskStatsResponse, ClientError> {
        let url = self.base_url.join("/api/v1/stats")?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}
