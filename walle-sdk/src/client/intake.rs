//! Intake API client (gateway → ledger service).

use reqwest::Client;
use url::Url;

use super::ClientError;
use crate::objects::{ApiErrorBody, DepositRequest, DepositResponse};

/// Typed HTTP client for the intake API.
///
/// Caller identity is established by the gateway in front of the service;
/// this client only speaks the deposit call itself.
#[derive(Debug, Clone)]
pub struct IntakeClient {
    http: Client,
    base_url: Url,
}

impl IntakeClient {
    /// Create a new `IntakeClient` rooted at `base_url`
    /// (e.g. `http://ledger.internal:8080`).
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

    /// `POST /deposits` – initiate a deposit.
    ///
    /// Safe to repeat: the same `idempotency_key` always yields the same
    /// transaction id.
    pub async fn deposit(&self, request: &DepositRequest) -> Result<DepositResponse, ClientError> {
        let url = self.base_url.join("/deposits")?;
        let resp = self.http.post(url).json(request).send().await?;
        parse_response(resp).await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(body) => ClientError::Api { status, body },
            Err(_) => ClientError::Unexpected { status, body },
        });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}
