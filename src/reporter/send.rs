use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use reqwest::header;
use reqwest_middleware::ClientWithMiddleware;

use crate::prelude::*;
use crate::reporter::ReportPayload;
use crate::request_client::REQUEST_CLIENT;

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

pub struct Sender {
    client: ClientWithMiddleware,
}

impl Sender {
    pub fn new() -> Self {
        Self {
            client: REQUEST_CLIENT.clone(),
        }
    }

    /// POSTs the record to `{remote_url}/runs`. Success is exactly
    /// 201 Created; any other final status is an error carrying the response
    /// body. Transient failures are retried by the client middleware and
    /// every attempt replays the same request, idempotency key included.
    pub async fn send(&self, remote_url: &str, payload: &ReportPayload) -> Result<()> {
        let body = serde_json::to_string(&payload.request_data)
            .context("failed to serialize the report payload")?;
        debug!("outgoing data: {body}");

        let url = format!("{}/runs", remote_url.trim_end_matches('/'));
        let authorization = format!(
            "Basic {}",
            STANDARD.encode(format!(":{}", payload.upload_token))
        );
        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, authorization)
            .header(IDEMPOTENCY_KEY_HEADER, payload.idempotency_key.as_str())
            .body(body)
            .send()
            .await
            .with_context(|| format!("failed to reach {url}"))?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            bail!("upload rejected with status {status}: {body}");
        }
        Ok(())
    }
}

impl Default for Sender {
    fn default() -> Self {
        Self::new()
    }
}
