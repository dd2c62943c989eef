//! # Response Delivery
//!
//! Uploads the response document to the pre-signed `ResponseURL`.
//!
//! Only needed when the handler is invoked directly by CloudFormation. Under
//! a provider framework the framework sends the response itself.

use super::event::CustomResourceResponse;
use anyhow::{Context, Result};
use reqwest::Client;
use tracing::{info, info_span, Instrument};

/// HTTP client for custom-resource responses
#[derive(Debug, Clone)]
pub struct ResponseSender {
    client: Client,
}

impl ResponseSender {
    /// Build the HTTP client
    ///
    /// # Errors
    ///
    /// Fails when the TLS backend cannot be initialised.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }

    /// PUT the response to `response_url`
    ///
    /// The pre-signed S3 URL is signed without a content type, so the header
    /// is sent empty.
    ///
    /// # Errors
    ///
    /// Fails on transport errors and on any non-success HTTP status.
    pub async fn send(&self, response_url: &str, response: &CustomResourceResponse) -> Result<()> {
        let span = info_span!(
            "cfn.response.send",
            status = ?response.status,
            request_id = %response.request_id
        );

        async move {
            let body = serde_json::to_vec(response).context("Failed to serialize response")?;
            let http_response = self
                .client
                .put(response_url)
                .header(reqwest::header::CONTENT_TYPE, "")
                .header(reqwest::header::CONTENT_LENGTH, body.len())
                .body(body)
                .send()
                .await
                .context("Failed to send custom resource response")?;

            if !http_response.status().is_success() {
                let status = http_response.status();
                let error_text = http_response.text().await.unwrap_or_default();
                return Err(anyhow::anyhow!(
                    "Custom resource response rejected: HTTP {status}: {error_text}"
                ));
            }

            info!("Custom resource response delivered");
            Ok(())
        }
        .instrument(span)
        .await
    }
}
