//! NDA acceptance gate
//!
//! A one-shot side-effecting step: recording consent (email plus, at the
//! transport layer, timestamp and source IP) is the only way past the `nda`
//! step. Declining routes the visitor out of the portal entirely, never
//! back a step.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{GateError, Result};

/// Typed outcome of the signature call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NdaOutcome {
    /// Consent recorded; the gate advances
    Accepted,
    /// The recording service refused; the visitor may retry
    Failed,
}

/// NDA signature backend (allows mocking in tests)
#[async_trait]
pub trait NdaService: Send + Sync {
    /// Record consent for this email. Returns whether the service accepted.
    async fn sign(&self, email: &str) -> Result<bool>;
}

#[derive(Debug, Serialize)]
struct SignRequest<'a> {
    email: &'a str,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    success: bool,
}

/// HTTP backend for the NDA-signature recording service
pub struct HttpNdaService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpNdaService {
    /// Create a backend sharing an existing HTTP client
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl NdaService for HttpNdaService {
    async fn sign(&self, email: &str) -> Result<bool> {
        let url = format!("{}/nda-sign", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&SignRequest { email })
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "nda signature transport failure");
            return Err(GateError::Transport(format!(
                "nda-sign endpoint returned {}",
                response.status()
            )));
        }

        let body: SignResponse = response
            .json()
            .await
            .map_err(|e| GateError::Transport(format!("malformed nda-sign response: {e}")))?;

        debug!(email, success = body.success, "nda signature recorded");
        Ok(body.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_request_shape() {
        let body = serde_json::to_value(SignRequest { email: "a@b.com" }).unwrap();
        assert_eq!(body, serde_json::json!({"email": "a@b.com"}));
    }
}
