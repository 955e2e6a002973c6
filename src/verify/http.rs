//! HTTP challenge backend against the verification and OTP services
//!
//! Wire contract:
//! - `POST verify {email, password}` → 200 granted, 401 wrong password,
//!   403 email not allow-listed, anything else is a transport failure.
//! - `POST otp {email}` → `{success}` issues or replaces the challenge.
//! - `POST otp {email, code}` → `{verified, error?}` checks a candidate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{OtpCheckOutcome, OtpService, PasswordOutcome, PasswordService};
use crate::types::{GateError, Result};

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct OtpRequest<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct OtpSendResponse {
    success: bool,
}

#[derive(Debug, Deserialize)]
struct OtpCheckResponse {
    verified: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Challenge backend speaking HTTP to the verification service.
///
/// Calls are made with the visitor's browsing-session credentials via the
/// shared client's cookie/header configuration, never an authenticated
/// account.
pub struct HttpChallengeService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpChallengeService {
    /// Create a backend sharing an existing HTTP client
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Create with a dedicated client using the given request timeout
    pub fn with_timeout(base_url: impl Into<String>, timeout: std::time::Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GateError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::new(client, base_url))
    }
}

#[async_trait]
impl PasswordService for HttpChallengeService {
    async fn verify(&self, email: &str, password: &str) -> Result<PasswordOutcome> {
        let url = format!("{}/verify", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&VerifyRequest { email, password })
            .send()
            .await?;

        let status = response.status();
        let outcome = match status {
            s if s.is_success() => PasswordOutcome::Granted,
            reqwest::StatusCode::UNAUTHORIZED => PasswordOutcome::WrongPassword,
            reqwest::StatusCode::FORBIDDEN => PasswordOutcome::EmailNotAllowed,
            s => {
                warn!(status = %s, "password verification transport failure");
                return Err(GateError::Transport(format!(
                    "verify endpoint returned {s}"
                )));
            }
        };

        debug!(email, ?outcome, "password verification completed");
        Ok(outcome)
    }
}

#[async_trait]
impl OtpService for HttpChallengeService {
    async fn send_code(&self, email: &str) -> Result<()> {
        let url = format!("{}/otp", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&OtpRequest { email, code: None })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GateError::Transport(format!(
                "otp endpoint returned {}",
                response.status()
            )));
        }

        let body: OtpSendResponse = response
            .json()
            .await
            .map_err(|e| GateError::Transport(format!("malformed otp response: {e}")))?;

        if !body.success {
            return Err(GateError::Transport(
                "otp service refused to dispatch a code".to_string(),
            ));
        }

        debug!(email, "one-time code dispatched");
        Ok(())
    }

    async fn check_code(&self, email: &str, code: &str) -> Result<OtpCheckOutcome> {
        let url = format!("{}/otp", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&OtpRequest {
                email,
                code: Some(code),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GateError::Transport(format!(
                "otp endpoint returned {}",
                response.status()
            )));
        }

        let body: OtpCheckResponse = response
            .json()
            .await
            .map_err(|e| GateError::Transport(format!("malformed otp response: {e}")))?;

        if body.verified {
            return Ok(OtpCheckOutcome::Verified);
        }

        let outcome = match body.error.as_deref() {
            Some("expired") => OtpCheckOutcome::Expired,
            _ => OtpCheckOutcome::Incorrect,
        };
        debug!(email, ?outcome, "one-time code rejected");
        Ok(outcome)
    }
}
