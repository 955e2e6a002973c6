//! Challenge verification - password check and one-time code protocols
//!
//! Two independent sub-protocols sharing the visitor's email. Outcomes are
//! typed so each rejection kind keeps its own user-visible message; wrong
//! password and email-not-allowed are never collapsed. Transport failures
//! are errors, not outcomes, and never advance the gate.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::types::{GateError, Result};

pub use http::HttpChallengeService;
pub use memory::MemoryOtpService;

/// Exact length of a well-formed one-time code
pub const OTP_CODE_LEN: usize = 6;

// ============================================================================
// Outcomes
// ============================================================================

/// Typed outcome of a password verification call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordOutcome {
    /// Access granted; the gate may advance
    Granted,
    /// The password is incorrect; the visitor may retry
    WrongPassword,
    /// The email is not on the portal's allow-list
    EmailNotAllowed,
}

/// Typed outcome of a one-time code check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpCheckOutcome {
    /// The code matched; it is consumed and cannot be replayed
    Verified,
    /// The code did not match (or was malformed)
    Incorrect,
    /// The code's ten-minute lifetime has elapsed
    Expired,
}

// ============================================================================
// Backend traits
// ============================================================================

/// Password verification backend (allows mocking in tests).
///
/// An empty password means "password not required": the backing service
/// grants when the portal has no password configured. This carries the
/// compound OTP-then-grant transition.
#[async_trait]
pub trait PasswordService: Send + Sync {
    async fn verify(&self, email: &str, password: &str) -> Result<PasswordOutcome>;
}

/// One-time code backend. The challenge itself (code, expiry, consumption)
/// is owned by the service; the client never assumes authoritative state.
#[async_trait]
pub trait OtpService: Send + Sync {
    /// Create or replace the challenge for this email and dispatch the code
    async fn send_code(&self, email: &str) -> Result<()>;

    /// Check a candidate code against the live challenge
    async fn check_code(&self, email: &str, code: &str) -> Result<OtpCheckOutcome>;
}

// ============================================================================
// Code shape
// ============================================================================

/// Whether a candidate code is syntactically complete (exactly six ASCII
/// digits). The UI auto-submits as soon as this becomes true.
pub fn code_is_complete(code: &str) -> bool {
    code.len() == OTP_CODE_LEN && code.bytes().all(|b| b.is_ascii_digit())
}

// ============================================================================
// Controller
// ============================================================================

/// Client-side state for the one-time code step.
///
/// Owns the resend cooldown so a premature reissue is rejected without a
/// server round trip, and fails malformed codes fast before any network
/// call. The deadline is plain data, not a spawned timer, so leaving the
/// step cancels the countdown by construction.
#[derive(Debug)]
pub struct OtpController {
    resend_cooldown: Duration,
    cooldown_until: Option<Instant>,
}

impl OtpController {
    /// Create a controller with the given resend cooldown
    pub fn new(resend_cooldown: Duration) -> Self {
        Self {
            resend_cooldown,
            cooldown_until: None,
        }
    }

    /// Issue (or reissue) a code for this email.
    ///
    /// Rejected client-side with [`GateError::RateLimited`] while the
    /// cooldown from the previous issuance is live. On success the cooldown
    /// restarts; the backing service replaces any previous code.
    pub async fn issue(&mut self, service: &dyn OtpService, email: &str) -> Result<()> {
        if let Some(remaining) = self.cooldown_remaining() {
            debug!(email, remaining_secs = remaining.as_secs(), "resend rejected, cooldown live");
            return Err(GateError::RateLimited {
                retry_after_secs: remaining.as_secs().max(1),
            });
        }

        service.send_code(email).await?;
        self.cooldown_until = Some(Instant::now() + self.resend_cooldown);
        debug!(email, "one-time code issued");
        Ok(())
    }

    /// Check a candidate code.
    ///
    /// A code of the wrong length or with non-digit characters is rejected
    /// here, without a network call. On `Verified` the cooldown is cleared:
    /// the challenge is consumed and the countdown no longer applies.
    pub async fn check(
        &mut self,
        service: &dyn OtpService,
        email: &str,
        code: &str,
    ) -> Result<OtpCheckOutcome> {
        if !code_is_complete(code) {
            debug!(email, "malformed code rejected client-side");
            return Ok(OtpCheckOutcome::Incorrect);
        }

        let outcome = service.check_code(email, code).await?;
        if outcome == OtpCheckOutcome::Verified {
            self.cooldown_until = None;
        }
        Ok(outcome)
    }

    /// Time left on the resend cooldown, if it is still live
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        let until = self.cooldown_until?;
        let remaining = until.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            None
        } else {
            Some(remaining)
        }
    }

    /// Drop all countdown state. Called when the visitor leaves the
    /// email/otp steps so no stale cooldown survives a reset.
    pub fn reset(&mut self) {
        self.cooldown_until = None;
    }
}
