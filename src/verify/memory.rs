//! In-memory OTP backend
//!
//! Reference implementation of the challenge semantics the backing service
//! owns: one challenge per email, replaced on resend, expiring after ten
//! minutes, consumed on successful verification so a code never verifies
//! twice. Used in development mode and in tests; no mail is dispatched, the
//! issued code is readable via [`MemoryOtpService::last_issued_code`].

use async_trait::async_trait;
use dashmap::DashMap;
use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::{OtpCheckOutcome, OtpService};
use crate::types::Result;

/// Default code lifetime
pub const DEFAULT_OTP_EXPIRY: Duration = Duration::from_secs(600);

/// One live challenge, keyed by visitor email
#[derive(Debug, Clone)]
struct Challenge {
    code: String,
    expires_at: Instant,
    consumed: bool,
}

/// In-memory OTP store with per-email challenges
pub struct MemoryOtpService {
    challenges: DashMap<String, Challenge>,
    expiry: Duration,
}

impl MemoryOtpService {
    /// Create a store with the default ten-minute expiry
    pub fn new() -> Self {
        Self::with_expiry(DEFAULT_OTP_EXPIRY)
    }

    /// Create a store with a custom code lifetime
    pub fn with_expiry(expiry: Duration) -> Self {
        Self {
            challenges: DashMap::new(),
            expiry,
        }
    }

    /// The code most recently issued for this email, if a challenge is live.
    /// Development-mode affordance; a real deployment dispatches by mail.
    pub fn last_issued_code(&self, email: &str) -> Option<String> {
        self.challenges.get(email).map(|c| c.code.clone())
    }

    /// Drop challenges whose lifetime has elapsed
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let before = self.challenges.len();
        self.challenges.retain(|_, c| c.expires_at > now);
        before - self.challenges.len()
    }

    fn generate_code() -> String {
        format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
    }
}

impl Default for MemoryOtpService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OtpService for MemoryOtpService {
    async fn send_code(&self, email: &str) -> Result<()> {
        let challenge = Challenge {
            code: Self::generate_code(),
            expires_at: Instant::now() + self.expiry,
            consumed: false,
        };
        // Replace, not append: a resend invalidates the previous code.
        self.challenges.insert(email.to_string(), challenge);
        debug!(email, "in-memory challenge issued");
        Ok(())
    }

    async fn check_code(&self, email: &str, code: &str) -> Result<OtpCheckOutcome> {
        let mut entry = match self.challenges.get_mut(email) {
            Some(entry) => entry,
            None => return Ok(OtpCheckOutcome::Incorrect),
        };

        if entry.expires_at <= Instant::now() {
            return Ok(OtpCheckOutcome::Expired);
        }

        // A consumed challenge never verifies again.
        if entry.consumed || entry.code != code {
            return Ok(OtpCheckOutcome::Incorrect);
        }

        entry.consumed = true;
        debug!(email, "in-memory challenge consumed");
        Ok(OtpCheckOutcome::Verified)
    }
}
