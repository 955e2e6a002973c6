//! Step sequencer - ordered verification steps for one visitor session
//!
//! Turns a resolved [`GateConfig`] into a fixed, totally ordered list of
//! steps ending in the terminal `docs` step, and encodes which transitions
//! are legal. Pure logic: no I/O happens here, only ordering.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::portal::GateConfig;
use crate::types::{GateError, Result};

// ============================================================================
// Steps
// ============================================================================

/// One stage in the access sequence.
///
/// The derived ordering is the canonical traversal order: email → otp →
/// password → nda → docs. Absent steps are elided, never reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStep {
    /// Capture the visitor's email address
    Email,
    /// Verify the email with a one-time code
    Otp,
    /// Check the shared password / email allow-list
    Password,
    /// Record NDA acceptance
    Nda,
    /// Terminal: the read-only document list is released
    Docs,
}

impl GateStep {
    /// Stable name used in logs and error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Otp => "otp",
            Self::Password => "password",
            Self::Nda => "nda",
            Self::Docs => "docs",
        }
    }
}

impl std::fmt::Display for GateStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the ordered step sequence for a configuration.
///
/// Deterministic: the same configuration always yields the same sequence.
/// The terminal `docs` step is always present and always last, even when
/// every flag is false.
pub fn build_sequence(config: &GateConfig) -> Vec<GateStep> {
    let mut sequence = Vec::with_capacity(5);
    if config.requires_email {
        sequence.push(GateStep::Email);
    }
    if config.requires_otp {
        sequence.push(GateStep::Otp);
    }
    if config.requires_password {
        sequence.push(GateStep::Password);
    }
    if config.requires_nda {
        sequence.push(GateStep::Nda);
    }
    sequence.push(GateStep::Docs);
    sequence
}

// ============================================================================
// Session
// ============================================================================

/// Mutable per-visitor state for one share link.
///
/// Owned exclusively by the visitor's flow, never shared across requests,
/// and discarded when the browsing session ends. The sequence is traversed
/// monotonically; backward jumps are the only legal resets.
#[derive(Debug, Clone)]
pub struct GateSession {
    sequence: Vec<GateStep>,
    current_index: usize,
    visitor_email: Option<String>,
    nda_accepted: bool,
}

impl GateSession {
    /// Create a session positioned at the first step of the sequence
    pub fn new(config: &GateConfig) -> Self {
        Self {
            sequence: build_sequence(config),
            current_index: 0,
            visitor_email: None,
            nda_accepted: false,
        }
    }

    /// The full step sequence
    pub fn sequence(&self) -> &[GateStep] {
        &self.sequence
    }

    /// The step the visitor is currently on
    pub fn current_step(&self) -> GateStep {
        self.sequence[self.current_index]
    }

    /// Whether the terminal `docs` step has been reached
    pub fn at_docs(&self) -> bool {
        self.current_step() == GateStep::Docs
    }

    /// Move forward by one step. Clamped: advancing at the last index is a
    /// no-op, so `docs` is never overrun.
    pub fn advance(&mut self) -> GateStep {
        if self.current_index + 1 < self.sequence.len() {
            self.current_index += 1;
            debug!(step = %self.current_step(), "gate advanced");
        }
        self.current_step()
    }

    /// Jump backward to an earlier step.
    ///
    /// Forward jumps are illegal: later steps depend on data captured in
    /// earlier ones. Resetting also discards data captured at or after the
    /// target step, since the visitor is redoing it.
    pub fn reset_to(&mut self, step: GateStep) -> Result<GateStep> {
        let target = self
            .sequence
            .iter()
            .position(|s| *s == step)
            .ok_or_else(|| {
                GateError::StepOrder(format!("step '{step}' is not part of this sequence"))
            })?;

        if target > self.current_index {
            return Err(GateError::StepOrder(format!(
                "cannot reset forward from '{}' to '{step}'",
                self.current_step()
            )));
        }

        // Discard data captured at or after the target step.
        if step <= GateStep::Email {
            self.visitor_email = None;
        }
        if step <= GateStep::Nda {
            self.nda_accepted = false;
        }

        self.current_index = target;
        debug!(step = %step, "gate reset");
        Ok(self.current_step())
    }

    /// Whether `step` still lies ahead of the current position
    pub fn step_remains(&self, step: GateStep) -> bool {
        self.sequence[self.current_index + 1..].contains(&step)
    }

    /// Captured visitor email, if the email step has been completed
    pub fn visitor_email(&self) -> Option<&str> {
        self.visitor_email.as_deref()
    }

    /// Record the captured email
    pub fn set_visitor_email(&mut self, email: impl Into<String>) {
        self.visitor_email = Some(email.into());
    }

    /// Whether the visitor has ticked the NDA acceptance box
    pub fn nda_accepted(&self) -> bool {
        self.nda_accepted
    }

    /// Record the NDA acceptance checkbox state
    pub fn set_nda_accepted(&mut self, accepted: bool) {
        self.nda_accepted = accepted;
    }
}
