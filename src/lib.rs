//! Anteroom - visitor gate and engagement telemetry for shared document portals
//!
//! Anteroom gates access to a shared document collection behind a
//! configurable sequence of verification steps, then measures how long each
//! visitor actually spends viewing each document.
//!
//! ## Subsystems
//!
//! - **Portal**: resolves a share link to its gate configuration and catalog
//!   metadata
//! - **Gate**: deterministic step sequencing (email → otp → password → nda →
//!   docs) with legality of transitions
//! - **Verify**: password check and one-time code protocols against the
//!   backing verification service
//! - **Nda**: one-shot consent recording
//! - **Engagement**: per-document heartbeat telemetry with a guaranteed
//!   closing flush
//! - **Flow**: the orchestrator a host application drives one visitor through

pub mod config;
pub mod engagement;
pub mod flow;
pub mod gate;
pub mod logging;
pub mod nda;
pub mod portal;
pub mod types;
pub mod verify;

pub use config::Args;
pub use engagement::{EngagementSession, EngagementTracker, HeartbeatEvent, TelemetrySink};
pub use flow::{CodeSubmission, FlowExit, GateServices, PortalFlow};
pub use gate::{build_sequence, GateSession, GateStep};
pub use nda::{NdaOutcome, NdaService};
pub use portal::{GateConfig, PortalMetadata, PortalResolver, ResolvedPortal};
pub use types::{GateError, Result};
pub use verify::{
    code_is_complete, OtpCheckOutcome, OtpController, OtpService, PasswordOutcome, PasswordService,
};
