//! Configuration for Anteroom
//!
//! Environment-driven settings using clap, so embedding applications can
//! parse from CLI args or env vars interchangeably.

use clap::Parser;
use std::time::Duration;

/// Anteroom - visitor gate and engagement telemetry for shared document portals
#[derive(Parser, Debug, Clone)]
#[command(name = "anteroom")]
#[command(about = "Visitor gating and engagement telemetry for shared document portals")]
pub struct Args {
    /// Base URL of the backing portal API (catalog, verification, OTP, NDA,
    /// telemetry collector all hang off this root)
    #[arg(long, env = "PORTAL_API_URL", default_value = "http://localhost:8080/api")]
    pub api_url: String,

    /// Request timeout in milliseconds for backing-service calls
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Heartbeat cadence for engagement telemetry, in seconds
    #[arg(long, env = "HEARTBEAT_INTERVAL_SECS", default_value = "10")]
    pub heartbeat_interval_secs: u64,

    /// Cooldown before a one-time code may be resent, in seconds
    #[arg(long, env = "OTP_RESEND_COOLDOWN_SECS", default_value = "60")]
    pub otp_resend_cooldown_secs: u64,

    /// Lifetime of an issued one-time code, in seconds
    #[arg(long, env = "OTP_EXPIRY_SECS", default_value = "600")]
    pub otp_expiry_secs: u64,

    /// Enable development mode (in-memory OTP backend, issued codes readable)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Heartbeat interval as a Duration
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// OTP resend cooldown as a Duration
    pub fn otp_resend_cooldown(&self) -> Duration {
        Duration::from_secs(self.otp_resend_cooldown_secs)
    }

    /// OTP code lifetime as a Duration
    pub fn otp_expiry(&self) -> Duration {
        Duration::from_secs(self.otp_expiry_secs)
    }

    /// Request timeout as a Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.heartbeat_interval_secs == 0 {
            return Err("HEARTBEAT_INTERVAL_SECS must be greater than zero".to_string());
        }

        if self.otp_resend_cooldown_secs >= self.otp_expiry_secs {
            return Err(
                "OTP_RESEND_COOLDOWN_SECS must be shorter than OTP_EXPIRY_SECS".to_string(),
            );
        }

        if self.api_url.is_empty() {
            return Err("PORTAL_API_URL must not be empty".to_string());
        }

        Ok(())
    }
}
