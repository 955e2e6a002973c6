//! Shared types for Anteroom

pub mod error;

pub use error::{GateError, Result};
