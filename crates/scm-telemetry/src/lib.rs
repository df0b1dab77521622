//! # SCM Telemetry
//!
//! Log output setup shared by the SCM bridge crates and tools.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scm_telemetry::{init_logging, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     init_logging(&TelemetryConfig::from_env())?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SCM_SERVICE_NAME` | `scm-bridge` | Service name |
//! | `SCM_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `SCM_CONSOLE_OUTPUT` | `true` | Write events to stderr |
//! | `SCM_JSON_LOGS` | `false` | One JSON object per event |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{build_filter, init_logging};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Global subscriber already initialized: {0}")]
    AlreadyInitialized(String),
}
