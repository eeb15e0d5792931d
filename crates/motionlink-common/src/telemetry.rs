//! Console tracing setup for motionlink binaries.
//!
//! ```ignore
//! use motionlink_common::telemetry::{self, TelemetryConfig};
//!
//! telemetry::init(TelemetryConfig::from_env("motionlink"));
//! tracing::info!("pipeline started");
//! ```

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    /// Console log level (default: INFO, DEBUG in debug builds)
    pub console_level: Level,
}

impl TelemetryConfig {
    /// `RUST_LOG`, when set, takes precedence over `console_level`.
    pub fn from_env(service_name: impl Into<String>) -> Self {
        let console_level = if cfg!(debug_assertions) {
            Level::DEBUG
        } else {
            Level::INFO
        };

        Self {
            service_name: service_name.into(),
            console_level,
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.console_level = level;
        self
    }
}

/// Install the global subscriber. Call once at startup.
pub fn init(config: TelemetryConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.console_level.as_str().to_lowercase()));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_filter(env_filter);

    if let Err(e) = tracing_subscriber::registry().with(console_layer).try_init() {
        eprintln!("tracing already initialized: {e}");
        return;
    }

    tracing::debug!(service = %config.service_name, "telemetry initialized");
}
