//! Structured tracing helpers.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Default filter used when neither `RUST_LOG` nor a directive is supplied.
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Subscriber settings, typically embedded in a larger configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Filter directive applied when `RUST_LOG` is unset, e.g. `agent_backends=debug`.
    pub directive: String,
    /// Whether to emit ANSI colour codes.
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            directive: DEFAULT_DIRECTIVE.to_owned(),
            ansi: true,
        }
    }
}

impl TelemetryConfig {
    /// Overrides the fallback filter directive.
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directive = directive.into();
        self
    }

    /// Enables or disables ANSI output.
    #[must_use]
    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    /// Resolves the effective filter: `RUST_LOG` first, then `directive`.
    ///
    /// # Errors
    ///
    /// Returns an error when `directive` cannot be parsed.
    pub fn env_filter(&self) -> Result<EnvFilter> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.directive)
            .with_context(|| format!("invalid tracing directive `{}`", self.directive))
    }

    /// Installs the global `fmt` subscriber.
    ///
    /// # Errors
    ///
    /// Returns an error when the directive is invalid or a global subscriber
    /// is already installed.
    pub fn install(&self) -> Result<()> {
        let filter = self.env_filter()?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(self.ansi)
            .try_init()
            .map_err(|err| anyhow!(err))?;
        debug!(directive = %self.directive, "tracing subscriber installed");
        Ok(())
    }
}

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// `default_directive`.
///
/// # Errors
///
/// Returns an error when the directive is invalid or a global subscriber is
/// already installed.
pub fn init_tracing(default_directive: &str) -> Result<()> {
    TelemetryConfig::default()
        .with_directive(default_directive)
        .install()
}
