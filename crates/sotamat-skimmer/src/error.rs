//! CLI error types with miette diagnostics.
//!
//! Maps config and core errors into operator-facing errors with help text
//! and the process exit code.

use miette::Diagnostic;
use thiserror::Error;

use skimmer_config::ConfigError;
use skimmer_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    /// Unrecoverable internal fault.
    pub const INTERNAL: i32 = 1;
    /// Configuration or authentication failed before monitoring started.
    pub const STARTUP: i32 = 2;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Missing required setting(s): {fields}")]
    #[diagnostic(
        code(skimmer::missing_settings),
        help(
            "Pass --callsign, --password and --gridsquare, or set SOTAMAT_CALLSIGN,\n\
             SOTAMAT_PASSWORD and SOTAMAT_GRIDSQUARE. Try --help for details."
        )
    )]
    MissingSettings { fields: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(skimmer::validation))]
    Validation { field: String, reason: String },

    #[error("Configuration file not found: {path}")]
    #[diagnostic(code(skimmer::no_config))]
    ConfigNotFound { path: String },

    #[error("Could not load configuration: {message}")]
    #[diagnostic(code(skimmer::config))]
    ConfigLoad { message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("SOTAmat rejected the credentials ({detail})")]
    #[diagnostic(
        code(skimmer::auth_failed),
        help(
            "Check your callsign and password at https://sotamat.com.\n\
             The server's reply is logged above."
        )
    )]
    AuthFailed { detail: String },

    // ── Internal ─────────────────────────────────────────────────────
    #[error("Internal sotamat-skimmer error: {message}")]
    #[diagnostic(
        code(skimmer::internal),
        help("Please report this to support@sotamat.com")
    )]
    Internal { message: String },
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingSettings { .. }
            | Self::Validation { .. }
            | Self::ConfigNotFound { .. }
            | Self::ConfigLoad { .. }
            | Self::AuthFailed { .. } => exit_code::STARTUP,
            Self::Internal { .. } => exit_code::INTERNAL,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::MissingFields { fields } => CliError::MissingSettings {
                fields: fields.join(", "),
            },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Figment(e) => CliError::ConfigLoad {
                message: e.to_string(),
            },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Config { message } => CliError::Validation {
                field: "configuration".into(),
                reason: message,
            },
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { detail: message },
            other => CliError::Internal {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_failures_exit_with_two() {
        let err = CliError::from(ConfigError::MissingFields {
            fields: vec!["callsign", "gridsquare"],
        });
        assert_eq!(err.exit_code(), exit_code::STARTUP);
        assert_eq!(err.to_string(), "Missing required setting(s): callsign, gridsquare");
    }

    #[test]
    fn internal_fault_exits_with_one() {
        let err = CliError::from(CoreError::Internal("monitor died".into()));
        assert_eq!(err.exit_code(), exit_code::INTERNAL);
    }
}
