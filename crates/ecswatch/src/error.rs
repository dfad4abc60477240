//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use ecswatch_config::ConfigError;
use ecswatch_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const BACKEND: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to console backend at {url}")]
    #[diagnostic(
        code(ecswatch::connection_failed),
        help(
            "Check that the backend is running and reachable.\n\
             URL: {url}\n\
             Try: ecswatch snapshot --transport polling -v"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("The console channel closed unexpectedly")]
    #[diagnostic(code(ecswatch::channel_closed))]
    ChannelClosed,

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(ecswatch::auth_failed),
        help(
            "Verify the token or session cookie for this profile.\n\
             Run: ecswatch config set-secret --profile {profile}"
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(ecswatch::no_credentials),
        help(
            "Configure credentials with: ecswatch config init\n\
             Or set the ECSWATCH_TOKEN environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(ecswatch::not_found),
        help("Run: ecswatch {list_command} to see what the backend reported")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Backend ──────────────────────────────────────────────────────
    #[error("The backend reported an error: {message}")]
    #[diagnostic(
        code(ecswatch::backend_error),
        help("Data loaded before the error is still shown by `ecswatch watch`.")
    )]
    Backend { message: String },

    #[error("Protocol error: {message}")]
    #[diagnostic(code(ecswatch::protocol))]
    Protocol { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(ecswatch::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(ecswatch::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: ecswatch config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file not found")]
    #[diagnostic(
        code(ecswatch::no_config),
        help(
            "Create one with: ecswatch config init\n\
             Or pass --server. Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(ecswatch::config))]
    Config(ConfigError),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Timed out after {seconds}s")]
    #[diagnostic(
        code(ecswatch::timeout),
        help("Increase the timeout with --timeout, or check backend load.")
    )]
    Timeout { seconds: u64 },

    // ── Internal ─────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    #[diagnostic(code(ecswatch::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::ChannelClosed => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Backend { .. } => exit_code::BACKEND,
            Self::Validation { .. } | Self::ProfileNotFound { .. } | Self::NoConfig { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(other),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed {
                profile: "current".into(),
                message,
            },

            CoreError::ChannelClosed => CliError::ChannelClosed,

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::ClusterNotFound { identifier } => CliError::NotFound {
                resource_type: "cluster".into(),
                identifier,
                list_command: "clusters list".into(),
            },

            CoreError::ServiceNotFound { cluster, name } => CliError::NotFound {
                resource_type: "service".into(),
                identifier: format!("{cluster}/{name}"),
                list_command: format!("services list --cluster {cluster}"),
            },

            CoreError::InstanceNotFound { identifier } => CliError::NotFound {
                resource_type: "instance".into(),
                identifier,
                list_command: "instances list".into(),
            },

            CoreError::LoadFailed { message } => CliError::Backend { message },

            CoreError::Protocol { message } => CliError::Protocol { message },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        let timeout: CliError = CoreError::Timeout { timeout_secs: 30 }.into();
        assert_eq!(timeout.exit_code(), exit_code::TIMEOUT);

        let missing: CliError = CoreError::ClusterNotFound {
            identifier: "prod".into(),
        }
        .into();
        assert_eq!(missing.exit_code(), exit_code::NOT_FOUND);

        let auth: CliError = ConfigError::NoCredentials {
            profile: "prod".into(),
        }
        .into();
        assert_eq!(auth.exit_code(), exit_code::AUTH);

        let refused: CliError = CoreError::ConnectionFailed {
            url: "http://localhost:3000".into(),
            reason: "refused".into(),
        }
        .into();
        assert_eq!(refused.exit_code(), exit_code::CONNECTION);
    }
}
