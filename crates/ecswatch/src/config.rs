//! CLI configuration: thin wrapper around `ecswatch_config` shared types.
//!
//! Re-exports the shared types and adds CLI-specific resolution that
//! respects `GlobalOpts` flag overrides (--server, --token, --transport).

use std::time::Duration;

use secrecy::SecretString;

use ecswatch_core::{AuthCredentials, ConsoleConfig, TlsVerification, TransportKind};

use crate::cli::{GlobalOpts, TransportChoice};
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use ecswatch_config::{
    ClientState, Config, Profile, config_path, load_config_or_default, save_config, save_state,
    state_path,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Persisted client state. A corrupt state file is not fatal: the session
/// starts from defaults and the next save overwrites it.
pub fn load_state_or_default() -> ClientState {
    ecswatch_config::load_state().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ignoring unreadable client state");
        ClientState::default()
    })
}

/// Build the session configuration from the config file, persisted state,
/// and CLI overrides. Returns the profile name alongside it so commands can
/// record state changes against the right profile.
pub fn build_console_config(global: &GlobalOpts) -> Result<(String, ConsoleConfig), CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);
    let state = load_state_or_default().profile(&profile_name);

    let mut config = if let Some(profile) = cfg.profiles.get(&profile_name) {
        resolve_profile(profile, &profile_name, global, state)?
    } else {
        // No profile: build from CLI flags / env vars alone
        if global.profile.is_some() {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: available_profiles(&cfg),
            });
        }
        let server = global.server.as_deref().ok_or_else(|| CliError::NoConfig {
            path: config_path().display().to_string(),
        })?;
        let mut config = ConsoleConfig::new(ecswatch_config::parse_server(server)?);
        config.auth = global
            .token
            .as_ref()
            .map_or(AuthCredentials::None, |t| {
                AuthCredentials::Token(SecretString::from(t.clone()))
            });
        config.progressive_loading = state.progressive_loading.unwrap_or(true);
        config.refresh_interval = state.refresh_interval.unwrap_or_default();
        config
    };

    if global.insecure || cfg.defaults.insecure {
        config.tls = TlsVerification::DangerAcceptInvalid;
    }
    config.timeout = Duration::from_secs(global.timeout);
    if let Some(choice) = global.transport {
        config.transports = vec![transport_kind(choice)];
    }

    Ok((profile_name, config))
}

/// Translate a `Profile` + global flags into a `ConsoleConfig`.
///
/// CLI flag overrides take priority over profile values.
pub fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    global: &GlobalOpts,
    state: ecswatch_config::ProfileState,
) -> Result<ConsoleConfig, CliError> {
    let mut effective = profile.clone();

    // 1. Server URL (flag > env > profile)
    if let Some(ref server) = global.server {
        effective.server.clone_from(server);
    }

    // 2. Token flag skips the keyring / env chain entirely
    let flag_token = global.token.as_ref().map(|t| SecretString::from(t.clone()));
    if flag_token.is_some() {
        effective.auth_mode = "none".into();
    }

    let mut config = ecswatch_config::profile_to_console_config(&effective, profile_name, state)?;
    if let Some(token) = flag_token {
        config.auth = AuthCredentials::Token(token);
    }
    Ok(config)
}

pub fn available_profiles(cfg: &Config) -> String {
    let mut names: Vec<_> = cfg.profiles.keys().cloned().collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort();
    names.join(", ")
}

fn transport_kind(choice: TransportChoice) -> TransportKind {
    match choice {
        TransportChoice::Websocket => TransportKind::WebSocket,
        TransportChoice::Polling => TransportKind::Polling,
    }
}
