//! Shared configuration for the ecswatch CLI.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! persisted client state, and translation to
//! `ecswatch_core::ConsoleConfig`. The CLI adds `GlobalOpts`-aware
//! overrides on top.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ecswatch_core::{
    AuthCredentials, ConsoleConfig, RefreshInterval, TlsVerification, TransportKind,
};

/// Service name for keyring entries.
pub const KEYRING_SERVICE: &str = "ecswatch";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named console profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}

/// A named console profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Console backend base URL (e.g., "https://console.internal").
    pub server: String,

    /// Auth mode: "token", "cookie", or "none".
    #[serde(default = "default_auth_mode")]
    pub auth_mode: String,

    /// Bearer token (plaintext; prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable name containing the token.
    pub token_env: Option<String>,

    /// Session cookie (plaintext; prefer keyring).
    pub cookie: Option<String>,

    /// Socket.IO mount path override.
    pub socket_path: Option<String>,

    /// Socket.IO namespace override.
    pub namespace: Option<String>,

    /// Transports to try, in order ("websocket", "polling").
    pub transports: Option<Vec<String>>,

    /// Ask for staged delivery. Overridden by the last toggle recorded in
    /// the client state.
    pub progressive_loading: Option<bool>,

    pub reconnect_attempts: Option<u32>,

    /// Seconds between reconnect attempts.
    pub reconnect_delay: Option<u64>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,
}

impl Profile {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            auth_mode: default_auth_mode(),
            token: None,
            token_env: None,
            cookie: None,
            socket_path: None,
            namespace: None,
            transports: None,
            progressive_loading: None,
            reconnect_attempts: None,
            reconnect_delay: None,
            ca_cert: None,
            insecure: None,
            timeout: None,
        }
    }
}

fn default_auth_mode() -> String {
    "token".into()
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "ecswatch", "ecswatch")
}

fn home_fallback(parts: &[&str]) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.extend(parts);
    p
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(&[".config", "ecswatch", "config.toml"]),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Where persisted client state (last refresh interval, progressive
/// toggle) lives. Kept apart from the hand-edited config file.
pub fn state_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(&[".local", "state", "ecswatch", "state.toml"]),
        |dirs| dirs.data_local_dir().join("state.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. `ECSWATCH_`-prefixed variables override file
/// values, with `__` separating nested keys
/// (`ECSWATCH_DEFAULTS__OUTPUT=json`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("ECSWATCH_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_else(|e| {
        tracing::debug!(error = %e, "using default configuration");
        Config::default()
    })
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(&config_path(), cfg)
}

pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    write_toml(path, cfg)
}

fn write_toml<T: Serialize>(path: &Path, value: &T) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(value)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Client state ────────────────────────────────────────────────────

/// Settings the console remembers between sessions, per profile.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ClientState {
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileState>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProfileState {
    pub refresh_interval: Option<RefreshInterval>,
    pub progressive_loading: Option<bool>,
}

impl ClientState {
    pub fn profile(&self, name: &str) -> ProfileState {
        self.profiles.get(name).copied().unwrap_or_default()
    }

    pub fn record_interval(&mut self, profile: &str, interval: RefreshInterval) {
        self.profiles
            .entry(profile.to_owned())
            .or_default()
            .refresh_interval = Some(interval);
    }

    pub fn record_progressive(&mut self, profile: &str, enabled: bool) {
        self.profiles
            .entry(profile.to_owned())
            .or_default()
            .progressive_loading = Some(enabled);
    }
}

pub fn load_state() -> Result<ClientState, ConfigError> {
    load_state_from(&state_path())
}

/// Missing file means nothing was persisted yet.
pub fn load_state_from(path: &Path) -> Result<ClientState, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ClientState::default()),
        Err(e) => return Err(e.into()),
    };
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

pub fn save_state(state: &ClientState) -> Result<(), ConfigError> {
    save_state_to(&state_path(), state)
}

pub fn save_state_to(path: &Path, state: &ClientState) -> Result<(), ConfigError> {
    write_toml(path, state)
}

// ── Credential resolution (without CLI flags) ───────────────────────

fn keyring_entry(profile_name: &str, kind: &str) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(
        KEYRING_SERVICE,
        &format!("{profile_name}/{kind}"),
    )?)
}

fn keyring_secret(profile_name: &str, kind: &str) -> Option<SecretString> {
    let entry = keyring_entry(profile_name, kind).ok()?;
    entry.get_password().ok().map(SecretString::from)
}

/// Store a secret (`kind` is "token" or "cookie") in the system keyring.
pub fn store_secret(profile_name: &str, kind: &str, secret: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name, kind)?.set_password(secret)?;
    tracing::debug!(profile = profile_name, kind, "stored secret in keyring");
    Ok(())
}

/// Resolve a bearer token from the credential chain (no CLI flag step).
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's token_env → env var lookup
    if let Some(ref env_name) = profile.token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Some(secret) = keyring_secret(profile_name, "token") {
        return Ok(secret);
    }

    // 3. Plaintext in config
    if let Some(ref token) = profile.token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Resolve a session cookie: keyring, then plaintext.
pub fn resolve_cookie(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    if let Some(secret) = keyring_secret(profile_name, "cookie") {
        return Ok(secret);
    }
    if let Some(ref cookie) = profile.cookie {
        return Ok(SecretString::from(cookie.clone()));
    }
    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Resolve `AuthCredentials` from a profile's `auth_mode` field.
pub fn resolve_auth(profile: &Profile, profile_name: &str) -> Result<AuthCredentials, ConfigError> {
    match profile.auth_mode.as_str() {
        "token" => Ok(AuthCredentials::Token(resolve_token(profile, profile_name)?)),
        "cookie" => Ok(AuthCredentials::Cookie(resolve_cookie(
            profile,
            profile_name,
        )?)),
        "none" => Ok(AuthCredentials::None),
        other => Err(ConfigError::Validation {
            field: "auth_mode".into(),
            reason: format!("expected 'token', 'cookie', or 'none', got '{other}'"),
        }),
    }
}

// ── Translation ─────────────────────────────────────────────────────

pub fn parse_server(server: &str) -> Result<url::Url, ConfigError> {
    server.parse().map_err(|_| ConfigError::Validation {
        field: "server".into(),
        reason: format!("invalid URL: {server}"),
    })
}

pub fn parse_transports(names: &[String]) -> Result<Vec<TransportKind>, ConfigError> {
    let kinds = names
        .iter()
        .map(|name| {
            TransportKind::from_str(name.trim()).map_err(|_| ConfigError::Validation {
                field: "transports".into(),
                reason: format!("expected 'websocket' or 'polling', got '{name}'"),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if kinds.is_empty() {
        return Err(ConfigError::Validation {
            field: "transports".into(),
            reason: "at least one transport is required".into(),
        });
    }
    Ok(kinds)
}

/// Build a `ConsoleConfig` from a profile and its persisted state.
///
/// State wins over the profile for settings the user toggles at runtime
/// (progressive loading); the refresh interval only ever comes from state.
pub fn profile_to_console_config(
    profile: &Profile,
    profile_name: &str,
    state: ProfileState,
) -> Result<ConsoleConfig, ConfigError> {
    let mut config = ConsoleConfig::new(parse_server(&profile.server)?);
    config.auth = resolve_auth(profile, profile_name)?;

    config.tls = if profile.insecure.unwrap_or(false) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    if let Some(timeout) = profile.timeout {
        config.timeout = Duration::from_secs(timeout);
    }
    if let Some(ref path) = profile.socket_path {
        config.socket_path.clone_from(path);
    }
    if let Some(ref namespace) = profile.namespace {
        config.namespace.clone_from(namespace);
    }
    if let Some(ref names) = profile.transports {
        config.transports = parse_transports(names)?;
    }
    if let Some(attempts) = profile.reconnect_attempts {
        config.reconnect_attempts = attempts;
    }
    if let Some(delay) = profile.reconnect_delay {
        config.reconnect_delay = Duration::from_secs(delay);
    }

    config.progressive_loading = state
        .progressive_loading
        .or(profile.progressive_loading)
        .unwrap_or(true);
    config.refresh_interval = state.refresh_interval.unwrap_or_default();

    Ok(config)
}

// ── Tests ───────────────────────────────────────────────────────────
