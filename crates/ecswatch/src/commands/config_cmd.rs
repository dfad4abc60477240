//! Config subcommand handlers.

use dialoguer::{Input, Select};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking sensitive fields.
fn format_config_redacted(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "insecure = {}", cfg.defaults.insecure);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "server = \"{}\"", p.server);
        let _ = writeln!(out, "auth_mode = \"{}\"", p.auth_mode);
        if p.token.is_some() {
            let _ = writeln!(out, "token = \"****\"");
        }
        if let Some(ref env) = p.token_env {
            let _ = writeln!(out, "token_env = \"{env}\"");
        }
        if p.cookie.is_some() {
            let _ = writeln!(out, "cookie = \"****\"");
        }
        if let Some(ref path) = p.socket_path {
            let _ = writeln!(out, "socket_path = \"{path}\"");
        }
        if let Some(ref ns) = p.namespace {
            let _ = writeln!(out, "namespace = \"{ns}\"");
        }
        if let Some(ref transports) = p.transports {
            let quoted: Vec<_> = transports.iter().map(|t| format!("\"{t}\"")).collect();
            let _ = writeln!(out, "transports = [{}]", quoted.join(", "));
        }
        if let Some(progressive) = p.progressive_loading {
            let _ = writeln!(out, "progressive_loading = {progressive}");
        }
        if let Some(attempts) = p.reconnect_attempts {
            let _ = writeln!(out, "reconnect_attempts = {attempts}");
        }
        if let Some(delay) = p.reconnect_delay {
            let _ = writeln!(out, "reconnect_delay = {delay}");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if let Some(insecure) = p.insecure {
            let _ = writeln!(out, "insecure = {insecure}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
    }

    out
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> CliError {
    CliError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

/// Offer to store a secret in the system keyring or return it for
/// plaintext config.
///
/// Returns `Some(secret)` if the user chose plaintext, `None` if stored in
/// the keyring.
fn prompt_keyring_storage(
    secret: &str,
    profile_name: &str,
    kind: &str,
) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt(format!("Where to store the {kind}?"))
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        ecswatch_config::store_secret(profile_name, kind, secret)?;
        eprintln!("   ✓ {kind} stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(secret.to_owned()))
    }
}

fn prompt_secret(kind: &str) -> Result<String, CliError> {
    let secret = rpassword::prompt_password(format!("{kind}: ")).map_err(prompt_err)?;
    if secret.is_empty() {
        return Err(invalid(kind, format!("{kind} cannot be empty")));
    }
    Ok(secret)
}

fn parse_bool(field: &str, value: &str) -> Result<bool, CliError> {
    value
        .parse()
        .map_err(|_| invalid(field, "must be 'true' or 'false'"))
}

fn parse_u64(field: &str, value: &str) -> Result<u64, CliError> {
    value
        .parse()
        .map_err(|_| invalid(field, "must be a number (seconds)"))
}

/// Apply one `config set` to a profile.
fn set_key(profile: &mut Profile, key: &str, value: String) -> Result<(), CliError> {
    match key {
        "server" => {
            ecswatch_config::parse_server(&value)?;
            profile.server = value;
        }
        "auth_mode" | "auth-mode" => {
            if !matches!(value.as_str(), "token" | "cookie" | "none") {
                return Err(invalid("auth_mode", "must be 'token', 'cookie', or 'none'"));
            }
            profile.auth_mode = value;
        }
        "token" => profile.token = Some(value),
        "token_env" | "token-env" => profile.token_env = Some(value),
        "cookie" => profile.cookie = Some(value),
        "socket_path" | "socket-path" => profile.socket_path = Some(value),
        "namespace" => profile.namespace = Some(value),
        "transports" => {
            let names: Vec<String> = value.split(',').map(|s| s.trim().to_owned()).collect();
            ecswatch_config::parse_transports(&names)?;
            profile.transports = Some(names);
        }
        "progressive_loading" | "progressive-loading" => {
            profile.progressive_loading = Some(parse_bool(key, &value)?);
        }
        "reconnect_attempts" | "reconnect-attempts" => {
            profile.reconnect_attempts = Some(
                value
                    .parse()
                    .map_err(|_| invalid(key, "must be a whole number"))?,
            );
        }
        "reconnect_delay" | "reconnect-delay" => {
            profile.reconnect_delay = Some(parse_u64(key, &value)?);
        }
        "insecure" => profile.insecure = Some(parse_bool(key, &value)?),
        "timeout" => profile.timeout = Some(parse_u64(key, &value)?),
        "ca_cert" | "ca-cert" => profile.ca_cert = Some(value.into()),
        other => {
            return Err(invalid(
                other,
                format!(
                    "unknown config key '{other}'. Valid keys: server, auth_mode, token, \
                     token_env, cookie, socket_path, namespace, transports, \
                     progressive_loading, reconnect_attempts, reconnect_delay, insecure, \
                     timeout, ca_cert"
                ),
            ));
        }
    }
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(),

        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let out = output::render_single(&global.output, &cfg, format_config_redacted, |_| {
                config::config_path().display().to_string()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);

            let profile = cfg
                .profiles
                .entry(profile_name.clone())
                .or_insert_with(|| Profile::new(String::new()));
            set_key(profile, &key, value)?;

            config::save_config(&cfg)?;
            eprintln!("✓ Set {key} on profile '{profile_name}'");
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: ecswatch config init");
            } else {
                let mut names: Vec<_> = cfg.profiles.keys().collect();
                names.sort();
                for name in names {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();

            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    name,
                    available: config::available_profiles(&cfg),
                });
            }

            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }

        ConfigCommand::SetSecret { profile } => {
            let cfg = config::load_config_or_default();
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));

            let prof = cfg
                .profiles
                .get(&profile_name)
                .ok_or_else(|| CliError::ProfileNotFound {
                    name: profile_name.clone(),
                    available: config::available_profiles(&cfg),
                })?;

            let kind = match prof.auth_mode.as_str() {
                "token" => "token",
                "cookie" => "cookie",
                other => {
                    return Err(invalid(
                        "auth_mode",
                        format!("profile '{profile_name}' uses auth_mode '{other}', which has no secret"),
                    ));
                }
            };
            let secret = prompt_secret(kind)?;
            ecswatch_config::store_secret(&profile_name, kind, &secret)?;

            eprintln!("✓ {kind} stored in system keyring for profile '{profile_name}'");
            Ok(())
        }

        ConfigCommand::Path => {
            println!("config: {}", config::config_path().display());
            println!("state:  {}", config::state_path().display());
            Ok(())
        }
    }
}

/// Interactive wizard for `config init`.
fn init() -> Result<(), CliError> {
    let config_path = config::config_path();
    eprintln!("ecswatch configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    // 1. Profile name
    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    // 2. Backend URL
    let server: String = Input::new()
        .with_prompt("Console backend URL")
        .default("http://localhost:3000".into())
        .validate_with(|input: &String| {
            ecswatch_config::parse_server(input)
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .interact_text()
        .map_err(prompt_err)?;

    // 3. Auth mode
    let auth_choices = &[
        "Bearer token",
        "Session cookie",
        "None (local development)",
    ];
    let auth_selection = Select::new()
        .with_prompt("Authentication method")
        .items(auth_choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    let mut profile = Profile::new(server);
    match auth_selection {
        0 => {
            let token = prompt_secret("token")?;
            profile.auth_mode = "token".into();
            profile.token = prompt_keyring_storage(&token, &profile_name, "token")?;
        }
        1 => {
            let cookie = prompt_secret("cookie")?;
            profile.auth_mode = "cookie".into();
            profile.cookie = prompt_keyring_storage(&cookie, &profile_name, "cookie")?;
        }
        _ => profile.auth_mode = "none".into(),
    }

    // 4. Transport preference
    let transport_choices = &[
        "WebSocket, fall back to polling (recommended)",
        "Polling only (restrictive proxies)",
    ];
    let transport_selection = Select::new()
        .with_prompt("Transport")
        .items(transport_choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;
    if transport_selection == 1 {
        profile.transports = Some(vec!["polling".into()]);
    }

    // 5. Build and write config
    let mut cfg = config::load_config_or_default();
    cfg.profiles.insert(profile_name.clone(), profile);
    cfg.default_profile = Some(profile_name.clone());
    config::save_config(&cfg)?;

    eprintln!("\n✓ Configuration written to {}", config_path.display());
    eprintln!("  Active profile: {profile_name}");
    eprintln!("\n  Test it: ecswatch snapshot");

    Ok(())
}
