//! Shared helpers for command handlers.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::task::JoinHandle;

use ecswatch_core::{Cluster, Console, CoreError, RefreshInterval, Snapshot};

use crate::config;
use crate::error::CliError;

use super::Context;

// ── Loading ─────────────────────────────────────────────────────────

/// Progress bar fed by snapshot publishes while a command waits.
pub struct LoadProgress {
    bar: ProgressBar,
    feeder: JoinHandle<()>,
}

impl LoadProgress {
    pub fn start(console: &Console, quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::with_draw_target(Some(100), ProgressDrawTarget::stderr())
        };
        bar.set_style(progress_style());
        bar.enable_steady_tick(Duration::from_millis(120));
        bar.set_message("connecting");

        let mut stream = console.subscribe();
        let feeder_bar = bar.clone();
        let feeder = tokio::spawn(async move {
            while let Some(snap) = stream.changed().await {
                update_bar(&feeder_bar, &snap);
            }
        });

        Self { bar, feeder }
    }

    pub fn finish(self) {
        self.feeder.abort();
        self.bar.finish_and_clear();
    }
}

pub fn progress_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

/// Mirror a snapshot's loading state onto a progress bar.
pub fn update_bar(bar: &ProgressBar, snap: &Snapshot) {
    bar.set_position(u64::from(snap.loading_percentage()));
    let stage = &snap.progress().stage;
    let message = if stage.is_empty() {
        format!("{} clusters", snap.clusters().len())
    } else {
        format!("{stage} ({} clusters)", snap.clusters().len())
    };
    bar.set_message(message);
}

/// Request a refresh and wait for the cycle to finish, showing progress.
pub async fn load_snapshot(ctx: &Context<'_>) -> Result<Arc<Snapshot>, CliError> {
    let progress = LoadProgress::start(ctx.console, ctx.global.quiet);
    let result = ctx.console.refresh_and_wait(ctx.timeout()).await;
    progress.finish();
    Ok(result?)
}

/// Wait for a snapshot satisfying `predicate` after a targeted request.
pub async fn wait_for<F>(ctx: &Context<'_>, predicate: F) -> Result<Arc<Snapshot>, CliError>
where
    F: FnMut(&Snapshot) -> bool,
{
    Ok(ctx.console.wait_until(ctx.timeout(), predicate).await?)
}

// ── Lookups ─────────────────────────────────────────────────────────

/// Resolve a cluster name or ARN against a loaded snapshot.
pub fn resolve_cluster(snap: &Snapshot, identifier: &str) -> Result<Arc<Cluster>, CliError> {
    snap.find_cluster(identifier).cloned().ok_or_else(|| {
        CliError::from(CoreError::ClusterNotFound {
            identifier: identifier.into(),
        })
    })
}

// ── Parsing ─────────────────────────────────────────────────────────

pub fn parse_interval(value: &str) -> Result<RefreshInterval, CliError> {
    value.parse().map_err(|reason| CliError::Validation {
        field: "interval".into(),
        reason,
    })
}

// ── Persisted state ─────────────────────────────────────────────────

pub fn record_interval(profile: &str, interval: RefreshInterval) -> Result<(), CliError> {
    let mut state = config::load_state_or_default();
    state.record_interval(profile, interval);
    config::save_state(&state)?;
    tracing::debug!(profile, %interval, "persisted refresh interval");
    Ok(())
}

pub fn record_progressive(profile: &str, enabled: bool) -> Result<(), CliError> {
    let mut state = config::load_state_or_default();
    state.record_progressive(profile, enabled);
    config::save_state(&state)?;
    tracing::debug!(profile, enabled, "persisted progressive loading");
    Ok(())
}

// ── Formatting ──────────────────────────────────────────────────────

pub fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

pub fn or_dash(value: Option<&str>) -> String {
    value.map_or_else(|| "-".into(), ToOwned::to_owned)
}

pub fn format_time(at: Option<chrono::DateTime<chrono::Utc>>) -> String {
    at.map_or_else(
        || "-".into(),
        |at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn interval_parse_errors_are_validation_errors() {
        assert_eq!(parse_interval("5m").unwrap().as_wire(), 300);
        assert!(matches!(
            parse_interval("whenever"),
            Err(CliError::Validation { ref field, .. }) if field == "interval"
        ));
    }

    #[test]
    fn missing_cluster_is_not_found() {
        let snap = Snapshot::default();
        let err = resolve_cluster(&snap, "prod").unwrap_err();
        assert!(matches!(err, CliError::NotFound { .. }));
    }

    #[test]
    fn time_formatting() {
        use chrono::TimeZone;
        let at = chrono::Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(format_time(Some(at)), "2026-03-01 10:00:00 UTC");
        assert_eq!(format_time(None), "-");
    }
}
