//! `watch`: stream the snapshot as loading cycles arrive.
//!
//! Table output redraws the cluster table after each completed cycle with
//! a progress bar underneath while the next one loads. Structured formats
//! emit one document per snapshot (NDJSON for `json`, `---`-separated for
//! `yaml`) so the stream can be piped.

use indicatif::{ProgressBar, ProgressDrawTarget};
use tokio::sync::broadcast::error::RecvError;

use ecswatch_core::{ConnectionState, CoreError, Snapshot};

use crate::cli::{OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::{Context, clusters, interval, snapshot, util};

// ── Rendering ───────────────────────────────────────────────────────

/// Decides which snapshots get printed and how.
struct Printer<'a> {
    ctx: &'a Context<'a>,
    bar: ProgressBar,
    all_updates: bool,
    last_cycle: u64,
}

impl Printer<'_> {
    fn show(&mut self, snap: &Snapshot) {
        util::update_bar(&self.bar, snap);

        let cycle_ended = snap.completed_cycles() > self.last_cycle;
        self.last_cycle = snap.completed_cycles();
        if !(cycle_ended || self.all_updates) {
            return;
        }

        let out = render(self.ctx, snap);
        self.bar.suspend(|| output::print_output(&out, self.ctx.global.quiet));
        if cycle_ended {
            self.bar.set_position(0);
        }
    }

    /// Status lines go to stderr so they never mix with piped output.
    fn notice(&self, message: &str) {
        if !self.ctx.global.quiet {
            self.bar.suspend(|| eprintln!("{message}"));
        }
    }
}

fn render(ctx: &Context<'_>, snap: &Snapshot) -> String {
    match ctx.global.output {
        OutputFormat::Table => format!(
            "{}\n{}",
            snapshot::summary(snap),
            clusters::render_list(&OutputFormat::Table, snap, ctx.color())
        ),
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json_compact(snap),
        OutputFormat::Yaml => format!("---\n{}", output::render_yaml(snap)),
        OutputFormat::Plain => snapshot::summary(snap),
    }
}

fn progress_bar(ctx: &Context<'_>) -> ProgressBar {
    // Only the table view is meant for a human watching a terminal.
    if ctx.global.quiet || !matches!(ctx.global.output, OutputFormat::Table) {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::with_draw_target(Some(100), ProgressDrawTarget::stderr());
    bar.set_style(util::progress_style());
    bar.enable_steady_tick(std::time::Duration::from_millis(120));
    bar
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: WatchArgs, ctx: &Context<'_>) -> Result<(), CliError> {
    if let Some(ref value) = args.interval {
        let requested = util::parse_interval(value)?;
        interval::apply(ctx, requested).await?;
    }

    let mut stream = ctx.console.subscribe();
    let mut errors = ctx.console.errors();
    let mut connection = ctx.console.watch_connection().await?;
    let mut intervals = ctx.console.interval_changes();
    intervals.borrow_and_update();

    let mut printer = Printer {
        ctx,
        bar: progress_bar(ctx),
        all_updates: args.all_updates,
        last_cycle: stream.current().completed_cycles(),
    };
    printer.notice(&format!(
        "Watching {} (refresh {}), Ctrl-C to stop",
        ctx.console.config().url,
        ctx.console.settings().refresh_interval
    ));

    ctx.console.manual_refresh().await?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = loop {
        tokio::select! {
            biased;

            _ = &mut ctrl_c => {
                tracing::debug!("interrupted, stopping watch");
                break Ok(());
            }

            changed = connection.changed() => {
                if changed.is_err() {
                    break Err(CliError::ChannelClosed);
                }
                let state = *connection.borrow_and_update();
                tracing::info!(%state, "connection state changed");
                match state {
                    ConnectionState::Failed => {
                        break Err(CoreError::ConnectionFailed {
                            url: ctx.console.config().url.to_string(),
                            reason: "reconnection attempts exhausted".into(),
                        }
                        .into());
                    }
                    ConnectionState::Reconnecting { .. } => {
                        printer.notice(&format!("Connection lost, {state}"));
                    }
                    ConnectionState::Connected { .. } => printer.notice(&format!("Connection {state}")),
                    ConnectionState::Disconnected | ConnectionState::Connecting => {}
                }
            }

            error = errors.recv() => match error {
                Ok(error) => printer.notice(&format!("Backend error: {error}")),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "missed backend errors");
                }
                Err(RecvError::Closed) => break Err(CliError::ChannelClosed),
            },

            changed = intervals.changed() => {
                if changed.is_err() {
                    break Err(CliError::ChannelClosed);
                }
                let current = *intervals.borrow_and_update();
                printer.notice(&format!("Refresh interval is now {current}"));
                if let Err(e) = util::record_interval(ctx.profile, current) {
                    tracing::warn!(error = %e, "could not persist refresh interval");
                }
            }

            snap = stream.changed() => {
                let Some(snap) = snap else {
                    break Err(CliError::ChannelClosed);
                };
                printer.show(&snap);
            }
        }
    };

    printer.bar.finish_and_clear();
    result
}
