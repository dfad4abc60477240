//! `interval`: show or change the refresh interval.

use serde::Serialize;

use ecswatch_core::{CoreError, RefreshInterval};

use crate::cli::IntervalArgs;
use crate::error::CliError;
use crate::output;

use super::{Context, util};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IntervalView {
    /// Wire encoding: -1 automatic, 0 paused, N seconds.
    interval: i64,
    description: String,
}

impl From<RefreshInterval> for IntervalView {
    fn from(interval: RefreshInterval) -> Self {
        Self {
            interval: interval.as_wire(),
            description: interval.to_string(),
        }
    }
}

fn print(ctx: &Context<'_>, interval: RefreshInterval) {
    let out = output::render_single(
        &ctx.global.output,
        &IntervalView::from(interval),
        |v| format!("Refresh interval: {}", v.description),
        |v| v.interval.to_string(),
    );
    output::print_output(&out, ctx.global.quiet);
}

/// Send `set-interval` and wait for the backend's `interval-updated`.
///
/// Only snapshots published after the request count, so re-sending the
/// current value still waits for the backend to answer.
pub async fn apply(ctx: &Context<'_>, interval: RefreshInterval) -> Result<(), CliError> {
    let mut stream = ctx.console.subscribe();
    ctx.console.set_interval(interval).await?;

    let confirmed = async {
        while let Some(snap) = stream.changed().await {
            if snap.refresh_interval() == interval {
                return Ok(());
            }
        }
        Err(CoreError::ChannelClosed)
    };
    tokio::time::timeout(ctx.timeout(), confirmed)
        .await
        .map_err(|_| CoreError::Timeout {
            timeout_secs: ctx.global.timeout,
        })??;

    util::record_interval(ctx.profile, interval)?;
    tracing::info!(%interval, "backend confirmed refresh interval");
    Ok(())
}

pub async fn handle(args: IntervalArgs, ctx: &Context<'_>) -> Result<(), CliError> {
    let Some(value) = args.value else {
        print(ctx, ctx.console.settings().refresh_interval);
        return Ok(());
    };

    let interval = util::parse_interval(&value)?;
    apply(ctx, interval).await?;
    print(ctx, interval);
    Ok(())
}
