//! `refresh`: request a full reload and wait for it.

use crate::error::CliError;
use crate::output;

use super::{Context, snapshot, util};

pub async fn handle(ctx: &Context<'_>) -> Result<(), CliError> {
    let started = std::time::Instant::now();
    let snap = util::load_snapshot(ctx).await?;
    tracing::info!(elapsed = ?started.elapsed(), "refresh finished");

    let out = output::render_single(
        &ctx.global.output,
        snap.as_ref(),
        snapshot::summary,
        |s| util::format_time(s.updated_on()),
    );
    output::print_output(&out, ctx.global.quiet);
    Ok(())
}
