//! `progressive`: show or toggle staged loading.

use crate::cli::{ProgressiveArgs, Toggle};
use crate::error::CliError;
use crate::output;

use super::{Context, snapshot, util};

fn print(ctx: &Context<'_>, enabled: bool) {
    let state = if enabled { "on" } else { "off" };
    let out = output::render_single(
        &ctx.global.output,
        &serde_json::json!({ "progressiveLoading": enabled }),
        |_| format!("Progressive loading: {state}"),
        |_| state.to_owned(),
    );
    output::print_output(&out, ctx.global.quiet);
}

pub async fn handle(args: ProgressiveArgs, ctx: &Context<'_>) -> Result<(), CliError> {
    let Some(mode) = args.mode else {
        print(ctx, ctx.console.settings().progressive_loading);
        return Ok(());
    };

    let enabled = matches!(mode, Toggle::On);
    ctx.console.toggle_progressive_loading(enabled).await?;

    // The backend does not acknowledge the toggle; a full cycle delivered
    // after it shows the new mode took effect.
    let snap = util::load_snapshot(ctx).await?;
    util::record_progressive(ctx.profile, enabled)?;

    print(ctx, enabled);
    if !ctx.global.quiet {
        eprintln!("{}", snapshot::summary(&snap));
    }
    Ok(())
}
