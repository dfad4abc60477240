//! `snapshot`: load once and print everything the console knows.

use std::fmt::Write as _;

use ecswatch_core::Snapshot;

use crate::cli::OutputFormat;
use crate::error::CliError;
use crate::output;

use super::{Context, clusters, services, tasks, util};

/// One-line summary of a snapshot, used as a header and for `plain`.
pub fn summary(snap: &Snapshot) -> String {
    let mut out = format!(
        "{} clusters, {} services, {} scheduled tasks, {} instances",
        snap.clusters().len(),
        snap.services().len(),
        snap.scheduled_tasks().len(),
        snap.instances().len(),
    );
    let _ = write!(
        out,
        " | updated {} | refresh {}",
        util::format_time(snap.updated_on()),
        snap.refresh_interval()
    );
    if let Some(error) = snap.last_error() {
        let _ = write!(out, " | last error: {error}");
    }
    out
}

fn render_table(ctx: &Context<'_>, snap: &Snapshot) -> String {
    let color = ctx.color();
    let mut sections = vec![
        summary(snap),
        format!("\nClusters\n{}", clusters::render_list(&ctx.global.output, snap, color)),
    ];
    if !snap.services().is_empty() {
        sections.push(format!(
            "\nServices\n{}",
            services::render_list(ctx, snap.services())
        ));
    }
    if !snap.scheduled_tasks().is_empty() {
        sections.push(format!(
            "\nScheduled tasks\n{}",
            tasks::render_list(ctx, snap.scheduled_tasks())
        ));
    }
    sections.join("\n")
}

pub async fn handle(ctx: &Context<'_>) -> Result<(), CliError> {
    let snap = util::load_snapshot(ctx).await?;

    let out = match ctx.global.output {
        OutputFormat::Table => render_table(ctx, &snap),
        OutputFormat::Plain => summary(&snap),
        ref format => output::render_single(format, snap.as_ref(), |_| String::new(), |_| String::new()),
    };
    output::print_output(&out, ctx.global.quiet);
    Ok(())
}
