//! Scheduled task command handlers.

use std::sync::Arc;

use tabled::Tabled;

use ecswatch_core::ScheduledTask;

use crate::cli::{TasksArgs, TasksCommand};
use crate::error::CliError;
use crate::output::{self, Health};

use super::{Context, util};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "Cluster")]
    cluster: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Schedule")]
    cron: String,
    #[tabled(rename = "Enabled")]
    enabled: String,
    #[tabled(rename = "Task Def")]
    task_definition: String,
    #[tabled(rename = "Next Run")]
    next_run: String,
}

impl TaskRow {
    fn new(t: &Arc<ScheduledTask>, color: bool) -> Self {
        let health = if t.enabled { Health::Good } else { Health::Neutral };
        Self {
            cluster: t.cluster_name.clone(),
            name: t.name.clone(),
            cron: t.cron.clone(),
            enabled: output::paint(util::yes_no(t.enabled), health, color),
            task_definition: util::or_dash(t.task_definition.as_deref()),
            next_run: util::format_time(t.next_runs.iter().min().copied()),
        }
    }
}

pub fn render_list(ctx: &Context<'_>, tasks: &[Arc<ScheduledTask>]) -> String {
    let color = ctx.color();
    output::render_list(
        &ctx.global.output,
        tasks,
        |t| TaskRow::new(t, color),
        |t| format!("{}/{}", t.cluster_name, t.name),
    )
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: TasksArgs, ctx: &Context<'_>) -> Result<(), CliError> {
    let snap = util::load_snapshot(ctx).await?;

    match args.command {
        TasksCommand::List { cluster } => {
            let tasks: Vec<_> = match cluster {
                Some(ref identifier) => {
                    let cluster = util::resolve_cluster(&snap, identifier)?;
                    snap.scheduled_tasks_for_cluster(&cluster.name)
                        .cloned()
                        .collect()
                }
                None => snap.scheduled_tasks().to_vec(),
            };
            output::print_output(&render_list(ctx, &tasks), ctx.global.quiet);
            Ok(())
        }

        TasksCommand::Refresh { cluster } => {
            let before = util::resolve_cluster(&snap, &cluster)?;
            let since = snap.scheduled_tasks_revision(&before.arn);
            ctx.console
                .refresh_cluster_scheduled_tasks(&before.arn, &before.name)
                .await?;

            let snap = util::wait_for(ctx, |s| {
                s.scheduled_tasks_revision(&before.arn) > since
            })
            .await?;
            let tasks: Vec<_> = snap
                .scheduled_tasks_for_cluster(&before.name)
                .cloned()
                .collect();
            if !ctx.global.quiet {
                eprintln!(
                    "Reloaded {} scheduled tasks in '{}'",
                    tasks.len(),
                    before.name
                );
            }
            output::print_output(&render_list(ctx, &tasks), ctx.global.quiet);
            Ok(())
        }
    }
}
