//! Cluster command handlers.

use std::sync::Arc;

use tabled::Tabled;

use ecswatch_core::{Cluster, ClusterStatus, ClusterView, Snapshot};

use crate::cli::{ClustersArgs, ClustersCommand, OutputFormat};
use crate::error::CliError;
use crate::output::{self, Health};

use super::{Context, util};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ClusterRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Services")]
    services: String,
    #[tabled(rename = "Running")]
    running: u32,
    #[tabled(rename = "Pending")]
    pending: u32,
    #[tabled(rename = "Instances")]
    instances: u32,
    #[tabled(rename = "Sched. Tasks")]
    scheduled_tasks: String,
}

impl ClusterRow {
    fn new(view: &ClusterView, color: bool) -> Self {
        let c = &view.cluster;
        // Counts the backend reported up front, until the details arrive.
        let services = if view.has_services {
            c.services.len().to_string()
        } else {
            format!("{} (loading)", c.services_count)
        };
        let scheduled_tasks = if view.has_scheduled_tasks {
            c.scheduled_tasks.len().to_string()
        } else {
            "-".into()
        };
        Self {
            name: c.name.clone(),
            status: paint_status(c.status, color),
            services,
            running: c.running_tasks,
            pending: c.pending_tasks,
            instances: c.registered_instances,
            scheduled_tasks,
        }
    }
}

fn paint_status(status: ClusterStatus, color: bool) -> String {
    let health = match status {
        ClusterStatus::Active => Health::Good,
        ClusterStatus::Provisioning | ClusterStatus::Deprovisioning => Health::Warn,
        ClusterStatus::Failed => Health::Bad,
        ClusterStatus::Inactive => Health::Neutral,
    };
    output::paint(&status.to_string(), health, color)
}

// ── Rendering ───────────────────────────────────────────────────────

/// Render the cluster list of a snapshot. Shared with `watch` and
/// `snapshot`.
pub fn render_list(format: &OutputFormat, snap: &Snapshot, color: bool) -> String {
    let views = snap.clusters_with_load_state();
    output::render_list(
        format,
        &views,
        |v| ClusterRow::new(v, color),
        |v| v.cluster.name.clone(),
    )
}

fn detail(cluster: &Arc<Cluster>, color: bool) -> String {
    let mut out = output::detail_block(&[
        ("Name", cluster.name.clone()),
        ("ARN", cluster.arn.clone()),
        ("Status", paint_status(cluster.status, color)),
        ("Running tasks", cluster.running_tasks.to_string()),
        ("Pending tasks", cluster.pending_tasks.to_string()),
        ("Instances", cluster.registered_instances.to_string()),
        ("Services", cluster.services_count.to_string()),
    ]);

    if !cluster.services.is_empty() {
        out.push_str("\n\nServices:");
        for service in &cluster.services {
            out.push_str(&format!(
                "\n  {:<32} {}/{}",
                service.name, service.running_count, service.desired_count
            ));
        }
    }
    if !cluster.scheduled_tasks.is_empty() {
        out.push_str("\n\nScheduled tasks:");
        for task in &cluster.scheduled_tasks {
            out.push_str(&format!("\n  {:<32} {}", task.name, task.cron));
        }
    }
    out
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: ClustersArgs, ctx: &Context<'_>) -> Result<(), CliError> {
    let snap = util::load_snapshot(ctx).await?;
    let color = ctx.color();

    match args.command {
        ClustersCommand::List => {
            let out = render_list(&ctx.global.output, &snap, color);
            output::print_output(&out, ctx.global.quiet);
            Ok(())
        }

        ClustersCommand::Get { cluster } => {
            let cluster = util::resolve_cluster(&snap, &cluster)?;
            let out = output::render_single(
                &ctx.global.output,
                &cluster,
                |c| detail(c, color),
                |c| c.arn.clone(),
            );
            output::print_output(&out, ctx.global.quiet);
            Ok(())
        }
    }
}
