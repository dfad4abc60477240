//! Service command handlers.

use std::sync::Arc;

use tabled::Tabled;

use ecswatch_core::{CoreError, Service, ServiceFilter, Snapshot};

use crate::cli::{ServiceListArgs, ServicesArgs, ServicesCommand};
use crate::error::CliError;
use crate::output::{self, Health};

use super::{Context, util};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ServiceRow {
    #[tabled(rename = "Cluster")]
    cluster: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Tasks")]
    tasks: String,
    #[tabled(rename = "Pending")]
    pending: u32,
    #[tabled(rename = "Task Def")]
    task_definition: String,
    #[tabled(rename = "Rollout")]
    rollout: String,
}

impl ServiceRow {
    fn new(s: &Arc<Service>, color: bool) -> Self {
        let health = if s.is_stuck() {
            Health::Bad
        } else if s.is_degraded() {
            Health::Warn
        } else {
            Health::Good
        };
        Self {
            cluster: s.cluster_name.clone(),
            name: s.name.clone(),
            status: s.status.clone(),
            tasks: output::paint(
                &format!("{}/{}", s.running_count, s.desired_count),
                health,
                color,
            ),
            pending: s.pending_count,
            task_definition: s
                .task_definition
                .as_ref()
                .map_or_else(|| "-".into(), |td| td.label()),
            rollout: rollout_label(s, color),
        }
    }
}

fn rollout_label(s: &Service, color: bool) -> String {
    if s.is_stuck() {
        return output::paint("stuck", Health::Bad, color);
    }
    s.deployments
        .iter()
        .find(|d| d.status == "PRIMARY")
        .and_then(|d| d.rollout_state.clone())
        .unwrap_or_else(|| "-".into())
}

// ── Rendering ───────────────────────────────────────────────────────

fn detail(s: &Arc<Service>, color: bool) -> String {
    let mut out = output::detail_block(&[
        ("Name", s.name.clone()),
        ("Cluster", s.cluster_name.clone()),
        ("ARN", s.arn.clone().unwrap_or_default()),
        ("Status", s.status.clone()),
        ("Desired", s.desired_count.to_string()),
        ("Running", s.running_count.to_string()),
        ("Pending", s.pending_count.to_string()),
        ("Launch type", s.launch_type.clone().unwrap_or_default()),
        (
            "Task def",
            s.task_definition
                .as_ref()
                .map(|td| td.label())
                .unwrap_or_default(),
        ),
        ("Rollout", rollout_label(s, color)),
    ]);

    if let Some(status) = s.deployment_status.as_ref().filter(|d| d.is_stuck) {
        out.push_str(&format!(
            "\n\nRollout stuck since {}",
            util::format_time(status.since)
        ));
        for diff in &status.image_diff {
            out.push_str(&format!(
                "\n  {}: {} -> {}",
                diff.container,
                util::or_dash(diff.current.as_deref()),
                util::or_dash(diff.target.as_deref()),
            ));
        }
    }

    if !s.deployments.is_empty() {
        out.push_str("\n\nDeployments:");
        for d in &s.deployments {
            out.push_str(&format!(
                "\n  {:<12} {:<10} {}/{} {}",
                d.status,
                util::or_dash(d.rollout_state.as_deref()),
                d.running_count,
                d.desired_count,
                util::format_time(d.updated_at.or(d.created_at)),
            ));
        }
    }
    out
}

pub fn render_list(ctx: &Context<'_>, services: &[Arc<Service>]) -> String {
    let color = ctx.color();
    output::render_list(
        &ctx.global.output,
        services,
        |s| ServiceRow::new(s, color),
        |s| format!("{}/{}", s.cluster_name, s.name),
    )
}

/// Narrow the flat service list by every filter given on the command line.
fn filter_services(snap: &Snapshot, args: &ServiceListArgs) -> Result<Vec<Arc<Service>>, CliError> {
    let mut filters = Vec::new();
    if let Some(ref cluster) = args.cluster {
        let cluster = util::resolve_cluster(snap, cluster)?;
        filters.push(ServiceFilter::ByCluster(cluster.name.clone()));
    }
    if let Some(ref status) = args.status {
        filters.push(ServiceFilter::ByStatus(status.clone()));
    }
    if args.stuck {
        filters.push(ServiceFilter::Stuck);
    }
    if args.degraded {
        filters.push(ServiceFilter::Degraded);
    }

    Ok(snap
        .services()
        .iter()
        .filter(|s| filters.iter().all(|f| f.matches(s)))
        .cloned()
        .collect())
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: ServicesArgs, ctx: &Context<'_>) -> Result<(), CliError> {
    let snap = util::load_snapshot(ctx).await?;

    match args.command {
        ServicesCommand::List(list) => {
            let services = filter_services(&snap, &list)?;
            output::print_output(&render_list(ctx, &services), ctx.global.quiet);
            Ok(())
        }

        ServicesCommand::Get { cluster, service } => {
            let cluster = util::resolve_cluster(&snap, &cluster)?;
            let found = snap.service(&cluster.name, &service).ok_or_else(|| {
                CliError::from(CoreError::ServiceNotFound {
                    cluster: cluster.name.clone(),
                    name: service.clone(),
                })
            })?;
            let color = ctx.color();
            let out = output::render_single(
                &ctx.global.output,
                found,
                |s| detail(s, color),
                |s| s.arn.clone().unwrap_or_else(|| s.name.clone()),
            );
            output::print_output(&out, ctx.global.quiet);
            Ok(())
        }

        ServicesCommand::Refresh { cluster } => {
            let before = util::resolve_cluster(&snap, &cluster)?;
            let since = snap.services_revision(&before.arn);
            ctx.console.refresh_cluster_services(&before.name).await?;

            let snap = util::wait_for(ctx, |s| s.services_revision(&before.arn) > since).await?;
            let services: Vec<_> = snap.services_for_cluster(&before.name).cloned().collect();
            if !ctx.global.quiet {
                eprintln!("Reloaded {} services in '{}'", services.len(), before.name);
            }
            output::print_output(&render_list(ctx, &services), ctx.global.quiet);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use ecswatch_core::Deployment;
    use ecswatch_core::model::DeploymentStatus;

    use super::*;

    fn service(running: u32, stuck: bool) -> Arc<Service> {
        Arc::new(Service {
            name: "api".into(),
            cluster_name: "prod".into(),
            status: "ACTIVE".into(),
            desired_count: 2,
            running_count: running,
            deployments: vec![Arc::new(Deployment {
                id: "d1".into(),
                status: "PRIMARY".into(),
                rollout_state: Some("IN_PROGRESS".into()),
                ..Deployment::default()
            })],
            deployment_status: Some(DeploymentStatus {
                is_stuck: stuck,
                ..DeploymentStatus::default()
            }),
            ..Service::default()
        })
    }

    #[test]
    fn rollout_label_prefers_stuck_flag() {
        assert_eq!(rollout_label(&service(2, true), false), "stuck");
        assert_eq!(rollout_label(&service(2, false), false), "IN_PROGRESS");
    }

    #[test]
    fn row_shows_running_over_desired() {
        let row = ServiceRow::new(&service(1, false), false);
        assert_eq!(row.tasks, "1/2");
        assert_eq!(row.rollout, "IN_PROGRESS");
    }
}
