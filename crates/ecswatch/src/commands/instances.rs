//! EC2 instance command handlers.

use std::sync::Arc;

use tabled::Tabled;

use ecswatch_core::{CoreError, Instance, InstanceFilter, InstanceState, Snapshot};

use crate::cli::{InstancesArgs, InstancesCommand};
use crate::error::CliError;
use crate::output::{self, Health};

use super::{Context, util};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct InstanceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    instance_type: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Private IP")]
    private_ip: String,
    #[tabled(rename = "Services")]
    services: usize,
}

impl InstanceRow {
    fn new(i: &Arc<Instance>, color: bool) -> Self {
        Self {
            id: i.instance_id.clone(),
            name: util::or_dash(i.name.as_deref()),
            instance_type: i.instance_type.clone(),
            state: paint_state(i.state, color),
            private_ip: util::or_dash(i.private_ip.as_deref()),
            services: i.services.as_ref().map_or(0, Vec::len),
        }
    }
}

fn paint_state(state: InstanceState, color: bool) -> String {
    let health = match state {
        InstanceState::Running => Health::Good,
        InstanceState::Pending | InstanceState::Stopping | InstanceState::ShuttingDown => {
            Health::Warn
        }
        InstanceState::Stopped | InstanceState::Terminated => Health::Neutral,
    };
    output::paint(&state.to_string(), health, color)
}

fn detail(i: &Arc<Instance>, color: bool) -> String {
    let mut out = output::detail_block(&[
        ("ID", i.instance_id.clone()),
        ("Name", i.name.clone().unwrap_or_default()),
        ("Type", i.instance_type.clone()),
        ("State", paint_state(i.state, color)),
        ("Private IP", i.private_ip.clone().unwrap_or_default()),
        ("Public IP", i.public_ip.clone().unwrap_or_default()),
        ("Launched", util::format_time(i.launch_time)),
    ]);
    if let Some(services) = i.services.as_ref().filter(|s| !s.is_empty()) {
        out.push_str("\n\nServices:");
        for service in services {
            match service.cluster_name {
                Some(ref cluster) => out.push_str(&format!("\n  {cluster}/{}", service.name)),
                None => out.push_str(&format!("\n  {}", service.name)),
            }
        }
    }
    out
}

// ── Loading ─────────────────────────────────────────────────────────

/// Load a snapshot that includes the EC2 inventory.
///
/// A full cycle usually carries the inventory already. If it does not, the
/// inventory is requested on its own; an empty inventory may never move
/// the snapshot, so running out of time there is not an error.
async fn load_with_inventory(ctx: &Context<'_>) -> Result<Arc<Snapshot>, CliError> {
    let snap = util::load_snapshot(ctx).await?;
    if !snap.instances().is_empty() {
        return Ok(snap);
    }

    let before = snap.updated_on();
    ctx.console.get_ec2_inventory().await?;
    match ctx
        .console
        .wait_until(ctx.timeout(), |s| {
            !s.instances().is_empty() || s.updated_on() > before
        })
        .await
    {
        Ok(snap) => Ok(snap),
        Err(CoreError::Timeout { .. }) => {
            tracing::debug!("no inventory update arrived, assuming no instances");
            Ok(ctx.console.snapshot())
        }
        Err(e) => Err(e.into()),
    }
}

fn build_filter(
    state: Option<&str>,
    running: bool,
    instance_type: Option<String>,
) -> Result<Vec<InstanceFilter>, CliError> {
    let mut filters = Vec::new();
    if let Some(state) = state {
        let parsed = state.parse().map_err(|_| CliError::Validation {
            field: "state".into(),
            reason: format!(
                "unknown instance state '{state}' (pending, running, stopping, stopped, \
                 shutting-down, terminated)"
            ),
        })?;
        filters.push(InstanceFilter::ByState(parsed));
    }
    if running {
        filters.push(InstanceFilter::Running);
    }
    if let Some(kind) = instance_type {
        filters.push(InstanceFilter::ByType(kind));
    }
    Ok(filters)
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: InstancesArgs, ctx: &Context<'_>) -> Result<(), CliError> {
    let color = ctx.color();

    match args.command {
        InstancesCommand::List {
            state,
            running,
            instance_type,
        } => {
            let filters = build_filter(state.as_deref(), running, instance_type)?;
            let snap = load_with_inventory(ctx).await?;
            let instances: Vec<_> = snap
                .instances()
                .iter()
                .filter(|i| filters.iter().all(|f| f.matches(i)))
                .cloned()
                .collect();
            let out = output::render_list(
                &ctx.global.output,
                &instances,
                |i| InstanceRow::new(i, color),
                |i| i.instance_id.clone(),
            );
            output::print_output(&out, ctx.global.quiet);
            Ok(())
        }

        InstancesCommand::Get { instance_id } => {
            let snap = load_with_inventory(ctx).await?;
            let instance = snap.instance_by_id(&instance_id).ok_or_else(|| {
                CliError::from(CoreError::InstanceNotFound {
                    identifier: instance_id.clone(),
                })
            })?;
            let out = output::render_single(
                &ctx.global.output,
                instance,
                |i| detail(i, color),
                |i| i.instance_id.clone(),
            );
            output::print_output(&out, ctx.global.quiet);
            Ok(())
        }
    }
}
