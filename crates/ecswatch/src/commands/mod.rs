//! Command dispatch: bridges CLI args -> console -> output formatting.

pub mod clusters;
pub mod config_cmd;
pub mod instances;
pub mod interval;
pub mod progressive;
pub mod refresh;
pub mod services;
pub mod snapshot;
pub mod tasks;
pub mod util;
pub mod watch;

use std::time::Duration;

use ecswatch_core::Console;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;
use crate::output;

/// Everything a backend-bound handler needs.
pub struct Context<'a> {
    pub console: &'a Console,
    pub global: &'a GlobalOpts,
    /// Profile that persisted state changes are recorded against.
    pub profile: &'a str,
}

impl Context<'_> {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.global.timeout)
    }

    pub fn color(&self) -> bool {
        output::should_color(&self.global.color)
    }
}

/// Dispatch a backend-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, ctx: &Context<'_>) -> Result<(), CliError> {
    ctx.console.attach().await?;

    match cmd {
        Command::Watch(args) => watch::handle(args, ctx).await,
        Command::Snapshot => snapshot::handle(ctx).await,
        Command::Clusters(args) => clusters::handle(args, ctx).await,
        Command::Services(args) => services::handle(args, ctx).await,
        Command::Tasks(args) => tasks::handle(args, ctx).await,
        Command::Instances(args) => instances::handle(args, ctx).await,
        Command::Refresh => refresh::handle(ctx).await,
        Command::Interval(args) => interval::handle(args, ctx).await,
        Command::Progressive(args) => progressive::handle(args, ctx).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
