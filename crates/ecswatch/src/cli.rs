//! Clap derive structures for the `ecswatch` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// ecswatch -- real-time console for ECS clusters
#[derive(Debug, Parser)]
#[command(
    name = "ecswatch",
    version,
    about = "Watch ECS clusters, services and scheduled tasks in real time",
    long_about = "Connects to an ecswatch console backend over its real-time channel\n\
        and renders the cluster snapshot as it loads.\n\n\
        Data arrives progressively: cluster metadata first, then per-cluster\n\
        services and scheduled tasks, then the EC2 inventory.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Console profile to use
    #[arg(long, short = 'p', env = "ECSWATCH_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Console backend URL (overrides profile)
    #[arg(long, short = 's', env = "ECSWATCH_SERVER", global = true)]
    pub server: Option<String>,

    /// Bearer token for the backend
    #[arg(long, env = "ECSWATCH_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Restrict the channel to one transport
    #[arg(long, env = "ECSWATCH_TRANSPORT", global = true)]
    pub transport: Option<TransportChoice>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "ECSWATCH_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "ECSWATCH_INSECURE", global = true)]
    pub insecure: bool,

    /// Connect and load timeout in seconds
    #[arg(long, env = "ECSWATCH_TIMEOUT", default_value = "30", global = true)]
    pub timeout: u64,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TransportChoice {
    /// Websocket streaming
    Websocket,
    /// HTTP long-polling
    Polling,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream the snapshot live as loading cycles arrive
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Load once and print the full snapshot
    Snapshot,

    /// Inspect clusters
    #[command(alias = "cl")]
    Clusters(ClustersArgs),

    /// Inspect and refresh services
    #[command(alias = "svc")]
    Services(ServicesArgs),

    /// Inspect and refresh scheduled tasks
    Tasks(TasksArgs),

    /// Inspect the EC2 container instance inventory
    #[command(alias = "ec2")]
    Instances(InstancesArgs),

    /// Request a full refresh and wait for it to finish
    Refresh,

    /// Show or change the refresh interval
    Interval(IntervalArgs),

    /// Show or toggle progressive (staged) loading
    Progressive(ProgressiveArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Set the refresh interval before watching (auto, pause, 30s, 5m)
    #[arg(long, short = 'i')]
    pub interval: Option<String>,

    /// Print every intermediate snapshot, not only completed cycles
    #[arg(long)]
    pub all_updates: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CLUSTERS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ClustersArgs {
    #[command(subcommand)]
    pub command: ClustersCommand,
}

#[derive(Debug, Subcommand)]
pub enum ClustersCommand {
    /// List clusters with their load state
    #[command(alias = "ls")]
    List,

    /// Show one cluster
    Get {
        /// Cluster name or ARN
        cluster: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SERVICES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ServicesArgs {
    #[command(subcommand)]
    pub command: ServicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum ServicesCommand {
    /// List services across clusters
    #[command(alias = "ls")]
    List(ServiceListArgs),

    /// Show one service
    Get {
        /// Cluster name or ARN
        cluster: String,
        /// Service name
        service: String,
    },

    /// Reload one cluster's services from the backend
    Refresh {
        /// Cluster name or ARN
        cluster: String,
    },
}

#[derive(Debug, Args)]
pub struct ServiceListArgs {
    /// Only services in this cluster (name or ARN)
    #[arg(long, short = 'c')]
    pub cluster: Option<String>,

    /// Only services with this status (e.g. ACTIVE, DRAINING)
    #[arg(long)]
    pub status: Option<String>,

    /// Only services whose rollout the backend flagged as stuck
    #[arg(long, conflicts_with = "degraded")]
    pub stuck: bool,

    /// Only services running fewer tasks than desired
    #[arg(long)]
    pub degraded: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SCHEDULED TASKS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct TasksArgs {
    #[command(subcommand)]
    pub command: TasksCommand,
}

#[derive(Debug, Subcommand)]
pub enum TasksCommand {
    /// List scheduled tasks across clusters
    #[command(alias = "ls")]
    List {
        /// Only tasks in this cluster (name or ARN)
        #[arg(long, short = 'c')]
        cluster: Option<String>,
    },

    /// Reload one cluster's scheduled tasks from the backend
    Refresh {
        /// Cluster name or ARN
        cluster: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  INSTANCES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct InstancesArgs {
    #[command(subcommand)]
    pub command: InstancesCommand,
}

#[derive(Debug, Subcommand)]
pub enum InstancesCommand {
    /// List EC2 instances
    #[command(alias = "ls")]
    List {
        /// Only instances in this state (running, stopped, ...)
        #[arg(long, conflicts_with = "running")]
        state: Option<String>,

        /// Only running instances
        #[arg(long)]
        running: bool,

        /// Only instances of this type (e.g. m6i.large)
        #[arg(long = "type")]
        instance_type: Option<String>,
    },

    /// Show one instance
    Get {
        /// Instance ID
        instance_id: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  INTERVAL / PROGRESSIVE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct IntervalArgs {
    /// New interval: auto, pause, seconds, or a duration like 90s / 5m.
    /// Omit to show the saved interval.
    pub value: Option<String>,
}

#[derive(Debug, Args)]
pub struct ProgressiveArgs {
    /// Turn staged loading on or off. Omit to show the saved setting.
    pub mode: Option<Toggle>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current resolved configuration
    Show,

    /// Set a configuration value on the active profile
    Set {
        /// Config key (server, auth_mode, token_env, transports, ...)
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    #[command(visible_alias = "set-default")]
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store a token or cookie in the system keyring
    SetSecret {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },

    /// Print the config and state file locations
    Path,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
