use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use fieldsync_core::sync::RejectionPolicy;

#[derive(Parser)]
#[command(name = "fieldsync")]
#[command(about = "Record field observations offline and sync them to a BrAPI server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// CLI profile name holding the server configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load plots and traits from a metadata bundle (JSON)
    Import {
        /// Bundle file with `plots` and `traits` arrays
        path: PathBuf,
    },
    /// List the plots of a trial
    Plots {
        /// Trial ID
        trial: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve a scanned code to a plot
    Scan {
        /// Plot ID or plot number as read from the label
        code: String,
        /// Trial used to scope plot numbers (defaults to the active trial)
        #[arg(long, value_name = "ID")]
        trial: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the observation form for a plot, or record values with --set
    #[command(alias = "obs")]
    Observe {
        /// Plot ID or plot number
        code: String,
        /// Trial used to scope plot numbers (defaults to the active trial)
        #[arg(long, value_name = "ID")]
        trial: Option<String>,
        /// Trait value as `trait=value`; the trait is matched by ID or name
        #[arg(short = 's', long = "set", value_name = "TRAIT=VALUE")]
        values: Vec<String>,
    },
    /// List actions waiting to be synced
    Pending {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Inspect and resolve actions the server rejected
    #[command(name = "dead-letter")]
    DeadLetter {
        #[command(subcommand)]
        command: DeadLetterCommands,
    },
    /// Replay the queue against the configured server
    Sync {
        /// Keep running, polling connectivity and syncing automatically
        #[arg(long)]
        watch: bool,
        /// Connectivity poll interval in seconds when watching
        #[arg(long, default_value = "30", value_name = "SECS")]
        interval: u64,
    },
    /// Show queue and sync status
    Status {
        /// Number of recent sync runs to show
        #[arg(short, long, default_value = "5")]
        runs: usize,
        /// Probe the server before reporting
        #[arg(long)]
        probe: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or change device settings
    Settings {
        #[command(subcommand)]
        command: Option<SettingsCommands>,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum RejectionPolicyArg {
    /// Park rejected actions and keep draining
    DeadLetter,
    /// Stop the drain on the rejected action
    Halt,
}

impl From<RejectionPolicyArg> for RejectionPolicy {
    fn from(value: RejectionPolicyArg) -> Self {
        match value {
            RejectionPolicyArg::DeadLetter => Self::DeadLetter,
            RejectionPolicyArg::Halt => Self::Halt,
        }
    }
}

#[derive(Subcommand)]
pub enum DeadLetterCommands {
    /// List dead-lettered actions
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Move a dead-lettered action back to the end of the queue
    Retry {
        /// Action ID
        id: String,
    },
    /// Permanently drop a dead-lettered action
    Discard {
        /// Action ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum SettingsCommands {
    /// Print current settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update settings
    Set {
        /// Sync automatically when connectivity returns
        #[arg(long, value_name = "BOOL")]
        auto_sync: Option<bool>,
        /// Trial used to scope numeric plot scans
        #[arg(long, value_name = "ID", conflicts_with = "clear_active_trial")]
        active_trial: Option<String>,
        /// Remove the active trial
        #[arg(long)]
        clear_active_trial: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update the selected profile (see --profile)
    Init {
        /// BrAPI server base URL (e.g. <https://brapi.example.org>)
        #[arg(long, value_name = "URL")]
        api_base_url: Option<String>,
        /// Per-request timeout in seconds
        #[arg(long, value_name = "SECS")]
        request_timeout_secs: Option<u64>,
        /// What a server rejection does to the drain
        #[arg(long, value_enum)]
        rejection_policy: Option<RejectionPolicyArg>,
        /// First retry delay in seconds after a transient failure
        #[arg(long, value_name = "SECS")]
        retry_base_secs: Option<u64>,
        /// Maximum retry delay in seconds
        #[arg(long, value_name = "SECS")]
        retry_max_secs: Option<u64>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Print the resolved profile
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
