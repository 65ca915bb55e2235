use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "deadlinez",
    version,
    about = "Deadlinez: a personal task tracker",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Override a config key for this run
    #[arg(
        long = "set",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub overrides: Vec<KeyVal>,

    #[arg(long = "rc-file", global = true)]
    pub rc_file: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a task, inviting its assignee by email
    Add {
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
        /// today, tomorrow, friday, +3d, 2025-03-07, ...
        #[arg(long)]
        due: String,
        #[arg(long = "assign")]
        assign: Option<String>,
        /// pink, green, blue, purple, yellow (or the hex value)
        #[arg(long)]
        color: Option<String>,
        /// Skip the invite even if the task is assigned
        #[arg(long = "no-invite")]
        no_invite: bool,
    },
    /// Mark a task completed
    Done { id: String },
    Delete { id: String },
    Show { id: String },
    /// Soonest pending tasks
    Upcoming {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// All pending tasks
    Pending,
    /// Recently completed tasks, latest due first
    Recent {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Tasks due this month, then everything due later
    Month {
        /// Month number or name; defaults to the current month
        month: Option<String>,
        #[arg(long)]
        year: Option<i32>,
    },
    /// Due and completed counts for a month, with a per-day chart
    Progress {
        month: Option<String>,
        #[arg(long)]
        year: Option<i32>,
        /// Show every day of the month, including empty ones
        #[arg(long)]
        dense: bool,
    },
    /// Email someone a task without adding it to the list
    Invite {
        #[arg(long)]
        to: String,
        #[arg(long)]
        task: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        from: Option<String>,
    },
    /// Print the effective configuration
    Config,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
