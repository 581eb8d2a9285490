use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "circle")]
#[command(about = "Track screen time and compare it with your groups")]
pub struct Cli {
    /// Config file (defaults to ~/.screencircle/config.json)
    #[arg(long, env = "CIRCLE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Local ledger database URL (e.g. sqlite:///path/ledger.db)
    #[arg(long, env = "CIRCLE_LEDGER_URL")]
    pub ledger_url: Option<String>,

    /// Shared store database URL, the same file for every member
    #[arg(long, env = "CIRCLE_REMOTE_URL")]
    pub remote_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Sign in on this device (first-time setup)
    Init {
        /// Stable user id issued by the identity provider
        #[arg(long)]
        user_id: String,

        /// Display name shown to group members
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: Option<String>,
    },
    /// Local usage ledger
    Usage {
        #[command(subcommand)]
        usage_cmd: UsageCommand,
    },
    /// Push pending usage to the shared store
    Sync {
        /// Keep running, syncing on an interval with backoff on failure
        #[arg(long)]
        daemon: bool,
    },
    /// Group commands
    Group {
        #[command(subcommand)]
        group_cmd: GroupCommand,
    },
}

#[derive(Subcommand)]
pub enum UsageCommand {
    /// Record active seconds
    Add {
        seconds: u64,

        /// Day to record against (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show today's total
    Today,
    /// Show the last seven days
    Week,
}

#[derive(Subcommand)]
pub enum GroupCommand {
    /// Create a group and select it
    Create {
        /// Group name
        name: String,
    },
    /// Join a group by id
    Join {
        /// Group id
        group_id: String,
    },
    /// Leave a group (defaults to the current one)
    Leave {
        group_id: Option<String>,
    },
    /// List your groups
    List,
    /// Select the group shown by default
    Use {
        group_id: String,
    },
    /// Show the group leaderboard
    Show {
        /// Group id (defaults to the current one)
        group_id: Option<String>,

        /// Day to show (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Keep printing updates until interrupted
        #[arg(long)]
        watch: bool,
    },
}
