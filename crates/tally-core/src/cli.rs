use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::filter::FilterMode;
use crate::task::Priority;
use crate::theme::Theme;

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
    name = "tally",
    version,
    about = "tally: a small task list with undo, filters and deadline alerts",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Override a config key for this run (repeatable)
    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    /// Config file to read instead of ~/.tallyrc
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Data directory holding tasks, theme and history
    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Add a task to the end of the list
    Add(AddArgs),
    /// Change a task's text, due date or priority
    Edit(EditArgs),
    /// Toggle a task between pending and completed
    Done(TaskArg),
    /// Delete a task
    Delete(TaskArg),
    /// Exchange the tasks at two list positions
    Swap(SwapArgs),
    /// Show the task list
    List(ListArgs),
    /// Show every field of one task
    Show(TaskArg),
    /// Revert the last change
    Undo,
    /// Reapply the last undone change
    Redo,
    /// Show or set the color theme
    Theme(ThemeArgs),
    /// Write the whole list as CSV
    Export(ExportArgs),
    /// Wait for deadline alerts and deliver them
    Watch(WatchArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Task text
    #[arg(required = true, num_args = 1..)]
    pub text: Vec<String>,

    /// Due date: YYYY-MM-DD, today, tomorrow, a weekday, +Nd or +Nw
    #[arg(short = 'd', long = "due")]
    pub due: Option<String>,

    #[arg(short = 'p', long = "priority", default_value = "medium")]
    pub priority: Priority,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    /// List position (as shown in the # column) or task id
    pub task: String,

    #[arg(short = 't', long = "text")]
    pub text: Option<String>,

    #[arg(short = 'd', long = "due", conflicts_with = "clear_due")]
    pub due: Option<String>,

    /// Remove the due date
    #[arg(long = "clear-due")]
    pub clear_due: bool,

    #[arg(short = 'p', long = "priority")]
    pub priority: Option<Priority>,
}

#[derive(Args, Debug, Clone)]
pub struct TaskArg {
    /// List position (as shown in the # column) or task id
    pub task: String,
}

#[derive(Args, Debug, Clone)]
pub struct SwapArgs {
    pub from: usize,
    pub to: usize,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// all, completed or pending
    #[arg(short = 'f', long = "filter")]
    pub filter: Option<FilterMode>,
}

#[derive(Args, Debug, Clone)]
pub struct ThemeArgs {
    pub theme: Option<Theme>,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Write to this file instead of stdout
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// Exit after the first round that delivers an alert
    #[arg(long = "once")]
    pub once: bool,
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
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
