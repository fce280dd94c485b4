use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::model::Priority;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskflow",
    version,
    about = "Keep your task list in sync with the TaskFlow server from the terminal.",
    after_help = "Examples:\n  taskflow --user 42 list --filter today\n  taskflow add Submit budget --priority high --due fri\n  taskflow toggle 17\n  taskflow mcp --log debug"
)]
pub struct Cli {
    /// Override the data directory (defaults to platform-specific app dir)
    #[arg(long, value_name = "PATH", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Base URL of the task API (defaults to TASKFLOW_API_URL or http://localhost:8000)
    #[arg(long, value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// Signed-in user id; without one, changes stay local
    #[arg(long = "user", value_name = "ID", global = true)]
    pub user_id: Option<String>,

    /// Tracing filter for stderr logs (e.g. "info", "taskflow_core=debug")
    #[arg(long = "log", value_name = "DIRECTIVE", global = true)]
    pub log_filter: Option<String>,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CliCommand {
    /// Show tasks, optionally narrowed by filter and category (default command)
    List(ListArgs),
    /// Create a task on the server
    Add(AddArgs),
    /// Flip a task between pending and completed
    Toggle(ToggleArgs),
    /// Delete one or more tasks by id
    Delete(DeleteArgs),
    /// Change fields of an existing task
    Edit(EditArgs),
    /// Completion rates and per-category progress
    Stats,
    /// Tasks grouped by due date
    Calendar,
    /// Run the Model Context Protocol server over stdio
    Mcp,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// All, Today, High, Medium, Low or Completed
    #[arg(long, value_name = "FILTER", default_value = "All")]
    pub filter: String,

    /// Only tasks in this category key or custom category id
    #[arg(long, value_name = "CATEGORY")]
    pub category: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Task title
    #[arg(value_name = "TITLE", required = true)]
    pub title: Vec<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long, value_enum, default_value_t = Priority::Medium)]
    pub priority: Priority,

    /// work, personal, study, health or a custom category id
    #[arg(long, default_value = "work")]
    pub category: String,

    /// Due date (ISO e.g. 2026-12-24, today, tomorrow, +3d, mon)
    #[arg(long = "due", value_name = "DATE")]
    pub due_date: Option<String>,

    /// Due time (HH:MM)
    #[arg(long = "time", value_name = "HH:MM")]
    pub due_time: Option<String>,

    #[arg(long)]
    pub recurring: bool,

    #[arg(long)]
    pub reminder: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ToggleArgs {
    #[arg(value_name = "ID")]
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    /// One or more task ids to delete
    #[arg(value_name = "ID", required = true)]
    pub ids: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct EditArgs {
    #[arg(value_name = "ID")]
    pub id: String,

    #[arg(long)]
    pub title: Option<String>,

    /// New description; an empty value clears it
    #[arg(long)]
    pub description: Option<String>,

    #[arg(long, value_enum)]
    pub priority: Option<Priority>,

    #[arg(long)]
    pub category: Option<String>,

    #[arg(long = "due", value_name = "DATE", conflicts_with = "clear_due")]
    pub due_date: Option<String>,

    #[arg(long = "time", value_name = "HH:MM", conflicts_with = "clear_due")]
    pub due_time: Option<String>,

    /// Remove the due date and time
    #[arg(long = "clear-due")]
    pub clear_due: bool,

    #[arg(long, value_name = "BOOL")]
    pub recurring: Option<bool>,

    #[arg(long, value_name = "BOOL")]
    pub reminder: Option<bool>,
}
