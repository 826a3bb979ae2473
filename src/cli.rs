//! Command-line interface definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(about = "Kanban task and employee board with role-based permissions")]
#[command(version)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL (overrides config)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the mock REST backend
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address (overrides config)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Fill the mock backend database with demo employees and tasks
    Seed,

    /// Initialize a new config file
    Init {
        /// Output path for config file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Sign in as an employee
    Login {
        employee_id: String,
    },

    /// Sign out
    Logout,

    /// Show the signed-in user and their permissions
    Whoami,

    /// Act under another role
    Role {
        role: crate::models::Role,
    },

    /// Set the UI theme
    Theme {
        theme: crate::models::Theme,
    },

    /// Task board
    #[command(subcommand)]
    Tasks(TaskCommand),

    /// Employee roster
    #[command(subcommand)]
    Employees(EmployeeCommand),

    /// Audit log
    #[command(subcommand)]
    Audit(AuditCommand),
}

#[derive(Subcommand)]
pub enum TaskCommand {
    /// Show the board
    List(FilterArgs),

    /// Create a task
    Create(TaskFields),

    /// Edit a task's details
    Edit {
        id: String,
        #[command(flatten)]
        fields: TaskFields,
    },

    /// Move a task to another column
    Move {
        id: String,
        status: crate::models::TaskStatus,
    },

    /// Drag a card across columns; omit --drop to release it outside the board
    Drag {
        id: String,
        /// Columns hovered over, in order
        #[arg(long = "over")]
        over: Vec<crate::models::TaskStatus>,
        /// Column the card is dropped on
        #[arg(long)]
        drop: Option<crate::models::TaskStatus>,
    },

    /// Replace a task's assignees
    Assign {
        id: String,
        assignee_ids: Vec<String>,
    },

    /// Set or clear a card color
    Color {
        id: String,
        /// `#rrggbb`; omit to clear
        color: Option<String>,
    },

    /// Delete a task
    Delete {
        id: String,
    },

    /// List available labels
    Labels,
}

#[derive(Args)]
pub struct FilterArgs {
    /// Case-insensitive text search
    #[arg(short, long, default_value = "")]
    pub search: String,

    /// Only tasks assigned to any of these employee ids
    #[arg(short, long = "assignee")]
    pub assignees: Vec<String>,

    #[arg(long)]
    pub status: Option<crate::models::TaskStatus>,

    #[arg(long)]
    pub priority: Option<crate::models::Priority>,

    /// Label id or name
    #[arg(short, long = "label")]
    pub labels: Vec<String>,
}

#[derive(Args)]
pub struct TaskFields {
    #[arg(short, long)]
    pub title: String,

    #[arg(short, long, default_value = "")]
    pub description: String,

    #[arg(long, default_value = "pending")]
    pub status: crate::models::TaskStatus,

    #[arg(short, long = "assignee")]
    pub assignees: Vec<String>,

    #[arg(long)]
    pub priority: Option<crate::models::Priority>,

    /// Due date, YYYY-MM-DD
    #[arg(long)]
    pub due: Option<String>,

    /// Label id or name
    #[arg(short, long = "label")]
    pub labels: Vec<String>,

    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Subcommand)]
pub enum EmployeeCommand {
    /// List employees
    List,

    /// Add an employee
    Add(EmployeeFields),

    /// Update an employee
    Update {
        id: String,
        #[command(flatten)]
        fields: EmployeeFields,
    },

    /// Remove an employee
    Remove {
        id: String,
    },
}

#[derive(Args)]
pub struct EmployeeFields {
    #[arg(short, long)]
    pub name: String,

    #[arg(short, long)]
    pub email: String,

    #[arg(short, long, default_value = "employee")]
    pub role: crate::models::Role,
}

#[derive(Subcommand)]
pub enum AuditCommand {
    /// Show audit entries, newest first
    List {
        #[arg(long)]
        entity: Option<crate::models::EntityType>,

        #[arg(long)]
        action: Option<crate::models::ActionType>,

        /// Only entries for this entity id
        #[arg(long)]
        id: Option<String>,

        #[arg(short = 'n', long, default_value_t = 50)]
        limit: usize,
    },

    /// Write the log as JSON (stdout when no file is given)
    Export {
        output: Option<PathBuf>,
    },

    /// Replace the log with an exported JSON file
    Import {
        input: PathBuf,
    },

    /// Revert a recorded status change
    Restore {
        entry_id: String,
    },

    /// Delete all entries
    Clear,
}
