use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tl", about = concat!("taskline v", env!("CARGO_PKG_VERSION"), " - timelines from plain-text task lists"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different workspace directory
    #[arg(short = 'C', long = "dir", global = true)]
    pub dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Summarize every project: completion, counts, next due date
    Index,
    /// Show one task
    Show(ShowArgs),
    /// Show the Epic / Story / Subtask cascade with rollups
    Tree(TreeArgs),
    /// Lay out the timeline: bars, milestones, load and dependency connectors
    Timeline(TimelineArgs),
    /// Move a task to a status (not-started, in-progress, on-hold, done)
    Status(StatusArgs),
    /// Set or remove task properties
    Set(SetArgs),
    /// Shift a task's dates by a number of days
    Move(MoveArgs),
    /// Shift a task's start and/or due date independently
    Resize(ResizeArgs),
    /// Shift a project's front-matter Start/End by a number of days
    MoveProject(MoveProjectArgs),
    /// Shift a project's Start and/or End independently
    ResizeProject(ResizeProjectArgs),
    /// List records that could not be read
    Check,
    /// Reindex whenever documents change
    Watch,
}

// ---------------------------------------------------------------------------
// Read command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ShowArgs {
    /// Task key (`doc.md::id`) or bare id (first match wins)
    pub task: String,
}

#[derive(Args)]
pub struct TreeArgs {
    /// Only this document
    pub doc: Option<String>,
}

#[derive(Args)]
pub struct TimelineArgs {
    /// Anchor date: "today" or YYYY-MM-DD (default from config)
    #[arg(long)]
    pub anchor: Option<String>,
    /// Zoom stop index, 0 (widest) to 9 (closest)
    #[arg(long)]
    pub zoom: Option<usize>,
    /// Hide epics
    #[arg(long)]
    pub hide_epics: bool,
    /// Hide stories
    #[arg(long)]
    pub hide_stories: bool,
    /// Hide finished tasks
    #[arg(long)]
    pub hide_done: bool,
    /// Days shown in the text chart
    #[arg(long, default_value = "42")]
    pub days: usize,
}

// ---------------------------------------------------------------------------
// Write command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct StatusArgs {
    /// Task key or bare id
    pub task: String,
    /// New status
    pub status: String,
}

#[derive(Args)]
pub struct SetArgs {
    /// Task key or bare id
    pub task: String,
    /// Properties to set, as key=value
    pub assignments: Vec<String>,
    /// Properties to remove (repeatable)
    #[arg(long)]
    pub unset: Vec<String>,
}

#[derive(Args)]
pub struct MoveArgs {
    /// Task key or bare id
    pub task: String,
    /// Days to shift (negative moves earlier)
    #[arg(allow_hyphen_values = true)]
    pub days: i64,
}

#[derive(Args)]
pub struct ResizeArgs {
    /// Task key or bare id
    pub task: String,
    /// Days to shift the start date
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub start: i64,
    /// Days to shift the due date
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub due: i64,
}

#[derive(Args)]
pub struct MoveProjectArgs {
    /// Project document key (path relative to the workspace)
    pub doc: String,
    /// Days to shift (negative moves earlier)
    #[arg(allow_hyphen_values = true)]
    pub days: i64,
}

#[derive(Args)]
pub struct ResizeProjectArgs {
    /// Project document key
    pub doc: String,
    /// Days to shift Start
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub start: i64,
    /// Days to shift End
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub end: i64,
}
