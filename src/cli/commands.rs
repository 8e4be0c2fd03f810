use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "plog", about = concat!("plog v", env!("CARGO_PKG_VERSION"), " - notes, todos and time tracking in plain CSV"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Directory holding the project files (overrides the config file)
    #[arg(long, global = true)]
    pub datadir: Option<PathBuf>,

    /// Config file to read instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Skip the commit hook for this invocation
    #[arg(long, global = true)]
    pub no_commit: bool,

    /// Verbose logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a note to a project
    Note(EntryArgs),
    /// Add a todo to a project
    Todo(EntryArgs),
    /// Mark a todo done
    Done(EntryArgs),
    /// Start or stop time tracking (use "stop" to stop)
    Track(TrackArgs),
    /// List all projects
    Projects,
    /// Show notes
    Notes(ReadArgs),
    /// Show open todos
    Todos(ReadArgs),
    /// Show time tracking entries
    Tracks(ReadArgs),
    /// Show open todos and notes together
    Entries(ReadArgs),
    /// Show dates with notes or open todos
    Dates(ReadArgs),
    /// Search note lines by regex
    Search(SearchArgs),
    /// List projects whose latest track is running
    Active(ProjectsArgs),
    /// Append one project's rows to another and remove the first
    Merge(MergeArgs),
    /// Rename a project
    Rename(RenameArgs),
    /// Delete a project
    Remove(RemoveArgs),
    /// Commit pending changes in the data directory
    Commit(CommitArgs),
    /// Push the data directory
    Push,
}

// ---------------------------------------------------------------------------
// Write command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct EntryArgs {
    /// Project name
    pub project: String,
    /// Entry text (joined with spaces)
    #[arg(required = true, num_args = 1..)]
    pub text: Vec<String>,
    /// Record time (RFC 3339, default: now)
    #[arg(long)]
    pub timestamp: Option<String>,
}

#[derive(Args)]
pub struct TrackArgs {
    /// Project name
    pub project: String,
    /// Optional annotation (joined with spaces)
    pub text: Vec<String>,
    /// Record time (RFC 3339, default: now)
    #[arg(long)]
    pub timestamp: Option<String>,
}

// ---------------------------------------------------------------------------
// Read command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ReadArgs {
    /// Projects to show (default: all)
    pub projects: Vec<String>,
    /// Earliest record to show (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub start: Option<String>,
    /// Latest record to show (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub end: Option<String>,
    /// Include subprojects (projects whose name starts with a given name)
    #[arg(long)]
    pub subprojects: bool,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Regex matched against each note line
    pub pattern: String,
    /// Projects to search (default: all)
    pub projects: Vec<String>,
    /// Include subprojects
    #[arg(long)]
    pub subprojects: bool,
}

#[derive(Args)]
pub struct ProjectsArgs {
    /// Projects to check (default: all)
    pub projects: Vec<String>,
    /// Include subprojects
    #[arg(long)]
    pub subprojects: bool,
}

// ---------------------------------------------------------------------------
// Project management args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct MergeArgs {
    /// Project to merge and remove
    pub src: String,
    /// Project receiving the rows
    pub dst: String,
}

#[derive(Args)]
pub struct RenameArgs {
    pub old: String,
    pub new: String,
}

#[derive(Args)]
pub struct RemoveArgs {
    pub project: String,
}

#[derive(Args)]
pub struct CommitArgs {
    /// Commit message
    pub message: String,
}
