use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "nk", about = concat!("notekeeper v", env!("CARGO_PKG_VERSION"), " - find your notes, group them by project"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Use a different store file
    #[arg(long, global = true, value_name = "PATH")]
    pub store: Option<String>,

    /// Use a different config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<String>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors, without scan progress
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan folders for notes and projects
    Scan(ScanArgs),
    /// Show projects and their notes
    List,
    /// List projects
    Projects,
    /// List notes
    Notes,
    /// Project management
    Project(ProjectCmd),
    /// Track note files explicitly (clears ignore entries)
    Import(ImportArgs),
    /// Track a file if it is a note, inferring its project
    Open(OpenArgs),
    /// Stop tracking a note (it will be ignored by later scans)
    Remove(NoteIdArg),
    /// Delete a note's file from disk and stop tracking it
    Delete(NoteIdArg),
    /// Rename a note's file
    Rename(RenameArgs),
    /// Assign a note to a project, or unassign it
    Assign(AssignArgs),
    /// Move a note's file into a project folder
    Move(MoveArgs),
    /// List ignored locations
    Ignored(IgnoredArgs),
    /// Stop ignoring a location
    Unignore(UnignoreArgs),
    /// Create a new draft note
    Draft(DraftArgs),
    /// Watch folders and import notes as they are saved
    Watch(WatchArgs),
    /// Remove all projects, notes and ignore entries
    Clear(ClearArgs),
}

// ---------------------------------------------------------------------------
// Scanning
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ScanArgs {
    /// Folders (or files) to scan
    #[arg(required = true)]
    pub paths: Vec<String>,
    /// Stop the scan after this many seconds, keeping what was found
    #[arg(long, value_name = "N")]
    pub timeout_secs: Option<u64>,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Folders to watch
    #[arg(required = true)]
    pub paths: Vec<String>,
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ProjectCmd {
    #[command(subcommand)]
    pub action: ProjectAction,
}

#[derive(Subcommand)]
pub enum ProjectAction {
    /// Add a project folder
    Add(ProjectAddArgs),
    /// Set a project's display name
    Rename(ProjectRenameArgs),
    /// Remove a project and stop tracking its notes
    Remove(ProjectIdArg),
}

#[derive(Args)]
pub struct ProjectAddArgs {
    /// Project folder
    pub path: String,
    /// Display name (default: folder name)
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Args)]
pub struct ProjectRenameArgs {
    /// Project ID
    pub id: u64,
    /// New display name (empty to fall back to the folder name)
    pub name: String,
}

#[derive(Args)]
pub struct ProjectIdArg {
    /// Project ID
    pub id: u64,
}

// ---------------------------------------------------------------------------
// Notes
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ImportArgs {
    /// Note files
    #[arg(required = true)]
    pub files: Vec<String>,
    /// Assign the imported notes to this project
    #[arg(long, value_name = "ID")]
    pub project: Option<u64>,
}

#[derive(Args)]
pub struct OpenArgs {
    /// File that was opened
    pub file: String,
}

#[derive(Args)]
pub struct NoteIdArg {
    /// Note ID
    pub id: u64,
}

#[derive(Args)]
pub struct RenameArgs {
    /// Note ID
    pub id: u64,
    /// New file name
    pub name: String,
}

#[derive(Args)]
pub struct AssignArgs {
    /// Note ID
    pub id: u64,
    /// Project ID (omit to unassign)
    pub project: Option<u64>,
}

#[derive(Args)]
pub struct MoveArgs {
    /// Note ID
    pub id: u64,
    /// Target project ID
    pub project: u64,
}

#[derive(Args)]
pub struct DraftArgs {
    /// File name of the draft
    pub name: String,
}

// ---------------------------------------------------------------------------
// Ignore list and maintenance
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct IgnoredArgs {
    /// Forget every ignored location
    #[arg(long)]
    pub clear: bool,
}

#[derive(Args)]
pub struct UnignoreArgs {
    /// Location to stop ignoring
    pub path: String,
}

#[derive(Args)]
pub struct ClearArgs {
    /// Confirm clearing the database
    #[arg(long)]
    pub yes: bool,
}
