use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io;
use crate::io::database::Database;
use crate::io::fs::LocalFs;
use crate::io::kv::JsonFileStore;
use crate::io::watcher::{self, NoteWatcher};
use crate::model::{Config, Location, Note, ScanRules};
use crate::ops::cancel::CancellationToken;
use crate::ops::note_ops::{self, AutoImport};
use crate::ops::scanner::{Progress, Scanner};
use crate::ops::{drafts, ignore_ops, reconcile, tree};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Everything a command needs, loaded once per invocation.
struct Context {
    config: Config,
    rules: ScanRules,
    db: Database,
    fs: LocalFs,
    data_dir: PathBuf,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;
    let mut ctx = load_context(&cli)?;

    match cli.command {
        // Scanning
        Commands::Scan(args) => cmd_scan(&mut ctx, args, json, cli.quiet),
        Commands::Watch(args) => cmd_watch(&mut ctx, args),

        // Read commands
        Commands::List => cmd_list(&ctx, json),
        Commands::Projects => cmd_projects(&ctx, json),
        Commands::Notes => cmd_notes(&ctx, json),
        Commands::Ignored(args) => cmd_ignored(&mut ctx, args, json),

        // Write commands
        Commands::Project(args) => cmd_project(&mut ctx, args, json),
        Commands::Import(args) => cmd_import(&mut ctx, args, json),
        Commands::Open(args) => cmd_open(&mut ctx, args, json),
        Commands::Remove(args) => cmd_remove(&mut ctx, args),
        Commands::Delete(args) => cmd_delete(&mut ctx, args),
        Commands::Rename(args) => cmd_rename(&mut ctx, args, json),
        Commands::Assign(args) => cmd_assign(&mut ctx, args, json),
        Commands::Move(args) => cmd_move(&mut ctx, args, json),
        Commands::Unignore(args) => cmd_unignore(&mut ctx, args),
        Commands::Draft(args) => cmd_draft(&mut ctx, args, json),

        // Maintenance
        Commands::Clear(args) => cmd_clear(&mut ctx, args),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_context(cli: &Cli) -> Result<Context, Box<dyn std::error::Error>> {
    let config_path = cli
        .config
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(config_io::config_path);
    let config = config_io::read_config_from(&config_path)?;
    let rules = config_io::scan_rules(&config)?;

    let store_path = cli
        .store
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(config_io::store_path);
    // Drafts live next to the store unless configured otherwise
    let data_dir = match store_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => config_io::data_dir(),
    };
    let db = Database::open(Arc::new(JsonFileStore::new(store_path)));

    Ok(Context {
        config,
        rules,
        db,
        fs: LocalFs,
        data_dir,
    })
}

/// Absolute location for a path given on the command line. Existing paths
/// are canonicalized; others are made absolute against the working directory.
fn resolve_location(path: &str) -> Result<Location, Box<dyn std::error::Error>> {
    let resolved = match std::fs::canonicalize(path) {
        Ok(abs) => abs,
        Err(_) => std::path::absolute(path)
            .map_err(|e| format!("cannot resolve path '{}': {}", path, e))?,
    };
    Ok(Location::new(resolved))
}

fn resolve_existing(path: &str) -> Result<Location, Box<dyn std::error::Error>> {
    let abs = std::fs::canonicalize(path)
        .map_err(|e| format!("cannot resolve path '{}': {}", path, e))?;
    Ok(Location::new(abs))
}

fn print_json<T: serde::Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Scanning
// ---------------------------------------------------------------------------

fn cmd_scan(ctx: &mut Context, args: ScanArgs, json: bool, quiet: bool) -> CmdResult {
    let roots = args
        .paths
        .iter()
        .map(|p| resolve_existing(p))
        .collect::<Result<Vec<_>, _>>()?;

    let cancel = CancellationToken::new();
    if let Some(secs) = args.timeout_secs {
        cancel.cancel_after(Duration::from_secs(secs));
    }
    let progress = |message: &str| {
        if !quiet {
            eprintln!("{}", message);
        }
    };

    let report = Scanner::new(&ctx.fs, &ctx.rules).scan(
        &roots,
        &cancel,
        Some(&progress as &dyn Progress),
    );
    // Another nk process may have written while the scan ran
    ctx.db.load();
    let summary = reconcile::apply_scan(&mut ctx.db, &ctx.fs, &ctx.rules, &report, &cancel);

    if json {
        #[derive(serde::Serialize)]
        struct ScanJson<'a> {
            cancelled: bool,
            #[serde(flatten)]
            summary: &'a reconcile::ReconcileSummary,
        }
        return print_json(&ScanJson {
            cancelled: report.cancelled,
            summary: &summary,
        });
    }

    if report.cancelled {
        println!("scan cancelled, keeping partial results");
    }
    println!(
        "found {} notes and {} projects",
        summary.notes_found, summary.projects_found
    );
    println!(
        "added {} notes and {} projects, assigned {} notes",
        summary.notes_created, summary.projects_created, summary.notes_assigned
    );
    if summary.notes_skipped_ignored > 0 {
        println!("skipped {} ignored notes", summary.notes_skipped_ignored);
    }
    Ok(())
}

fn cmd_watch(ctx: &mut Context, args: WatchArgs) -> CmdResult {
    let roots: Vec<PathBuf> = args
        .paths
        .iter()
        .map(|p| resolve_existing(p).map(|loc| loc.as_path().to_path_buf()))
        .collect::<Result<_, _>>()?;
    let note_watcher = NoteWatcher::start(&roots, &ctx.rules)?;
    let cancel = CancellationToken::new();

    println!("watching {} folders (Ctrl-C to stop)", roots.len());
    loop {
        let Some(first) = note_watcher.wait(Duration::from_millis(500)) else {
            continue;
        };
        let mut events = vec![first];
        events.extend(note_watcher.poll());

        let paths = watcher::touched_paths(events)
            .into_iter()
            .filter(|path| watcher::is_under_roots(path, &roots));
        for note in import_touched(ctx, paths, &cancel) {
            println!("imported {}", format_note_line(&note));
        }
    }
}

/// Auto-import every touched path that looks like a note.
///
/// The database is reloaded first so that changes other `nk` processes made
/// since the last batch are not overwritten.
fn import_touched(
    ctx: &mut Context,
    paths: impl IntoIterator<Item = PathBuf>,
    cancel: &CancellationToken,
) -> Vec<Note> {
    ctx.db.load();
    paths
        .into_iter()
        .filter_map(|path| {
            match note_ops::auto_import(
                &mut ctx.db,
                &ctx.fs,
                &ctx.rules,
                &Location::new(&path),
                cancel,
            ) {
                AutoImport::Imported(note) => Some(note),
                _ => None,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_list(ctx: &Context, json: bool) -> CmdResult {
    let tree = tree::build_tree(&ctx.db);
    if json {
        return print_json(&tree_to_json(&tree));
    }
    let lines = format_tree(&tree);
    if lines.is_empty() {
        println!("No notes yet. Run `nk scan <folder>` to find some.");
    }
    for line in &lines {
        println!("{}", line);
    }
    Ok(())
}

fn cmd_projects(ctx: &Context, json: bool) -> CmdResult {
    let tree = tree::build_tree(&ctx.db);
    if json {
        let items: Vec<ProjectJson> = tree
            .projects
            .iter()
            .map(|g| project_to_json(g.project, Some(g.notes.len())))
            .collect();
        return print_json(&items);
    }
    for group in &tree.projects {
        println!("{}", format_project_line(group.project));
    }
    Ok(())
}

fn cmd_notes(ctx: &Context, json: bool) -> CmdResult {
    let views = tree::note_views(&ctx.db);
    if json {
        let items: Vec<NoteJson> = views.iter().map(view_to_json).collect();
        return print_json(&items);
    }
    for view in &views {
        match view.project {
            Some(project) => println!(
                "{}  [{}]",
                format_note_line(view.note),
                project.display_name()
            ),
            None => println!("{}", format_note_line(view.note)),
        }
    }
    Ok(())
}

fn cmd_ignored(ctx: &mut Context, args: IgnoredArgs, json: bool) -> CmdResult {
    if args.clear {
        let count = ignore_ops::clear_ignored(&mut ctx.db);
        println!("cleared {} ignored locations", count);
        return Ok(());
    }
    let locations = ignore_ops::ignored_locations(&ctx.db);
    if json {
        let items: Vec<String> = locations.iter().map(|l| l.to_string()).collect();
        return print_json(&items);
    }
    for location in &locations {
        println!("{}", location);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_project(ctx: &mut Context, args: ProjectCmd, json: bool) -> CmdResult {
    match args.action {
        ProjectAction::Add(a) => {
            let location = resolve_existing(&a.path)?;
            if !location.as_path().is_dir() {
                return Err(format!("not a folder: {}", location).into());
            }
            if let Some(existing) = ctx.db.project_by_location(&location) {
                return Err(format!("already a project: {}", format_project_line(existing)).into());
            }
            let project = note_ops::new_project(&mut ctx.db, location, a.name);
            if json {
                return print_json(&project_to_json(&project, None));
            }
            println!("added project {}", format_project_line(&project));
        }
        ProjectAction::Rename(a) => {
            let project = note_ops::rename_project(&mut ctx.db, a.id, Some(a.name))?;
            if json {
                return print_json(&project_to_json(&project, None));
            }
            println!("renamed project {}", format_project_line(&project));
        }
        ProjectAction::Remove(a) => {
            let (project, notes) = note_ops::delete_project(&mut ctx.db, a.id)?;
            println!(
                "removed project \"{}\" and {} notes",
                project.display_name(),
                notes.len()
            );
        }
    }
    Ok(())
}

fn cmd_import(ctx: &mut Context, args: ImportArgs, json: bool) -> CmdResult {
    let locations = args
        .files
        .iter()
        .map(|f| resolve_location(f))
        .collect::<Result<Vec<_>, _>>()?;
    let created = note_ops::import_notes(&mut ctx.db, &locations, args.project)?;

    if json {
        let items: Vec<NoteJson> = created
            .iter()
            .map(|n| note_to_json(n, ctx.db.project_of(n)))
            .collect();
        return print_json(&items);
    }
    println!("imported {} notes", created.len());
    for note in &created {
        println!("  {}", format_note_line(note));
    }
    Ok(())
}

fn cmd_open(ctx: &mut Context, args: OpenArgs, json: bool) -> CmdResult {
    let location = resolve_location(&args.file)?;
    let outcome = note_ops::auto_import(
        &mut ctx.db,
        &ctx.fs,
        &ctx.rules,
        &location,
        &CancellationToken::new(),
    );

    if json {
        #[derive(serde::Serialize)]
        struct OpenJson {
            outcome: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            note: Option<NoteJson>,
        }
        let (label, note) = match &outcome {
            AutoImport::NotANote => ("not_a_note", None),
            AutoImport::Ignored => ("ignored", None),
            AutoImport::AlreadyTracked(n) => ("already_tracked", Some(n)),
            AutoImport::Imported(n) => ("imported", Some(n)),
        };
        return print_json(&OpenJson {
            outcome: label,
            note: note.map(|n| note_to_json(n, ctx.db.project_of(n))),
        });
    }

    match outcome {
        AutoImport::NotANote => println!("{} is not a note", location),
        AutoImport::Ignored => println!("{} is ignored (use `nk import` to track it)", location),
        AutoImport::AlreadyTracked(note) => println!("already tracked: {}", format_note_line(&note)),
        AutoImport::Imported(note) => {
            match ctx.db.project_of(&note) {
                Some(project) => println!(
                    "imported {}  [{}]",
                    format_note_line(&note),
                    project.display_name()
                ),
                None => println!("imported {}", format_note_line(&note)),
            }
        }
    }
    Ok(())
}

fn cmd_remove(ctx: &mut Context, args: NoteIdArg) -> CmdResult {
    let note = note_ops::remove_note(&mut ctx.db, args.id)?;
    println!("removed {}", format_note_line(&note));
    Ok(())
}

fn cmd_delete(ctx: &mut Context, args: NoteIdArg) -> CmdResult {
    let note = note_ops::delete_note_from_disk(&mut ctx.db, &ctx.fs, args.id)?;
    println!("deleted {}", format_note_line(&note));
    Ok(())
}

fn cmd_rename(ctx: &mut Context, args: RenameArgs, json: bool) -> CmdResult {
    let note = note_ops::rename_note(&mut ctx.db, &ctx.fs, args.id, &args.name)?;
    if json {
        return print_json(&note_to_json(&note, ctx.db.project_of(&note)));
    }
    println!("renamed {}", format_note_line(&note));
    Ok(())
}

fn cmd_assign(ctx: &mut Context, args: AssignArgs, json: bool) -> CmdResult {
    let note = note_ops::assign_project(&mut ctx.db, args.id, args.project)?;
    let project = ctx.db.project_of(&note);
    if json {
        return print_json(&note_to_json(&note, project));
    }
    match project {
        Some(project) => println!("#{} → {}", note.id, project.display_name()),
        None => println!("#{} → no project", note.id),
    }
    Ok(())
}

fn cmd_move(ctx: &mut Context, args: MoveArgs, json: bool) -> CmdResult {
    let note = note_ops::move_note_to_project(&mut ctx.db, &ctx.fs, args.id, args.project)?;
    if json {
        return print_json(&note_to_json(&note, ctx.db.project_of(&note)));
    }
    println!("moved {}", format_note_line(&note));
    Ok(())
}

fn cmd_unignore(ctx: &mut Context, args: UnignoreArgs) -> CmdResult {
    let location = resolve_location(&args.path)?;
    if ignore_ops::unignore(&mut ctx.db, &location) {
        println!("no longer ignoring {}", location);
        Ok(())
    } else {
        Err(format!("not ignored: {}", location).into())
    }
}

fn cmd_draft(ctx: &mut Context, args: DraftArgs, json: bool) -> CmdResult {
    let folder = drafts::draft_folder(&ctx.config.drafts, &ctx.data_dir);
    let note = drafts::create_draft(&mut ctx.db, &ctx.fs, &folder, &args.name)?;
    if json {
        return print_json(&note_to_json(&note, None));
    }
    println!("created draft {}", format_note_line(&note));
    Ok(())
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

fn cmd_clear(ctx: &mut Context, args: ClearArgs) -> CmdResult {
    if !args.yes {
        return Err("this removes every project, note and ignore entry; pass --yes to confirm".into());
    }
    let (projects, notes) = (ctx.db.projects.len(), ctx.db.notes.len());
    ctx.db.clear();
    println!("cleared {} projects and {} notes", projects, notes);
    Ok(())
}
