use std::io::Write as _;

use chrono::{DateTime, FixedOffset, Utc};
use regex::Regex;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::format::{ProjectSection, asciidoc};
use crate::io::config_io::{self, ConfigError};
use crate::io::hook::{self, CommitHook, HookError};
use crate::io::store::Store;
use crate::model::config::Config;
use crate::model::project::Project;
use crate::ops::write::{Action, Pipeline, WriteRequest};
use crate::ops::{filter, projects, search};
use crate::parse::timestamp;

/// Everything a command needs, resolved once from flags and config
struct Context {
    config: Config,
    store: Store,
    json: bool,
    no_commit: bool,
}

impl Context {
    /// The commit hook for write commands, if commits are enabled
    fn write_hook(&self) -> Result<Option<Box<dyn CommitHook>>, HookError> {
        if self.no_commit || !self.config.scm.auto_commit {
            return Ok(None);
        }
        hook::hook_for(&self.config.scm, self.store.datadir()).map(Some)
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&cli)?;
    let store = Store::from_config(&config)?;
    tracing::debug!(datadir = %store.datadir().display(), "using data directory");

    let ctx = Context {
        config,
        store,
        json: cli.json,
        no_commit: cli.no_commit,
    };

    match cli.command {
        // Write commands
        Commands::Note(args) => cmd_entry(&ctx, Action::Note, args),
        Commands::Todo(args) => cmd_entry(&ctx, Action::Todo, args),
        Commands::Done(args) => cmd_entry(&ctx, Action::Done, args),
        Commands::Track(args) => {
            cmd_write(&ctx, Action::Track, args.project, args.text, args.timestamp)
        }

        // Read commands
        Commands::Projects => cmd_projects(&ctx),
        Commands::Notes(args) => cmd_notes(&ctx, args),
        Commands::Todos(args) => cmd_todos(&ctx, args),
        Commands::Tracks(args) => cmd_tracks(&ctx, args),
        Commands::Entries(args) => cmd_entries(&ctx, args),
        Commands::Dates(args) => cmd_dates(&ctx, args),
        Commands::Search(args) => cmd_search(&ctx, args),
        Commands::Active(args) => cmd_active(&ctx, args),

        // Project management
        Commands::Merge(args) => cmd_merge(&ctx, args),
        Commands::Rename(args) => cmd_rename(&ctx, args),
        Commands::Remove(args) => cmd_remove(&ctx, args),

        // Version control
        Commands::Commit(args) => cmd_commit(&ctx, args),
        Commands::Push => cmd_push(&ctx),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Config file (explicit path or default location), then flag overrides
fn load_config(cli: &Cli) -> Result<Config, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => config_io::read_config_from(path)?,
        None => config_io::read_config()?,
    };
    if let Some(ref datadir) = cli.datadir {
        config.datadir = datadir.clone();
    }
    Ok(config)
}

/// Inclusive time range from `--start`/`--end`; open ends are unbounded.
fn time_range(args: &ReadArgs) -> Result<(DateTime<FixedOffset>, DateTime<FixedOffset>), String> {
    let start = match args.start {
        Some(ref s) => timestamp::parse_time_arg(s, false)?,
        None => DateTime::<Utc>::MIN_UTC.fixed_offset(),
    };
    let end = match args.end {
        Some(ref s) => timestamp::parse_time_arg(s, true)?,
        None => DateTime::<Utc>::MAX_UTC.fixed_offset(),
    };
    if start > end {
        return Err(format!(
            "--start {} is after --end {}",
            timestamp::format_timestamp(&start),
            timestamp::format_timestamp(&end)
        ));
    }
    Ok((start, end))
}

fn write_timestamp(arg: Option<String>) -> Result<DateTime<FixedOffset>, String> {
    match arg {
        Some(s) => timestamp::parse_timestamp(&s)
            .map_err(|e| format!("invalid --timestamp {:?}: {}", s, e)),
        None => Ok(timestamp::now()),
    }
}

fn resolve(ctx: &Context, args: &ReadArgs) -> Result<Vec<Project>, Box<dyn std::error::Error>> {
    Ok(projects::resolve_projects(
        &ctx.store,
        &args.projects,
        args.subprojects,
    )?)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_report<F>(render: F) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce(&mut std::io::StdoutLock<'static>) -> std::io::Result<()>,
{
    let mut out = std::io::stdout().lock();
    render(&mut out)?;
    out.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_entry(
    ctx: &Context,
    action: Action,
    args: EntryArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    cmd_write(ctx, action, args.project, args.text, args.timestamp)
}

fn cmd_write(
    ctx: &Context,
    action: Action,
    project: String,
    text: Vec<String>,
    timestamp: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let request = WriteRequest {
        project,
        action,
        value: text.join(" "),
        timestamp: write_timestamp(timestamp)?,
    };

    let hook = ctx.write_hook()?;
    let pipeline =
        Pipeline::new(&ctx.store, hook.as_deref()).with_auto_push(ctx.config.scm.auto_push);
    let record = pipeline.write(&request).inspect_err(|e| {
        if e.is_retryable() {
            eprintln!("hint: the entry is saved; run `plog commit <message>` to commit it");
        }
    })?;

    if ctx.json {
        print_json(&record_to_json(&record))
    } else {
        println!("{}", format_written(&record));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_projects(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let projects = ctx.store.list_projects()?;
    if ctx.json {
        let items: Vec<ProjectJson> = projects.iter().map(project_to_json).collect();
        return print_json(&items);
    }
    for project in &projects {
        println!("{}", project.name);
    }
    Ok(())
}

fn note_sections(
    ctx: &Context,
    args: &ReadArgs,
) -> Result<Vec<ProjectSection>, Box<dyn std::error::Error>> {
    let (start, end) = time_range(args)?;
    let mut sections = Vec::new();
    for project in resolve(ctx, args)? {
        let notes = filter::non_empty_notes(ctx.store.read_notes(&project)?);
        let mut notes = filter::filter_by_time_range(notes, start, end);
        filter::sort_by_timestamp(&mut notes);
        sections.push(ProjectSection {
            project: project.name,
            notes,
            ..Default::default()
        });
    }
    Ok(sections)
}

fn todo_sections(
    ctx: &Context,
    args: &ReadArgs,
) -> Result<Vec<ProjectSection>, Box<dyn std::error::Error>> {
    let (start, end) = time_range(args)?;
    let mut sections = Vec::new();
    for project in resolve(ctx, args)? {
        let mut todos = filter::open_todos_in_range(ctx.store.read_todos(&project)?, start, end);
        filter::sort_todos_by_value(&mut todos);
        sections.push(ProjectSection {
            project: project.name,
            todos,
            ..Default::default()
        });
    }
    Ok(sections)
}

fn cmd_notes(ctx: &Context, args: ReadArgs) -> Result<(), Box<dyn std::error::Error>> {
    let sections = note_sections(ctx, &args)?;
    if ctx.json {
        let items: Vec<NoteJson> = sections
            .iter()
            .flat_map(|s| s.notes.iter().map(note_to_json))
            .collect();
        return print_json(&items);
    }
    print_report(|w| asciidoc::write_notes(w, &sections))
}

fn cmd_todos(ctx: &Context, args: ReadArgs) -> Result<(), Box<dyn std::error::Error>> {
    let sections = todo_sections(ctx, &args)?;
    if ctx.json {
        let items: Vec<TodoJson> = sections
            .iter()
            .flat_map(|s| s.todos.iter().map(todo_to_json))
            .collect();
        return print_json(&items);
    }
    print_report(|w| asciidoc::write_todos(w, &sections))
}

fn cmd_tracks(ctx: &Context, args: ReadArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (start, end) = time_range(&args)?;
    let mut sections = Vec::new();
    for project in resolve(ctx, &args)? {
        let tracks = ctx.store.read_tracks(&project)?;
        let mut tracks = filter::filter_by_time_range(tracks, start, end);
        filter::sort_by_timestamp(&mut tracks);
        sections.push(ProjectSection {
            project: project.name,
            tracks,
            ..Default::default()
        });
    }

    if ctx.json {
        let items: Vec<TrackJson> = sections
            .iter()
            .flat_map(|s| s.tracks.iter().map(track_to_json))
            .collect();
        return print_json(&items);
    }
    print_report(|w| asciidoc::write_tracks(w, &sections))
}

fn cmd_entries(ctx: &Context, args: ReadArgs) -> Result<(), Box<dyn std::error::Error>> {
    let notes = note_sections(ctx, &args)?;
    let todos = todo_sections(ctx, &args)?;
    // both lists come from the same resolved project order
    let sections: Vec<ProjectSection> = notes
        .into_iter()
        .zip(todos)
        .map(|(n, t)| ProjectSection {
            todos: t.todos,
            ..n
        })
        .collect();

    if ctx.json {
        let items: Vec<EntriesJson> = sections
            .iter()
            .filter(|s| !s.notes.is_empty() || !s.todos.is_empty())
            .map(entries_to_json)
            .collect();
        return print_json(&items);
    }
    print_report(|w| asciidoc::write_entries(w, &sections))
}

fn cmd_dates(ctx: &Context, args: ReadArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (start, end) = time_range(&args)?;
    let projects = resolve(ctx, &args)?;
    let dates = projects::project_dates(&ctx.store, &projects, start, end)?;
    if ctx.json {
        return print_json(&dates_to_json(&dates));
    }
    print_report(|w| asciidoc::write_dates(w, &dates))
}

fn cmd_search(ctx: &Context, args: SearchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let re = Regex::new(&args.pattern)?;
    let projects = projects::resolve_projects(&ctx.store, &args.projects, args.subprojects)?;
    let hits = search::search_notes(&ctx.store, &projects, &re)?;

    if ctx.json {
        let items: Vec<SearchHitJson> = hits.iter().map(search_hit_to_json).collect();
        return print_json(&items);
    }
    for hit in &hits {
        println!("{}", format_search_hit(hit));
    }
    Ok(())
}

fn cmd_active(ctx: &Context, args: ProjectsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let candidates = projects::resolve_projects(&ctx.store, &args.projects, args.subprojects)?;
    let mut active = Vec::new();
    for project in candidates {
        if projects::project_is_active(&ctx.store, &project)? {
            active.push(project);
        }
    }

    if ctx.json {
        let items: Vec<ProjectJson> = active.iter().map(project_to_json).collect();
        return print_json(&items);
    }
    for project in &active {
        println!("{}", project.name);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Project management
// ---------------------------------------------------------------------------

fn cmd_merge(ctx: &Context, args: MergeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let hook = ctx.write_hook()?;
    Pipeline::new(&ctx.store, hook.as_deref())
        .with_auto_push(ctx.config.scm.auto_push)
        .merge(&args.src, &args.dst)?;
    println!("Merged {} into {}", args.src, args.dst);
    Ok(())
}

fn cmd_rename(ctx: &Context, args: RenameArgs) -> Result<(), Box<dyn std::error::Error>> {
    let hook = ctx.write_hook()?;
    Pipeline::new(&ctx.store, hook.as_deref())
        .with_auto_push(ctx.config.scm.auto_push)
        .rename(&args.old, &args.new)?;
    println!("Renamed {} to {}", args.old, args.new);
    Ok(())
}

fn cmd_remove(ctx: &Context, args: RemoveArgs) -> Result<(), Box<dyn std::error::Error>> {
    let hook = ctx.write_hook()?;
    Pipeline::new(&ctx.store, hook.as_deref())
        .with_auto_push(ctx.config.scm.auto_push)
        .remove(&args.project)?;
    println!("Removed {}", args.project);
    Ok(())
}

// ---------------------------------------------------------------------------
// Version control
// ---------------------------------------------------------------------------

fn cmd_commit(ctx: &Context, args: CommitArgs) -> Result<(), Box<dyn std::error::Error>> {
    // explicit commits ignore auto_commit
    let hook = hook::hook_for(&ctx.config.scm, ctx.store.datadir())?;
    Pipeline::new(&ctx.store, Some(&*hook))
        .with_auto_push(ctx.config.scm.auto_push)
        .commit_all(&args.message)?;
    Ok(())
}

fn cmd_push(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let hook = hook::hook_for(&ctx.config.scm, ctx.store.datadir())?;
    Pipeline::new(&ctx.store, Some(&*hook)).push()?;
    Ok(())
}
