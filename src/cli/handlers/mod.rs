use std::cell::Cell;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use tracing::{debug, info, warn};

use crate::cli::commands::*;
use crate::cli::gantt;
use crate::cli::output::*;
use crate::io::config_io::{self, CONFIG_FILE};
use crate::io::recovery::read_recovery_entries;
use crate::io::store::FsStore;
use crate::io::watcher::DocumentWatcher;
use crate::model::config::{Anchor, Config};
use crate::model::task::{TaskKey, TaskStatus};
use crate::ops::index::{ChangeSignal, IndexEngine, ScanOutcome};
use crate::ops::mutate::{self, MutationOutcome, TaskChanges};
use crate::timeline::{TimelineParams, ViewFilter, Zoom, heat_map, layout, route_edges};

type CmdResult = Result<(), Box<dyn Error>>;

/// Label column width of the text timeline
const LABEL_WIDTH: usize = 28;

/// Quiet period that folds an editor's burst of writes into one reindex
const WATCH_SETTLE: Duration = Duration::from_millis(150);

/// Everything a command needs: the workspace, its config and a fresh index
struct Workspace {
    root: PathBuf,
    config: Config,
    engine: IndexEngine<FsStore>,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;
    let root = resolve_root(cli.dir.as_deref())?;

    match cli.command {
        // Read commands
        Commands::Index => cmd_index(&root, json),
        Commands::Show(args) => cmd_show(&root, args, json),
        Commands::Tree(args) => cmd_tree(&root, args, json),
        Commands::Timeline(args) => cmd_timeline(&root, args, json),
        Commands::Check => cmd_check(&root, json),
        Commands::Watch => cmd_watch(&root),

        // Write commands
        Commands::Status(args) => cmd_status(&root, args, json),
        Commands::Set(args) => cmd_set(&root, args, json),
        Commands::Move(args) => cmd_move(&root, args, json),
        Commands::Resize(args) => cmd_resize(&root, args, json),
        Commands::MoveProject(args) => cmd_move_project(&root, args, json),
        Commands::ResizeProject(args) => cmd_resize_project(&root, args, json),
    }
}

fn resolve_root(dir: Option<&str>) -> Result<PathBuf, Box<dyn Error>> {
    match dir {
        Some(dir) => Ok(std::fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?),
        None => Ok(std::env::current_dir()?.canonicalize()?),
    }
}

fn open_workspace(root: &Path) -> Result<Workspace, Box<dyn Error>> {
    let config = config_io::load_config(root)?;
    let mut engine = IndexEngine::new(FsStore::new(root, &config.index));
    let outcome = engine.reindex()?;
    debug!(?outcome, root = %root.display(), "workspace indexed");
    Ok(Workspace {
        root: root.to_path_buf(),
        config,
        engine,
    })
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn resolve_task(ws: &Workspace, reference: &str) -> Result<TaskKey, Box<dyn Error>> {
    ws.engine
        .find_task(reference)
        .map(|t| t.key.clone())
        .ok_or_else(|| format!("task not found: {}", reference).into())
}

fn require_project(ws: &Workspace, key: &str) -> CmdResult {
    if ws.engine.project(key).is_none() {
        return Err(format!("project not found: {}", key).into());
    }
    Ok(())
}

/// Print a mutation result. Outcomes that changed nothing because the
/// request was bad are errors; `Unchanged` is not.
fn report_mutation(subject: &str, outcome: MutationOutcome, json: bool) -> CmdResult {
    if json {
        let out = MutationJson {
            target: subject.to_string(),
            outcome,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if matches!(outcome, MutationOutcome::Applied | MutationOutcome::Unchanged) {
        println!("{}: {}", subject, outcome_text(outcome));
    }
    match outcome {
        MutationOutcome::Applied | MutationOutcome::Unchanged => Ok(()),
        MutationOutcome::NotFound => Err(format!("{}: not found in its document", subject).into()),
        MutationOutcome::InvalidDate => Err(format!("{}: invalid date", subject).into()),
    }
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_index(root: &Path, json: bool) -> CmdResult {
    let ws = open_workspace(root)?;
    let snapshot = ws.engine.snapshot();

    if json {
        let out = IndexJson {
            generation: snapshot.generation,
            projects: snapshot
                .projects
                .iter()
                .map(|p| project_to_json(&snapshot, p))
                .collect(),
            omissions: snapshot.omissions.len(),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for project in &snapshot.projects {
            println!("{}", format_project_line(project));
        }
        if !snapshot.omissions.is_empty() {
            println!(
                "{} record(s) omitted; run `tl check` for details",
                snapshot.omissions.len()
            );
        }
    }
    Ok(())
}

fn cmd_show(root: &Path, args: ShowArgs, json: bool) -> CmdResult {
    let ws = open_workspace(root)?;
    let task = ws
        .engine
        .find_task(&args.task)
        .ok_or_else(|| format!("task not found: {}", args.task))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&task_to_json(task))?);
    } else {
        for line in format_task_detail(task) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_tree(root: &Path, args: TreeArgs, json: bool) -> CmdResult {
    let ws = open_workspace(root)?;
    let snapshot = ws.engine.snapshot();
    let projects: Vec<_> = match &args.doc {
        Some(doc) => {
            let project = snapshot
                .project(doc)
                .ok_or_else(|| format!("project not found: {}", doc))?;
            vec![project]
        }
        None => snapshot.projects.iter().collect(),
    };

    if json {
        let trees: Vec<TreeJson> = projects.iter().map(|p| tree_to_json(&snapshot, p)).collect();
        println!("{}", serde_json::to_string_pretty(&trees)?);
        return Ok(());
    }

    for (i, project) in projects.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{}", format_project_line(project));
        for entry in &project.cascade {
            let Some(task) = snapshot.task(&entry.key) else {
                continue;
            };
            let mut line = format!(
                "{}{} {} {}",
                "  ".repeat(entry.depth + 1),
                status_marker(task.status),
                task.local_id,
                task.text
            );
            if let Some(rollup) = project.story_rollups.get(&entry.key) {
                line.push_str(&format!(
                    "  [{:.0}% of {} subtasks]",
                    rollup.percent, rollup.subtasks
                ));
            }
            if let Some(n) = project.epic_descendants.get(&entry.key) {
                line.push_str(&format!("  [{} subtasks]", n));
            }
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_timeline(root: &Path, args: TimelineArgs, json: bool) -> CmdResult {
    let ws = open_workspace(root)?;
    let snapshot = ws.engine.snapshot();

    let mut params = TimelineParams::from_config(&ws.config.timeline, today());
    if let Some(anchor) = &args.anchor {
        let anchor: Anchor = anchor.parse()?;
        params.anchor = anchor.resolve(today());
    }
    if let Some(zoom) = args.zoom {
        params.zoom = Zoom::new(zoom);
    }
    let filter = ViewFilter {
        show_epics: !args.hide_epics,
        show_stories: !args.hide_stories,
        show_done: !args.hide_done,
    };

    let layout = layout(&snapshot, &params, filter.predicate());
    let heat = heat_map(&layout);
    let routing = route_edges(&layout, snapshot.edges(), &ws.config.router);

    if json {
        let out = TimelineJson {
            layout: &layout,
            heat: &heat,
            routing: &routing,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let days = args.days.min(layout.horizon_days.max(1) as usize);
    for line in gantt::render(&layout, &heat, days, LABEL_WIDTH) {
        println!("{}", line);
    }
    println!();
    for c in &routing.connectors {
        let note = if c.fallback { " (no clear corridor)" } else { "" };
        println!(
            "{} -> {} {} at x={:.0}{}",
            c.source,
            c.destination,
            c.link.short(),
            c.corridor_x,
            note
        );
    }
    println!("{}", format_report(&routing.report));
    Ok(())
}

fn cmd_check(root: &Path, json: bool) -> CmdResult {
    let ws = open_workspace(root)?;
    let snapshot = ws.engine.snapshot();
    let recovery = read_recovery_entries(&ws.root);

    if json {
        let out = CheckJson {
            generation: snapshot.generation,
            omissions: &snapshot.omissions,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for omission in &snapshot.omissions {
            println!("{}", omission);
        }
        if !recovery.is_empty() {
            println!(
                "{} failed write(s) in {}; most recent: {} {}",
                recovery.len(),
                crate::io::recovery::recovery_log_path(&ws.root).display(),
                recovery[0].timestamp.format("%Y-%m-%d %H:%M"),
                recovery[0].description
            );
        }
    }

    if snapshot.omissions.is_empty() {
        if !json {
            println!("all records valid");
        }
        Ok(())
    } else {
        Err(format!("{} record(s) omitted", snapshot.omissions.len()).into())
    }
}

fn cmd_watch(root: &Path) -> CmdResult {
    let mut ws = open_workspace(root)?;
    let watcher = DocumentWatcher::start(&ws.root)?;

    let commits = Rc::new(Cell::new(0u64));
    let seen = Rc::clone(&commits);
    ws.engine.bus().subscribe(move |snapshot| {
        seen.set(seen.get() + 1);
        println!(
            "generation {}: {} projects, {} tasks, {} omitted",
            snapshot.generation,
            snapshot.projects.len(),
            snapshot.tasks.len(),
            snapshot.omissions.len()
        );
    });

    println!(
        "watching {} ({} projects)",
        ws.root.display(),
        ws.engine.snapshot().projects.len()
    );
    while let Some(signal) = watcher.wait(WATCH_SETTLE) {
        if let ChangeSignal::DocumentChanged(keys) = &signal
            && keys.iter().any(|k| k == CONFIG_FILE)
        {
            match config_io::load_config(&ws.root) {
                Ok(config) => {
                    *ws.engine.store_mut() = FsStore::new(&ws.root, &config.index);
                    ws.config = config;
                    info!("configuration reloaded");
                }
                Err(e) => warn!(error = %e, "keeping previous configuration"),
            }
        }
        match ws.engine.handle_signal(signal) {
            Ok(ScanOutcome::Stale { generation, .. }) => debug!(generation, "stale scan dropped"),
            Ok(ScanOutcome::Committed { .. }) => {}
            Err(e) => warn!(error = %e, "reindex failed"),
        }
    }
    debug!(commits = commits.get(), "watcher closed");
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_status(root: &Path, args: StatusArgs, json: bool) -> CmdResult {
    let mut ws = open_workspace(root)?;
    let status = TaskStatus::from_keyword(&args.status)
        .ok_or_else(|| format!("unknown status: {}", args.status))?;
    let key = resolve_task(&ws, &args.task)?;
    let outcome = mutate::move_task_to_status(&mut ws.engine, &key, status, today())?;
    report_mutation(key.as_str(), outcome, json)
}

fn parse_assignment(s: &str) -> Result<(String, String), Box<dyn Error>> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty property name in '{}'", s).into());
    }
    Ok((key.to_string(), value.trim().to_string()))
}

fn cmd_set(root: &Path, args: SetArgs, json: bool) -> CmdResult {
    let mut ws = open_workspace(root)?;
    let key = resolve_task(&ws, &args.task)?;
    let changes = TaskChanges {
        checkbox: None,
        set: args
            .assignments
            .iter()
            .map(|a| parse_assignment(a))
            .collect::<Result<_, _>>()?,
        remove: args.unset,
    };
    let outcome = mutate::update_task(&mut ws.engine, &key, &changes)?;
    report_mutation(key.as_str(), outcome, json)
}

fn cmd_move(root: &Path, args: MoveArgs, json: bool) -> CmdResult {
    let mut ws = open_workspace(root)?;
    let key = resolve_task(&ws, &args.task)?;
    let outcome = mutate::move_task(&mut ws.engine, &key, args.days)?;
    report_mutation(key.as_str(), outcome, json)
}

fn cmd_resize(root: &Path, args: ResizeArgs, json: bool) -> CmdResult {
    let mut ws = open_workspace(root)?;
    let key = resolve_task(&ws, &args.task)?;
    let outcome = mutate::shift_task_dates(&mut ws.engine, &key, args.start, args.due)?;
    report_mutation(key.as_str(), outcome, json)
}

fn cmd_move_project(root: &Path, args: MoveProjectArgs, json: bool) -> CmdResult {
    let mut ws = open_workspace(root)?;
    require_project(&ws, &args.doc)?;
    let outcome = mutate::shift_project_dates(&mut ws.engine, &args.doc, args.days, args.days)?;
    report_mutation(&args.doc, outcome, json)
}

fn cmd_resize_project(root: &Path, args: ResizeProjectArgs, json: bool) -> CmdResult {
    let mut ws = open_workspace(root)?;
    require_project(&ws, &args.doc)?;
    let outcome = mutate::shift_project_dates(&mut ws.engine, &args.doc, args.start, args.end)?;
    report_mutation(&args.doc, outcome, json)
}
