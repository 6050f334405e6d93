use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration as StdDuration;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::cli::{AddArgs, Command, EditArgs, ExportArgs, ListArgs, SwapArgs, ThemeArgs, WatchArgs};
use crate::config::Config;
use crate::datetime::parse_due_date;
use crate::export;
use crate::filter;
use crate::render::Renderer;
use crate::session::Session;
use crate::task::{Task, TaskId};

const DEFAULT_WATCH_INTERVAL_SECS: usize = 60;

#[instrument(skip_all)]
pub fn dispatch(
    session: &mut Session,
    cfg: &Config,
    renderer: &mut Renderer,
    command: Command,
) -> anyhow::Result<()> {
    let now = Utc::now();
    debug!(?command, "dispatching command");

    match command {
        Command::Add(args) => cmd_add(session, args, now),
        Command::Edit(args) => cmd_edit(session, args, now),
        Command::Done(arg) => cmd_done(session, &arg.task, now),
        Command::Delete(arg) => cmd_delete(session, &arg.task, now),
        Command::Swap(args) => cmd_swap(session, args, now),
        Command::List(args) => cmd_list(session, cfg, renderer, args, now),
        Command::Show(arg) => cmd_show(session, renderer, &arg.task),
        Command::Undo => cmd_undo(session, now),
        Command::Redo => cmd_redo(session, now),
        Command::Theme(args) => cmd_theme(session, renderer, args),
        Command::Export(args) => cmd_export(session, args),
        Command::Watch(args) => cmd_watch(session, cfg, args),
        Command::Config => cmd_config(cfg),
    }
}

/// Accepts a 1-based list position or a task id.
pub fn resolve_task(session: &Session, raw: &str) -> anyhow::Result<TaskId> {
    let value: u64 = raw
        .trim()
        .parse()
        .map_err(|_| anyhow!("expected a list position or task id, got: {raw}"))?;

    let tasks = session.tasks();
    if value >= 1
        && let Some(task) = usize::try_from(value - 1).ok().and_then(|idx| tasks.get(idx))
    {
        return Ok(task.id);
    }

    let id = TaskId(value);
    if session.get(id).is_some() {
        return Ok(id);
    }
    Err(anyhow!("no task at position or with id {raw}"))
}

#[instrument(skip(session, args, now))]
fn cmd_add(session: &mut Session, args: AddArgs, now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command add");

    let text = args.text.join(" ");
    let due = match args.due.as_deref() {
        Some(raw) => parse_due_date(raw, now, session.timezone())?,
        None => None,
    };
    let task = session.add(&text, due, args.priority, now)?;

    println!("Created task {} ({}).", session.tasks().len(), task.id);
    Ok(())
}

#[instrument(skip(session, args, now))]
fn cmd_edit(session: &mut Session, args: EditArgs, now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command edit");

    let id = resolve_task(session, &args.task)?;
    let current = session
        .get(id)
        .cloned()
        .ok_or_else(|| anyhow!("task vanished: {id}"))?;

    let text = args.text.unwrap_or(current.text);
    let due = if args.clear_due {
        None
    } else if let Some(raw) = args.due.as_deref() {
        parse_due_date(raw, now, session.timezone())?
    } else {
        current.due_date
    };
    let priority = args.priority.unwrap_or(current.priority);

    session.update(id, &text, due, priority, now)?;
    println!("Modified task {id}.");
    Ok(())
}

#[instrument(skip(session, now))]
fn cmd_done(session: &mut Session, raw: &str, now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command done");

    let id = resolve_task(session, raw)?;
    let completed = session.toggle_completed(id, now)?;
    if completed {
        println!("Completed task {id}.");
    } else {
        println!("Reopened task {id}.");
    }
    Ok(())
}

#[instrument(skip(session, now))]
fn cmd_delete(session: &mut Session, raw: &str, now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command delete");

    let id = resolve_task(session, raw)?;
    let task = session.remove(id, now)?;
    println!("Deleted task {id} '{}'.", task.text);
    Ok(())
}

#[instrument(skip(session, now))]
fn cmd_swap(session: &mut Session, args: SwapArgs, now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command swap");

    let from = args
        .from
        .checked_sub(1)
        .ok_or_else(|| anyhow!("list positions start at 1"))?;
    let to = args
        .to
        .checked_sub(1)
        .ok_or_else(|| anyhow!("list positions start at 1"))?;
    session.reorder(from, to, now)?;
    println!("Swapped positions {} and {}.", args.from, args.to);
    Ok(())
}

#[instrument(skip(session, cfg, renderer, now))]
fn cmd_list(
    session: &mut Session,
    cfg: &Config,
    renderer: &mut Renderer,
    args: ListArgs,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let mode = match args.filter {
        Some(mode) => mode,
        None => cfg.default_filter()?,
    };
    session.set_filter(mode);

    let tasks = session.tasks();
    let rows: Vec<_> = filter::positions(tasks, mode)
        .into_iter()
        .map(|idx| (idx, &tasks[idx]))
        .collect();
    debug!(visible = rows.len(), total = tasks.len(), "rendering list");

    renderer.print_task_table(&rows, mode, tasks.len(), now, session.timezone())
}

#[instrument(skip(session, renderer))]
fn cmd_show(session: &Session, renderer: &mut Renderer, raw: &str) -> anyhow::Result<()> {
    let id = resolve_task(session, raw)?;
    let task = session
        .get(id)
        .ok_or_else(|| anyhow!("task vanished: {id}"))?;
    renderer.print_task_info(task)
}

#[instrument(skip(session, now))]
fn cmd_undo(session: &mut Session, now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command undo");
    if session.undo(now) {
        println!("Undid last change.");
    } else {
        println!("Nothing to undo.");
    }
    Ok(())
}

#[instrument(skip(session, now))]
fn cmd_redo(session: &mut Session, now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command redo");
    if session.redo(now) {
        println!("Redid last undone change.");
    } else {
        println!("Nothing to redo.");
    }
    Ok(())
}

#[instrument(skip(session, renderer))]
fn cmd_theme(session: &mut Session, renderer: &mut Renderer, args: ThemeArgs) -> anyhow::Result<()> {
    match args.theme {
        Some(theme) => {
            session.set_theme(theme);
            renderer.set_theme(theme);
            println!("Theme set to {theme}.");
        }
        None => println!("{}", session.theme()),
    }
    Ok(())
}

#[instrument(skip(session))]
fn cmd_export(session: &Session, args: ExportArgs) -> anyhow::Result<()> {
    let csv = export::to_csv(session.tasks());
    match args.output.as_deref() {
        Some(path) => {
            write_export(path, &csv)?;
            println!("Exported {} task(s) to {}.", session.tasks().len(), path.display());
        }
        None => {
            let mut out = io::stdout().lock();
            out.write_all(csv.as_bytes())?;
            out.flush()?;
        }
    }
    Ok(())
}

fn write_export(path: &Path, csv: &str) -> anyhow::Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }
    fs::write(path, csv).with_context(|| format!("failed writing {}", path.display()))
}

/// What one pass of the watch loop delivered and when it should wake next.
#[derive(Debug, Clone, Default)]
pub struct WatchRound {
    pub fired: Vec<Task>,
    pub next: Option<DateTime<Utc>>,
}

/// Re-reads state so edits made by other invocations reschedule or cancel
/// pending alerts, then delivers every timer due at `now`.
pub fn watch_round(session: &mut Session, now: DateTime<Utc>) -> WatchRound {
    session.reload(now);
    let fired = session.fire_due_notifications(now);
    WatchRound {
        fired,
        next: session.scheduler().next_fire_at(),
    }
}

/// Sleeps until the next deadline timer, delivers it, and repeats until no
/// timers remain. With `--once` it stops after the first round that alerts.
#[instrument(skip(session, cfg))]
fn cmd_watch(session: &mut Session, cfg: &Config, args: WatchArgs) -> anyhow::Result<()> {
    if !session.alerts_allowed() {
        println!("Deadline alerts are disabled (notify.enabled is off).");
        return Ok(());
    }
    let interval_secs = cfg
        .get_usize("watch.interval")?
        .unwrap_or(DEFAULT_WATCH_INTERVAL_SECS)
        .max(1);

    loop {
        let now = Utc::now();
        let round = watch_round(session, now);
        for task in &round.fired {
            println!("Alerted: {} ({})", task.text, task.id);
        }
        if args.once && !round.fired.is_empty() {
            return Ok(());
        }

        let Some(next) = round.next else {
            println!("No deadline alerts pending.");
            return Ok(());
        };
        let wait = sleep_duration(now, next, interval_secs);
        debug!(%next, wait_secs = wait.as_secs(), "waiting for next deadline");
        std::thread::sleep(wait);
    }
}

fn sleep_duration(now: DateTime<Utc>, next: DateTime<Utc>, interval_secs: usize) -> StdDuration {
    let cap = StdDuration::from_secs(interval_secs as u64);
    (next - now).to_std().map(|d| d.min(cap)).unwrap_or(StdDuration::ZERO)
}

fn cmd_config(cfg: &Config) -> anyhow::Result<()> {
    let mut entries: Vec<_> = cfg.iter().collect();
    entries.sort();
    for (key, value) in entries {
        println!("{key}={value}");
    }
    if let Some(file) = &cfg.source {
        println!("# loaded {}", file.display());
    }
    Ok(())
}
