use anyhow::{Context, anyhow, bail};
use chrono::{DateTime, Datelike, Utc};
use tracing::{info, instrument, warn};

use crate::cli::Command;
use crate::config::Config;
use crate::datastore::TaskStore;
use crate::datetime::{parse_due_date, parse_month_name, to_local_date};
use crate::flows::{add_task, assign_task};
use crate::kv::KeyValueStore;
use crate::notify::{HttpDispatcher, Invite};
use crate::progress::aggregate;
use crate::render::Renderer;
use crate::task::{Color, Task, TaskDraft, TaskId};
use crate::views::ViewProjector;

#[instrument(skip_all)]
pub fn dispatch<S: KeyValueStore>(
    store: &mut TaskStore<S>,
    cfg: &Config,
    renderer: &mut Renderer,
    command: Option<Command>,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let command = command.unwrap_or(Command::Upcoming { limit: None });
    info!(command = ?command, "dispatching command");

    match command {
        Command::Add {
            title,
            due,
            assign,
            color,
            no_invite,
        } => cmd_add(store, cfg, title.join(" "), &due, assign, color, no_invite, now),
        Command::Done { id } => cmd_done(store, &id, now),
        Command::Delete { id } => cmd_delete(store, &id),
        Command::Show { id } => cmd_show(store, renderer, &id, now),
        Command::Upcoming { limit } => {
            let limit = match limit {
                Some(limit) => limit,
                None => cfg.upcoming_limit()?,
            };
            let tasks = store.load_or_empty();
            let view = ViewProjector::new(&tasks, now);
            renderer.print_task_table("Upcoming tasks", &view.upcoming(limit))
        }
        Command::Pending => {
            let tasks = store.load_or_empty();
            let view = ViewProjector::new(&tasks, now);
            renderer.print_task_table("Pending tasks", &view.pending())
        }
        Command::Recent { limit } => {
            let limit = match limit {
                Some(limit) => limit,
                None => cfg.recent_limit()?,
            };
            let tasks = store.load_or_empty();
            let view = ViewProjector::new(&tasks, now);
            renderer.print_task_table("Completed", &view.recent_completed(limit))
        }
        Command::Month { month, year } => {
            let (month, year) = resolve_month(month.as_deref(), year, now)?;
            let tasks = store.load_or_empty();
            let view = ViewProjector::new(&tasks, now);
            renderer.print_task_table("Tasks due this month", &view.due_in_month(month, year)?)?;
            println!();
            renderer.print_task_table("Upcoming tasks", &view.due_after_month(month, year)?)
        }
        Command::Progress { month, year, dense } => {
            let (month, year) = resolve_month(month.as_deref(), year, now)?;
            let tasks = store.load_or_empty();
            let progress = aggregate(&tasks, month, year)?;
            renderer.print_progress(&progress, dense)
        }
        Command::Invite {
            to,
            task,
            description,
            from,
        } => cmd_invite(cfg, to, task, description, from),
        Command::Config => {
            let mut entries: Vec<_> = cfg.iter().collect();
            entries.sort();
            for (k, v) in entries {
                println!("{k} = {v}");
            }
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
#[instrument(skip(store, cfg, now))]
fn cmd_add<S: KeyValueStore>(
    store: &mut TaskStore<S>,
    cfg: &Config,
    title: String,
    due: &str,
    assign: Option<String>,
    color: Option<String>,
    no_invite: bool,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let due_date = parse_due_date(due, now)?;
    let color = color.map(|c| c.parse::<Color>()).transpose()?;
    let draft = TaskDraft {
        title,
        due_date: Some(due_date),
        assigned_email: assign,
        color,
    };

    if no_invite || draft.assigned_email.as_deref().is_none_or(|e| e.trim().is_empty()) {
        let task = store.create(draft)?;
        println!("Created task {}.", task.id());
        return Ok(());
    }

    // A broken notification setup must not cost the user the task.
    let dispatcher = match http_dispatcher(cfg) {
        Ok(dispatcher) => dispatcher,
        Err(err) => {
            let task = store.create(draft)?;
            warn!(id = %task.id(), error = %format!("{err:#}"), "invite skipped");
            println!("Created task {}.", task.id());
            eprintln!("warning: task saved, but the invite could not be sent: {err:#}");
            return Ok(());
        }
    };
    let outcome = add_task(store, &dispatcher, draft, &sender_name(cfg, None))?;
    println!("Created task {}.", outcome.task.id());
    match &outcome.invite {
        Some(Ok(())) => println!("Invite sent to {}.", outcome.task.assigned_email().unwrap_or_default()),
        Some(Err(err)) => eprintln!("warning: task saved, but the invite failed: {err}"),
        None => {}
    }
    Ok(())
}

#[instrument(skip(store, now))]
fn cmd_done<S: KeyValueStore>(store: &mut TaskStore<S>, id: &str, now: DateTime<Utc>) -> anyhow::Result<()> {
    let tasks = store.load()?;
    let id = resolve_id(&tasks, id)?;
    let task = store.complete_at(&id, now)?;
    println!("Completed task {} ({}).", task.id(), task.title());
    Ok(())
}

#[instrument(skip(store))]
fn cmd_delete<S: KeyValueStore>(store: &mut TaskStore<S>, id: &str) -> anyhow::Result<()> {
    let tasks = store.load()?;
    let id = resolve_id(&tasks, id)?;
    store.delete(&id)?;
    println!("Deleted task {id}.");
    Ok(())
}

#[instrument(skip(store, renderer, now))]
fn cmd_show<S: KeyValueStore>(
    store: &mut TaskStore<S>,
    renderer: &mut Renderer,
    id: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let tasks = store.load_or_empty();
    let id = resolve_id(&tasks, id)?;
    let view = ViewProjector::new(&tasks, now);
    renderer.print_task_info(&view.by_id(&id)?)
}

#[instrument(skip(cfg, description))]
fn cmd_invite(
    cfg: &Config,
    to: String,
    task: String,
    description: String,
    from: Option<String>,
) -> anyhow::Result<()> {
    let dispatcher = http_dispatcher(cfg)?;
    let invite = Invite {
        to,
        from: sender_name(cfg, from),
        task_name: task,
        description,
    };
    assign_task(&dispatcher, &invite).context("failed to send invite")?;
    println!("Invite sent to {}.", invite.to);
    Ok(())
}

fn http_dispatcher(cfg: &Config) -> anyhow::Result<HttpDispatcher> {
    let endpoint = cfg
        .get("notify.endpoint")
        .ok_or_else(|| anyhow!("notify.endpoint is not configured"))?;
    HttpDispatcher::new(&endpoint, cfg.notify_timeout()?)
        .with_context(|| format!("failed to set up notification client for {endpoint}"))
}

fn sender_name(cfg: &Config, explicit: Option<String>) -> String {
    explicit
        .or_else(|| cfg.get("notify.sender"))
        .or_else(|| std::env::var("USER").ok())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "deadlinez".to_string())
}

/// Resolves a full id or a unique id prefix against the collection.
pub fn resolve_id(tasks: &[Task], raw: &str) -> anyhow::Result<TaskId> {
    let needle = raw.trim();
    if needle.is_empty() {
        bail!("task id must not be empty");
    }
    if let Some(task) = tasks.iter().find(|t| t.id().as_str() == needle) {
        return Ok(task.id().clone());
    }

    let matches: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.id().as_str().starts_with(needle))
        .collect();
    match matches.as_slice() {
        [only] => Ok(only.id().clone()),
        [] => Ok(TaskId::from(needle)),
        many => {
            warn!(prefix = needle, count = many.len(), "ambiguous id prefix");
            Err(anyhow!("id prefix {needle} matches {} tasks", many.len()))
        }
    }
}

fn resolve_month(month: Option<&str>, year: Option<i32>, now: DateTime<Utc>) -> anyhow::Result<(u32, i32)> {
    let today = to_local_date(now);
    let month = match month {
        None => today.month(),
        Some(raw) => match raw.trim().parse::<u32>() {
            Ok(n) => n,
            Err(_) => parse_month_name(&raw.trim().to_ascii_lowercase())
                .ok_or_else(|| anyhow!("unrecognized month: {raw}"))?,
        },
    };
    Ok((month, year.unwrap_or(today.year())))
}
