use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueHint};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use tasklist::activity::{MONTH_LABELS, MonthTally};
use tasklist::config::Config;
use tasklist::model::local_now;
use tasklist::reminder::Scheduler;
use tasklist::storage::Snapshot;
use tasklist::view::{SearchField, SortKey, TaskSummary};
use tasklist::{Category, TaskDraft, TaskId, TaskList};

#[derive(Parser, Debug)]
#[command(author, version, about = "A to-do list with priorities, completion tracking and progress history")]
struct Cli {
    /// Main verb. If omitted, `list` is default action.
    #[command(subcommand)]
    verb: Option<Verb>,

    /// Durable snapshot to load on start and save on exit.
    #[arg(short, long, value_hint = ValueHint::FilePath, env = "TASKLIST_SNAPSHOT")]
    snapshot: Option<PathBuf>,

    /// Config file (defaults to the platform config dir).
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Verb {
    /// Add a task just above the done tasks.
    Add {
        /// Empty means "Untitled".
        #[arg(default_value = "")]
        name: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// Deadline as YYYY/M/D/H:MM.
        #[arg(long, default_value = "")]
        deadline: String,

        #[arg(short = 'c', long = "category", value_delimiter = ',')]
        categories: Vec<Category>,
    },
    /// Change a task's name, description, deadline or categories.
    Edit {
        id: String,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(long)]
        deadline: Option<String>,

        #[arg(short = 'c', long = "category", value_delimiter = ',')]
        categories: Option<Vec<Category>>,
    },
    List {
        #[arg(short, long)]
        search: Option<String>,

        #[arg(long, default_value = "name")]
        field: SearchField,

        #[arg(long, default_value = "default")]
        sort: SortKey,
    },
    /// Mark a task done, or not done again.
    Done { id: String },
    /// Prioritize a task, or drop its priority.
    Priority { id: String },
    Delete { id: String },
    /// Reverse the list order.
    Flip,
    /// Show actions per month.
    Progress,
    /// Set a reminder, formatted YYYY-MM-DD HH:MM.
    Remind { id: String, at: String },
    /// Wait for reminders and print them as they come due.
    Watch {
        /// Repeat each reminder once more after the snooze delay.
        #[arg(long)]
        snooze: bool,

        #[arg(long, default_value_t = 1)]
        interval_secs: u64,
    },
    /// Export to a JSON file.
    Save {
        #[arg(value_hint = ValueHint::FilePath)]
        path: PathBuf,
    },
    /// Replace everything with the contents of a JSON file.
    Open {
        #[arg(value_hint = ValueHint::FilePath)]
        path: PathBuf,
    },
    /// Delete every task and the saved snapshot.
    Clear,
}

fn main() -> Result<()> {
    // Tracing is opt-in via RUST_LOG.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| EnvFilter::try_new(raw.trim()).ok())
        .unwrap_or_else(|| EnvFilter::new("off"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Loading config")?;
    if let Some(path) = cli.snapshot {
        config.snapshot_path = path;
    }

    let snapshot = Snapshot::new(&config.snapshot_path);
    let mut list = tasklist::open_task_list(&snapshot, &config).context("Loading saved tasks")?;

    let verb = cli.verb.unwrap_or(Verb::List {
        search: None,
        field: SearchField::Name,
        sort: SortKey::Default,
    });
    let dirty = run(verb, &mut list, &snapshot, &config)?;
    if dirty {
        snapshot.save(list.state()).context("Saving tasks")?;
    }
    Ok(())
}

/// Runs one verb. Returns whether the snapshot needs saving.
fn run(verb: Verb, list: &mut TaskList, snapshot: &Snapshot, config: &Config) -> Result<bool> {
    match verb {
        Verb::Add {
            name,
            description,
            deadline,
            categories,
        } => {
            let draft = TaskDraft::builder()
                .name(name)
                .description(description)
                .deadline(deadline)
                .categories(categories)
                .build();
            let task = list.add(draft)?;
            println!("added {} {}", task.id.short(), task.name);
            Ok(true)
        }
        Verb::Edit {
            id,
            name,
            description,
            deadline,
            categories,
        } => {
            let id = resolve(list, &id)?;
            let Some(current) = list.get(id) else {
                return Ok(false);
            };
            let draft = TaskDraft::builder()
                .name(name.unwrap_or_else(|| current.name.clone()))
                .description(description.unwrap_or_else(|| current.description.clone()))
                .deadline(deadline.unwrap_or_else(|| current.deadline.clone()))
                .categories(categories.unwrap_or_else(|| current.categories.iter().copied().collect()))
                .build();
            Ok(list.edit(id, draft)?)
        }
        Verb::List {
            search,
            field,
            sort,
        } => {
            if let Some(query) = search {
                list.filter(&query, field);
            }
            list.sort(sort);
            print_list(list, config.description_width);
            Ok(false)
        }
        Verb::Done { id } => {
            let id = resolve(list, &id)?;
            match list.toggle_done(id)? {
                Some(true) => println!("marked done"),
                Some(false) => println!("marked not done"),
                None => return Ok(false),
            }
            Ok(true)
        }
        Verb::Priority { id } => {
            let id = resolve(list, &id)?;
            match list.toggle_priority(id)? {
                Some(true) => println!("prioritized"),
                Some(false) => println!("de-prioritized"),
                None => return Ok(false),
            }
            Ok(true)
        }
        Verb::Delete { id } => {
            let id = resolve(list, &id)?;
            Ok(list.remove(id).is_some())
        }
        Verb::Flip => {
            list.reverse();
            Ok(true)
        }
        Verb::Progress => {
            print_progress(&list.activity().monthly_summary());
            Ok(false)
        }
        Verb::Remind { id, at } => {
            let id = resolve(list, &id)?;
            Ok(list.set_reminder(id, &at)?.is_some())
        }
        Verb::Watch {
            snooze,
            interval_secs,
        } => {
            watch(snapshot, config, snooze, interval_secs)?;
            Ok(false)
        }
        Verb::Save { path } => {
            tasklist::save_exchange(list, &path)
                .with_context(|| format!("Saving to {}", path.display()))?;
            println!("Your to-do list was successfully saved");
            Ok(false)
        }
        Verb::Open { path } => {
            tasklist::open_exchange(list, snapshot, &path)
                .with_context(|| format!("Opening {}", path.display()))?;
            println!("Your to-do list was opened successfully");
            Ok(false)
        }
        Verb::Clear => {
            tasklist::clear_all(list, snapshot).context("Clearing tasks")?;
            Ok(false)
        }
    }
}

fn resolve(list: &TaskList, prefix: &str) -> Result<TaskId> {
    list.resolve(prefix)?
        .with_context(|| format!("no task matches '{prefix}'"))
}

fn print_list(list: &TaskList, width: usize) {
    println!("ID       | P | D | Task");
    println!("---------+---+---+----------------------------------------------");
    for task in list.visible() {
        let summary = TaskSummary::new(task, width);
        println!(
            "{:<8} | {} | {} |{}",
            task.id.short(),
            if summary.priority { '*' } else { ' ' },
            if summary.done { 'x' } else { ' ' },
            summary
        );
    }
}

fn print_progress(months: &[MonthTally; 12]) {
    println!("To-Do List Progress Tracker  (+ add, - delete, x done, o undone)");
    for (label, tally) in MONTH_LABELS.iter().zip(months) {
        let bar = format!(
            "{}{}{}{}",
            "+".repeat(tally.add as usize),
            "-".repeat(tally.delete as usize),
            "x".repeat(tally.done as usize),
            "o".repeat(tally.undone as usize),
        );
        println!("{label} | {bar:<40} {}", tally.total());
    }
}

/// Polls the snapshot for reminders until none are left.
fn watch(snapshot: &Snapshot, config: &Config, snooze: bool, interval_secs: u64) -> Result<()> {
    let mut scheduler = Scheduler::new(config.snooze());
    loop {
        let now = local_now();
        let list = tasklist::open_task_list(snapshot, config)?;
        scheduler.sync(&list, now);

        for notification in scheduler.poll(now) {
            println!("{notification}");
            if snooze && !notification.snoozed {
                scheduler.snooze(&notification, now);
            }
        }

        if scheduler.is_empty() {
            println!("no reminders pending");
            return Ok(());
        }
        thread::sleep(Duration::from_secs(interval_secs.max(1)));
    }
}
