use cadence::clock::{Clock, SystemClock};
use cadence::domain::{CasOutcome, ItemStatus, SchedulableItem};
use cadence::id::generate_item_id;
use cadence::lifecycle::UserCommand;
use cadence::occurrence::Horizon;
use cadence::scheduler::{Scheduler, SchedulerEvent, TickOutcome};
use cadence::store::{ItemStore, SqliteStore};
use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

mod cli;
mod config;

use cli::Cli;
use cli::commands::{AddArgs, Commands};
use config::Config;

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cadence")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("cadence.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Trace)
        .parse_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// `--verbose` wins, then RUST_LOG, then the config's `log_level`
fn apply_log_level(cli: &Cli, config: &Config) {
    if cli.is_verbose() {
        log::set_max_level(log::LevelFilter::Debug);
    } else if std::env::var_os("RUST_LOG").is_none() {
        log::set_max_level(config.log_level_filter().unwrap_or(log::LevelFilter::Info));
    }
}

struct App {
    config: Config,
    store: Arc<dyn ItemStore>,
    clock: Arc<dyn Clock>,
}

impl App {
    fn open(config: Config) -> Result<Self> {
        let path = config.store.path.clone();
        let store = SqliteStore::open(&path).context(format!("Failed to open store at {}", path.display()))?;
        info!("Opened store at {}", path.display());
        Ok(Self {
            config,
            store: Arc::new(store),
            clock: Arc::new(SystemClock),
        })
    }

    fn scheduler(&self) -> Scheduler {
        Scheduler::new(self.store.clone(), self.clock.clone()).with_config(self.config.scheduler_config())
    }
}

async fn run_application(cli: &Cli, app: &App) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        None => handle_list_command(None, app).await,
        Some(Commands::Run { once }) => handle_run_command(*once, app).await,
        Some(Commands::Add(args)) => handle_add_command(args, app).await,
        Some(Commands::List { status }) => handle_list_command(status.as_deref(), app).await,
        Some(Commands::Occurrences { id, days, limit }) => handle_occurrences_command(id, *days, *limit, app).await,
        Some(Commands::Complete { id }) => handle_user_command(id, UserCommand::Complete, app).await,
        Some(Commands::Cancel { id }) => handle_user_command(id, UserCommand::Cancel, app).await,
        Some(Commands::Reopen { id }) => handle_user_command(id, UserCommand::Reopen, app).await,
    }
}

async fn handle_run_command(once: bool, app: &App) -> Result<()> {
    if once {
        info!("Running a single tick");
        match app.scheduler().tick_with_timeout().await? {
            TickOutcome::Completed(report) => {
                println!(
                    "{} scanned {}, transitioned {}, materialized {}, reminders {}, conflicts {}, failed {}",
                    "Tick:".green(),
                    report.scanned,
                    report.transitioned,
                    report.materialized,
                    report.reminders,
                    report.conflicts,
                    report.failed
                );
            }
            TickOutcome::Skipped => println!("{}", "Tick skipped".yellow()),
        }
        return Ok(());
    }

    let (tx, mut rx) = mpsc::channel(256);
    let scheduler = app.scheduler().with_events(tx);
    let cancel = CancellationToken::new();

    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, shutting down");
                cancel.cancel();
            }
        })
    };

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event);
        }
    });

    println!(
        "{} every {}s (Ctrl-C to stop)",
        "Scheduler running".cyan(),
        app.config.scheduler.tick_interval_secs
    );
    scheduler.run(cancel).await?;

    drop(scheduler);
    watcher.abort();
    printer.await.context("Event printer failed")?;
    Ok(())
}

fn print_event(event: &SchedulerEvent) {
    match event {
        SchedulerEvent::Transitioned { item_id, from, to, at } => {
            println!(
                "{} {} {} -> {}",
                at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
                item_id,
                from,
                colored_status(*to)
            );
        }
        SchedulerEvent::Materialized { item_id, occurrence, .. } => {
            println!("{} {} for {}", "Scheduled".green(), item_id, occurrence.format("%Y-%m-%d %H:%M"));
        }
        SchedulerEvent::ReminderDue(notice) => {
            println!(
                "{} {} at {} via {:?}",
                "Reminder:".magenta().bold(),
                notice.item_id,
                notice.fire_at.format("%Y-%m-%d %H:%M"),
                notice.channel
            );
        }
    }
}

async fn handle_add_command(args: &AddArgs, app: &App) -> Result<()> {
    let id = generate_item_id(args.kind(), app.clock.now());
    let item = args.to_item(id).context("Invalid item")?;
    app.store.insert(&item).await.context("Failed to save item")?;

    info!("Added {} {}", item.kind, item.id);
    println!("{} {} {}", "Added".green(), item.kind, item.id.bold());
    Ok(())
}

async fn handle_list_command(status: Option<&str>, app: &App) -> Result<()> {
    let filter = status
        .map(|s| ItemStatus::parse(s).ok_or_else(|| eyre!("Unknown status '{}'", s)))
        .transpose()?;
    let items = app.store.list(filter).await.context("Failed to list items")?;

    if items.is_empty() {
        println!("{}", "No items".dimmed());
        return Ok(());
    }
    for item in &items {
        print_item(item);
    }
    Ok(())
}

fn print_item(item: &SchedulableItem) {
    let when = match item.end_time {
        Some(end) => format!("{} - {}", item.anchor_time.format("%Y-%m-%d %H:%M"), end.format("%H:%M")),
        None => item.anchor_time.format("%Y-%m-%d %H:%M").to_string(),
    };
    let repeat = item
        .recurrence
        .as_ref()
        .map(|rule| format!(" [{} x{}]", rule.frequency(), rule.interval()))
        .unwrap_or_default();
    println!(
        "{:<48} {:<8} {:<22} {}  {}{}",
        item.id,
        item.kind.to_string(),
        colored_status(item.status),
        when,
        item.title,
        repeat.dimmed()
    );
}

fn colored_status(status: ItemStatus) -> ColoredString {
    match status {
        ItemStatus::Pending => status.as_str().yellow(),
        ItemStatus::InProgress => status.as_str().cyan(),
        ItemStatus::Completed => status.as_str().green(),
        ItemStatus::Cancelled => status.as_str().red(),
    }
}

async fn handle_occurrences_command(id: &str, days: Option<u32>, limit: usize, app: &App) -> Result<()> {
    let item = app
        .store
        .get(id)
        .await?
        .ok_or_else(|| eyre!("Item not found: {}", id))?;
    let Some(rule) = item.recurrence.as_ref() else {
        println!("{} does not repeat; next at {}", id, item.anchor_time.format("%Y-%m-%d %H:%M"));
        return Ok(());
    };

    let horizon = Horizon::next_days(app.clock.now(), days.unwrap_or(app.config.display.horizon_days));
    let occurrences = horizon.expand(rule, item.series_origin());
    if occurrences.is_empty() {
        println!("{}", "No occurrences in horizon".dimmed());
        return Ok(());
    }
    for occurrence in occurrences.iter().take(limit) {
        println!("{}", occurrence.format("%a %Y-%m-%d %H:%M"));
    }
    if occurrences.len() > limit {
        println!("{}", format!("... {} more", occurrences.len() - limit).dimmed());
    }
    Ok(())
}

async fn handle_user_command(id: &str, command: UserCommand, app: &App) -> Result<()> {
    info!("Applying {} to {}", command, id);
    let outcome = app
        .scheduler()
        .apply_command(id, command)
        .await
        .context(format!("Failed to {} {}", command, id))?;

    match outcome {
        CasOutcome::Applied => println!("{} {}", format!("{}:", command).green(), id),
        CasOutcome::Conflict { actual } => {
            println!("{} {} changed concurrently (now {})", "Not applied:".yellow(), id, actual)
        }
        CasOutcome::Missing => println!("{} {} no longer exists", "Not applied:".yellow(), id),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    apply_log_level(&cli, &config);

    info!("Starting with config from: {:?}", cli.config);

    let app = App::open(config)?;
    run_application(&cli, &app).await.context("Application failed")?;

    Ok(())
}
