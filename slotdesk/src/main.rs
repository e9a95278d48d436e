//! SlotDesk console
//!
//! Line-oriented front end for the desk. Every line typed counts as operator
//! activity for the inactivity guard.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin slotdesk -- --data-dir ./slotdesk-data
//! ```

use anyhow::Context;
use clap::Parser;
use futures::future::BoxFuture;
use slotdesk::model::AppState;
use slotdesk::view::{self, SlotIntent};
use slotdesk::{
    Desk, DeskConfig, DeskError, DeskOptions, FileBlobStore, LoadOutcome, MessageDispatcher,
    MessageIntent, SessionAction, WaiterId,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "\
Commands (slot and queue numbers start at 1):
  status                        slots, waiting list and today's numbers
  history                       every visit, newest first
  admit <slot> <name> [memo]    seat a participant
  next <slot> [memo]            seat the first waiter
  walkin <slot> <name> <phone>  seat a walk-in without queueing
  release <slot>                end a visit
  resize <count>                change the number of slots (1-50)
  wait <name> <phone>           add to the waiting list
  call <pos> | remind <pos>     message a waiter
  drop <pos>                    remove a waiter
  report [dir] | backup [dir]   write CSV report or JSON backup
  restore <file>                load a JSON backup
  reset                         wipe everything
  continue | reset-now          answer the inactivity warning
  quit";

#[derive(Debug, Parser)]
#[command(name = "slotdesk")]
#[command(about = "Slot allocation and waiting-list desk")]
struct Args {
    /// Directory holding the persisted state (overrides `SLOTDESK_DATA_DIR`)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Shorten the inactivity timeout, in seconds
    #[arg(long)]
    inactivity_secs: Option<u64>,
}

/// Prints message intents so the operator can send them by hand
struct ConsoleDispatcher;

impl MessageDispatcher for ConsoleDispatcher {
    fn dispatch(&self, intent: MessageIntent) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            println!("\n[message to {} / {}]", intent.recipient, intent.phone_number);
            println!("{}", intent.body);
            println!("{}\n", intent.link);
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slotdesk=info,slotdesk_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = DeskConfig::from_env().context("invalid configuration")?;
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(secs) = args.inactivity_secs {
        anyhow::ensure!(
            secs > config.timeouts.warning_window.as_secs(),
            "inactivity timeout must exceed the {}s warning window",
            config.timeouts.warning_window.as_secs()
        );
        config.timeouts.inactivity_timeout = Duration::from_secs(secs);
    }
    tracing::info!(data_dir = %config.data_dir.display(), "Configuration loaded");

    let blobs = FileBlobStore::open(&config.data_dir).context("cannot open data directory")?;
    let desk = Desk::open(
        Arc::new(blobs),
        DeskOptions::from_config(&config, Arc::new(ConsoleDispatcher)),
    )?;

    if let LoadOutcome::Discarded { reason } = desk.load_outcome() {
        eprintln!("Saved data could not be read and was reset: {reason}");
    }

    spawn_session_watcher(&desk);
    desk.start_session().await?;

    println!("SlotDesk ready. Type 'help' for commands.");
    print_status(&desk).await;

    let report_dir = config.data_dir.clone();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        desk.activity().await?;

        match run_command(&desk, line, &report_dir).await {
            Ok(true) => {},
            Ok(false) => break,
            Err(error) => eprintln!("{error:#}"),
        }
    }

    println!("Goodbye!");
    desk.shutdown(Duration::from_secs(5)).await?;
    Ok(())
}

/// Show the inactivity warning and the forced reset as they happen
fn spawn_session_watcher(desk: &Desk) {
    let mut actions = desk.session_store().subscribe_actions();
    let desk = desk.clone();
    tokio::spawn(async move {
        let mut expirations = 0;
        while let Ok(action) = actions.recv().await {
            match action {
                SessionAction::WarningDue { .. } => {
                    if let Some(remaining) = desk.warning_remaining().await {
                        println!(
                            "\nNo activity for a while. The desk resets in {}. \
                             Type 'continue' to keep working or 'reset-now'.",
                            view::countdown_text(remaining)
                        );
                    }
                },
                SessionAction::CountdownElapsed { .. } | SessionAction::ResetNow => {
                    let count = desk.session_state().await.expirations;
                    if count > expirations {
                        expirations = count;
                        if matches!(action, SessionAction::CountdownElapsed { .. }) {
                            println!("\nSession expired. All data has been reset.");
                        }
                    }
                },
                _ => {},
            }
        }
    });
}

async fn run_command(desk: &Desk, line: &str, report_dir: &std::path::Path) -> anyhow::Result<bool> {
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default();
    let rest: Vec<&str> = words.collect();

    match (command, rest.as_slice()) {
        ("quit" | "exit", _) => return Ok(false),
        ("help", _) => println!("{HELP}"),
        ("status", _) => print_status(desk).await,
        ("history", _) => print_history(&desk.snapshot().await),

        ("admit", [slot, name, memo @ ..]) => {
            let memo = memo.join(" ");
            let memo = (!memo.is_empty()).then_some(memo.as_str());
            show_outcome(desk.admit(slot_id(slot)?, name, memo).await)?;
        },
        ("next", [slot, memo @ ..]) => {
            let memo = memo.join(" ");
            let memo = (!memo.is_empty()).then_some(memo.as_str());
            show_outcome(desk.admit_next_waiter(slot_id(slot)?, memo).await)?;
        },
        ("walkin", [slot, name, phone]) => {
            show_outcome(desk.direct_admit(name, phone, slot_id(slot)?).await)?;
        },
        ("release", [slot]) => show_outcome(desk.release(slot_id(slot)?).await)?,
        ("resize", [count]) => show_outcome(desk.resize(count.parse()?).await)?,
        ("wait", [name, phone]) => show_outcome(desk.enqueue_waiter(name, phone).await)?,
        ("call", [pos]) => show_outcome(desk.notify_waiter(&waiter_at(desk, pos).await?).await)?,
        ("remind", [pos]) => show_outcome(desk.remind_waiter(&waiter_at(desk, pos).await?).await)?,
        ("drop", [pos]) => show_outcome(desk.dequeue_waiter(&waiter_at(desk, pos).await?).await)?,
        ("reset", _) => show_outcome(desk.force_reset().await)?,

        ("report", dir) => {
            let dir = dir.first().map_or_else(|| report_dir.to_path_buf(), |d| PathBuf::from(*d));
            println!("Report written to {}", desk.write_report(&dir).await?.display());
        },
        ("backup", dir) => {
            let dir = dir.first().map_or_else(|| report_dir.to_path_buf(), |d| PathBuf::from(*d));
            println!("Backup written to {}", desk.write_backup(&dir).await?.display());
        },
        ("restore", [file]) => {
            show_outcome(desk.restore_from_file(std::path::Path::new(file)).await)?;
            println!("Backup restored.");
        },

        ("continue", _) => desk.continue_session().await?,
        ("reset-now", _) => {
            if desk.reset_now().await? {
                println!("Desk reset.");
            } else {
                println!("No warning is showing. Use 'reset' to wipe the desk.");
            }
        },

        _ => println!("Unrecognized command. Type 'help'."),
    }

    Ok(true)
}

fn slot_id(word: &str) -> anyhow::Result<usize> {
    let number: usize = word.parse().context("slot must be a number")?;
    number
        .checked_sub(1)
        .context("slot numbers start at 1")
}

async fn waiter_at(desk: &Desk, word: &str) -> anyhow::Result<WaiterId> {
    let position: usize = word.parse().context("queue position must be a number")?;
    let state = desk.snapshot().await;
    position
        .checked_sub(1)
        .and_then(|index| state.waiting_list.get(index))
        .map(|w| w.id.clone())
        .with_context(|| format!("nobody at queue position {position}"))
}

/// Print the outcome of an operation; rejections are shown, not fatal
fn show_outcome(result: Result<slotdesk::Outcome, DeskError>) -> anyhow::Result<()> {
    match result {
        Ok(outcome) => {
            if let Some(warning) = outcome.persist_warning {
                eprintln!("Warning: the change was applied but could not be saved ({warning})");
            }
            Ok(())
        },
        Err(DeskError::Rejected(rejection)) => {
            println!("Not done: {rejection}");
            Ok(())
        },
        Err(other) => Err(other.into()),
    }
}

async fn print_status(desk: &Desk) {
    let state = desk.snapshot().await;
    let stats = desk.stats().await;
    let now = chrono::Utc::now();
    let has_waiters = !state.waiting_list.is_empty();

    println!(
        "\nTotal {} | In progress {} | Completed today {}",
        stats.total_participants, stats.currently_in, stats.completed_today
    );
    for slot in &state.slots {
        let line = match view::slot_intent(slot, has_waiters) {
            SlotIntent::EndExperience => format!(
                "{} {}",
                slot.participant_name.as_deref().unwrap_or_default(),
                slot.entry_time
                    .and_then(|entry| view::elapsed_since(entry, now))
                    .unwrap_or_default()
            ),
            SlotIntent::AdmitWaiter => "free (waiter ready)".to_string(),
            SlotIntent::StartExperience => "free".to_string(),
        };
        println!("  [{:>2}] {line}", slot.number());
    }

    if has_waiters {
        println!("Waiting:");
        for (index, waiter) in state.waiting_list.iter().enumerate() {
            let called = waiter
                .notified_at
                .and_then(|at| view::called_elapsed(at, now))
                .map(|t| format!(" (called {t} ago)"))
                .unwrap_or_default();
            println!("  {}. {} {}{called}", index + 1, waiter.name, waiter.phone_number);
        }
    }
    println!();
}

fn print_history(state: &AppState) {
    for record in view::history_by_entry(state) {
        let status = if record.is_open() { "in progress" } else { "done" };
        println!(
            "  #{:<2} {:<12} {} {}",
            record.slot_number,
            record.participant_name,
            record.entry_time.format("%H:%M:%S"),
            status
        );
    }
}
