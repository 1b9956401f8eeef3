use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use clap::{ArgAction, Args, Parser, Subcommand};
use log::{info, warn};
use pet_nudge::category::ReminderCategory;
use pet_nudge::character::{Glyph, PetCharacter};
use pet_nudge::classifier::{Classification, classify, next_fire_date};
use pet_nudge::clock::SystemClock;
use pet_nudge::config::{Preferences, ensure_sample_preferences};
use pet_nudge::engine::{EngineConfig, EngineEvent, SchedulerEngine};
use pet_nudge::indicator::{VisualStateMachine, spawn_indicator_driver};
use pet_nudge::notification::{LogNotifier, NotificationDispatcher, default_dispatcher};
use pet_nudge::paths::{default_preferences_path, default_reminders_path};
use pet_nudge::reminder::{NewReminder, Reminder, ReminderId};
use pet_nudge::store::FileReminderStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Parser)]
#[command(name = "pet-nudge")]
#[command(about = "Recurring reminders with a menu bar pet that nudges you")]
struct Cli {
    #[command(flatten)]
    files: FileArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args, Clone)]
struct FileArgs {
    /// Reminders file (JSON).
    #[arg(long, global = true)]
    reminders: Option<PathBuf>,

    /// Preferences file (TOML).
    #[arg(long, global = true)]
    preferences: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the scheduler in the foreground until Ctrl-C.
    Run(RunArgs),
    /// Evaluate all reminders once, right now.
    Check,
    List,
    Add(AddArgs),
    Remove {
        id: String,
    },
    Toggle {
        id: String,
    },
    Snooze {
        id: String,

        #[arg(long = "for", value_parser = parse_duration)]
        duration: Option<Duration>,
    },
    Categories,
    Characters,
}

#[derive(Debug, Args, Clone)]
struct RunArgs {
    /// Override the poll interval from preferences.
    #[arg(long, value_parser = parse_duration)]
    every: Option<Duration>,

    /// Log notifications instead of posting them.
    #[arg(long, action = ArgAction::SetTrue)]
    log_notifications: bool,
}

#[derive(Debug, Args, Clone)]
struct AddArgs {
    category: ReminderCategory,

    /// Title for custom reminders.
    #[arg(long)]
    title: Option<String>,

    /// Interval in minutes (category default when omitted).
    #[arg(long, allow_negative_numbers = true)]
    every: Option<i64>,

    /// First fire time, RFC 3339 or local "YYYY-MM-DD HH:MM".
    #[arg(long, value_parser = parse_fire_date)]
    at: Option<DateTime<Utc>>,

    #[arg(long, action = ArgAction::SetTrue)]
    disabled: bool,
}

fn parse_duration(value: &str) -> std::result::Result<Duration, String> {
    humantime::parse_duration(value).map_err(|e| e.to_string())
}

fn parse_fire_date(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M")
        .map_err(|e| format!("expected RFC 3339 or \"YYYY-MM-DD HH:MM\": {e}"))?;
    Local
        .from_local_datetime(&naive)
        .single()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| format!("{value} is ambiguous or skipped in the local time zone"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let preferences_path = cli
        .files
        .preferences
        .clone()
        .unwrap_or_else(default_preferences_path);
    let preferences = Preferences::load(&preferences_path)?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&preferences.log_level))
        .init();

    let reminders_path = cli.files.reminders.clone().unwrap_or_else(default_reminders_path);

    match cli.command {
        Commands::Run(args) => {
            if let Err(err) = ensure_sample_preferences(&preferences_path) {
                warn!("could not write sample preferences: {err:#}");
            }
            run_scheduler(&preferences, reminders_path, args).await
        }
        Commands::Check => {
            let (engine, mut events) =
                build_engine(&preferences, reminders_path, default_dispatcher(), None)?;
            match engine.process_tick() {
                Some(outcome) => {
                    for fire in &outcome.fired {
                        println!("fired: {}", describe(&fire.reminder));
                    }
                    if outcome.fired.is_empty() {
                        println!(
                            "nothing due{}",
                            if outcome.any_approaching {
                                " (something is approaching)"
                            } else {
                                ""
                            }
                        );
                    }
                }
                None => bail!("reminder store unavailable"),
            }
            // Give detached notifications a moment before the runtime shuts down.
            tokio::time::sleep(Duration::from_millis(500)).await;
            while let Ok(event) = events.try_recv() {
                if let EngineEvent::NotificationFailed { message, .. } = event {
                    eprintln!("notification failed: {message}");
                }
            }
            Ok(())
        }
        Commands::List => {
            let (engine, _) = build_engine(&preferences, reminders_path, Arc::new(LogNotifier), None)?;
            print_reminders(&engine.reminders()?);
            Ok(())
        }
        Commands::Add(args) => {
            let (engine, _) = build_engine(&preferences, reminders_path, Arc::new(LogNotifier), None)?;
            let draft = NewReminder {
                category: args.category,
                custom_title: args.title,
                interval_minutes: args.every,
                is_enabled: !args.disabled,
                scheduled_fire_date: args.at,
            };
            let reminder = engine.add_reminder(draft)?;
            println!("added {}", describe(&reminder));
            Ok(())
        }
        Commands::Remove { id } => {
            let (engine, _) = build_engine(&preferences, reminders_path, Arc::new(LogNotifier), None)?;
            let id = resolve_id(&engine.reminders()?, &id)?;
            let removed = engine.remove_reminder(id)?;
            println!("removed {}", removed.display_title());
            Ok(())
        }
        Commands::Toggle { id } => {
            let (engine, _) = build_engine(&preferences, reminders_path, Arc::new(LogNotifier), None)?;
            let id = resolve_id(&engine.reminders()?, &id)?;
            let reminder = engine.toggle_reminder(id)?;
            println!(
                "{} is now {}",
                reminder.display_title(),
                if reminder.is_enabled() { "enabled" } else { "paused" }
            );
            Ok(())
        }
        Commands::Snooze { id, duration } => {
            let (engine, _) = build_engine(&preferences, reminders_path, Arc::new(LogNotifier), None)?;
            let id = resolve_id(&engine.reminders()?, &id)?;
            let reminder = match duration {
                Some(duration) => engine.snooze_reminder(id, duration)?,
                None => engine.snooze_reminder_default(id)?,
            };
            if let Some(until) = reminder.snoozed_until() {
                println!(
                    "{} snoozed until {}",
                    reminder.display_title(),
                    until.with_timezone(&Local).format("%H:%M")
                );
            }
            Ok(())
        }
        Commands::Categories => {
            for category in ReminderCategory::ALL {
                println!(
                    "{} {:<11} {:<13} every {} min",
                    category.glyph(),
                    category.key(),
                    category.display_name(),
                    category.default_interval_minutes()
                );
            }
            Ok(())
        }
        Commands::Characters => {
            for character in PetCharacter::ALL {
                let marker = if character == preferences.character { "*" } else { " " };
                println!("{marker} {} {}", character.emoji(), character.key());
            }
            Ok(())
        }
    }
}

fn build_engine(
    preferences: &Preferences,
    reminders_path: PathBuf,
    dispatcher: Arc<dyn NotificationDispatcher>,
    poll_override: Option<Duration>,
) -> Result<(SchedulerEngine, mpsc::UnboundedReceiver<EngineEvent>)> {
    let store = FileReminderStore::open(&reminders_path)
        .with_context(|| format!("failed to open reminders {}", reminders_path.display()))?;
    let mut config = EngineConfig::from(preferences);
    if let Some(every) = poll_override {
        config.poll_interval = every;
    }
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let engine = SchedulerEngine::new(
        Arc::new(store),
        Arc::new(SystemClock),
        dispatcher,
        config,
        Some(event_tx),
    );
    Ok((engine, event_rx))
}

async fn run_scheduler(
    preferences: &Preferences,
    reminders_path: PathBuf,
    args: RunArgs,
) -> Result<()> {
    if args.every.is_some_and(|every| every.is_zero()) {
        bail!("--every must be greater than 0");
    }

    let dispatcher: Arc<dyn NotificationDispatcher> = if args.log_notifications {
        Arc::new(LogNotifier)
    } else {
        default_dispatcher()
    };
    let (engine, mut engine_events) =
        build_engine(preferences, reminders_path, dispatcher, args.every)?;

    // Fan engine events out to the console and to the indicator driver.
    let (indicator_tx, indicator_rx) = mpsc::unbounded_channel();
    let (_indicator_command_tx, indicator_command_rx) = mpsc::unbounded_channel();
    let indicator = spawn_indicator_driver(
        VisualStateMachine::new(preferences.character, preferences.animation_enabled),
        indicator_rx,
        indicator_command_rx,
        |glyph: Glyph| info!("indicator: {:?} ({})", glyph.role, glyph.symbol),
    );

    let event_handle = tokio::spawn(async move {
        while let Some(event) = engine_events.recv().await {
            match &event {
                EngineEvent::Started => println!("scheduler started"),
                EngineEvent::Tick(outcome) => {
                    for fire in &outcome.fired {
                        println!("{} {}", fire.reminder.category().glyph(), fire.reminder.display_title());
                    }
                }
                EngineEvent::TickSkipped { reason } => eprintln!("tick skipped: {reason}"),
                EngineEvent::NotificationFailed { message, .. } => {
                    eprintln!("notification failed: {message}")
                }
                EngineEvent::Stopped => println!("scheduler stopped"),
            }
            if indicator_tx.send(event).is_err() {
                break;
            }
        }
    });

    engine.start()?;
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    engine.stop();
    drop(engine);

    event_handle.await.context("event task failed")?;
    indicator.await.context("indicator task failed")?;
    Ok(())
}

fn resolve_id(reminders: &[Reminder], raw: &str) -> Result<ReminderId> {
    let needle = raw.trim().to_ascii_lowercase();
    if needle.is_empty() {
        bail!("reminder id is empty");
    }
    let matches: Vec<&Reminder> = reminders
        .iter()
        .filter(|reminder| reminder.id().to_string().starts_with(&needle))
        .collect();
    match matches.as_slice() {
        [only] => Ok(only.id()),
        [] => bail!("no reminder matches '{raw}'"),
        _ => bail!("'{raw}' matches {} reminders; use more characters", matches.len()),
    }
}

fn describe(reminder: &Reminder) -> String {
    format!(
        "{} {} [{}] every {} min",
        reminder.category().glyph(),
        reminder.display_title(),
        short_id(reminder.id()),
        reminder.interval_minutes()
    )
}

fn short_id(id: ReminderId) -> String {
    id.to_string().chars().take(8).collect()
}

fn print_reminders(reminders: &[Reminder]) {
    if reminders.is_empty() {
        println!("no reminders yet; try `pet-nudge add hydration`");
        return;
    }

    let now = Utc::now();
    for reminder in reminders {
        println!("{}  {}", describe(reminder), status_label(reminder, now));
    }
}

fn status_label(reminder: &Reminder, now: DateTime<Utc>) -> String {
    let Some(next) = next_fire_date(reminder, now) else {
        return "Paused".to_string();
    };
    let snoozed = if reminder.is_snoozed_at(now) { " (snoozed)" } else { "" };
    match classify(reminder, now) {
        Classification::Fired => format!("Due now{snoozed}"),
        _ => {
            let remaining = (next - now).num_seconds().max(0) as u64;
            // Round to whole minutes once we are past the first minute.
            let remaining = if remaining >= 60 {
                remaining / 60 * 60
            } else {
                remaining
            };
            format!(
                "Next in {}{snoozed}",
                humantime::format_duration(Duration::from_secs(remaining))
            )
        }
    }
}
