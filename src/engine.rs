use crate::character::PetCharacter;
use crate::classifier::{Classification, classify};
use crate::clock::Clock;
use crate::config::{DEFAULT_POLL_INTERVAL, DEFAULT_SNOOZE, Preferences};
use crate::notification::{NotificationContent, NotificationDispatcher};
use crate::reminder::{NewReminder, Reminder, ReminderError, ReminderId};
use crate::store::{ReminderStore, StoreError};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Reminder(#[from] ReminderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no tokio runtime available to drive the scheduler")]
    NoRuntime,

    #[error("snooze of {0:?} is out of range")]
    SnoozeOutOfRange(Duration),
}

/// A reminder that came due during a tick. `reminder` is the state before firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FireEvent {
    pub reminder: Reminder,
    pub fired_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    pub now: DateTime<Utc>,
    pub fired: Vec<FireEvent>,
    pub any_approaching: bool,
}

#[derive(Debug, Clone)]
pub enum EngineEvent {
    Started,
    Tick(TickOutcome),
    TickSkipped {
        reason: String,
    },
    NotificationFailed {
        reminder_id: ReminderId,
        message: String,
    },
    Stopped,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub poll_interval: Duration,
    pub default_snooze: Duration,
    pub notifications_enabled: bool,
    pub character: PetCharacter,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            default_snooze: DEFAULT_SNOOZE,
            notifications_enabled: true,
            character: PetCharacter::default(),
        }
    }
}

impl From<&Preferences> for EngineConfig {
    fn from(preferences: &Preferences) -> Self {
        Self {
            poll_interval: preferences.poll_interval,
            default_snooze: preferences.default_snooze,
            notifications_enabled: preferences.notifications_enabled,
            character: preferences.character,
        }
    }
}

struct EngineCore {
    store: Arc<dyn ReminderStore>,
    clock: Arc<dyn Clock>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    event_tx: Option<mpsc::UnboundedSender<EngineEvent>>,
    config: EngineConfig,
    character: Mutex<PetCharacter>,
    // Held for a whole tick and for every user mutation, so they never interleave.
    gate: Mutex<()>,
}

/// Periodic reminder evaluation plus the user-facing mutations that must be
/// serialized with it.
///
/// `start` spawns the tick loop on the current tokio runtime; `stop` aborts it.
/// The tick body never awaits, so an abort always lands between ticks.
pub struct SchedulerEngine {
    core: Arc<EngineCore>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SchedulerEngine {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        clock: Arc<dyn Clock>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        config: EngineConfig,
        event_tx: Option<mpsc::UnboundedSender<EngineEvent>>,
    ) -> Self {
        let character = config.character;
        Self {
            core: Arc::new(EngineCore {
                store,
                clock,
                dispatcher,
                event_tx,
                config,
                character: Mutex::new(character),
                gate: Mutex::new(()),
            }),
            task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.core.config
    }

    /// Installs a fresh tick source, replacing any running one.
    pub fn start(&self) -> Result<(), EngineError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        let mut task = self.task_slot();
        if let Some(previous) = task.take() {
            previous.abort();
            debug!("replaced running tick source");
        }

        let core = Arc::clone(&self.core);
        let period = self.core.config.poll_interval;
        *task = Some(runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                core.process_tick();
            }
        }));

        info!("scheduler started (poll every {})", humantime::format_duration(period));
        self.core.send_event(EngineEvent::Started);
        Ok(())
    }

    /// Cancels the tick source. In-flight notifications keep going.
    pub fn stop(&self) {
        let Some(task) = self.task_slot().take() else {
            return;
        };
        task.abort();
        info!("scheduler stopped");
        self.core.send_event(EngineEvent::Stopped);
    }

    pub fn is_running(&self) -> bool {
        self.task_slot().is_some()
    }

    /// One evaluation pass: classify every reminder against a single `now`
    /// and mark the fired ones. Does not notify.
    pub fn tick(&self) -> Result<TickOutcome, StoreError> {
        self.core.tick()
    }

    /// A full periodic step: tick, fan out notifications, publish the outcome.
    /// Returns `None` when the store was unavailable and the tick was skipped.
    pub fn process_tick(&self) -> Option<TickOutcome> {
        self.core.process_tick()
    }

    pub fn reminders(&self) -> Result<Vec<Reminder>, StoreError> {
        let _gate = self.core.lock_gate();
        self.core.store.list_reminders()
    }

    pub fn add_reminder(&self, draft: NewReminder) -> Result<Reminder, EngineError> {
        let _gate = self.core.lock_gate();
        let reminder = Reminder::create(draft, self.core.clock.now())?;
        self.core.store.append_reminder(reminder.clone())?;
        info!(
            "added reminder {} ({}, every {} min)",
            reminder.id(),
            reminder.display_title(),
            reminder.interval_minutes()
        );
        Ok(reminder)
    }

    pub fn remove_reminder(&self, id: ReminderId) -> Result<Reminder, EngineError> {
        let _gate = self.core.lock_gate();
        let removed = self.core.store.remove_reminder(id)?;
        info!("removed reminder {id}");
        Ok(removed)
    }

    pub fn set_enabled(&self, id: ReminderId, enabled: bool) -> Result<Reminder, EngineError> {
        let _gate = self.core.lock_gate();
        Ok(self
            .core
            .store
            .update_reminder(id, &mut |reminder: &mut Reminder| {
                reminder.set_enabled(enabled)
            })?)
    }

    pub fn toggle_reminder(&self, id: ReminderId) -> Result<Reminder, EngineError> {
        let _gate = self.core.lock_gate();
        Ok(self.core.store.update_reminder(id, &mut |reminder: &mut Reminder| {
            let enabled = reminder.is_enabled();
            reminder.set_enabled(!enabled);
        })?)
    }

    /// Sets `snoozed_until = now + duration`, whether or not the reminder has fired.
    pub fn snooze_reminder(
        &self,
        id: ReminderId,
        duration: Duration,
    ) -> Result<Reminder, EngineError> {
        let _gate = self.core.lock_gate();
        let until = chrono::Duration::from_std(duration)
            .ok()
            .and_then(|span| self.core.clock.now().checked_add_signed(span))
            .ok_or(EngineError::SnoozeOutOfRange(duration))?;
        let snoozed = self
            .core
            .store
            .update_reminder(id, &mut |reminder: &mut Reminder| {
                reminder.snooze_until(until)
            })?;
        info!("snoozed reminder {id} until {}", until.to_rfc3339());
        Ok(snoozed)
    }

    pub fn snooze_reminder_default(&self, id: ReminderId) -> Result<Reminder, EngineError> {
        self.snooze_reminder(id, self.core.config.default_snooze)
    }

    pub fn character(&self) -> PetCharacter {
        *self
            .core
            .character
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_character(&self, character: PetCharacter) {
        *self
            .core
            .character
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = character;
    }

    fn task_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for SchedulerEngine {
    fn drop(&mut self) {
        if let Some(task) = self.task_slot().take() {
            task.abort();
        }
    }
}

impl EngineCore {
    fn lock_gate(&self) -> MutexGuard<'_, ()> {
        // The guarded value is `()`, so a poisoned gate carries no broken state.
        self.gate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn tick(&self) -> Result<TickOutcome, StoreError> {
        let _gate = self.lock_gate();
        let now = self.clock.now();
        let reminders = self.store.list_reminders()?;

        let mut outcome = TickOutcome {
            now,
            fired: Vec::new(),
            any_approaching: false,
        };

        for reminder in &reminders {
            match classify(reminder, now) {
                Classification::Fired => {
                    match self
                        .store
                        .update_reminder(reminder.id(), &mut |stored: &mut Reminder| {
                            stored.mark_fired(now)
                        })
                    {
                        Ok(_) => {
                            debug!("reminder {} fired", reminder.id());
                            outcome.fired.push(FireEvent {
                                reminder: reminder.clone(),
                                fired_at: now,
                            });
                        }
                        Err(err) => {
                            warn!(
                                "could not record fire of reminder {}: {err}; retrying next tick",
                                reminder.id()
                            );
                        }
                    }
                }
                Classification::Approaching => outcome.any_approaching = true,
                Classification::Idle | Classification::Suppressed => {}
            }
        }

        Ok(outcome)
    }

    fn process_tick(&self) -> Option<TickOutcome> {
        match self.tick() {
            Ok(outcome) => {
                self.dispatch_notifications(&outcome);
                self.send_event(EngineEvent::Tick(outcome.clone()));
                Some(outcome)
            }
            Err(err) => {
                warn!("skipping tick: {err}");
                self.send_event(EngineEvent::TickSkipped {
                    reason: err.to_string(),
                });
                None
            }
        }
    }

    fn dispatch_notifications(&self, outcome: &TickOutcome) {
        if !self.config.notifications_enabled || outcome.fired.is_empty() {
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!(
                    "no tokio runtime; dropping {} notification(s)",
                    outcome.fired.len()
                );
                for fire in &outcome.fired {
                    self.send_event(EngineEvent::NotificationFailed {
                        reminder_id: fire.reminder.id(),
                        message: EngineError::NoRuntime.to_string(),
                    });
                }
                return;
            }
        };

        let character = *self
            .character
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        for fire in &outcome.fired {
            let content = NotificationContent::for_reminder(character, &fire.reminder);
            let reminder_id = fire.reminder.id();
            let dispatcher = Arc::clone(&self.dispatcher);
            let event_tx = self.event_tx.clone();

            // Detached: the tick loop never waits on delivery.
            runtime.spawn(async move {
                if let Err(err) = dispatcher
                    .request_notification(&content.title, &content.body)
                    .await
                {
                    warn!("notification for reminder {reminder_id} failed: {err:#}");
                    send_event(
                        &event_tx,
                        EngineEvent::NotificationFailed {
                            reminder_id,
                            message: err.to_string(),
                        },
                    );
                }
            });
        }
    }

    fn send_event(&self, event: EngineEvent) {
        send_event(&self.event_tx, event);
    }
}

fn send_event(event_tx: &Option<mpsc::UnboundedSender<EngineEvent>>, event: EngineEvent) {
    if let Some(tx) = event_tx {
        let _ = tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::{EngineConfig, EngineError, EngineEvent, SchedulerEngine};
    use crate::category::ReminderCategory;
    use crate::classifier::{Classification, classify, next_fire_date};
    use crate::clock::{Clock, ManualClock};
    use crate::notification::{NotificationDispatcher, RecordingNotifier};
    use crate::reminder::{NewReminder, Reminder, ReminderId};
    use crate::store::{MemoryReminderStore, ReminderStore, StoreError};
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 30, 9, 0, 0).unwrap()
    }

    struct Harness {
        engine: SchedulerEngine,
        store: Arc<MemoryReminderStore>,
        clock: Arc<ManualClock>,
        notifier: Arc<RecordingNotifier>,
        events: mpsc::UnboundedReceiver<EngineEvent>,
    }

    fn harness(reminders: Vec<Reminder>) -> Harness {
        let store = Arc::new(MemoryReminderStore::new(reminders));
        let clock = Arc::new(ManualClock::new(start_time()));
        let notifier = Arc::new(RecordingNotifier::default());
        let (tx, events) = mpsc::unbounded_channel();
        let engine = SchedulerEngine::new(
            store.clone(),
            clock.clone(),
            notifier.clone(),
            EngineConfig::default(),
            Some(tx),
        );
        Harness {
            engine,
            store,
            clock,
            notifier,
            events,
        }
    }

    fn reminder(category: ReminderCategory, minutes: i64, created_ago: ChronoDuration) -> Reminder {
        let mut draft = NewReminder::new(category);
        draft.interval_minutes = Some(minutes);
        Reminder::create(draft, start_time() - created_ago).expect("valid reminder")
    }

    fn drain(events: &mut mpsc::UnboundedReceiver<EngineEvent>) -> Vec<EngineEvent> {
        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        seen
    }

    fn tick_count(events: &[EngineEvent]) -> usize {
        events
            .iter()
            .filter(|event| matches!(event, EngineEvent::Tick(_)))
            .count()
    }

    #[test]
    fn tick_fires_due_reminders_once_and_records_trigger() {
        let due = reminder(ReminderCategory::Hydration, 30, ChronoDuration::minutes(31));
        let h = harness(vec![due.clone()]);

        let outcome = h.engine.tick().expect("tick");
        assert_eq!(outcome.fired.len(), 1);
        assert_eq!(outcome.fired[0].reminder.id(), due.id());
        assert!(!outcome.any_approaching);

        let stored = &h.store.list_reminders().expect("list")[0];
        assert_eq!(stored.last_triggered(), Some(start_time()));
        assert!(stored.snoozed_until().is_none());

        let again = h.engine.tick().expect("second tick");
        assert!(again.fired.is_empty());
    }

    #[test]
    fn tick_aggregates_approaching_and_skips_disabled() {
        let approaching = reminder(ReminderCategory::Stretch, 30, ChronoDuration::minutes(27));
        let mut disabled = reminder(ReminderCategory::Medication, 30, ChronoDuration::hours(9));
        disabled.set_enabled(false);
        let idle = reminder(ReminderCategory::BreakTime, 60, ChronoDuration::minutes(1));
        let h = harness(vec![approaching, disabled, idle]);

        let outcome = h.engine.tick().expect("tick");
        assert!(outcome.fired.is_empty());
        assert!(outcome.any_approaching);
        let stored = h.store.list_reminders().expect("list");
        assert!(stored[1].last_triggered().is_none());
    }

    #[test]
    fn fire_events_follow_store_order() {
        let first = reminder(ReminderCategory::Hydration, 30, ChronoDuration::hours(2));
        let second = reminder(ReminderCategory::Stretch, 45, ChronoDuration::hours(2));
        let h = harness(vec![first.clone(), second.clone()]);

        let ids: Vec<ReminderId> = h
            .engine
            .tick()
            .expect("tick")
            .fired
            .iter()
            .map(|fire| fire.reminder.id())
            .collect();
        assert_eq!(ids, vec![first.id(), second.id()]);
    }

    #[test]
    fn snooze_suppresses_a_due_reminder() {
        let due = reminder(ReminderCategory::Hydration, 30, ChronoDuration::hours(1));
        let h = harness(vec![due.clone()]);

        let snoozed = h
            .engine
            .snooze_reminder(due.id(), Duration::from_secs(600))
            .expect("snooze");
        assert_eq!(
            snoozed.snoozed_until(),
            Some(start_time() + ChronoDuration::seconds(600))
        );
        assert_eq!(classify(&snoozed, start_time()), Classification::Idle);
        assert!(h.engine.tick().expect("tick").fired.is_empty());

        h.clock.advance(ChronoDuration::seconds(600));
        let outcome = h.engine.tick().expect("tick after snooze");
        assert_eq!(outcome.fired.len(), 1);
        let stored = &h.store.list_reminders().expect("list")[0];
        assert!(stored.snoozed_until().is_none());
    }

    #[test]
    fn snooze_applies_before_first_fire() {
        let fresh = reminder(ReminderCategory::BreakTime, 60, ChronoDuration::zero());
        let h = harness(vec![fresh.clone()]);
        let snoozed = h
            .engine
            .snooze_reminder_default(fresh.id())
            .expect("snooze");
        assert_eq!(
            snoozed.snoozed_until(),
            Some(start_time() + ChronoDuration::minutes(10))
        );
    }

    #[test]
    fn snooze_is_measured_from_the_current_clock() {
        let due = reminder(ReminderCategory::Stretch, 45, ChronoDuration::hours(1));
        let h = harness(vec![due.clone()]);
        let later = start_time() + ChronoDuration::minutes(7);
        h.clock.set(later);

        let snoozed = h
            .engine
            .snooze_reminder(due.id(), Duration::from_secs(120))
            .expect("snooze");
        assert_eq!(
            snoozed.snoozed_until(),
            Some(later + ChronoDuration::minutes(2))
        );
    }

    #[test]
    fn oversized_snooze_is_rejected_without_touching_the_reminder() {
        let due = reminder(ReminderCategory::Hydration, 30, ChronoDuration::hours(1));
        let h = harness(vec![due.clone()]);

        let past_max_year = Duration::from_secs(300_000 * 365 * 24 * 60 * 60);
        for duration in [past_max_year, Duration::from_secs(u64::MAX)] {
            assert!(matches!(
                h.engine.snooze_reminder(due.id(), duration),
                Err(EngineError::SnoozeOutOfRange(rejected)) if rejected == duration
            ));
        }

        let stored = &h.store.list_reminders().expect("list")[0];
        assert!(stored.snoozed_until().is_none());
    }

    #[test]
    fn process_tick_without_runtime_reports_lost_notifications() {
        let due = reminder(ReminderCategory::Hydration, 30, ChronoDuration::hours(1));
        let mut h = harness(vec![due.clone()]);

        let outcome = h.engine.process_tick().expect("tick");
        assert_eq!(outcome.fired.len(), 1);
        assert!(h.notifier.sent().is_empty());

        let seen = drain(&mut h.events);
        assert!(seen.iter().any(|event| matches!(
            event,
            EngineEvent::NotificationFailed { reminder_id, .. } if *reminder_id == due.id()
        )));
        assert_eq!(tick_count(&seen), 1);
    }

    #[test]
    fn no_op_tick_leaves_next_fire_date_unchanged() {
        let pending = reminder(ReminderCategory::Stretch, 45, ChronoDuration::minutes(10));
        let h = harness(vec![pending]);
        let now = h.clock.now();

        let before = next_fire_date(&h.store.list_reminders().expect("list")[0], now);
        let outcome = h.engine.tick().expect("tick");
        assert!(outcome.fired.is_empty());
        let after = next_fire_date(&h.store.list_reminders().expect("list")[0], now);
        assert_eq!(before, after);
    }

    #[test]
    fn user_mutations_go_through_the_store() {
        let h = harness(Vec::new());
        let mut draft = NewReminder::new(ReminderCategory::Custom);
        draft.custom_title = Some("Feed the fish".to_string());
        let added = h.engine.add_reminder(draft).expect("add");
        assert_eq!(added.created_at(), Some(start_time()));

        let toggled = h.engine.toggle_reminder(added.id()).expect("toggle");
        assert!(!toggled.is_enabled());
        let enabled = h.engine.set_enabled(added.id(), true).expect("enable");
        assert!(enabled.is_enabled());

        h.engine.remove_reminder(added.id()).expect("remove");
        assert!(h.engine.reminders().expect("list").is_empty());
        assert!(matches!(
            h.engine.remove_reminder(added.id()),
            Err(EngineError::Store(StoreError::NotFound(_)))
        ));

        let mut invalid = NewReminder::new(ReminderCategory::Hydration);
        invalid.interval_minutes = Some(0);
        assert!(matches!(
            h.engine.add_reminder(invalid),
            Err(EngineError::Reminder(_))
        ));
    }

    struct UnavailableStore {
        down: AtomicBool,
        inner: MemoryReminderStore,
    }

    impl ReminderStore for UnavailableStore {
        fn list_reminders(&self) -> Result<Vec<Reminder>, StoreError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("disk unplugged".to_string()));
            }
            self.inner.list_reminders()
        }

        fn update_reminder(
            &self,
            id: ReminderId,
            mutation: &mut dyn FnMut(&mut Reminder),
        ) -> Result<Reminder, StoreError> {
            self.inner.update_reminder(id, mutation)
        }

        fn append_reminder(&self, reminder: Reminder) -> Result<(), StoreError> {
            self.inner.append_reminder(reminder)
        }

        fn remove_reminder(&self, id: ReminderId) -> Result<Reminder, StoreError> {
            self.inner.remove_reminder(id)
        }
    }

    #[tokio::test]
    async fn unavailable_store_skips_the_tick_and_recovers() {
        let due = reminder(ReminderCategory::Hydration, 30, ChronoDuration::hours(1));
        let store = Arc::new(UnavailableStore {
            down: AtomicBool::new(true),
            inner: MemoryReminderStore::new(vec![due]),
        });
        let (tx, mut events) = mpsc::unbounded_channel();
        let engine = SchedulerEngine::new(
            store.clone(),
            Arc::new(ManualClock::new(start_time())),
            Arc::new(RecordingNotifier::default()),
            EngineConfig::default(),
            Some(tx),
        );

        assert!(engine.process_tick().is_none());
        assert!(matches!(
            drain(&mut events).as_slice(),
            [EngineEvent::TickSkipped { .. }]
        ));

        store.down.store(false, Ordering::SeqCst);
        let outcome = engine.process_tick().expect("store is back");
        assert_eq!(outcome.fired.len(), 1);
    }

    struct FailingNotifier;

    #[async_trait]
    impl NotificationDispatcher for FailingNotifier {
        async fn request_notification(&self, _title: &str, _body: &str) -> Result<()> {
            Err(anyhow!("notification center unavailable"))
        }
    }

    #[tokio::test]
    async fn notification_failures_do_not_touch_reminder_state() {
        let due = reminder(ReminderCategory::Stretch, 45, ChronoDuration::hours(1));
        let store = Arc::new(MemoryReminderStore::new(vec![due.clone()]));
        let (tx, mut events) = mpsc::unbounded_channel();
        let engine = SchedulerEngine::new(
            store.clone(),
            Arc::new(ManualClock::new(start_time())),
            Arc::new(FailingNotifier),
            EngineConfig::default(),
            Some(tx),
        );

        let outcome = engine.process_tick().expect("tick");
        assert_eq!(outcome.fired.len(), 1);
        tokio::task::yield_now().await;

        let seen = drain(&mut events);
        assert!(seen.iter().any(|event| matches!(
            event,
            EngineEvent::NotificationFailed { reminder_id, .. } if *reminder_id == due.id()
        )));
        let stored = &store.list_reminders().expect("list")[0];
        assert_eq!(stored.last_triggered(), Some(start_time()));
    }

    #[tokio::test]
    async fn notifications_are_skipped_when_disabled() {
        let due = reminder(ReminderCategory::Hydration, 30, ChronoDuration::hours(1));
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = SchedulerEngine::new(
            Arc::new(MemoryReminderStore::new(vec![due])),
            Arc::new(ManualClock::new(start_time())),
            notifier.clone(),
            EngineConfig {
                notifications_enabled: false,
                ..EngineConfig::default()
            },
            None,
        );

        assert_eq!(engine.process_tick().expect("tick").fired.len(), 1);
        tokio::task::yield_now().await;
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn started_engine_ticks_on_the_poll_period() {
        let due = reminder(ReminderCategory::Hydration, 30, ChronoDuration::minutes(31));
        let mut h = harness(vec![due]);

        h.engine.start().expect("start");
        tokio::time::sleep(Duration::from_secs(14)).await;
        assert!(h.store.list_reminders().expect("list")[0]
            .last_triggered()
            .is_none());

        tokio::time::sleep(Duration::from_secs(2)).await;
        let stored = &h.store.list_reminders().expect("list")[0];
        assert_eq!(stored.last_triggered(), Some(start_time()));

        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, "💧 Time to drink water!");

        let seen = drain(&mut h.events);
        assert!(matches!(seen.first(), Some(EngineEvent::Started)));
        assert_eq!(tick_count(&seen), 1);
        h.engine.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_the_tick_source() {
        let mut h = harness(Vec::new());
        h.engine.start().expect("start");
        h.engine.start().expect("restart");

        tokio::time::sleep(Duration::from_secs(31)).await;
        let seen = drain(&mut h.events);
        assert_eq!(tick_count(&seen), 2);
        h.engine.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_halts_ticks() {
        let due = reminder(ReminderCategory::Hydration, 30, ChronoDuration::hours(1));
        let mut h = harness(vec![due]);

        h.engine.start().expect("start");
        assert!(h.engine.is_running());
        h.engine.stop();
        h.engine.stop();
        assert!(!h.engine.is_running());

        tokio::time::sleep(Duration::from_secs(120)).await;
        let seen = drain(&mut h.events);
        assert_eq!(tick_count(&seen), 0);
        assert_eq!(
            seen.iter()
                .filter(|event| matches!(event, EngineEvent::Stopped))
                .count(),
            1
        );
        assert!(h.store.list_reminders().expect("list")[0]
            .last_triggered()
            .is_none());
    }

    #[test]
    fn start_requires_a_runtime() {
        let h = harness(Vec::new());
        assert!(matches!(h.engine.start(), Err(EngineError::NoRuntime)));
    }
}
