use crate::category::ReminderCategory;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub type ReminderId = Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReminderError {
    #[error("interval must be greater than 0 minutes (got {0})")]
    InvalidInterval(i64),

    #[error("interval of {0} minutes is too large")]
    IntervalTooLarge(i64),
}

/// User-supplied fields for a new reminder.
#[derive(Debug, Clone)]
pub struct NewReminder {
    pub category: ReminderCategory,
    pub custom_title: Option<String>,
    /// Falls back to the category default when absent.
    pub interval_minutes: Option<i64>,
    pub is_enabled: bool,
    pub scheduled_fire_date: Option<DateTime<Utc>>,
}

impl NewReminder {
    pub fn new(category: ReminderCategory) -> Self {
        Self {
            category,
            custom_title: None,
            interval_minutes: None,
            is_enabled: true,
            scheduled_fire_date: None,
        }
    }
}

/// A recurring (or first-time scheduled) nudge.
///
/// Trigger history is only writable inside the crate: `last_triggered` is set
/// by the scheduler when the reminder fires and by nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    id: ReminderId,
    category: ReminderCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_title: Option<String>,
    #[serde(deserialize_with = "deserialize_interval")]
    interval_minutes: u32,
    #[serde(default = "default_true")]
    is_enabled: bool,
    #[serde(default)]
    last_triggered: Option<DateTime<Utc>>,
    #[serde(default)]
    snoozed_until: Option<DateTime<Utc>>,
    #[serde(default)]
    scheduled_fire_date: Option<DateTime<Utc>>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

fn deserialize_interval<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let minutes = u32::deserialize(deserializer)?;
    if minutes == 0 {
        return Err(serde::de::Error::custom(ReminderError::InvalidInterval(0)));
    }
    Ok(minutes)
}

impl Reminder {
    /// Enabled reminder with the category's default interval.
    pub fn new(category: ReminderCategory, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            category,
            custom_title: None,
            interval_minutes: category.default_interval_minutes(),
            is_enabled: true,
            last_triggered: None,
            snoozed_until: None,
            scheduled_fire_date: None,
            created_at: Some(created_at),
        }
    }

    pub fn create(draft: NewReminder, created_at: DateTime<Utc>) -> Result<Self, ReminderError> {
        let interval_minutes = match draft.interval_minutes {
            None => draft.category.default_interval_minutes(),
            Some(minutes) if minutes <= 0 => return Err(ReminderError::InvalidInterval(minutes)),
            Some(minutes) => {
                u32::try_from(minutes).map_err(|_| ReminderError::IntervalTooLarge(minutes))?
            }
        };

        let custom_title = draft
            .custom_title
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty());

        Ok(Self {
            id: Uuid::new_v4(),
            category: draft.category,
            custom_title,
            interval_minutes,
            is_enabled: draft.is_enabled,
            last_triggered: None,
            snoozed_until: None,
            scheduled_fire_date: draft.scheduled_fire_date,
            created_at: Some(created_at),
        })
    }

    pub fn id(&self) -> ReminderId {
        self.id
    }

    pub fn category(&self) -> ReminderCategory {
        self.category
    }

    pub fn custom_title(&self) -> Option<&str> {
        self.custom_title.as_deref()
    }

    /// The custom title wins only for the `Custom` category.
    pub fn display_title(&self) -> &str {
        match (&self.custom_title, self.category) {
            (Some(title), ReminderCategory::Custom) => title,
            _ => self.category.display_name(),
        }
    }

    pub fn interval_minutes(&self) -> u32 {
        self.interval_minutes
    }

    pub fn interval(&self) -> Duration {
        Duration::minutes(i64::from(self.interval_minutes))
    }

    pub fn is_enabled(&self) -> bool {
        self.is_enabled
    }

    pub fn last_triggered(&self) -> Option<DateTime<Utc>> {
        self.last_triggered
    }

    pub fn snoozed_until(&self) -> Option<DateTime<Utc>> {
        self.snoozed_until
    }

    pub fn scheduled_fire_date(&self) -> Option<DateTime<Utc>> {
        self.scheduled_fire_date
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn is_snoozed_at(&self, now: DateTime<Utc>) -> bool {
        self.snoozed_until.is_some_and(|until| until > now)
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.is_enabled = enabled;
    }

    pub(crate) fn mark_fired(&mut self, now: DateTime<Utc>) {
        self.last_triggered = Some(now);
        self.snoozed_until = None;
    }

    pub(crate) fn snooze_until(&mut self, until: DateTime<Utc>) {
        self.snoozed_until = Some(until);
    }
}
