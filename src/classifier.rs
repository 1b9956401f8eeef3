use crate::reminder::Reminder;
use chrono::{DateTime, Duration, Utc};

/// How far ahead of its due time a reminder counts as approaching.
///
/// Not validated against `interval_minutes`: a reminder with an interval of
/// five minutes or less stays approaching for its whole cycle.
pub const APPROACHING_THRESHOLD_SECS: i64 = 300;

pub fn approaching_threshold() -> Duration {
    Duration::seconds(APPROACHING_THRESHOLD_SECS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Disabled; left out of evaluation and aggregation entirely.
    Suppressed,
    Idle,
    Approaching,
    Fired,
}

impl Classification {
    pub fn is_evaluated(self) -> bool {
        !matches!(self, Classification::Suppressed)
    }
}

/// Pure: the same reminder and instant always give the same answer.
pub fn classify(reminder: &Reminder, now: DateTime<Utc>) -> Classification {
    if !reminder.is_enabled() {
        return Classification::Suppressed;
    }

    if reminder.is_snoozed_at(now) {
        return Classification::Idle;
    }

    let threshold = approaching_threshold();

    if let (Some(scheduled), None) = (reminder.scheduled_fire_date(), reminder.last_triggered()) {
        return if now >= scheduled {
            Classification::Fired
        } else if scheduled - now <= threshold {
            Classification::Approaching
        } else {
            Classification::Idle
        };
    }

    // Without any anchor the reminder is treated as last fired in the distant past.
    let Some(anchor) = reminder.last_triggered().or(reminder.created_at()) else {
        return Classification::Fired;
    };

    let elapsed = now - anchor;
    let interval = reminder.interval();
    if elapsed >= interval {
        Classification::Fired
    } else if interval - elapsed <= threshold {
        Classification::Approaching
    } else {
        Classification::Idle
    }
}

/// When the reminder is next due, as seen from `now`. Never stored.
pub fn next_fire_date(reminder: &Reminder, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if !reminder.is_enabled() {
        return None;
    }

    if let Some(until) = reminder.snoozed_until()
        && until > now
    {
        return Some(until);
    }

    if let (Some(scheduled), None) = (reminder.scheduled_fire_date(), reminder.last_triggered()) {
        return Some(scheduled);
    }

    match reminder.last_triggered().or(reminder.created_at()) {
        Some(anchor) => Some(anchor + reminder.interval()),
        None => Some(now),
    }
}
