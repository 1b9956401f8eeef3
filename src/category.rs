use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed set of reminder kinds. Metadata is static, never stored per reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderCategory {
    Hydration,
    BreakTime,
    Stretch,
    Medication,
    Custom,
}

impl ReminderCategory {
    pub const ALL: [ReminderCategory; 5] = [
        ReminderCategory::Hydration,
        ReminderCategory::BreakTime,
        ReminderCategory::Stretch,
        ReminderCategory::Medication,
        ReminderCategory::Custom,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            ReminderCategory::Hydration => "Drink Water",
            ReminderCategory::BreakTime => "Take a Break",
            ReminderCategory::Stretch => "Stretch",
            ReminderCategory::Medication => "Medication",
            ReminderCategory::Custom => "Custom",
        }
    }

    pub fn glyph(self) -> &'static str {
        match self {
            ReminderCategory::Hydration => "💧",
            ReminderCategory::BreakTime => "☕️",
            ReminderCategory::Stretch => "🧘",
            ReminderCategory::Medication => "💊",
            ReminderCategory::Custom => "📝",
        }
    }

    pub fn default_interval_minutes(self) -> u32 {
        match self {
            ReminderCategory::Hydration => 30,
            ReminderCategory::BreakTime => 60,
            ReminderCategory::Stretch => 45,
            ReminderCategory::Medication => 480,
            ReminderCategory::Custom => 60,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            ReminderCategory::Hydration => "hydration",
            ReminderCategory::BreakTime => "break_time",
            ReminderCategory::Stretch => "stretch",
            ReminderCategory::Medication => "medication",
            ReminderCategory::Custom => "custom",
        }
    }
}

impl fmt::Display for ReminderCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ReminderCategory {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        ReminderCategory::ALL
            .into_iter()
            .find(|category| category.key() == normalized)
            .ok_or_else(|| {
                format!(
                    "unknown category '{value}' (expected one of: {})",
                    ReminderCategory::ALL
                        .iter()
                        .map(|c| c.key())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }
}
