use crate::character::PetCharacter;
use crate::reminder::Reminder;
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn request_notification(&self, title: &str, body: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
}

impl NotificationContent {
    pub fn for_reminder(character: PetCharacter, reminder: &Reminder) -> Self {
        Self {
            title: format!("{} PetNudge", character.emoji()),
            body: format!(
                "{} Time to {}!",
                reminder.category().glyph(),
                reminder.display_title().to_lowercase()
            ),
        }
    }
}

/// Posts a macOS notification through `osascript`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsascriptNotifier;

const OSASCRIPT_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
impl NotificationDispatcher for OsascriptNotifier {
    async fn request_notification(&self, title: &str, body: &str) -> Result<()> {
        let script = format!(
            "display notification {} with title {} sound name \"default\"",
            applescript_string(body),
            applescript_string(title)
        );
        let mut command = Command::new("osascript");
        command.arg("-e").arg(script);

        let output = timeout(OSASCRIPT_TIMEOUT, command.output())
            .await
            .map_err(|_| {
                anyhow!(
                    "osascript timed out after {:.0}s",
                    OSASCRIPT_TIMEOUT.as_secs_f32()
                )
            })?
            .context("failed to execute osascript")?;

        if !output.status.success() {
            bail!(
                "osascript exited with status {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(())
    }
}

fn applescript_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Writes notifications to the log instead of the notification center.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl NotificationDispatcher for LogNotifier {
    async fn request_notification(&self, title: &str, body: &str) -> Result<()> {
        log::info!("notification: {title} | {body}");
        Ok(())
    }
}

/// Keeps every request in memory; handy for tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<NotificationContent>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<NotificationContent> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingNotifier {
    async fn request_notification(&self, title: &str, body: &str) -> Result<()> {
        self.sent
            .lock()
            .map_err(|_| anyhow!("notifier mutex poisoned"))?
            .push(NotificationContent {
                title: title.to_string(),
                body: body.to_string(),
            });
        Ok(())
    }
}

pub fn default_dispatcher() -> std::sync::Arc<dyn NotificationDispatcher> {
    if cfg!(target_os = "macos") {
        std::sync::Arc::new(OsascriptNotifier)
    } else {
        std::sync::Arc::new(LogNotifier)
    }
}

#[cfg(test)]
mod tests {
    use super::{NotificationContent, applescript_string};
    use crate::category::ReminderCategory;
    use crate::character::PetCharacter;
    use crate::reminder::{NewReminder, Reminder};
    use chrono::Utc;

    #[test]
    fn content_uses_persona_and_category_glyphs() {
        let reminder = Reminder::new(ReminderCategory::Hydration, Utc::now());
        let content = NotificationContent::for_reminder(PetCharacter::Dog, &reminder);
        assert_eq!(content.title, "🐶 PetNudge");
        assert_eq!(content.body, "💧 Time to drink water!");
    }

    #[test]
    fn custom_title_is_lowercased_in_body() {
        let mut draft = NewReminder::new(ReminderCategory::Custom);
        draft.custom_title = Some("Check The Oven".to_string());
        let reminder = Reminder::create(draft, Utc::now()).expect("valid");
        let content = NotificationContent::for_reminder(PetCharacter::Cat, &reminder);
        assert_eq!(content.body, "📝 Time to check the oven!");
    }

    #[test]
    fn escapes_quotes_for_applescript() {
        assert_eq!(applescript_string(r#"say "hi""#), r#""say \"hi\"""#);
    }
}
