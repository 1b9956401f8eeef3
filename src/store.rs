use crate::reminder::{Reminder, ReminderId};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("reminder store unavailable: {0}")]
    Unavailable(String),

    #[error("reminder {0} not found")]
    NotFound(ReminderId),

    #[error("failed to read/write reminders file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse reminders file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize reminders: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Authoritative, ordered reminder collection.
///
/// Every mutation is a read-modify-write of a single reminder (or of the list
/// for append/remove) and is either fully applied or not applied at all.
pub trait ReminderStore: Send + Sync {
    fn list_reminders(&self) -> Result<Vec<Reminder>, StoreError>;

    fn update_reminder(
        &self,
        id: ReminderId,
        mutation: &mut dyn FnMut(&mut Reminder),
    ) -> Result<Reminder, StoreError>;

    fn append_reminder(&self, reminder: Reminder) -> Result<(), StoreError>;

    fn remove_reminder(&self, id: ReminderId) -> Result<Reminder, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryReminderStore {
    reminders: Mutex<Vec<Reminder>>,
}

impl MemoryReminderStore {
    pub fn new(reminders: Vec<Reminder>) -> Self {
        Self {
            reminders: Mutex::new(reminders),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Reminder>>, StoreError> {
        self.reminders
            .lock()
            .map_err(|_| StoreError::Unavailable("reminder list mutex poisoned".to_string()))
    }
}

impl ReminderStore for MemoryReminderStore {
    fn list_reminders(&self) -> Result<Vec<Reminder>, StoreError> {
        Ok(self.lock()?.clone())
    }

    fn update_reminder(
        &self,
        id: ReminderId,
        mutation: &mut dyn FnMut(&mut Reminder),
    ) -> Result<Reminder, StoreError> {
        let mut reminders = self.lock()?;
        let reminder = reminders
            .iter_mut()
            .find(|reminder| reminder.id() == id)
            .ok_or(StoreError::NotFound(id))?;
        mutation(reminder);
        Ok(reminder.clone())
    }

    fn append_reminder(&self, reminder: Reminder) -> Result<(), StoreError> {
        self.lock()?.push(reminder);
        Ok(())
    }

    fn remove_reminder(&self, id: ReminderId) -> Result<Reminder, StoreError> {
        let mut reminders = self.lock()?;
        let index = reminders
            .iter()
            .position(|reminder| reminder.id() == id)
            .ok_or(StoreError::NotFound(id))?;
        Ok(reminders.remove(index))
    }
}

/// JSON-file backed store. The in-memory list is only replaced after the new
/// contents have been written, so a failed write leaves both untouched.
#[derive(Debug)]
pub struct FileReminderStore {
    path: PathBuf,
    reminders: Mutex<Vec<Reminder>>,
}

impl FileReminderStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let reminders = load_reminders(&path)?;
        log::debug!(
            "loaded {} reminders from {}",
            reminders.len(),
            path.display()
        );
        Ok(Self {
            path,
            reminders: Mutex::new(reminders),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn commit<T>(
        &self,
        change: impl FnOnce(&mut Vec<Reminder>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut current = self
            .reminders
            .lock()
            .map_err(|_| StoreError::Unavailable("reminder file mutex poisoned".to_string()))?;
        let mut next = current.clone();
        let value = change(&mut next)?;
        write_reminders(&self.path, &next)?;
        *current = next;
        Ok(value)
    }
}

impl ReminderStore for FileReminderStore {
    fn list_reminders(&self) -> Result<Vec<Reminder>, StoreError> {
        self.reminders
            .lock()
            .map(|reminders| reminders.clone())
            .map_err(|_| StoreError::Unavailable("reminder file mutex poisoned".to_string()))
    }

    fn update_reminder(
        &self,
        id: ReminderId,
        mutation: &mut dyn FnMut(&mut Reminder),
    ) -> Result<Reminder, StoreError> {
        self.commit(|reminders| {
            let reminder = reminders
                .iter_mut()
                .find(|reminder| reminder.id() == id)
                .ok_or(StoreError::NotFound(id))?;
            mutation(reminder);
            Ok(reminder.clone())
        })
    }

    fn append_reminder(&self, reminder: Reminder) -> Result<(), StoreError> {
        self.commit(|reminders| {
            reminders.push(reminder);
            Ok(())
        })
    }

    fn remove_reminder(&self, id: ReminderId) -> Result<Reminder, StoreError> {
        self.commit(|reminders| {
            let index = reminders
                .iter()
                .position(|reminder| reminder.id() == id)
                .ok_or(StoreError::NotFound(id))?;
            Ok(reminders.remove(index))
        })
    }
}

fn load_reminders(path: &Path) -> Result<Vec<Reminder>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let text = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str(&text).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn write_reminders(path: &Path, reminders: &[Reminder]) -> Result<(), StoreError> {
    let io_error = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }

    let json = serde_json::to_string_pretty(reminders)?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json).map_err(io_error)?;
    std::fs::rename(&tmp_path, path).map_err(io_error)?;
    Ok(())
}
