use std::path::{Path, PathBuf};

/// Resolves only; the store and the sample preferences writer create
/// directories when they first write.
pub fn default_data_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => data_dir_under(Path::new(&home)),
        None => PathBuf::from("."),
    }
}

fn data_dir_under(home: &Path) -> PathBuf {
    home.join("Library")
        .join("Application Support")
        .join("pet-nudge")
}

pub fn default_preferences_path() -> PathBuf {
    default_data_dir().join("preferences.toml")
}

pub fn default_reminders_path() -> PathBuf {
    default_data_dir().join("reminders.json")
}
