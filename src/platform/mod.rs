// ticketwatch platform abstraction
// Resolves where the settings database and bundled resources live on
// Windows, macOS, and Linux.

use std::env;
use std::path::PathBuf;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "windows")]
mod windows;

/// File name of the settings database inside the data directory.
pub const DATABASE_FILE: &str = "ticketwatch.db";

/// Overrides the data directory.
pub const DATA_DIR_ENV: &str = "TICKETWATCH_DATA_DIR";

/// Overrides the locale directory.
pub const LOCALES_DIR_ENV: &str = "TICKETWATCH_LOCALES_DIR";

/// Overrides the directory holding `locales/` and `assets/`.
pub const RESOURCE_DIR_ENV: &str = "TICKETWATCH_RESOURCES";

fn env_dir(name: &str) -> Option<PathBuf> {
    env::var(name)
        .ok()
        .filter(|dir| !dir.trim().is_empty())
        .map(PathBuf::from)
}

/// Returns the platform-specific data directory for ticketwatch.
///
/// - **Linux**: `~/.local/share/ticketwatch` (or `$XDG_DATA_HOME/ticketwatch`)
/// - **macOS**: `~/Library/Application Support/ticketwatch`
/// - **Windows**: `%APPDATA%/ticketwatch`
///
/// `$TICKETWATCH_DATA_DIR` takes precedence on every platform.
pub fn get_data_dir() -> PathBuf {
    if let Some(dir) = env_dir(DATA_DIR_ENV) {
        return dir;
    }
    #[cfg(target_os = "linux")]
    {
        linux::get_data_dir()
    }
    #[cfg(target_os = "macos")]
    {
        macos::get_data_dir()
    }
    #[cfg(target_os = "windows")]
    {
        windows::get_data_dir()
    }
}

/// Full path of the settings database.
pub fn database_path() -> PathBuf {
    get_data_dir().join(DATABASE_FILE)
}

/// Directory containing the bundled `locales/` and `assets/` folders.
///
/// Checks `$TICKETWATCH_RESOURCES`, then the executable's directory, then
/// falls back to the crate root used at build time.
pub fn resource_dir() -> PathBuf {
    if let Some(dir) = env_dir(RESOURCE_DIR_ENV) {
        return dir;
    }
    if let Some(exe_dir) = env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.to_path_buf()))
    {
        if exe_dir.join("locales").is_dir() {
            return exe_dir;
        }
    }
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn locales_dir() -> PathBuf {
    env_dir(LOCALES_DIR_ENV).unwrap_or_else(|| resource_dir().join("locales"))
}

pub fn assets_dir() -> PathBuf {
    resource_dir().join("assets")
}
