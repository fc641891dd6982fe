// ticketwatch data path for Linux
// Data: ~/.local/share/ticketwatch

use std::env;
use std::path::PathBuf;

/// Uses `$XDG_DATA_HOME/ticketwatch` if set, otherwise `~/.local/share/ticketwatch`.
pub fn get_data_dir() -> PathBuf {
    match env::var("XDG_DATA_HOME") {
        Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg).join("ticketwatch"),
        _ => {
            let home = env::var("HOME").unwrap_or_else(|_| String::from("/tmp"));
            PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("ticketwatch")
        }
    }
}
