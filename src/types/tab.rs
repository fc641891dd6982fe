use std::fmt;

use uuid::Uuid;

/// Identifier of a hidden background tab opened for one monitor cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TabId(String);

impl TabId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TabId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for TabId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Load state reported by the host for a background tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabStatus {
    Loading,
    Complete,
    Failed(String),
}
