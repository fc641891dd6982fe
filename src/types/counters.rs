use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The three ticket categories shown on the dashboard.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Danger,
    Success,
    Warning,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Danger, Category::Success, Category::Warning];

    /// Lowercase name, used as the storage key and the alert `type` parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Danger => "danger",
            Category::Success => "success",
            Category::Warning => "warning",
        }
    }

    /// Case-insensitive parse of a category name.
    pub fn parse(name: &str) -> Option<Category> {
        match name.trim().to_ascii_lowercase().as_str() {
            "danger" => Some(Category::Danger),
            "success" => Some(Category::Success),
            "warning" => Some(Category::Warning),
            _ => None,
        }
    }

    /// CSS class of the dashboard container holding this counter.
    pub fn container_class(&self) -> &'static str {
        match self {
            Category::Danger => "danger-ticket",
            Category::Success => "success-ticket",
            Category::Warning => "warning-ticket",
        }
    }

    /// Bundled sound asset, relative to the assets directory.
    pub fn sound_file(&self) -> &'static str {
        match self {
            Category::Danger => "sounds/new-trouble-ticket.wav",
            Category::Success => "sounds/new-smart-hands.wav",
            Category::Warning => "sounds/new-cross-connect.wav",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Category::Danger => "#E60028",
            Category::Success => "#28A745",
            Category::Warning => "#FFD33D",
        }
    }

    /// Untranslated window title passed along with the alert.
    pub fn default_title(&self) -> &'static str {
        match self {
            Category::Danger => "🚨 New Trouble Ticket",
            Category::Success => "✅ New Smart Hands",
            Category::Warning => "⚠️ New Cross Connect",
        }
    }
}

/// One counter value as scraped or stored.
///
/// `Unreadable` stands for a missing container or non-numeric text. It never
/// compares greater than anything, so it can never trigger an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reading {
    Count(u64),
    Unreadable,
}

impl Default for Reading {
    fn default() -> Self {
        Reading::Count(0)
    }
}

impl Reading {
    /// Converts the trimmed text scraped from the page.
    ///
    /// An empty string is zero. Decimal, exponent and `0x`/`0o`/`0b` forms
    /// are accepted when they denote a whole non-negative number. Fractions,
    /// negatives and `Infinity` are unreadable, since a ticket count is none
    /// of those.
    pub fn from_scraped(text: Option<&str>) -> Reading {
        let Some(text) = text else {
            return Reading::Unreadable;
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Reading::Count(0);
        }
        if let Ok(n) = trimmed.parse::<u64>() {
            return Reading::Count(n);
        }
        if let Some(n) = parse_prefixed(trimmed) {
            return Reading::Count(n);
        }
        match trimmed.parse::<f64>() {
            Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => {
                Reading::Count(f as u64)
            }
            _ => Reading::Unreadable,
        }
    }

    /// Converts a stored JSON value. `null` is an unreadable reading.
    pub fn from_value(value: &Value) -> Reading {
        if let Some(n) = value.as_u64() {
            return Reading::Count(n);
        }
        match value.as_f64() {
            Some(f) if f.is_finite() && f >= 0.0 => Reading::Count(f as u64),
            _ => Reading::Unreadable,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Reading::Count(n) => Value::from(*n),
            Reading::Unreadable => Value::Null,
        }
    }

    pub fn count(&self) -> Option<u64> {
        match self {
            Reading::Count(n) => Some(*n),
            Reading::Unreadable => None,
        }
    }

    /// True when `self` is strictly greater than the `stored` reading.
    ///
    /// A stored unreadable value counts as zero, the way a stored `null`
    /// coerces in a numeric comparison.
    pub fn is_increase_over(&self, stored: &Reading) -> bool {
        match (self, stored) {
            (Reading::Unreadable, _) => false,
            (Reading::Count(new), Reading::Count(old)) => new > old,
            (Reading::Count(new), Reading::Unreadable) => *new > 0,
        }
    }
}

/// Unsigned `0x`, `0o` or `0b` literal.
fn parse_prefixed(text: &str) -> Option<u64> {
    let radix = match text.get(..2)? {
        "0x" | "0X" => 16,
        "0o" | "0O" => 8,
        "0b" | "0B" => 2,
        _ => return None,
    };
    let digits = &text[2..];
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    u64::from_str_radix(digits, radix).ok()
}

/// Last observed values for the three categories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub danger: Reading,
    pub success: Reading,
    pub warning: Reading,
}

impl CounterSnapshot {
    pub fn new(danger: Reading, success: Reading, warning: Reading) -> Self {
        Self {
            danger,
            success,
            warning,
        }
    }

    /// Snapshot with three plain counts.
    pub fn counts(danger: u64, success: u64, warning: u64) -> Self {
        Self::new(
            Reading::Count(danger),
            Reading::Count(success),
            Reading::Count(warning),
        )
    }

    pub fn get(&self, category: Category) -> Reading {
        match category {
            Category::Danger => self.danger,
            Category::Success => self.success,
            Category::Warning => self.warning,
        }
    }

    pub fn set(&mut self, category: Category, reading: Reading) {
        match category {
            Category::Danger => self.danger = reading,
            Category::Success => self.success = reading,
            Category::Warning => self.warning = reading,
        }
    }
}

/// Raw result of the in-page extraction routine: trimmed text or `null`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScrapedCounters {
    pub danger: Option<String>,
    pub success: Option<String>,
    pub warning: Option<String>,
}

impl ScrapedCounters {
    pub fn to_snapshot(&self) -> CounterSnapshot {
        CounterSnapshot::new(
            Reading::from_scraped(self.danger.as_deref()),
            Reading::from_scraped(self.success.as_deref()),
            Reading::from_scraped(self.warning.as_deref()),
        )
    }
}

/// A single counter increase that should pop an alert window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEvent {
    pub category: Category,
    pub new_value: u64,
    pub sound_file: String,
}

impl AlertEvent {
    pub fn new(category: Category, new_value: u64) -> Self {
        Self {
            category,
            new_value,
            sound_file: category.sound_file().to_string(),
        }
    }
}
