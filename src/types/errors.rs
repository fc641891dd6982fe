use std::fmt;

// === StoreError ===

/// Errors related to the persisted settings store.
#[derive(Debug)]
pub enum StoreError {
    /// Database operation failed.
    DatabaseError(String),
    /// Failed to serialize or deserialize a stored value.
    SerializationError(String),
    /// The provided settings key is not known.
    InvalidKey(String),
    /// The provided settings value is invalid for its key.
    InvalidValue(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::DatabaseError(msg) => write!(f, "Settings database error: {}", msg),
            StoreError::SerializationError(msg) => {
                write!(f, "Settings serialization error: {}", msg)
            }
            StoreError::InvalidKey(key) => write!(f, "Invalid settings key: {}", key),
            StoreError::InvalidValue(msg) => write!(f, "Invalid settings value: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

// === PageError ===

/// Errors raised while loading the monitored page or scraping it.
#[derive(Debug)]
pub enum PageError {
    /// The host could not open a background tab.
    OpenFailed(String),
    /// The page reported a load failure.
    LoadFailed(String),
    /// The tab with the given ID no longer exists.
    TabNotFound(String),
    /// Injecting or running the extraction routine failed.
    InjectionFailed(String),
    /// The extraction routine returned something unparseable.
    ExtractionFailed(String),
    /// The host runtime (event loop) is gone.
    HostUnavailable,
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageError::OpenFailed(msg) => write!(f, "Failed to open tab: {}", msg),
            PageError::LoadFailed(msg) => write!(f, "Page load failed: {}", msg),
            PageError::TabNotFound(id) => write!(f, "Tab not found: {}", id),
            PageError::InjectionFailed(msg) => write!(f, "Script injection failed: {}", msg),
            PageError::ExtractionFailed(msg) => write!(f, "Data extraction failed: {}", msg),
            PageError::HostUnavailable => write!(f, "Browser host is not running"),
        }
    }
}

impl std::error::Error for PageError {}

// === MonitorError ===

/// Errors that abort a monitor cycle.
#[derive(Debug)]
pub enum MonitorError {
    /// Loading or scraping the page failed.
    Page(PageError),
    /// Reading or writing the snapshot failed.
    Store(StoreError),
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorError::Page(e) => write!(f, "{}", e),
            MonitorError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for MonitorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MonitorError::Page(e) => Some(e),
            MonitorError::Store(e) => Some(e),
        }
    }
}

impl From<PageError> for MonitorError {
    fn from(e: PageError) -> Self {
        MonitorError::Page(e)
    }
}

impl From<StoreError> for MonitorError {
    fn from(e: StoreError) -> Self {
        MonitorError::Store(e)
    }
}

// === NotifyError ===

/// Errors related to system notifications and alert windows.
#[derive(Debug)]
pub enum NotifyError {
    /// The notification backend rejected or failed to show the notification.
    DeliveryFailed(String),
    /// The alert window could not be created.
    WindowFailed(String),
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyError::DeliveryFailed(msg) => {
                write!(f, "Notification delivery failed: {}", msg)
            }
            NotifyError::WindowFailed(msg) => write!(f, "Alert window failed: {}", msg),
        }
    }
}

impl std::error::Error for NotifyError {}

// === PlaybackError ===

/// Errors related to alert sound playback.
#[derive(Debug)]
pub enum PlaybackError {
    /// No audio output device is available.
    NoOutputDevice(String),
    /// The sound file could not be opened.
    FileNotFound(String),
    /// The sound file could not be decoded.
    DecodeFailed(String),
    /// The requested sound is not one of the bundled alert sounds.
    UnknownSound(String),
}

impl fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackError::NoOutputDevice(msg) => write!(f, "No audio output: {}", msg),
            PlaybackError::FileNotFound(path) => write!(f, "Sound file not found: {}", path),
            PlaybackError::DecodeFailed(msg) => write!(f, "Sound decode failed: {}", msg),
            PlaybackError::UnknownSound(name) => write!(f, "Unknown alert sound: {}", name),
        }
    }
}

impl std::error::Error for PlaybackError {}

// === PowerError ===

/// Errors related to the keep-awake power request.
#[derive(Debug)]
pub enum PowerError {
    /// Keep-awake is not supported on this platform.
    Unsupported,
    /// The platform inhibitor could not be started or stopped.
    InhibitFailed(String),
}

impl fmt::Display for PowerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerError::Unsupported => write!(f, "Keep-awake is not supported on this platform"),
            PowerError::InhibitFailed(msg) => write!(f, "Keep-awake inhibitor failed: {}", msg),
        }
    }
}

impl std::error::Error for PowerError {}

// === LocaleError ===

/// Errors related to localization engine operations.
#[derive(Debug)]
pub enum LocaleError {
    /// The requested locale is not supported.
    UnsupportedLocale(String),
    /// The locale file was not found.
    FileNotFound(String),
    /// The locale file is not valid JSON.
    ParseError(String),
}

impl fmt::Display for LocaleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocaleError::UnsupportedLocale(locale) => {
                write!(f, "Unsupported locale: {}", locale)
            }
            LocaleError::FileNotFound(path) => write!(f, "Locale file not found: {}", path),
            LocaleError::ParseError(msg) => write!(f, "Locale parse error: {}", msg),
        }
    }
}

impl std::error::Error for LocaleError {}
