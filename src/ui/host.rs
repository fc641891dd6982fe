//! Bridge between the async monitor and the window event loop.
//!
//! `GuiHost` is handed to the app as its page loader and alert presenter.
//! Every request becomes a [`UserEvent`] for the event loop thread, which
//! owns all windows and webviews; replies come back over channels.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tao::event_loop::EventLoopProxy;
use tokio::sync::{oneshot, watch};

use crate::managers::alert_window::AlertParams;
use crate::managers::monitor::AlertPresenter;
use crate::services::page_loader::{parse_extraction_result, wait_until_settled, PageLoader};
use crate::types::counters::{AlertEvent, ScrapedCounters};
use crate::types::errors::{NotifyError, PageError};
use crate::types::tab::{TabId, TabStatus};

/// Longest wait for the extraction routine to answer.
pub const EXTRACT_TIMEOUT: Duration = Duration::from_secs(30);

pub type ScriptReply = oneshot::Sender<Result<String, PageError>>;

pub enum UserEvent {
    OpenHiddenTab {
        tab: TabId,
        url: String,
        status: Arc<watch::Sender<TabStatus>>,
    },
    ExtractCounters {
        tab: TabId,
        reply: ScriptReply,
    },
    CloseTab(TabId),
    /// Alert popup for a locator built by [`AlertParams::to_locator`].
    OpenAlert(String),
    OpenOptions,
    EvalInOptions(String),
    ReloadOptions,
    Quit,
}

pub struct GuiHost {
    proxy: Mutex<EventLoopProxy<UserEvent>>,
    tabs: Mutex<HashMap<TabId, Arc<watch::Sender<TabStatus>>>>,
}

impl GuiHost {
    pub fn new(proxy: EventLoopProxy<UserEvent>) -> Self {
        Self {
            proxy: Mutex::new(proxy),
            tabs: Mutex::new(HashMap::new()),
        }
    }

    /// Queues an event for the event loop. Fails once the loop has exited.
    pub fn send(&self, event: UserEvent) -> bool {
        let proxy = match self.proxy.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        proxy.send_event(event).is_ok()
    }

    fn tabs(&self) -> std::sync::MutexGuard<'_, HashMap<TabId, Arc<watch::Sender<TabStatus>>>> {
        match self.tabs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl PageLoader for GuiHost {
    async fn open_tab(&self, url: &str) -> Result<TabId, PageError> {
        let tab = TabId::new();
        let (status, _) = watch::channel(TabStatus::Loading);
        let status = Arc::new(status);
        self.tabs().insert(tab.clone(), status.clone());

        let event = UserEvent::OpenHiddenTab {
            tab: tab.clone(),
            url: url.to_string(),
            status,
        };
        if !self.send(event) {
            self.tabs().remove(&tab);
            return Err(PageError::HostUnavailable);
        }
        Ok(tab)
    }

    async fn wait_for_complete(&self, tab: &TabId) -> Result<(), PageError> {
        let status = self
            .tabs()
            .get(tab)
            .map(|sender| sender.subscribe())
            .ok_or_else(|| PageError::TabNotFound(tab.to_string()))?;
        wait_until_settled(status, tab).await
    }

    async fn extract_counters(&self, tab: &TabId) -> Result<ScrapedCounters, PageError> {
        let (reply, rx) = oneshot::channel();
        if !self.send(UserEvent::ExtractCounters { tab: tab.clone(), reply }) {
            return Err(PageError::HostUnavailable);
        }
        let raw = tokio::time::timeout(EXTRACT_TIMEOUT, rx)
            .await
            .map_err(|_| PageError::InjectionFailed("extraction timed out".to_string()))?
            .map_err(|_| PageError::HostUnavailable)??;
        parse_extraction_result(&raw)
    }

    async fn close_tab(&self, tab: &TabId) -> Result<(), PageError> {
        if self.tabs().remove(tab).is_none() {
            return Err(PageError::TabNotFound(tab.to_string()));
        }
        if !self.send(UserEvent::CloseTab(tab.clone())) {
            return Err(PageError::HostUnavailable);
        }
        Ok(())
    }
}

impl AlertPresenter for GuiHost {
    fn spawn_alert(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        let locator = AlertParams::from_event(event).to_locator();
        if self.send(UserEvent::OpenAlert(locator)) {
            Ok(())
        } else {
            Err(NotifyError::WindowFailed("event loop is not running".to_string()))
        }
    }
}
