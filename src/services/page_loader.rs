//! Background tab lifecycle and in-page counter extraction.

use async_trait::async_trait;
use serde_json::Value;

use tokio::sync::watch;

use crate::types::counters::{Category, ScrapedCounters};
use crate::types::errors::PageError;
use crate::types::tab::{TabId, TabStatus};

/// Nested element inside each category container that holds the count.
pub const VALUE_FIELD_CLASS: &str = "mx-name-text2";

/// Builds the routine run inside the monitored page. It evaluates to an
/// object with one trimmed string (or `null` when the container or field is
/// missing) per category.
pub fn extraction_script() -> String {
    let fields = Category::ALL
        .iter()
        .map(|c| format!("    {}: getValue({:?})", c.as_str(), c.container_class()))
        .collect::<Vec<_>>()
        .join(",\n");
    format!(
        r#"(function () {{
  function getValue(containerClass) {{
    var container = document.querySelector("." + containerClass);
    if (!container) return null;
    var field = container.querySelector({field:?});
    return field ? field.textContent.trim() : null;
  }}
  return {{
{fields}
  }};
}})()"#,
        field = format!(".{}", VALUE_FIELD_CLASS),
        fields = fields,
    )
}

/// Host capability for opening hidden tabs and scraping them.
#[async_trait]
pub trait PageLoader: Send + Sync {
    /// Opens an inactive tab at `url`.
    async fn open_tab(&self, url: &str) -> Result<TabId, PageError>;
    /// Resolves once the tab reports load-complete. No timeout: a tab that
    /// never finishes holds the cycle, and later fires are skipped.
    async fn wait_for_complete(&self, tab: &TabId) -> Result<(), PageError>;
    /// Runs [`extraction_script`] in the tab.
    async fn extract_counters(&self, tab: &TabId) -> Result<ScrapedCounters, PageError>;
    async fn close_tab(&self, tab: &TabId) -> Result<(), PageError>;
}

/// Waits until `status` leaves [`TabStatus::Loading`], however long that takes.
///
/// Fails when the load failed or the host dropped the tab first.
pub async fn wait_until_settled(
    mut status: watch::Receiver<TabStatus>,
    tab: &TabId,
) -> Result<(), PageError> {
    let settled = status
        .wait_for(|s| *s != TabStatus::Loading)
        .await
        .map_err(|_| PageError::TabNotFound(tab.to_string()))?
        .clone();
    match settled {
        TabStatus::Complete => Ok(()),
        TabStatus::Failed(msg) => Err(PageError::LoadFailed(msg)),
        TabStatus::Loading => Err(PageError::LoadFailed("still loading".to_string())),
    }
}

/// Parses the serialized result of [`extraction_script`].
///
/// Accepts the object itself or a JSON string containing it. Non-string
/// field values are stringified so numeric text survives either way.
pub fn parse_extraction_result(raw: &str) -> Result<ScrapedCounters, PageError> {
    let mut value: Value = serde_json::from_str(raw.trim())
        .map_err(|e| PageError::ExtractionFailed(format!("{}: {}", e, raw)))?;

    if let Value::String(inner) = &value {
        value = serde_json::from_str(inner)
            .map_err(|e| PageError::ExtractionFailed(format!("{}: {}", e, inner)))?;
    }

    let Value::Object(map) = value else {
        return Err(PageError::ExtractionFailed(format!(
            "Expected an object, got {}",
            raw
        )));
    };

    let field = |name: &str| -> Option<String> {
        match map.get(name) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.trim().to_string()),
            Some(other) => Some(other.to_string()),
        }
    };

    Ok(ScrapedCounters {
        danger: field("danger"),
        success: field("success"),
        warning: field("warning"),
    })
}
