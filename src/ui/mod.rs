//! ticketwatch desktop host.
//!
//! Uses `wry` for WebView rendering:
//! - Windows: WebView2
//! - Linux: WebKitGTK
//! - macOS: WKWebView
//!
//! Hidden windows load the monitored dashboard; alert popups and the
//! options page are HTML served from the bundled templates.

pub mod host;
pub mod webview_app;
