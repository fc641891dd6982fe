//! ticketwatch RPC server: JSON-RPC over stdin/stdout for scripting and
//! external settings front-ends.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! Request:  {"id":1, "method":"settings.set", "params":{"key":"monitorUrl","value":"..."}}
//! Response: {"id":1, "result":{...}} or {"id":1, "error":"..."}

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

use ticketwatch::app::init_tracing;
use ticketwatch::database::connection::Database;
use ticketwatch::platform;
use ticketwatch::rpc_handler::{handle_method, RpcContext};
use ticketwatch::services::localization_engine::{LocalizationEngine, LocalizationEngineTrait};
use ticketwatch::services::settings_store::SqliteStore;

/// Simple rate limiter: max requests per second.
struct RateLimiter {
    window_start: Instant,
    request_count: u32,
    max_per_second: u32,
}

impl RateLimiter {
    fn new(max_per_second: u32) -> Self {
        Self { window_start: Instant::now(), request_count: 0, max_per_second }
    }

    /// Returns true if the request is allowed, false if rate-limited.
    fn check(&mut self) -> bool {
        if self.window_start.elapsed().as_secs() >= 1 {
            self.window_start = Instant::now();
            self.request_count = 0;
        }
        self.request_count += 1;
        self.request_count <= self.max_per_second
    }
}

async fn send(stdout: &mut io::Stdout, frame: Value) -> io::Result<()> {
    let mut line = frame.to_string();
    line.push('\n');
    stdout.write_all(line.as_bytes()).await?;
    stdout.flush().await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(true);

    let db_path = platform::database_path();
    let db = Database::open(&db_path)?;
    let mut i18n = LocalizationEngine::with_default_path();
    if let Err(e) = i18n.initialize() {
        tracing::warn!(error = %e, "Translations unavailable");
    }
    i18n.activate(None);
    let ctx = RpcContext::new(Arc::new(SqliteStore::new(db)), i18n);
    tracing::info!(db = %db_path.display(), "RPC server ready");

    let mut stdout = io::stdout();
    send(&mut stdout, json!({"event": "ready", "version": env!("CARGO_PKG_VERSION")})).await?;

    let mut rate_limiter = RateLimiter::new(200);
    let mut lines = BufReader::new(io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let req: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                send(&mut stdout, json!({"id": null, "error": format!("parse error: {}", e)})).await?;
                continue;
            }
        };

        let id = req.get("id").cloned().unwrap_or(Value::Null);

        if !rate_limiter.check() {
            tracing::warn!("RPC rate limit exceeded");
            send(&mut stdout, json!({"id": id, "error": "rate limit exceeded"})).await?;
            continue;
        }

        let method = req.get("method").and_then(|v| v.as_str()).unwrap_or("");
        let params = req.get("params").cloned().unwrap_or(json!({}));
        tracing::debug!(method, "RPC call");

        let response = match handle_method(&ctx, method, &params).await {
            Ok(val) => json!({"id": id, "result": val}),
            Err(err) => json!({"id": id, "error": err}),
        };
        send(&mut stdout, response).await?;
    }

    tracing::info!("stdin closed, RPC server exiting");
    Ok(())
}
