//! ticketwatch: watches a ticket dashboard and pops an alert for every
//! counter increase.
//!
//! With the `gui` feature this starts the desktop host. Without it, prints
//! the stored configuration and the last snapshot.

#[cfg(feature = "gui")]
fn main() {
    if let Err(e) = ticketwatch::ui::webview_app::run() {
        eprintln!("ticketwatch failed to start: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "gui"))]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use ticketwatch::app::init_tracing;
    use ticketwatch::database::connection::Database;
    use ticketwatch::platform;
    use ticketwatch::services::localization_engine::{host_locale, resolve_language};
    use ticketwatch::services::settings_store::{load_config, load_snapshot, SqliteStore};
    use ticketwatch::types::counters::Category;

    init_tracing(false);

    let db_path = platform::database_path();
    let store = SqliteStore::new(Database::open(&db_path)?);
    let config = load_config(&store).await?;
    let snapshot = load_snapshot(&store).await?;

    println!("ticketwatch v{} (headless build)", env!("CARGO_PKG_VERSION"));
    println!("  database:   {}", db_path.display());
    println!("  monitorUrl: {}", config.url().unwrap_or("(not set)"));
    println!("  enabled:    {}", config.enabled);
    println!("  interval:   {} min", config.interval_minutes);
    println!("  keepAwake:  {}", config.keep_awake);
    println!("  sound:      {}", config.sound_enabled);
    println!(
        "  language:   {}",
        resolve_language(config.lang_override.as_deref(), &host_locale())
    );
    for category in Category::ALL {
        let reading = snapshot.get(category);
        match reading.count() {
            Some(n) => println!("  {:<10}  {}", category.as_str(), n),
            None => println!("  {:<10}  unreadable", category.as_str()),
        }
    }
    println!();
    println!("Monitoring needs a webview host; rebuild with the `gui` feature.");
    Ok(())
}
