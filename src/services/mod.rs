// ticketwatch services
// Services wrap host capabilities and shared infrastructure: settings storage,
// scheduling, page loading, notifications, sound, power, localization.

pub mod config_cache;
pub mod debounce;
pub mod localization_engine;
pub mod notifier;
pub mod page_loader;
pub mod power;
pub mod scheduler;
pub mod settings_store;
pub mod sound;
