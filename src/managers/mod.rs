// ticketwatch state managers
// Managers own the stateful behavior: the monitor cycle, schedule reactions,
// the alert window and the options form.

pub mod alert_window;
pub mod background;
pub mod monitor;
pub mod options;
