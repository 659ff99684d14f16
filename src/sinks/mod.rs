//! Sink implementations

pub mod console;
#[cfg(feature = "database")]
pub mod database_alert;
pub mod rotating_file;

pub use console::ConsoleSink;
#[cfg(feature = "database")]
pub use database_alert::{AlertStore, DatabaseAlertSink, FrequentError, SystemAlert};
pub use rotating_file::{backup_path, RotatingFileSink, RotationPolicy};
