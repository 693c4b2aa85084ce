//! Keep writing or lose it: session core and terminal host.

pub mod app;
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod document;
pub mod error;
pub mod history;
pub mod logging;
pub mod notify;
pub mod penalty;
pub mod recorder;
pub mod runtime;
pub mod session;
pub mod stats;
pub mod timers;
pub mod ui;
pub mod watchdog;
pub mod words;
