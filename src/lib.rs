//! # Pipelog
//!
//! An asynchronous structured logging pipeline with multi-target fan-out,
//! log file rotation and deduplicated logging.
//!
//! ## Features
//!
//! - Leveled logging macros that never block and never fail
//! - Line-delimited JSON records attributed to their call site
//! - Fan-out delivery to console, rotated files and custom sinks
//! - Time-based file rotation with a folder-size cap
//! - Log-once and log-on-change deduplication
//! - Optional push integration with a Loki-style backend (`remote` feature)
//!
//! ## Example
//!
//! ```rust,no_run
//! use pipelog::{LogConfig, RotationConfig};
//!
//! pipelog::configure(
//!     LogConfig::new()
//!         .with_static_field("service", "api")
//!         .with_rotation(RotationConfig::new("logs")),
//! );
//! pipelog::start()?;
//!
//! pipelog::info!("service listening on port {}", 8080);
//! pipelog::log_on_change_warn!("connection state: degraded");
//!
//! pipelog::stop();
//! # Ok::<(), pipelog::Error>(())
//! ```

pub mod config;
pub mod console;
pub mod dedup;
pub mod encoder;
pub mod engine;
pub mod error;
mod macros;
pub mod memory;
#[cfg(feature = "remote")]
pub mod remote;
pub mod report;
pub mod rotation;
pub mod service;
pub mod writer;

use std::io::Write;
use std::sync::RwLock;

use once_cell::sync::Lazy;

pub use config::{DEFAULT_LOG_FOLDER, GIBIBYTE, KIBIBYTE, LogConfig, MEBIBYTE, RotationConfig};
pub use console::styled_output;
pub use error::{Error, Result};
pub use report::{CallerInfo, Level, Report};
pub use rotation::{RotationEngine, RotationPeriod};
pub use service::{CoreService, ServiceStatus};
pub use writer::MultiWriter;

static GLOBAL: Lazy<RwLock<CoreService>> = Lazy::new(|| RwLock::new(CoreService::new()));

/// The process-wide logger handle used by the logging macros.
///
/// Available without explicit construction; tests that need isolation should
/// build their own [`CoreService`] instead of going through this.
pub fn global() -> &'static RwLock<CoreService> {
    &GLOBAL
}

/// Start the global logger service. Returns once the pipeline (and rotation,
/// when configured) is ready to accept reports.
pub fn start() -> Result<()> {
    global().write().unwrap().start()
}

/// Stop the global logger service, draining every buffered report, and
/// replace it with a fresh stopped instance so logging can be configured and
/// started again.
pub fn stop() {
    let mut service = global().write().unwrap();
    service.stop();
    *service = CoreService::new();
}

/// Synchronously drain the global report queue.
pub fn flush() {
    global().read().unwrap().flush();
}

/// Apply a configuration to the global service. Rejected with a stderr
/// diagnostic while the service is running.
pub fn configure(config: LogConfig) {
    if let Err(err) = global().write().unwrap().configure(config) {
        eprintln!("{err}");
    }
}

/// Replace the global write-target list. Rejected with a stderr diagnostic
/// while the service is running.
pub fn set_targets(targets: Vec<Box<dyn Write + Send>>) {
    if let Err(err) = global().write().unwrap().set_targets(targets) {
        eprintln!("{err}");
    }
}

/// Append one write target to the global service. Rejected with a stderr
/// diagnostic while the service is running.
pub fn add_target(target: Box<dyn Write + Send>) {
    if let Err(err) = global().write().unwrap().add_target(target) {
        eprintln!("{err}");
    }
}

// Support functions the logging macros expand to. Not public API.
#[doc(hidden)]
pub mod __private {
    use crate::report::{CallerInfo, Level, Report};
    use crate::{dedup, global};

    pub fn log(level: Level, msg: String, caller: CallerInfo) {
        let service = global().read().unwrap();
        let engine = service.engine();
        match level {
            Level::Trace => {
                if engine.trace_mode() {
                    engine.report(Report::now(level, msg, caller));
                }
            }
            // Fatal and panic records must never sit in a buffer.
            Level::Fatal | Level::Panic => engine.report(Report::now(level, msg, caller)),
            _ => engine.async_report(Report::now(level, msg, caller)),
        }
    }

    pub fn log_once(level: Level, msg: String, caller: CallerInfo) {
        let service = global().read().unwrap();
        let engine = service.engine();
        if dedup::log_once(engine.memory(), &msg, &caller) {
            engine.async_report(Report::now(level, msg, caller));
        }
    }

    pub fn log_on_change(level: Level, msg: String, caller: CallerInfo) {
        let service = global().read().unwrap();
        let engine = service.engine();
        if dedup::log_on_change(engine.memory(), &msg, &caller) {
            engine.async_report(Report::now(level, msg, caller));
        }
    }
}
