//! Lifecycle wrapper composing the log engine and the rotation engine
//! behind start/stop.

use std::io::Write;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, bounded};

use crate::config::{LogConfig, RotationConfig};
use crate::engine::LogEngine;
use crate::error::{Error, Result};
use crate::rotation::{RotationEngine, RotationService, RotationWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceStatus {
    #[default]
    Stopped,
    Running,
}

/// A logging service instance: the report pipeline, its worker thread and
/// the optional rotation service.
///
/// The lifecycle is one-way: once stopped after running, an instance cannot
/// be restarted; build a fresh one (the global [`crate::stop`] does this
/// automatically).
pub struct CoreService {
    engine: Arc<LogEngine>,
    rotation_config: Option<RotationConfig>,
    rotation: Option<RotationService>,
    worker: Option<JoinHandle<()>>,
    shutdown: Option<Sender<()>>,
    status: ServiceStatus,
}

impl CoreService {
    pub fn new() -> Self {
        Self {
            engine: Arc::new(LogEngine::new()),
            rotation_config: None,
            rotation: None,
            worker: None,
            shutdown: None,
            status: ServiceStatus::Stopped,
        }
    }

    pub fn engine(&self) -> &LogEngine {
        &self.engine
    }

    pub fn status(&self) -> ServiceStatus {
        self.status
    }

    /// Apply a configuration. Rejected while the service is running.
    pub fn configure(&mut self, config: LogConfig) -> Result<()> {
        self.reject_while_running("configure")?;

        self.engine.set_queue_size(config.queue_size);
        self.engine.set_trace_mode(config.trace_mode);
        self.engine.set_static_fields(config.static_fields);
        self.rotation_config = config.rotation;
        Ok(())
    }

    /// Replace the full write-target list. Rejected while running.
    pub fn set_targets(&mut self, targets: Vec<Box<dyn Write + Send>>) -> Result<()> {
        self.reject_while_running("set targets")?;
        self.engine.writer().set_targets(targets);
        Ok(())
    }

    /// Append one write target. Rejected while running.
    pub fn add_target(&mut self, target: Box<dyn Write + Send>) -> Result<()> {
        self.reject_while_running("add target")?;
        self.engine.writer().add_target(target);
        Ok(())
    }

    fn reject_while_running(&self, what: &str) -> Result<()> {
        if self.status == ServiceStatus::Running {
            return Err(Error::Config(format!(
                "logger service is running, cannot {what}"
            )));
        }
        Ok(())
    }

    /// Start the rotation service (if configured) and the engine worker.
    ///
    /// Returns once everything is ready to accept reports; rotation setup
    /// errors abort the start.
    pub fn start(&mut self) -> Result<()> {
        if self.status == ServiceStatus::Running {
            return Err(Error::Init("logger service is already running".to_string()));
        }
        if self.engine.is_closed() {
            return Err(Error::Init(
                "logger service was stopped, create a fresh instance".to_string(),
            ));
        }

        tracing::info!("logger service starting");

        if let Some(config) = &self.rotation_config {
            let engine = Arc::new(RotationEngine::new(
                config.folder.clone(),
                config.max_folder_size,
                config.period,
            ));
            let service = RotationService::start(Arc::clone(&engine))?;
            self.engine
                .writer()
                .add_target(Box::new(RotationWriter::new(engine)));
            self.rotation = Some(service);
        }

        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let engine = Arc::clone(&self.engine);
        let worker = thread::Builder::new()
            .name("pipelog-engine".to_string())
            .spawn(move || engine.handle_reports(shutdown_rx))
            .map_err(Error::Io)?;

        self.shutdown = Some(shutdown_tx);
        self.worker = Some(worker);
        self.status = ServiceStatus::Running;
        Ok(())
    }

    /// Signal cancellation, wait for the worker to exit, drain whatever is
    /// still queued, then release rotation resources.
    ///
    /// Synchronous: no buffered report is lost once this returns.
    pub fn stop(&mut self) {
        if self.status != ServiceStatus::Running {
            return;
        }

        tracing::info!("logger service stopping");

        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.engine.flush_reports();

        if let Some(rotation) = self.rotation.take() {
            rotation.stop();
        }

        self.status = ServiceStatus::Stopped;
        tracing::info!("all reports processed, logger service stopped");
    }

    pub fn flush(&self) {
        self.engine.flush_reports();
    }
}

impl Default for CoreService {
    fn default() -> Self {
        Self::new()
    }
}
