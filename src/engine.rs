//! The asynchronous report pipeline: a bounded queue fed by the logging
//! macros, drained by a single background worker into the fan-out writer.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded, select};

use crate::encoder::LogEncoder;
use crate::memory::RecordMemory;
use crate::report::Report;
use crate::writer::MultiWriter;

/// Default capacity of the report queue.
pub const DEFAULT_QUEUE_SIZE: usize = 100;

/// How long an enqueue may wait for space before the report is dropped.
/// Logging must never create backpressure on the caller.
const ENQUEUE_TIMEOUT: Duration = Duration::from_millis(1);

/// Accepts [`Report`] values, queues them and drains them into the
/// [`MultiWriter`] either synchronously, via the background worker, or via a
/// final flush.
///
/// No operation here ever returns an error to the application: full queue,
/// closed engine and sink failures are absorbed internally.
pub struct LogEngine {
    queue: RwLock<(Sender<Report>, Receiver<Report>)>,
    closed: AtomicBool,
    encoder: Mutex<LogEncoder>,
    memory: RecordMemory,
    writer: MultiWriter,
    static_fields: RwLock<HashMap<String, String>>,
    trace_mode: AtomicBool,
}

impl LogEngine {
    pub fn new() -> Self {
        Self::with_queue_size(DEFAULT_QUEUE_SIZE)
    }

    pub fn with_queue_size(size: usize) -> Self {
        let writer = MultiWriter::new();
        writer.add_target(Box::new(io::stdout()));

        Self {
            queue: RwLock::new(bounded(size)),
            closed: AtomicBool::new(false),
            encoder: Mutex::new(LogEncoder::new()),
            memory: RecordMemory::new(),
            writer,
            static_fields: RwLock::new(HashMap::new()),
            trace_mode: AtomicBool::new(false),
        }
    }

    pub fn memory(&self) -> &RecordMemory {
        &self.memory
    }

    pub fn writer(&self) -> &MultiWriter {
        &self.writer
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Replace the report queue. Intended only for a stopped engine; queued
    /// reports in the old channel are discarded.
    pub fn set_queue_size(&self, size: usize) {
        *self.queue.write().unwrap() = bounded(size);
    }

    /// Replace the static fields merged into every record. Intended only for
    /// a stopped engine.
    pub fn set_static_fields(&self, fields: HashMap<String, String>) {
        *self.static_fields.write().unwrap() = fields;
    }

    pub fn set_trace_mode(&self, mode: bool) {
        self.trace_mode.store(mode, Ordering::Release);
    }

    pub fn trace_mode(&self) -> bool {
        self.trace_mode.load(Ordering::Acquire)
    }

    /// Non-blocking best-effort enqueue.
    ///
    /// Waits up to [`ENQUEUE_TIMEOUT`] for space when the queue is full;
    /// after that, or when the engine is already closed, the report is
    /// silently dropped.
    pub fn async_report(&self, report: Report) {
        if self.is_closed() {
            return;
        }
        let sender = self.queue.read().unwrap().0.clone();
        let _ = sender.send_timeout(report, ENQUEUE_TIMEOUT);
    }

    /// Synchronous delivery: serialize and fan out under the report lock,
    /// blocking until every target has been written.
    pub fn report(&self, report: Report) {
        let mut encoder = self.encoder.lock().unwrap();

        {
            let fields = self.static_fields.read().unwrap();
            for (key, value) in fields.iter() {
                encoder.add_fields(&[key.as_str(), value.as_str()]);
            }
        }

        let line = report.caller.line.to_string();
        encoder.add_fields(&[
            "time",
            &report.time,
            "level",
            report.level.as_str(),
            "msg",
            &report.msg,
            "file",
            report.caller.file_name(),
            "package",
            report.caller.package,
            "function",
            report.caller.function,
            "line",
            &line,
        ]);

        self.writer.write_record(&encoder.compile());
    }

    /// Drain every currently queued report in FIFO order.
    ///
    /// Best-effort, not a barrier: reports enqueued concurrently may or may
    /// not be picked up by the same pass.
    pub fn flush_reports(&self) {
        let receiver = self.queue.read().unwrap().1.clone();
        while let Ok(report) = receiver.try_recv() {
            self.report(report);
        }
    }

    /// The worker loop: blocks on the next report or on cancellation, in
    /// which case the engine marks itself closed and returns. The sole
    /// consumer of the queue after start.
    pub fn handle_reports(&self, shutdown: Receiver<()>) {
        let reports = self.queue.read().unwrap().1.clone();
        loop {
            select! {
                recv(shutdown) -> _ => {
                    self.closed.store(true, Ordering::Release);
                    tracing::debug!("log engine stopped by shutdown signal");
                    return;
                }
                recv(reports) -> report => {
                    if let Ok(report) = report {
                        self.report(report);
                    }
                }
            }
        }
    }
}

impl Default for LogEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{CallerInfo, Level};
    use std::io::Write;
    use std::sync::Arc;
    use std::thread;

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl SharedSink {
        fn string(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn test_report() -> Report {
        Report {
            time: "2024-01-01T00:00:00Z".to_string(),
            level: Level::Info,
            msg: "Hello World".to_string(),
            caller: CallerInfo::new("src/main.rs", "main", "main", 10),
        }
    }

    fn engine_with_sink() -> (LogEngine, SharedSink) {
        let sink = SharedSink::default();
        let engine = LogEngine::new();
        engine.writer().set_targets(vec![Box::new(sink.clone())]);
        (engine, sink)
    }

    #[test]
    fn async_report_then_flush_emits_the_exact_line() {
        let (engine, sink) = engine_with_sink();

        engine.async_report(test_report());
        engine.flush_reports();

        assert_eq!(
            sink.string(),
            "{\"time\":\"2024-01-01T00:00:00Z\",\"level\":\"INFO\",\"msg\":\"Hello World\",\
             \"file\":\"main.rs\",\"package\":\"main\",\"function\":\"main\",\"line\":\"10\"}\n"
        );
    }

    #[test]
    fn static_fields_prefix_the_fixed_keys() {
        let (engine, sink) = engine_with_sink();
        engine.set_static_fields(HashMap::from([(
            "hello".to_string(),
            "world".to_string(),
        )]));

        engine.report(test_report());

        assert_eq!(
            sink.string(),
            "{\"hello\":\"world\",\"time\":\"2024-01-01T00:00:00Z\",\"level\":\"INFO\",\
             \"msg\":\"Hello World\",\"file\":\"main.rs\",\"package\":\"main\",\
             \"function\":\"main\",\"line\":\"10\"}\n"
        );
    }

    #[test]
    fn flush_drains_in_fifo_order() {
        let (engine, sink) = engine_with_sink();

        for i in 0..5 {
            let mut report = test_report();
            report.msg = format!("msg {i}");
            engine.async_report(report);
        }
        engine.flush_reports();

        let output = sink.string();
        let positions: Vec<_> = (0..5)
            .map(|i| output.find(&format!("msg {i}")).expect("all drained"))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let sink = SharedSink::default();
        let engine = LogEngine::with_queue_size(2);
        engine.writer().set_targets(vec![Box::new(sink.clone())]);

        for _ in 0..10 {
            engine.async_report(test_report());
        }
        engine.flush_reports();

        let lines = sink.string().lines().count();
        assert_eq!(lines, 2, "only the queue capacity is retained");
    }

    #[test]
    fn closed_engine_drops_reports() {
        let (engine, sink) = engine_with_sink();
        let engine = Arc::new(engine);

        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let worker_engine = Arc::clone(&engine);
        let worker = thread::spawn(move || worker_engine.handle_reports(shutdown_rx));

        shutdown_tx.send(()).unwrap();
        worker.join().unwrap();
        assert!(engine.is_closed());

        engine.async_report(test_report());
        engine.flush_reports();
        assert_eq!(sink.string(), "");
    }

    #[test]
    fn worker_processes_reports_until_shutdown() {
        let (engine, sink) = engine_with_sink();
        let engine = Arc::new(engine);

        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let worker_engine = Arc::clone(&engine);
        let worker = thread::spawn(move || worker_engine.handle_reports(shutdown_rx));

        for _ in 0..3 {
            engine.async_report(test_report());
        }

        // Wait for the worker to drain the queue.
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while sink.string().lines().count() < 3 {
            assert!(std::time::Instant::now() < deadline, "worker did not drain");
            thread::sleep(Duration::from_millis(5));
        }

        shutdown_tx.send(()).unwrap();
        worker.join().unwrap();
        assert_eq!(sink.string().lines().count(), 3);
    }

    #[test]
    fn trace_mode_flag_round_trips() {
        let engine = LogEngine::new();
        assert!(!engine.trace_mode());
        engine.set_trace_mode(true);
        assert!(engine.trace_mode());
    }

    #[test]
    fn set_queue_size_replaces_the_channel() {
        let (engine, sink) = engine_with_sink();
        engine.async_report(test_report());
        engine.set_queue_size(50);
        engine.flush_reports();
        assert_eq!(sink.string(), "", "old queue contents are discarded");
    }
}
