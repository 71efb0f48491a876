use std::io::{self, Write};
use std::sync::Mutex;

/// Fan-out writer broadcasting one encoded record to every registered target.
///
/// A single mutex serializes the whole fan-out: all I/O for one record
/// completes before another record's I/O may begin, so every target observes
/// the same record order. A failing target is reported on stderr and skipped;
/// the write itself never fails.
pub struct MultiWriter {
    targets: Mutex<Vec<Box<dyn Write + Send>>>,
}

impl MultiWriter {
    pub fn new() -> Self {
        Self {
            targets: Mutex::new(Vec::new()),
        }
    }

    /// Replace the full target list.
    pub fn set_targets(&self, targets: Vec<Box<dyn Write + Send>>) {
        *self.targets.lock().unwrap() = targets;
    }

    /// Append one target to the list.
    pub fn add_target(&self, target: Box<dyn Write + Send>) {
        self.targets.lock().unwrap().push(target);
    }

    pub fn target_count(&self) -> usize {
        self.targets.lock().unwrap().len()
    }

    /// Write `payload` to every target in registration order.
    pub fn write_record(&self, payload: &[u8]) {
        let mut targets = self.targets.lock().unwrap();
        for (index, target) in targets.iter_mut().enumerate() {
            if let Err(err) = target.write_all(payload) {
                eprintln!("failed to write to target {}: {err}", index + 1);
            }
        }
    }
}

impl Default for MultiWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for MultiWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_record(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut targets = self.targets.lock().unwrap();
        for (index, target) in targets.iter_mut().enumerate() {
            if let Err(err) = target.flush() {
                eprintln!("failed to flush target {}: {err}", index + 1);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl SharedSink {
        fn contents(&self) -> Vec<u8> {
            self.0.lock().unwrap().clone()
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

    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("sink is broken"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn delivers_payload_to_every_target() {
        let first = SharedSink::default();
        let second = SharedSink::default();

        let writer = MultiWriter::new();
        writer.set_targets(vec![Box::new(first.clone()), Box::new(second.clone())]);
        writer.write_record(b"{\"msg\":\"hello\"}\n");

        assert_eq!(first.contents(), b"{\"msg\":\"hello\"}\n");
        assert_eq!(second.contents(), b"{\"msg\":\"hello\"}\n");
    }

    #[test]
    fn failing_target_does_not_stop_the_fan_out() {
        let before = SharedSink::default();
        let after = SharedSink::default();

        let writer = MultiWriter::new();
        writer.set_targets(vec![
            Box::new(before.clone()),
            Box::new(FailingSink),
            Box::new(after.clone()),
        ]);
        writer.write_record(b"payload\n");

        assert_eq!(before.contents(), b"payload\n");
        assert_eq!(after.contents(), b"payload\n");
    }

    #[test]
    fn set_targets_replaces_and_add_target_appends() {
        let first = SharedSink::default();
        let second = SharedSink::default();

        let writer = MultiWriter::new();
        writer.set_targets(vec![Box::new(first.clone())]);
        assert_eq!(writer.target_count(), 1);

        writer.add_target(Box::new(second.clone()));
        assert_eq!(writer.target_count(), 2);

        writer.set_targets(vec![Box::new(second.clone())]);
        assert_eq!(writer.target_count(), 1);

        writer.write_record(b"x");
        assert!(first.contents().is_empty());
        assert_eq!(second.contents(), b"x");
    }

    #[test]
    fn records_arrive_in_write_order() {
        let sink = SharedSink::default();
        let writer = MultiWriter::new();
        writer.set_targets(vec![Box::new(sink.clone())]);

        writer.write_record(b"one\n");
        writer.write_record(b"two\n");

        assert_eq!(sink.contents(), b"one\ntwo\n");
    }
}
