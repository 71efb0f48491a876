use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use pipelog::{CoreService, LogConfig, RotationConfig};

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

/// Exercises the global handle and the macro surface end to end. Kept as a
/// single test because the global logger is process-wide state.
#[test]
fn global_macro_pipeline() {
    let sink = SharedSink::default();
    pipelog::configure(LogConfig::new().with_static_field("service", "test"));
    pipelog::set_targets(vec![Box::new(sink.clone())]);
    pipelog::start().expect("start global service");

    pipelog::info!("hello {}", "world");
    pipelog::warn!("watch out");

    // Only the first of these three identical-site calls may emit.
    for _ in 0..3 {
        pipelog::log_once_info!("boot complete");
    }

    // Emits twice: the initial message and the changed one.
    pipelog::log_on_change_warn!("state: idle");
    pipelog::log_on_change_warn!("state: idle");
    pipelog::log_on_change_warn!("state: busy");

    pipelog::stop();

    let output = sink.string();
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 5, "unexpected output: {output}");

    let hello = lines
        .iter()
        .find(|l| l.contains("\"msg\":\"hello world\""))
        .expect("info line present");
    assert!(hello.contains("\"service\":\"test\""));
    assert!(hello.contains("\"level\":\"INFO\""));
    assert!(hello.contains("\"file\":\"pipeline_tests.rs\""));
    assert!(hello.contains("global_macro_pipeline"));

    assert_eq!(
        lines.iter().filter(|l| l.contains("boot complete")).count(),
        1
    );
    assert_eq!(
        lines.iter().filter(|l| l.contains("state: idle")).count(),
        1
    );
    assert_eq!(
        lines.iter().filter(|l| l.contains("state: busy")).count(),
        1
    );
}

#[test]
fn reports_survive_stop_and_reach_the_rotation_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let sink = SharedSink::default();

    let mut service = CoreService::new();
    service
        .set_targets(vec![Box::new(sink.clone())])
        .expect("set targets");
    service
        .configure(LogConfig::new().with_rotation(RotationConfig::new(dir.path())))
        .expect("configure");
    service.start().expect("start");

    const N: usize = 20;
    for i in 0..N {
        service.engine().async_report(pipelog::Report::now(
            pipelog::Level::Info,
            format!("record {i}"),
            pipelog::CallerInfo::new("tests.rs", "tests", "run", 1),
        ));
    }
    service.stop();

    assert_eq!(sink.string().lines().count(), N);

    let mut file_lines = 0;
    for entry in std::fs::read_dir(dir.path()).expect("read dir") {
        let content = std::fs::read_to_string(entry.expect("entry").path()).expect("read file");
        file_lines += content.lines().filter(|l| l.contains("record ")).count();
    }
    assert_eq!(file_lines, N, "every record reaches the rotation file");
}

#[test]
fn emitted_lines_are_valid_json_with_fixed_keys() {
    let sink = SharedSink::default();

    let mut service = CoreService::new();
    service
        .set_targets(vec![Box::new(sink.clone())])
        .expect("set targets");
    service.start().expect("start");

    service.engine().async_report(pipelog::Report {
        time: "2024-01-01T00:00:00Z".to_string(),
        level: pipelog::Level::Info,
        msg: "Hello World".to_string(),
        caller: pipelog::CallerInfo::new("src/main.rs", "main", "main", 10),
    });
    service.stop();

    assert_eq!(
        sink.string(),
        "{\"time\":\"2024-01-01T00:00:00Z\",\"level\":\"INFO\",\"msg\":\"Hello World\",\
         \"file\":\"main.rs\",\"package\":\"main\",\"function\":\"main\",\"line\":\"10\"}\n"
    );

    let parsed: serde_json::Value = serde_json::from_str(sink.string().trim()).expect("valid JSON");
    assert_eq!(parsed["level"], "INFO");
    assert_eq!(parsed["line"], "10");
}
