//! Human-readable console rendering of the JSON wire format.

use std::io::{self, Write};

use serde::Deserialize;

// ANSI color for terminal
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const BLUE: &str = "\x1b[34m";
const MAGENTA: &str = "\x1b[35m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";
const BG_RED: &str = "\x1b[41m";

#[derive(Debug, Default, Deserialize)]
struct ConsoleEntry {
    #[serde(default)]
    time: String,
    #[serde(default)]
    level: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    file: String,
    #[serde(default)]
    package: String,
    #[serde(default)]
    function: String,
    #[serde(default)]
    line: String,
}

fn level_color(level: &str) -> &'static str {
    match level {
        "DEBUG" => WHITE,
        "INFO" => GREEN,
        "WARN" => YELLOW,
        "ERROR" => RED,
        "FATAL" | "PANIC" => BG_RED,
        "TRACE" => CYAN,
        _ => RESET,
    }
}

/// Render one JSON wire line as a colorized console line, or `None` when the
/// line is not a well-formed record.
fn render_line(line: &[u8]) -> Option<String> {
    let entry: ConsoleEntry = serde_json::from_slice(line).ok()?;
    let color = level_color(&entry.level);
    Some(format!(
        "{BOLD}{WHITE}{}{RESET} {color}{}{RESET} [{CYAN}{}{RESET} {BLUE}{}{RESET}] {color}{}{RESET} ({MAGENTA}{}:{}{RESET})\n",
        entry.time, entry.level, entry.package, entry.function, entry.msg, entry.file, entry.line,
    ))
}

/// A stdout target that parses each record back into fields and prints a
/// colorized line. Malformed input passes through untouched.
pub struct StyledConsole;

impl Write for StyledConsole {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match render_line(buf) {
            Some(rendered) => io::stdout().write_all(rendered.as_bytes())?,
            None => io::stdout().write_all(buf)?,
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }
}

/// Console target factory: styled rendering or the raw JSON stream.
pub fn styled_output(style: bool) -> Box<dyn Write + Send> {
    if style {
        Box::new(StyledConsole)
    } else {
        Box::new(io::stdout())
    }
}
