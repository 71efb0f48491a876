use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Panic,
}

impl Level {
    /// The wire representation of the level.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
            Self::Panic => "PANIC",
        }
    }
}

/// Identity of the call site a record was emitted from.
///
/// Captured by the logging macros through `file!()`, `module_path!()` and
/// `line!()`, so the caller never passes this explicitly and no stack
/// walking happens at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerInfo {
    pub file: &'static str,
    pub package: &'static str,
    pub function: &'static str,
    pub line: u32,
}

impl CallerInfo {
    pub const fn new(
        file: &'static str,
        package: &'static str,
        function: &'static str,
        line: u32,
    ) -> Self {
        Self {
            file,
            package,
            function,
            line,
        }
    }

    /// Base name of the source file, without directory components.
    pub fn file_name(&self) -> &'static str {
        self.file
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(self.file)
    }
}

/// One structured log event flowing through the pipeline.
///
/// Immutable once constructed; created at the call site and consumed exactly
/// once by the engine.
#[derive(Debug, Clone)]
pub struct Report {
    /// Preformatted RFC 3339 timestamp.
    pub time: String,
    pub level: Level,
    pub msg: String,
    pub caller: CallerInfo,
}

impl Report {
    /// Build a report stamped with the current time.
    pub fn now(level: Level, msg: String, caller: CallerInfo) -> Self {
        Self {
            time: rfc3339_now(),
            level,
            msg,
            caller,
        }
    }
}

/// Current local time (UTC fallback) as an RFC 3339 string.
pub fn rfc3339_now() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

/// Resolve the name of the enclosing function from a local item's type name.
///
/// Support for the caller-capture macro; not meant to be called directly.
#[doc(hidden)]
pub fn function_name<T>(_: T) -> &'static str {
    let name = std::any::type_name::<T>();
    name.strip_suffix("::__f").unwrap_or(name)
}
