//! Log file rotation: one dated file active at a time inside a managed
//! folder, swapped on a time schedule, with an optional folder-size cap
//! enforced by deleting the oldest file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Sender, bounded, select, tick};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::error::{Error, Result};

/// Interval between rotation/size checks. Polling, much finer than any
/// rotation period; not precise scheduling.
pub const ROTATION_TICK_INTERVAL: Duration = Duration::from_secs(60);

const FILE_EXTENSION: &str = ".log";

/// The cadence at which a new log file supersedes the old one.
///
/// Periods are fixed durations measured from the active file's creation
/// date, not calendar boundaries: a "monthly" file rotates 30 days after it
/// was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationPeriod {
    Daily,
    Weekly,
    Monthly,
}

impl RotationPeriod {
    /// How long a file may stay active before rotation is due.
    pub fn max_age(&self) -> time::Duration {
        match self {
            Self::Daily => time::Duration::days(1),
            Self::Weekly => time::Duration::days(7),
            Self::Monthly => time::Duration::days(30),
        }
    }
}

/// True when a file created on `created` must be superseded as of `today`.
pub(crate) fn rotation_due(created: Date, today: Date, period: RotationPeriod) -> bool {
    today - created >= period.max_age()
}

fn date_format() -> Vec<time::format_description::FormatItem<'static>> {
    time::format_description::parse("[year]-[month]-[day]").unwrap()
}

fn file_name_for(date: Date) -> String {
    format!("{}{}", date.format(&date_format()).unwrap(), FILE_EXTENSION)
}

/// Parse the creation date embedded in a rotation-managed file name.
/// Returns `None` for files the engine does not manage.
fn parse_file_date(name: &str) -> Option<Date> {
    let stem = name.strip_suffix(FILE_EXTENSION)?;
    Date::parse(stem, &date_format()).ok()
}

fn today() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}

#[derive(Debug)]
struct ActiveFile {
    file: File,
    date: Date,
    path: PathBuf,
}

/// Owns the single active log file of a managed folder.
///
/// One mutex guards the active file against concurrent writes and file swaps,
/// so a write never observes a half-closed file.
#[derive(Debug)]
pub struct RotationEngine {
    folder: PathBuf,
    max_folder_size: Option<u64>,
    period: RotationPeriod,
    active: Mutex<Option<ActiveFile>>,
}

impl RotationEngine {
    pub fn new(
        folder: impl Into<PathBuf>,
        max_folder_size: Option<u64>,
        period: RotationPeriod,
    ) -> Self {
        Self {
            folder: folder.into(),
            max_folder_size,
            period,
            active: Mutex::new(None),
        }
    }

    /// Validate the folder and open the initial file. Blocks until the file
    /// is ready, so the engine can be registered as a write target as soon as
    /// this returns.
    pub fn prepare(&self) -> Result<()> {
        if self.folder.as_os_str().is_empty() {
            return Err(Error::Config("rotation folder path is empty".to_string()));
        }
        fs::create_dir_all(&self.folder)?;

        let mut active = self.active.lock().unwrap();
        *active = Some(self.open_current(today())?);
        Ok(())
    }

    /// Forward `buf` to the currently open file.
    ///
    /// Fails with [`Error::LogFileNotSet`] when no file is open: that is a
    /// lifecycle bug on the caller's side, not routine backpressure.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        let mut active = self.active.lock().unwrap();
        match active.as_mut() {
            Some(current) => {
                current.file.write_all(buf)?;
                Ok(buf.len())
            }
            None => Err(Error::LogFileNotSet),
        }
    }

    /// Run the periodic rotation and folder-size checks. Failures are
    /// reported on stderr; the ticking loop keeps going.
    pub fn run_checks(&self) {
        if let Err(err) = self.rotate_if_due() {
            eprintln!("log rotation check failed: {err}");
        }
        if let Err(err) = self.enforce_folder_cap() {
            eprintln!("log folder size check failed: {err}");
        }
    }

    /// Close the active file handle.
    pub fn close(&self) {
        *self.active.lock().unwrap() = None;
    }

    /// Reopen the most recent non-stale file in the folder, or create a
    /// fresh dated one.
    fn open_current(&self, today: Date) -> Result<ActiveFile> {
        match self.most_recent_file()? {
            Some((date, path)) if !rotation_due(date, today, self.period) => {
                let file = OpenOptions::new().append(true).open(&path)?;
                Ok(ActiveFile { file, date, path })
            }
            _ => self.create_file(today),
        }
    }

    fn create_file(&self, date: Date) -> Result<ActiveFile> {
        let path = self.folder.join(file_name_for(date));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        tracing::debug!(path = %path.display(), "created log file");
        Ok(ActiveFile { file, date, path })
    }

    /// All rotation-managed files with their embedded dates and sizes.
    fn managed_files(&self) -> Result<Vec<(Date, PathBuf, u64)>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.folder)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(date) = parse_file_date(&name.to_string_lossy()) else {
                continue;
            };
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            files.push((date, entry.path(), size));
        }
        Ok(files)
    }

    fn most_recent_file(&self) -> Result<Option<(Date, PathBuf)>> {
        Ok(self
            .managed_files()?
            .into_iter()
            .max_by_key(|(date, _, _)| *date)
            .map(|(date, path, _)| (date, path)))
    }

    fn rotate_if_due(&self) -> Result<()> {
        let today = today();
        let mut active = self.active.lock().unwrap();
        let created = active.as_ref().map(|current| current.date);
        match created {
            Some(date) if rotation_due(date, today, self.period) => {
                // Close the old handle before the new file exists; never two
                // files open at once.
                *active = None;
                *active = Some(self.create_file(today)?);
            }
            None => {
                *active = Some(self.open_current(today)?);
            }
            _ => {}
        }
        Ok(())
    }

    fn enforce_folder_cap(&self) -> Result<()> {
        let Some(cap) = self.max_folder_size else {
            return Ok(());
        };

        // Hold the write lock across deletion/recreation so no write lands
        // on a removed file.
        let mut active = self.active.lock().unwrap();

        let files = self.managed_files()?;
        let total: u64 = files.iter().map(|(_, _, size)| *size).sum();
        if total <= cap {
            return Ok(());
        }

        let Some((_, oldest, _)) = files.iter().min_by_key(|(date, _, _)| *date) else {
            return Ok(());
        };

        if active.as_ref().is_some_and(|current| current.path == *oldest) {
            *active = None;
        }
        fs::remove_file(oldest)?;
        tracing::debug!(path = %oldest.display(), "deleted oldest log file over folder cap");

        // Writes must never be directed at a missing file.
        if self.managed_files()?.is_empty() {
            *active = Some(self.create_file(today())?);
        } else if active.is_none() {
            *active = Some(self.open_current(today())?);
        }
        Ok(())
    }
}

/// `io::Write` adapter so a shared [`RotationEngine`] can be registered as a
/// fan-out target.
pub struct RotationWriter {
    engine: Arc<RotationEngine>,
}

impl RotationWriter {
    pub fn new(engine: Arc<RotationEngine>) -> Self {
        Self { engine }
    }
}

impl Write for RotationWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.engine.write(buf).map_err(io::Error::other)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs a [`RotationEngine`]'s periodic checks on a background ticking loop.
pub struct RotationService {
    engine: Arc<RotationEngine>,
    shutdown: Sender<()>,
    worker: Option<JoinHandle<()>>,
}

impl RotationService {
    /// Prepare the engine (blocking until the initial file is ready) and
    /// start the ticking loop.
    pub fn start(engine: Arc<RotationEngine>) -> Result<Self> {
        engine.prepare()?;

        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let ticker_engine = Arc::clone(&engine);
        let worker = thread::Builder::new()
            .name("pipelog-rotation".to_string())
            .spawn(move || {
                let ticker = tick(ROTATION_TICK_INTERVAL);
                loop {
                    select! {
                        recv(shutdown_rx) -> _ => {
                            tracing::debug!("log rotation service stopped");
                            return;
                        }
                        recv(ticker) -> _ => ticker_engine.run_checks(),
                    }
                }
            })
            .map_err(Error::Io)?;

        tracing::info!("log rotation service started");
        Ok(Self {
            engine,
            shutdown: shutdown_tx,
            worker: Some(worker),
        })
    }

    pub fn engine(&self) -> Arc<RotationEngine> {
        Arc::clone(&self.engine)
    }

    /// Cancel the ticking loop, wait for it to exit and close the open file.
    pub fn stop(mut self) {
        let _ = self.shutdown.send(());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.engine.close();
    }
}
