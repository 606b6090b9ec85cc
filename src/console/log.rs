//! Bounded, thread-safe message log.
//!
//! The log is the user-visible channel of the host: command echo, command
//! output, plugin chatter and scheduler errors all land here. It is written
//! from any thread and read (via [`MessageLog::snapshot`]) from the main
//! tick. An optional [`FileMirror`] copies entries above a severity
//! threshold into a dated text file.

use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default number of entries retained before eviction kicks in.
pub const DEFAULT_CAPACITY: usize = 700;

/// Default number of oldest entries dropped per eviction.
pub const DEFAULT_EVICT_BLOCK: usize = 200;

/// Message categories, each with a fixed presentation prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    Warning,
    Error,
    System,
    Input,
    Output,
    Debug,
    Info,
}

impl Severity {
    /// Presentation prefix. [`Severity::Output`] is prefixed per line by
    /// [`LogEntry::rendered`] instead.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Severity::Normal => "",
            Severity::Warning => "* ",
            Severity::Error => "** ",
            Severity::System => "# ",
            Severity::Input => ">>> ",
            Severity::Output => "= ",
            Severity::Debug => "% ",
            Severity::Info => "[INFO] ",
        }
    }

    /// Importance rank used by the file mirror threshold. Lower is more
    /// important; a mirror configured at rank N keeps everything with
    /// `rank <= N`.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Severity::Error => 0,
            Severity::Warning => 1,
            Severity::System => 2,
            Severity::Normal | Severity::Input | Severity::Output => 3,
            Severity::Info => 4,
            Severity::Debug => 5,
        }
    }
}

/// A single log entry.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub severity: Severity,
    pub text: String,
    pub timestamp: DateTime<Local>,
    /// Monotonic sequence number, assigned at append time. Survives
    /// eviction, so renderers can diff snapshots against it.
    pub seq: u64,
}

impl LogEntry {
    /// The entry with its presentation prefix applied. Output entries are
    /// prefixed per line so multi-line command results stay readable.
    #[must_use]
    pub fn rendered(&self) -> String {
        match self.severity {
            Severity::Output => self
                .text
                .trim_matches('\n')
                .lines()
                .map(|line| format!("= {line}"))
                .collect::<Vec<_>>()
                .join("\n"),
            severity => format!("{}{}", severity.prefix(), self.text),
        }
    }
}

struct LogState {
    entries: Vec<LogEntry>,
    appended: u64,
}

/// Bounded ordered buffer of log entries.
///
/// Eviction is block-wise: once the buffer reaches capacity, the oldest
/// `evict_block` entries are dropped in one move before the new entry is
/// pushed, amortizing the shift cost over many appends.
pub struct MessageLog {
    capacity: usize,
    evict_block: usize,
    state: Mutex<LogState>,
    mirror: Option<Mutex<FileMirror>>,
}

impl MessageLog {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, DEFAULT_EVICT_BLOCK)
    }

    /// Create a log with a custom capacity and eviction block size.
    #[must_use]
    pub fn with_capacity(capacity: usize, evict_block: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            evict_block: evict_block.max(1),
            state: Mutex::new(LogState {
                entries: Vec::new(),
                appended: 0,
            }),
            mirror: None,
        }
    }

    /// Attach a file mirror. Entries at or above the mirror's threshold are
    /// also written to a dated text file.
    #[must_use]
    pub fn with_mirror(mut self, mirror: FileMirror) -> Self {
        self.mirror = Some(Mutex::new(mirror));
        self
    }

    /// Append an entry. Thread-safe; callable from any producer.
    pub fn append(&self, severity: Severity, text: impl Into<String>) {
        let entry = {
            let mut state = self.state.lock().expect("message log poisoned");
            if state.entries.len() >= self.capacity {
                let cut = self.evict_block.min(state.entries.len());
                state.entries.drain(..cut);
            }
            state.appended += 1;
            let entry = LogEntry {
                severity,
                text: text.into(),
                timestamp: Local::now(),
                seq: state.appended,
            };
            state.entries.push(entry.clone());
            entry
        };

        if let Some(mirror) = &self.mirror {
            mirror.lock().expect("log mirror poisoned").write(&entry);
        }
    }

    pub fn log(&self, text: impl Into<String>) {
        self.append(Severity::Normal, text);
    }

    pub fn warning(&self, text: impl Into<String>) {
        self.append(Severity::Warning, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        self.append(Severity::Error, text);
    }

    pub fn system(&self, text: impl Into<String>) {
        self.append(Severity::System, text);
    }

    pub fn input(&self, text: impl Into<String>) {
        self.append(Severity::Input, text);
    }

    pub fn output(&self, text: impl Into<String>) {
        self.append(Severity::Output, text);
    }

    pub fn debug(&self, text: impl Into<String>) {
        self.append(Severity::Debug, text);
    }

    pub fn info(&self, text: impl Into<String>) {
        self.append(Severity::Info, text);
    }

    /// An immutable ordered copy of the current buffer. Never hands out a
    /// live reference; renderers work from their own snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.state
            .lock()
            .expect("message log poisoned")
            .entries
            .clone()
    }

    /// Total number of entries ever appended, including evicted ones.
    #[must_use]
    pub fn appended_total(&self) -> u64 {
        self.state.lock().expect("message log poisoned").appended
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().expect("message log poisoned").entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all retained entries. The appended-total counter keeps counting.
    pub fn clear(&self) {
        self.state
            .lock()
            .expect("message log poisoned")
            .entries
            .clear();
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Mirrors log entries into one text file per day.
///
/// Files are named `<stem>-YYYY-MM-DD.log`; rotation happens on the first
/// write after the local date changes. Write failures are reported through
/// `tracing` and never propagate into the host.
pub struct FileMirror {
    dir: PathBuf,
    stem: String,
    threshold: Severity,
    day: NaiveDate,
    file: Option<File>,
}

impl FileMirror {
    #[must_use]
    pub fn new(dir: impl AsRef<Path>, stem: impl Into<String>, threshold: Severity) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            stem: stem.into(),
            threshold,
            day: Local::now().date_naive(),
            file: None,
        }
    }

    fn write(&mut self, entry: &LogEntry) {
        if entry.severity.rank() > self.threshold.rank() {
            return;
        }

        let today = entry.timestamp.date_naive();
        if self.file.is_none() || today != self.day {
            self.day = today;
            self.file = self.open(today);
        }

        if let Some(file) = &mut self.file {
            let line = format!(
                "[{}] {}\n",
                entry.timestamp.format("%H:%M:%S"),
                entry.rendered()
            );
            if let Err(e) = file.write_all(line.as_bytes()) {
                warn!("log mirror write failed: {e}");
                self.file = None;
            }
        }
    }

    fn open(&self, day: NaiveDate) -> Option<File> {
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            warn!("log mirror directory unavailable: {e}");
            return None;
        }
        let path = self.dir.join(format!("{}-{}.log", self.stem, day.format("%Y-%m-%d")));
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => Some(file),
            Err(e) => {
                warn!("log mirror file {} unavailable: {e}", path.display());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes() {
        let entry = |severity, text: &str| LogEntry {
            severity,
            text: text.to_string(),
            timestamp: Local::now(),
            seq: 0,
        };
        assert_eq!(entry(Severity::Error, "boom").rendered(), "** boom");
        assert_eq!(entry(Severity::System, "up").rendered(), "# up");
        assert_eq!(entry(Severity::Input, "help").rendered(), ">>> help");
        assert_eq!(entry(Severity::Warning, "careful").rendered(), "* careful");
        assert_eq!(entry(Severity::Normal, "plain").rendered(), "plain");
    }

    #[test]
    fn test_output_prefix_applied_per_line() {
        let entry = LogEntry {
            severity: Severity::Output,
            text: "one\ntwo\n".to_string(),
            timestamp: Local::now(),
            seq: 0,
        };
        assert_eq!(entry.rendered(), "= one\n= two");
    }

    #[test]
    fn test_block_eviction() {
        let log = MessageLog::with_capacity(700, 200);
        for i in 1..=701u32 {
            log.log(format!("entry {i}"));
        }
        let snapshot = log.snapshot();
        assert_eq!(snapshot.len(), 501);
        assert_eq!(snapshot[0].text, "entry 201");
        assert_eq!(snapshot.last().unwrap().text, "entry 701");
        assert_eq!(log.appended_total(), 701);
    }

    #[test]
    fn test_eviction_is_blockwise_not_per_entry() {
        let log = MessageLog::with_capacity(10, 4);
        for i in 0..10 {
            log.log(format!("{i}"));
        }
        assert_eq!(log.len(), 10);
        log.log("10");
        // One append past capacity drops a whole block, not one entry.
        assert_eq!(log.len(), 7);
        assert_eq!(log.snapshot()[0].text, "4");
    }

    #[test]
    fn test_snapshot_is_detached() {
        let log = MessageLog::new();
        log.log("first");
        let snapshot = log.snapshot();
        log.log("second");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_clear_keeps_counter() {
        let log = MessageLog::new();
        log.log("a");
        log.log("b");
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.appended_total(), 2);
    }

    #[test]
    fn test_mirror_honors_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let log = MessageLog::new()
            .with_mirror(FileMirror::new(dir.path(), "host", Severity::Warning));
        log.error("bad");
        log.warning("iffy");
        log.log("chatter");
        log.debug("noise");

        let day = Local::now().date_naive().format("%Y-%m-%d");
        let contents =
            std::fs::read_to_string(dir.path().join(format!("host-{day}.log"))).unwrap();
        assert!(contents.contains("** bad"));
        assert!(contents.contains("* iffy"));
        assert!(!contents.contains("chatter"));
        assert!(!contents.contains("noise"));
    }
}
