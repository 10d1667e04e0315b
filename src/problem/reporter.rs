//! Thread-local call buffers and the problem file.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::Local;
use thiserror::Error;

static NEXT_REPORTER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CALL_BUFFERS: RefCell<HashMap<u64, CallBuffer>> = RefCell::new(HashMap::new());
}

#[derive(Debug, Default)]
struct CallBuffer {
    lines: Vec<String>,
    seen_error: bool,
    suppress: u32,
}

/// What `call_complete` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// The reporter is switched off.
    Disabled,
    /// A suppression is active; the buffer keeps accumulating.
    Suppressed,
    /// Nothing worth reporting; the buffer was dropped.
    Discarded,
    /// These lines were appended to the problem file.
    Flushed(Vec<String>),
}

/// Errors writing the problem file.
#[derive(Debug, Error)]
pub enum ProblemError {
    #[error("failed to write problem report to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Collects the lines of the current call on each thread and writes them to
/// a problem file when the call fails.
#[derive(Debug)]
pub struct ProblemReporter {
    id: u64,
    path: PathBuf,
    banner: String,
    enabled: bool,
    report_all: AtomicBool,
    file_lock: Mutex<()>,
}

impl ProblemReporter {
    /// Create a reporter writing to `path`.
    ///
    /// `banner` identifies the process in each flushed report.
    pub fn new(path: impl Into<PathBuf>, banner: impl Into<String>, enabled: bool, report_all: bool) -> Self {
        Self {
            id: NEXT_REPORTER_ID.fetch_add(1, Ordering::Relaxed),
            path: path.into(),
            banner: banner.into(),
            enabled,
            report_all: AtomicBool::new(report_all),
            file_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Report every call, not only failed ones.
    pub fn set_report_all(&self, report_all: bool) {
        self.report_all.store(report_all, Ordering::Relaxed);
    }

    pub fn report_all(&self) -> bool {
        self.report_all.load(Ordering::Relaxed)
    }

    fn with_buffer<R>(&self, f: impl FnOnce(&mut CallBuffer) -> R) -> Option<R> {
        CALL_BUFFERS
            .try_with(|buffers| f(buffers.borrow_mut().entry(self.id).or_default()))
            .ok()
    }

    fn peek_buffer<R>(&self, f: impl FnOnce(&CallBuffer) -> R) -> Option<R> {
        CALL_BUFFERS
            .try_with(|buffers| buffers.borrow().get(&self.id).map(f))
            .ok()
            .flatten()
    }

    /// Append a line to this thread's buffer.
    pub fn log(&self, line: &str) {
        if !self.enabled {
            return;
        }
        self.with_buffer(|buffer| {
            if buffer.lines.is_empty() {
                buffer
                    .lines
                    .push(format!("{}-----------------------", Local::now().format("%H:%M")));
            }
            buffer.lines.push(line.to_string());
        });
    }

    /// Append a message stamped with the long date and time.
    pub fn log_stamped(&self, message: &str) {
        if !self.enabled {
            return;
        }
        let stamp = Local::now().format("%A, %B %-d, %Y/%H:%M:%S");
        self.log(&format!("{stamp} {message}"));
    }

    /// Mark the current call on this thread as failed.
    pub fn note_error(&self) {
        if self.enabled {
            self.with_buffer(|buffer| buffer.seen_error = true);
        }
    }

    pub fn suppress_call_complete(&self) {
        if self.enabled {
            self.with_buffer(|buffer| buffer.suppress += 1);
        }
    }

    /// Undo one suppression and start afresh: the error flag is cleared.
    pub fn enable_call_complete(&self) {
        if self.enabled {
            self.with_buffer(|buffer| {
                buffer.suppress = buffer.suppress.saturating_sub(1);
                buffer.seen_error = false;
            });
        }
    }

    /// End the current call on this thread.
    ///
    /// Unless suppressed, the buffer and error flag are always cleared, even
    /// when writing the problem file fails.
    pub fn call_complete(&self) -> Result<CallOutcome, ProblemError> {
        if !self.enabled {
            return Ok(CallOutcome::Disabled);
        }

        let report_all = self.report_all();
        let taken = CALL_BUFFERS
            .try_with(|buffers| {
                let mut buffers = buffers.borrow_mut();
                if buffers.get(&self.id).is_some_and(|buffer| buffer.suppress > 0) {
                    return None;
                }
                let buffer = buffers.remove(&self.id).unwrap_or_default();
                Some((buffer.seen_error || report_all, buffer.lines))
            })
            .ok();

        match taken.flatten() {
            None => Ok(CallOutcome::Suppressed),
            Some((false, _)) => Ok(CallOutcome::Discarded),
            Some((true, lines)) if lines.is_empty() => Ok(CallOutcome::Discarded),
            Some((true, lines)) => {
                self.append(&lines).map_err(|source| ProblemError::Io {
                    path: self.path.clone(),
                    source,
                })?;
                metrics::counter!("diagtrace_problem_reports_total").increment(1);
                Ok(CallOutcome::Flushed(lines))
            }
        }
    }

    /// Lines buffered on this thread.
    pub fn buffered_lines(&self) -> Vec<String> {
        self.peek_buffer(|buffer| buffer.lines.clone()).unwrap_or_default()
    }

    /// Whether the current call on this thread has seen an error.
    pub fn error_seen(&self) -> bool {
        self.peek_buffer(|buffer| buffer.seen_error).unwrap_or(false)
    }

    #[cfg(test)]
    fn has_buffer(&self) -> bool {
        self.peek_buffer(|_| ()).is_some()
    }

    fn append(&self, lines: &[String]) -> io::Result<()> {
        let _guard = self.file_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, ">>> {}", self.banner)?;
        for line in lines {
            writeln!(writer, "{line}")?;
        }
        writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reporter(dir: &Path) -> ProblemReporter {
        ProblemReporter::new(dir.join("problem.txt"), "test 0.1.0", true, false)
    }

    #[test]
    fn test_separator_added_on_first_line() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = reporter(dir.path());

        reporter.log("first");
        reporter.log("second");
        let lines = reporter.buffered_lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("-----------------------"));
        assert_eq!(lines[2], "second");
    }

    #[test]
    fn test_suppressed_call_keeps_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = reporter(dir.path());

        reporter.suppress_call_complete();
        reporter.suppress_call_complete();
        reporter.log("inner");
        reporter.note_error();
        assert_eq!(reporter.call_complete().unwrap(), CallOutcome::Suppressed);
        assert_eq!(reporter.buffered_lines().len(), 2);

        reporter.enable_call_complete();
        assert!(!reporter.error_seen());
        assert_eq!(reporter.call_complete().unwrap(), CallOutcome::Suppressed);

        reporter.enable_call_complete();
        assert_eq!(reporter.call_complete().unwrap(), CallOutcome::Discarded);
        assert!(reporter.buffered_lines().is_empty());
        assert!(!dir.path().join("problem.txt").exists());
    }

    #[test]
    fn test_enable_never_underflows() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = reporter(dir.path());

        reporter.enable_call_complete();
        reporter.log("line");
        reporter.note_error();
        assert!(matches!(reporter.call_complete().unwrap(), CallOutcome::Flushed(_)));
    }

    #[test]
    fn test_buffers_are_per_reporter() {
        let dir = tempfile::tempdir().unwrap();
        let a = reporter(dir.path());
        let b = ProblemReporter::new(dir.path().join("other.txt"), "b", true, false);

        a.log("for a");
        assert!(b.buffered_lines().is_empty());
    }

    #[test]
    fn test_disabled_reporter_is_inert() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = ProblemReporter::new(dir.path().join("problem.txt"), "x", false, true);

        reporter.log("line");
        reporter.note_error();
        assert!(reporter.buffered_lines().is_empty());
        assert_eq!(reporter.call_complete().unwrap(), CallOutcome::Disabled);
    }

    #[test]
    fn test_flush_failure_still_clears() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the open fail.
        let path = dir.path().join("problem.txt");
        fs::create_dir(&path).unwrap();
        let reporter = ProblemReporter::new(&path, "x", true, false);

        reporter.log("line");
        reporter.note_error();
        assert!(reporter.call_complete().is_err());
        assert!(reporter.buffered_lines().is_empty());
        assert!(!reporter.error_seen());
    }

    #[test]
    fn test_completed_call_releases_thread_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = reporter(dir.path());

        reporter.log("line");
        assert!(reporter.has_buffer());
        assert_eq!(reporter.call_complete().unwrap(), CallOutcome::Discarded);
        assert!(!reporter.has_buffer());

        reporter.suppress_call_complete();
        reporter.log("kept");
        assert_eq!(reporter.call_complete().unwrap(), CallOutcome::Suppressed);
        assert!(reporter.has_buffer());

        assert_eq!(reporter.buffered_lines().len(), 2);
        assert!(!reporter.error_seen());
        reporter.enable_call_complete();
        reporter.call_complete().unwrap();
        assert!(!reporter.has_buffer());
    }
}
