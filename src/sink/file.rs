//! File-backed sink with start-up rotation.
//!
//! # Responsibilities
//! - Delete an oversize (or explicitly reset) log before the first write
//! - Append one line per record and flush immediately
//!
//! # Design Decisions
//! - Rotation is best-effort: a failed delete is logged and ignored
//! - Rotation only happens at open; a long-running process is not rotated

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::sink::TraceSink;

/// Size above which an existing log is deleted at open.
pub const DEFAULT_MAX_LOG_BYTES: u64 = 5 * 1024 * 1024;

const LINE_ENDING: &str = if cfg!(windows) { "\r\n" } else { "\n" };

/// When to delete an existing destination before opening it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Always delete an existing destination.
    pub reset: bool,
    /// Delete an existing destination larger than this many bytes.
    pub max_bytes: u64,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            reset: false,
            max_bytes: DEFAULT_MAX_LOG_BYTES,
        }
    }
}

/// Appends lines to a file, flushing after each.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl FileSink {
    /// Open `path` for appending, rotating it first according to `policy`.
    ///
    /// Missing parent directories are created.
    pub fn open(path: &Path, policy: RotationPolicy) -> io::Result<Self> {
        rotate(path, policy);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
        })
    }

    /// Destination path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "trace file closed"))
    }
}

/// Delete `path` if the policy asks for it. Returns true if a file was removed.
pub fn rotate(path: &Path, policy: RotationPolicy) -> bool {
    let meta = match fs::metadata(path) {
        Ok(meta) if meta.is_file() => meta,
        _ => return false,
    };

    if !policy.reset && meta.len() <= policy.max_bytes {
        return false;
    }

    match fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), size = meta.len(), "Trace file rotated");
            true
        }
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Trace file rotation failed");
            false
        }
    }
}

impl TraceSink for FileSink {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let writer = self.writer()?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(LINE_ENDING.as_bytes())?;
        writer.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        match self.writer.take() {
            Some(mut writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_appends_and_flushes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("app.txt");

        let mut sink = FileSink::open(&path, RotationPolicy::default()).unwrap();
        sink.write_line("one").unwrap();
        sink.write_line("two").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().collect::<Vec<_>>(), vec!["one", "two"]);
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.txt");

        let mut sink = FileSink::open(&path, RotationPolicy::default()).unwrap();
        sink.close().unwrap();
        sink.close().unwrap();
        assert!(sink.write_line("late").is_err());
    }

    #[test]
    fn test_reset_deletes_small_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.txt");
        fs::write(&path, "old\n").unwrap();

        let policy = RotationPolicy {
            reset: true,
            ..RotationPolicy::default()
        };
        assert!(rotate(&path, policy));
        assert!(!path.exists());
    }

    #[test]
    fn test_rotate_missing_file_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!rotate(&dir.path().join("absent.txt"), RotationPolicy::default()));
    }
}
