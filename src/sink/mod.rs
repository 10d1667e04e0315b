//! Trace sinks: destinations for formatted lines.
//!
//! # Data Flow
//! ```text
//! TraceModule → format.rs (one line)
//!     → TraceOutput (lock per sink)
//!     → file.rs   (append + flush per line, rotated at open)
//!     → memory.rs (in-process capture)
//! ```
//!
//! # Design Decisions
//! - Every write is flushed: this is low-volume diagnostic I/O
//! - Writers are serialized by the owner's mutex, so sinks need not be `Sync`
//! - `close` is idempotent

pub mod file;
pub mod memory;

use std::io;

pub use file::{FileSink, RotationPolicy};
pub use memory::MemorySink;

/// An appendable, flushable, closeable destination for log lines.
pub trait TraceSink: Send {
    /// Append one line and flush it.
    fn write_line(&mut self, line: &str) -> io::Result<()>;

    /// Flush buffered output.
    fn flush(&mut self) -> io::Result<()>;

    /// Flush and release the destination. Calling again is a no-op.
    fn close(&mut self) -> io::Result<()>;
}
