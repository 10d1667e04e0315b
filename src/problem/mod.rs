//! Problem reporting for failed logical calls.
//!
//! # Data Flow
//! ```text
//! TraceModule (record carrying the Call kind)
//!     → reporter.rs log()            per-thread buffer, separator on first line
//!     → reporter.rs note_error()     when the record also carries Error
//!
//! call_complete():
//!     suppressed            → keep buffering
//!     error seen/report all → append banner + buffer to the problem file
//!     always                → clear buffer and error flag
//! ```
//!
//! # Design Decisions
//! - Buffers are thread-local and keyed by reporter, never shared
//! - Suppression is a counter so it nests across reentrant calls
//! - A flush failure is returned to the context, which traces it

pub mod reporter;

pub use reporter::{CallOutcome, ProblemError, ProblemReporter};
