//! Named trace modules and their gated emitters.
//!
//! # Responsibilities
//! - Hold the per-module kind mask and answer enablement queries
//! - Render messages, split them into lines, and route every line to the
//!   problem reporter, the provider bridge and the sink
//! - Provide the error, block and assertion emitters
//!
//! # Data Flow
//! ```text
//! module.trace(kind, msg)
//!     → is_enabled(kind)          (stored | Baseline) ⊇ kind
//!     → render_message            Display failures become a marker
//!     → record                    split on CR/LF, skip empty lines
//!         Call kind               → problem buffer, note_error if Error
//!                                   sink only if stored mask ∩ kind ≠ ∅
//!         → bridge.mirror         primary, and always-on if listed
//!         → output.write_record   formatted line to the sink
//! ```

use std::error::Error as StdError;
use std::fmt::Display;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::problem::CallOutcome;
use crate::provider::{Category, Severity};
use crate::trace::format::{fixed_tag, render_message};
use crate::trace::kind::TraceKind;
use crate::trace::output::TraceOutput;
use crate::trace::scope::IndentScope;

/// A named trace source with its own kind mask.
#[derive(Debug)]
pub struct TraceModule {
    name: String,
    tag: String,
    mask: AtomicU32,
    output: Arc<TraceOutput>,
}

impl TraceModule {
    /// A module writing to `output` with the default mask (errors only).
    pub fn new(name: &str, output: Arc<TraceOutput>) -> Self {
        let name = name.to_lowercase();
        Self {
            tag: fixed_tag(&name),
            name,
            mask: AtomicU32::new(TraceKind::ERROR.bits()),
            output,
        }
    }

    /// Lowercase module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name padded or truncated to the tag column width.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn output(&self) -> &Arc<TraceOutput> {
        &self.output
    }

    /// The stored mask, without the Baseline kinds.
    pub fn mask(&self) -> TraceKind {
        TraceKind::from_bits_truncate(self.mask.load(Ordering::Relaxed))
    }

    /// Replace the stored mask.
    pub fn set_mask(&self, kind: TraceKind) {
        self.mask.store(kind.bits(), Ordering::Relaxed);
    }

    pub fn enable(&self, kind: TraceKind) {
        self.mask.fetch_or(kind.bits(), Ordering::Relaxed);
    }

    pub fn disable(&self, kind: TraceKind) {
        self.mask.fetch_and(!kind.bits(), Ordering::Relaxed);
    }

    pub fn adjust(&self, kind: TraceKind, remove: bool) {
        if remove {
            self.disable(kind);
        } else {
            self.enable(kind);
        }
    }

    /// Whether a call of `kind` would be recorded.
    pub fn is_enabled(&self, kind: TraceKind) -> bool {
        TraceKind::enables(self.mask(), kind)
    }

    /// Record `message` if `kind` is enabled.
    pub fn trace(&self, kind: TraceKind, message: impl Display) {
        if self.is_enabled(kind) {
            self.record(kind, &render_message(&message));
        }
    }

    pub fn message(&self, message: impl Display) {
        self.trace(TraceKind::MESSAGE, message);
    }

    pub fn detail(&self, message: impl Display) {
        self.trace(TraceKind::DETAIL, message);
    }

    pub fn debug(&self, message: impl Display) {
        self.trace(TraceKind::DEBUG, message);
    }

    pub fn error(&self, message: impl Display) {
        self.trace(TraceKind::ERROR, message);
    }

    /// Record `message`, then the error's message and debug rendering, then
    /// the same for every error in its `source()` chain.
    pub fn error_from(&self, err: &(dyn StdError + 'static), message: impl Display) {
        self.trace_error(TraceKind::ERROR, Some(err), &message, true);
    }

    /// A network failure. The error's sources are not followed.
    pub fn network_error(&self, err: Option<&(dyn StdError + 'static)>, message: impl Display) {
        self.trace_error(TraceKind::NETWORK_ERROR, err, &message, false);
    }

    /// An expected error, recorded at Error|Detail.
    pub fn uninteresting_error(
        &self,
        err: Option<&(dyn StdError + 'static)>,
        message: impl Display,
    ) {
        self.trace_error(TraceKind::ERROR | TraceKind::DETAIL, err, &message, false);
    }

    /// Record a failed call into the problem buffer and complete the call.
    pub fn call_completed_with_error(&self, message: impl Display) {
        self.trace(TraceKind::ERROR | TraceKind::CALL, message);
        self.call_complete();
    }

    pub fn call_completed_with_error_from(
        &self,
        err: &(dyn StdError + 'static),
        message: impl Display,
    ) {
        self.trace_error(TraceKind::ERROR | TraceKind::CALL, Some(err), &message, true);
        self.call_complete();
    }

    /// Complete the current call on this thread.
    ///
    /// Flushed lines are echoed to the sink. A flush failure is traced as an
    /// error on this module.
    pub fn call_complete(&self) -> CallOutcome {
        match self.output.problems().call_complete() {
            Ok(CallOutcome::Flushed(lines)) => {
                for line in &lines {
                    self.output.write_raw(line);
                }
                CallOutcome::Flushed(lines)
            }
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error = %e, "Problem report could not be written");
                self.error_from(&e, "Exception in problem reporter");
                CallOutcome::Discarded
            }
        }
    }

    fn trace_error(
        &self,
        kind: TraceKind,
        err: Option<&(dyn StdError + 'static)>,
        message: &dyn Display,
        follow_sources: bool,
    ) {
        if !self.is_enabled(kind) {
            return;
        }

        self.record(kind, &render_message(message));

        let mut current = err;
        while let Some(err) = current {
            self.record(kind, &err.to_string());
            self.record(kind, &format!("{err:?}"));

            if !follow_sources {
                break;
            }
            current = err.source();
            if current.is_some() {
                self.record(kind, "InnerException");
            }
        }
    }

    /// Record an assertion failure with the current stack. Never gated.
    pub fn assert_failed(&self, message: impl Display) {
        let kind = TraceKind::empty();
        self.record(kind, &render_message(&message));
        self.record(kind, "ASSERTFAILED");
        self.record(kind, &format!("{:?}", backtrace::Backtrace::new()));
    }

    /// Open an entry/exit block. See [`IndentScope`].
    pub fn block(&self, message: impl Display) -> IndentScope<'_> {
        self.block_with(TraceKind::ENTRY_EXIT, message)
    }

    /// Open a block whose header line is recorded at `kind | EntryExit`.
    ///
    /// With BlockEntry, BlockExit and Timing all enabled the block is timed;
    /// with BlockExit it records a closing brace; otherwise it only indents.
    pub fn block_with(&self, kind: TraceKind, message: impl Display) -> IndentScope<'_> {
        let kind = kind | TraceKind::ENTRY_EXIT;
        if !self.is_enabled(kind) {
            return IndentScope::inert();
        }

        self.record(kind, &render_message(&message));

        let timed = kind | TraceKind::BLOCK_ENTRY | TraceKind::BLOCK_EXIT | TraceKind::TIMING;
        if self.is_enabled(timed) {
            self.record(TraceKind::BLOCK_ENTRY, "{");
            IndentScope::timed(self, Instant::now())
        } else if self.is_enabled(kind | TraceKind::BLOCK_EXIT) {
            self.record(TraceKind::BLOCK_ENTRY, "{");
            IndentScope::closing(self)
        } else {
            IndentScope::detached()
        }
    }

    /// Record a multi-line document inside a block titled `title`.
    pub fn trace_document(&self, kind: TraceKind, title: impl Display, document: &str) {
        if !self.is_enabled(kind) {
            return;
        }
        let _block = self.block_with(kind, title);
        self.record(kind, document);
    }

    /// Emit straight to the always-on provider connection.
    ///
    /// Nothing is written to the sink.
    pub fn always_on(&self, category: Category, severity: Severity, message: impl Display) {
        if let Some(bridge) = self.output.bridge() {
            bridge.always_on_emit(&self.tag, category, severity, &render_message(&message));
        }
    }

    /// Stop mirroring into the primary provider connection.
    pub fn disable_tracing(&self) {
        if let Some(bridge) = self.output.bridge() {
            bridge.disable_primary();
        }
    }

    /// Route one rendered message, line by line.
    pub(crate) fn record(&self, kind: TraceKind, message: &str) {
        if message.contains(['\r', '\n']) {
            for line in message.split(['\r', '\n']).filter(|line| !line.is_empty()) {
                self.record_line(kind, line);
            }
        } else {
            self.record_line(kind, message);
        }
    }

    fn record_line(&self, kind: TraceKind, line: &str) {
        if kind.contains(TraceKind::CALL) {
            let problems = self.output.problems();
            if problems.is_enabled() {
                problems.log_stamped(line);
                if kind.contains(TraceKind::ERROR) {
                    problems.note_error();
                }
            }
            if !self.mask().intersects(kind) {
                return;
            }
        }

        if let Some(bridge) = self.output.bridge() {
            bridge.mirror(&self.name, &self.tag, kind, line);
        }
        self.output.write_record(kind, &self.tag, line);
    }
}
