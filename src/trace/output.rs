//! Shared output pipeline behind every module.
//!
//! # Responsibilities
//! - Own the sink and serialize writes to it
//! - Hold the current switches for lock-free reads on the formatting path
//! - Hold the provider bridge once start-up has registered it
//! - Own the problem reporter

use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use arc_swap::ArcSwap;
use chrono::Local;

use crate::config::directive::Switches;
use crate::problem::ProblemReporter;
use crate::provider::ProviderBridge;
use crate::sink::TraceSink;
use crate::trace::format::{format_line, LineRecord};
use crate::trace::kind::TraceKind;
use crate::trace::thread;

/// Destination for everything modules record.
pub struct TraceOutput {
    sink: Mutex<Option<Box<dyn TraceSink>>>,
    switches: ArcSwap<Switches>,
    bridge: OnceLock<ProviderBridge>,
    problems: ProblemReporter,
}

impl std::fmt::Debug for TraceOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceOutput")
            .field("has_sink", &self.has_sink())
            .field("switches", &self.switches())
            .field("bridge", &self.bridge.get())
            .field("problems", &self.problems)
            .finish()
    }
}

impl TraceOutput {
    pub fn new(problems: ProblemReporter) -> Self {
        Self {
            sink: Mutex::new(None),
            switches: ArcSwap::from_pointee(Switches::default()),
            bridge: OnceLock::new(),
            problems,
        }
    }

    /// An output with no sink, no provider and a disabled problem reporter.
    pub fn detached() -> Self {
        Self::new(ProblemReporter::new("problem.txt", "detached", false, false))
    }

    fn lock_sink(&self) -> MutexGuard<'_, Option<Box<dyn TraceSink>>> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install the sink, closing any previous one.
    pub fn set_sink(&self, sink: Box<dyn TraceSink>) {
        let previous = self.lock_sink().replace(sink);
        if let Some(mut previous) = previous {
            let _ = previous.close();
        }
    }

    pub fn has_sink(&self) -> bool {
        self.lock_sink().is_some()
    }

    /// Flush and drop the sink. Later writes only reach the provider.
    pub fn close_sink(&self) {
        let sink = self.lock_sink().take();
        if let Some(mut sink) = sink {
            if let Err(e) = sink.close() {
                tracing::warn!(error = %e, "Failed to close trace sink");
            }
        }
    }

    pub fn flush(&self) {
        if let Some(sink) = self.lock_sink().as_mut() {
            let _ = sink.flush();
        }
    }

    pub fn switches(&self) -> Switches {
        **self.switches.load()
    }

    pub fn set_switches(&self, switches: Switches) {
        self.switches.store(std::sync::Arc::new(switches));
    }

    /// Atomically rewrite the switches; `f` may run more than once under contention.
    pub fn update_switches(&self, f: impl Fn(&mut Switches)) {
        self.switches.rcu(|current| {
            let mut next = **current;
            f(&mut next);
            next
        });
    }

    /// Install the provider bridge. Only the first call has any effect.
    pub fn set_bridge(&self, bridge: ProviderBridge) -> Result<(), ProviderBridge> {
        self.bridge.set(bridge)
    }

    pub fn bridge(&self) -> Option<&ProviderBridge> {
        self.bridge.get()
    }

    pub fn problems(&self) -> &ProblemReporter {
        &self.problems
    }

    /// Write an unformatted line to the sink and the primary provider.
    pub fn write_raw(&self, line: &str) {
        self.write_sink(line);
        if let Some(bridge) = self.bridge() {
            bridge.raw(line);
        }
    }

    /// Format and write one record for the calling thread.
    pub fn write_record(&self, kind: TraceKind, tag: &str, message: &str) {
        let mut sink = self.lock_sink();
        let Some(sink) = sink.as_mut() else {
            return;
        };

        let thread = thread::thread_tag();
        let indent = thread::indent_text();
        let line = format_line(
            &LineRecord {
                timestamp: Local::now().naive_local(),
                tag,
                kind,
                thread: &thread,
                indent: &indent,
                message,
            },
            &self.switches(),
        );

        Self::write_locked(sink.as_mut(), &line);
    }

    fn write_sink(&self, line: &str) {
        if let Some(sink) = self.lock_sink().as_mut() {
            Self::write_locked(sink.as_mut(), line);
        }
    }

    fn write_locked(sink: &mut dyn TraceSink, line: &str) {
        match sink.write_line(line) {
            Ok(()) => metrics::counter!("diagtrace_lines_written_total").increment(1),
            Err(e) => tracing::warn!(error = %e, "Failed to write trace line"),
        }
    }
}
