//! RAII block tracing.

use std::marker::PhantomData;
use std::time::Instant;

use crate::trace::kind::TraceKind;
use crate::trace::module::TraceModule;
use crate::trace::thread;

enum Exit<'a> {
    Nothing,
    Close(&'a TraceModule),
    Timed(&'a TraceModule, Instant),
}

/// Guard for a traced block.
///
/// While alive, the calling thread's indent is one step deeper. On drop the
/// indent is restored first, then the exit line (if any) is recorded, so the
/// closing brace lines up with the opening one.
///
/// Guards must be dropped innermost first. They are `!Send`, so the pop
/// always lands on the thread that pushed.
#[must_use = "dropping the scope immediately closes the block"]
pub struct IndentScope<'a> {
    exit: Exit<'a>,
    indented: bool,
    _thread_bound: PhantomData<*const ()>,
}

impl<'a> IndentScope<'a> {
    /// A guard that does nothing, for blocks that are not traced.
    pub fn inert() -> Self {
        Self {
            exit: Exit::Nothing,
            indented: false,
            _thread_bound: PhantomData,
        }
    }

    /// Indent without recording an exit line.
    pub fn detached() -> Self {
        thread::push_indent();
        Self {
            exit: Exit::Nothing,
            indented: true,
            _thread_bound: PhantomData,
        }
    }

    pub(crate) fn closing(module: &'a TraceModule) -> Self {
        thread::push_indent();
        Self {
            exit: Exit::Close(module),
            indented: true,
            _thread_bound: PhantomData,
        }
    }

    pub(crate) fn timed(module: &'a TraceModule, started: Instant) -> Self {
        thread::push_indent();
        Self {
            exit: Exit::Timed(module, started),
            indented: true,
            _thread_bound: PhantomData,
        }
    }

    /// Whether this guard changed the indent.
    pub fn is_active(&self) -> bool {
        self.indented
    }
}

impl Drop for IndentScope<'_> {
    fn drop(&mut self) {
        if self.indented {
            thread::pop_indent();
        }
        match self.exit {
            Exit::Nothing => {}
            Exit::Close(module) => module.record(TraceKind::BLOCK_EXIT, "}"),
            Exit::Timed(module, started) => module.record(
                TraceKind::BLOCK_EXIT | TraceKind::TIMING,
                &format!("}}{:?}", started.elapsed()),
            ),
        }
    }
}

impl std::fmt::Debug for IndentScope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let exit = match self.exit {
            Exit::Nothing => "nothing",
            Exit::Close(_) => "close",
            Exit::Timed(..) => "timed",
        };
        f.debug_struct("IndentScope")
            .field("exit", &exit)
            .field("indented", &self.indented)
            .finish()
    }
}
