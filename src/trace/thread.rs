//! Per-thread display state: thread tag and indent depth.

use std::cell::{Cell, OnceCell};
use std::sync::atomic::{AtomicU32, Ordering};

/// Indent added per nested block.
pub const INDENT_STEP: &str = "  ";

static NEXT_THREAD_NUMBER: AtomicU32 = AtomicU32::new(100);

thread_local! {
    static THREAD_TAG: OnceCell<String> = const { OnceCell::new() };
    static INDENT_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Display tag of the calling thread.
///
/// Named threads use their own name. Unnamed threads get `T100`, `T101`, ...
/// the first time they ask; the tag never changes afterwards.
pub fn thread_tag() -> String {
    THREAD_TAG.with(|tag| {
        tag.get_or_init(|| match std::thread::current().name() {
            Some(name) => name.to_string(),
            None => format!("T{}", NEXT_THREAD_NUMBER.fetch_add(1, Ordering::Relaxed)),
        })
        .clone()
    })
}

/// Current block nesting depth of the calling thread.
pub fn indent_depth() -> usize {
    INDENT_DEPTH.with(Cell::get)
}

/// Indent prefix for the calling thread.
pub fn indent_text() -> String {
    INDENT_STEP.repeat(indent_depth())
}

pub(crate) fn push_indent() {
    INDENT_DEPTH.with(|depth| depth.set(depth.get() + 1));
}

/// Never goes below zero.
pub(crate) fn pop_indent() {
    INDENT_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unnamed_threads_get_stable_numbered_tags() {
        let handle = std::thread::spawn(|| (thread_tag(), thread_tag()));
        let (first, second) = handle.join().unwrap();
        assert!(first.starts_with('T'));
        assert_eq!(first, second);
    }

    #[test]
    fn test_named_thread_uses_its_name() {
        let handle = std::thread::Builder::new()
            .name("worker".into())
            .spawn(thread_tag)
            .unwrap();
        assert_eq!(handle.join().unwrap(), "worker");
    }

    #[test]
    fn test_pop_never_negative() {
        pop_indent();
        assert_eq!(indent_depth(), 0);
        push_indent();
        push_indent();
        assert_eq!(indent_text(), "    ");
        pop_indent();
        pop_indent();
        pop_indent();
        assert_eq!(indent_depth(), 0);
    }
}
