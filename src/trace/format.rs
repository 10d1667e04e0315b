//! Log line formatting.
//!
//! # Responsibilities
//! - Render one record as `day/time[.ms] TAG      G THREAD  :indent message`
//! - Render kind glyphs (terse) or kind names (verbose)
//! - Render caller messages without ever propagating a formatting failure
//!
//! # Design Decisions
//! - Pure functions: the caller supplies the clock, thread tag and indent
//! - Fixed 8-column tag and thread fields keep the log greppable by column

use std::fmt::{self, Write as _};
use std::panic::{self, AssertUnwindSafe};

use chrono::NaiveDateTime;

use crate::config::directive::Switches;
use crate::trace::kind::TraceKind;

/// Width of the module tag and thread tag columns.
pub const TAG_WIDTH: usize = 8;

/// Everything needed to render one line.
#[derive(Debug, Clone)]
pub struct LineRecord<'a> {
    pub timestamp: NaiveDateTime,
    pub tag: &'a str,
    pub kind: TraceKind,
    pub thread: &'a str,
    pub indent: &'a str,
    pub message: &'a str,
}

/// Pad or truncate `name` to exactly [`TAG_WIDTH`] characters.
pub fn fixed_tag(name: &str) -> String {
    let mut tag: String = name.chars().take(TAG_WIDTH).collect();
    let len = tag.chars().count();
    tag.extend(std::iter::repeat(' ').take(TAG_WIDTH - len));
    tag
}

/// Format a single log line.
pub fn format_line(record: &LineRecord<'_>, switches: &Switches) -> String {
    let mut line = String::with_capacity(48 + record.message.len());

    let _ = write!(line, "{}", record.timestamp.format("%-d/%H:%M:%S"));
    if switches.millisecond_timestamps {
        let _ = write!(line, "{}", record.timestamp.format("%.3f"));
    }
    line.push(' ');
    line.push_str(&fixed_tag(record.tag));
    line.push(' ');
    line.push_str(&kind_label(record.kind, switches.verbose_kinds));
    line.push(' ');
    line.push_str(&fixed_tag(record.thread));
    line.push(':');
    line.push_str(record.indent);
    line.push_str(record.message);
    line
}

/// Render a kind as a one-character glyph, or as padded names when verbose.
pub fn kind_label(kind: TraceKind, verbose: bool) -> String {
    if verbose {
        return format!("{:>20}", kind.describe());
    }
    glyph(kind).to_string()
}

fn glyph(kind: TraceKind) -> char {
    if kind.is_empty() {
        return 'A';
    }
    let rest = kind.difference(TraceKind::BLOCK_ENTRY);
    if rest.is_empty() {
        return '>';
    }
    if rest == TraceKind::ENTRY_EXIT {
        '='
    } else if rest == TraceKind::BLOCK_EXIT {
        '<'
    } else if rest == TraceKind::MESSAGE {
        ' '
    } else if rest == TraceKind::DETAIL {
        'D'
    } else if rest == TraceKind::CONTINUOUS {
        'C'
    } else if rest == TraceKind::ERROR {
        'E'
    } else if rest == TraceKind::SENSITIVE {
        '*'
    } else if rest == TraceKind::ERROR | TraceKind::DETAIL {
        'e'
    } else if rest == TraceKind::NETWORK_ERROR {
        'N'
    } else if rest == TraceKind::SYS_CALL {
        'S'
    } else if rest == TraceKind::DEBUG {
        'd'
    } else if rest.contains(TraceKind::BLOCK_EXIT) {
        '<'
    } else {
        '?'
    }
}

/// Render a caller-supplied message.
///
/// A `Display` impl that fails or panics yields whatever was produced so far
/// with a `[Format Exception: ...]` marker appended.
pub fn render_message(message: &dyn fmt::Display) -> String {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut text = String::new();
        let result = write!(text, "{message}");
        (text, result)
    }));

    match outcome {
        Ok((text, Ok(()))) => text,
        Ok((text, Err(e))) => format!("{text} [Format Exception: {e}]"),
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic while formatting".to_string());
            format!("[Format Exception: {reason}]")
        }
    }
}

/// Mask sensitive data while keeping its first and last characters.
///
/// `"secret"` becomes `"s....t"`. Inputs shorter than three characters are
/// returned unchanged.
pub fn mask_sensitive(data: &str) -> String {
    let chars: Vec<char> = data.chars().collect();
    if chars.len() <= 2 {
        return data.to_string();
    }
    let mut masked = String::with_capacity(chars.len());
    masked.push(chars[0]);
    masked.extend(std::iter::repeat('.').take(chars.len() - 2));
    masked.push(chars[chars.len() - 1]);
    masked
}
