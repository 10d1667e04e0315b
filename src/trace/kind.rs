//! Trace kind bitmask.
//!
//! # Responsibilities
//! - Define the fixed set of kinds a trace statement can carry
//! - Define the `BASELINE` and `VERBOSE` composites
//! - Map kind names to bits for the directive parser
//!
//! # Design Decisions
//! - `BASELINE` is unioned at check time, never stored in a module mask
//! - `SENSITIVE` is outside every composite and must be asked for by name

use bitflags::bitflags;

bitflags! {
    /// Classification of a trace statement.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TraceKind: u32 {
        const ENTRY_EXIT = 1;
        const MESSAGE = 1 << 1;
        const DETAIL = 1 << 2;
        const ERROR = 1 << 3;
        const DEBUG = 1 << 4;
        const NETWORK_ERROR = 1 << 5;
        const SYS_CALL = 1 << 6;
        const BLOCK_ENTRY = 1 << 7;
        const BLOCK_EXIT = 1 << 8;
        const TIMING = 1 << 9;
        const SENSITIVE = 1 << 10;
        const CALL = 1 << 11;
        const CONTINUOUS = 1 << 12;
    }
}

/// Single-bit kinds with their directive names, in bit order.
const NAMED: [(&str, TraceKind); 13] = [
    ("EntryExit", TraceKind::ENTRY_EXIT),
    ("Message", TraceKind::MESSAGE),
    ("Detail", TraceKind::DETAIL),
    ("Error", TraceKind::ERROR),
    ("Debug", TraceKind::DEBUG),
    ("NetworkError", TraceKind::NETWORK_ERROR),
    ("SysCall", TraceKind::SYS_CALL),
    ("BlockEntry", TraceKind::BLOCK_ENTRY),
    ("BlockExit", TraceKind::BLOCK_EXIT),
    ("Timing", TraceKind::TIMING),
    ("Sensitive", TraceKind::SENSITIVE),
    ("Call", TraceKind::CALL),
    ("Continuous", TraceKind::CONTINUOUS),
];

impl TraceKind {
    /// Kinds implicitly enabled for every module.
    pub const BASELINE: TraceKind = TraceKind::ERROR
        .union(TraceKind::DETAIL)
        .union(TraceKind::MESSAGE)
        .union(TraceKind::ENTRY_EXIT)
        .union(TraceKind::NETWORK_ERROR)
        .union(TraceKind::SYS_CALL)
        .union(TraceKind::BLOCK_EXIT)
        .union(TraceKind::BLOCK_ENTRY)
        .union(TraceKind::TIMING)
        .union(TraceKind::CALL)
        .union(TraceKind::CONTINUOUS);

    /// Everything except `SENSITIVE`.
    pub const VERBOSE: TraceKind = TraceKind::BASELINE.union(TraceKind::DEBUG);

    /// Effective enablement test for a stored mask.
    pub fn enables(stored: TraceKind, requested: TraceKind) -> bool {
        (stored | TraceKind::BASELINE).contains(requested)
    }

    /// Parse a single directive token, case-insensitively.
    ///
    /// Accepts the single-bit names, the composites (`Baseline`/`AOL`,
    /// `Verbose`/`All`, `None`), the historical `Continuos` spelling and
    /// plain decimal bit values.
    pub fn parse_name(token: &str) -> Option<TraceKind> {
        if let Some((_, kind)) = NAMED.iter().find(|(name, _)| name.eq_ignore_ascii_case(token)) {
            return Some(*kind);
        }
        match token.to_ascii_lowercase().as_str() {
            "baseline" | "aol" => Some(TraceKind::BASELINE),
            "verbose" | "all" => Some(TraceKind::VERBOSE),
            "none" => Some(TraceKind::empty()),
            "continuos" => Some(TraceKind::CONTINUOUS),
            other => other.parse::<u32>().ok().map(TraceKind::from_bits_truncate),
        }
    }

    /// Names of the bits set, in bit order.
    pub fn names(self) -> Vec<&'static str> {
        NAMED
            .iter()
            .filter(|(_, kind)| self.contains(*kind))
            .map(|(name, _)| *name)
            .collect()
    }

    /// Human-readable rendering, `None` for the empty mask.
    pub fn describe(self) -> String {
        if self.is_empty() {
            "None".to_string()
        } else {
            self.names().join("|")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_baseline_excludes_debug_and_sensitive() {
        assert!(!TraceKind::BASELINE.contains(TraceKind::DEBUG));
        assert!(!TraceKind::BASELINE.contains(TraceKind::SENSITIVE));
        assert!(TraceKind::VERBOSE.contains(TraceKind::DEBUG));
        assert!(!TraceKind::VERBOSE.contains(TraceKind::SENSITIVE));
    }

    #[test]
    fn test_sensitive_only_when_stored() {
        assert!(!TraceKind::enables(TraceKind::VERBOSE, TraceKind::SENSITIVE));
        assert!(TraceKind::enables(TraceKind::SENSITIVE, TraceKind::SENSITIVE));
        assert!(!TraceKind::enables(
            TraceKind::empty(),
            TraceKind::ERROR | TraceKind::SENSITIVE
        ));
    }

    #[test]
    fn test_parse_name() {
        assert_eq!(TraceKind::parse_name("error"), Some(TraceKind::ERROR));
        assert_eq!(TraceKind::parse_name("NETWORKERROR"), Some(TraceKind::NETWORK_ERROR));
        assert_eq!(TraceKind::parse_name("Continuos"), Some(TraceKind::CONTINUOUS));
        assert_eq!(TraceKind::parse_name("all"), Some(TraceKind::VERBOSE));
        assert_eq!(TraceKind::parse_name("16"), Some(TraceKind::DEBUG));
        assert_eq!(TraceKind::parse_name("bogus"), None);
    }

    #[test]
    fn test_describe() {
        assert_eq!(TraceKind::empty().describe(), "None");
        assert_eq!((TraceKind::ERROR | TraceKind::DETAIL).describe(), "Detail|Error");
    }

    proptest! {
        #[test]
        fn enablement_matches_mask_law(stored in 0u32..(1 << 13), requested in 0u32..(1 << 13)) {
            let stored = TraceKind::from_bits_truncate(stored);
            let requested = TraceKind::from_bits_truncate(requested);
            let expected = ((stored | TraceKind::BASELINE) & requested) == requested;
            prop_assert_eq!(TraceKind::enables(stored, requested), expected);
        }
    }
}
