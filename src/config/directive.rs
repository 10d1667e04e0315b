//! Trace directive parsing.
//!
//! # Grammar
//! ```text
//! # comment
//! *deletefile                  reset the log file at start-up
//! *verbose                     render kind names instead of glyphs
//! *milliseconds                add milliseconds to timestamps
//! web error timing             add kinds to module "web"
//! global = debug | !timing     adjust every registered module
//! ```
//! Tokens are split on space, `=`, `|`, `:`, `,` and `;`. A kind prefixed by
//! `!`, `-` or `~` is removed instead of added.
//!
//! # Design Decisions
//! - Failures are per token: a bad token is reported and skipped
//! - Parsing is pure; applying to a registry is a separate step
//! - `global` only reaches modules registered when the directive is applied

use thiserror::Error;

use crate::trace::kind::TraceKind;
use crate::trace::registry::ModuleRegistry;

const DELIMITERS: [char; 6] = [' ', '=', '|', ':', ',', ';'];
const NEGATIONS: [char; 3] = ['!', '-', '~'];
const GLOBAL_TARGET: &str = "global";

/// Process-wide switches set by single-token directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Switches {
    /// Delete the log file at start-up even when it is under the size limit.
    pub reset_log_on_start: bool,
    /// Render kind names instead of one-character glyphs.
    pub verbose_kinds: bool,
    /// Append milliseconds to timestamps.
    pub millisecond_timestamps: bool,
}

/// A single-token directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Switch {
    DeleteLogOnStart,
    VerboseKinds,
    Milliseconds,
}

impl Switch {
    fn parse(token: &str) -> Option<Self> {
        [Switch::DeleteLogOnStart, Switch::VerboseKinds, Switch::Milliseconds]
            .into_iter()
            .find(|switch| switch.token().eq_ignore_ascii_case(token))
    }

    /// Directive text for this switch.
    pub fn token(self) -> &'static str {
        match self {
            Switch::DeleteLogOnStart => "*deletefile",
            Switch::VerboseKinds => "*verbose",
            Switch::Milliseconds => "*milliseconds",
        }
    }

    fn apply(self, switches: &mut Switches) {
        match self {
            Switch::DeleteLogOnStart => switches.reset_log_on_start = true,
            Switch::VerboseKinds => switches.verbose_kinds = true,
            Switch::Milliseconds => switches.millisecond_timestamps = true,
        }
    }
}

/// Which modules a mask directive adjusts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Every module registered at the time the directive is applied.
    Global,
    /// One module, by lowercase name.
    Module(String),
}

/// One kind added to or removed from a mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjustment {
    pub kind: TraceKind,
    pub remove: bool,
}

/// One parsed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Switch(Switch),
    Mask {
        target: Target,
        adjustments: Vec<Adjustment>,
    },
}

/// A recoverable directive failure. Parsing continues after each one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectiveError {
    #[error("line {line}: unknown trace kind '{token}'")]
    UnknownKind { line: usize, token: String },

    #[error("line {line}: unknown directive '{token}'")]
    UnknownSwitch { line: usize, token: String },

    #[error("line {line}: directive has no target module")]
    MissingTarget { line: usize },
}

/// Result of parsing a directive source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDirectives {
    pub directives: Vec<Directive>,
    pub errors: Vec<DirectiveError>,
}

impl ParsedDirectives {
    /// Apply every directive in order.
    ///
    /// Module targets are created in the registry if missing.
    pub fn apply(&self, registry: &ModuleRegistry, switches: &mut Switches) {
        self.apply_switches(switches);
        self.apply_masks(registry);
    }

    /// Apply only the `*switch` directives.
    pub fn apply_switches(&self, switches: &mut Switches) {
        for directive in &self.directives {
            if let Directive::Switch(switch) = directive {
                switch.apply(switches);
            }
        }
    }

    /// Apply only the mask directives, in order.
    pub fn apply_masks(&self, registry: &ModuleRegistry) {
        for directive in &self.directives {
            match directive {
                Directive::Switch(_) => {}
                Directive::Mask {
                    target: Target::Global,
                    adjustments,
                } => {
                    for module in registry.modules() {
                        for adjustment in adjustments {
                            module.adjust(adjustment.kind, adjustment.remove);
                        }
                    }
                }
                Directive::Mask {
                    target: Target::Module(name),
                    adjustments,
                } => {
                    let module = registry.lookup(name);
                    for adjustment in adjustments {
                        module.adjust(adjustment.kind, adjustment.remove);
                    }
                }
            }
        }
    }
}

/// Parse directive text.
pub fn parse_str(text: &str) -> ParsedDirectives {
    parse_lines(text.lines())
}

/// Parse directive lines. Line numbers in errors are 1-based.
pub fn parse_lines<'a, I>(lines: I) -> ParsedDirectives
where
    I: IntoIterator<Item = &'a str>,
{
    let mut parsed = ParsedDirectives::default();
    for (index, raw) in lines.into_iter().enumerate() {
        parse_line(index + 1, raw, &mut parsed);
    }
    parsed
}

fn parse_line(line_no: usize, raw: &str, out: &mut ParsedDirectives) {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
        return;
    }

    let tokens: Vec<&str> = line.split(DELIMITERS).collect();

    if tokens.len() == 1 {
        match Switch::parse(tokens[0]) {
            Some(switch) => out.directives.push(Directive::Switch(switch)),
            None => out.errors.push(DirectiveError::UnknownSwitch {
                line: line_no,
                token: tokens[0].to_string(),
            }),
        }
        return;
    }

    let target = tokens[0].trim().to_lowercase();
    if target.is_empty() {
        out.errors.push(DirectiveError::MissingTarget { line: line_no });
        return;
    }
    let target = if target == GLOBAL_TARGET {
        Target::Global
    } else {
        Target::Module(target)
    };

    let mut adjustments = Vec::new();
    for token in tokens[1..].iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        let (name, remove) = match token.strip_prefix(NEGATIONS) {
            Some(rest) => (rest, true),
            None => (token, false),
        };
        match TraceKind::parse_name(name) {
            Some(kind) => adjustments.push(Adjustment { kind, remove }),
            None => out.errors.push(DirectiveError::UnknownKind {
                line: line_no,
                token: token.to_string(),
            }),
        }
    }

    out.directives.push(Directive::Mask {
        target,
        adjustments,
    });
}

/// Canonical directive line for a module mask: name followed by kind names.
pub fn canonical(name: &str, mask: TraceKind) -> String {
    let mut line = name.to_lowercase();
    for kind in mask.names() {
        line.push(' ');
        line.push_str(kind);
    }
    line
}
