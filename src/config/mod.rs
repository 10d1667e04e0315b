//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! settings file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → TraceSettings (validated, immutable)
//!
//! directive file (<log_dir>/log.conf, then log.conf.txt, then defaults)
//!     → directive.rs parse → per-token errors collected
//!     → apply to ModuleRegistry masks and Switches
//!
//! On change (when watch_config is set):
//!     watcher.rs detects change
//!     → directives re-applied on top of the current masks
//!     → Switches swapped atomically
//! ```
//!
//! # Design Decisions
//! - Settings are immutable once loaded; only directives reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod directive;
pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use directive::{DirectiveError, ParsedDirectives, Switches};
pub use loader::{load_settings, ConfigError};
pub use schema::{ProblemSettings, ProviderSettings, TraceSettings};
pub use watcher::DirectiveWatcher;
