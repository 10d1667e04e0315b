//! Trace kinds, modules and the line pipeline.
//!
//! # Data Flow
//! ```text
//! ModuleRegistry::lookup(name) → Arc<TraceModule>
//!     → module.rs   gate on (stored mask | Baseline), render, split lines
//!     → output.rs   problem reporter, provider bridge, sink
//!     → format.rs   "<day>/<time> <tag> <kind> <thread>:<indent><message>"
//! ```
//!
//! # Design Decisions
//! - Masks are atomics; reading one never takes a lock
//! - Sink writes are serialized by one mutex so lines never interleave
//! - Thread tag and indent depth live in thread-locals (thread.rs)

pub mod format;
pub mod kind;
pub mod module;
pub mod output;
pub mod registry;
pub mod scope;
pub mod thread;

pub use kind::TraceKind;
pub use module::TraceModule;
pub use output::TraceOutput;
pub use registry::{ModuleRegistry, MISC_MODULE, WELL_KNOWN_MODULES};
pub use scope::IndentScope;
