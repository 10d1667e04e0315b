//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Problem reporter → Registry + well-known modules → Directives
//!     → Sink (rotated) → Provider registration → Header → Deferred errors
//!
//! Shutdown (shutdown.rs):
//!     Stop watcher → Unregister providers → "provider stopped" → Close sink
//! ```
//!
//! # Design Decisions
//! - Ordered startup: masks first, then sink, then provider
//! - Shutdown is idempotent and also runs on drop

pub mod shutdown;
pub mod startup;

pub use startup::TraceContext;
