//! Per-module gated diagnostic tracing.
//!
//! A [`TraceContext`] owns a registry of named [`TraceModule`]s. Each module
//! gates records on its kind mask unioned with [`TraceKind::BASELINE`], and
//! routes them to a rotated log file, an optional external trace provider,
//! and a thread-local problem reporter for failed calls.

pub mod config;
pub mod lifecycle;
pub mod problem;
pub mod provider;
pub mod sink;
pub mod trace;

pub use config::schema::TraceSettings;
pub use lifecycle::TraceContext;
pub use problem::{CallOutcome, ProblemReporter};
pub use provider::{Category, ProviderError, Severity, TraceProvider};
pub use trace::{IndentScope, ModuleRegistry, TraceKind, TraceModule};
