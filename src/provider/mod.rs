//! External trace provider integration.
//!
//! # Data Flow
//! ```text
//! Start-up:
//!     bridge.rs registers a connection per provider id
//!     → provider may call back synchronously, before register returns
//!
//! At any time, from any thread:
//!     provider → EnablementChange callback
//!     → connection state swapped atomically
//!     → aggregate TraceKind broadcast to every registered module
//!
//! Per trace call:
//!     TraceModule → bridge.rs mirror → provider emit (errors swallowed)
//! ```
//!
//! # Design Decisions
//! - The provider is a capability trait; no OS tracing API is assumed
//! - Only registration failure is surfaced to callers
//! - Without a provider the core degrades to file-only logging

pub mod bridge;

use std::sync::Arc;

use bitflags::bitflags;
use thiserror::Error;
use uuid::Uuid;

pub use bridge::{ConnectionState, EnablementListener, ProviderBridge, ProviderConnection};

bitflags! {
    /// Provider-side trace categories.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Category: u32 {
        const ERROR = 1;
        const INFO = 1 << 1;
        const PRIVATE = 1 << 2;
        const ENTRY = 1 << 3;
        const PERFORMANCE = 1 << 4;
        const WARNING = 1 << 6;
        const FAILURE = 1 << 7;
        const START_END = 1 << 8;
    }
}

/// Provider-side severity. Higher values are more verbose.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Severity {
    #[default]
    Reserved = 0,
    Critical = 1,
    AlwaysOn = 2,
    Important = 3,
    Quiet = 4,
    Debug = 5,
    Noisy = 6,
    Verbose = 7,
    Loud = 8,
    Urgent = 9,
    Significant = 10,
    ImportantDetailed = 11,
    Informational = 12,
    InformationalDetailed = 13,
    Notable = 14,
    NotableDetailed = 15,
    Insignificant = 16,
}

impl From<u8> for Severity {
    fn from(level: u8) -> Self {
        match level {
            0 => Severity::Reserved,
            1 => Severity::Critical,
            2 => Severity::AlwaysOn,
            3 => Severity::Important,
            4 => Severity::Quiet,
            5 => Severity::Debug,
            6 => Severity::Noisy,
            7 => Severity::Verbose,
            8 => Severity::Loud,
            9 => Severity::Urgent,
            10 => Severity::Significant,
            11 => Severity::ImportantDetailed,
            12 => Severity::Informational,
            13 => Severity::InformationalDetailed,
            14 => Severity::Notable,
            15 => Severity::NotableDetailed,
            _ => Severity::Insignificant,
        }
    }
}

/// Opaque registration handle issued by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProviderHandle(pub u64);

/// Enablement state reported by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnablementChange {
    pub categories: Category,
    pub level: Severity,
    pub enabled: bool,
}

/// Callback a provider invokes whenever its enablement changes.
pub type EnablementCallback = Arc<dyn Fn(EnablementChange) + Send + Sync>;

/// Errors from the external provider capability.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider refused the registration.
    #[error("registration of provider {provider_id} failed: {reason}")]
    Registration { provider_id: Uuid, reason: String },

    /// A single emit failed.
    #[error("emit failed: {0}")]
    Emit(String),
}

/// The capability an OS-level trace provider exposes.
///
/// `register` may invoke `on_change` synchronously before it returns, and the
/// provider may invoke it again later from any thread.
pub trait TraceProvider: Send + Sync {
    fn register(
        &self,
        provider_id: Uuid,
        module_name: &str,
        on_change: EnablementCallback,
    ) -> Result<ProviderHandle, ProviderError>;

    fn is_enabled(&self, handle: ProviderHandle, category: Category, severity: Severity) -> bool;

    fn emit(
        &self,
        handle: ProviderHandle,
        module_name: &str,
        category: Category,
        severity: Severity,
        message: &str,
    ) -> Result<(), ProviderError>;

    fn unregister(&self, handle: ProviderHandle);
}
