//! Provider connections and kind translation.
//!
//! # Responsibilities
//! - Register with the external provider and hold the handle
//! - Track the provider's last reported enablement state
//! - Translate provider categories/levels into trace kinds and broadcast them
//! - Mirror trace records into the provider, swallowing emit failures

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use arc_swap::ArcSwap;
use uuid::Uuid;

use crate::config::schema::ProviderSettings;
use crate::provider::{
    Category, EnablementCallback, EnablementChange, ProviderError, ProviderHandle, Severity,
    TraceProvider,
};
use crate::trace::kind::TraceKind;

/// Receives the aggregate kinds a provider asked for.
pub trait EnablementListener: Send + Sync {
    fn enable_kinds(&self, kinds: TraceKind);
}

/// Last enablement state reported by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionState {
    pub categories: Category,
    pub level: Severity,
    pub enabled: bool,
}

impl From<EnablementChange> for ConnectionState {
    fn from(change: EnablementChange) -> Self {
        Self {
            categories: change.categories,
            level: change.level,
            enabled: change.enabled,
        }
    }
}

impl ConnectionState {
    /// Category on at any level.
    pub fn is_category_enabled(&self, category: Category) -> bool {
        self.enabled && self.categories.contains(category) && self.level > Severity::Reserved
    }

    /// Aggregate trace kinds implied by this state.
    pub fn trace_kinds(&self) -> TraceKind {
        let mut kinds = TraceKind::empty();

        if self.is_category_enabled(Category::ENTRY) {
            kinds |= TraceKind::ENTRY_EXIT | TraceKind::BLOCK_ENTRY | TraceKind::BLOCK_EXIT;
        }
        if self.is_category_enabled(Category::ERROR) {
            kinds |= TraceKind::ERROR | TraceKind::NETWORK_ERROR;
        }
        if self.is_category_enabled(Category::PERFORMANCE) {
            kinds |= TraceKind::TIMING;
        }
        if self.is_category_enabled(Category::INFO) {
            kinds |= TraceKind::MESSAGE;
            if self.level <= Severity::InformationalDetailed {
                kinds |= TraceKind::DETAIL;
            }
        }

        kinds
    }
}

/// Provider category for a trace kind.
pub fn category_for(kind: TraceKind) -> Category {
    if kind.contains(TraceKind::ERROR) {
        Category::ERROR
    } else if kind.intersects(TraceKind::BLOCK_ENTRY | TraceKind::BLOCK_EXIT | TraceKind::ENTRY_EXIT) {
        Category::ENTRY
    } else if kind.contains(TraceKind::TIMING) {
        Category::PERFORMANCE
    } else {
        Category::INFO
    }
}

/// Provider severity for a trace kind.
pub fn severity_for(kind: TraceKind) -> Severity {
    if kind.contains(TraceKind::DETAIL) {
        Severity::InformationalDetailed
    } else {
        Severity::Important
    }
}

/// One registration with an external provider.
pub struct ProviderConnection {
    provider: Arc<dyn TraceProvider>,
    provider_id: Uuid,
    module_name: String,
    state: ArcSwap<ConnectionState>,
    handle: Mutex<Option<ProviderHandle>>,
}

impl std::fmt::Debug for ProviderConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConnection")
            .field("provider_id", &self.provider_id)
            .field("module_name", &self.module_name)
            .field("state", &**self.state.load())
            .finish()
    }
}

impl ProviderConnection {
    /// Register with `provider`.
    ///
    /// The connection exists before the provider is called, so a callback
    /// fired from inside `register` already updates its state.
    pub fn register(
        provider: Arc<dyn TraceProvider>,
        provider_id: Uuid,
        module_name: impl Into<String>,
        listener: Weak<dyn EnablementListener>,
    ) -> Result<Arc<Self>, ProviderError> {
        let connection = Arc::new(Self {
            provider,
            provider_id,
            module_name: module_name.into(),
            state: ArcSwap::from_pointee(ConnectionState::default()),
            handle: Mutex::new(None),
        });

        let weak = Arc::downgrade(&connection);
        let on_change: EnablementCallback = Arc::new(move |change: EnablementChange| {
            if let Some(connection) = weak.upgrade() {
                let listener = listener.upgrade();
                connection.on_enablement_changed(change, listener.as_deref());
            }
        });

        let handle = connection
            .provider
            .register(provider_id, &connection.module_name, on_change)
            .inspect_err(|e| {
                tracing::error!(provider_id = %provider_id, error = %e, "Trace provider registration failed");
            })?;

        *connection.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        tracing::info!(
            provider_id = %provider_id,
            module = %connection.module_name,
            "Trace provider registered"
        );
        Ok(connection)
    }

    /// Provider-side module name of this connection.
    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// Whether the provider last reported this connection as on.
    pub fn enabled(&self) -> bool {
        self.state.load().enabled
    }

    pub fn state(&self) -> ConnectionState {
        **self.state.load()
    }

    /// Force the connection off until the provider reports again.
    pub fn disable(&self) {
        self.state.rcu(|state| ConnectionState {
            enabled: false,
            ..**state
        });
    }

    fn handle(&self) -> Option<ProviderHandle> {
        *self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handle a provider enablement callback.
    pub fn on_enablement_changed(
        &self,
        change: EnablementChange,
        listener: Option<&dyn EnablementListener>,
    ) {
        let mut state = ConnectionState::from(change);
        let kinds = state.trace_kinds();
        let traces_nothing = state.enabled && kinds.is_empty();
        if traces_nothing {
            state.enabled = false;
        }
        self.state.store(Arc::new(state));

        if traces_nothing {
            tracing::debug!(
                module = %self.module_name,
                categories = ?state.categories,
                level = ?state.level,
                "Trace provider enabled nothing we trace, disabling"
            );
            return;
        }
        if !state.enabled {
            tracing::debug!(module = %self.module_name, "Trace provider disabled");
            return;
        }

        tracing::debug!(module = %self.module_name, kinds = %kinds.describe(), "Trace provider enabled kinds");
        if let Some(listener) = listener {
            listener.enable_kinds(kinds | TraceKind::CONTINUOUS);
        }
    }

    /// Forward one record to the provider. Never fails.
    pub fn trace(&self, tag: &str, category: Category, severity: Severity, message: &str) {
        let module = format!("{}_{}", self.module_name, tag.trim_end());
        self.emit(&module, category, severity, message);
    }

    /// Forward a raw, untagged line as Info/Urgent.
    pub fn trace_raw(&self, message: &str) {
        self.emit(&self.module_name, Category::INFO, Severity::Urgent, message);
    }

    fn emit(&self, module: &str, category: Category, severity: Severity, message: &str) {
        if !self.enabled() {
            return;
        }
        let Some(handle) = self.handle() else {
            return;
        };
        if !self.provider.is_enabled(handle, category, severity) {
            return;
        }
        if let Err(e) = self.provider.emit(handle, module, category, severity, message) {
            metrics::counter!("diagtrace_provider_emit_failures_total").increment(1);
            tracing::debug!(module = %module, error = %e, "Trace provider emit failed");
        }
    }

    /// Release the registration. Safe to call repeatedly.
    pub fn unregister(&self) {
        let handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            self.provider.unregister(handle);
            tracing::info!(provider_id = %self.provider_id, "Trace provider unregistered");
        }
    }
}

impl Drop for ProviderConnection {
    fn drop(&mut self) {
        self.unregister();
    }
}

/// The primary and always-on provider connections.
#[derive(Debug, Default)]
pub struct ProviderBridge {
    primary: Option<Arc<ProviderConnection>>,
    always_on: Option<Arc<ProviderConnection>>,
    always_on_modules: HashSet<String>,
}

impl ProviderBridge {
    /// A bridge with no provider: every operation is a no-op.
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Register both connections for `process_name`.
    ///
    /// If the always-on registration fails the primary one is released.
    pub fn connect(
        provider: Arc<dyn TraceProvider>,
        settings: &ProviderSettings,
        process_name: &str,
        listener: Weak<dyn EnablementListener>,
    ) -> Result<Self, ProviderError> {
        let primary = ProviderConnection::register(
            provider.clone(),
            settings.primary_id,
            format!("{}_{}", settings.primary_prefix, process_name),
            listener.clone(),
        )?;

        let always_on = match ProviderConnection::register(
            provider,
            settings.always_on_id,
            format!("{}_{}", settings.always_on_prefix, process_name),
            listener,
        ) {
            Ok(connection) => connection,
            Err(e) => {
                primary.unregister();
                return Err(e);
            }
        };

        Ok(Self {
            primary: Some(primary),
            always_on: Some(always_on),
            always_on_modules: settings
                .always_on_modules
                .iter()
                .map(|name| name.to_lowercase())
                .collect(),
        })
    }

    pub fn primary(&self) -> Option<&Arc<ProviderConnection>> {
        self.primary.as_ref()
    }

    pub fn always_on(&self) -> Option<&Arc<ProviderConnection>> {
        self.always_on.as_ref()
    }

    /// Whether `name` is mirrored to the always-on connection.
    pub fn is_always_on_module(&self, name: &str) -> bool {
        self.always_on_modules.contains(&name.to_lowercase())
    }

    /// Mirror a gated trace record.
    pub fn mirror(&self, name: &str, tag: &str, kind: TraceKind, message: &str) {
        let category = category_for(kind);
        let severity = severity_for(kind);

        if let Some(primary) = &self.primary {
            primary.trace(tag, category, severity, message);
        }
        if let Some(always_on) = &self.always_on {
            if self.is_always_on_module(name) {
                always_on.trace(tag, category, severity, message);
            }
        }
    }

    /// Emit directly to the always-on connection.
    pub fn always_on_emit(&self, tag: &str, category: Category, severity: Severity, message: &str) {
        if let Some(always_on) = &self.always_on {
            always_on.trace(tag, category, severity, message);
        }
    }

    /// Forward a raw line to the primary connection.
    pub fn raw(&self, message: &str) {
        if let Some(primary) = &self.primary {
            primary.trace_raw(message);
        }
    }

    pub fn disable_primary(&self) {
        if let Some(primary) = &self.primary {
            primary.disable();
        }
    }

    /// Release both registrations. Safe to call repeatedly.
    pub fn unregister(&self) {
        for connection in [&self.primary, &self.always_on].into_iter().flatten() {
            connection.unregister();
        }
    }
}
