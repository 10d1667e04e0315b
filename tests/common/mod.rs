//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use diagtrace::provider::{
    Category, EnablementCallback, EnablementChange, ProviderError, ProviderHandle, Severity,
    TraceProvider,
};
use diagtrace::TraceSettings;
use uuid::Uuid;

/// Settings rooted at `dir` with a fixed process name.
pub fn settings(dir: &Path) -> TraceSettings {
    TraceSettings {
        log_dir: dir.to_path_buf(),
        process_name: "itest".to_string(),
        ..TraceSettings::default()
    }
}

pub fn write_directives(dir: &Path, text: &str) {
    fs::write(dir.join("log.conf"), text).unwrap();
}

pub fn read_log(dir: &Path) -> String {
    fs::read_to_string(dir.join("itest.txt")).unwrap_or_default()
}

/// One call to `emit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emitted {
    pub handle: ProviderHandle,
    pub module: String,
    pub category: Category,
    pub severity: Severity,
    pub message: String,
}

struct Registration {
    handle: ProviderHandle,
    provider_id: Uuid,
    module: String,
    callback: EnablementCallback,
}

/// In-process stand-in for an OS trace provider.
#[derive(Default)]
pub struct RecordingProvider {
    next_handle: AtomicU64,
    registrations: Mutex<Vec<Registration>>,
    emitted: Mutex<Vec<Emitted>>,
    unregistered: Mutex<Vec<ProviderHandle>>,
    fire_on_register: Option<EnablementChange>,
    reject: Option<Uuid>,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke the callback from inside `register`, before it returns.
    pub fn firing_on_register(change: EnablementChange) -> Self {
        Self {
            fire_on_register: Some(change),
            ..Self::default()
        }
    }

    /// Refuse registrations for `provider_id`.
    pub fn rejecting(provider_id: Uuid) -> Self {
        Self {
            reject: Some(provider_id),
            ..Self::default()
        }
    }

    /// Deliver an enablement change to every registration.
    pub fn fire(&self, change: EnablementChange) {
        let callbacks: Vec<EnablementCallback> = self
            .registrations
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.callback.clone())
            .collect();
        for callback in callbacks {
            callback(change);
        }
    }

    pub fn registered_modules(&self) -> Vec<String> {
        self.registrations
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.module.clone())
            .collect()
    }

    pub fn handle_for(&self, provider_id: Uuid) -> Option<ProviderHandle> {
        self.registrations
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.provider_id == provider_id)
            .map(|r| r.handle)
    }

    pub fn emitted(&self) -> Vec<Emitted> {
        self.emitted.lock().unwrap().clone()
    }

    pub fn unregistered(&self) -> Vec<ProviderHandle> {
        self.unregistered.lock().unwrap().clone()
    }
}

impl TraceProvider for RecordingProvider {
    fn register(
        &self,
        provider_id: Uuid,
        module_name: &str,
        on_change: EnablementCallback,
    ) -> Result<ProviderHandle, ProviderError> {
        if self.reject == Some(provider_id) {
            return Err(ProviderError::Registration {
                provider_id,
                reason: "rejected by test provider".to_string(),
            });
        }

        let handle = ProviderHandle(self.next_handle.fetch_add(1, Ordering::SeqCst) + 1);
        self.registrations.lock().unwrap().push(Registration {
            handle,
            provider_id,
            module: module_name.to_string(),
            callback: on_change.clone(),
        });

        if let Some(change) = self.fire_on_register {
            on_change(change);
        }
        Ok(handle)
    }

    fn is_enabled(&self, _handle: ProviderHandle, _category: Category, _severity: Severity) -> bool {
        true
    }

    fn emit(
        &self,
        handle: ProviderHandle,
        module_name: &str,
        category: Category,
        severity: Severity,
        message: &str,
    ) -> Result<(), ProviderError> {
        if message.contains("explode") {
            return Err(ProviderError::Emit("test provider refused message".to_string()));
        }
        self.emitted.lock().unwrap().push(Emitted {
            handle,
            module: module_name.to_string(),
            category,
            severity,
            message: message.to_string(),
        });
        Ok(())
    }

    fn unregister(&self, handle: ProviderHandle) {
        self.unregistered.lock().unwrap().push(handle);
    }
}

pub fn enabled(categories: Category, level: Severity) -> EnablementChange {
    EnablementChange {
        categories,
        level,
        enabled: true,
    }
}
