//! Directive file watcher for hot reload.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::trace::registry::ModuleRegistry;

/// Re-applies the directive file to a registry whenever it changes.
///
/// Directives are applied on top of the current masks, so a reload can
/// add or remove kinds but never resets a module to its default.
pub struct DirectiveWatcher {
    path: PathBuf,
    registry: Weak<ModuleRegistry>,
}

impl DirectiveWatcher {
    pub fn new(path: &Path, registry: &Arc<ModuleRegistry>) -> Self {
        Self {
            path: path.to_path_buf(),
            registry: Arc::downgrade(registry),
        }
    }

    /// Start watching the file. The returned watcher stops when dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();
        let registry = self.registry;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    let Some(registry) = registry.upgrade() else {
                        return;
                    };
                    tracing::info!(path = ?path, "Trace directive change detected, reloading...");
                    match fs::read_to_string(&path) {
                        Ok(text) => {
                            let errors = registry.apply_directives(&text);
                            tracing::info!(invalid = errors.len(), "Trace directives reloaded");
                        }
                        Err(e) => {
                            tracing::error!(
                                "Failed to reload trace directives: {}. Keeping current masks.",
                                e
                            );
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Trace directive watcher started");
        Ok(watcher)
    }
}
