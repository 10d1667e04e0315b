//! Orderly teardown of a trace context.

use std::sync::atomic::Ordering;
use std::sync::PoisonError;

use crate::lifecycle::startup::TraceContext;

impl TraceContext {
    /// Stop watching, release both provider registrations, write the final
    /// line and close the sink. Safe to call repeatedly.
    ///
    /// Modules stay usable afterwards; their records go nowhere.
    pub fn exit(&self) {
        if self.exited.swap(true, Ordering::SeqCst) {
            return;
        }

        let watcher = self.watcher.lock().unwrap_or_else(PoisonError::into_inner).take();
        drop(watcher);

        let output = self.registry.output();
        if let Some(bridge) = output.bridge() {
            bridge.unregister();
        }
        output.write_raw("Trace provider stopped");
        output.close_sink();

        tracing::info!(process = %self.settings.process_name, "Trace context closed");
    }

    pub fn is_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }
}

impl Drop for TraceContext {
    fn drop(&mut self) {
        self.exit();
    }
}
