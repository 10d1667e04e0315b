//! Module registry.
//!
//! # Design Decisions
//! - Names are case-insensitive; the lowercase name is the key
//! - `lookup` is find-or-create and atomic per name, so concurrent callers
//!   always share one instance
//! - The registry is the provider's enablement listener: kinds a provider
//!   asks for are OR-ed into every registered module

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::config::directive::{parse_str, DirectiveError};
use crate::provider::EnablementListener;
use crate::trace::kind::TraceKind;
use crate::trace::module::TraceModule;
use crate::trace::output::TraceOutput;

/// Module for the subsystem's own diagnostics.
pub const MISC_MODULE: &str = "misc";

/// Modules declared at start-up so that `global` directives reach them.
pub const WELL_KNOWN_MODULES: &[&str] = &[
    "JS",
    "Web",
    "Jumplist",
    "Web.OnPrem",
    "Web.Cloud",
    "CLSync",
    "UI",
    "DragDrop",
    "Control",
    "Rade",
    "Misc",
    "Install",
    "PNA",
    "DService",
    "AuthMan",
    "Launch",
    "Receiver",
    "G2M",
    "FTA",
    "Sync",
    "VTP",
    "Icon",
    "BG",
    "ConfigMgr",
    "CleanUp",
    "PassthroughClient",
    "IWS",
    "AML",
    "AML.JS",
    "Browsers",
    "Browsers.Handlers",
    "ConnLease",
    "AccountConfig",
    "AccountConfig.JS",
    "WebModules",
    "BCLib",
    "CustomPortal",
    "AccountMigration",
    "StoreBrowse",
];

/// Process-wide map from module name to module.
#[derive(Debug)]
pub struct ModuleRegistry {
    modules: DashMap<String, Arc<TraceModule>>,
    output: Arc<TraceOutput>,
}

impl ModuleRegistry {
    pub fn new(output: Arc<TraceOutput>) -> Self {
        Self {
            modules: DashMap::new(),
            output,
        }
    }

    pub fn output(&self) -> &Arc<TraceOutput> {
        &self.output
    }

    /// Find `name`, creating it with the default mask if missing.
    pub fn lookup(&self, name: &str) -> Arc<TraceModule> {
        let key = name.to_lowercase();
        if let Some(module) = self.modules.get(&key) {
            return module.clone();
        }
        self.modules
            .entry(key)
            .or_insert_with(|| Arc::new(TraceModule::new(name, self.output.clone())))
            .clone()
    }

    /// Find `name` without creating it.
    pub fn get(&self, name: &str) -> Option<Arc<TraceModule>> {
        self.modules.get(&name.to_lowercase()).map(|m| m.clone())
    }

    /// Register a module built elsewhere.
    ///
    /// If the name is taken, the new module inherits the existing mask and
    /// replaces it.
    pub fn add_module(&self, module: TraceModule) -> Arc<TraceModule> {
        let module = Arc::new(module);
        match self.modules.entry(module.name().to_string()) {
            Entry::Occupied(mut entry) => {
                module.set_mask(entry.get().mask());
                entry.insert(module.clone());
            }
            Entry::Vacant(entry) => {
                entry.insert(module.clone());
            }
        }
        module
    }

    /// Overwrite the mask of `name`, creating the module if needed.
    pub fn set_option(&self, name: &str, mask: TraceKind) -> Arc<TraceModule> {
        let module = self.lookup(name);
        module.set_mask(mask);
        module
    }

    /// Snapshot of every registered module.
    pub fn modules(&self) -> Vec<Arc<TraceModule>> {
        self.modules.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn declare_well_known(&self) {
        for name in WELL_KNOWN_MODULES {
            self.lookup(name);
        }
    }

    pub fn misc(&self) -> Arc<TraceModule> {
        self.lookup(MISC_MODULE)
    }

    /// Parse and apply directive text on top of the current masks and
    /// switches. Failures are traced through the misc module and returned.
    pub fn apply_directives(&self, text: &str) -> Vec<DirectiveError> {
        let parsed = parse_str(text);
        parsed.apply_masks(self);
        self.output
            .update_switches(|switches| parsed.apply_switches(switches));

        if !parsed.errors.is_empty() {
            let misc = self.misc();
            for error in &parsed.errors {
                tracing::warn!(error = %error, "Invalid trace directive");
                misc.error(format_args!("Invalid trace directive: {error}"));
            }
        }
        parsed.errors
    }
}

impl EnablementListener for ModuleRegistry {
    fn enable_kinds(&self, kinds: TraceKind) {
        for module in self.modules() {
            module.enable(kinds);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ModuleRegistry {
        ModuleRegistry::new(Arc::new(TraceOutput::detached()))
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = registry();
        let a = registry.lookup("Web");
        let b = registry.lookup("WEB");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_add_module_inherits_mask() {
        let registry = registry();
        registry.set_option("web", TraceKind::DEBUG | TraceKind::ERROR);

        let replacement = TraceModule::new("Web", registry.output().clone());
        let added = registry.add_module(replacement);
        assert_eq!(added.mask(), TraceKind::DEBUG | TraceKind::ERROR);
        assert!(Arc::ptr_eq(&added, &registry.lookup("web")));
    }

    #[test]
    fn test_well_known_modules_declared() {
        let registry = registry();
        registry.declare_well_known();
        assert_eq!(registry.len(), WELL_KNOWN_MODULES.len());
        assert!(registry.get("web.onprem").is_some());
        assert!(registry.get("storebrowse").is_some());
    }

    #[test]
    fn test_enable_kinds_reaches_every_module() {
        let registry = registry();
        registry.lookup("a");
        registry.lookup("b");
        registry.enable_kinds(TraceKind::DETAIL);
        assert!(registry.modules().iter().all(|m| m.mask().contains(TraceKind::DETAIL)));
    }

    #[test]
    fn test_apply_directives_collects_errors() {
        let registry = registry();
        let errors = registry.apply_directives("web debug bogus\n*verbose\n");
        assert_eq!(errors.len(), 1);
        assert!(registry.lookup("web").is_enabled(TraceKind::DEBUG));
        assert!(registry.output().switches().verbose_kinds);
    }
}
