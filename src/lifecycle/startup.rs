//! Start-up orchestration.
//!
//! # Responsibilities
//! - Build the output pipeline, the registry and the well-known modules
//! - Apply the directive file, then open the sink with the resulting switches
//! - Register with the external provider, if one is supplied
//! - Write the session header and report deferred start-up failures
//!
//! # Design Decisions
//! - Only provider registration failure is fatal; everything else degrades
//! - Failures before the sink exists are traced once it does
//! - The provider is registered after the masks are set, so its callbacks
//!   add to directive masks instead of being overwritten by them

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use chrono::{Local, Utc};
use notify::RecommendedWatcher;

use crate::config::directive::{DirectiveError, Switches};
use crate::config::loader::{load_directives, DirectiveSource};
use crate::config::schema::TraceSettings;
use crate::config::watcher::DirectiveWatcher;
use crate::problem::{CallOutcome, ProblemReporter};
use crate::provider::{EnablementListener, ProviderBridge, ProviderError, TraceProvider};
use crate::sink::{FileSink, RotationPolicy};
use crate::trace::module::TraceModule;
use crate::trace::output::TraceOutput;
use crate::trace::registry::ModuleRegistry;

const SEPARATOR: &str =
    "===============================================================================";

/// A running trace subsystem.
///
/// Dropping the context performs [`TraceContext::exit`].
pub struct TraceContext {
    pub(super) settings: TraceSettings,
    pub(super) registry: Arc<ModuleRegistry>,
    pub(super) directive_source: Option<DirectiveSource>,
    pub(super) watcher: Mutex<Option<RecommendedWatcher>>,
    pub(super) exited: AtomicBool,
}

impl std::fmt::Debug for TraceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceContext")
            .field("process_name", &self.settings.process_name)
            .field("directive_source", &self.directive_source)
            .field("modules", &self.registry.len())
            .finish()
    }
}

impl TraceContext {
    /// Start tracing for one process.
    ///
    /// `args` are recorded in the header. Returns an error only when the
    /// provider refuses registration.
    pub fn start(
        settings: TraceSettings,
        args: &[String],
        provider: Option<Arc<dyn TraceProvider>>,
    ) -> Result<Self, ProviderError> {
        let problems = ProblemReporter::new(
            settings.problem_path(),
            session_info(&settings),
            settings.problems.enabled,
            settings.problems.report_all_calls,
        );
        let output = Arc::new(TraceOutput::new(problems));
        let registry = Arc::new(ModuleRegistry::new(output.clone()));
        registry.declare_well_known();

        let mut deferred: Vec<String> = Vec::new();
        let directive_source = match load_directives(&settings) {
            Some((source, parsed)) => {
                let mut switches = Switches::default();
                parsed.apply(&registry, &mut switches);
                output.set_switches(switches);
                deferred.extend(parsed.errors.iter().map(directive_failure));
                open_sink(&settings, switches, &output, &mut deferred);
                Some(source)
            }
            None => {
                tracing::info!(
                    log_dir = ?settings.log_dir,
                    "No trace directives found, file tracing disabled"
                );
                None
            }
        };

        if let Some(provider) = provider.filter(|_| settings.provider.enabled) {
            let weak = Arc::downgrade(&registry);
            let listener: Weak<dyn EnablementListener> = weak;
            match ProviderBridge::connect(
                provider,
                &settings.provider,
                &settings.process_name,
                listener,
            ) {
                Ok(bridge) => {
                    let _ = output.set_bridge(bridge);
                }
                Err(e) => {
                    output.write_raw(&format!("Trace provider initialization failed: {e}"));
                    output.close_sink();
                    return Err(e);
                }
            }
        }

        let context = Self {
            settings,
            registry,
            directive_source,
            watcher: Mutex::new(None),
            exited: AtomicBool::new(false),
        };

        context.write_header(args);

        if !deferred.is_empty() {
            let misc = context.misc();
            for message in &deferred {
                misc.error(message);
            }
        }

        if context.settings.watch_config {
            if let Some(DirectiveSource::File(path)) = &context.directive_source {
                context.watch(path.clone());
            }
        }

        context.registry.output().flush();

        tracing::info!(
            process = %context.settings.process_name,
            modules = context.registry.len(),
            file_tracing = context.registry.output().has_sink(),
            provider = context.registry.output().bridge().is_some(),
            "Trace context started"
        );
        Ok(context)
    }

    fn watch(&self, path: std::path::PathBuf) {
        match DirectiveWatcher::new(&path, &self.registry).run() {
            Ok(watcher) => {
                *self.watcher.lock().unwrap_or_else(PoisonError::into_inner) = Some(watcher);
            }
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "Failed to watch trace directives");
                self.misc().error_from(&e, "Failed to watch trace directives");
            }
        }
    }

    fn write_header(&self, args: &[String]) {
        let output = self.registry.output();
        let switches = output.switches();
        let now = Utc::now();

        output.write_raw(SEPARATOR);
        output.write_raw(&format!("Session: {}", session_info(&self.settings)));
        output.write_raw(&format!(
            "Started: {} UTC / {} local",
            now.format("%Y-%m-%d %H:%M:%S"),
            now.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        ));
        if args.is_empty() {
            output.write_raw("Arguments: (no arguments)");
        } else {
            for (index, arg) in args.iter().enumerate() {
                output.write_raw(&format!("Argument[{index}]: {arg}"));
            }
        }
        output.write_raw(&format!(
            "Switches: *deletefile={} *verbose={} *milliseconds={}",
            switches.reset_log_on_start, switches.verbose_kinds, switches.millisecond_timestamps
        ));
        output.write_raw(SEPARATOR);
    }

    pub fn settings(&self) -> &TraceSettings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    pub fn output(&self) -> &Arc<TraceOutput> {
        self.registry.output()
    }

    /// Where the directives came from, or `None` when file tracing is off.
    pub fn directive_source(&self) -> Option<&DirectiveSource> {
        self.directive_source.as_ref()
    }

    /// Find or create a module.
    pub fn module(&self, name: &str) -> Arc<TraceModule> {
        self.registry.lookup(name)
    }

    /// Module for the subsystem's own diagnostics.
    pub fn misc(&self) -> Arc<TraceModule> {
        self.registry.misc()
    }

    pub fn problems(&self) -> &ProblemReporter {
        self.registry.output().problems()
    }

    pub fn switches(&self) -> Switches {
        self.registry.output().switches()
    }

    /// Apply more directives at runtime.
    pub fn apply_directives(&self, text: &str) -> Vec<DirectiveError> {
        self.registry.apply_directives(text)
    }

    /// Complete the current call on this thread.
    pub fn call_complete(&self) -> CallOutcome {
        self.misc().call_complete()
    }
}

fn session_info(settings: &TraceSettings) -> String {
    format!(
        "{} ({} {})",
        settings.process_name,
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )
}

fn directive_failure(error: &DirectiveError) -> String {
    tracing::warn!(error = %error, "Invalid trace directive");
    format!("Invalid trace directive: {error}")
}

fn open_sink(
    settings: &TraceSettings,
    switches: Switches,
    output: &TraceOutput,
    deferred: &mut Vec<String>,
) {
    let path = settings.log_path();
    let policy = RotationPolicy {
        reset: switches.reset_log_on_start,
        max_bytes: settings.max_log_bytes,
    };
    match FileSink::open(&path, policy) {
        Ok(sink) => output.set_sink(Box::new(sink)),
        Err(e) => {
            tracing::warn!(path = ?path, error = %e, "Failed to open trace log, file tracing disabled");
            deferred.push(format!("Failed to open trace log {}: {e}", path.display()));
        }
    }
}
