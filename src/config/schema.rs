//! Settings schema definitions.
//!
//! Every field has a default so an empty file, or no file, is a valid
//! configuration. Trace masks are not part of the settings: they come from
//! the directive file (see `directive.rs`).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sink::file::DEFAULT_MAX_LOG_BYTES;

/// Provider id for the primary connection.
pub const PRIMARY_PROVIDER_ID: Uuid = Uuid::from_u128(0xABCCE31F_3350_4EFF_CA4E_C9A5BE4F4082);

/// Provider id for the always-on connection.
pub const ALWAYS_ON_PROVIDER_ID: Uuid = Uuid::from_u128(0x23498DFD_FBFD_4458_B989_446EBCE55DF9);

/// Root settings for the trace subsystem.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TraceSettings {
    /// Directory holding the directive file, the log and the problem file.
    pub log_dir: PathBuf,

    /// Directive file name inside `log_dir`. `<name>.txt` is tried second.
    pub config_file: String,

    /// Process name used for the log file and provider module names.
    pub process_name: String,

    /// Directives applied when no directive file exists. `None` leaves
    /// tracing disabled in that case.
    pub default_directives: Option<String>,

    /// Log files larger than this are deleted at start-up.
    pub max_log_bytes: u64,

    /// Re-apply the directive file whenever it changes.
    pub watch_config: bool,

    pub problems: ProblemSettings,

    pub provider: ProviderSettings,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            config_file: "log.conf".to_string(),
            process_name: "diagtrace".to_string(),
            default_directives: None,
            max_log_bytes: DEFAULT_MAX_LOG_BYTES,
            watch_config: false,
            problems: ProblemSettings::default(),
            provider: ProviderSettings::default(),
        }
    }
}

impl TraceSettings {
    /// `<log_dir>/<process_name>.txt`
    pub fn log_path(&self) -> PathBuf {
        self.log_dir.join(format!("{}.txt", self.process_name))
    }

    pub fn problem_path(&self) -> PathBuf {
        self.log_dir.join(&self.problems.file_name)
    }
}

/// Problem reporter settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProblemSettings {
    pub enabled: bool,

    /// Problem file name inside `log_dir`.
    pub file_name: String,

    /// Write every completed call, not only failed ones.
    pub report_all_calls: bool,
}

impl Default for ProblemSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            file_name: "problem.txt".to_string(),
            report_all_calls: false,
        }
    }
}

/// External provider settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Register with a provider when one is supplied at start-up.
    pub enabled: bool,

    pub primary_id: Uuid,

    pub always_on_id: Uuid,

    /// Primary connection module name is `<primary_prefix>_<process_name>`.
    pub primary_prefix: String,

    pub always_on_prefix: String,

    /// Modules whose records are also mirrored to the always-on connection.
    pub always_on_modules: Vec<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            primary_id: PRIMARY_PROVIDER_ID,
            always_on_id: ALWAYS_ON_PROVIDER_ID,
            primary_prefix: "Receiver".to_string(),
            always_on_prefix: "AOLReceiver".to_string(),
            always_on_modules: Vec::new(),
        }
    }
}
