//! Settings and directive loading from disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::directive::{parse_str, ParsedDirectives};
use crate::config::schema::TraceSettings;
use crate::config::validation::{validate_settings, ValidationError};

/// Error type for settings loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate settings from a TOML file.
pub fn load_settings(path: &Path) -> Result<TraceSettings, ConfigError> {
    let content = fs::read_to_string(path)?;
    let settings: TraceSettings = toml::from_str(&content)?;

    validate_settings(&settings).map_err(ConfigError::Validation)?;

    Ok(settings)
}

/// Where the active directives came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveSource {
    File(PathBuf),
    Defaults,
}

/// Directive file to use: `<log_dir>/<config_file>`, else the same with a
/// `.txt` suffix.
pub fn directive_path(settings: &TraceSettings) -> Option<PathBuf> {
    let primary = settings.log_dir.join(&settings.config_file);
    if primary.is_file() {
        return Some(primary);
    }
    let fallback = settings.log_dir.join(format!("{}.txt", settings.config_file));
    fallback.is_file().then_some(fallback)
}

/// Read the directive file, or fall back to the default directives.
///
/// `None` means tracing stays disabled: there is no file and no defaults, or
/// the file could not be read.
pub fn load_directives(settings: &TraceSettings) -> Option<(DirectiveSource, ParsedDirectives)> {
    match directive_path(settings) {
        Some(path) => match fs::read_to_string(&path) {
            Ok(text) => {
                tracing::info!(path = ?path, "Loaded trace directives");
                Some((DirectiveSource::File(path), parse_str(&text)))
            }
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "Failed to read trace directives, tracing disabled");
                None
            }
        },
        None => settings
            .default_directives
            .as_deref()
            .map(|text| (DirectiveSource::Defaults, parse_str(text))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(dir: &Path) -> TraceSettings {
        TraceSettings {
            log_dir: dir.to_path_buf(),
            ..TraceSettings::default()
        }
    }

    #[test]
    fn test_txt_fallback_then_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings(dir.path());
        assert!(load_directives(&settings).is_none());

        settings.default_directives = Some("web debug".into());
        let (source, parsed) = load_directives(&settings).unwrap();
        assert_eq!(source, DirectiveSource::Defaults);
        assert_eq!(parsed.directives.len(), 1);

        fs::write(dir.path().join("log.conf.txt"), "*verbose\n").unwrap();
        let (source, _) = load_directives(&settings).unwrap();
        assert_eq!(source, DirectiveSource::File(dir.path().join("log.conf.txt")));

        fs::write(dir.path().join("log.conf"), "ui error\n").unwrap();
        let (source, _) = load_directives(&settings).unwrap();
        assert_eq!(source, DirectiveSource::File(dir.path().join("log.conf")));
    }

    #[test]
    fn test_load_settings_rejects_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.toml");
        fs::write(&path, "max_log_bytes = 0\n").unwrap();
        let err = load_settings(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("max_log_bytes"));
    }

    #[test]
    fn test_load_settings_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.toml");
        fs::write(&path, "log_dir = [").unwrap();
        assert!(matches!(load_settings(&path), Err(ConfigError::Parse(_))));
    }
}
