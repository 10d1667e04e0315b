mod common;

use std::fs;
use std::time::{Duration, Instant};

use diagtrace::config::loader::load_settings;
use diagtrace::{TraceContext, TraceKind};

#[test]
fn test_settings_file_drives_context() {
    let dir = tempfile::tempdir().unwrap();
    let settings_path = dir.path().join("trace.toml");
    fs::write(
        &settings_path,
        format!(
            r#"
            log_dir = "{}"
            process_name = "fromfile"
            config_file = "trace.directives"
            default_directives = "ui debug"
            "#,
            dir.path().display().to_string().replace('\\', "\\\\")
        ),
    )
    .unwrap();

    let settings = load_settings(&settings_path).unwrap();
    let context = TraceContext::start(settings, &[], None).unwrap();
    assert!(context.module("ui").is_enabled(TraceKind::DEBUG));
    context.exit();

    assert!(dir.path().join("fromfile.txt").exists());
}

#[test]
fn test_directive_file_changes_are_reapplied() {
    let dir = tempfile::tempdir().unwrap();
    common::write_directives(dir.path(), "web error\n");
    let mut settings = common::settings(dir.path());
    settings.watch_config = true;

    let context = TraceContext::start(settings, &[], None).unwrap();
    let web = context.module("web");
    assert!(!web.is_enabled(TraceKind::DEBUG));

    common::write_directives(dir.path(), "web debug\n*milliseconds\n");

    let deadline = Instant::now() + Duration::from_secs(10);
    let reloaded = || web.is_enabled(TraceKind::DEBUG) && context.switches().millisecond_timestamps;
    while !reloaded() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
    }
    assert!(web.is_enabled(TraceKind::DEBUG));
    assert!(context.switches().millisecond_timestamps);
}
