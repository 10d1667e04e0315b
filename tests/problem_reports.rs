mod common;

use std::fs;

use diagtrace::{CallOutcome, TraceContext, TraceKind};

const STEP: TraceKind = TraceKind::MESSAGE.union(TraceKind::CALL);
const FAILURE: TraceKind = TraceKind::ERROR.union(TraceKind::CALL);

#[test]
fn test_successful_call_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let context = TraceContext::start(common::settings(dir.path()), &[], None).unwrap();
    let web = context.module("web");

    for step in 0..5 {
        web.trace(STEP, format_args!("step {step}"));
    }
    assert_eq!(context.call_complete(), CallOutcome::Discarded);
    assert!(!dir.path().join("problem.txt").exists());
    assert!(context.problems().buffered_lines().is_empty());
}

#[test]
fn test_failed_call_writes_framed_report() {
    let dir = tempfile::tempdir().unwrap();
    common::write_directives(dir.path(), "web call\n");
    let context = TraceContext::start(common::settings(dir.path()), &[], None).unwrap();
    let web = context.module("web");

    for step in 0..4 {
        web.trace(STEP, format_args!("step {step}"));
    }
    web.trace(FAILURE, "step 4 failed");

    let CallOutcome::Flushed(lines) = context.call_complete() else {
        panic!("expected a flushed report");
    };
    assert_eq!(lines.len(), 6);

    let report = fs::read_to_string(dir.path().join("problem.txt")).unwrap();
    let report: Vec<&str> = report.lines().collect();
    assert_eq!(report.len(), 7);
    assert!(report[0].starts_with(">>> itest (diagtrace "));
    assert!(report[1].ends_with("-----------------------"));
    assert!(report[2].ends_with(" step 0"));
    assert!(report[6].ends_with(" step 4 failed"));

    context.exit();
    let log = common::read_log(dir.path());
    assert!(log.lines().any(|line| line == report[6]));
}

#[test]
fn test_report_all_calls() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = common::settings(dir.path());
    settings.problems.report_all_calls = true;
    let context = TraceContext::start(settings, &[], None).unwrap();

    context.module("web").trace(STEP, "fine");
    assert!(matches!(context.call_complete(), CallOutcome::Flushed(_)));
    assert!(dir.path().join("problem.txt").exists());
}

#[test]
fn test_disabled_reporter_ignores_calls() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = common::settings(dir.path());
    settings.problems.enabled = false;
    let context = TraceContext::start(settings, &[], None).unwrap();

    context.module("web").call_completed_with_error("failed");
    assert_eq!(context.call_complete(), CallOutcome::Disabled);
    assert!(!dir.path().join("problem.txt").exists());
}

#[test]
fn test_buffers_are_per_thread() {
    let dir = tempfile::tempdir().unwrap();
    let context = TraceContext::start(common::settings(dir.path()), &[], None).unwrap();
    let web = context.module("web");
    let problems = context.problems();

    web.trace(STEP, "main thread step");
    std::thread::scope(|scope| {
        scope.spawn(|| {
            web.trace(FAILURE, "worker failed");
            assert!(problems.error_seen());
            assert_eq!(problems.buffered_lines().len(), 2);
        });
    });

    assert!(!problems.error_seen());
    assert_eq!(context.call_complete(), CallOutcome::Discarded);
}

#[test]
fn test_call_completed_with_error_from_flushes_chain() {
    let dir = tempfile::tempdir().unwrap();
    let context = TraceContext::start(common::settings(dir.path()), &[], None).unwrap();
    let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");

    context
        .module("web")
        .call_completed_with_error_from(&err, "could not save");

    let report = fs::read_to_string(dir.path().join("problem.txt")).unwrap();
    assert!(report.contains(" could not save"));
    assert!(report.contains(" access denied"));
    assert!(!context.problems().error_seen());
}

#[test]
fn test_suppression_spans_nested_calls() {
    let dir = tempfile::tempdir().unwrap();
    let context = TraceContext::start(common::settings(dir.path()), &[], None).unwrap();
    let web = context.module("web");
    let problems = context.problems();

    problems.suppress_call_complete();
    web.trace(FAILURE, "inner failed");
    assert_eq!(context.call_complete(), CallOutcome::Suppressed);
    assert!(!dir.path().join("problem.txt").exists());

    problems.enable_call_complete();
    web.trace(FAILURE, "outer failed");
    let CallOutcome::Flushed(lines) = context.call_complete() else {
        panic!("expected a flushed report");
    };
    assert_eq!(lines.len(), 3);
}
