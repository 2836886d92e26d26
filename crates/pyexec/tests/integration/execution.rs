use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pyexec::runner::Runner;
use pyexec::types::Outcome;

use super::{fixture_source, scratch_is_empty, test_config};

#[tokio::test]
async fn test_print_hello() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Runner::new(test_config(dir.path()));

    let report = runner
        .submit(Some(fixture_source("hello.py")))
        .await
        .expect("Execution failed");

    assert!(report.is_success());
    assert_eq!(report.result.outcome, Outcome::Success);
    assert_eq!(report.output_text(), "hi\n");
    assert_eq!(report.error_text(), None);
    assert!(scratch_is_empty(dir.path()));
}

#[tokio::test]
async fn test_runtime_error_keeps_partial_output() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Runner::new(test_config(dir.path()));

    let report = runner
        .submit(Some(fixture_source("zero_division.py")))
        .await
        .expect("Execution failed");

    assert!(!report.is_success());
    assert_eq!(report.result.outcome, Outcome::ScriptError);
    assert_eq!(report.output_text(), "a\n");

    let error = report.error_text().unwrap();
    assert!(error.contains("ZeroDivisionError"));
    assert!(error.contains("main.py"));
    assert!(!error.contains(&dir.path().display().to_string()));
    assert!(scratch_is_empty(dir.path()));
}

#[tokio::test]
async fn test_explicit_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Runner::new(test_config(dir.path()));

    let report = runner
        .submit(Some(fixture_source("stderr_and_exit.py")))
        .await
        .expect("Execution failed");

    assert_eq!(report.result.exit_code, Some(3));
    assert_eq!(report.output_text(), "partial\n");
    assert_eq!(
        report.error_text().as_deref(),
        Some("something went wrong\n")
    );
}

#[tokio::test]
async fn test_infinite_loop_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.limits = config.limits.with_wall_time_limit(1.0);
    let runner = Runner::new(config);

    let started = Instant::now();
    let report = runner
        .submit(Some(fixture_source("infinite_loop.py")))
        .await
        .expect("Execution failed");

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(report.result.outcome, Outcome::Timeout);
    assert!(!report.is_success());
    assert!(
        report
            .error_text()
            .unwrap()
            .ends_with("Execution timed out after 1 second")
    );
    assert!(scratch_is_empty(dir.path()));
}

#[tokio::test]
async fn test_large_output_is_truncated() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Runner::new(test_config(dir.path()));

    let report = runner
        .submit(Some(fixture_source("big_output.py")))
        .await
        .expect("Execution failed");

    assert!(report.is_success());
    assert!(report.result.truncated);
    assert_eq!(report.result.stdout.len(), 256 * 1024);
    assert!(report.output_text().ends_with("[output truncated]"));
}

#[tokio::test]
async fn test_escaped_child_does_not_block() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Runner::new(test_config(dir.path()));

    let started = Instant::now();
    let report = runner
        .submit(Some(fixture_source("spawns_child.py")))
        .await
        .expect("Execution failed");

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(report.is_success());
    assert_eq!(report.output_text(), "parent done\n");
}

#[tokio::test]
async fn test_environment_is_scrubbed() {
    // SAFETY: no other test in this binary reads this variable.
    unsafe { std::env::set_var("PYEXEC_TEST_SECRET", "leaked") };

    let dir = tempfile::tempdir().unwrap();
    let runner = Runner::new(test_config(dir.path()));

    let report = runner
        .submit(Some(fixture_source("environment.py")))
        .await
        .expect("Execution failed");

    assert_eq!(report.output_text(), "1\nabsent\nmain.py\n");
}

#[tokio::test]
async fn test_stdin_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Runner::new(test_config(dir.path()));

    let report = runner
        .submit(Some(fixture_source("reads_stdin.py")))
        .await
        .expect("Execution failed");

    assert_eq!(report.output_text(), "0\n");
}

#[tokio::test]
async fn test_repeated_submissions_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Runner::new(test_config(dir.path()));

    for _ in 0..3 {
        let report = runner
            .submit(Some("x = 1\nprint(x)".into()))
            .await
            .expect("Execution failed");
        assert_eq!(report.output_text(), "1\n");
    }

    let report = runner
        .submit(Some("print(x)".into()))
        .await
        .expect("Execution failed");
    assert!(!report.is_success());
    assert!(report.error_text().unwrap().contains("NameError"));
}

#[tokio::test]
async fn test_concurrent_submissions() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.max_concurrent = Some(4);
    let runner = Arc::new(Runner::new(config));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let runner = Arc::clone(&runner);
            tokio::spawn(async move { runner.submit(Some(format!("print({i})"))).await })
        })
        .collect();

    let mut ids = HashSet::new();
    for (i, handle) in handles.into_iter().enumerate() {
        let report = handle.await.unwrap().expect("Execution failed");
        assert_eq!(report.output_text(), format!("{i}\n"));
        ids.insert(report.artifact_id);
    }

    assert_eq!(ids.len(), 8);
    assert!(scratch_is_empty(dir.path()));
}
