#![cfg(unix)]

use anyhow::Result;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use sweepbench::harness::{ApacheBench, HttpMethod, LoadGenerator, RequestBody, Trial, TrialRunner};
use sweepbench::HarnessError;
use tempfile::TempDir;
use url::Url;

// One fake executable at a time: a fork in a concurrent test can keep the
// script's write descriptor open and make exec fail with ETXTBSY.
static EXEC_LOCK: Mutex<()> = Mutex::new(());

fn fake_program(dir: &Path, body: &str) -> Result<PathBuf> {
    let program = dir.join("ab");
    std::fs::write(&program, body)?;
    std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755))?;
    Ok(program)
}

fn post_trial(concurrency: u32) -> Result<Trial> {
    Ok(Trial {
        requests: 50,
        concurrency,
        target: Url::parse("http://127.0.0.1:4096/set")?,
        method: HttpMethod::Post,
        body: Some(RequestBody {
            path: PathBuf::from("a.json"),
            content_type: "application/json".to_string(),
        }),
    })
}

/// A fake `ab` that echoes its arguments to stderr and reports a throughput
/// derived from the concurrency flag.
const FAKE_AB: &str = r#"#!/bin/sh
echo "args: $*" >&2
while [ $# -gt 0 ]; do
  case "$1" in
    -c) conc="$2"; shift 2 ;;
    *) shift ;;
  esac
done
echo "This is ApacheBench, Version 2.3"
echo "Concurrency Level:      $conc"
echo "Requests per second:    ${conc}00.25 [#/sec] (mean)"
echo "Time per request:       3.000 [ms] (mean)"
"#;

#[tokio::test]
async fn test_apache_bench_runs_external_program() -> Result<()> {
    let _guard = EXEC_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new()?;
    let program = fake_program(dir.path(), FAKE_AB)?;

    let runner = TrialRunner::new(ApacheBench::new(&program, None));
    let throughput = runner.run_trial(&post_trial(7)?).await?;
    assert_eq!(throughput, 700.25);

    Ok(())
}

#[tokio::test]
async fn test_hung_load_generator_times_out_and_is_killed() -> Result<()> {
    let _guard = EXEC_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new()?;
    let marker = dir.path().join("finished");
    let program = fake_program(
        dir.path(),
        &format!("#!/bin/sh\nsleep 2\necho done > {}\n", marker.display()),
    )?;

    let limit = Duration::from_millis(200);
    let started = Instant::now();
    let err = ApacheBench::new(&program, Some(limit))
        .generate(&post_trial(5)?)
        .await
        .unwrap_err();

    match err {
        HarnessError::TrialTimedOut { waited } => assert_eq!(waited, limit),
        other => panic!("expected TrialTimedOut, got {:?}", other),
    }
    assert!(started.elapsed() < Duration::from_secs(2));

    // the killed client never reaches its final line
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(!marker.exists());

    Ok(())
}
