//! End-to-end lifecycle tests driving the `Runner` against fake
//! collaborators: a recording status reporter, a shell-script collector, and
//! a local git repository.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lintbench_runner::{
    AnalysisRequest, CancelOutcome, Config, CreateOutcome, Runner, StatusReporter, TaskStatus,
};
use tempfile::TempDir;

/// Captures every report the runner would have sent to the ledger.
#[derive(Default)]
struct RecordingReporter {
    accept: bool,
    events: Mutex<Vec<ReportedEvent>>,
}

#[derive(Debug, Clone)]
struct ReportedEvent {
    task_id: String,
    status: TaskStatus,
    error: Option<String>,
    metrics_file: Option<String>,
}

impl RecordingReporter {
    fn accepting() -> Self {
        Self {
            accept: true,
            events: Mutex::new(Vec::new()),
        }
    }

    fn rejecting() -> Self {
        Self {
            accept: false,
            events: Mutex::new(Vec::new()),
        }
    }

    fn statuses(&self, task_id: &str) -> Vec<TaskStatus> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.task_id == task_id)
            .map(|event| event.status)
            .collect()
    }

    fn last_error(&self, task_id: &str) -> Option<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|event| event.task_id == task_id)
            .and_then(|event| event.error.clone())
    }

    fn metrics_file(&self, task_id: &str) -> Option<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|event| event.task_id == task_id && event.status == TaskStatus::Completed)
            .and_then(|event| event.metrics_file.clone())
    }
}

#[async_trait]
impl StatusReporter for RecordingReporter {
    async fn report(
        &self,
        task_id: &str,
        status: TaskStatus,
        error: Option<&str>,
        metrics_file: Option<&str>,
    ) -> bool {
        self.events.lock().unwrap().push(ReportedEvent {
            task_id: task_id.to_string(),
            status,
            error: error.map(str::to_string),
            metrics_file: metrics_file.map(str::to_string),
        });
        self.accept
    }
}

/// Collector that writes a valid CSV with `iterations * 3` data rows.
const OK_COLLECTOR: &str = r#"#!/bin/sh
out=""
iters=0
while [ "$#" -gt 0 ]; do
  case "$1" in
    -output) out="$2"; shift 2 ;;
    -iterations) iters="$2"; shift 2 ;;
    *) shift ;;
  esac
done
echo "analyzer,iteration,seconds" > "$out"
total=$((iters * 3))
i=0
while [ "$i" -lt "$total" ]; do
  echo "ruff,$i,0.01" >> "$out"
  i=$((i + 1))
done
"#;

/// Collector that writes far fewer rows than expected.
const SHORT_COLLECTOR: &str = r#"#!/bin/sh
out=""
while [ "$#" -gt 0 ]; do
  case "$1" in
    -output) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
echo "analyzer,iteration,seconds" > "$out"
echo "ruff,0,0.01" >> "$out"
echo "black,0,0.01" >> "$out"
"#;

/// Collector that writes the CSV, emits lint findings on stderr, and exits
/// nonzero. Expected to count as a successful run.
const FINDINGS_COLLECTOR: &str = r#"#!/bin/sh
out=""
iters=0
while [ "$#" -gt 0 ]; do
  case "$1" in
    -output) out="$2"; shift 2 ;;
    -iterations) iters="$2"; shift 2 ;;
    *) shift ;;
  esac
done
echo "analyzer,iteration,seconds" > "$out"
total=$((iters * 3))
i=0
while [ "$i" -lt "$total" ]; do
  echo "ruff,$i,0.01" >> "$out"
  i=$((i + 1))
done
echo "src/app.py:1:1: E501 line too long" >&2
exit 1
"#;

/// Collector that fails silently: nonzero exit, nothing on stderr.
const SILENT_FAIL_COLLECTOR: &str = "#!/bin/sh\necho \"panic: boom\"\nexit 3\n";

/// Collector that exits clean without producing the metrics file.
const NO_OUTPUT_COLLECTOR: &str = "#!/bin/sh\nexit 0\n";

/// Collector that runs far longer than any test timeout.
const SLEEP_COLLECTOR: &str = "#!/bin/sh\nsleep 30\n";

/// Collector that ignores SIGTERM, forcing the grace-period escalation.
const STUBBORN_COLLECTOR: &str = "#!/bin/sh\ntrap '' TERM\nsleep 30\n";

struct Harness {
    _tmp: TempDir,
    runner: Arc<Runner>,
    reporter: Arc<RecordingReporter>,
    repo_url: String,
    repos_dir: PathBuf,
}

fn write_collector(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("collector.sh");
    std::fs::write(&path, body).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Initialize a one-commit git repository to clone from. Returns `None` when
/// git is unavailable so tests can skip instead of failing.
fn init_git_repo(dir: &Path) -> Option<String> {
    let git = |args: &[&str]| {
        std::process::Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .ok()
            .filter(|output| output.status.success())
    };

    std::fs::write(dir.join("README.md"), "# fixture\n").unwrap();
    git(&["init", "-q"])?;
    git(&["add", "README.md"])?;
    git(&[
        "-c",
        "user.name=test",
        "-c",
        "user.email=test@example.com",
        "-c",
        "commit.gpgsign=false",
        "commit",
        "-qm",
        "init",
    ])?;
    Some(format!("file://{}", dir.display()))
}

fn harness_with(collector: &str, mutate: impl FnOnce(&mut Config)) -> Option<Harness> {
    harness_with_reporter(collector, Arc::new(RecordingReporter::accepting()), mutate)
}

fn harness_with_reporter(
    collector: &str,
    reporter: Arc<RecordingReporter>,
    mutate: impl FnOnce(&mut Config),
) -> Option<Harness> {
    let tmp = TempDir::new().unwrap();
    let collector_path = write_collector(tmp.path(), collector);

    let source = tmp.path().join("source-repo");
    std::fs::create_dir_all(&source).unwrap();
    let repo_url = init_git_repo(&source)?;

    let mut config = Config::default();
    config.storage.repos_dir = tmp.path().join("repos");
    config.storage.metrics_dir = tmp.path().join("metrics");
    config.collector.binary_path = collector_path;
    // Non-built-in installs succeed instantly without a real pip.
    config.collector.python_bin = "true".to_string();
    config.timeouts.analyze_secs = 20;
    config.timeouts.cancel_grace_secs = 1;
    mutate(&mut config);

    std::fs::create_dir_all(&config.storage.repos_dir).unwrap();
    std::fs::create_dir_all(&config.storage.metrics_dir).unwrap();

    let repos_dir = config.storage.repos_dir.clone();
    let runner = Arc::new(Runner::new(
        &config,
        Arc::clone(&reporter) as Arc<dyn StatusReporter>,
    ));

    Some(Harness {
        _tmp: tmp,
        runner,
        reporter,
        repo_url,
        repos_dir,
    })
}

impl Harness {
    fn request(&self, task_id: &str, analyzer: &str, iterations: u32) -> AnalysisRequest {
        AnalysisRequest {
            task_id: task_id.to_string(),
            analyzer_name: analyzer.to_string(),
            repository_url: self.repo_url.clone(),
            command_template: "{analyzer_cmd} {path}".to_string(),
            iterations,
        }
    }

    /// Poll until the registry has no live entries, i.e. every dispatched
    /// pipeline reached its terminal path.
    async fn wait_idle(&self, deadline: Duration) -> bool {
        eventually(deadline, || self.runner.registry().active_count() == 0).await
    }

    /// Poll until the task's collector process handle is published.
    async fn wait_process(&self, task_id: &str, deadline: Duration) -> bool {
        eventually(deadline, || {
            self.runner
                .registry()
                .entry(task_id)
                .is_some_and(|entry| entry.process.is_some())
        })
        .await
    }
}

async fn eventually(deadline: Duration, predicate: impl Fn() -> bool) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    predicate()
}

#[tokio::test]
async fn builtin_analyzer_completes_with_metrics() {
    let Some(harness) = harness_with(OK_COLLECTOR, |_| {}) else {
        eprintln!("git unavailable, skipping");
        return;
    };

    let outcome = harness
        .runner
        .create(harness.request("t1", "ruff", 10))
        .await
        .unwrap();
    assert_eq!(outcome, CreateOutcome::Accepted);
    assert!(harness.wait_idle(Duration::from_secs(15)).await);

    assert_eq!(
        harness.reporter.statuses("t1"),
        vec![TaskStatus::Running, TaskStatus::Completed]
    );
    let metrics_file = harness.reporter.metrics_file("t1").unwrap();
    assert!(metrics_file.contains("t1"));

    let contents = std::fs::read_to_string(harness.runner.metrics_path("t1")).unwrap();
    // Header plus iterations * 3 data rows.
    assert_eq!(contents.lines().count(), 31);
}

#[tokio::test]
async fn duplicate_create_is_rejected() {
    let Some(harness) = harness_with(SLEEP_COLLECTOR, |_| {}) else {
        eprintln!("git unavailable, skipping");
        return;
    };

    let first = harness
        .runner
        .create(harness.request("t1", "ruff", 1))
        .await
        .unwrap();
    assert_eq!(first, CreateOutcome::Accepted);

    let second = harness
        .runner
        .create(harness.request("t1", "ruff", 1))
        .await
        .unwrap();
    assert_eq!(second, CreateOutcome::AlreadyRunning);

    // Only one `running` report was sent.
    assert_eq!(
        harness.reporter.statuses("t1"),
        vec![TaskStatus::Running]
    );

    // Tear the sleeping task down so the harness exits quickly.
    harness.wait_process("t1", Duration::from_secs(10)).await;
    harness.runner.cancel("t1").await;
}

#[tokio::test]
async fn silent_nonzero_exit_fails_with_diagnostics() {
    let Some(harness) = harness_with(SILENT_FAIL_COLLECTOR, |_| {}) else {
        eprintln!("git unavailable, skipping");
        return;
    };

    harness
        .runner
        .create(harness.request("t1", "ruff", 1))
        .await
        .unwrap();
    assert!(harness.wait_idle(Duration::from_secs(15)).await);

    assert_eq!(
        harness.reporter.statuses("t1"),
        vec![TaskStatus::Running, TaskStatus::Failed]
    );
    let error = harness.reporter.last_error("t1").unwrap();
    assert!(error.contains("code 3"), "unexpected error: {error}");
    assert!(error.contains("panic: boom"), "diagnostic lost: {error}");
}

#[tokio::test]
async fn lint_findings_on_stderr_still_complete() {
    let Some(harness) = harness_with(FINDINGS_COLLECTOR, |_| {}) else {
        eprintln!("git unavailable, skipping");
        return;
    };

    harness
        .runner
        .create(harness.request("t1", "ruff", 2))
        .await
        .unwrap();
    assert!(harness.wait_idle(Duration::from_secs(15)).await);

    assert_eq!(
        harness.reporter.statuses("t1"),
        vec![TaskStatus::Running, TaskStatus::Completed]
    );
}

#[tokio::test]
async fn missing_metrics_file_fails_the_task() {
    let Some(harness) = harness_with(NO_OUTPUT_COLLECTOR, |_| {}) else {
        eprintln!("git unavailable, skipping");
        return;
    };

    harness
        .runner
        .create(harness.request("t1", "ruff", 1))
        .await
        .unwrap();
    assert!(harness.wait_idle(Duration::from_secs(15)).await);

    assert_eq!(
        harness.reporter.statuses("t1"),
        vec![TaskStatus::Running, TaskStatus::Failed]
    );
    let error = harness.reporter.last_error("t1").unwrap();
    assert!(error.contains("Metrics file was not created"));
}

#[tokio::test]
async fn row_shortfall_still_completes() {
    let Some(harness) = harness_with(SHORT_COLLECTOR, |_| {}) else {
        eprintln!("git unavailable, skipping");
        return;
    };

    harness
        .runner
        .create(harness.request("t1", "ruff", 10))
        .await
        .unwrap();
    assert!(harness.wait_idle(Duration::from_secs(15)).await);

    assert_eq!(
        harness.reporter.statuses("t1"),
        vec![TaskStatus::Running, TaskStatus::Completed]
    );
}

#[tokio::test]
async fn timeout_kills_the_collector() {
    let Some(harness) = harness_with(SLEEP_COLLECTOR, |config| {
        config.timeouts.analyze_secs = 1;
    }) else {
        eprintln!("git unavailable, skipping");
        return;
    };

    harness
        .runner
        .create(harness.request("t1", "ruff", 1))
        .await
        .unwrap();
    assert!(harness.wait_idle(Duration::from_secs(15)).await);

    assert_eq!(
        harness.reporter.statuses("t1"),
        vec![TaskStatus::Running, TaskStatus::Failed]
    );
    let error = harness.reporter.last_error("t1").unwrap();
    assert!(error.contains("timed out"), "unexpected error: {error}");
}

#[tokio::test]
async fn cancel_unknown_task_is_not_found() {
    let Some(harness) = harness_with(OK_COLLECTOR, |_| {}) else {
        eprintln!("git unavailable, skipping");
        return;
    };
    assert_eq!(
        harness.runner.cancel("no-such-task").await,
        CancelOutcome::NotFound
    );
}

#[tokio::test]
async fn cancel_before_process_spawn_is_not_running() {
    let Some(harness) = harness_with(OK_COLLECTOR, |_| {}) else {
        eprintln!("git unavailable, skipping");
        return;
    };

    // Entry registered, provisioning notionally in progress, no process yet.
    harness.runner.registry().register("t9", "ruff");
    assert_eq!(
        harness.runner.cancel("t9").await,
        CancelOutcome::NotRunning
    );
}

#[tokio::test]
async fn cancel_running_task_reports_and_cleans_up() {
    let Some(harness) = harness_with(SLEEP_COLLECTOR, |_| {}) else {
        eprintln!("git unavailable, skipping");
        return;
    };

    harness
        .runner
        .create(harness.request("t1", "ruff", 1))
        .await
        .unwrap();
    assert!(harness.wait_process("t1", Duration::from_secs(10)).await);

    let outcome = harness.runner.cancel("t1").await;
    assert_eq!(outcome, CancelOutcome::Cancelled);
    assert!(harness.wait_idle(Duration::from_secs(10)).await);

    let statuses = harness.reporter.statuses("t1");
    assert_eq!(
        statuses,
        vec![TaskStatus::Running, TaskStatus::Cancelled, TaskStatus::Cleaned]
    );
    // The pipeline suppressed its own terminal report.
    assert!(!statuses.contains(&TaskStatus::Completed));
    assert!(!statuses.contains(&TaskStatus::Failed));
    // Cleanup removed the checkout.
    assert!(!harness.repos_dir.join("t1").exists());
}

#[tokio::test]
async fn stubborn_process_is_force_killed_after_grace() {
    let Some(harness) = harness_with(STUBBORN_COLLECTOR, |config| {
        config.timeouts.cancel_grace_secs = 1;
    }) else {
        eprintln!("git unavailable, skipping");
        return;
    };

    harness
        .runner
        .create(harness.request("t1", "ruff", 1))
        .await
        .unwrap();
    assert!(harness.wait_process("t1", Duration::from_secs(10)).await);

    let started = tokio::time::Instant::now();
    let outcome = harness.runner.cancel("t1").await;
    let elapsed = started.elapsed();

    assert_eq!(outcome, CancelOutcome::Cancelled);
    // SIGTERM was ignored, so cancellation had to sit out the grace window.
    assert!(elapsed >= Duration::from_secs(1), "escalated too early: {elapsed:?}");
    assert!(harness.wait_idle(Duration::from_secs(10)).await);
}

#[tokio::test]
async fn explicit_cleanup_deletes_metrics() {
    let Some(harness) = harness_with(OK_COLLECTOR, |_| {}) else {
        eprintln!("git unavailable, skipping");
        return;
    };

    harness
        .runner
        .create(harness.request("t1", "ruff", 2))
        .await
        .unwrap();
    assert!(harness.wait_idle(Duration::from_secs(15)).await);
    let metrics_path = harness.runner.metrics_path("t1");
    assert!(metrics_path.exists());

    harness.runner.request_cleanup("t1");
    assert!(
        eventually(Duration::from_secs(10), || !metrics_path.exists()).await,
        "metrics file was not deleted"
    );
    assert!(harness
        .reporter
        .statuses("t1")
        .contains(&TaskStatus::Cleaned));
}

#[tokio::test]
async fn create_fails_when_ledger_rejects_running() {
    let Some(harness) = harness_with_reporter(
        OK_COLLECTOR,
        Arc::new(RecordingReporter::rejecting()),
        |_| {},
    ) else {
        eprintln!("git unavailable, skipping");
        return;
    };

    let result = harness.runner.create(harness.request("t1", "ruff", 1)).await;
    assert!(result.is_err());
    // The provisional entry was withdrawn, so the id can be reused.
    assert_eq!(harness.runner.registry().active_count(), 0);
}

#[tokio::test]
async fn custom_analyzer_runs_through_install_path() {
    let Some(harness) = harness_with(OK_COLLECTOR, |_| {}) else {
        eprintln!("git unavailable, skipping");
        return;
    };

    // python_bin is `true`, so the pip install for the non-built-in succeeds.
    harness
        .runner
        .create(harness.request("t2", "pylint", 1))
        .await
        .unwrap();
    assert!(harness.wait_idle(Duration::from_secs(15)).await);

    assert_eq!(
        harness.reporter.statuses("t2"),
        vec![TaskStatus::Running, TaskStatus::Completed]
    );
}
