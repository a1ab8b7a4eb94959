#![cfg(unix)]

use std::{
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use pcr_core::{PassiveCheckRunner, RunnerConfig, RunnerState};
use pcr_deliver::{DeliveryError, FailureSpool, ResultLine, Transport};
use pcr_model::{CheckSpec, StatusCode};

/// Collector double: records accepted posts, rejects everything while `down`.
#[derive(Default)]
struct FakeCollector {
    down: AtomicBool,
    posts: Mutex<Vec<String>>,
}

impl FakeCollector {
    fn down() -> Arc<Self> {
        let c = Self::default();
        c.down.store(true, Ordering::SeqCst);
        Arc::new(c)
    }

    fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn posted_lines(&self) -> Vec<String> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .flat_map(|p| p.lines().map(str::to_string).collect::<Vec<_>>())
            .collect()
    }
}

#[async_trait]
impl Transport for FakeCollector {
    async fn post(&self, input: &str) -> Result<(), DeliveryError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(DeliveryError::Rejected { status: 500 });
        }
        self.posts.lock().unwrap().push(input.to_string());
        Ok(())
    }
}

fn config(dir: &Path) -> RunnerConfig {
    RunnerConfig {
        hostname: "web1".into(),
        url: "http://collector.invalid/cmd".into(),
        workers: 4,
        interval_secs: 3,
        timeout_margin_secs: 1,
        poll_interval_ms: 20,
        terminate_grace_ms: 200,
        result_file: dir.join("pcrunner.result"),
        ..Default::default()
    }
}

fn timestamps(lines: &[String]) -> Vec<u64> {
    lines
        .iter()
        .map(|l| ResultLine::from_raw(l.as_str()).timestamp().unwrap())
        .collect()
}

#[tokio::test]
async fn straggler_is_terminated_others_finish() {
    let dir = tempfile::tempdir().unwrap();
    let collector = Arc::new(FakeCollector::default());
    let runner = PassiveCheckRunner::with_transport(config(dir.path()), collector.clone()).unwrap();
    let specs = vec![
        CheckSpec::service("ok1", "true"),
        CheckSpec::service("ok2", "echo fine"),
        CheckSpec::service("warn", "sh -c 'echo degraded; exit 1'"),
        CheckSpec::service("crit", "sh -c 'exit 2'"),
        CheckSpec::service("slow", "sleep 30"),
    ];

    let started = std::time::Instant::now();
    let report = runner
        .run_once(&specs, &CancellationToken::new())
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(
        report.state,
        RunnerState {
            total: 5,
            finished: 4,
            terminated: 1,
            not_started: 0
        }
    );
    assert_eq!(report.status, StatusCode::Warning);
    assert!(report.message.starts_with("WARNING total time: "));
    assert!(report.message.contains("timeout at "));
    assert!(report.message.ends_with("finished=4, terminated=1, not_started=0"));
    assert!(report.delivered);

    let lines = collector.posted_lines();
    assert_eq!(lines.len(), 6);
    let ts = timestamps(&lines);
    assert!(ts.windows(2).all(|w| w[0] <= w[1]));
    assert!(lines.iter().any(|l| l.ends_with(";web1;slow;3;terminated, max time reached")));
    assert!(lines.iter().any(|l| l.ends_with(";web1;warn;1;degraded")));
    assert!(lines.iter().any(|l| l.contains(";web1;pcrunner;1;WARNING total time")));
}

#[tokio::test]
async fn queued_checks_past_deadline_are_not_started() {
    let dir = tempfile::tempdir().unwrap();
    let collector = Arc::new(FakeCollector::default());
    let runner = PassiveCheckRunner::with_transport(
        RunnerConfig {
            workers: 1,
            ..config(dir.path())
        },
        collector.clone(),
    )
    .unwrap();
    let specs = vec![
        CheckSpec::service("slow", "sleep 30"),
        CheckSpec::service("later1", "true"),
        CheckSpec::service("later2", "true"),
    ];

    let report = runner
        .run_once(&specs, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.state.terminated, 1);
    assert_eq!(report.state.not_started, 2);
    assert_eq!(report.status, StatusCode::Warning);
    let lines = collector.posted_lines();
    assert_eq!(
        lines
            .iter()
            .filter(|l| l.ends_with(";3;check not started, max time exceeded"))
            .count(),
        2
    );
}

#[tokio::test]
async fn every_check_runs_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let marks = dir.path().join("marks");
    std::fs::create_dir(&marks).unwrap();
    let collector = Arc::new(FakeCollector::default());
    let runner = PassiveCheckRunner::with_transport(config(dir.path()), collector.clone()).unwrap();

    let specs: Vec<_> = (0..20)
        .map(|i| {
            let mark = marks.join(format!("c{i}"));
            CheckSpec::service(format!("c{i}"), format!("echo run >> '{}'", mark.display()))
                .with_shell(true)
        })
        .collect();

    let report = runner
        .run_once(&specs, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.state.finished, 20);
    assert_eq!(report.status, StatusCode::Ok);
    for i in 0..20 {
        let runs = std::fs::read_to_string(marks.join(format!("c{i}"))).unwrap();
        assert_eq!(runs, "run\n", "check c{i}");
    }
    assert_eq!(collector.posted_lines().len(), 21);
}

#[tokio::test]
async fn failed_posts_accumulate_without_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let collector = FakeCollector::down();
    let cfg = config(dir.path());
    let spool = FailureSpool::new(&cfg.result_file);
    let runner = PassiveCheckRunner::with_transport(cfg, collector.clone()).unwrap();
    let specs = vec![
        CheckSpec::service("a", "echo A"),
        CheckSpec::host("alive", "echo UP"),
    ];

    let first = runner
        .run_once(&specs, &CancellationToken::new())
        .await
        .unwrap();
    assert!(!first.delivered);
    assert_eq!(first.spooled, 3);
    let after_first = spool.load().await.unwrap();
    assert_eq!(after_first.len(), 3);
    assert!(after_first.iter().any(|l| l.as_str().contains("PROCESS_HOST_CHECK_RESULT;web1;0;UP")));

    let second = runner
        .run_once(&specs, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(second.spooled, 6);
    let after_second = spool.load().await.unwrap();
    assert_eq!(after_second.len(), 6);
    assert_eq!(after_second[..3], after_first[..]);

    collector.set_down(false);
    let third = runner
        .run_once(&specs, &CancellationToken::new())
        .await
        .unwrap();
    assert!(third.delivered);
    assert_eq!(third.spooled, 0);
    assert!(!spool.path().exists());

    let posted = collector.posted_lines();
    assert_eq!(posted.len(), 9);
    let replayed: Vec<_> = after_second.iter().map(|l| l.as_str().to_string()).collect();
    assert_eq!(posted[..6], replayed[..]);
}

#[tokio::test]
async fn damaged_spool_line_does_not_block_delivery() {
    let dir = tempfile::tempdir().unwrap();
    let collector = Arc::new(FakeCollector::default());
    let cfg = RunnerConfig {
        lines_per_post: 2,
        ..config(dir.path())
    };
    std::fs::write(
        &cfg.result_file,
        b"[1] A;h;0;a\n[2] A;h;0;b\n[3] A;h;0;\xff\xfe\n",
    )
    .unwrap();
    let spool = FailureSpool::new(&cfg.result_file);
    let runner = PassiveCheckRunner::with_transport(cfg, collector.clone()).unwrap();
    let specs = vec![CheckSpec::service("a", "echo A")];

    for _ in 0..2 {
        let report = runner
            .run_once(&specs, &CancellationToken::new())
            .await
            .unwrap();
        assert!(report.delivered);
        assert_eq!(report.spooled, 0);
        assert!(!spool.path().exists());
    }

    let posted = collector.posted_lines();
    assert_eq!(posted.len(), 7);
    assert_eq!(posted[..2], ["[1] A;h;0;a", "[2] A;h;0;b"]);
    assert_eq!(posted.iter().filter(|l| l.starts_with("[1] ")).count(), 1);
    assert_eq!(posted.iter().filter(|l| l.ends_with(";web1;a;0;A")).count(), 2);
}

#[tokio::test]
async fn external_results_are_merged() {
    let dir = tempfile::tempdir().unwrap();
    let results = dir.path().join("results");
    std::fs::create_dir(&results).unwrap();
    let external = "[1000000000] PROCESS_SERVICE_CHECK_RESULT;web1;backup;0;backup ok";
    let file = results.join("1000000000.backup");
    std::fs::write(&file, format!("{external}\n{}\n", "z".repeat(9000))).unwrap();

    let collector = Arc::new(FakeCollector::default());
    let runner = PassiveCheckRunner::with_transport(
        RunnerConfig {
            result_dir: Some(results),
            ..config(dir.path())
        },
        collector.clone(),
    )
    .unwrap();

    runner
        .run_once(&[CheckSpec::service("a", "true")], &CancellationToken::new())
        .await
        .unwrap();

    let lines = collector.posted_lines();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], external);
    assert!(!file.exists());
}

#[tokio::test]
async fn shutdown_ends_run_loop_and_delivers() {
    let dir = tempfile::tempdir().unwrap();
    let collector = Arc::new(FakeCollector::default());
    let runner = PassiveCheckRunner::with_transport(config(dir.path()), collector.clone()).unwrap();
    let specs = vec![CheckSpec::service("slow", "sleep 30")];

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    tokio::time::timeout(Duration::from_secs(10), runner.run(&specs, &shutdown))
        .await
        .expect("run loop stops on shutdown")
        .unwrap();

    let lines = collector.posted_lines();
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().any(|l| l.ends_with(";web1;slow;3;terminated, max time reached")));
}
