// ABOUTME: Integration tests for the herd supervisor.
// ABOUTME: Runs real sh/sleep workers through launch, watchdog, and shutdown.

use herd::{
    BufferSink, Config, SupervisorError, Supervisor, SupervisorSettings, TermSignal,
    WorkerGroupSpec,
};
use std::sync::Arc;
use std::time::Duration;

fn config(groups: Vec<WorkerGroupSpec>) -> Config {
    Config {
        supervisor: SupervisorSettings {
            termination_timeout_secs: 5.0,
            drain_timeout_secs: 2.0,
            poll_interval_ms: 10,
            label: "herd".to_string(),
        },
        groups,
    }
}

async fn wait_for_line(sink: &BufferSink, needle: &str) {
    for _ in 0..500 {
        if sink.contains(needle) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("never saw {needle:?} in {:?}", sink.lines());
}

// ============================================================================
// Watchdog-triggered shutdown
// ============================================================================

#[tokio::test]
async fn test_unexpected_exit_shuts_down_fleet() {
    let sink = Arc::new(BufferSink::new());
    let config = config(vec![
        WorkerGroupSpec::new("A", 2, &["sleep", "30"]),
        WorkerGroupSpec::new("B", 1, &["sh", "-c", "echo hi; exit 4"]),
    ]);

    let report = tokio::time::timeout(
        Duration::from_secs(10),
        Supervisor::new(config, sink.clone())
            .without_signal_handlers()
            .run(),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(report.signal, TermSignal::Term);
    assert_eq!(report.signaled, vec!["A_1", "A_2"]);
    assert!(report.is_clean());

    let lines = sink.lines();
    for name in ["A_1", "A_2", "B_1"] {
        assert!(
            lines
                .iter()
                .any(|l| l.starts_with(&format!("{name}  > Started a process with PID "))),
            "missing start line for {name}: {lines:?}"
        );
    }
    assert!(sink.contains("B_1  | hi"));
    assert!(sink.contains("B_1  > Exited unexpectedly (retcode: 4), shutting down"));
    assert!(sink.contains("B_1  > Terminated (retcode: 4)"));
    assert!(sink.contains("herd > Start to terminate worker processes"));

    for name in ["A_1", "A_2"] {
        let requested = format!("{name}  > SIGTERM is requested");
        assert_eq!(lines.iter().filter(|l| **l == requested).count(), 1);
        assert!(sink.contains(&format!("{name}  > Terminated (retcode: -15)")));
    }
    assert!(!sink.contains("B_1  > SIGTERM is requested"));
}

// ============================================================================
// Externally requested shutdown
// ============================================================================

#[tokio::test]
async fn test_requested_signal_is_forwarded() {
    let sink = Arc::new(BufferSink::new());
    let supervisor = Supervisor::new(
        config(vec![WorkerGroupSpec::new("w", 2, &["sleep", "30"])]),
        sink.clone(),
    )
    .without_signal_handlers();
    let state = supervisor.termination_state();

    let run = tokio::spawn(supervisor.run());
    wait_for_line(&sink, "w_2  > Started a process with PID").await;
    assert!(!state.is_requested());

    assert!(state.request(TermSignal::Int));
    assert!(!state.request(TermSignal::Term));

    let report = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(report.signal, TermSignal::Int);
    assert_eq!(report.signaled, vec!["w_1", "w_2"]);
    assert!(sink.contains("w_1  > SIGINT is requested"));
    assert!(sink.contains("w_2  > Terminated (retcode: -2)"));
    assert!(!sink.contains("Exited unexpectedly"));
}

// ============================================================================
// Output relabelling
// ============================================================================

#[tokio::test]
async fn test_every_line_appears_once_in_order() {
    let sink = Arc::new(BufferSink::new());
    let config = config(vec![
        WorkerGroupSpec::new(
            "talker",
            1,
            &[
                "sh",
                "-c",
                "i=0; while [ $i -lt 200 ]; do echo \"line $i\"; echo \"err $i\" 1>&2; i=$((i+1)); done",
            ],
        ),
        WorkerGroupSpec::new("idle", 1, &["sleep", "30"]),
    ]);

    let report = tokio::time::timeout(
        Duration::from_secs(10),
        Supervisor::new(config, sink.clone())
            .without_signal_handlers()
            .run(),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(report.is_clean());

    let captured: Vec<String> = sink
        .lines()
        .into_iter()
        .filter_map(|l| l.strip_prefix("talker_1 | ").map(str::to_string))
        .collect();
    let expected: Vec<String> = (0..200)
        .flat_map(|i| [format!("line {i}"), format!("err {i}")])
        .collect();
    assert_eq!(captured, expected);
}

// ============================================================================
// Stragglers and drain
// ============================================================================

#[tokio::test]
async fn test_straggler_does_not_block_shutdown() {
    let sink = Arc::new(BufferSink::new());
    let mut config = config(vec![
        WorkerGroupSpec::new("stubborn", 1, &["sh", "-c", "trap '' TERM; echo ready; sleep 3"]),
        WorkerGroupSpec::new("polite", 1, &["sleep", "30"]),
    ]);
    config.supervisor.termination_timeout_secs = 0.3;
    config.supervisor.drain_timeout_secs = 0.1;

    let supervisor = Supervisor::new(config, sink.clone()).without_signal_handlers();
    let state = supervisor.termination_state();
    let run = tokio::spawn(supervisor.run());

    wait_for_line(&sink, "stubborn_1 | ready").await;
    state.request(TermSignal::Term);

    let report = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(report.stragglers, vec!["stubborn_1"]);
    assert_eq!(report.live_monitors, vec!["stubborn_1"]);
    assert!(!report.is_clean());
    assert!(sink.contains("stubborn_1 > Still running after SIGTERM"));
    assert!(sink.contains("polite_1   > Terminated (retcode: -15)"));
    assert!(sink.contains("herd       > - stubborn_1"));
}

// ============================================================================
// Startup failures
// ============================================================================

#[tokio::test]
async fn test_spawn_failure_aborts_startup() {
    let sink = Arc::new(BufferSink::new());
    let config = config(vec![
        WorkerGroupSpec::new("fine", 1, &["sleep", "30"]),
        WorkerGroupSpec::new("missing", 1, &["/no/such/worker/binary"]),
    ]);

    let err = Supervisor::new(config, sink.clone())
        .without_signal_handlers()
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, SupervisorError::Spawn { ref instance, .. } if instance == "missing_1"));
    assert!(!sink.contains("Started a process"));
}
