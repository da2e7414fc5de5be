use super::*;
use crate::config::GuardConfig;
use crate::events::EventReporter;
use crate::health::HealthFailure;
use crate::process::{DaemonChild, ExitOutcome};
use crate::testing::{
    recording_reporter, test_config, ChildBehaviour, ChildEvent, MockLauncher, ScriptedProbe,
};
use nodeguard_types::{DaemonStatus, GuardError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn supervisor(
    config: GuardConfig,
    launcher: Arc<MockLauncher>,
    probe: Arc<ScriptedProbe>,
    reporter: EventReporter,
) -> Supervisor {
    let deps = SupervisorDeps {
        launcher,
        probe,
        reporter,
        identity: NodeIdentity {
            id: "node-id".into(),
            name: "test-node".into(),
            version: "0.0.0".into(),
        },
        location: None,
        pool: None,
    };
    Supervisor::new(Arc::new(config), deps)
}

fn assert_delay(from: Instant, to: Instant, expected: Duration) {
    let actual = to - from;
    assert!(
        actual >= expected && actual < expected + Duration::from_secs(1),
        "expected {:?}, got {:?}",
        expected,
        actual
    );
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[tokio::test(start_paused = true)]
async fn test_start_initializes_daemon() {
    let launcher = MockLauncher::new(ChildBehaviour::cooperative());
    let probe = ScriptedProbe::ready(100);
    let sup = supervisor(test_config(), launcher.clone(), probe, EventReporter::silent());

    sup.start().unwrap();
    assert_eq!(sup.phase(), LifecyclePhase::Initializing);
    assert!(sup.has_child());
    assert!(sup.daemon_version().is_none());

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(sup.phase(), LifecyclePhase::Running);
    assert_eq!(sup.daemon_version().as_deref(), Some("1.0.0"));

    let info = sup.node_info();
    assert!(info.status.initialized);
    assert_eq!(info.status.errors, 0);
    assert_eq!(info.name, "test-node");
    assert_eq!(info.blockchain.map(|b| b.height), Some(100));

    let stats = sup.stats();
    assert_eq!(stats.generation, 1);
    assert_eq!(stats.total_starts, 1);
    assert_eq!(stats.pid, Some(1000));
}

#[tokio::test(start_paused = true)]
async fn test_start_while_running_rejected() {
    let launcher = MockLauncher::new(ChildBehaviour::cooperative());
    let sup = supervisor(
        test_config(),
        launcher.clone(),
        ScriptedProbe::ready(1),
        EventReporter::silent(),
    );

    sup.start().unwrap();
    assert!(matches!(
        sup.start(),
        Err(GuardError::InvalidTransition { .. })
    ));
    assert_eq!(launcher.launches(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_budget_exhausted_after_third_crash() {
    let launcher = MockLauncher::new(ChildBehaviour::cooperative());
    let (reporter, notifier) = recording_reporter();
    let sup = supervisor(test_config(), launcher.clone(), ScriptedProbe::ready(1), reporter);

    sup.start().unwrap();

    launcher.latest().crash(1);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(launcher.launches(), 2);

    launcher.latest().crash(1);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(launcher.launches(), 3);

    launcher.latest().crash(1);
    settle().await;
    assert_eq!(launcher.launches(), 3);
    assert!(sup.is_shutting_down());
    assert_eq!(sup.phase(), LifecyclePhase::Stopped);

    let waiting = Instant::now();
    let reason = sup.wait_for_shutdown().await;
    assert_eq!(reason, ShutdownReason::ErrorBudgetExhausted);
    assert_eq!(reason.exit_code(), 1);
    assert!(waiting.elapsed() >= Duration::from_secs(2));

    let messages = notifier.messages();
    assert_eq!(
        messages
            .iter()
            .filter(|m| m.as_str() == "Daemon process closed with code 1")
            .count(),
        3
    );
    assert!(messages.iter().any(|m| m.contains("Too many daemon errors")));
}

#[tokio::test(start_paused = true)]
async fn test_spaced_crashes_keep_restarting() {
    let mut config = test_config();
    config.restart.error_forget_time = 60;
    let launcher = MockLauncher::new(ChildBehaviour::cooperative());
    let sup = supervisor(config, launcher.clone(), ScriptedProbe::ready(1), EventReporter::silent());

    sup.start().unwrap();
    for round in 1..=5 {
        tokio::time::sleep(Duration::from_secs(61)).await;
        launcher.latest().crash(2);
        settle().await;
        assert_eq!(launcher.launches(), round + 1);
        assert_eq!(sup.stats().error_count, 1);
    }

    assert!(!sup.is_shutting_down());
}

#[tokio::test(start_paused = true)]
async fn test_signalled_exit_counts_but_is_not_reported_as_crash() {
    let launcher = MockLauncher::new(ChildBehaviour::cooperative());
    let (reporter, notifier) = recording_reporter();
    let sup = supervisor(test_config(), launcher.clone(), ScriptedProbe::ready(1), reporter);

    sup.start().unwrap();
    launcher.latest().kill().unwrap();
    settle().await;

    assert_eq!(launcher.launches(), 2);
    assert_eq!(sup.stats().error_count, 1);
    assert!(!notifier
        .messages()
        .iter()
        .any(|m| m.starts_with("Daemon process closed")));

    let last = sup.stats().last_exit.unwrap();
    assert_eq!(last.outcome, ExitOutcome::signalled(9));
    assert!(!last.solicited);
}

#[tokio::test(start_paused = true)]
async fn test_stop_escalates_in_order() {
    let launcher = MockLauncher::new(ChildBehaviour::stubborn());
    let sup = supervisor(test_config(), launcher.clone(), ScriptedProbe::ready(1), EventReporter::silent());

    sup.start().unwrap();
    tokio::time::sleep(Duration::from_secs(11)).await;

    let stopped_at = Instant::now();
    assert_eq!(sup.stop(false), StopOutcome::Escalating);
    assert_eq!(sup.phase(), LifecyclePhase::Stopping);

    tokio::time::sleep(Duration::from_secs(100)).await;

    let events = launcher.latest().events();
    let kinds: Vec<ChildEvent> = events.iter().map(|(e, _)| *e).collect();
    assert_eq!(
        kinds,
        vec![ChildEvent::ExitRequested, ChildEvent::Terminated, ChildEvent::Killed]
    );
    assert_delay(stopped_at, events[0].1, Duration::ZERO);
    assert_delay(events[0].1, events[1].1, Duration::from_secs(20));
    assert_delay(events[1].1, events[2].1, Duration::from_secs(60));

    assert_eq!(sup.phase(), LifecyclePhase::Stopped);
    assert!(!sup.has_child());
    assert_eq!(launcher.launches(), 1);
    assert!(sup.stats().last_exit.unwrap().solicited);
}

#[tokio::test(start_paused = true)]
async fn test_terminate_floor_applies() {
    let mut config = test_config();
    config.restart.terminate_timeout = 5;
    config.node.exit_command = String::new();
    let launcher = MockLauncher::new(ChildBehaviour::stubborn());
    let sup = supervisor(config, launcher.clone(), ScriptedProbe::ready(1), EventReporter::silent());

    sup.start().unwrap();
    let stopped_at = Instant::now();
    sup.stop(false);
    tokio::time::sleep(Duration::from_secs(60)).await;

    let events = launcher.latest().events();
    assert_eq!(launcher.latest().event_kinds(), vec![ChildEvent::Terminated, ChildEvent::Killed]);
    assert_delay(stopped_at, events[0].1, Duration::ZERO);
    assert_delay(events[0].1, events[1].1, Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_cooperative_exit_ends_escalation() {
    let launcher = MockLauncher::new(ChildBehaviour::cooperative());
    let sup = supervisor(test_config(), launcher.clone(), ScriptedProbe::ready(1), EventReporter::silent());

    sup.start().unwrap();
    sup.stop(false);
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(launcher.latest().event_kinds(), vec![ChildEvent::ExitRequested]);
    assert_eq!(sup.stats().last_exit.unwrap().outcome, ExitOutcome::code(0));
    assert_eq!(sup.phase(), LifecyclePhase::Stopped);
    assert_eq!(launcher.launches(), 1);
    assert_eq!(sup.stats().error_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_stop_is_idempotent() {
    let launcher = MockLauncher::new(ChildBehaviour::stubborn());
    let sup = supervisor(test_config(), launcher.clone(), ScriptedProbe::ready(1), EventReporter::silent());

    sup.start().unwrap();
    assert_eq!(sup.stop(true), StopOutcome::Escalating);
    assert_eq!(sup.stop(true), StopOutcome::AlreadyStopping);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(sup.stop(true), StopOutcome::AlreadyStopping);

    tokio::time::sleep(Duration::from_secs(70)).await;
    assert_eq!(
        launcher.child(0).event_kinds(),
        vec![ChildEvent::ExitRequested, ChildEvent::Terminated, ChildEvent::Killed]
    );

    // the stop asked for a restart, so a new generation is running
    assert_eq!(launcher.launches(), 2);
    assert_eq!(sup.stats().generation, 2);
}

#[tokio::test(start_paused = true)]
async fn test_stop_without_child() {
    let launcher = MockLauncher::new(ChildBehaviour::cooperative());
    let sup = supervisor(test_config(), launcher, ScriptedProbe::ready(1), EventReporter::silent());
    assert_eq!(sup.stop(false), StopOutcome::NoChild);
    assert_eq!(sup.phase(), LifecyclePhase::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_init_timeout_counts_as_failure() {
    let mut config = test_config();
    config.restart.max_init_time = 30;
    config.restart.max_close_errors = 2;
    let launcher = MockLauncher::new(ChildBehaviour::cooperative());
    let (reporter, notifier) = recording_reporter();
    let sup = supervisor(config, launcher.clone(), ScriptedProbe::unreachable(), reporter);

    let started = Instant::now();
    sup.start().unwrap();

    let reason = sup.wait_for_shutdown().await;
    assert_eq!(reason, ShutdownReason::ErrorBudgetExhausted);
    assert_eq!(launcher.launches(), 2);
    assert!(started.elapsed() >= Duration::from_secs(80));

    for index in 0..2 {
        assert_eq!(launcher.child(index).event_kinds(), vec![ChildEvent::ExitRequested]);
    }
    settle().await;
    assert_eq!(
        notifier
            .messages()
            .iter()
            .filter(|m| m.contains("initialization is taking too long"))
            .count(),
        2
    );
}

#[tokio::test(start_paused = true)]
async fn test_health_failure_restarts_daemon() {
    let launcher = MockLauncher::new(ChildBehaviour::cooperative());
    let probe = ScriptedProbe::ready(100);
    let sup = supervisor(test_config(), launcher.clone(), probe.clone(), EventReporter::silent());

    sup.start().unwrap();
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(sup.phase(), LifecyclePhase::Running);

    probe.set_status("BUSY");
    tokio::time::sleep(Duration::from_secs(35)).await;

    assert_eq!(launcher.child(0).event_kinds(), vec![ChildEvent::ExitRequested]);
    assert_eq!(launcher.launches(), 2);
    assert_eq!(sup.phase(), LifecyclePhase::Initializing);
    assert_eq!(sup.stats().error_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_spawn_failure_is_fatal() {
    let launcher = MockLauncher::failing();
    let sup = supervisor(test_config(), launcher, ScriptedProbe::ready(1), EventReporter::silent());

    assert!(matches!(sup.start(), Err(GuardError::Process(_))));
    assert_eq!(sup.phase(), LifecyclePhase::Stopped);

    let reason = sup.wait_for_shutdown().await;
    assert!(matches!(reason, ShutdownReason::SpawnFailed(_)));
    assert_eq!(reason.exit_code(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_update_gate() {
    let launcher = MockLauncher::new(ChildBehaviour::stubborn());
    let sup = supervisor(test_config(), launcher.clone(), ScriptedProbe::ready(1), EventReporter::silent());
    sup.start().unwrap();

    sup.try_begin_update().unwrap();
    assert!(matches!(sup.try_begin_update(), Err(GuardError::Update(_))));
    sup.end_update();

    sup.stop(true);
    assert!(matches!(
        sup.try_begin_update(),
        Err(GuardError::InvalidTransition { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_update_gate_blocks_restart() {
    let launcher = MockLauncher::new(ChildBehaviour::cooperative());
    let sup = supervisor(test_config(), launcher.clone(), ScriptedProbe::ready(1), EventReporter::silent());
    sup.start().unwrap();

    sup.try_begin_update().unwrap();
    launcher.latest().crash(1);
    settle().await;

    assert_eq!(launcher.launches(), 1);
    assert!(!sup.has_child());
    sup.end_update();
    assert!(!sup.is_updating());
}

#[tokio::test(start_paused = true)]
async fn test_graceful_shutdown_stops_daemon() {
    let launcher = MockLauncher::new(ChildBehaviour::stubborn());
    let sup = supervisor(test_config(), launcher.clone(), ScriptedProbe::ready(1), EventReporter::silent());
    sup.start().unwrap();

    sup.shutdown_gracefully().await;
    assert!(!sup.has_child());
    assert!(sup.is_shutting_down());
    assert!(launcher.latest().has_exited());
    assert_eq!(launcher.launches(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_results_from_replaced_generation_are_dropped() {
    let launcher = MockLauncher::new(ChildBehaviour::cooperative());
    let (reporter, notifier) = recording_reporter();
    let sup = supervisor(test_config(), launcher.clone(), ScriptedProbe::ready(100), reporter);

    sup.start().unwrap();
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(sup.phase(), LifecyclePhase::Running);

    let first = sup.current_token();
    let first_failure = sup.failure_callback_for(first.clone());

    launcher.latest().crash(1);
    settle().await;
    assert_eq!(launcher.launches(), 2);
    assert_eq!(sup.phase(), LifecyclePhase::Initializing);
    assert!(!first.is_current());
    let sent = notifier.messages().len();

    first_failure(HealthFailure::BadStatus(DaemonStatus::Other("BUSY".into())));
    assert_eq!(sup.stop_for(&first, true), StopOutcome::Stale);
    sup.ready_for(&first);
    settle().await;

    assert!(launcher.child(1).event_kinds().is_empty());
    assert!(!launcher.child(1).has_exited());
    assert_eq!(sup.phase(), LifecyclePhase::Initializing);
    assert_eq!(sup.daemon_version(), None);
    assert_eq!(launcher.launches(), 2);
    assert_eq!(sup.stats().error_count, 1);
    assert_eq!(notifier.messages().len(), sent);

    let second = sup.current_token();
    assert_eq!(second.generation(), 2);
    assert_eq!(sup.stop_for(&second, true), StopOutcome::Escalating);
}

#[tokio::test(start_paused = true)]
async fn test_late_exit_of_replaced_child_is_ignored() {
    let launcher = MockLauncher::new(ChildBehaviour::cooperative());
    let sup = supervisor(
        test_config(),
        launcher.clone(),
        ScriptedProbe::ready(100),
        EventReporter::silent(),
    );

    sup.start().unwrap();
    let first = sup.current_token();

    launcher.latest().crash(1);
    settle().await;
    assert_eq!(launcher.launches(), 2);
    let before = sup.stats();

    sup.exit_for(&first, ExitOutcome::code(1));
    settle().await;

    let after = sup.stats();
    assert!(sup.has_child());
    assert_eq!(after.phase, LifecyclePhase::Initializing);
    assert_eq!(after.pid, before.pid);
    assert_eq!(after.error_count, before.error_count);
    assert_eq!(after.last_exit.map(|e| e.generation), Some(1));
    assert_eq!(launcher.launches(), 2);
    assert!(!launcher.latest().has_exited());

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(sup.phase(), LifecyclePhase::Running);
}

#[test]
fn test_lifecycle_transitions() {
    use LifecyclePhase::*;

    assert!(Stopped.can_transition_to(Starting));
    assert!(Starting.can_transition_to(Initializing));
    assert!(Initializing.can_transition_to(Running));
    assert!(Running.can_transition_to(Stopping));
    assert!(Stopping.can_transition_to(Stopped));
    assert!(Running.can_transition_to(Stopped));

    assert!(!Running.can_transition_to(Starting));
    assert!(!Stopping.can_transition_to(Running));
    assert!(!Stopped.can_transition_to(Running));
    assert!(!Stopped.can_transition_to(Stopping));
}
