use async_trait::async_trait;
use nodeguard_types::{DaemonInfo, DaemonStatus, GuardError, GuardResult, NodeInfo, Severity};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::GuardConfig;
use crate::events::{EventReporter, Notifier};
use crate::process::{DaemonChild, ExitOutcome, LaunchSpec, ProcessLauncher};
use crate::rpc::DaemonProbe;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChildEvent {
    ExitRequested,
    Terminated,
    Killed,
}

/// Which stop requests the fake daemon obeys. Kill always works.
#[derive(Clone, Copy, Debug)]
pub struct ChildBehaviour {
    pub honors_exit_command: bool,
    pub honors_terminate: bool,
}

impl ChildBehaviour {
    pub fn cooperative() -> Self {
        Self {
            honors_exit_command: true,
            honors_terminate: true,
        }
    }

    pub fn stubborn() -> Self {
        Self {
            honors_exit_command: false,
            honors_terminate: false,
        }
    }
}

pub struct MockChild {
    pid: u32,
    behaviour: ChildBehaviour,
    stdin: bool,
    events: Mutex<Vec<(ChildEvent, Instant)>>,
    exit_tx: watch::Sender<Option<ExitOutcome>>,
}

impl MockChild {
    fn new(pid: u32, behaviour: ChildBehaviour, stdin: bool) -> Self {
        let (exit_tx, _) = watch::channel(None);
        Self {
            pid,
            behaviour,
            stdin,
            events: Mutex::new(Vec::new()),
            exit_tx,
        }
    }

    pub fn crash(&self, code: i32) {
        self.exit(ExitOutcome::code(code));
    }

    pub fn events(&self) -> Vec<(ChildEvent, Instant)> {
        self.events.lock().clone()
    }

    pub fn event_kinds(&self) -> Vec<ChildEvent> {
        self.events.lock().iter().map(|(e, _)| *e).collect()
    }

    pub fn has_exited(&self) -> bool {
        self.exit_tx.borrow().is_some()
    }

    fn exit(&self, outcome: ExitOutcome) {
        self.exit_tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(outcome);
            true
        });
    }

    fn record(&self, event: ChildEvent) {
        self.events.lock().push((event, Instant::now()));
    }
}

#[async_trait]
impl DaemonChild for MockChild {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    async fn request_exit(&self, _command: &str) -> GuardResult<bool> {
        if !self.stdin {
            return Ok(false);
        }
        self.record(ChildEvent::ExitRequested);
        if self.behaviour.honors_exit_command {
            self.exit(ExitOutcome::code(0));
        }
        Ok(true)
    }

    fn terminate(&self) -> GuardResult<()> {
        self.record(ChildEvent::Terminated);
        if self.behaviour.honors_terminate {
            self.exit(ExitOutcome::signalled(15));
        }
        Ok(())
    }

    fn kill(&self) -> GuardResult<()> {
        self.record(ChildEvent::Killed);
        self.exit(ExitOutcome::signalled(9));
        Ok(())
    }

    async fn wait(&self) -> ExitOutcome {
        let mut rx = self.exit_tx.subscribe();
        loop {
            if let Some(outcome) = *rx.borrow_and_update() {
                return outcome;
            }
            if rx.changed().await.is_err() {
                return ExitOutcome::unknown();
            }
        }
    }
}

pub struct MockLauncher {
    behaviour: Mutex<ChildBehaviour>,
    fail: AtomicBool,
    next_pid: AtomicU32,
    children: Mutex<Vec<Arc<MockChild>>>,
}

impl MockLauncher {
    pub fn new(behaviour: ChildBehaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour: Mutex::new(behaviour),
            fail: AtomicBool::new(false),
            next_pid: AtomicU32::new(1000),
            children: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        let launcher = Self::new(ChildBehaviour::cooperative());
        launcher.fail.store(true, Ordering::SeqCst);
        launcher
    }

    pub fn launches(&self) -> usize {
        self.children.lock().len()
    }

    pub fn latest(&self) -> Arc<MockChild> {
        self.children
            .lock()
            .last()
            .cloned()
            .expect("no daemon launched yet")
    }

    pub fn child(&self, index: usize) -> Arc<MockChild> {
        self.children.lock()[index].clone()
    }
}

impl ProcessLauncher for MockLauncher {
    fn launch(&self, spec: &LaunchSpec) -> GuardResult<Arc<dyn DaemonChild>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(GuardError::Process(format!(
                "Failed to spawn {}: not found",
                spec.program.display()
            )));
        }

        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        let child = Arc::new(MockChild::new(pid, *self.behaviour.lock(), spec.stdin_control));
        self.children.lock().push(child.clone());
        Ok(child)
    }
}

#[derive(Clone, Debug)]
pub enum ProbeReply {
    Info(DaemonInfo),
    Unreachable,
}

/// Probe whose answer the test changes between polls.
pub struct ScriptedProbe {
    reply: Mutex<ProbeReply>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn ready(height: u64) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(ProbeReply::Info(
                DaemonInfo::new(height, DaemonStatus::Ok).with_version("1.0.0"),
            )),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(ProbeReply::Unreachable),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set(&self, reply: ProbeReply) {
        *self.reply.lock() = reply;
    }

    pub fn set_height(&self, height: u64) {
        let mut reply = self.reply.lock();
        match *reply {
            ProbeReply::Info(ref mut info) => info.height = height,
            ProbeReply::Unreachable => {
                *reply = ProbeReply::Info(DaemonInfo::new(height, DaemonStatus::Ok));
            }
        }
    }

    pub fn set_status(&self, status: &str) {
        if let ProbeReply::Info(ref mut info) = *self.reply.lock() {
            info.status = DaemonStatus::from(status.to_string());
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DaemonProbe for ScriptedProbe {
    async fn info(&self) -> GuardResult<DaemonInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.reply.lock().clone() {
            ProbeReply::Info(info) => Ok(info),
            ProbeReply::Unreachable => Err(GuardError::Rpc("connection refused".into())),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, Severity)>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(m, _)| m.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str, severity: Severity, _node: &NodeInfo) -> GuardResult<()> {
        self.sent.lock().push((message.to_string(), severity));
        Ok(())
    }
}

pub fn recording_reporter() -> (EventReporter, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    (EventReporter::new(None, notifier.clone(), true), notifier)
}

/// Defaults with a short fatal delay and a fixed daemon path.
pub fn test_config() -> GuardConfig {
    let mut config = GuardConfig::default();
    config.node.path = Some("/opt/node/conceald".into());
    config.node.name = Some("test-node".into());
    config.geo.enabled = false;
    config
}
