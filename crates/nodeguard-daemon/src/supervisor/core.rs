use chrono::{DateTime, Utc};
use nodeguard_types::{GuardError, GuardResult, NodeInfo, NodeStatusSummary, Severity};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::budget::ErrorBudget;
use super::generation::{GenerationCounter, GenerationToken};
use super::stats::SupervisorStats;
use super::types::{ExitRecord, LifecyclePhase, ShutdownReason, StopOutcome};
use crate::config::GuardConfig;
use crate::events::{EventLog, EventReporter, NullNotifier};
use crate::geo::LocationResolver;
use crate::health::{CommsSettings, FailureCallback, HealthCommunicator, HealthFailure};
use crate::identity::ensure_node_id;
use crate::pool::PoolNotifier;
use crate::process::{DaemonChild, ExitOutcome, LaunchSpec, OsLauncher, ProcessLauncher};
use crate::rpc::{DaemonProbe, RpcProbe};

#[derive(Clone, Debug)]
pub struct NodeIdentity {
    pub id: String,
    pub name: String,
    pub version: String,
}

/// Everything the supervisor talks to outside its own state.
pub struct SupervisorDeps {
    pub launcher: Arc<dyn ProcessLauncher>,
    pub probe: Arc<dyn DaemonProbe>,
    pub reporter: EventReporter,
    pub identity: NodeIdentity,
    pub location: Option<Arc<LocationResolver>>,
    pub pool: Option<Arc<PoolNotifier>>,
}

impl SupervisorDeps {
    pub fn from_config(config: &GuardConfig) -> GuardResult<Self> {
        let identity = NodeIdentity {
            id: ensure_node_id(&config.node_data_path())?,
            name: config.node.display_name(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        };

        let reporter = EventReporter::new(
            Some(EventLog::new(config.event_log_path())),
            Arc::new(NullNotifier),
            config.error.notify,
        );

        let location = if config.geo.enabled {
            Some(Arc::new(LocationResolver::new(&config.geo)?))
        } else {
            None
        };

        Ok(Self {
            launcher: Arc::new(OsLauncher),
            probe: Arc::new(RpcProbe::new(&config.node)?),
            reporter,
            identity,
            location,
            pool: PoolNotifier::from_config(&config.pool)?.map(Arc::new),
        })
    }
}

#[derive(Default)]
struct GenerationTasks {
    init_poll: Option<JoinHandle<()>>,
    pool_notify: Option<JoinHandle<()>>,
    escalation: Option<JoinHandle<()>>,
}

impl GenerationTasks {
    fn abort_watchers(&mut self) {
        for handle in [self.init_poll.take(), self.pool_notify.take()]
            .into_iter()
            .flatten()
        {
            handle.abort();
        }
    }

    fn abort_escalation(&mut self) {
        if let Some(handle) = self.escalation.take() {
            handle.abort();
        }
    }
}

struct SupervisorState {
    phase: LifecyclePhase,
    child: Option<Arc<dyn DaemonChild>>,
    initialized: bool,
    auto_restart: bool,
    updating: bool,
    startup_time: DateTime<Utc>,
    communicator: Option<Arc<HealthCommunicator>>,
    tasks: GenerationTasks,
    last_exit: Option<ExitRecord>,
}

impl SupervisorState {
    fn transition(&mut self, next: LifecyclePhase) -> GuardResult<()> {
        if !self.phase.can_transition_to(next) {
            return Err(GuardError::invalid_transition(self.phase, next));
        }
        debug!("Daemon lifecycle {} -> {}", self.phase, next);
        self.phase = next;
        Ok(())
    }

    fn release_watchers(&mut self) {
        self.tasks.abort_watchers();
        if let Some(comms) = self.communicator.take() {
            comms.stop();
        }
    }
}

struct Inner {
    config: Arc<GuardConfig>,
    deps: SupervisorDeps,
    budget: ErrorBudget,
    generations: GenerationCounter,
    state: Mutex<SupervisorState>,
    shutdown_tx: watch::Sender<Option<ShutdownReason>>,
    shutting_down: AtomicBool,
    total_starts: AtomicU64,
}

/// Owns the daemon child process: launches it, waits for it to become ready,
/// restarts it after failures within the error budget and stops it with the
/// exit-command, terminate, kill escalation.
///
/// State lives behind one mutex that is never held across an await. Every
/// timer runs as a task bound to the daemon generation it was created for.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

fn upgrade(weak: &Weak<Inner>) -> Option<Supervisor> {
    weak.upgrade().map(|inner| Supervisor { inner })
}

impl Supervisor {
    pub fn new(config: Arc<GuardConfig>, deps: SupervisorDeps) -> Self {
        let budget = ErrorBudget::new(config.restart.max_close_errors, config.restart.error_forget());
        let (shutdown_tx, _) = watch::channel(None);

        Self {
            inner: Arc::new(Inner {
                config,
                deps,
                budget,
                generations: GenerationCounter::new(),
                state: Mutex::new(SupervisorState {
                    phase: LifecyclePhase::Stopped,
                    child: None,
                    initialized: false,
                    auto_restart: true,
                    updating: false,
                    startup_time: Utc::now(),
                    communicator: None,
                    tasks: GenerationTasks::default(),
                    last_exit: None,
                }),
                shutdown_tx,
                shutting_down: AtomicBool::new(false),
                total_starts: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.inner.config
    }

    fn launch_spec(&self) -> LaunchSpec {
        let node = &self.inner.config.node;
        LaunchSpec {
            program: node.executable_path(),
            args: node.args.clone(),
            stdin_control: node.cooperative_exit().is_some(),
        }
    }

    /// Launches a new daemon generation. Only valid while stopped. A launch
    /// failure schedules a fatal shutdown.
    pub fn start(&self) -> GuardResult<()> {
        if self.is_shutting_down() {
            return Err(GuardError::Process("Guardian is shutting down".into()));
        }

        let spec = self.launch_spec();
        let mut st = self.inner.state.lock();
        st.transition(LifecyclePhase::Starting)?;

        let token = self.inner.generations.advance();
        st.auto_restart = true;
        st.initialized = false;
        st.startup_time = Utc::now();

        let child = match self.inner.deps.launcher.launch(&spec) {
            Ok(child) => child,
            Err(e) => {
                st.transition(LifecyclePhase::Stopped)?;
                drop(st);
                self.report(Severity::Error, &format!("Error starting the daemon: {}", e), true);
                self.schedule_shutdown(ShutdownReason::SpawnFailed(e.to_string()));
                return Err(e);
            }
        };

        let pid = child.pid();
        st.child = Some(child.clone());
        st.transition(LifecyclePhase::Initializing)?;
        self.inner.total_starts.fetch_add(1, Ordering::Relaxed);

        self.spawn_exit_watcher(token.clone(), child);
        st.tasks.init_poll = Some(self.spawn_init_poll(token.clone()));
        st.tasks.pool_notify = self.spawn_pool_notify(token.clone());
        drop(st);

        self.report(
            Severity::Info,
            &format!(
                "Daemon started (pid {}, generation {})",
                pid.map(|p| p.to_string()).unwrap_or_else(|| "?".into()),
                token.generation()
            ),
            false,
        );
        Ok(())
    }

    /// Stops the current daemon. `auto_restart` decides whether its exit is
    /// followed by a new launch. Repeated calls while a stop is in flight do
    /// not schedule another escalation.
    pub fn stop(&self, auto_restart: bool) -> StopOutcome {
        self.stop_generation(None, auto_restart)
    }

    fn stop_generation(&self, token: Option<&GenerationToken>, auto_restart: bool) -> StopOutcome {
        let mut st = self.inner.state.lock();
        if token.is_some_and(|t| !t.is_current()) {
            return StopOutcome::Stale;
        }

        st.auto_restart = auto_restart;
        st.release_watchers();

        let Some(child) = st.child.clone() else {
            return StopOutcome::NoChild;
        };

        if st.phase == LifecyclePhase::Stopping {
            debug!("Daemon stop already in progress");
            return StopOutcome::AlreadyStopping;
        }

        if let Err(e) = st.transition(LifecyclePhase::Stopping) {
            warn!("Cannot stop daemon: {}", e);
            return StopOutcome::NoChild;
        }

        info!("Stopping daemon (pid {:?})", child.pid());
        let restart = &self.inner.config.restart;
        st.tasks.escalation = Some(tokio::spawn(escalate(
            child,
            self.inner.config.node.cooperative_exit().map(str::to_string),
            restart.cooperative_window(),
            restart.terminate_window(),
        )));

        StopOutcome::Escalating
    }

    fn spawn_exit_watcher(&self, token: GenerationToken, child: Arc<dyn DaemonChild>) {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let outcome = child.wait().await;
            if let Some(supervisor) = upgrade(&weak) {
                supervisor.handle_exit(&token, outcome);
            }
        });
    }

    fn handle_exit(&self, token: &GenerationToken, outcome: ExitOutcome) {
        let (restart, solicited) = {
            let mut st = self.inner.state.lock();
            if !token.is_current() || st.child.is_none() {
                debug!("Ignoring exit of daemon generation {}", token.generation());
                return;
            }

            let solicited = st.phase == LifecyclePhase::Stopping;
            st.child = None;
            st.initialized = false;
            st.tasks.abort_escalation();
            st.release_watchers();
            if let Err(e) = st.transition(LifecyclePhase::Stopped) {
                warn!("{}", e);
                st.phase = LifecyclePhase::Stopped;
            }
            st.last_exit = Some(ExitRecord {
                generation: token.generation(),
                outcome,
                solicited,
            });

            (st.auto_restart && !st.updating, solicited)
        };

        if !solicited && !outcome.was_signalled() {
            self.report(
                Severity::Error,
                &format!("Daemon process closed with {}", outcome),
                true,
            );
        } else {
            info!("Daemon process exited with {}", outcome);
        }

        if !restart || self.is_shutting_down() {
            debug!("Daemon stays stopped");
            return;
        }

        let errors = self.inner.budget.record();
        if self.inner.budget.is_exhausted(errors) {
            self.report(
                Severity::Error,
                "Too many daemon errors in a short amount of time, shutting down",
                true,
            );
            self.schedule_shutdown(ShutdownReason::ErrorBudgetExhausted);
            return;
        }

        info!(
            "Restarting daemon ({}/{} recent errors)",
            errors,
            self.inner.budget.limit()
        );
        if let Err(e) = self.start() {
            error!("Failed to restart daemon: {}", e);
        }
    }

    fn spawn_init_poll(&self, token: GenerationToken) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let probe = self.inner.deps.probe.clone();
        let period = self.inner.config.health.init_poll();
        let max_init = self.inner.config.restart.max_init();

        tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = interval_at(started + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if !token.is_current() {
                    return;
                }

                if started.elapsed() > max_init {
                    if let Some(supervisor) = upgrade(&weak) {
                        supervisor.fail_generation(
                            &token,
                            "Daemon initialization is taking too long, restarting it",
                        );
                    }
                    return;
                }

                match probe.info().await {
                    Ok(info) if info.status.is_ok() => {
                        if let Some(supervisor) = upgrade(&weak) {
                            supervisor.mark_initialized(&token);
                        }
                        return;
                    }
                    Ok(info) => debug!("Daemon not ready yet (status {})", info.status),
                    Err(e) => debug!("Daemon not ready yet: {}", e),
                }
            }
        })
    }

    fn mark_initialized(&self, token: &GenerationToken) {
        {
            let mut st = self.inner.state.lock();
            if !token.is_current() || st.phase != LifecyclePhase::Initializing {
                return;
            }
            if let Err(e) = st.transition(LifecyclePhase::Running) {
                warn!("{}", e);
                return;
            }

            st.initialized = true;
            st.tasks.init_poll = None;

            let comms = Arc::new(HealthCommunicator::new(
                self.inner.deps.probe.clone(),
                CommsSettings::from_config(&self.inner.config),
                self.failure_callback(token.clone()),
            ));
            comms.start();
            st.communicator = Some(comms);
        }

        self.report(
            Severity::Info,
            "Daemon is initialized, starting periodic health checks",
            false,
        );
    }

    fn failure_callback(&self, token: GenerationToken) -> FailureCallback {
        let weak = Arc::downgrade(&self.inner);
        Arc::new(move |failure: HealthFailure| {
            if let Some(supervisor) = upgrade(&weak) {
                supervisor.fail_generation(&token, &failure.to_string());
            }
        })
    }

    /// Restart path for a generation that failed a readiness or health check.
    fn fail_generation(&self, token: &GenerationToken, message: &str) {
        if !token.is_current() {
            debug!(
                "Ignoring failure from daemon generation {}: {}",
                token.generation(),
                message
            );
            return;
        }

        self.report(Severity::Error, message, true);
        self.stop_generation(Some(token), true);
    }

    fn spawn_pool_notify(&self, token: GenerationToken) -> Option<JoinHandle<()>> {
        let pool = self.inner.deps.pool.clone()?;
        let weak = Arc::downgrade(&self.inner);

        Some(tokio::spawn(async move {
            let period = pool.interval();
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if !token.is_current() {
                    return;
                }
                let Some(supervisor) = upgrade(&weak) else {
                    return;
                };

                let info = supervisor.node_info();
                if let Err(e) = pool.push(&info).await {
                    supervisor.report(Severity::Error, &format!("Error notifying pool: {}", e), false);
                }
            }
        }))
    }

    fn schedule_shutdown(&self, reason: ShutdownReason) {
        if self.inner.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }

        let delay = self.inner.config.restart.fatal_delay();
        warn!("Guardian exits in {:?}: {}", delay, reason);

        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.shutdown_tx.send_replace(Some(reason));
            }
        });
    }

    pub fn request_shutdown(&self, reason: ShutdownReason) {
        self.inner.shutting_down.store(true, Ordering::SeqCst);
        self.inner.shutdown_tx.send_replace(Some(reason));
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::SeqCst)
    }

    pub async fn wait_for_shutdown(&self) -> ShutdownReason {
        let mut rx = self.inner.shutdown_tx.subscribe();
        loop {
            let current: Option<ShutdownReason> = (*rx.borrow_and_update()).clone();
            if let Some(reason) = current {
                return reason;
            }
            if rx.changed().await.is_err() {
                return ShutdownReason::Requested;
            }
        }
    }

    /// Stops the daemon without restart and waits for it to exit, bounded by
    /// the full escalation window.
    pub async fn shutdown_gracefully(&self) {
        self.inner.shutting_down.store(true, Ordering::SeqCst);
        self.stop(false);

        let restart = &self.inner.config.restart;
        let limit = restart.cooperative_window() + restart.terminate_window() + Duration::from_secs(5);
        if tokio::time::timeout(limit, self.wait_for_child_exit(Duration::from_millis(250)))
            .await
            .is_err()
        {
            warn!("Daemon still running {:?} after shutdown began", limit);
        }
    }

    pub async fn wait_for_child_exit(&self, poll: Duration) {
        while self.has_child() {
            tokio::time::sleep(poll).await;
        }
    }

    /// Claims the update gate. Fails while another update holds it or while
    /// the daemon is being stopped.
    pub fn try_begin_update(&self) -> GuardResult<()> {
        let mut st = self.inner.state.lock();
        if self.is_shutting_down() {
            return Err(GuardError::Update("Guardian is shutting down".into()));
        }
        if st.updating {
            return Err(GuardError::Update("An update is already in progress".into()));
        }
        if st.phase == LifecyclePhase::Stopping {
            return Err(GuardError::invalid_transition(st.phase, "Updating"));
        }
        st.updating = true;
        Ok(())
    }

    pub fn end_update(&self) {
        self.inner.state.lock().updating = false;
    }

    pub fn is_updating(&self) -> bool {
        self.inner.state.lock().updating
    }

    pub fn has_child(&self) -> bool {
        self.inner.state.lock().child.is_some()
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.inner.state.lock().phase
    }

    /// Version reported by the running daemon, once it is initialized.
    pub fn daemon_version(&self) -> Option<String> {
        let st = self.inner.state.lock();
        if !st.initialized {
            return None;
        }
        st.communicator
            .as_ref()
            .and_then(|c| c.snapshot())
            .map(|s| s.info.version)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn node_info(&self) -> NodeInfo {
        let (status, blockchain) = {
            let st = self.inner.state.lock();
            (
                NodeStatusSummary {
                    errors: self.inner.budget.count(),
                    start_time: st.startup_time,
                    initialized: st.initialized,
                },
                st.communicator
                    .as_ref()
                    .and_then(|c| c.snapshot())
                    .map(|s| s.info),
            )
        };

        let location = self
            .inner
            .deps
            .location
            .as_ref()
            .map(|l| l.current())
            .unwrap_or_default();
        let identity = &self.inner.deps.identity;

        NodeInfo {
            id: identity.id.clone(),
            os: std::env::consts::OS.to_string(),
            name: identity.name.clone(),
            version: identity.version.clone(),
            node_host: location.ip.clone(),
            node_port: self.inner.config.node.port,
            url: self.inner.config.url.clone(),
            status,
            blockchain,
            location,
        }
    }

    pub fn stats(&self) -> SupervisorStats {
        let st = self.inner.state.lock();
        SupervisorStats {
            phase: st.phase,
            generation: self.inner.generations.current(),
            pid: st.child.as_ref().and_then(|c| c.pid()),
            initialized: st.initialized,
            updating: st.updating,
            auto_restart: st.auto_restart,
            error_count: self.inner.budget.count(),
            total_starts: self.inner.total_starts.load(Ordering::Relaxed),
            started_at: st.startup_time,
            last_exit: st.last_exit,
        }
    }

    /// Logs and records an event; `notify` also forwards it to the notifier
    /// when error notifications are enabled.
    pub fn report(&self, severity: Severity, message: &str, notify: bool) {
        let reporter = &self.inner.deps.reporter;
        let node = (notify && reporter.notifications_enabled()).then(|| self.node_info());
        reporter.report(severity, message, node);
    }
}

/// Entry points for results that arrive through a generation's tasks, so
/// tests can replay them against a newer generation.
#[cfg(test)]
impl Supervisor {
    pub(crate) fn current_token(&self) -> GenerationToken {
        self.inner.generations.current_token()
    }

    pub(crate) fn failure_callback_for(&self, token: GenerationToken) -> FailureCallback {
        self.failure_callback(token)
    }

    pub(crate) fn stop_for(&self, token: &GenerationToken, auto_restart: bool) -> StopOutcome {
        self.stop_generation(Some(token), auto_restart)
    }

    pub(crate) fn exit_for(&self, token: &GenerationToken, outcome: ExitOutcome) {
        self.handle_exit(token, outcome)
    }

    pub(crate) fn ready_for(&self, token: &GenerationToken) {
        self.mark_initialized(token)
    }
}

async fn escalate(
    child: Arc<dyn DaemonChild>,
    exit_command: Option<String>,
    cooperative: Duration,
    terminate: Duration,
) {
    if let Some(command) = exit_command {
        match child.request_exit(&command).await {
            Ok(true) => {
                debug!("Sent {:?} to the daemon", command);
                if tokio::time::timeout(cooperative, child.wait()).await.is_ok() {
                    return;
                }
                warn!("Daemon ignored the exit command for {:?}", cooperative);
            }
            Ok(false) => debug!("Daemon has no input channel, skipping the exit command"),
            Err(e) => warn!("Failed to send exit command: {}", e),
        }
    }

    if let Err(e) = child.terminate() {
        warn!("Failed to terminate daemon: {}", e);
    }
    if tokio::time::timeout(terminate, child.wait()).await.is_ok() {
        return;
    }

    warn!("Daemon still running {:?} after the terminate signal, killing it", terminate);
    if let Err(e) = child.kill() {
        error!("Failed to kill daemon: {}", e);
    }
}
