//! Per-target probe scheduling.
//!
//! Every registered target gets its own worker task. The worker owns the
//! target's timer, its in-flight probe and its notification record, so no
//! lock is shared between targets on the probe path.
//!
//! Worker states:
//!
//! ```text
//! Scheduled --timer/manual--> Running --probe done--> Scheduled
//!     \                          \
//!      `--------cancel-----------`--> Removed
//! ```
//!
//! Runs are fixed-rate: the next firing is `run_start + interval`. A firing
//! that falls due while a run is in flight waits for that run to finish.
//! A manual check joins the in-flight run if there is one, otherwise it
//! starts a run without moving the next scheduled firing.
//!
//! A run started before a reconfigure is stale: its result is dropped and
//! callers waiting on it get a fresh run of the new configuration.
//!
//! Alerts leave a worker through its own delivery queue, so they reach the
//! channel in the order their transitions happened. A worker that exits
//! waits for its queue to drain.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::alert::{Alert, AlertDispatcher};
use crate::error::{Result, VigilError};
use crate::gate::{self, Decision, GatePolicy, NotificationRecord, Suppressed};
use crate::probe::{ProbeExecutor, ProbeOutcome};
use crate::settings::{Settings, SettingsStore};
use crate::status::{Status, StatusStore};
use crate::target::{Target, TargetId};

const COMMAND_BUFFER: usize = 16;

/// Shared collaborators handed to every worker.
#[derive(Clone)]
pub struct SchedulerContext {
    pub executor: Arc<ProbeExecutor>,
    pub statuses: Arc<StatusStore>,
    pub settings: Arc<SettingsStore>,
    pub dispatcher: Arc<AlertDispatcher>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerOptions {
    /// Run the first probe immediately instead of one interval after registration.
    pub check_on_register: bool,
}

enum Command {
    CheckNow(oneshot::Sender<Status>),
    Reconfigure(Target),
    ResetCooldown,
}

/// A probe run tagged with the configuration generation it started under.
type Run = BoxFuture<'static, (u64, ProbeOutcome)>;

type AlertQueue = mpsc::UnboundedSender<(Alert, Arc<Settings>)>;

struct WorkerHandle {
    commands: mpsc::Sender<Command>,
    token: CancellationToken,
    join: JoinHandle<()>,
}

/// Owns one worker per registered target.
pub struct Scheduler {
    ctx: SchedulerContext,
    options: SchedulerOptions,
    workers: Mutex<HashMap<TargetId, WorkerHandle>>,
    root: CancellationToken,
}

impl Scheduler {
    pub fn new(ctx: SchedulerContext, options: SchedulerOptions) -> Self {
        Self { ctx, options, workers: Mutex::new(HashMap::new()), root: CancellationToken::new() }
    }

    /// Start scheduling `target`. Re-registering an id replaces its worker.
    pub fn register(&self, target: Target) {
        let id = target.id;
        let first_fire = if self.options.check_on_register {
            Instant::now()
        } else {
            Instant::now() + target.interval
        };

        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let token = self.root.child_token();
        let worker = Worker {
            target,
            ctx: self.ctx.clone(),
            commands: rx,
            token: token.clone(),
            record: NotificationRecord::default(),
            next_fire: first_fire,
            generation: 0,
            waiters: Vec::new(),
        };
        let join = tokio::spawn(worker.run());

        let previous = self
            .workers()
            .insert(id, WorkerHandle { commands: tx, token, join });
        if let Some(previous) = previous {
            previous.token.cancel();
        }
        debug!(target_id = %id, "Target scheduled");
    }

    /// Apply a new configuration; the next firing moves to `now + interval`.
    pub async fn reconfigure(&self, target: Target) -> Result<()> {
        let id = target.id;
        self.send(&id, Command::Reconfigure(target)).await
    }

    /// Stop scheduling `id`. An in-flight probe finishes and its result is
    /// discarded. Returns false if the target was not scheduled.
    pub fn deregister(&self, id: &TargetId) -> bool {
        match self.workers().remove(id) {
            Some(handle) => {
                handle.token.cancel();
                debug!(target_id = %id, "Target unscheduled");
                true
            }
            None => false,
        }
    }

    /// Probe `id` now and wait for the result, sharing any run in flight.
    pub async fn check_now(&self, id: &TargetId) -> Result<Status> {
        let (tx, rx) = oneshot::channel();
        self.send(id, Command::CheckNow(tx)).await?;
        rx.await.map_err(|_| VigilError::NotFound(*id))
    }

    /// Forget every target's last alert so the next transition may fire.
    pub async fn reset_cooldowns(&self) {
        let senders: Vec<_> = self.workers().values().map(|h| h.commands.clone()).collect();
        for sender in senders {
            let _ = sender.send(Command::ResetCooldown).await;
        }
    }

    pub fn len(&self) -> usize {
        self.workers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancel every worker and wait for them to exit.
    pub async fn shutdown(&self) {
        self.root.cancel();
        let handles: Vec<_> = self.workers().drain().map(|(_, h)| h.join).collect();
        for join in handles {
            if let Err(e) = join.await {
                warn!(error = %e, "Scheduler worker ended abnormally");
            }
        }
    }

    async fn send(&self, id: &TargetId, command: Command) -> Result<()> {
        let sender = self
            .workers()
            .get(id)
            .map(|h| h.commands.clone())
            .ok_or(VigilError::NotFound(*id))?;
        sender.send(command).await.map_err(|_| VigilError::NotFound(*id))
    }

    fn workers(&self) -> std::sync::MutexGuard<'_, HashMap<TargetId, WorkerHandle>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Worker {
    target: Target,
    ctx: SchedulerContext,
    commands: mpsc::Receiver<Command>,
    token: CancellationToken,
    record: NotificationRecord,
    next_fire: Instant,
    /// Bumped by every reconfigure.
    generation: u64,
    waiters: Vec<oneshot::Sender<Status>>,
}

impl Worker {
    async fn run(mut self) {
        let mut in_flight: Option<Run> = None;
        let (alerts, queue) = mpsc::unbounded_channel();
        let delivery = tokio::spawn(deliver_alerts(self.ctx.dispatcher.clone(), queue));

        loop {
            tokio::select! {
                biased;

                _ = self.token.cancelled() => break,

                (generation, outcome) = async {
                    match in_flight.as_mut() {
                        Some(probe) => probe.await,
                        None => std::future::pending().await,
                    }
                }, if in_flight.is_some() => {
                    in_flight = None;
                    if generation == self.generation {
                        self.complete(outcome, &alerts);
                    } else {
                        debug!(target_id = %self.target.id, "Discarded probe result for previous configuration");
                        if !self.waiters.is_empty() {
                            in_flight = Some(self.start_probe());
                        }
                    }
                }

                _ = sleep_until(self.next_fire), if in_flight.is_none() => {
                    let started = Instant::now();
                    self.next_fire = started + self.target.interval;
                    in_flight = Some(self.start_probe());
                }

                command = self.commands.recv() => match command {
                    Some(Command::CheckNow(reply)) => {
                        self.waiters.push(reply);
                        if in_flight.is_none() {
                            debug!(target_id = %self.target.id, "Manual check started");
                            in_flight = Some(self.start_probe());
                        }
                    }
                    Some(Command::Reconfigure(target)) => {
                        debug!(target_id = %target.id, interval = ?target.interval, "Target rescheduled");
                        self.next_fire = Instant::now() + target.interval;
                        self.generation += 1;
                        self.target = target;
                    }
                    Some(Command::ResetCooldown) => self.record = NotificationRecord::default(),
                    None => break,
                },
            }
        }

        if let Some(probe) = in_flight {
            let _ = probe.await;
            debug!(target_id = %self.target.id, "Discarded probe result for removed target");
        }

        drop(alerts);
        if let Err(e) = delivery.await {
            warn!(target_id = %self.target.id, error = %e, "Alert delivery task ended abnormally");
        }
    }

    fn start_probe(&self) -> Run {
        let executor = self.ctx.executor.clone();
        let target = self.target.clone();
        let generation = self.generation;
        Box::pin(async move { (generation, executor.run(&target).await) })
    }

    fn complete(&mut self, outcome: ProbeOutcome, alerts: &AlertQueue) {
        let id = self.target.id;
        let current = Status::from_outcome(outcome, Utc::now());

        let Some(previous) = self.ctx.statuses.get(&id) else {
            self.token.cancel();
            return;
        };
        if self.token.is_cancelled() || !self.ctx.statuses.set(&id, current.clone()) {
            return;
        }

        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(current.clone());
        }

        if previous.is_up != current.is_up || previous.is_unchecked() {
            if current.is_up {
                info!(target_id = %id, target = %self.target.name, "Target is up");
            } else {
                warn!(
                    target_id = %id,
                    target = %self.target.name,
                    error = current.last_error.as_deref().unwrap_or(""),
                    "Target is down"
                );
            }
        }

        let settings = self.ctx.settings.snapshot();
        let policy = GatePolicy::from(settings.as_ref());
        match gate::evaluate(&previous, &current, &mut self.record, &policy, Instant::now()) {
            Decision::Fire => {
                let _ = alerts.send((Alert::new(&self.target, &current), settings));
            }
            Decision::Suppress(Suppressed::Cooldown { remaining }) => {
                debug!(target_id = %id, remaining = ?remaining, "Alert suppressed by cooldown");
            }
            Decision::Suppress(_) => {}
        }
    }
}

/// Deliver queued alerts one at a time until the worker drops its sender.
async fn deliver_alerts(
    dispatcher: Arc<AlertDispatcher>,
    mut queue: mpsc::UnboundedReceiver<(Alert, Arc<Settings>)>,
) {
    while let Some((alert, settings)) = queue.recv().await {
        if let Err(e) = dispatcher.deliver(&alert, &settings).await {
            error!(target_id = %alert.target_id, error = %e, "Alert delivery failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::InAppChannel;
    use crate::probe::Probe;
    use crate::store::MemoryStore;
    use crate::target::ProbeType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Counting {
        runs: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Probe for Counting {
        async fn check(&self, _target: &Target) -> anyhow::Result<Duration> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(Duration::from_millis(1))
        }
    }

    async fn scheduler(probe: Arc<Counting>, options: SchedulerOptions) -> (Scheduler, Arc<StatusStore>) {
        let statuses = Arc::new(StatusStore::new());
        let ctx = SchedulerContext {
            executor: Arc::new(ProbeExecutor::empty().with_probe(ProbeType::Tcp, probe)),
            statuses: statuses.clone(),
            settings: Arc::new(SettingsStore::load(Arc::new(MemoryStore::new())).await.unwrap()),
            dispatcher: Arc::new(AlertDispatcher::new(Arc::new(InAppChannel::new()))),
        };
        (Scheduler::new(ctx, options), statuses)
    }

    fn target(interval_secs: u64) -> Target {
        Target {
            id: TargetId::new(),
            name: "svc".into(),
            address: "10.0.0.1:80".into(),
            probe_type: ProbeType::Tcp,
            interval: Duration::from_secs(interval_secs),
            timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_run_waits_one_interval() {
        let probe = Arc::new(Counting { runs: AtomicUsize::new(0) });
        let (scheduler, statuses) = scheduler(probe.clone(), SchedulerOptions::default()).await;
        let target = target(10);
        statuses.insert(target.id);
        scheduler.register(target.clone());

        tokio::time::sleep(Duration::from_millis(9_900)).await;
        assert_eq!(probe.runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(probe.runs.load(Ordering::SeqCst), 1);
        assert!(statuses.get(&target.id).unwrap().is_up);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_on_register_runs_immediately() {
        let probe = Arc::new(Counting { runs: AtomicUsize::new(0) });
        let options = SchedulerOptions { check_on_register: true };
        let (scheduler, statuses) = scheduler(probe.clone(), options).await;
        let target = target(60);
        statuses.insert(target.id);
        scheduler.register(target);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(probe.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_check_keeps_schedule() {
        let probe = Arc::new(Counting { runs: AtomicUsize::new(0) });
        let (scheduler, statuses) = scheduler(probe.clone(), SchedulerOptions::default()).await;
        let target = target(10);
        statuses.insert(target.id);
        scheduler.register(target.clone());

        tokio::time::sleep(Duration::from_secs(4)).await;
        let status = scheduler.check_now(&target.id).await.unwrap();
        assert!(status.is_up);
        assert_eq!(probe.runs.load(Ordering::SeqCst), 1);

        // Scheduled firing still at t=10s, not t=14s.
        tokio::time::sleep(Duration::from_millis(6_100)).await;
        assert_eq!(probe.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconfigure_restarts_timer_from_now() {
        let probe = Arc::new(Counting { runs: AtomicUsize::new(0) });
        let (scheduler, statuses) = scheduler(probe.clone(), SchedulerOptions::default()).await;
        let mut target = target(10);
        statuses.insert(target.id);
        scheduler.register(target.clone());

        tokio::time::sleep(Duration::from_secs(8)).await;
        target.interval = Duration::from_secs(30);
        scheduler.reconfigure(target.clone()).await.unwrap();

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(probe.runs.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(probe.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_target_is_not_found() {
        let probe = Arc::new(Counting { runs: AtomicUsize::new(0) });
        let (scheduler, _) = scheduler(probe, SchedulerOptions::default()).await;
        let id = TargetId::new();

        assert!(matches!(scheduler.check_now(&id).await, Err(VigilError::NotFound(_))));
        assert!(!scheduler.deregister(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_all_workers() {
        let probe = Arc::new(Counting { runs: AtomicUsize::new(0) });
        let (scheduler, statuses) = scheduler(probe.clone(), SchedulerOptions::default()).await;
        for _ in 0..3 {
            let target = target(5);
            statuses.insert(target.id);
            scheduler.register(target);
        }
        assert_eq!(scheduler.len(), 3);

        scheduler.shutdown().await;
        assert!(scheduler.is_empty());

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(probe.runs.load(Ordering::SeqCst), 0);
    }
}
