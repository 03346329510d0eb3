//! Shared fixtures for the engine integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vigil::probe::Probe;
use vigil::{
    Alert, AlertChannel, DispatchError, Engine, EngineOptions, MemoryStore, ProbeExecutor,
    ProbeType, Settings, Store, Target,
};

/// Probe with a fixed delay that replays a script of up/down results.
///
/// Once the script runs out the last result repeats.
pub struct ScriptedProbe {
    delay: Duration,
    script: Mutex<VecDeque<bool>>,
    last: Mutex<bool>,
    runs: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new(delay: Duration, script: &[bool]) -> Arc<Self> {
        Arc::new(Self {
            delay,
            script: Mutex::new(script.iter().copied().collect()),
            last: Mutex::new(true),
            runs: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        })
    }

    pub fn always_up(delay: Duration) -> Arc<Self> {
        Self::new(delay, &[])
    }

    /// A probe that never answers on its own.
    pub fn hanging() -> Arc<Self> {
        Self::new(Duration::from_secs(24 * 3600), &[])
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn next_result(&self) -> bool {
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            *last = next;
        }
        *last
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Probe for ScriptedProbe {
    async fn check(&self, _target: &Target) -> anyhow::Result<Duration> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        let _guard = ActiveGuard(&self.active);

        let up = self.next_result();
        tokio::time::sleep(self.delay).await;
        if up { Ok(Duration::from_millis(5)) } else { Err(anyhow::anyhow!("connection refused")) }
    }
}

/// Alert channel that records what it was asked to deliver.
#[derive(Default)]
pub struct RecordingChannel {
    alerts: Mutex<Vec<Alert>>,
    fail: bool,
    down_delay: Duration,
}

impl RecordingChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Records every attempt but reports each one as failed.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self { fail: true, ..Self::default() })
    }

    /// Takes `delay` to deliver a down alert; up alerts go through at once.
    pub fn slow_on_down(delay: Duration) -> Arc<Self> {
        Arc::new(Self { down_delay: delay, ..Self::default() })
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AlertChannel for RecordingChannel {
    async fn deliver(&self, alert: &Alert, _settings: &Settings) -> Result<(), DispatchError> {
        if !alert.is_up && !self.down_delay.is_zero() {
            tokio::time::sleep(self.down_delay).await;
        }
        self.alerts.lock().unwrap().push(alert.clone());
        if self.fail { Err(DispatchError::Channel("mail relay down".into())) } else { Ok(()) }
    }
}

pub fn executor(probe: Arc<ScriptedProbe>) -> ProbeExecutor {
    ProbeType::ALL
        .into_iter()
        .fold(ProbeExecutor::empty(), |executor, ty| executor.with_probe(ty, probe.clone()))
}

pub async fn engine_with(
    store: Arc<dyn Store>,
    probe: Arc<ScriptedProbe>,
    channel: Arc<RecordingChannel>,
    options: EngineOptions,
) -> Engine {
    let _ = tracing_subscriber::fmt::try_init();

    Engine::builder(store)
        .options(options)
        .executor(executor(probe))
        .email_channel(channel)
        .start()
        .await
        .unwrap()
}

pub async fn engine(probe: Arc<ScriptedProbe>) -> Engine {
    engine_with(Arc::new(MemoryStore::new()), probe, RecordingChannel::new(), EngineOptions::default())
        .await
}

pub fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

pub fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}
