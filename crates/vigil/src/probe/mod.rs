//! Health check strategies.
//!
//! A [`Probe`] performs one check against one target and reports the
//! measured latency, or the reason the target is unreachable. The
//! [`ProbeExecutor`] picks the probe for a target's type and bounds every
//! run by the target's timeout.

pub mod http;
pub mod ping;
pub mod tcp;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::target::{ProbeType, Target};

pub use http::HttpProbe;
pub use ping::PingProbe;
pub use tcp::TcpProbe;

/// Error text recorded when a probe exceeds its deadline.
pub const TIMEOUT_ERROR: &str = "timeout";

/// Checker trait for the different kinds of health check
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    /// Perform the check and return the measured latency.
    ///
    /// An `Err` is a down result, not a fault; its message becomes the
    /// status `last_error`.
    async fn check(&self, target: &Target) -> Result<Duration>;
}

/// Result of a single bounded probe run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub is_up: bool,
    pub response_time: Option<Duration>,
    pub error: Option<String>,
}

impl ProbeOutcome {
    pub fn up(response_time: Duration) -> Self {
        Self { is_up: true, response_time: Some(response_time), error: None }
    }

    pub fn down(error: impl Into<String>) -> Self {
        Self { is_up: false, response_time: None, error: Some(error.into()) }
    }

    pub fn timeout() -> Self {
        Self::down(TIMEOUT_ERROR)
    }
}

/// Probe executor, runs the probe registered for a target's type
#[derive(Clone)]
pub struct ProbeExecutor {
    probes: HashMap<ProbeType, Arc<dyn Probe>>,
}

impl ProbeExecutor {
    /// Executor with the network probes for every [`ProbeType`].
    pub fn new() -> Result<Self> {
        Ok(Self::empty()
            .with_probe(ProbeType::Http, Arc::new(HttpProbe::new()?))
            .with_probe(ProbeType::Tcp, Arc::new(TcpProbe))
            .with_probe(ProbeType::Ping, Arc::new(PingProbe)))
    }

    /// Executor without any probes; every run reports a down result.
    pub fn empty() -> Self {
        Self { probes: HashMap::new() }
    }

    /// Register or replace the probe used for `probe_type`.
    pub fn with_probe(mut self, probe_type: ProbeType, probe: Arc<dyn Probe>) -> Self {
        self.probes.insert(probe_type, probe);
        self
    }

    /// Run the target's probe, cancelled once `target.timeout` has elapsed.
    pub async fn run(&self, target: &Target) -> ProbeOutcome {
        let Some(probe) = self.probes.get(&target.probe_type) else {
            return ProbeOutcome::down(format!("no probe registered for {}", target.probe_type));
        };

        match tokio::time::timeout(target.timeout, probe.check(target)).await {
            Ok(Ok(latency)) => ProbeOutcome::up(latency),
            Ok(Err(e)) => ProbeOutcome::down(format!("{e:#}")),
            Err(_) => ProbeOutcome::timeout(),
        }
    }
}

impl std::fmt::Debug for ProbeExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeExecutor")
            .field("probes", &self.probes.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::TargetId;

    struct Fixed(Result<Duration, &'static str>);

    #[async_trait::async_trait]
    impl Probe for Fixed {
        async fn check(&self, _target: &Target) -> Result<Duration> {
            self.0.map_err(|e| anyhow::anyhow!(e))
        }
    }

    struct Hang;

    #[async_trait::async_trait]
    impl Probe for Hang {
        async fn check(&self, _target: &Target) -> Result<Duration> {
            std::future::pending().await
        }
    }

    fn target(probe_type: ProbeType) -> Target {
        Target {
            id: TargetId::new(),
            name: "t".into(),
            address: "10.0.0.1:80".into(),
            probe_type,
            interval: Duration::from_secs(15),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_success_and_failure_map_to_outcome() {
        let executor = ProbeExecutor::empty()
            .with_probe(ProbeType::Tcp, Arc::new(Fixed(Ok(Duration::from_millis(7)))))
            .with_probe(ProbeType::Http, Arc::new(Fixed(Err("connection refused"))));

        assert_eq!(
            executor.run(&target(ProbeType::Tcp)).await,
            ProbeOutcome::up(Duration::from_millis(7))
        );
        let down = executor.run(&target(ProbeType::Http)).await;
        assert!(!down.is_up);
        assert_eq!(down.error.as_deref(), Some("connection refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_probe_is_cut_at_timeout() {
        let executor = ProbeExecutor::empty().with_probe(ProbeType::Ping, Arc::new(Hang));
        let started = tokio::time::Instant::now();

        let outcome = executor.run(&target(ProbeType::Ping)).await;

        assert_eq!(outcome, ProbeOutcome::timeout());
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_missing_probe_reports_down() {
        let outcome = ProbeExecutor::empty().run(&target(ProbeType::Tcp)).await;
        assert!(!outcome.is_up);
    }
}
