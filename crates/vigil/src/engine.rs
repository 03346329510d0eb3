/// Engine facade - wires the monitoring components together
///
/// The engine:
/// - Loads settings and stored targets from the [`Store`] at start
/// - Owns the registry, status store, scheduler and alert dispatcher
/// - Exposes the operations a presentation layer needs
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use tokio::sync::broadcast;
use tracing::info;

use crate::alert::{Alert, AlertChannel, AlertDispatcher, InAppChannel, email};
use crate::error::{Result, VigilError};
use crate::probe::ProbeExecutor;
use crate::registry::{Registry, RegistryOptions};
use crate::scheduler::{Scheduler, SchedulerContext, SchedulerOptions};
use crate::settings::{ProviderDefaults, Settings, SettingsStore, SmtpConfig, SmtpProvider, provider_defaults};
use crate::status::{Status, StatusStore, TargetWithStatus};
use crate::store::Store;
use crate::target::{Target, TargetConfig, TargetId};

/// Engine-level knobs that are not user preferences.
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub check_on_register: bool,
    pub unique_names: bool,
    pub default_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        let registry = RegistryOptions::default();
        Self {
            check_on_register: false,
            unique_names: registry.unique_names,
            default_timeout: registry.default_timeout,
        }
    }
}

pub struct EngineBuilder {
    store: Arc<dyn Store>,
    options: EngineOptions,
    executor: Option<ProbeExecutor>,
    email_channel: Option<Arc<dyn AlertChannel>>,
}

impl EngineBuilder {
    pub fn options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Use `executor` instead of the network probes.
    pub fn executor(mut self, executor: ProbeExecutor) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Deliver email-mode alerts through `channel` instead of SMTP.
    pub fn email_channel(mut self, channel: Arc<dyn AlertChannel>) -> Self {
        self.email_channel = Some(channel);
        self
    }

    pub async fn start(self) -> Result<Engine> {
        let settings = Arc::new(SettingsStore::load(self.store.clone()).await?);
        let statuses = Arc::new(StatusStore::new());

        let executor = match self.executor {
            Some(executor) => executor,
            None => ProbeExecutor::new()
                .context("failed to build probe executor")
                .map_err(VigilError::Store)?,
        };

        let mut dispatcher = AlertDispatcher::new(Arc::new(InAppChannel::new()));
        if let Some(channel) = self.email_channel {
            dispatcher = dispatcher.with_email_channel(channel);
        }
        let dispatcher = Arc::new(dispatcher);

        let scheduler = Arc::new(Scheduler::new(
            SchedulerContext {
                executor: Arc::new(executor),
                statuses: statuses.clone(),
                settings: settings.clone(),
                dispatcher: dispatcher.clone(),
            },
            SchedulerOptions { check_on_register: self.options.check_on_register },
        ));

        let registry = Registry::new(
            statuses.clone(),
            scheduler.clone(),
            settings.clone(),
            self.store.clone(),
            RegistryOptions {
                unique_names: self.options.unique_names,
                default_timeout: self.options.default_timeout,
            },
        );

        let stored = self.store.load_targets().await.map_err(VigilError::Store)?;
        let restored = registry.restore(stored).await;
        info!(targets = restored, "Monitoring engine started");

        Ok(Engine {
            settings,
            statuses,
            scheduler,
            registry,
            dispatcher,
            closed: AtomicBool::new(false),
        })
    }
}

/// The monitoring engine.
pub struct Engine {
    settings: Arc<SettingsStore>,
    statuses: Arc<StatusStore>,
    scheduler: Arc<Scheduler>,
    registry: Registry,
    dispatcher: Arc<AlertDispatcher>,
    closed: AtomicBool,
}

impl Engine {
    pub fn builder(store: Arc<dyn Store>) -> EngineBuilder {
        EngineBuilder { store, options: EngineOptions::default(), executor: None, email_channel: None }
    }

    /// Start with the network probes and SMTP delivery.
    pub async fn start(store: Arc<dyn Store>, options: EngineOptions) -> Result<Self> {
        Self::builder(store).options(options).start().await
    }

    pub async fn list_targets(&self) -> Vec<TargetWithStatus> {
        self.registry.list().await
    }

    pub async fn get_target(&self, id: &TargetId) -> Result<TargetWithStatus> {
        let target = self.registry.get(id).await.ok_or(VigilError::NotFound(*id))?;
        let status = self.statuses.get(id).unwrap_or_default();
        Ok(TargetWithStatus { target, status })
    }

    pub async fn add_target(&self, config: TargetConfig) -> Result<Target> {
        self.ensure_running()?;
        self.registry.add(config).await
    }

    pub async fn update_target(&self, id: TargetId, config: TargetConfig) -> Result<Target> {
        self.ensure_running()?;
        self.registry.update(id, config).await
    }

    pub async fn remove_target(&self, id: TargetId) -> Result<()> {
        self.registry.remove(id).await
    }

    /// Probe `id` now and return the fresh status.
    pub async fn manual_check(&self, id: TargetId) -> Result<Status> {
        self.ensure_running()?;
        self.scheduler.check_now(&id).await
    }

    /// Last completed status, never waiting on a probe.
    pub fn status(&self, id: &TargetId) -> Option<Status> {
        self.statuses.get(id)
    }

    pub fn get_settings(&self) -> Arc<Settings> {
        self.settings.snapshot()
    }

    pub async fn save_settings(&self, settings: Settings) -> Result<()> {
        self.settings.save(settings).await
    }

    pub async fn test_smtp(&self, config: &SmtpConfig) -> Result<()> {
        self.dispatcher.test_smtp(config).await?;
        Ok(())
    }

    /// Send a real message with the saved SMTP settings, to `to` or the
    /// configured recipient.
    pub async fn send_test_email(&self, to: Option<&str>) -> Result<()> {
        let settings = self.settings.snapshot();
        let to = to
            .map(str::trim)
            .filter(|to| !to.is_empty())
            .unwrap_or_else(|| settings.user_email.trim());
        if to.is_empty() {
            return Err(VigilError::invalid("No recipient address given or configured"));
        }
        email::send_test_email(&settings.smtp, to).await?;
        info!(to, "Test email sent");
        Ok(())
    }

    pub fn provider_defaults(&self, provider: SmtpProvider) -> ProviderDefaults {
        provider_defaults(provider)
    }

    pub async fn clear_cooldowns(&self) {
        self.scheduler.reset_cooldowns().await;
        info!("Notification cooldowns cleared");
    }

    /// In-app alerts, oldest first.
    pub fn recent_alerts(&self) -> Vec<Alert> {
        self.dispatcher.inapp().recent()
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<Alert> {
        self.dispatcher.inapp().subscribe()
    }

    /// Stop every worker. Later add, update and check calls fail with `Shutdown`.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.scheduler.shutdown().await;
        info!("Monitoring engine stopped");
    }

    fn ensure_running(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) { Err(VigilError::Shutdown) } else { Ok(()) }
    }
}
