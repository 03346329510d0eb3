use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{Result, VigilError};
use crate::scheduler::Scheduler;
use crate::settings::SettingsStore;
use crate::status::{StatusStore, TargetWithStatus};
use crate::store::Store;
use crate::target::{Target, TargetConfig, TargetDefaults, TargetId};

#[derive(Debug, Clone, Copy)]
pub struct RegistryOptions {
    /// Reject a second target with the same (case-insensitive) name.
    pub unique_names: bool,
    /// Upper bound for the timeout given to targets that omit one.
    pub default_timeout: Duration,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self { unique_names: true, default_timeout: Duration::from_secs(10) }
    }
}

#[derive(Default)]
struct Inner {
    targets: HashMap<TargetId, Target>,
    order: Vec<TargetId>,
}

impl Inner {
    fn name_taken(&self, name: &str, except: Option<&TargetId>) -> bool {
        self.targets
            .values()
            .any(|t| Some(&t.id) != except && t.name.eq_ignore_ascii_case(name))
    }

    fn ordered(&self) -> impl Iterator<Item = &Target> {
        self.order.iter().filter_map(|id| self.targets.get(id))
    }
}

/// The set of monitored targets, kept in insertion order.
///
/// Every mutation keeps target, status and scheduler worker in step while
/// holding the write lock, so callers never see one without the others.
pub struct Registry {
    inner: RwLock<Inner>,
    statuses: Arc<StatusStore>,
    scheduler: Arc<Scheduler>,
    settings: Arc<SettingsStore>,
    store: Arc<dyn Store>,
    options: RegistryOptions,
}

impl Registry {
    pub fn new(
        statuses: Arc<StatusStore>,
        scheduler: Arc<Scheduler>,
        settings: Arc<SettingsStore>,
        store: Arc<dyn Store>,
        options: RegistryOptions,
    ) -> Self {
        Self { inner: RwLock::new(Inner::default()), statuses, scheduler, settings, store, options }
    }

    /// Re-register stored targets at startup. Invalid entries are skipped.
    pub async fn restore(&self, targets: Vec<Target>) -> usize {
        let mut inner = self.inner.write().await;
        for target in targets {
            if let Err(e) = target.validate() {
                warn!(target_id = %target.id, target = %target.name, error = %e, "Skipping invalid stored target");
                continue;
            }
            if inner.targets.contains_key(&target.id) {
                warn!(target_id = %target.id, "Skipping duplicate stored target");
                continue;
            }
            self.statuses.insert(target.id);
            self.scheduler.register(target.clone());
            inner.order.push(target.id);
            inner.targets.insert(target.id, target);
        }
        inner.order.len()
    }

    pub async fn add(&self, config: TargetConfig) -> Result<Target> {
        let mut inner = self.inner.write().await;
        let target = config.resolve(TargetId::new(), &self.defaults())?;

        if self.options.unique_names && inner.name_taken(&target.name, None) {
            return Err(VigilError::DuplicateName(target.name));
        }

        self.statuses.insert(target.id);
        self.scheduler.register(target.clone());
        inner.order.push(target.id);
        inner.targets.insert(target.id, target.clone());
        info!(target_id = %target.id, target = %target.name, probe = %target.probe_type, "Target added");

        self.persist(&inner).await;
        Ok(target)
    }

    /// Replace the configuration of `id`; its status is kept.
    pub async fn update(&self, id: TargetId, config: TargetConfig) -> Result<Target> {
        let mut inner = self.inner.write().await;
        if !inner.targets.contains_key(&id) {
            return Err(VigilError::NotFound(id));
        }

        let target = config.resolve(id, &self.defaults())?;
        if self.options.unique_names && inner.name_taken(&target.name, Some(&id)) {
            return Err(VigilError::DuplicateName(target.name));
        }

        if self.scheduler.reconfigure(target.clone()).await.is_err() {
            self.scheduler.register(target.clone());
        }
        inner.targets.insert(id, target.clone());
        info!(target_id = %id, target = %target.name, "Target updated");

        self.persist(&inner).await;
        Ok(target)
    }

    /// Unschedule first, then drop the target and its status.
    pub async fn remove(&self, id: TargetId) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.targets.contains_key(&id) {
            return Err(VigilError::NotFound(id));
        }

        self.scheduler.deregister(&id);
        inner.targets.remove(&id);
        inner.order.retain(|t| *t != id);
        self.statuses.remove(&id);
        info!(target_id = %id, "Target removed");

        self.persist(&inner).await;
        Ok(())
    }

    pub async fn list(&self) -> Vec<TargetWithStatus> {
        let inner = self.inner.read().await;
        inner
            .ordered()
            .map(|target| TargetWithStatus {
                target: target.clone(),
                status: self.statuses.get(&target.id).unwrap_or_default(),
            })
            .collect()
    }

    pub async fn get(&self, id: &TargetId) -> Option<Target> {
        self.inner.read().await.targets.get(id).cloned()
    }

    fn defaults(&self) -> TargetDefaults {
        TargetDefaults {
            interval: self.settings.snapshot().refresh_interval,
            timeout: self.options.default_timeout,
        }
    }

    async fn persist(&self, inner: &Inner) {
        let targets: Vec<Target> = inner.ordered().cloned().collect();
        if let Err(e) = self.store.save_targets(&targets).await {
            warn!(error = %format!("{e:#}"), "Failed to persist targets");
        }
    }
}
