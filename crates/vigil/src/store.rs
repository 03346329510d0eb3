use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::settings::Settings;
use crate::target::Target;

const TARGETS_FILE: &str = "targets.json";
const SETTINGS_FILE: &str = "settings.json";

/// Store trait for abstracting persistence of targets and settings
#[async_trait]
pub trait Store: Send + Sync {
    /// Load every stored target, in insertion order
    async fn load_targets(&self) -> Result<Vec<Target>>;

    /// Replace the stored target list
    async fn save_targets(&self, targets: &[Target]) -> Result<()>;

    /// Load settings, `None` when nothing has been saved yet
    async fn load_settings(&self) -> Result<Option<Settings>>;

    /// Replace the stored settings
    async fn save_settings(&self, settings: &Settings) -> Result<()>;
}

/// JSON files in a data directory.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create data directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    async fn read<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.dir.join(name);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        };
        let value = serde_json::from_slice(&bytes)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(Some(value))
    }

    /// Write to a sibling temp file, then rename over the target.
    async fn write<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        let tmp = self.dir.join(format!(".{name}.tmp"));
        let bytes = serde_json::to_vec_pretty(value)?;

        tokio::fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("failed to replace {}", path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn load_targets(&self) -> Result<Vec<Target>> {
        Ok(self.read(TARGETS_FILE).await?.unwrap_or_default())
    }

    async fn save_targets(&self, targets: &[Target]) -> Result<()> {
        self.write(TARGETS_FILE, targets).await
    }

    async fn load_settings(&self) -> Result<Option<Settings>> {
        self.read(SETTINGS_FILE).await
    }

    async fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.write(SETTINGS_FILE, settings).await
    }
}

/// In-process store, used by tests and ephemeral setups.
#[derive(Default)]
pub struct MemoryStore {
    targets: Mutex<Vec<Target>>,
    settings: Mutex<Option<Settings>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_targets(targets: Vec<Target>) -> Self {
        Self { targets: Mutex::new(targets), settings: Mutex::new(None) }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load_targets(&self) -> Result<Vec<Target>> {
        Ok(self.targets.lock().map_err(|_| anyhow::anyhow!("store poisoned"))?.clone())
    }

    async fn save_targets(&self, targets: &[Target]) -> Result<()> {
        *self.targets.lock().map_err(|_| anyhow::anyhow!("store poisoned"))? = targets.to_vec();
        Ok(())
    }

    async fn load_settings(&self) -> Result<Option<Settings>> {
        Ok(self.settings.lock().map_err(|_| anyhow::anyhow!("store poisoned"))?.clone())
    }

    async fn save_settings(&self, settings: &Settings) -> Result<()> {
        *self.settings.lock().map_err(|_| anyhow::anyhow!("store poisoned"))? =
            Some(settings.clone());
        Ok(())
    }
}
