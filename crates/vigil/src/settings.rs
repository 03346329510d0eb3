use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};

use crate::duration;
use crate::error::{Result, SmtpError, VigilError};
use crate::store::Store;

pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);
const MAX_REFRESH_INTERVAL: Duration = Duration::from_secs(86_400);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Auto,
    Light,
    Dark,
}

/// Where gated alerts are delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationMode {
    #[default]
    InApp,
    Email,
    None,
}

/// Process-wide user preferences, replaced wholesale on save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub theme: Theme,
    pub notification_mode: NotificationMode,
    #[serde(with = "duration::serde_str")]
    pub notification_cooldown: Duration,
    #[serde(with = "duration::serde_str")]
    pub refresh_interval: Duration,
    pub user_email: String,
    pub smtp: SmtpConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::Auto,
            notification_mode: NotificationMode::InApp,
            notification_cooldown: Duration::from_secs(10 * 60),
            refresh_interval: Duration::from_secs(30),
            user_email: String::new(),
            smtp: SmtpConfig::default(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval < MIN_REFRESH_INTERVAL {
            return Err(VigilError::invalid(format!(
                "Refresh interval must be at least {}",
                duration::format(MIN_REFRESH_INTERVAL)
            )));
        }
        if self.refresh_interval > MAX_REFRESH_INTERVAL {
            return Err(VigilError::invalid("Refresh interval too long (max 24 hours)"));
        }

        if self.notification_mode == NotificationMode::Email {
            let email = self.user_email.trim();
            if email.is_empty() || !email.contains('@') {
                return Err(VigilError::invalid(
                    "A valid recipient email is required for email notifications",
                ));
            }
            self.smtp.validate().map_err(|e| VigilError::invalid(e.to_string()))?;
        }

        Ok(())
    }
}

/// SMTP relay credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub use_tls: bool,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 587,
            username: String::new(),
            password: String::new(),
            from: String::new(),
            use_tls: true,
        }
    }
}

impl SmtpConfig {
    pub fn validate(&self) -> std::result::Result<(), SmtpError> {
        if self.host.trim().is_empty() {
            return Err(SmtpError::InvalidConfig("SMTP host is required".into()));
        }
        if self.port == 0 {
            return Err(SmtpError::InvalidConfig("SMTP port must be between 1 and 65535".into()));
        }
        if self.sender().is_empty() {
            return Err(SmtpError::InvalidConfig(
                "A sender address (from or username) is required".into(),
            ));
        }
        Ok(())
    }

    /// Envelope sender: `from`, falling back to the login name.
    pub fn sender(&self) -> &str {
        let from = self.from.trim();
        if from.is_empty() { self.username.trim() } else { from }
    }

    /// Password with the spaces providers insert when displaying app passwords.
    pub fn clean_password(&self) -> String {
        self.password.chars().filter(|c| !c.is_whitespace()).collect()
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("from", &self.from)
            .field("use_tls", &self.use_tls)
            .finish()
    }
}

/// Mail providers with well-known SMTP relays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpProvider {
    Gmail,
    Outlook,
    Yahoo,
}

impl FromStr for SmtpProvider {
    type Err = VigilError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gmail" => Ok(SmtpProvider::Gmail),
            "outlook" | "hotmail" => Ok(SmtpProvider::Outlook),
            "yahoo" => Ok(SmtpProvider::Yahoo),
            other => Err(VigilError::invalid(format!("Unknown SMTP provider: {other}"))),
        }
    }
}

/// The part of an [`SmtpConfig`] a provider fixes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderDefaults {
    pub host: &'static str,
    pub port: u16,
    pub use_tls: bool,
}

impl ProviderDefaults {
    /// Fill host, port and TLS into `config`, keeping its credentials.
    pub fn apply(&self, config: &mut SmtpConfig) {
        config.host = self.host.to_string();
        config.port = self.port;
        config.use_tls = self.use_tls;
    }
}

/// Static lookup of provider relays. Never touches the network.
pub fn provider_defaults(provider: SmtpProvider) -> ProviderDefaults {
    let host = match provider {
        SmtpProvider::Gmail => "smtp.gmail.com",
        SmtpProvider::Outlook => "smtp-mail.outlook.com",
        SmtpProvider::Yahoo => "smtp.mail.yahoo.com",
    };
    ProviderDefaults { host, port: 587, use_tls: true }
}

/// Holder of the current settings.
///
/// Readers take an `Arc` snapshot that a concurrent save never mutates.
/// Saves are serialized and persisted before being published.
pub struct SettingsStore {
    current: watch::Sender<Arc<Settings>>,
    store: Arc<dyn Store>,
    save_lock: Mutex<()>,
}

impl SettingsStore {
    /// Load from `store`, falling back to defaults when nothing usable is stored.
    pub async fn load(store: Arc<dyn Store>) -> Result<Self> {
        let settings = match store.load_settings().await.map_err(VigilError::Store)? {
            Some(settings) => match settings.validate() {
                Ok(()) => settings,
                Err(e) => {
                    tracing::warn!(error = %e, "Stored settings are invalid, using defaults");
                    Settings::default()
                }
            },
            None => Settings::default(),
        };

        Ok(Self {
            current: watch::Sender::new(Arc::new(settings)),
            store,
            save_lock: Mutex::new(()),
        })
    }

    pub fn snapshot(&self) -> Arc<Settings> {
        self.current.borrow().clone()
    }

    /// Validate, persist, then publish `settings`. On error nothing changes.
    pub async fn save(&self, settings: Settings) -> Result<()> {
        settings.validate()?;

        let _guard = self.save_lock.lock().await;
        self.store.save_settings(&settings).await.map_err(VigilError::Store)?;
        self.current.send_replace(Arc::new(settings));
        tracing::info!("Settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn email_settings() -> Settings {
        Settings {
            notification_mode: NotificationMode::Email,
            user_email: "ops@example.com".into(),
            smtp: SmtpConfig {
                host: "smtp.example.com".into(),
                username: "alerts@example.com".into(),
                password: "abcd efgh ijkl mnop".into(),
                ..SmtpConfig::default()
            },
            ..Settings::default()
        }
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.notification_mode, NotificationMode::InApp);
        assert_eq!(settings.notification_cooldown, Duration::from_secs(600));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_refresh_interval_floor() {
        let settings = Settings { refresh_interval: Duration::from_secs(5), ..Settings::default() };
        assert!(matches!(settings.validate(), Err(VigilError::InvalidConfig(_))));
    }

    #[test]
    fn test_email_mode_requires_recipient_and_relay() {
        let mut settings = email_settings();
        assert!(settings.validate().is_ok());

        settings.user_email.clear();
        assert!(settings.validate().is_err());

        let mut settings = email_settings();
        settings.smtp.host.clear();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_clean_password_and_sender() {
        let smtp = email_settings().smtp;
        assert_eq!(smtp.clean_password(), "abcdefghijklmnop");
        assert_eq!(smtp.sender(), "alerts@example.com");
        assert!(!format!("{smtp:?}").contains("abcd"));
    }

    #[test]
    fn test_provider_defaults() {
        let gmail = provider_defaults("gmail".parse().unwrap());
        assert_eq!((gmail.host, gmail.port, gmail.use_tls), ("smtp.gmail.com", 587, true));

        let mut config = SmtpConfig { username: "me@outlook.com".into(), ..SmtpConfig::default() };
        provider_defaults(SmtpProvider::Outlook).apply(&mut config);
        assert_eq!(config.host, "smtp-mail.outlook.com");
        assert_eq!(config.username, "me@outlook.com");

        assert!("aol".parse::<SmtpProvider>().is_err());
    }

    #[test]
    fn test_settings_json_uses_duration_strings() {
        let json = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(json["notification_cooldown"], "10m");
        assert_eq!(json["refresh_interval"], "30s");
        assert_eq!(json["notification_mode"], "inapp");
    }

    #[tokio::test]
    async fn test_rejected_save_keeps_previous_snapshot() {
        let store = SettingsStore::load(Arc::new(MemoryStore::new())).await.unwrap();
        let before = store.snapshot();

        let bad = Settings { refresh_interval: Duration::from_secs(1), ..Settings::default() };
        assert!(store.save(bad).await.is_err());
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn test_snapshot_is_not_mutated_by_save() {
        let store = SettingsStore::load(Arc::new(MemoryStore::new())).await.unwrap();
        let held = store.snapshot();

        store.save(email_settings()).await.unwrap();

        assert_eq!(held.notification_mode, NotificationMode::InApp);
        assert_eq!(store.snapshot().notification_mode, NotificationMode::Email);
    }
}
