use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::duration;
use crate::error::VigilError;
use crate::validation;

/// Opaque, immutable identifier of a monitored target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(Uuid);

impl TargetId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TargetId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Health check strategy used for a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeType {
    Http,
    Tcp,
    Ping,
}

impl ProbeType {
    pub const ALL: [ProbeType; 3] = [ProbeType::Http, ProbeType::Tcp, ProbeType::Ping];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeType::Http => "http",
            ProbeType::Tcp => "tcp",
            ProbeType::Ping => "ping",
        }
    }
}

impl fmt::Display for ProbeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProbeType {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" | "https" => Ok(ProbeType::Http),
            "tcp" => Ok(ProbeType::Tcp),
            "ping" | "icmp" => Ok(ProbeType::Ping),
            other => Err(VigilError::invalid(format!("Unknown probe type: {other}"))),
        }
    }
}

/// A monitored endpoint and its probe configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,
    pub name: String,
    pub address: String,
    pub probe_type: ProbeType,
    #[serde(with = "duration::serde_str")]
    pub interval: Duration,
    #[serde(with = "duration::serde_str")]
    pub timeout: Duration,
}

impl Target {
    /// Check every constraint a schedulable target must satisfy.
    pub fn validate(&self) -> Result<(), VigilError> {
        validation::validate_name(&self.name).into_result()?;
        validation::validate_address(&self.address, self.probe_type).into_result()?;
        validation::validate_interval(self.interval).into_result()?;
        validation::validate_timeout(self.timeout, self.interval).into_result()
    }
}

/// Values used when a [`TargetConfig`] leaves interval or timeout unset.
#[derive(Debug, Clone, Copy)]
pub struct TargetDefaults {
    pub interval: Duration,
    pub timeout: Duration,
}

/// Caller-supplied target configuration for add and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub name: String,
    pub address: String,
    pub probe_type: ProbeType,
    #[serde(default, with = "duration::serde_str_opt")]
    pub interval: Option<Duration>,
    #[serde(default, with = "duration::serde_str_opt")]
    pub timeout: Option<Duration>,
}

impl TargetConfig {
    pub fn new(name: impl Into<String>, address: impl Into<String>, probe_type: ProbeType) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            probe_type,
            interval: None,
            timeout: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build a validated [`Target`] under `id`.
    ///
    /// An omitted timeout defaults to `min(defaults.timeout, interval / 2)`.
    /// Explicit values are validated as given and never clamped.
    pub fn resolve(self, id: TargetId, defaults: &TargetDefaults) -> Result<Target, VigilError> {
        let interval = self.interval.unwrap_or(defaults.interval);
        let timeout = self.timeout.unwrap_or_else(|| defaults.timeout.min(interval / 2));

        let target = Target {
            id,
            name: self.name.trim().to_string(),
            address: self.address.trim().to_string(),
            probe_type: self.probe_type,
            interval,
            timeout,
        };
        target.validate()?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> TargetDefaults {
        TargetDefaults { interval: Duration::from_secs(30), timeout: Duration::from_secs(10) }
    }

    #[test]
    fn test_resolve_applies_defaults() {
        let target = TargetConfig::new(" api ", "https://example.com", ProbeType::Http)
            .resolve(TargetId::new(), &defaults())
            .unwrap();
        assert_eq!(target.name, "api");
        assert_eq!(target.interval, Duration::from_secs(30));
        assert_eq!(target.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_default_timeout_stays_below_short_interval() {
        let target = TargetConfig::new("db", "db.local:5432", ProbeType::Tcp)
            .with_interval(Duration::from_secs(4))
            .resolve(TargetId::new(), &defaults())
            .unwrap();
        assert_eq!(target.timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_timeout_not_below_interval_is_rejected() {
        let err = TargetConfig::new("db", "db.local:5432", ProbeType::Tcp)
            .with_interval(Duration::from_secs(15))
            .with_timeout(Duration::from_secs(15))
            .resolve(TargetId::new(), &defaults())
            .unwrap_err();
        assert!(matches!(err, VigilError::InvalidConfig(_)));
    }

    #[test]
    fn test_malformed_address_is_rejected() {
        let err = TargetConfig::new("web", "example.com", ProbeType::Http)
            .resolve(TargetId::new(), &defaults())
            .unwrap_err();
        assert!(matches!(err, VigilError::InvalidConfig(_)));
    }

    #[test]
    fn test_target_serializes_durations_as_strings() {
        let target = TargetConfig::new("web", "https://example.com", ProbeType::Http)
            .with_interval(Duration::from_secs(90))
            .with_timeout(Duration::from_secs(5))
            .resolve(TargetId::new(), &defaults())
            .unwrap();
        let json = serde_json::to_value(&target).unwrap();
        assert_eq!(json["interval"], "1m30s");
        assert_eq!(json["timeout"], "5s");
        assert_eq!(json["probe_type"], "http");
    }

    #[test]
    fn test_config_accepts_numeric_and_missing_durations() {
        let config: TargetConfig = serde_json::from_value(serde_json::json!({
            "name": "cache",
            "address": "cache.local:6379",
            "probe_type": "tcp",
            "interval": 20
        }))
        .unwrap();
        assert_eq!(config.interval, Some(Duration::from_secs(20)));
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn test_probe_type_from_str() {
        assert_eq!("HTTPS".parse::<ProbeType>().unwrap(), ProbeType::Http);
        assert_eq!("icmp".parse::<ProbeType>().unwrap(), ProbeType::Ping);
        assert!("udp".parse::<ProbeType>().is_err());
    }
}
