use std::time::Duration;
use std::{env, fmt, fs, io, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vigil::EngineOptions;
use vigil::duration;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read {}: {}", .0.display(), .1)]
    ReadFailed(path::PathBuf, #[source] io::Error),
    #[error("Failed to write {}: {}", .0.display(), .1)]
    WriteFailed(path::PathBuf, #[source] io::Error),
    #[error("Failed to parse {}: {}", .0.display(), .1)]
    ParseFailed(path::PathBuf, #[source] toml::de::Error),
    #[error("Failed to serialize configuration: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("Neither XDG_CONFIG_HOME nor HOME is set")]
    ConfigPathUnavailable,
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: Server,
    pub storage: Storage,
    pub engine: EngineConfig,
    pub logging: Logging,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Server {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Storage {
    pub data_dir: path::PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Probe new targets right away instead of after one interval
    pub check_on_register: bool,
    pub unique_names: bool,
    #[serde(with = "duration::serde_str")]
    pub default_timeout: Duration,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    /// "compact" or "json"
    pub format: String,
}

impl Default for Server {
    fn default() -> Self {
        Self { bind: "127.0.0.1".into(), port: 8080 }
    }
}

impl Default for Storage {
    fn default() -> Self {
        Self { data_dir: default_data_dir() }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let options = EngineOptions::default();
        Self {
            check_on_register: options.check_on_register,
            unique_names: options.unique_names,
            default_timeout: options.default_timeout,
        }
    }
}

impl Default for Logging {
    fn default() -> Self {
        Self { level: "info".into(), format: "compact".into() }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/vigil/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("vigil/config.toml"))
}

/// $XDG_DATA_HOME/vigil, $HOME/.local/share/vigil, or ./data
fn default_data_dir() -> path::PathBuf {
    if let Ok(data_home) = env::var("XDG_DATA_HOME") {
        path::PathBuf::from(data_home).join("vigil")
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".local/share/vigil")
    } else {
        path::PathBuf::from("data")
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Configuration:")?;
        write_title_1(f, "Server")?;
        write_1(f, "Bind Address", &self.server.bind)?;
        write_1(f, "Port", &self.server.port)?;
        write_title_1(f, "Storage")?;
        write_1(f, "Data Directory", &self.storage.data_dir.display())?;
        write_title_1(f, "Engine")?;
        write_1(f, "Check On Register", &self.engine.check_on_register)?;
        write_1(f, "Unique Names", &self.engine.unique_names)?;
        write_1(f, "Default Timeout", &duration::format(self.engine.default_timeout))?;
        write_title_1(f, "Logging")?;
        write_1(f, "Level", &self.logging.level)?;
        write_1(f, "Format", &self.logging.format)?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/vigil/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let config: Self = if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|err| Error::ReadFailed(config_path.clone(), err))?;
            toml::from_str(raw_string.as_str())
                .map_err(|err| Error::ParseFailed(config_path.clone(), err))?
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| Error::WriteFailed(path.to_path_buf(), err))?;
        }

        fs::write(path, config_str).map_err(|err| Error::WriteFailed(path.to_path_buf(), err))
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.engine.default_timeout < Duration::from_secs(1) {
            return Err(Error::Invalid("engine.default_timeout must be at least 1s".into()));
        }
        if self.logging.format.parse::<logger::LogFormat>().is_err() {
            return Err(Error::Invalid(format!(
                "logging.format must be \"compact\" or \"json\", got \"{}\"",
                self.logging.format
            )));
        }
        Ok(())
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            check_on_register: self.engine.check_on_register,
            unique_names: self.engine.unique_names,
            default_timeout: self.engine.default_timeout,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config");

        let config = Config::from_config(Some(&path)).unwrap();

        assert!(dir.path().join("nested/config.toml").exists());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.engine.default_timeout, Duration::from_secs(10));
        assert!(config.engine.unique_names);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[server]\nport = 9100\n\n[engine]\ndefault_timeout = \"5s\"\n").unwrap();

        let config = Config::from_config(Some(&path)).unwrap();

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.engine_options().default_timeout, Duration::from_secs(5));
        assert!(!config.engine.check_on_register);
    }

    #[test]
    fn test_invalid_log_format_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[logging]\nformat = \"xml\"\n").unwrap();

        assert!(matches!(Config::from_config(Some(&path)), Err(Error::Invalid(_))));
    }

    #[test]
    fn test_display_lists_sections() {
        let shown = Config::default().to_string();
        assert!(shown.contains("Server"));
        assert!(shown.contains("Default Timeout: 10s"));
    }
}
