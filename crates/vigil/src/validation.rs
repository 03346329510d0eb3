use std::net::IpAddr;
use std::time::Duration;

use url::Url;

use crate::error::VigilError;
use crate::target::ProbeType;

const MIN_INTERVAL: Duration = Duration::from_secs(1);
const MAX_INTERVAL: Duration = Duration::from_secs(86_400);
const MIN_TIMEOUT: Duration = Duration::from_secs(1);
const MAX_NAME_LEN: usize = 100;

/// Validation results with specific error messages
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self { is_valid: true, error: None }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self { is_valid: false, error: Some(msg.into()) }
    }

    /// Convert into an `InvalidConfig` error when validation failed.
    pub fn into_result(self) -> Result<(), VigilError> {
        if self.is_valid {
            Ok(())
        } else {
            Err(VigilError::InvalidConfig(
                self.error.unwrap_or_else(|| "Validation failed".to_string()),
            ))
        }
    }
}

/// Validate HTTP/HTTPS URL endpoint
pub fn validate_http_endpoint(target: &str) -> ValidationResult {
    if target.trim().is_empty() {
        return ValidationResult::err("Address cannot be empty");
    }

    match Url::parse(target) {
        Ok(url) => {
            let scheme = url.scheme();
            if scheme != "http" && scheme != "https" {
                return ValidationResult::err(format!(
                    "Invalid scheme '{scheme}'. Must be http or https"
                ));
            }

            if url.host_str().is_none() {
                return ValidationResult::err("URL must have a valid host");
            }

            ValidationResult::ok()
        }
        Err(e) => {
            if !target.contains("://") {
                ValidationResult::err("URL must include scheme (http:// or https://)")
            } else {
                ValidationResult::err(format!("Invalid URL: {e}"))
            }
        }
    }
}

/// Split a `host:port` address, accepting bracketed IPv6 and a `tcp://` prefix.
pub fn split_host_port(target: &str) -> Result<(String, u16), String> {
    let target = target.trim();
    let target = target.strip_prefix("tcp://").unwrap_or(target);

    let (host, port) = if let Some(rest) = target.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| "Unterminated IPv6 address".to_string())?;
        let port = after
            .strip_prefix(':')
            .ok_or_else(|| "TCP address must be in format 'host:port'".to_string())?;
        (host, port)
    } else {
        let (host, port) = target
            .rsplit_once(':')
            .ok_or_else(|| "TCP address must be in format 'host:port'".to_string())?;
        if host.contains(':') {
            return Err("IPv6 addresses must be written as '[addr]:port'".to_string());
        }
        (host, port)
    };

    if host.is_empty() {
        return Err("Host cannot be empty".to_string());
    }

    match port.parse::<u16>() {
        Ok(0) => Err("Port must be between 1 and 65535".to_string()),
        Ok(port) => Ok((host.to_string(), port)),
        Err(_) => Err("Invalid port number".to_string()),
    }
}

/// Validate TCP endpoint (host:port format)
pub fn validate_tcp_endpoint(target: &str) -> ValidationResult {
    if target.trim().is_empty() {
        return ValidationResult::err("Address cannot be empty");
    }

    match split_host_port(target) {
        Ok(_) => ValidationResult::ok(),
        Err(e) => ValidationResult::err(e),
    }
}

/// Extract the host part of a ping address, which may be written as a URL.
pub fn ping_host(target: &str) -> &str {
    let target = target.trim();
    let Some((_, rest)) = target.split_once("://") else {
        return target;
    };
    let authority = rest.split('/').next().unwrap_or(rest);
    if let Some(v6) = authority.strip_prefix('[') {
        return v6.split(']').next().unwrap_or(v6);
    }
    authority.split(':').next().unwrap_or(authority)
}

/// Validate ping endpoint (IP address, hostname, or URL)
pub fn validate_ping_endpoint(target: &str) -> ValidationResult {
    if target.trim().is_empty() {
        return ValidationResult::err("Address cannot be empty");
    }

    let host = ping_host(target);
    if host.is_empty() {
        return ValidationResult::err("Address must contain a host");
    }

    if host.parse::<IpAddr>().is_ok() {
        return ValidationResult::ok();
    }

    if host.contains(' ') {
        return ValidationResult::err("Address cannot contain spaces");
    }

    if host.starts_with('-') || host.ends_with('-') {
        return ValidationResult::err("Hostname cannot start or end with hyphen");
    }

    if host.chars().all(|c| c.is_alphanumeric() || c == '.' || c == '-') {
        ValidationResult::ok()
    } else {
        ValidationResult::err("Invalid hostname. Use IP address or valid hostname")
    }
}

/// Validate a target address for its probe type
pub fn validate_address(target: &str, probe_type: ProbeType) -> ValidationResult {
    match probe_type {
        ProbeType::Http => validate_http_endpoint(target),
        ProbeType::Tcp => validate_tcp_endpoint(target),
        ProbeType::Ping => validate_ping_endpoint(target),
    }
}

/// Validate target name
pub fn validate_name(name: &str) -> ValidationResult {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return ValidationResult::err("Name cannot be empty");
    }

    if trimmed.chars().count() > MAX_NAME_LEN {
        return ValidationResult::err(format!("Name too long (max {MAX_NAME_LEN} characters)"));
    }

    ValidationResult::ok()
}

/// Validate check interval
pub fn validate_interval(interval: Duration) -> ValidationResult {
    if interval < MIN_INTERVAL {
        return ValidationResult::err("Interval must be at least 1 second");
    }

    if interval > MAX_INTERVAL {
        return ValidationResult::err("Interval too long (max 24 hours)");
    }

    ValidationResult::ok()
}

/// Validate probe timeout against its interval
pub fn validate_timeout(timeout: Duration, interval: Duration) -> ValidationResult {
    if timeout < MIN_TIMEOUT {
        return ValidationResult::err("Timeout must be at least 1 second");
    }

    if timeout >= interval {
        return ValidationResult::err("Timeout must be less than interval");
    }

    ValidationResult::ok()
}
