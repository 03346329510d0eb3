use thiserror::Error;

use crate::target::TargetId;

/// Errors surfaced by engine operations.
///
/// Probe failures are deliberately absent: a failed health check is a valid
/// [`Status`](crate::status::Status), never an error.
#[derive(Debug, Error)]
pub enum VigilError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("A target named '{0}' already exists")]
    DuplicateName(String),

    #[error("Target {0} not found")]
    NotFound(TargetId),

    #[error("Store failure: {0:#}")]
    Store(#[source] anyhow::Error),

    #[error(transparent)]
    Smtp(#[from] SmtpError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("Engine is shutting down")]
    Shutdown,
}

impl VigilError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// SMTP failures, split so a settings screen can tell bad credentials apart
/// from an unreachable server.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SmtpError {
    #[error("Invalid SMTP configuration: {0}")]
    InvalidConfig(String),

    #[error("SMTP authentication failed: {0}")]
    Auth(String),

    #[error("Could not connect to SMTP server: {0}")]
    Connection(String),

    #[error("TLS negotiation failed: {0}")]
    Tls(String),

    #[error("SMTP send failed: {0}")]
    Send(String),
}

impl SmtpError {
    /// Short machine-readable kind used by API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            SmtpError::InvalidConfig(_) => "smtp_invalid_config",
            SmtpError::Auth(_) => "smtp_auth",
            SmtpError::Connection(_) => "smtp_connection",
            SmtpError::Tls(_) => "smtp_tls",
            SmtpError::Send(_) => "smtp_send",
        }
    }
}

/// Alert delivery failures. Reported and logged, never fatal to monitoring.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("No recipient address configured for email alerts")]
    NoRecipient,

    #[error(transparent)]
    Smtp(#[from] SmtpError),

    #[error("Alert channel failure: {0}")]
    Channel(String),
}

pub type Result<T, E = VigilError> = std::result::Result<T, E>;
