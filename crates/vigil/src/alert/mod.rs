//! Delivery of gated alerts.

pub mod email;
pub mod inapp;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::duration;
use crate::error::{DispatchError, SmtpError};
use crate::settings::{NotificationMode, Settings, SmtpConfig};
use crate::status::Status;
use crate::target::{Target, TargetId};

pub use email::EmailChannel;
pub use inapp::InAppChannel;

/// A state change that passed the notification gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub target_id: TargetId,
    pub target_name: String,
    pub address: String,
    pub is_up: bool,
    #[serde(rename = "response_time_ms", with = "duration::millis_opt")]
    pub response_time: Option<Duration>,
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

impl Alert {
    pub fn new(target: &Target, status: &Status) -> Self {
        Self {
            target_id: target.id,
            target_name: target.name.clone(),
            address: target.address.clone(),
            is_up: status.is_up,
            response_time: status.response_time,
            error: status.last_error.clone(),
            at: status.last_check.unwrap_or_else(Utc::now),
        }
    }

    pub fn subject(&self) -> String {
        if self.is_up {
            format!("[vigil] {} is back up", self.target_name)
        } else {
            format!("[vigil] {} is down", self.target_name)
        }
    }

    pub fn body(&self) -> String {
        let mut body = format!(
            "{}\n\nTarget:  {}\nAddress: {}\nTime:    {}\n",
            self.subject(),
            self.target_name,
            self.address,
            self.at.to_rfc3339(),
        );
        if let Some(rt) = self.response_time {
            body.push_str(&format!("Latency: {} ms\n", rt.as_millis()));
        }
        if let Some(error) = &self.error {
            body.push_str(&format!("Error:   {error}\n"));
        }
        body
    }
}

/// A destination for alerts.
#[async_trait::async_trait]
pub trait AlertChannel: Send + Sync {
    async fn deliver(&self, alert: &Alert, settings: &Settings) -> Result<(), DispatchError>;
}

/// Routes alerts to the channel selected by the notification mode.
#[derive(Clone)]
pub struct AlertDispatcher {
    inapp: Arc<InAppChannel>,
    email: Arc<dyn AlertChannel>,
}

impl AlertDispatcher {
    pub fn new(inapp: Arc<InAppChannel>) -> Self {
        Self { inapp, email: Arc::new(EmailChannel) }
    }

    /// Replace the channel used in email mode.
    pub fn with_email_channel(mut self, channel: Arc<dyn AlertChannel>) -> Self {
        self.email = channel;
        self
    }

    pub fn inapp(&self) -> &Arc<InAppChannel> {
        &self.inapp
    }

    pub async fn deliver(&self, alert: &Alert, settings: &Settings) -> Result<(), DispatchError> {
        match settings.notification_mode {
            NotificationMode::None => Ok(()),
            NotificationMode::InApp => self.inapp.deliver(alert, settings).await,
            NotificationMode::Email => self.email.deliver(alert, settings).await,
        }
    }

    /// Connect and authenticate against `config` without sending anything.
    pub async fn test_smtp(&self, config: &SmtpConfig) -> Result<(), SmtpError> {
        email::test_smtp(config).await
    }
}
