use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;
use tracing::debug;

use super::{Alert, AlertChannel};
use crate::error::DispatchError;
use crate::settings::Settings;

/// Number of alerts kept for polling clients.
pub const RECENT_CAPACITY: usize = 50;

/// In-process alert feed: a broadcast for live subscribers plus a short
/// history for clients that poll.
pub struct InAppChannel {
    tx: broadcast::Sender<Alert>,
    recent: Mutex<VecDeque<Alert>>,
}

impl InAppChannel {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(64);
        Self { tx, recent: Mutex::new(VecDeque::with_capacity(RECENT_CAPACITY)) }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.tx.subscribe()
    }

    pub fn publish(&self, alert: Alert) {
        debug!(target_id = %alert.target_id, is_up = alert.is_up, "In-app alert published");
        {
            let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
            if recent.len() == RECENT_CAPACITY {
                recent.pop_front();
            }
            recent.push_back(alert.clone());
        }
        // No receivers is fine
        let _ = self.tx.send(alert);
    }

    /// Recent alerts, oldest first.
    pub fn recent(&self) -> Vec<Alert> {
        self.recent.lock().unwrap_or_else(PoisonError::into_inner).iter().cloned().collect()
    }
}

impl Default for InAppChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AlertChannel for InAppChannel {
    async fn deliver(&self, alert: &Alert, _settings: &Settings) -> Result<(), DispatchError> {
        self.publish(alert.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::TargetId;
    use chrono::Utc;

    fn alert(name: &str) -> Alert {
        Alert {
            target_id: TargetId::new(),
            target_name: name.into(),
            address: "10.0.0.1".into(),
            is_up: true,
            response_time: None,
            error: None,
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_subscriber_receives_alert() {
        let channel = InAppChannel::new();
        let mut rx = channel.subscribe();

        channel.publish(alert("db"));

        assert_eq!(rx.recv().await.unwrap().target_name, "db");
    }

    #[test]
    fn test_history_is_bounded() {
        let channel = InAppChannel::new();
        for i in 0..RECENT_CAPACITY + 5 {
            channel.publish(alert(&format!("t{i}")));
        }

        let recent = channel.recent();
        assert_eq!(recent.len(), RECENT_CAPACITY);
        assert_eq!(recent[0].target_name, "t5");
        assert_eq!(recent[RECENT_CAPACITY - 1].target_name, format!("t{}", RECENT_CAPACITY + 4));
    }
}
