//! Notification sender trait and in-memory implementation.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::error::{FulfillmentError, Result};

/// A message handed to the notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Trait for delivering customer notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<()>;
}

#[derive(Debug, Default)]
struct InMemoryNotifierState {
    sent: Vec<Notification>,
    attempts: usize,
    fail_on_send: bool,
}

/// In-memory notifier that keeps every delivered message.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    state: Arc<RwLock<InMemoryNotifierState>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the notifier to fail every delivery.
    pub fn set_fail_on_send(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_send = fail;
    }

    /// Returns the delivered messages, oldest first.
    pub fn sent(&self) -> Vec<Notification> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sent
            .clone()
    }

    /// Returns the number of delivery attempts, failed ones included.
    pub fn attempt_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .attempts
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn send(&self, notification: Notification) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.attempts += 1;

        if state.fail_on_send {
            return Err(FulfillmentError::Notification(format!(
                "mail relay rejected message to {}",
                notification.recipient
            )));
        }

        state.sent.push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> Notification {
        Notification {
            recipient: "ada@example.com".to_string(),
            subject: "Order confirmed".to_string(),
            body: "Thanks".to_string(),
        }
    }

    #[tokio::test]
    async fn test_send_keeps_message() {
        let notifier = InMemoryNotifier::new();

        notifier.send(message()).await.unwrap();

        assert_eq!(notifier.sent(), vec![message()]);
        assert_eq!(notifier.attempt_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_send_counts_attempt() {
        let notifier = InMemoryNotifier::new();
        notifier.set_fail_on_send(true);

        assert!(notifier.send(message()).await.is_err());
        assert!(notifier.sent().is_empty());
        assert_eq!(notifier.attempt_count(), 1);
    }
}
