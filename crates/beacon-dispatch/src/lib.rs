mod fcm;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::info;
use uuid::Uuid;

pub use fcm::FcmClient;

/// Verdict for a single push delivery.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

impl DispatchOutcome {
    pub fn ok(message_id: String) -> Self {
        Self {
            success: true,
            message_id: Some(message_id),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
        }
    }
}

/// Aggregate verdict for a multicast delivery.
#[derive(Debug, Clone, Copy, Default)]
pub struct MulticastSummary {
    pub success_count: usize,
    pub failure_count: usize,
}

/// One push recorded by the mock, for test inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPush {
    pub device_token: String,
    pub title: String,
    pub body: String,
}

/// Push-notification dispatcher handed to the API as explicit state.
///
/// Constructed once at startup: with provider credentials it talks to FCM,
/// without them every delivery is a recorded mock success. Cloning shares the
/// same inner client/recorder.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherKind>,
}

enum DispatcherKind {
    Fcm(FcmClient),
    Mock(MockState),
}

#[derive(Default)]
struct MockState {
    sent: Mutex<Vec<RecordedPush>>,
    fail_tokens: Mutex<HashSet<String>>,
}

/// Test-side view of a mock dispatcher: inspect deliveries, force failures.
#[derive(Clone)]
pub struct MockHandle {
    inner: Arc<DispatcherKind>,
}

impl MockHandle {
    pub fn sent(&self) -> Vec<RecordedPush> {
        match self.inner.as_ref() {
            DispatcherKind::Mock(state) => state.sent.lock().unwrap().clone(),
            DispatcherKind::Fcm(_) => Vec::new(),
        }
    }

    /// Make every future delivery to `device_token` fail.
    pub fn fail_token(&self, device_token: &str) {
        if let DispatcherKind::Mock(state) = self.inner.as_ref() {
            state
                .fail_tokens
                .lock()
                .unwrap()
                .insert(device_token.to_string());
        }
    }
}

impl Dispatcher {
    /// Build a dispatcher from optional provider credentials. No server key
    /// means the mock, which accepts everything.
    pub fn from_config(server_key: Option<String>, api_url: String) -> Self {
        match server_key {
            Some(key) => Self {
                inner: Arc::new(DispatcherKind::Fcm(FcmClient::new(api_url, key))),
            },
            None => {
                info!("No push provider configured, using mock dispatcher");
                Self::mock().0
            }
        }
    }

    pub fn mock() -> (Self, MockHandle) {
        let inner = Arc::new(DispatcherKind::Mock(MockState::default()));
        (
            Self {
                inner: inner.clone(),
            },
            MockHandle { inner },
        )
    }

    /// Deliver one push. Never returns Err: provider failures become a
    /// failed outcome so the caller can record them per notification.
    pub async fn send_one(
        &self,
        device_token: &str,
        title: &str,
        body: &str,
        data: Option<serde_json::Value>,
    ) -> DispatchOutcome {
        match self.inner.as_ref() {
            DispatcherKind::Fcm(client) => client.send_one(device_token, title, body, data).await,
            DispatcherKind::Mock(state) => {
                if state.fail_tokens.lock().unwrap().contains(device_token) {
                    return DispatchOutcome::err(format!(
                        "mock delivery failure for {}",
                        device_token
                    ));
                }
                state.sent.lock().unwrap().push(RecordedPush {
                    device_token: device_token.to_string(),
                    title: title.to_string(),
                    body: body.to_string(),
                });
                DispatchOutcome::ok(format!("mock:{}", Uuid::new_v4()))
            }
        }
    }

    /// Deliver the same push to many tokens at once.
    pub async fn send_many(
        &self,
        device_tokens: &[String],
        title: &str,
        body: &str,
        data: Option<serde_json::Value>,
    ) -> MulticastSummary {
        match self.inner.as_ref() {
            DispatcherKind::Fcm(client) => {
                client.send_many(device_tokens, title, body, data).await
            }
            DispatcherKind::Mock(_) => {
                let mut summary = MulticastSummary::default();
                for token in device_tokens {
                    if self.send_one(token, title, body, None).await.success {
                        summary.success_count += 1;
                    } else {
                        summary.failure_count += 1;
                    }
                }
                summary
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_records_deliveries() {
        let (dispatcher, handle) = Dispatcher::mock();

        let outcome = dispatcher.send_one("tok-1", "Sale", "50% off", None).await;
        assert!(outcome.success);
        assert!(outcome.message_id.unwrap().starts_with("mock:"));

        let sent = handle.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].device_token, "tok-1");
        assert_eq!(sent[0].title, "Sale");
    }

    #[tokio::test]
    async fn mock_can_fail_specific_tokens() {
        let (dispatcher, handle) = Dispatcher::mock();
        handle.fail_token("bad-tok");

        let outcome = dispatcher.send_one("bad-tok", "t", "b", None).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("bad-tok"));
        assert!(handle.sent().is_empty());
    }

    #[tokio::test]
    async fn mock_multicast_counts_outcomes() {
        let (dispatcher, handle) = Dispatcher::mock();
        handle.fail_token("bad-tok");

        let tokens = vec!["a".to_string(), "bad-tok".to_string(), "b".to_string()];
        let summary = dispatcher.send_many(&tokens, "t", "b", None).await;
        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.failure_count, 1);
    }
}
