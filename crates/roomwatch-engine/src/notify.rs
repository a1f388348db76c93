//! Notification delivery.
//!
//! One [`Notification`] describes a started room; the notifier formats a
//! destination-specific payload and delivers it to one endpoint. Deliveries
//! are independent; the dispatcher aggregates outcomes into counts and never
//! escalates individual failures.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::endpoint::{Destination, Endpoint, HttpMethod};
use crate::error::{Error, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A started-room event to be delivered to one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Creator username.
    pub username: String,
    /// Room id.
    pub room_id: String,
    /// Public room URL.
    pub room_url: String,
}

/// Body for the discord-webhook destination.
#[derive(Debug, Serialize)]
struct DiscordPayload {
    content: String,
}

/// Body/query parameters for the json destination.
#[derive(Debug, Serialize)]
struct JsonPayload<'a> {
    username: &'a str,
    id: &'a str,
}

impl Notification {
    fn discord_payload(&self) -> DiscordPayload {
        DiscordPayload {
            content: format!(
                "@{} started a room.\r{}",
                self.username, self.room_url
            ),
        }
    }

    fn json_payload(&self) -> JsonPayload<'_> {
        JsonPayload {
            username: &self.username,
            id: &self.room_id,
        }
    }
}

/// Capability for delivering one notification to one endpoint.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers a notification.
    ///
    /// Each delivery is independent; failures are per-endpoint and the
    /// caller aggregates them into counts.
    async fn deliver(&self, endpoint: &Endpoint, notification: &Notification) -> Result<()>;
}

/// Aggregated result of a notification fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Number of deliveries that succeeded.
    pub delivered: usize,
    /// Number of deliveries that failed.
    pub failed: usize,
}

impl DispatchOutcome {
    /// Returns the total number of attempted deliveries.
    #[must_use]
    pub const fn attempted(&self) -> usize {
        self.delivered + self.failed
    }

    /// Merges another outcome into this one.
    pub fn absorb(&mut self, other: Self) {
        self.delivered += other.delivered;
        self.failed += other.failed;
    }
}

/// HTTP notifier delivering webhook payloads via reqwest.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: reqwest::Client,
}

impl HttpNotifier {
    /// Creates a notifier with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn deliver(&self, endpoint: &Endpoint, notification: &Notification) -> Result<()> {
        let request = match &endpoint.destination {
            Destination::DiscordWebhook { url } => self
                .client
                .post(url)
                .json(&notification.discord_payload()),
            Destination::Json { method, url } => match method {
                HttpMethod::Post => self.client.post(url).json(&notification.json_payload()),
                HttpMethod::Get => self.client.get(url).query(&notification.json_payload()),
            },
        };

        let response = request.send().await.map_err(|e| {
            Error::delivery(&endpoint.id, format!("request failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::delivery(
                &endpoint.id,
                format!("unexpected status {status}"),
            ));
        }

        Ok(())
    }
}

/// Recording notifier for tests.
///
/// Stores every delivery and can be told to fail specific endpoints.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    inner: Mutex<MemoryNotifierState>,
}

#[derive(Debug, Default)]
struct MemoryNotifierState {
    deliveries: Vec<(String, Notification)>,
    failing: Vec<String>,
}

impl MemoryNotifier {
    /// Creates an empty notifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes deliveries to the given endpoint id fail.
    pub fn fail_endpoint(&self, endpoint_id: &str) {
        if let Ok(mut state) = self.inner.lock() {
            state.failing.push(endpoint_id.to_string());
        }
    }

    /// Returns all recorded deliveries as `(endpoint_id, notification)`.
    #[must_use]
    pub fn deliveries(&self) -> Vec<(String, Notification)> {
        self.inner
            .lock()
            .map(|state| state.deliveries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn deliver(&self, endpoint: &Endpoint, notification: &Notification) -> Result<()> {
        let mut state = self.inner.lock().map_err(|_| Error::Configuration(
            "memory notifier lock poisoned".into(),
        ))?;

        if state.failing.iter().any(|id| id == &endpoint.id) {
            return Err(Error::delivery(&endpoint.id, "injected failure"));
        }

        state
            .deliveries
            .push((endpoint.id.clone(), notification.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification() -> Notification {
        Notification {
            username: "alice".into(),
            room_id: "1abcd".into(),
            room_url: "https://twitter.com/i/spaces/1abcd".into(),
        }
    }

    #[test]
    fn discord_payload_formats_content() {
        let payload = notification().discord_payload();
        assert!(payload.content.starts_with("@alice started a room."));
        assert!(payload.content.contains("https://twitter.com/i/spaces/1abcd"));
    }

    #[test]
    fn json_payload_carries_username_and_id() {
        let n = notification();
        let value = serde_json::to_value(n.json_payload()).expect("serialize");
        assert_eq!(value["username"], "alice");
        assert_eq!(value["id"], "1abcd");
    }

    #[test]
    fn dispatch_outcome_absorbs() {
        let mut outcome = DispatchOutcome {
            delivered: 1,
            failed: 0,
        };
        outcome.absorb(DispatchOutcome {
            delivered: 2,
            failed: 1,
        });
        assert_eq!(outcome.delivered, 3);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.attempted(), 4);
    }

    #[tokio::test]
    async fn memory_notifier_records_and_fails() {
        let notifier = MemoryNotifier::new();
        notifier.fail_endpoint("ep-bad");

        let good = Endpoint {
            id: "ep-good".into(),
            destination: Destination::DiscordWebhook {
                url: "https://discord.com/api/webhooks/1/abc".into(),
            },
            usernames: vec!["alice".into()],
        };
        let bad = Endpoint {
            id: "ep-bad".into(),
            ..good.clone()
        };

        notifier.deliver(&good, &notification()).await.expect("deliver");
        let err = notifier.deliver(&bad, &notification()).await.unwrap_err();
        assert!(matches!(err, Error::DeliveryFailed { .. }));

        let deliveries = notifier.deliveries();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].0, "ep-good");
    }
}
