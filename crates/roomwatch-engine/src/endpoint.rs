//! Notification endpoints and the directory capability.
//!
//! Endpoints are registered out-of-band in the document store; the engine
//! only reads them. The destination is a tagged union so each destination
//! kind carries exactly the fields it needs, instead of inspecting payload
//! shapes at runtime.

use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// HTTP method for the generic JSON destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// Payload fields are sent as query parameters.
    Get,
    /// Payload fields are sent as a JSON body.
    Post,
}

/// Where and how a notification is delivered.
///
/// Serialized with the stored document's `dest`/`destDetails` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "dest", content = "destDetails", rename_all = "kebab-case")]
pub enum Destination {
    /// Discord webhook: POST with a preformatted `content` message.
    DiscordWebhook {
        /// The webhook URL.
        url: String,
    },
    /// Generic JSON endpoint: `{username, id}` via the configured method.
    Json {
        /// HTTP method to use.
        method: HttpMethod,
        /// The endpoint URL.
        url: String,
    },
}

/// An externally registered notification target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    /// Document id of the endpoint.
    pub id: String,
    /// Delivery destination.
    #[serde(flatten)]
    pub destination: Destination,
    /// Usernames this endpoint is subscribed to.
    #[serde(default)]
    pub usernames: Vec<String>,
}

impl Endpoint {
    /// Returns whether this endpoint is subscribed to the given username.
    #[must_use]
    pub fn subscribes_to(&self, username: &str) -> bool {
        self.usernames
            .iter()
            .any(|u| u.eq_ignore_ascii_case(username))
    }
}

/// Capability for looking up the endpoints subscribed to a creator.
#[async_trait]
pub trait EndpointDirectory: Send + Sync {
    /// Returns all endpoints whose subscription set contains `username`.
    ///
    /// Zero matches is a valid, non-error outcome.
    async fn endpoints_for(&self, username: &str) -> Result<Vec<Endpoint>>;
}

/// In-memory endpoint directory for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    endpoints: RwLock<Vec<Endpoint>>,
}

impl MemoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an endpoint.
    pub fn add(&self, endpoint: Endpoint) {
        if let Ok(mut endpoints) = self.endpoints.write() {
            endpoints.push(endpoint);
        }
    }
}

#[async_trait]
impl EndpointDirectory for MemoryDirectory {
    async fn endpoints_for(&self, username: &str) -> Result<Vec<Endpoint>> {
        let endpoints = self.endpoints.read().map_err(|_| Error::DirectoryFailed {
            message: "directory lock poisoned".into(),
        })?;

        Ok(endpoints
            .iter()
            .filter(|e| e.subscribes_to(username))
            .cloned()
            .collect())
    }
}
