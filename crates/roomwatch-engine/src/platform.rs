//! HTTP room source against the platform's v2 API.
//!
//! Endpoints used:
//!
//! - `GET /2/users/by/username/{username}` — resolve a username to a user id
//! - `GET /2/users/{id}` — resolve a user id to a username
//! - `GET /2/spaces/by/creator_ids?user_ids={id}` — current live rooms
//!
//! A missing `data` member in the spaces response means the creator has no
//! live rooms; that is an empty list, not an error.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::room::{CreatorRef, ResolvedCreator, RoomList};
use crate::source::RoomSource;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.twitter.com";

#[derive(Debug, Deserialize)]
struct UserResponse {
    data: UserData,
}

#[derive(Debug, Deserialize)]
struct UserData {
    id: String,
    username: String,
}

/// Room source backed by the platform's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpRoomSource {
    client: reqwest::Client,
    base_url: String,
    bearer_token: String,
}

impl HttpRoomSource {
    /// Creates a source for the given API base URL and bearer token.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, bearer_token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer_token: bearer_token.into(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        context: &str,
    ) -> Result<T> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .map_err(|e| Error::source_fetch(context, format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::source_fetch(
                context,
                format!("unexpected status {status}: {body}"),
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| Error::source_fetch(context, format!("invalid response body: {e}")))
    }
}

#[async_trait]
impl RoomSource for HttpRoomSource {
    async fn resolve(&self, creator: &CreatorRef) -> Result<ResolvedCreator> {
        let url = match creator {
            CreatorRef::Username(username) => {
                format!("{}/2/users/by/username/{username}", self.base_url)
            }
            CreatorRef::UserId(id) => format!("{}/2/users/{id}", self.base_url),
        };

        let user: UserResponse = self
            .get_json(&url, &creator.to_string())
            .await
            .map_err(|e| match e {
                Error::SourceFetchFailed { creator, message } => {
                    Error::resolution(creator, message)
                }
                other => other,
            })?;

        Ok(ResolvedCreator {
            username: user.data.username,
            user_id: user.data.id,
        })
    }

    async fn rooms_by_creator(&self, creator: &ResolvedCreator) -> Result<RoomList> {
        let url = format!(
            "{}/2/spaces/by/creator_ids?user_ids={}",
            self.base_url, creator.user_id
        );

        self.get_json(&url, &creator.username).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed_from_base_url() {
        let source =
            HttpRoomSource::new("https://api.example.com/", "token").expect("client");
        assert_eq!(source.base_url, "https://api.example.com");
    }

    #[test]
    fn user_response_parses() {
        let json = r#"{"data":{"id":"42","username":"alice","name":"Alice"}}"#;
        let user: UserResponse = serde_json::from_str(json).expect("parse");
        assert_eq!(user.data.id, "42");
        assert_eq!(user.data.username, "alice");
    }

    #[test]
    fn spaces_response_without_data_is_empty() {
        let json = r#"{"meta":{"result_count":0}}"#;
        let rooms: RoomList = serde_json::from_str(json).expect("parse");
        assert!(rooms.is_empty());
    }
}
