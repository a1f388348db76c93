//! Error types for the reconciliation domain.

/// The result type used throughout roomwatch-engine.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in reconciliation operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The room source could not resolve a creator reference.
    #[error("creator resolution failed for {creator}: {message}")]
    ResolutionFailed {
        /// The creator reference that failed to resolve.
        creator: String,
        /// Description of the failure.
        message: String,
    },

    /// Fetching the current room list failed.
    #[error("room fetch failed for {creator}: {message}")]
    SourceFetchFailed {
        /// The creator whose rooms could not be fetched.
        creator: String,
        /// Description of the failure.
        message: String,
    },

    /// Delivering a notification to an endpoint failed.
    #[error("notification delivery failed for endpoint {endpoint_id}: {message}")]
    DeliveryFailed {
        /// The endpoint that could not be reached.
        endpoint_id: String,
        /// Description of the failure.
        message: String,
    },

    /// The endpoint directory query failed.
    #[error("endpoint query failed: {message}")]
    DirectoryFailed {
        /// Description of the failure.
        message: String,
    },

    /// A storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A serialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration was provided.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An error from roomwatch-core.
    #[error("core error: {0}")]
    Core(#[from] roomwatch_core::Error),
}

impl Error {
    /// Creates a new storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a new resolution failure for the given creator reference.
    #[must_use]
    pub fn resolution(creator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ResolutionFailed {
            creator: creator.into(),
            message: message.into(),
        }
    }

    /// Creates a new source fetch failure for the given creator.
    #[must_use]
    pub fn source_fetch(creator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceFetchFailed {
            creator: creator.into(),
            message: message.into(),
        }
    }

    /// Creates a new delivery failure for the given endpoint.
    #[must_use]
    pub fn delivery(endpoint_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DeliveryFailed {
            endpoint_id: endpoint_id.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_error_display() {
        let err = Error::resolution("@alice", "user not found");
        assert!(err.to_string().contains("@alice"));
        assert!(err.to_string().contains("user not found"));
    }

    #[test]
    fn delivery_error_display() {
        let err = Error::delivery("ep-1", "connection refused");
        assert!(err.to_string().contains("ep-1"));
    }

    #[test]
    fn core_error_converts() {
        let core = roomwatch_core::Error::NotFound("state/alice".into());
        let err = Error::from(core);
        assert!(err.to_string().contains("core error"));
    }
}
