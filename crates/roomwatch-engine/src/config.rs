//! Engine configuration and store-key assembly.

use std::time::Duration;

use roomwatch_core::DEFAULT_LOCK_TTL;

/// Default room URL template; `{id}` is replaced with the room id.
pub const DEFAULT_ROOM_URL_TEMPLATE: &str = "https://twitter.com/i/spaces/{id}";

/// Assembles namespaced store keys of the form `{prefix}_{name}_{suffix}`.
///
/// Empty affixes collapse (no dangling separators), matching the shared key
/// conventions of deployments that multiplex one store across environments.
#[derive(Debug, Clone, Default)]
pub struct KeyNamespace {
    prefix: String,
    suffix: String,
}

impl KeyNamespace {
    /// Creates a namespace with the given prefix and suffix.
    ///
    /// Surrounding whitespace is trimmed; blank affixes are dropped.
    #[must_use]
    pub fn new(prefix: &str, suffix: &str) -> Self {
        Self {
            prefix: prefix.trim().to_string(),
            suffix: suffix.trim().to_string(),
        }
    }

    /// Builds the full key for the given base name.
    #[must_use]
    pub fn key(&self, name: &str) -> String {
        let mut key = String::new();
        if !self.prefix.is_empty() {
            key.push_str(&self.prefix);
            key.push('_');
        }
        key.push_str(name);
        if !self.suffix.is_empty() {
            key.push('_');
            key.push_str(&self.suffix);
        }
        key
    }
}

/// Configuration for the reconciliation engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Namespace applied to lock and snapshot keys.
    pub namespace: KeyNamespace,
    /// Base name of the lock key.
    pub lock_key_name: String,
    /// Base name of the snapshot-state key prefix.
    pub state_key_name: String,
    /// Room URL template used in notification payloads; `{id}` is replaced
    /// with the room id.
    pub room_url_template: String,
    /// TTL for the cycle lock.
    pub lock_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            namespace: KeyNamespace::default(),
            lock_key_name: "core".to_string(),
            state_key_name: "state".to_string(),
            room_url_template: DEFAULT_ROOM_URL_TEMPLATE.to_string(),
            lock_ttl: DEFAULT_LOCK_TTL,
        }
    }
}

impl EngineConfig {
    /// Sets the key namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: KeyNamespace) -> Self {
        self.namespace = namespace;
        self
    }

    /// Sets the room URL template.
    #[must_use]
    pub fn with_room_url_template(mut self, template: impl Into<String>) -> Self {
        self.room_url_template = template.into();
        self
    }

    /// Sets the lock TTL.
    #[must_use]
    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    /// Returns the full lock key.
    #[must_use]
    pub fn lock_key(&self) -> String {
        self.namespace.key(&self.lock_key_name)
    }

    /// Returns the full key for one creator's snapshot.
    #[must_use]
    pub fn state_key(&self, snapshot_key: &str) -> String {
        format!("{}/{snapshot_key}", self.namespace.key(&self.state_key_name))
    }

    /// Builds the public room URL for a room id.
    #[must_use]
    pub fn room_url(&self, room_id: &str) -> String {
        self.room_url_template.replace("{id}", room_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_collapses_blank_affixes() {
        assert_eq!(KeyNamespace::new("", "").key("core"), "core");
        assert_eq!(KeyNamespace::new("twsn", "").key("core"), "twsn_core");
        assert_eq!(KeyNamespace::new("", "prod").key("core"), "core_prod");
        assert_eq!(KeyNamespace::new("twsn", "prod").key("core"), "twsn_core_prod");
        assert_eq!(KeyNamespace::new("  ", " ").key("core"), "core");
    }

    #[test]
    fn state_key_includes_snapshot_key() {
        let config = EngineConfig::default()
            .with_namespace(KeyNamespace::new("twsn", ""));
        assert_eq!(config.state_key("alice"), "twsn_state/alice");
        assert_eq!(config.lock_key(), "twsn_core");
    }

    #[test]
    fn room_url_substitutes_id() {
        let config = EngineConfig::default();
        assert_eq!(
            config.room_url("1abcd"),
            "https://twitter.com/i/spaces/1abcd"
        );
    }
}
