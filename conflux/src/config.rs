use std::collections::BTreeMap;
use std::time::Duration;

use conflux_error::ConfluxResult;
use conflux_fragment::FragmentServiceOptions;
use conflux_identity::IdentityCacheOptions;
use conflux_metrics::ConfluxMetrics;
use serde::{Deserialize, Deserializer};

fn seconds<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_secs)
}

/// Process-wide settings of the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// Idle time after which an unused identity is torn down.
    #[serde(rename = "identity_ttl_secs", deserialize_with = "seconds")]
    pub identity_ttl: Duration,
    /// Idle time after which a fragment list is evicted.
    #[serde(rename = "fragment_cache_ttl_secs", deserialize_with = "seconds")]
    pub fragment_cache_ttl: Duration,
    /// Extra attempts at listing fragments after a security negotiation failure.
    pub security_retries: u32,
    /// The external store requires strong authentication.
    pub security_enabled: bool,
    /// Tags attached to every metric.
    pub metrics_tags: BTreeMap<String, String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            identity_ttl: Duration::from_secs(15 * 60),
            fragment_cache_ttl: Duration::from_secs(10),
            security_retries: 2,
            security_enabled: false,
            metrics_tags: BTreeMap::new(),
        }
    }
}

impl GatewayConfig {
    /// Reads the configuration from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> ConfluxResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_identity_ttl(mut self, ttl: Duration) -> Self {
        self.identity_ttl = ttl;
        self
    }

    pub fn with_fragment_cache_ttl(mut self, ttl: Duration) -> Self {
        self.fragment_cache_ttl = ttl;
        self
    }

    pub fn with_security_retries(mut self, retries: u32) -> Self {
        self.security_retries = retries;
        self
    }

    pub fn with_security_enabled(mut self, enabled: bool) -> Self {
        self.security_enabled = enabled;
        self
    }

    pub fn with_metrics_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metrics_tags.insert(key.into(), value.into());
        self
    }

    pub fn identity_options(&self) -> IdentityCacheOptions {
        IdentityCacheOptions {
            ttl: self.identity_ttl,
            security_enabled: self.security_enabled,
        }
    }

    pub fn fragment_options(&self) -> FragmentServiceOptions {
        FragmentServiceOptions {
            idle_ttl: self.fragment_cache_ttl,
            security_retries: self.security_retries,
            security_enabled: self.security_enabled,
        }
    }

    pub fn metrics(&self) -> ConfluxMetrics {
        ConfluxMetrics::default_with_tags(self.metrics_tags.clone())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.identity_ttl, Duration::from_secs(900));
        assert_eq!(config.fragment_cache_ttl, Duration::from_secs(10));
        assert_eq!(config.security_retries, 2);
        assert!(!config.security_enabled);
    }

    #[test]
    fn json_overrides_some_fields() {
        let json = r#"{
            "identity_ttl_secs": 60,
            "security_enabled": true,
            "metrics_tags": {"host": "gw-1"}
        }"#;
        let config = GatewayConfig::from_json(json).unwrap();
        assert_eq!(config.identity_ttl, Duration::from_secs(60));
        assert_eq!(config.fragment_cache_ttl, Duration::from_secs(10));
        assert!(config.security_enabled);
        assert_eq!(config.metrics_tags.get("host").map(String::as_str), Some("gw-1"));
        assert!(config.fragment_options().security_enabled);
        assert_eq!(config.identity_options().ttl, Duration::from_secs(60));
    }

    #[rstest]
    #[case::empty("{}", GatewayConfig::default())]
    #[case::identity_ttl(
        r#"{"identity_ttl_secs": 30}"#,
        GatewayConfig::default().with_identity_ttl(Duration::from_secs(30))
    )]
    #[case::fragment_ttl(
        r#"{"fragment_cache_ttl_secs": 2}"#,
        GatewayConfig::default().with_fragment_cache_ttl(Duration::from_secs(2))
    )]
    #[case::retries(
        r#"{"security_retries": 0, "security_enabled": true}"#,
        GatewayConfig::default().with_security_retries(0).with_security_enabled(true)
    )]
    fn json_fields(#[case] json: &str, #[case] expected: GatewayConfig) {
        assert_eq!(GatewayConfig::from_json(json).unwrap(), expected);
    }

    #[rstest]
    #[case::unknown_field(r#"{"identity_ttl": 60}"#, "unknown field")]
    #[case::negative_ttl(r#"{"identity_ttl_secs": -1}"#, "invalid value")]
    #[case::wrong_type(r#"{"security_enabled": "yes"}"#, "invalid type")]
    fn invalid_json_is_rejected(#[case] json: &str, #[case] message: &str) {
        let err = GatewayConfig::from_json(json).unwrap_err();
        assert!(err.to_string().contains(message), "{err}");
    }

    #[test]
    fn builder() {
        let config = GatewayConfig::default()
            .with_identity_ttl(Duration::from_secs(5))
            .with_fragment_cache_ttl(Duration::from_secs(1))
            .with_security_retries(4)
            .with_security_enabled(true)
            .with_metrics_tag("service", "gateway");
        let fragments = config.fragment_options();
        assert_eq!(fragments.idle_ttl, Duration::from_secs(1));
        assert_eq!(fragments.security_retries, 4);
        assert!(config.identity_options().security_enabled);
        assert_eq!(config.metrics_tags.len(), 1);
    }
}
