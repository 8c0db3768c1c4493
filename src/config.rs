//! Configuration types.

use std::time::Duration;

use crate::cache::MAX_TTL;
use crate::error::ConfigError;

/// Default name of the process-private rule cache.
pub const DEFAULT_CACHE_NAME: &str = "case_territory_rules";

/// Default key the active rule list is cached under.
pub const DEFAULT_RULES_KEY: &str = "active_rules";

/// Default lifetime of a cached rule list.
pub const DEFAULT_RULES_TTL: Duration = Duration::from_secs(600);

/// Router configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    /// Name of the rule cache (scopes entries per process).
    pub cache_name: String,
    /// Cache key for the serialized active rule list.
    pub rules_cache_key: String,
    /// How long a populated rule list stays cached.
    pub rules_ttl: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            rules_cache_key: DEFAULT_RULES_KEY.to_string(),
            rules_ttl: DEFAULT_RULES_TTL, // 10 minutes
        }
    }
}

impl RouterConfig {
    /// Build from `CASE_ROUTER_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let cache_name = lookup("CASE_ROUTER_CACHE_NAME")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.cache_name);

        let rules_cache_key = lookup("CASE_ROUTER_RULES_KEY")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.rules_cache_key);

        let rules_ttl = match lookup("CASE_ROUTER_RULES_TTL_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
                    key: "CASE_ROUTER_RULES_TTL_SECS".into(),
                    message: format!("{raw:?} is not a whole number of seconds: {e}"),
                })?;
                let ttl = Duration::from_secs(secs);
                if ttl > MAX_TTL {
                    return Err(ConfigError::InvalidValue {
                        key: "CASE_ROUTER_RULES_TTL_SECS".into(),
                        message: format!(
                            "{secs} exceeds the maximum of {} seconds",
                            MAX_TTL.as_secs()
                        ),
                    });
                }
                ttl
            }
            None => defaults.rules_ttl,
        };

        Ok(Self {
            cache_name,
            rules_cache_key,
            rules_ttl,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = RouterConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, RouterConfig::default());
        assert_eq!(config.rules_cache_key, "active_rules");
        assert_eq!(config.rules_ttl, Duration::from_secs(600));
    }

    #[test]
    fn overrides_from_env() {
        let config = RouterConfig::from_lookup(lookup_from(&[
            ("CASE_ROUTER_CACHE_NAME", "emea_rules"),
            ("CASE_ROUTER_RULES_KEY", " rules_v2 "),
            ("CASE_ROUTER_RULES_TTL_SECS", "30"),
        ]))
        .unwrap();
        assert_eq!(config.cache_name, "emea_rules");
        assert_eq!(config.rules_cache_key, "rules_v2");
        assert_eq!(config.rules_ttl, Duration::from_secs(30));
    }

    #[test]
    fn blank_values_fall_back() {
        let config =
            RouterConfig::from_lookup(lookup_from(&[("CASE_ROUTER_CACHE_NAME", "   ")])).unwrap();
        assert_eq!(config.cache_name, DEFAULT_CACHE_NAME);
    }

    #[test]
    fn oversized_ttl_is_rejected() {
        let max = MAX_TTL.as_secs().to_string();
        let config =
            RouterConfig::from_lookup(lookup_from(&[("CASE_ROUTER_RULES_TTL_SECS", max.as_str())]))
                .unwrap();
        assert_eq!(config.rules_ttl, MAX_TTL);

        let huge = u64::MAX.to_string();
        let err = RouterConfig::from_lookup(lookup_from(&[("CASE_ROUTER_RULES_TTL_SECS", huge.as_str())]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "CASE_ROUTER_RULES_TTL_SECS"));
    }

    #[test]
    fn invalid_ttl_is_rejected() {
        let err = RouterConfig::from_lookup(lookup_from(&[("CASE_ROUTER_RULES_TTL_SECS", "ten")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "CASE_ROUTER_RULES_TTL_SECS"));
    }
}
