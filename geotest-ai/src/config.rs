//! Provider credential resolution
//!
//! Keys come from the environment first and the `[providers]` TOML table
//! second. Resolution happens once at startup.

use std::collections::BTreeMap;

use geotest_common::config::{resolve_api_key, KeySource, ProviderKeys};

use crate::types::ProviderId;

/// Resolved provider credentials (raw, not yet validated)
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    keys: BTreeMap<ProviderId, (String, KeySource)>,
}

impl Credentials {
    /// Resolve every provider's key from ENV → TOML
    pub fn resolve(toml: &ProviderKeys) -> Self {
        let mut keys = BTreeMap::new();

        for id in ProviderId::VISIBILITY {
            let toml_value = match id {
                ProviderId::OpenAi => toml.openai_api_key.as_deref(),
                ProviderId::Anthropic => toml.anthropic_api_key.as_deref(),
                ProviderId::Perplexity => toml.perplexity_api_key.as_deref(),
                ProviderId::Gemini => toml.gemini_api_key.as_deref(),
            };

            match resolve_api_key(id.env_var(), toml_value) {
                Some((key, source)) => {
                    tracing::debug!(provider = %id, source = ?source, "Credential resolved");
                    keys.insert(id, (key, source));
                }
                None => tracing::debug!(provider = %id, "No credential configured"),
            }
        }

        Self { keys }
    }

    /// Add or replace a key (source recorded as TOML)
    pub fn with_key(mut self, id: ProviderId, key: impl Into<String>) -> Self {
        self.keys.insert(id, (key.into(), KeySource::Toml));
        self
    }

    pub fn get(&self, id: ProviderId) -> Option<&str> {
        self.keys.get(&id).map(|(k, _)| k.as_str())
    }

    pub fn source(&self, id: ProviderId) -> Option<KeySource> {
        self.keys.get(&id).map(|(_, s)| *s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for id in ProviderId::VISIBILITY {
            std::env::remove_var(id.env_var());
        }
    }

    #[test]
    #[serial]
    fn test_toml_keys_resolved() {
        clear_env();
        let toml = ProviderKeys {
            openai_api_key: Some("sk-from-toml".to_string()),
            gemini_api_key: Some("  ".to_string()),
            ..Default::default()
        };

        let creds = Credentials::resolve(&toml);
        assert_eq!(creds.get(ProviderId::OpenAi), Some("sk-from-toml"));
        assert_eq!(creds.source(ProviderId::OpenAi), Some(KeySource::Toml));
        assert_eq!(creds.get(ProviderId::Gemini), None);
        assert_eq!(creds.get(ProviderId::Anthropic), None);
    }

    #[test]
    #[serial]
    fn test_environment_wins() {
        clear_env();
        std::env::set_var("ANTHROPIC_API_KEY", "sk-ant-from-env");
        let toml = ProviderKeys {
            anthropic_api_key: Some("sk-ant-from-toml".to_string()),
            ..Default::default()
        };

        let creds = Credentials::resolve(&toml);
        assert_eq!(creds.get(ProviderId::Anthropic), Some("sk-ant-from-env"));
        assert_eq!(creds.source(ProviderId::Anthropic), Some(KeySource::Environment));

        clear_env();
    }
}
