use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::config::ConfigError;

/// Upstream model used when a client asks for a model the catalog does not know.
pub const DEFAULT_UPSTREAM_MODEL: &str = "deepseek_v3";
/// Client model reported when an upstream id has no reverse entry.
pub const DEFAULT_CLIENT_MODEL: &str = "deepseek-chat";

/// Built-in client -> upstream model ids.
pub const BUILTIN_MODELS: &[(&str, &str)] = &[
    ("deepseek-reasoner", "deepseek_r1"),
    ("deepseek-chat", "deepseek_v3"),
    ("o3-mini-high", "openai_o3_mini_high"),
    ("o3-mini-medium", "openai_o3_mini_medium"),
    ("o1", "openai_o1"),
    ("o1-mini", "openai_o1_mini"),
    ("o1-preview", "openai_o1_preview"),
    ("gpt-4o", "gpt_4o"),
    ("gpt-4o-mini", "gpt_4o_mini"),
    ("gpt-4-turbo", "gpt_4_turbo"),
    ("gpt-3.5-turbo", "gpt_3.5"),
    ("claude-3-opus", "claude_3_opus"),
    ("claude-3-sonnet", "claude_3_sonnet"),
    ("claude-3.5-sonnet", "claude_3_5_sonnet"),
    ("claude-3.5-haiku", "claude_3_5_haiku"),
    ("gemini-1.5-pro", "gemini_1_5_pro"),
    ("gemini-1.5-flash", "gemini_1_5_flash"),
    ("llama-3.2-90b", "llama3_2_90b"),
    ("llama-3.1-405b", "llama3_1_405b"),
    ("mistral-large-2", "mistral_large_2"),
    ("qwen-2.5-72b", "qwen2p5_72b"),
    ("qwen-2.5-coder-32b", "qwen2p5_coder_32b"),
    ("command-r-plus", "command_r_plus"),
    ("claude-3-7-sonnet", "claude_3_7_sonnet"),
    ("claude-3-7-sonnet-think", "claude_3_7_sonnet_thinking"),
];

/// Immutable bidirectional model table.
///
/// Built once at startup and shared read-only. Lookups never fail: a miss in
/// either direction resolves to the matching default. Construction rejects
/// two client ids mapping to the same upstream id, so every entry round-trips.
#[derive(Debug)]
pub struct ModelCatalog {
    forward: FxHashMap<Box<str>, Box<str>>,
    reverse: FxHashMap<Box<str>, Box<str>>,
    client_ids: Vec<Box<str>>,
}

/// Both model names a request carries through translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModel {
    pub upstream: String,
    /// Name reported back to the client, `to_client(to_upstream(requested))`.
    pub client: String,
}

impl ModelCatalog {
    /// Build the catalog from the built-in table merged with `overrides`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when two client ids map to the same
    /// upstream id.
    pub fn new(overrides: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let mut merged: BTreeMap<&str, &str> = BUILTIN_MODELS.iter().copied().collect();
        for (client, upstream) in overrides {
            merged.insert(client.as_str(), upstream.as_str());
        }
        Self::from_entries(merged)
    }

    fn from_entries<'a, I>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let entries = entries.into_iter();
        let (lower, _) = entries.size_hint();
        let mut forward: FxHashMap<Box<str>, Box<str>> =
            FxHashMap::with_capacity_and_hasher(lower, Default::default());
        let mut reverse: FxHashMap<Box<str>, Box<str>> =
            FxHashMap::with_capacity_and_hasher(lower, Default::default());
        let mut client_ids: Vec<Box<str>> = Vec::with_capacity(lower);

        for (client, upstream) in entries {
            if let Some(existing) = reverse.get(upstream) {
                if &**existing != client {
                    return Err(ConfigError::Validation(format!(
                        "models '{existing}' and '{client}' both map to upstream model '{upstream}'"
                    )));
                }
            }
            reverse.insert(upstream.into(), client.into());
            if forward.insert(client.into(), upstream.into()).is_none() {
                client_ids.push(client.into());
            }
        }
        client_ids.sort_unstable();

        Ok(Self {
            forward,
            reverse,
            client_ids,
        })
    }

    /// Client model id -> upstream model id, [`DEFAULT_UPSTREAM_MODEL`] on miss.
    #[must_use]
    pub fn to_upstream<'a>(&'a self, client_model: &str) -> &'a str {
        self.forward
            .get(client_model)
            .map_or(DEFAULT_UPSTREAM_MODEL, |upstream| &**upstream)
    }

    /// Upstream model id -> client model id, [`DEFAULT_CLIENT_MODEL`] on miss.
    #[must_use]
    pub fn to_client<'a>(&'a self, upstream_model: &str) -> &'a str {
        self.reverse
            .get(upstream_model)
            .map_or(DEFAULT_CLIENT_MODEL, |client| &**client)
    }

    #[must_use]
    pub fn resolve(&self, requested: &str) -> ResolvedModel {
        let upstream = self.to_upstream(requested);
        ResolvedModel {
            upstream: upstream.to_string(),
            client: self.to_client(upstream).to_string(),
        }
    }

    /// Client model ids, sorted.
    pub fn client_ids(&self) -> impl Iterator<Item = &str> {
        self.client_ids.iter().map(|id| &**id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.client_ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.client_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin() -> ModelCatalog {
        ModelCatalog::new(&BTreeMap::new()).unwrap()
    }

    #[test]
    fn test_builtin_table_round_trips() {
        let catalog = builtin();
        assert_eq!(catalog.len(), BUILTIN_MODELS.len());
        for (client, upstream) in BUILTIN_MODELS {
            assert_eq!(catalog.to_upstream(client), *upstream);
            assert_eq!(catalog.to_client(catalog.to_upstream(client)), *client);
        }
    }

    #[test]
    fn test_unknown_ids_fall_back() {
        let catalog = builtin();
        assert_eq!(catalog.to_upstream("gpt-5-ultra"), DEFAULT_UPSTREAM_MODEL);
        assert_eq!(catalog.to_upstream(""), DEFAULT_UPSTREAM_MODEL);
        assert_eq!(catalog.to_client("mystery_model"), DEFAULT_CLIENT_MODEL);
    }

    #[test]
    fn test_resolve_unknown_reports_default_client_model() {
        let resolved = builtin().resolve("not-a-model");
        assert_eq!(resolved.upstream, "deepseek_v3");
        assert_eq!(resolved.client, "deepseek-chat");
    }

    #[test]
    fn test_resolve_known() {
        let resolved = builtin().resolve("gpt-4o");
        assert_eq!(
            resolved,
            ResolvedModel {
                upstream: "gpt_4o".into(),
                client: "gpt-4o".into(),
            }
        );
    }

    #[test]
    fn test_override_replaces_builtin_entry() {
        let mut overrides = BTreeMap::new();
        overrides.insert("gpt-4o".to_string(), "gpt_4o_2025".to_string());
        overrides.insert("sonar".to_string(), "perplexity_sonar".to_string());
        let catalog = ModelCatalog::new(&overrides).unwrap();

        assert_eq!(catalog.to_upstream("gpt-4o"), "gpt_4o_2025");
        assert_eq!(catalog.to_client("gpt_4o_2025"), "gpt-4o");
        assert_eq!(catalog.to_client("gpt_4o"), DEFAULT_CLIENT_MODEL);
        assert_eq!(catalog.to_upstream("sonar"), "perplexity_sonar");
        assert_eq!(catalog.len(), BUILTIN_MODELS.len() + 1);
    }

    #[test]
    fn test_colliding_override_is_rejected() {
        let mut overrides = BTreeMap::new();
        overrides.insert("my-alias".to_string(), "gpt_4o_mini".to_string());
        let err = ModelCatalog::new(&overrides).unwrap_err();
        assert!(err.to_string().contains("gpt_4o_mini"), "{err}");
    }

    #[test]
    fn test_client_ids_sorted() {
        let catalog = builtin();
        let ids: Vec<&str> = catalog.client_ids().collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
        assert!(ids.contains(&"claude-3-7-sonnet-think"));
    }
}
