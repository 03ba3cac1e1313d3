use anyhow::{Context, Result};
use std::fmt;

pub const ENV_FALKOR_HOST: &str = "FALKOR_HOST";
pub const ENV_FALKOR_PORT: &str = "FALKOR_PORT";
pub const ENV_MODEL: &str = "LITELLM_MODEL";
pub const ENV_API_BASE: &str = "LITELLM_API_BASE";
pub const ENV_API_KEY: &str = "LITELLM_API_KEY";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_MAX_RETRIES: &str = "LITELLM_MAX_RETRIES";
pub const ENV_GRAPH_NAME: &str = "KG_GRAPH_NAME";
pub const ENV_MAX_SOURCE_CHARS: &str = "KG_MAX_SOURCE_CHARS";
pub const ENV_CYPHER_ATTEMPTS: &str = "KG_CYPHER_ATTEMPTS";
pub const ENV_HTTP_HOST: &str = "KGSERVE_HOST";
pub const ENV_HTTP_PORT: &str = "KGSERVE_PORT";
pub const ENV_PORT: &str = "PORT";
pub const ENV_ALLOWED_ORIGINS: &str = "KGSERVE_ALLOWED_ORIGINS";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub falkor: FalkorConfig,
    pub model: ModelConfig,
    pub graph: GraphConfig,
    pub http_server: HttpServerConfig,
}

/// FalkorDB connection settings
#[derive(Debug, Clone, PartialEq)]
pub struct FalkorConfig {
    pub host: String,
    pub port: u16,
}

/// Model provider settings
#[derive(Clone, PartialEq)]
pub struct ModelConfig {
    /// LiteLLM-style identifier, e.g. `openai/gpt-4.1`
    pub name: String,
    /// Base URL of an OpenAI-compatible API (OpenAI itself or a LiteLLM proxy)
    pub api_base: String,
    pub api_key: Option<String>,
    pub max_retries: usize,
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("name", &self.name)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// Knowledge graph settings
#[derive(Debug, Clone, PartialEq)]
pub struct GraphConfig {
    /// Graph used when a request does not name one
    pub default_name: String,
    /// Source documents are truncated to this many characters before prompting
    pub max_source_chars: usize,
    /// Cypher generations tried per chat message before answering without graph context
    pub cypher_attempts: usize,
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            falkor: FalkorConfig {
                host: default_falkor_host(),
                port: default_falkor_port(),
            },
            model: ModelConfig {
                name: default_model(),
                api_base: default_api_base(),
                api_key: None,
                max_retries: default_max_retries(),
            },
            graph: GraphConfig {
                default_name: default_graph_name(),
                max_source_chars: default_max_source_chars(),
                cypher_attempts: default_cypher_attempts(),
            },
            http_server: HttpServerConfig {
                host: default_http_host(),
                port: default_http_port(),
                allowed_origins: Vec::new(),
            },
        }
    }
}

fn default_falkor_host() -> String {
    "localhost".to_string()
}

fn default_falkor_port() -> u16 {
    6379
}

fn default_model() -> String {
    "openai/gpt-4.1".to_string()
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_max_retries() -> usize {
    2
}

fn default_graph_name() -> String {
    "default".to_string()
}

fn default_max_source_chars() -> usize {
    20_000
}

fn default_cypher_attempts() -> usize {
    3
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8000
}

impl Config {
    /// Load configuration from the process environment
    ///
    /// Loads environment variables from .env file (if present) first, so a
    /// local `.env` can stand in for real deployment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration through `lookup`, falling back to defaults for
    /// variables that are unset or empty.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Config::default();

        let falkor = FalkorConfig {
            host: get(ENV_FALKOR_HOST).unwrap_or(defaults.falkor.host),
            port: parse_or(get(ENV_FALKOR_PORT), ENV_FALKOR_PORT, defaults.falkor.port)?,
        };

        let model = ModelConfig {
            name: get(ENV_MODEL).unwrap_or(defaults.model.name),
            api_base: get(ENV_API_BASE)
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or(defaults.model.api_base),
            api_key: get(ENV_API_KEY).or_else(|| get(ENV_OPENAI_API_KEY)),
            max_retries: parse_or(get(ENV_MAX_RETRIES), ENV_MAX_RETRIES, defaults.model.max_retries)?,
        };

        let graph = GraphConfig {
            default_name: get(ENV_GRAPH_NAME).unwrap_or(defaults.graph.default_name),
            max_source_chars: parse_or(
                get(ENV_MAX_SOURCE_CHARS),
                ENV_MAX_SOURCE_CHARS,
                defaults.graph.max_source_chars,
            )?,
            cypher_attempts: parse_or(
                get(ENV_CYPHER_ATTEMPTS),
                ENV_CYPHER_ATTEMPTS,
                defaults.graph.cypher_attempts,
            )?,
        };

        let http_port = match get(ENV_HTTP_PORT) {
            Some(raw) => Some((ENV_HTTP_PORT, raw)),
            None => get(ENV_PORT).map(|raw| (ENV_PORT, raw)),
        };
        let http_server = HttpServerConfig {
            host: get(ENV_HTTP_HOST).unwrap_or(defaults.http_server.host),
            port: match http_port {
                Some((key, raw)) => parse_or(Some(raw), key, defaults.http_server.port)?,
                None => defaults.http_server.port,
            },
            allowed_origins: get(ENV_ALLOWED_ORIGINS)
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|o| !o.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        };

        Ok(Self {
            falkor,
            model,
            graph,
            http_server,
        })
    }

    /// `redis://` URL of the FalkorDB instance
    pub fn falkor_url(&self) -> String {
        format!("redis://{}:{}/", self.falkor.host, self.falkor.port)
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.falkor.host, "localhost");
        assert_eq!(config.falkor.port, 6379);
        assert_eq!(config.model.name, "openai/gpt-4.1");
        assert_eq!(config.graph.default_name, "default");
        assert_eq!(config.http_server.port, 8000);
        assert!(config.model.api_key.is_none());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_all_three_core_variables() {
        let config = Config::from_lookup(lookup_from(&[
            ("FALKOR_HOST", "falkordb.internal"),
            ("FALKOR_PORT", "16379"),
            ("LITELLM_MODEL", "anthropic/claude-sonnet"),
        ]))
        .unwrap();
        assert_eq!(config.falkor.host, "falkordb.internal");
        assert_eq!(config.falkor.port, 16379);
        assert_eq!(config.model.name, "anthropic/claude-sonnet");
        assert_eq!(config.falkor_url(), "redis://falkordb.internal:16379/");
    }

    #[test]
    fn test_empty_values_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup_from(&[("FALKOR_HOST", ""), ("FALKOR_PORT", "  ")])).unwrap();
        assert_eq!(config.falkor.host, "localhost");
        assert_eq!(config.falkor.port, 6379);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[("FALKOR_PORT", "not-a-port")])).unwrap_err();
        assert!(err.to_string().contains("FALKOR_PORT"));
    }

    #[test]
    fn test_api_key_precedence() {
        let config = Config::from_lookup(lookup_from(&[
            ("LITELLM_API_KEY", "litellm-key"),
            ("OPENAI_API_KEY", "openai-key"),
        ]))
        .unwrap();
        assert_eq!(config.model.api_key.as_deref(), Some("litellm-key"));

        let config = Config::from_lookup(lookup_from(&[("OPENAI_API_KEY", "openai-key")])).unwrap();
        assert_eq!(config.model.api_key.as_deref(), Some("openai-key"));
    }

    #[test]
    fn test_api_key_redacted_in_debug() {
        let config = Config::from_lookup(lookup_from(&[("OPENAI_API_KEY", "sk-secret")])).unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("sk-secret"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_http_port_falls_back_to_platform_port() {
        let config = Config::from_lookup(lookup_from(&[("PORT", "10000")])).unwrap();
        assert_eq!(config.http_server.port, 10000);

        let config = Config::from_lookup(lookup_from(&[("PORT", "10000"), ("KGSERVE_PORT", "9000")])).unwrap();
        assert_eq!(config.http_server.port, 9000);
    }

    #[test]
    fn test_allowed_origins_and_api_base() {
        let config = Config::from_lookup(lookup_from(&[
            ("KGSERVE_ALLOWED_ORIGINS", "https://a.example, ,https://b.example"),
            ("LITELLM_API_BASE", "http://litellm:4000/v1/"),
        ]))
        .unwrap();
        assert_eq!(
            config.http_server.allowed_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert_eq!(config.model.api_base, "http://litellm:4000/v1");
    }
}
