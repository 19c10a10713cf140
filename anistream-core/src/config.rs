use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub cache: CacheConfig,
    pub providers: ProvidersConfig,
    pub proxy: ProxyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
    /// Public base URL used when building `public_proxy_url` values.
    pub public_base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8080,
            public_base_url: "http://localhost:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// TTLs for the cache layers that sit between pipeline stages, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub streaming_ttl_secs: u64,
    pub resolved_url_ttl_secs: u64,
    pub delivery_code_ttl_secs: u64,
    pub listing_memo_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            streaming_ttl_secs: 20 * 60,
            resolved_url_ttl_secs: 6 * 60 * 60,
            delivery_code_ttl_secs: 24 * 60 * 60,
            listing_memo_ttl_secs: 5 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Embed URLs containing any of these substrings are dropped before
    /// extraction (decommissioned or broken hosts).
    pub deny_list: Vec<String>,
    /// Quota-limited remote-storage API endpoint.
    pub vault_api_url: String,
    /// Host substring identifying vault embed URLs. Empty disables the
    /// vault family entirely.
    pub vault_host: String,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            deny_list: Vec::new(),
            vault_api_url: String::new(),
            vault_host: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Domain suffixes the delivery proxy is allowed to fetch from.
    pub allowed_host_suffixes: Vec<String>,
    /// Hosts that reject requests carrying a known User-Agent header.
    pub user_agent_hostile_hosts: Vec<String>,
    /// host substring -> required Referer value.
    pub referer_rules: Vec<RefererRule>,
    pub upstream_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefererRule {
    pub host_contains: String,
    pub referer: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            allowed_host_suffixes: vec![
                "googlevideo.com".to_string(),
                "blogger.com".to_string(),
                "mp4upload.com".to_string(),
                "vidhidepro.com".to_string(),
                "callistanise.com".to_string(),
                "wibufile.com".to_string(),
                "berkasdrive.com".to_string(),
                "filedon.co".to_string(),
                "githubusercontent.com".to_string(),
                "github.com".to_string(),
            ],
            user_agent_hostile_hosts: vec!["googlevideo.com".to_string()],
            referer_rules: vec![
                RefererRule {
                    host_contains: "dramiyos-cdn.com".to_string(),
                    referer: "https://callistanise.com/".to_string(),
                },
                RefererRule {
                    host_contains: "callistanise.com".to_string(),
                    referer: "https://callistanise.com/".to_string(),
                },
                RefererRule {
                    host_contains: "mp4upload.com".to_string(),
                    referer: "https://www.mp4upload.com/".to_string(),
                },
            ],
            upstream_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration with the following priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults
    fn load(file_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = file_path {
            builder = builder.add_source(File::with_name(path));
        } else {
            builder = builder.add_source(File::with_name("config").required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix("ANISTREAM")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }
}
