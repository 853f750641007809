use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::metadata::{TmdbConfig, OMDB_API_BASE, TMDB_API_BASE, TMDB_IMAGE_BASE};
use crate::network::{NetworkConfig, NetworkConfigError};

pub const DEFAULT_BIND: &str = "0.0.0.0:8000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MARQUEE_SECRET_KEY must be set unless MARQUEE_DEBUG is enabled")]
    MissingSecretKey,
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
    #[error(transparent)]
    Network(#[from] NetworkConfigError),
}

/// Process configuration, read once at start-up and passed down explicitly.
#[derive(Clone)]
pub struct AppConfig {
    pub secret_key: Option<String>,
    pub debug: bool,
    /// Empty or containing `*` means every host is accepted.
    pub allowed_hosts: Vec<String>,
    pub tmdb_api_key: Option<String>,
    pub omdb_api_key: Option<String>,
    pub crawl_url: Option<String>,
    pub db_path: PathBuf,
    pub bind: SocketAddr,
    pub tmdb_base_url: String,
    pub omdb_base_url: String,
    pub http_timeout_seconds: u32,
    pub http_retries: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        let network = NetworkConfig::default();
        Self {
            secret_key: None,
            debug: false,
            allowed_hosts: Vec::new(),
            tmdb_api_key: None,
            omdb_api_key: None,
            crawl_url: None,
            db_path: default_db_path(),
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            tmdb_base_url: TMDB_API_BASE.to_string(),
            omdb_base_url: OMDB_API_BASE.to_string(),
            http_timeout_seconds: network.request_timeout_seconds,
            http_retries: network.max_retries,
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn mask(v: Option<&String>) -> &'static str {
            if v.is_some() {
                "<redacted>"
            } else {
                "<unset>"
            }
        }

        f.debug_struct("AppConfig")
            .field("secret_key", &mask(self.secret_key.as_ref()))
            .field("debug", &self.debug)
            .field("allowed_hosts", &self.allowed_hosts)
            .field("tmdb_api_key", &mask(self.tmdb_api_key.as_ref()))
            .field("omdb_api_key", &mask(self.omdb_api_key.as_ref()))
            .field("crawl_url", &self.crawl_url)
            .field("db_path", &self.db_path)
            .field("bind", &self.bind)
            .field("tmdb_base_url", &self.tmdb_base_url)
            .field("omdb_base_url", &self.omdb_base_url)
            .field("http_timeout_seconds", &self.http_timeout_seconds)
            .field("http_retries", &self.http_retries)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        config.secret_key = get("MARQUEE_SECRET_KEY");
        config.debug = get("MARQUEE_DEBUG").is_some_and(|v| parse_flag(&v));
        config.allowed_hosts = get("MARQUEE_ALLOWED_HOSTS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .map(str::to_ascii_lowercase)
                    .collect()
            })
            .unwrap_or_default();
        config.tmdb_api_key = get("TMDB_API_KEY");
        config.omdb_api_key = get("OMDB_API_KEY");
        // Relative listing links only resolve below a directory URL.
        config.crawl_url = get("MARQUEE_CRAWL_URL").map(|url| {
            if url.ends_with('/') {
                url
            } else {
                format!("{url}/")
            }
        });

        if let Some(path) = get("MARQUEE_DB") {
            config.db_path = PathBuf::from(path);
        }
        if let Some(bind) = get("MARQUEE_BIND") {
            config.bind = bind.parse().map_err(|_| ConfigError::InvalidValue {
                name: "MARQUEE_BIND",
                value: bind,
            })?;
        }
        if let Some(url) = get("TMDB_BASE_URL") {
            config.tmdb_base_url = url;
        }
        if let Some(url) = get("OMDB_BASE_URL") {
            config.omdb_base_url = url;
        }
        if let Some(v) = get("MARQUEE_HTTP_TIMEOUT") {
            config.http_timeout_seconds = parse_number("MARQUEE_HTTP_TIMEOUT", v)?;
        }
        if let Some(v) = get("MARQUEE_HTTP_RETRIES") {
            config.http_retries = parse_number("MARQUEE_HTTP_RETRIES", v)?;
        }

        Ok(config)
    }

    /// Checks needed before serving requests.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret_key.is_none() && !self.debug {
            return Err(ConfigError::MissingSecretKey);
        }
        self.network().validate()?;
        Ok(())
    }

    pub fn network(&self) -> NetworkConfig {
        NetworkConfig {
            request_timeout_seconds: self.http_timeout_seconds,
            max_retries: self.http_retries,
            ..Default::default()
        }
    }

    pub fn tmdb(&self) -> TmdbConfig {
        TmdbConfig {
            api_key: self.tmdb_api_key.clone(),
            base_url: self.tmdb_base_url.clone(),
            image_base_url: TMDB_IMAGE_BASE.to_string(),
        }
    }

    pub fn allows_host(&self, host: &str) -> bool {
        if self.allowed_hosts.is_empty() || self.allowed_hosts.iter().any(|h| h == "*") {
            return true;
        }
        let host = strip_port(host).to_ascii_lowercase();
        self.allowed_hosts.iter().any(|allowed| {
            // ".example.com" also matches subdomains
            allowed.strip_prefix('.').map_or(*allowed == host, |suffix| {
                host == suffix || host.ends_with(&format!(".{suffix}"))
            })
        })
    }
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("marquee")
        .join("marquee.db")
}

fn parse_flag(v: &str) -> bool {
    matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn parse_number(name: &'static str, value: String) -> Result<u32, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidValue { name, value })
}

fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        // [::1]:8000
        return rest.split(']').next().unwrap_or(rest);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from_pairs(&[]).unwrap();
        assert!(!config.debug);
        assert_eq!(config.bind.to_string(), DEFAULT_BIND);
        assert!(config.db_path.ends_with("marquee/marquee.db"));
        assert_eq!(config.tmdb_base_url, TMDB_API_BASE);
        assert!(config.allows_host("anything.example"));
    }

    #[test]
    fn test_secret_required_without_debug() {
        let config = from_pairs(&[]).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::MissingSecretKey)));

        let config = from_pairs(&[("MARQUEE_DEBUG", "true")]).unwrap();
        assert!(config.validate().is_ok());

        let config = from_pairs(&[("MARQUEE_SECRET_KEY", "s3cret")]).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_crawl_url_gets_trailing_slash() {
        let config = from_pairs(&[("MARQUEE_CRAWL_URL", "http://nas.local/movies")]).unwrap();
        assert_eq!(config.crawl_url.as_deref(), Some("http://nas.local/movies/"));

        let config = from_pairs(&[("MARQUEE_CRAWL_URL", "http://nas.local/movies/")]).unwrap();
        assert_eq!(config.crawl_url.as_deref(), Some("http://nas.local/movies/"));
    }

    #[test]
    fn test_invalid_numbers() {
        let err = from_pairs(&[("MARQUEE_HTTP_TIMEOUT", "soon")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { name: "MARQUEE_HTTP_TIMEOUT", .. }
        ));

        let config = from_pairs(&[("MARQUEE_DEBUG", "1"), ("MARQUEE_HTTP_TIMEOUT", "0")]).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Network(_))));
    }

    #[test]
    fn test_allowed_hosts() {
        let config = from_pairs(&[(
            "MARQUEE_ALLOWED_HOSTS",
            "movies.example.com, .lan ,localhost",
        )])
        .unwrap();

        assert!(config.allows_host("movies.example.com"));
        assert!(config.allows_host("MOVIES.example.com:8000"));
        assert!(config.allows_host("nas.lan"));
        assert!(config.allows_host("localhost:8000"));
        assert!(!config.allows_host("evil.example.com"));

        let config = from_pairs(&[("MARQUEE_ALLOWED_HOSTS", "*")]).unwrap();
        assert!(config.allows_host("evil.example.com"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = from_pairs(&[
            ("MARQUEE_SECRET_KEY", "hunter2"),
            ("TMDB_API_KEY", "tmdb-key-123"),
        ])
        .unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("tmdb-key-123"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_network_and_tmdb_derived() {
        let config = from_pairs(&[
            ("MARQUEE_HTTP_TIMEOUT", "4"),
            ("MARQUEE_HTTP_RETRIES", "1"),
            ("TMDB_API_KEY", "k"),
            ("TMDB_BASE_URL", "http://127.0.0.1:9999/3/"),
        ])
        .unwrap();

        let network = config.network();
        assert_eq!(network.request_timeout_seconds, 4);
        assert_eq!(network.max_retries, 1);

        let tmdb = config.tmdb();
        assert_eq!(tmdb.api_key.as_deref(), Some("k"));
        assert_eq!(tmdb.base_url, "http://127.0.0.1:9999/3/");
    }
}
