use std::time::Duration;
use tracing::warn;

/// Where records are persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordBackend {
    Memory,
    Sled(String),      // data dir
    Http(String, u64), // peer base url, request timeout ms
}

/// Which in-process cache engine serves the cache-capable client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheBackend {
    Moka,
    Foyer,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub http_port: u16,
    pub records: RecordBackend,
    pub cache: CacheBackend,
    pub cache_capacity: u64,
    pub cache_default_ttl_ms: Option<u64>,
}

impl Config {
    const DEFAULT_HOST: &str = "0.0.0.0";
    const DEFAULT_HTTP_PORT: u16 = 8080;
    const DEFAULT_DATA_DIR: &str = "./data";
    const DEFAULT_PEER_URL: &str = "http://localhost:8080";
    const DEFAULT_PEER_TIMEOUT_MS: u64 = 5_000;
    const DEFAULT_CACHE_CAPACITY: u64 = 10_000;

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from any variable source. `from_env` is the process-env case.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("RECORDSTORE_HOST").unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let http_port = lookup("RECORDSTORE_HTTP_PORT")
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(Self::DEFAULT_HTTP_PORT);

        let records = match lookup("RECORDSTORE_BACKEND").as_deref() {
            None | Some("memory") => RecordBackend::Memory,
            Some("sled") => RecordBackend::Sled(
                lookup("RECORDSTORE_DATA_DIR")
                    .unwrap_or_else(|| Self::DEFAULT_DATA_DIR.to_string()),
            ),
            Some("http") => RecordBackend::Http(
                lookup("RECORDSTORE_PEER_URL").unwrap_or_else(|| {
                    warn!(
                        "RECORDSTORE_PEER_URL not set, using {}",
                        Self::DEFAULT_PEER_URL
                    );
                    Self::DEFAULT_PEER_URL.to_string()
                }),
                lookup("RECORDSTORE_PEER_TIMEOUT_MS")
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(Self::DEFAULT_PEER_TIMEOUT_MS),
            ),
            Some(other) => {
                warn!("Unknown RECORDSTORE_BACKEND '{}', falling back to memory", other);
                RecordBackend::Memory
            }
        };

        let cache = match lookup("RECORDSTORE_CACHE").as_deref() {
            None | Some("moka") => CacheBackend::Moka,
            Some("foyer") => CacheBackend::Foyer,
            Some(other) => {
                warn!("Unknown RECORDSTORE_CACHE '{}', falling back to moka", other);
                CacheBackend::Moka
            }
        };

        Self {
            host,
            http_port,
            records,
            cache,
            cache_capacity: lookup("RECORDSTORE_CACHE_CAPACITY")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(Self::DEFAULT_CACHE_CAPACITY),
            // 0 = no default TTL
            cache_default_ttl_ms: lookup("RECORDSTORE_CACHE_TTL_MS")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|ms| *ms > 0),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }

    pub fn cache_default_ttl(&self) -> Option<Duration> {
        self.cache_default_ttl_ms.map(Duration::from_millis)
    }
}

impl RecordBackend {
    pub fn name(&self) -> &str {
        match self {
            RecordBackend::Memory => "memory",
            RecordBackend::Sled(..) => "sled",
            RecordBackend::Http(..) => "http",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.records, RecordBackend::Memory);
        assert_eq!(config.cache, CacheBackend::Moka);
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.cache_default_ttl(), None);
    }

    #[test]
    fn test_http_backend() {
        let config = config_from(&[
            ("RECORDSTORE_BACKEND", "http"),
            ("RECORDSTORE_PEER_URL", "http://peer:9000"),
            ("RECORDSTORE_PEER_TIMEOUT_MS", "250"),
        ]);
        assert_eq!(
            config.records,
            RecordBackend::Http("http://peer:9000".to_string(), 250)
        );
    }

    #[test]
    fn test_sled_backend_and_cache_settings() {
        let config = config_from(&[
            ("RECORDSTORE_BACKEND", "sled"),
            ("RECORDSTORE_DATA_DIR", "/var/lib/records"),
            ("RECORDSTORE_CACHE", "foyer"),
            ("RECORDSTORE_CACHE_TTL_MS", "1500"),
            ("RECORDSTORE_HTTP_PORT", "not-a-port"),
        ]);
        assert_eq!(
            config.records,
            RecordBackend::Sled("/var/lib/records".to_string())
        );
        assert_eq!(config.cache, CacheBackend::Foyer);
        assert_eq!(config.cache_default_ttl(), Some(Duration::from_millis(1500)));
        assert_eq!(config.http_port, 8080);
    }

    #[test]
    fn test_zero_ttl_means_none() {
        let config = config_from(&[("RECORDSTORE_CACHE_TTL_MS", "0")]);
        assert_eq!(config.cache_default_ttl_ms, None);
    }
}
