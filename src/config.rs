use std::path::PathBuf;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// fsync each certificate write before acknowledging it. Counter writes
    /// are always fsynced.
    pub sync_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            sync_writes: true,
        }
    }
}

/// Process configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Creates a config from environment variables.
    ///
    /// Reads:
    /// - `TALLY_DATA_DIR`: RocksDB directory (default: ./data)
    /// - `TALLY_HOST`: bind host (default: 0.0.0.0)
    /// - `TALLY_PORT`: bind port (default: 8080)
    /// - `TALLY_SYNC_WRITES`: fsync certificate writes (default: true)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();

        let host = lookup("TALLY_HOST").unwrap_or(default.server.host);
        let port = lookup("TALLY_PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(default.server.port);

        let data_dir = lookup("TALLY_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(default.storage.data_dir);
        let sync_writes = lookup("TALLY_SYNC_WRITES")
            .map(|v| parse_bool(&v))
            .unwrap_or(default.storage.sync_writes);

        Self {
            server: ServerConfig { host, port },
            storage: StorageConfig {
                data_dir,
                sync_writes,
            },
        }
    }
}

fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
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
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup_from(&[]));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.storage.data_dir, PathBuf::from("./data"));
        assert!(config.storage.sync_writes);
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("TALLY_HOST", "127.0.0.1"),
            ("TALLY_PORT", "9090"),
            ("TALLY_DATA_DIR", "/var/lib/tally"),
            ("TALLY_SYNC_WRITES", "false"),
        ]));
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.storage.data_dir, PathBuf::from("/var/lib/tally"));
        assert!(!config.storage.sync_writes);
    }

    #[test]
    fn unparsable_port_falls_back() {
        let config = Config::from_lookup(lookup_from(&[("TALLY_PORT", "eighty")]));
        assert_eq!(config.server.port, 8080);
    }
}
