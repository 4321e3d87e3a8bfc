use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Port used by both server and client when the file does not name one.
pub const DEFAULT_PORT: u16 = 7777;
/// Interface the server binds when `SERVER_HOST` is not set.
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
/// Host the client dials when `SERVER_IP` is not set.
pub const DEFAULT_SERVER_IP: &str = "127.0.0.1";
/// Display name used when `CLIENT_NAME` is not set.
pub const DEFAULT_CLIENT_NAME: &str = "Anonymous";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error reading config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid port {value:?} for key {key}")]
    InvalidPort { key: &'static str, value: String },
}

/// Properties file: `KEY=VALUE` lines, `#` comments and optional `[Section]`
/// headers. Keys before the first header are globals.
#[derive(Debug, Default)]
pub struct Config {
    pub globals: HashMap<String, String>,
    pub sections: HashMap<String, HashMap<String, String>>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        let mut config = Self::empty();
        let mut current_section: Option<String> = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                current_section = Some(name.trim().to_string());
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim().to_string();
            let value = value.trim().trim_matches('"').to_string();

            match &current_section {
                None => {
                    config.globals.insert(key, value);
                }
                Some(sec) => {
                    config
                        .sections
                        .entry(sec.clone())
                        .or_default()
                        .insert(key, value);
                }
            }
        }
        config
    }

    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|sec| sec.get(key))
            .map(String::as_str)
    }

    #[must_use]
    pub fn get_non_empty(&self, section: &str, key: &str) -> Option<&str> {
        self.get(section, key).filter(|s| !s.is_empty())
    }

    #[must_use]
    pub fn get_global(&self, key: &str) -> Option<&str> {
        self.globals.get(key).map(String::as_str)
    }

    /// Section value, else global value, else `default`. Empty values count as unset.
    #[must_use]
    pub fn get_non_empty_or_default<'a>(
        &'a self,
        section: &str,
        key: &str,
        default: &'a str,
    ) -> &'a str {
        self.get_non_empty(section, key)
            .or_else(|| self.get_global(key).filter(|s| !s.is_empty()))
            .unwrap_or(default)
    }

    fn port(&self, section: &str, key: &'static str) -> Result<u16, ConfigError> {
        let raw = self.get_non_empty(section, key).or_else(|| {
            self.get_global(key).filter(|s| !s.is_empty())
        });
        match raw {
            None => Ok(DEFAULT_PORT),
            Some(v) => v.parse::<u16>().map_err(|_| ConfigError::InvalidPort {
                key,
                value: v.to_string(),
            }),
        }
    }
}

/// What the server needs from its properties file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub bind_host: String,
    pub listen_port: u16,
}

impl ServerSettings {
    /// Reads `SERVER_HOST` / `SERVER_PORT` from the globals or a `[Server]` section.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            bind_host: config
                .get_non_empty_or_default("Server", "SERVER_HOST", DEFAULT_BIND_HOST)
                .to_string(),
            listen_port: config.port("Server", "SERVER_PORT")?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.listen_port)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_BIND_HOST.to_string(),
            listen_port: DEFAULT_PORT,
        }
    }
}

/// What the client needs from its properties file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub display_name: String,
    pub server_host: String,
    pub server_port: u16,
}

impl ClientSettings {
    /// Reads `CLIENT_NAME`, `SERVER_IP` and `SERVER_PORT` from the globals or a `[Client]` section.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            display_name: config
                .get_non_empty_or_default("Client", "CLIENT_NAME", DEFAULT_CLIENT_NAME)
                .to_string(),
            server_host: config
                .get_non_empty_or_default("Client", "SERVER_IP", DEFAULT_SERVER_IP)
                .to_string(),
            server_port: config.port("Client", "SERVER_PORT")?,
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            display_name: DEFAULT_CLIENT_NAME.to_string(),
            server_host: DEFAULT_SERVER_IP.to_string(),
            server_port: DEFAULT_PORT,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn parses_globals_sections_and_comments() {
        let cfg = Config::parse(
            "# relay server\nSERVER_PORT = 9000\n\n[Logging]\nserver_log_path=\"/tmp/relay\"\nnot a pair\n",
        );
        assert_eq!(cfg.get_global("SERVER_PORT"), Some("9000"));
        assert_eq!(cfg.get("Logging", "server_log_path"), Some("/tmp/relay"));
        assert_eq!(cfg.get("Logging", "not a pair"), None);
    }

    #[test]
    fn server_settings_fall_back_to_defaults() {
        let settings = ServerSettings::from_config(&Config::empty()).unwrap();
        assert_eq!(settings, ServerSettings::default());
        assert_eq!(settings.bind_addr(), "0.0.0.0:7777");
    }

    #[test]
    fn section_value_overrides_global() {
        let cfg = Config::parse("SERVER_PORT=7000\n[Server]\nSERVER_PORT=7100\n");
        assert_eq!(ServerSettings::from_config(&cfg).unwrap().listen_port, 7100);
        // The client has no [Client] override, so it sees the global.
        assert_eq!(ClientSettings::from_config(&cfg).unwrap().server_port, 7000);
    }

    #[test]
    fn client_settings_read_connect_properties() {
        let cfg = Config::parse("CLIENT_NAME=alice\nSERVER_IP=10.0.0.5\nSERVER_PORT=8123\n");
        let settings = ClientSettings::from_config(&cfg).unwrap();
        assert_eq!(settings.display_name, "alice");
        assert_eq!(settings.server_addr(), "10.0.0.5:8123");
    }

    #[test]
    fn bad_port_is_reported() {
        let cfg = Config::parse("SERVER_PORT=seventy\n");
        match ServerSettings::from_config(&cfg) {
            Err(ConfigError::InvalidPort { key, value }) => {
                assert_eq!(key, "SERVER_PORT");
                assert_eq!(value, "seventy");
            }
            other => panic!("expected InvalidPort, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Config::load("/definitely/not/here/server.properties").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
