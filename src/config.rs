use crate::error::ConfigError;
use once_cell::sync::Lazy;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable consulted when no password is given elsewhere
pub const PASSWORD_ENV: &str = "BULKXFER_PASSWORD";

/// Default delay between polls, in seconds
pub const DEFAULT_POLL_SECONDS: u64 = 300;

/// Longest accepted delay between polls, one day
pub const MAX_POLL_SECONDS: u64 = 86_400;

/// Default server host
pub const DEFAULT_HOST: &str = "localhost";

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static email pattern"));

/// Transport used to reach the processing service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    Ftp,
    #[default]
    Http,
}

impl Protocol {
    /// Port used when none is configured
    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Ftp => 21,
            Protocol::Http => 80,
        }
    }
}

impl FromStr for Protocol {
    type Err = std::convert::Infallible;

    /// `ftp` (any case) selects FTP; every other value selects HTTP
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("ftp") {
            Ok(Protocol::Ftp)
        } else {
            Ok(Protocol::Http)
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Ftp => f.write_str("ftp"),
            Protocol::Http => f.write_str("http"),
        }
    }
}

/// Validated connection parameters, immutable once built
///
/// For HTTP the password doubles as the API key.
#[derive(Debug)]
pub struct ConnectionConfig {
    username: String,
    password: SecretString,
    host: String,
    port: u16,
    poll_interval: Duration,
    protocol: Protocol,
    notify_email: Option<String>,
}

impl ConnectionConfig {
    /// Builds and validates a configuration
    ///
    /// # Errors
    /// - Empty username, password or host
    /// - Port 0 or poll interval below one second
    /// - Malformed notification address
    pub fn new(
        username: impl Into<String>,
        password: SecretString,
        host: impl Into<String>,
        port: u16,
        poll_interval: Duration,
        protocol: Protocol,
        notify_email: Option<String>,
    ) -> Result<Self, ConfigError> {
        let username = username.into();
        let host = host.into();

        if username.trim().is_empty() {
            return Err(ConfigError::Missing("username"));
        }
        if password.expose_secret().is_empty() {
            return Err(ConfigError::Missing("password"));
        }
        if host.trim().is_empty() {
            return Err(ConfigError::Missing("host"));
        }
        if port == 0 {
            return Err(ConfigError::Invalid {
                field: "port",
                reason: "must be between 1 and 65535".to_string(),
            });
        }
        if poll_interval < Duration::from_secs(1) {
            return Err(ConfigError::Invalid {
                field: "poll",
                reason: "must be at least one second".to_string(),
            });
        }
        if poll_interval > Duration::from_secs(MAX_POLL_SECONDS) {
            return Err(ConfigError::Invalid {
                field: "poll",
                reason: format!("must be at most {} seconds", MAX_POLL_SECONDS),
            });
        }
        let notify_email = notify_email.filter(|email| !email.trim().is_empty());
        if let Some(email) = &notify_email {
            if !EMAIL_RE.is_match(email) {
                return Err(ConfigError::Invalid {
                    field: "notify_email",
                    reason: format!("'{}' is not an email address", email),
                });
            }
        }

        Ok(ConnectionConfig {
            username,
            password,
            host,
            port,
            poll_interval,
            protocol,
            notify_email,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn notify_email(&self) -> Option<&str> {
        self.notify_email.as_deref()
    }
}

/// Partially specified settings, from a JSON file or the command line
///
/// Every field is optional; layers are combined with [`Settings::or`] and
/// turned into a [`ConnectionConfig`] by [`Settings::resolve`].
///
/// # File Format
/// ```text
/// {"username":"acme","password":"...","host":"bulk.example.com","port":21,
///  "poll":60,"protocol":"ftp","notify_email":"ops@example.com"}
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub poll: Option<u64>,
    pub protocol: Option<String>,
    pub notify_email: Option<String>,
}

impl Settings {
    /// Fills every unset field of `self` from `fallback`
    pub fn or(self, fallback: Settings) -> Settings {
        Settings {
            username: self.username.or(fallback.username),
            password: self.password.or(fallback.password),
            host: self.host.or(fallback.host),
            port: self.port.or(fallback.port),
            poll: self.poll.or(fallback.poll),
            protocol: self.protocol.or(fallback.protocol),
            notify_email: self.notify_email.or(fallback.notify_email),
        }
    }

    /// Applies defaults and the password environment fallback, then validates
    pub fn resolve(self) -> Result<ConnectionConfig, ConfigError> {
        let protocol = self
            .protocol
            .as_deref()
            .map(|p| p.parse::<Protocol>().unwrap_or_default())
            .unwrap_or_default();

        let password = match self.password {
            Some(password) => password,
            None => std::env::var(PASSWORD_ENV)
                .map(SecretString::new)
                .map_err(|_| ConfigError::Missing("password"))?,
        };

        ConnectionConfig::new(
            self.username.ok_or(ConfigError::Missing("username"))?,
            password,
            self.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            self.port.unwrap_or_else(|| Protocol::default_port(protocol)),
            Duration::from_secs(self.poll.unwrap_or(DEFAULT_POLL_SECONDS)),
            protocol,
            self.notify_email,
        )
    }
}

/// Reads settings from a JSON file
///
/// # Errors
/// - File not found or unreadable
/// - Invalid JSON or unknown fields
///
/// # Example
/// ```text
/// // let settings = parse_config("bulkxfer.json")?;
/// ```
pub fn parse_config(filename: &str) -> Result<Settings, ConfigError> {
    let text = std::fs::read_to_string(filename).map_err(|source| ConfigError::Read {
        path: filename.to_string(),
        source,
    })?;

    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: filename.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn settings(username: &str, password: &str) -> Settings {
        Settings {
            username: Some(username.to_string()),
            password: Some(SecretString::new(password.to_string())),
            ..Settings::default()
        }
    }

    #[test]
    fn test_protocol_selection() {
        assert_eq!("ftp".parse::<Protocol>().unwrap(), Protocol::Ftp);
        assert_eq!("FTP".parse::<Protocol>().unwrap(), Protocol::Ftp);
        assert_eq!("http".parse::<Protocol>().unwrap(), Protocol::Http);
        assert_eq!("sftp".parse::<Protocol>().unwrap(), Protocol::Http);
        assert_eq!("".parse::<Protocol>().unwrap(), Protocol::Http);
    }

    #[test]
    fn test_defaults_per_protocol() {
        let config = settings("user", "secret").resolve().unwrap();
        assert_eq!(config.protocol(), Protocol::Http);
        assert_eq!(config.port(), 80);
        assert_eq!(config.host(), "localhost");
        assert_eq!(config.poll_interval(), Duration::from_secs(300));

        let mut ftp = settings("user", "secret");
        ftp.protocol = Some("ftp".to_string());
        let config = ftp.resolve().unwrap();
        assert_eq!(config.port(), 21);
    }

    #[test]
    fn test_cli_layer_wins_over_file() {
        let cli = Settings {
            host: Some("cli-host".to_string()),
            ..Settings::default()
        };
        let file = Settings {
            host: Some("file-host".to_string()),
            port: Some(2121),
            ..settings("user", "secret")
        };
        let config = cli.or(file).resolve().unwrap();
        assert_eq!(config.host(), "cli-host");
        assert_eq!(config.port(), 2121);
        assert_eq!(config.username(), "user");
    }

    #[test]
    fn test_password_from_environment() {
        temp_env::with_var(PASSWORD_ENV, Some("from-env"), || {
            let partial = Settings {
                username: Some("user".to_string()),
                ..Settings::default()
            };
            let config = partial.resolve().unwrap();
            assert_eq!(config.password(), "from-env");
        });
    }

    #[test]
    fn test_missing_password() {
        temp_env::with_var_unset(PASSWORD_ENV, || {
            let partial = Settings {
                username: Some("user".to_string()),
                ..Settings::default()
            };
            assert!(matches!(
                partial.resolve(),
                Err(ConfigError::Missing("password"))
            ));
        });
    }

    #[test]
    fn test_validation_errors() {
        let mut zero_poll = settings("user", "secret");
        zero_poll.poll = Some(0);
        assert!(zero_poll.resolve().is_err());

        let mut huge_poll = settings("user", "secret");
        huge_poll.poll = Some(u64::MAX);
        assert!(matches!(
            huge_poll.resolve(),
            Err(ConfigError::Invalid { field: "poll", .. })
        ));

        let mut day_poll = settings("user", "secret");
        day_poll.poll = Some(MAX_POLL_SECONDS);
        assert_eq!(
            day_poll.resolve().unwrap().poll_interval(),
            Duration::from_secs(MAX_POLL_SECONDS)
        );

        let mut bad_email = settings("user", "secret");
        bad_email.notify_email = Some("not-an-address".to_string());
        assert!(bad_email.resolve().is_err());

        assert!(settings(" ", "secret").resolve().is_err());
    }

    #[test]
    fn test_debug_hides_password() {
        let config = settings("user", "hunter2").resolve().unwrap();
        assert!(!format!("{:?}", config).contains("hunter2"));
    }

    #[test]
    fn test_parse_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bulkxfer.json");
        let mut file = File::create(&path).unwrap();
        file.write_all(
            br#"{"username":"acme","password":"pw","host":"bulk.example.com","port":2121,"poll":10,"protocol":"ftp","notify_email":"ops@example.com"}"#,
        )
        .unwrap();

        let config = parse_config(path.to_str().unwrap())
            .unwrap()
            .resolve()
            .unwrap();
        assert_eq!(config.username(), "acme");
        assert_eq!(config.host(), "bulk.example.com");
        assert_eq!(config.port(), 2121);
        assert_eq!(config.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.protocol(), Protocol::Ftp);
        assert_eq!(config.notify_email(), Some("ops@example.com"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"user":"acme"}"#).unwrap();

        let result = parse_config(path.to_str().unwrap());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}
