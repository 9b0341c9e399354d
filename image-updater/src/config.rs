use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_API_URL: &str = "https://backboard.railway.app/graphql/v2";

pub const API_TOKEN_VAR: &str = "RAILWAY_API_TOKEN";
pub const REGISTRY_USER_VAR: &str = "RAILWAY_DOCKER_REGISTRY_USER";
pub const REGISTRY_PASSWORD_VAR: &str = "RAILWAY_DOCKER_REGISTRY_TOKEN";
pub const PORT_VAR: &str = "PORT";

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Platform API URL must use http or https, got {0}")]
    UnsupportedScheme(String),

    #[error("Platform timeout cannot be 0")]
    InvalidTimeout,
}

#[derive(Error, Debug, PartialEq)]
pub enum EnvError {
    #[error("RAILWAY_API_TOKEN environment variable is required")]
    MissingApiToken,

    #[error("PORT must be a port number, got {0:?}")]
    InvalidPort(String),
}

/// Image updater configuration
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Config {
    /// Listener for the update and health endpoints
    #[serde(default)]
    pub listener: Listener,
    /// Deployment platform API settings
    #[serde(default)]
    pub platform: PlatformConfig,
}

impl Config {
    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.platform.validate()?;
        Ok(())
    }

    /// Applies environment overrides on top of file-based values.
    ///
    /// `lookup` returns the value of an environment variable, if set.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), EnvError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(PORT_VAR).filter(|p| !p.is_empty()) {
            self.listener.port = port
                .parse()
                .map_err(|_| EnvError::InvalidPort(port.clone()))?;
        }
        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8080
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Deployment platform API settings
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct PlatformConfig {
    /// GraphQL endpoint of the deployment platform
    #[serde(default = "default_api_url")]
    pub api_url: Url,
    /// Overall timeout for a single API request. Unset means the transport default.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_api_url() -> Url {
    Url::parse(DEFAULT_API_URL).expect("default API URL is valid")
}

impl Default for PlatformConfig {
    fn default() -> Self {
        PlatformConfig {
            api_url: default_api_url(),
            timeout_secs: None,
        }
    }
}

impl PlatformConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.api_url.scheme() {
            "http" | "https" => {}
            other => return Err(ValidationError::UnsupportedScheme(other.to_string())),
        }
        if self.timeout_secs == Some(0) {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Secrets used to talk to the platform, read once at startup.
#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub api_token: String,
    pub registry: Option<RegistryCredentials>,
}

/// Credentials for a private container registry.
#[derive(Clone, PartialEq)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self, EnvError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, EnvError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_token = lookup(API_TOKEN_VAR)
            .filter(|token| !token.is_empty())
            .ok_or(EnvError::MissingApiToken)?;

        let username = lookup(REGISTRY_USER_VAR).filter(|v| !v.is_empty());
        let password = lookup(REGISTRY_PASSWORD_VAR).filter(|v| !v.is_empty());

        let registry = match (username, password) {
            (Some(username), Some(password)) => Some(RegistryCredentials { username, password }),
            (None, None) => None,
            _ => {
                tracing::warn!(
                    "Only one of {REGISTRY_USER_VAR} and {REGISTRY_PASSWORD_VAR} is set, \
                     registry credentials will not be sent"
                );
                None
            }
        };

        Ok(Credentials {
            api_token,
            registry,
        })
    }
}

// Keep secrets out of logs and panic messages.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_token", &"<redacted>")
            .field("registry", &self.registry)
            .finish()
    }
}

impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_parse_valid_config() {
        let yaml = r#"
listener:
    host: "127.0.0.1"
    port: 3000
platform:
    api_url: "http://localhost:4000/graphql"
    timeout_secs: 10
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.listener.host, "127.0.0.1");
        assert_eq!(config.listener.port, 3000);
        assert_eq!(config.platform.api_url.as_str(), "http://localhost:4000/graphql");
        assert_eq!(config.platform.timeout(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.listener.host, "0.0.0.0");
        assert_eq!(config.listener.port, 8080);
        assert_eq!(config.platform.api_url.as_str(), DEFAULT_API_URL);
        assert_eq!(config.platform.timeout(), None);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = Config::default();
        config.listener.port = 0;
        assert_eq!(config.validate(), Err(ValidationError::InvalidPort));

        let mut config = Config::default();
        config.platform.api_url = Url::parse("ftp://example.com/graphql").unwrap();
        assert_eq!(
            config.validate(),
            Err(ValidationError::UnsupportedScheme("ftp".into()))
        );

        let mut config = Config::default();
        config.platform.timeout_secs = Some(0);
        assert_eq!(config.validate(), Err(ValidationError::InvalidTimeout));
    }

    #[test]
    fn test_port_from_env() {
        let mut config = Config::default();
        config.apply_env(lookup_from(&[("PORT", "9090")])).unwrap();
        assert_eq!(config.listener.port, 9090);

        let mut config = Config::default();
        config.apply_env(lookup_from(&[("PORT", "")])).unwrap();
        assert_eq!(config.listener.port, 8080);

        let mut config = Config::default();
        assert_eq!(
            config.apply_env(lookup_from(&[("PORT", "http")])),
            Err(EnvError::InvalidPort("http".into()))
        );
    }

    #[test]
    fn test_missing_token() {
        assert_eq!(
            Credentials::from_lookup(lookup_from(&[])).unwrap_err(),
            EnvError::MissingApiToken
        );
        assert_eq!(
            Credentials::from_lookup(lookup_from(&[(API_TOKEN_VAR, "")])).unwrap_err(),
            EnvError::MissingApiToken
        );
    }

    #[test]
    fn test_registry_credentials_need_both_values() {
        let creds = Credentials::from_lookup(lookup_from(&[
            (API_TOKEN_VAR, "token"),
            (REGISTRY_USER_VAR, "deployer"),
            (REGISTRY_PASSWORD_VAR, "hunter2"),
        ]))
        .unwrap();
        let registry = creds.registry.expect("registry credentials");
        assert_eq!(registry.username, "deployer");
        assert_eq!(registry.password, "hunter2");

        let creds = Credentials::from_lookup(lookup_from(&[
            (API_TOKEN_VAR, "token"),
            (REGISTRY_USER_VAR, "deployer"),
        ]))
        .unwrap();
        assert!(creds.registry.is_none());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = Credentials {
            api_token: "secret-token".into(),
            registry: Some(RegistryCredentials {
                username: "deployer".into(),
                password: "hunter2".into(),
            }),
        };
        let debug = format!("{creds:?}");
        assert!(!debug.contains("secret-token"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("deployer"));
    }
}
