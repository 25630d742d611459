//! Adapter configuration.
//!
//! [`Config`] collects everything needed to reach the rule collection:
//! endpoints, credentials, database and collection names, TLS settings and
//! request limits. It can be built programmatically, deserialized, or read
//! from environment variables.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CASBIN_ARANGO_ENDPOINTS` | `http://localhost:8529` | Comma-separated endpoint URLs |
//! | `CASBIN_ARANGO_USER` | `root` | Username |
//! | `CASBIN_ARANGO_PASSWORD` | (empty) | Password |
//! | `CASBIN_ARANGO_DATABASE` | `casbin` | Database name |
//! | `CASBIN_ARANGO_COLLECTION` | `casbin_rule` | Collection name |
//! | `CASBIN_ARANGO_CA_CERT` | | Enables TLS with this CA certificate (PEM) |
//! | `CASBIN_ARANGO_TIMEOUT_MS` | 30000 | Request timeout in milliseconds |
//! | `CASBIN_ARANGO_BATCH_SIZE` | 1000 | Documents per bulk insert when saving |
//!
//! # Example
//!
//! ```
//! use casbin_arangodb_adapter::Config;
//!
//! let config = Config::default()
//!     .with_endpoints(["http://arango-1:8529", "http://arango-2:8529"])
//!     .with_authentication("root", "secret")
//!     .with_database("authz");
//!
//! assert_eq!(config.collection_name, "casbin_rule");
//! assert!(config.validate().is_ok());
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default database name.
pub const DEFAULT_DATABASE_NAME: &str = "casbin";

/// Default collection name.
pub const DEFAULT_COLLECTION_NAME: &str = "casbin_rule";

/// Connection and storage settings for the adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Endpoint URLs; requests rotate over them round-robin.
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    /// Username for basic authentication.
    #[serde(default = "default_username")]
    pub username: String,

    /// Password for basic authentication.
    #[serde(default)]
    pub password: String,

    /// Database holding the rule collection.
    #[serde(default = "default_database_name")]
    pub database_name: String,

    /// Collection holding one document per rule.
    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// TLS settings.
    #[serde(default)]
    pub tls: TlsConfig,

    /// Request timeout in milliseconds (0 = no timeout).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Number of documents per bulk insert during a full save.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// How connections are secured.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TlsConfig {
    /// Plain connections.
    #[default]
    Disabled,
    /// TLS verified against the platform's root certificates.
    System,
    /// TLS verified against a CA certificate read from a PEM file.
    CaCertificate {
        /// Path to the PEM file.
        path: PathBuf,
    },
    /// Fully custom TLS settings.
    Custom(TlsSettings),
}

/// Custom TLS settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TlsSettings {
    /// Additional trusted root certificates (PEM).
    #[serde(default)]
    pub root_certificates_pem: Vec<String>,

    /// Client certificate chain for mutual TLS (PEM).
    #[serde(default)]
    pub client_certificate_pem: Option<String>,

    /// PKCS#8 private key for the client certificate (PEM).
    #[serde(default)]
    pub client_key_pem: Option<String>,

    /// Skip server certificate verification. Development only.
    #[serde(default)]
    pub accept_invalid_certificates: bool,

    /// Minimum accepted protocol version.
    #[serde(default)]
    pub min_version: TlsVersion,
}

/// TLS protocol versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsVersion {
    /// TLS 1.2.
    #[default]
    Tls12,
    /// TLS 1.3. Rejected by [`Config::validate`]: the platform TLS
    /// libraries behind the HTTP client cannot pin it as a minimum.
    Tls13,
}

fn default_endpoints() -> Vec<String> {
    vec!["http://localhost:8529".to_string()]
}

fn default_username() -> String {
    "root".to_string()
}

fn default_database_name() -> String {
    DEFAULT_DATABASE_NAME.to_string()
}

fn default_collection_name() -> String {
    DEFAULT_COLLECTION_NAME.to_string()
}

fn default_request_timeout_ms() -> u64 {
    30000
}

fn default_batch_size() -> usize {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            username: default_username(),
            password: String::new(),
            database_name: default_database_name(),
            collection_name: default_collection_name(),
            tls: TlsConfig::default(),
            request_timeout_ms: default_request_timeout_ms(),
            batch_size: default_batch_size(),
        }
    }
}

impl Config {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration from `CASBIN_ARANGO_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates a configuration from a variable lookup function.
    ///
    /// Unset or empty variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(endpoints) = get("CASBIN_ARANGO_ENDPOINTS") {
            config.endpoints = endpoints
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(user) = get("CASBIN_ARANGO_USER") {
            config.username = user;
        }
        if let Some(password) = lookup("CASBIN_ARANGO_PASSWORD") {
            config.password = password;
        }
        if let Some(database) = get("CASBIN_ARANGO_DATABASE") {
            config.database_name = database;
        }
        if let Some(collection) = get("CASBIN_ARANGO_COLLECTION") {
            config.collection_name = collection;
        }
        if let Some(path) = get("CASBIN_ARANGO_CA_CERT") {
            config.tls = TlsConfig::CaCertificate { path: path.into() };
        }
        if let Some(timeout) = get("CASBIN_ARANGO_TIMEOUT_MS") {
            config.request_timeout_ms = parse_var("CASBIN_ARANGO_TIMEOUT_MS", &timeout)?;
        }
        if let Some(batch_size) = get("CASBIN_ARANGO_BATCH_SIZE") {
            config.batch_size = parse_var("CASBIN_ARANGO_BATCH_SIZE", &batch_size)?;
        }

        Ok(config)
    }

    /// Sets the endpoints.
    pub fn with_endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints = endpoints.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the username and password.
    pub fn with_authentication(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Sets the database name.
    pub fn with_database(mut self, name: impl Into<String>) -> Self {
        self.database_name = name.into();
        self
    }

    /// Sets the collection name.
    pub fn with_collection(mut self, name: impl Into<String>) -> Self {
        self.collection_name = name.into();
        self
    }

    /// Enables TLS verified against the platform's root certificates.
    pub fn with_tls(mut self) -> Self {
        self.tls = TlsConfig::System;
        self
    }

    /// Enables TLS verified against the CA certificate at `path`.
    pub fn with_ca_certificate(mut self, path: impl Into<PathBuf>) -> Self {
        self.tls = TlsConfig::CaCertificate { path: path.into() };
        self
    }

    /// Enables TLS with custom settings.
    pub fn with_tls_settings(mut self, settings: TlsSettings) -> Self {
        self.tls = TlsConfig::Custom(settings);
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout_ms(mut self, timeout: u64) -> Self {
        self.request_timeout_ms = timeout;
        self
    }

    /// Sets the number of documents per bulk insert during a full save.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Checks the configuration for values the adapter cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }
        for endpoint in &self.endpoints {
            let url = url::Url::parse(endpoint).map_err(|e| ConfigError::InvalidEndpoint {
                endpoint: endpoint.clone(),
                message: e.to_string(),
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidEndpoint {
                    endpoint: endpoint.clone(),
                    message: format!("unsupported scheme '{}'", url.scheme()),
                });
            }
        }
        if self.database_name.is_empty() {
            return Err(ConfigError::EmptyName {
                field: "database name",
            });
        }
        if self.collection_name.is_empty() {
            return Err(ConfigError::EmptyName {
                field: "collection name",
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }
        if let TlsConfig::Custom(TlsSettings {
            min_version: TlsVersion::Tls13,
            ..
        }) = &self.tls
        {
            return Err(ConfigError::UnsupportedTlsVersion { version: "1.3" });
        }
        Ok(())
    }
}

impl TlsConfig {
    /// Returns true if connections use TLS.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, TlsConfig::Disabled)
    }

    /// Returns the extra trusted root certificates as PEM bytes.
    pub fn root_certificates(&self) -> Result<Vec<Vec<u8>>, ConfigError> {
        match self {
            TlsConfig::Disabled | TlsConfig::System => Ok(Vec::new()),
            TlsConfig::CaCertificate { path } => Ok(vec![read_pem(path)?]),
            TlsConfig::Custom(settings) => Ok(settings
                .root_certificates_pem
                .iter()
                .map(|pem| pem.as_bytes().to_vec())
                .collect()),
        }
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>, ConfigError> {
    std::fs::read(path).map_err(|e| ConfigError::TlsMaterial {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn parse_var<T: std::str::FromStr>(variable: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        variable: variable.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.endpoints, vec!["http://localhost:8529"]);
        assert_eq!(config.username, "root");
        assert!(config.password.is_empty());
        assert_eq!(config.database_name, "casbin");
        assert_eq!(config.collection_name, "casbin_rule");
        assert_eq!(config.tls, TlsConfig::Disabled);
        assert_eq!(config.request_timeout_ms, 30000);
        assert_eq!(config.batch_size, 1000);
    }

    #[test]
    fn test_builder_methods() {
        let config = Config::new()
            .with_endpoints(["https://a:8529", "https://b:8529"])
            .with_authentication("admin", "pw")
            .with_database("authz")
            .with_collection("rules")
            .with_tls()
            .with_batch_size(50);

        assert_eq!(config.endpoints.len(), 2);
        assert_eq!(config.username, "admin");
        assert_eq!(config.password, "pw");
        assert_eq!(config.database_name, "authz");
        assert_eq!(config.collection_name, "rules");
        assert!(config.tls.is_enabled());
        assert_eq!(config.batch_size, 50);
    }

    #[test]
    fn test_from_lookup() {
        let config = Config::from_lookup(lookup(&[
            ("CASBIN_ARANGO_ENDPOINTS", "http://a:8529, http://b:8529,"),
            ("CASBIN_ARANGO_USER", "casbin"),
            ("CASBIN_ARANGO_PASSWORD", "secret"),
            ("CASBIN_ARANGO_DATABASE", "authz"),
            ("CASBIN_ARANGO_TIMEOUT_MS", "500"),
            ("CASBIN_ARANGO_BATCH_SIZE", "10"),
        ]))
        .unwrap();

        assert_eq!(config.endpoints, vec!["http://a:8529", "http://b:8529"]);
        assert_eq!(config.username, "casbin");
        assert_eq!(config.password, "secret");
        assert_eq!(config.database_name, "authz");
        assert_eq!(config.collection_name, "casbin_rule");
        assert_eq!(config.request_timeout_ms, 500);
        assert_eq!(config.batch_size, 10);
    }

    #[test]
    fn test_from_lookup_rejects_bad_numbers() {
        let err = Config::from_lookup(lookup(&[("CASBIN_ARANGO_BATCH_SIZE", "many")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_from_lookup_ca_cert_enables_tls() {
        let config =
            Config::from_lookup(lookup(&[("CASBIN_ARANGO_CA_CERT", "/etc/ssl/arango.pem")]))
                .unwrap();
        assert_eq!(
            config.tls,
            TlsConfig::CaCertificate {
                path: PathBuf::from("/etc/ssl/arango.pem")
            }
        );
    }

    #[test]
    fn test_validate() {
        assert!(Config::default().validate().is_ok());

        let err = Config::default()
            .with_endpoints(Vec::<String>::new())
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::NoEndpoints));

        let err = Config::default()
            .with_endpoints(["localhost:8529"])
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpoint { .. }));

        let err = Config::default()
            .with_endpoints(["ftp://localhost:8529"])
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpoint { .. }));

        let err = Config::default().with_collection("").validate().unwrap_err();
        assert!(matches!(err, ConfigError::EmptyName { .. }));

        let err = Config::default().with_batch_size(0).validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBatchSize));
    }

    #[test]
    fn test_validate_rejects_tls13_minimum() {
        let tls12 = Config::default().with_tls_settings(TlsSettings::default());
        assert!(tls12.validate().is_ok());

        let err = Config::default()
            .with_tls_settings(TlsSettings {
                min_version: TlsVersion::Tls13,
                ..Default::default()
            })
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnsupportedTlsVersion { version: "1.3" }
        ));
    }

    #[test]
    fn test_config_deserialization_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"endpoints": ["https://db:8529"], "tls": {"mode": "system"}}"#,
        )
        .unwrap();
        assert_eq!(config.database_name, "casbin");
        assert_eq!(config.tls, TlsConfig::System);

        let config: Config = serde_json::from_str(
            r#"{"tls": {"mode": "custom", "accept_invalid_certificates": true}}"#,
        )
        .unwrap();
        match config.tls {
            TlsConfig::Custom(settings) => {
                assert!(settings.accept_invalid_certificates);
                assert_eq!(settings.min_version, TlsVersion::Tls12);
            }
            other => panic!("unexpected tls config: {:?}", other),
        }
    }

    #[test]
    fn test_root_certificates_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"-----BEGIN CERTIFICATE-----\n").unwrap();

        let tls = TlsConfig::CaCertificate {
            path: file.path().to_path_buf(),
        };
        let roots = tls.root_certificates().unwrap();
        assert_eq!(roots.len(), 1);
        assert!(roots[0].starts_with(b"-----BEGIN"));

        let missing = TlsConfig::CaCertificate {
            path: PathBuf::from("/nonexistent/ca.pem"),
        };
        assert!(matches!(
            missing.root_certificates(),
            Err(ConfigError::TlsMaterial { .. })
        ));
    }
}
