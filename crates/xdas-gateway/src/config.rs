//! Gateway configuration.
//!
//! The configuration file is JSON with `//` line and `/* */` block
//! comments, loaded through figment with a comment-stripping provider.
//! Validation and keyspace derivation run fail-fast after extraction.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use figment::{
    providers::Format,
    value::{Dict, Map},
    Error as FigmentError, Figment, Metadata, Profile, Provider,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;
use xdas_codec::MagicByte;
use xdas_findx::FindxConfig;

use crate::duration::parse_duration;
use crate::keyspace::KeyspaceKind;
use crate::{DEFAULT_ACCEL_DM_TTL, DEFAULT_DM_TTL};

/// Errors that can occur when loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Figment(Box<FigmentError>),

    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<FigmentError> for ConfigError {
    fn from(err: FigmentError) -> Self {
        Self::Figment(Box::new(err))
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Configuration {
    pub verbose: bool,
    pub no_metrics: bool,
    /// When set, every PUT body must unpack as the keyspace's message.
    pub validate_content: bool,
    pub web: WebConfig,
    pub h_client: HClientConfig,
    pub redis: RedisConfig,
    pub keyspaces: HashMap<String, KeyspaceConfig>,
    pub multipart: MultipartConfig,
    pub device_mapping: DeviceMappingConfig,
}

impl Configuration {
    /// Loads and validates a configuration file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let figment = Figment::new().merge(CommentedJson::file(path)?);
        let config: Self = figment.extract().map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from a JSON string (comments allowed).
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let figment = Figment::new().merge(CommentedJson::string(content));
        let config: Self = figment.extract().map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Fail-fast validation of everything that cannot be defaulted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.web.validate()?;
        self.redis.validate()?;
        for (name, keyspace) in &self.keyspaces {
            // Surfaces bad TTLs and format strings before serving traffic.
            keyspace.resolve(name, self.redis.encryption)?;
        }
        Ok(())
    }
}

/// Web server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct WebConfig {
    pub addr: String,
    pub read_timeout: String,
    pub write_timeout: String,
    pub idle_timeout: String,
    #[serde(rename = "TLS")]
    pub tls: TlsConfig,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_owned(),
            read_timeout: "5s".to_owned(),
            write_timeout: "10s".to_owned(),
            idle_timeout: "10s".to_owned(),
            tls: TlsConfig::default(),
        }
    }
}

impl WebConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.addr.is_empty() {
            return Err(ConfigError::Invalid("missing web addr".to_owned()));
        }
        self.addr
            .parse::<std::net::SocketAddr>()
            .map_err(|e| ConfigError::Invalid(format!("invalid web addr {:?}: {e}", self.addr)))?;
        if !self.tls.cert_file.is_empty() || !self.tls.key_file.is_empty() {
            return Err(ConfigError::Invalid(
                "server-side TLS termination is not supported; front with a terminating proxy"
                    .to_owned(),
            ));
        }
        for (label, value) in [
            ("ReadTimeout", &self.read_timeout),
            ("WriteTimeout", &self.write_timeout),
            ("IdleTimeout", &self.idle_timeout),
        ] {
            parse_duration(value)
                .map_err(|e| ConfigError::Invalid(format!("invalid {label}: {e}")))?;
        }
        Ok(())
    }

    #[must_use]
    pub fn socket_addr(&self) -> std::net::SocketAddr {
        // validate() has already run by the time this is called.
        self.addr
            .parse()
            .unwrap_or_else(|_| std::net::SocketAddr::from(([0, 0, 0, 0], 8080)))
    }
}

/// TLS material referenced from configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TlsConfig {
    pub cert_file: String,
    pub key_file: String,
    pub ca_file: String,
    pub insecure: bool,
}

/// Outbound HTTP client settings used by the FindX pools.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HClientConfig {
    #[serde(rename = "TLS")]
    pub tls: TlsConfig,
}

impl HClientConfig {
    /// Builds the shared outbound client: 5s total per request, 30s
    /// dial, generous idle pool with a 45s idle timeout.
    pub fn build_client(&self, user_agent: &str) -> Result<reqwest::Client, ConfigError> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(1000)
            .pool_idle_timeout(Duration::from_secs(45))
            .user_agent(user_agent);

        if self.tls.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if !self.tls.ca_file.is_empty() {
            let pem = std::fs::read(&self.tls.ca_file).map_err(|e| {
                ConfigError::Invalid(format!("unable to read CaFile {:?}: {e}", self.tls.ca_file))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| ConfigError::Invalid(format!("invalid CA certificate: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }
        if !self.tls.cert_file.is_empty() {
            let mut pem = std::fs::read(&self.tls.cert_file).map_err(|e| {
                ConfigError::Invalid(format!(
                    "unable to read CertFile {:?}: {e}",
                    self.tls.cert_file
                ))
            })?;
            if !self.tls.key_file.is_empty() {
                let key = std::fs::read(&self.tls.key_file).map_err(|e| {
                    ConfigError::Invalid(format!(
                        "unable to read KeyFile {:?}: {e}",
                        self.tls.key_file
                    ))
                })?;
                pem.extend_from_slice(&key);
            }
            let identity = reqwest::Identity::from_pem(&pem)
                .map_err(|e| ConfigError::Invalid(format!("invalid client identity: {e}")))?;
            builder = builder.identity(identity);
        }

        builder
            .build()
            .map_err(|e| ConfigError::Invalid(format!("unable to build HTTP client: {e}")))
    }
}

/// Redis connection and encryption-at-rest settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RedisConfig {
    pub client_config: RedisClientConfig,
    /// Hex-encoded AES-256 keys; only the first is used.
    pub encryption_key: Vec<String>,
    /// Encryption level written into every store MagicByte: 0 or 1.
    pub encryption: u8,
}

impl RedisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_config.addrs.is_empty() {
            return Err(ConfigError::Invalid("missing Redis addr".to_owned()));
        }
        if self.encryption > 1 {
            return Err(ConfigError::Invalid(format!(
                "invalid encryption level {}",
                self.encryption
            )));
        }
        if self.encryption_key.is_empty() {
            return Err(ConfigError::Invalid("missing EncryptionKey".to_owned()));
        }
        Ok(())
    }

    /// Connection URL for the first configured address.
    #[must_use]
    pub fn url(&self) -> String {
        let addr = self
            .client_config
            .addrs
            .first()
            .map(String::as_str)
            .unwrap_or_default();
        if addr.contains("://") {
            return addr.to_owned();
        }
        if self.client_config.password.is_empty() {
            format!("redis://{addr}")
        } else {
            format!("redis://:{}@{addr}", self.client_config.password)
        }
    }
}

/// Driver-level Redis client settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RedisClientConfig {
    pub addrs: Vec<String>,
    pub password: String,
    pub pool_size: usize,
    /// Delegated to the driver; the gateway never retries on its own.
    pub max_retries: u32,
}

impl Default for RedisClientConfig {
    fn default() -> Self {
        Self {
            addrs: Vec::new(),
            password: String::new(),
            pool_size: 16,
            max_retries: 0,
        }
    }
}

/// One keyspace as written in the configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct KeyspaceConfig {
    pub input: KeyspaceFormat,
    pub store: KeyspaceFormat,
    pub output: KeyspaceFormat,
    pub kind: KeyspaceKind,
    pub find_x: FindxConfig,
    #[serde(rename = "ttl")]
    pub ttl: String,
}

/// Content-type / content-encoding pair of one pipeline stage.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyspaceFormat {
    pub content_type: String,
    pub content_encoding: String,
}

/// Frame headers and TTL derived from a [`KeyspaceConfig`].
#[derive(Debug, Clone, Copy)]
pub struct ResolvedFormats {
    pub input: MagicByte,
    pub store: MagicByte,
    pub output: MagicByte,
    pub ttl: Duration,
}

impl KeyspaceConfig {
    /// Applies the derivation rules.
    ///
    /// Store fields default to the input fields and always carry the
    /// process-wide encryption level. An unknown store content-type
    /// forces the output content-type to unknown (there is no typed
    /// source to transcode from). Output fields default to the resolved
    /// store fields. The TTL must parse.
    pub fn resolve(&self, name: &str, encryption: u8) -> Result<ResolvedFormats, ConfigError> {
        let input = MagicByte::from_http(&self.input.content_encoding, &self.input.content_type, 0);

        let store_encoding = if self.store.content_encoding.is_empty() {
            &self.input.content_encoding
        } else {
            &self.store.content_encoding
        };
        let store_type = if self.store.content_type.is_empty() {
            &self.input.content_type
        } else {
            &self.store.content_type
        };
        let store = MagicByte::from_http(store_encoding, store_type, encryption);

        let output_type = if store_type.is_empty() {
            ""
        } else if self.output.content_type.is_empty() {
            store_type
        } else {
            &self.output.content_type
        };
        let output_encoding = if self.output.content_encoding.is_empty() {
            store_encoding
        } else {
            &self.output.content_encoding
        };
        let output = MagicByte::from_http(output_encoding, output_type, 0);

        let ttl = parse_duration(&self.ttl).map_err(|e| {
            ConfigError::Invalid(format!("keyspace {name}: must have a valid ttl: {e}"))
        })?;

        Ok(ResolvedFormats {
            input,
            store,
            output,
            ttl,
        })
    }
}

/// Default keyspace list for `/v2/multi/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MultipartConfig {
    pub keyspaces: Vec<String>,
}

/// Device-mapping TTL fallbacks.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeviceMappingConfig {
    #[serde(rename = "TTL")]
    pub ttl: String,
    #[serde(rename = "AccelTTL")]
    pub accel_ttl: String,
}

impl DeviceMappingConfig {
    /// Resolved `(ttl, accel_ttl)`. Invalid strings fall back to the
    /// defaults with a log line; this is not fatal.
    #[must_use]
    pub fn resolved(&self) -> (Duration, Duration) {
        let ttl = match parse_duration(&self.ttl) {
            Ok(ttl) => ttl,
            Err(_) => {
                if !self.ttl.is_empty() {
                    info!(ttl = %self.ttl, "invalid DeviceMapping TTL, using default");
                }
                DEFAULT_DM_TTL
            }
        };
        let accel_ttl = match parse_duration(&self.accel_ttl) {
            Ok(ttl) => ttl,
            Err(_) => {
                if !self.accel_ttl.is_empty() {
                    info!(ttl = %self.accel_ttl, "invalid DeviceMapping AccelTTL, using default");
                }
                DEFAULT_ACCEL_DM_TTL
            }
        };
        (ttl, accel_ttl)
    }
}

/// JSON provider that strips `//` line and `/* */` block comments before
/// parsing. Comment markers inside string literals are left alone.
pub struct CommentedJson {
    content: String,
}

impl CommentedJson {
    pub fn file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|_| ConfigError::FileNotFound(path.as_ref().display().to_string()))?;
        Ok(Self { content })
    }

    pub fn string(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

impl Provider for CommentedJson {
    fn metadata(&self) -> Metadata {
        Metadata::named("Commented JSON")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, FigmentError> {
        figment::providers::Json::string(&strip_comments(&self.content)).data()
    }
}

fn strip_comments(input: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Normal,
        InString,
        Escaped,
        LineComment,
        BlockComment,
    }

    let mut out = String::with_capacity(input.len());
    let mut state = State::Normal;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Normal => match c {
                '"' => {
                    state = State::InString;
                    out.push(c);
                }
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    state = State::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = State::BlockComment;
                }
                _ => out.push(c),
            },
            State::InString => match c {
                '\\' => {
                    state = State::Escaped;
                    out.push(c);
                }
                '"' => {
                    state = State::Normal;
                    out.push(c);
                }
                _ => out.push(c),
            },
            State::Escaped => {
                state = State::InString;
                out.push(c);
            }
            State::LineComment => {
                if c == '\n' {
                    state = State::Normal;
                    out.push(c);
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Normal;
                    out.push(' ');
                }
            }
        }
    }
    out
}
