//! Runtime configuration read from environment variables.

use nestsync_connector_entra::EntraCloudEnvironment;
use nestsync_core::SyncError;
use nestsync_engine::ReconcileConfig;
use secrecy::SecretString;
use std::env::VarError;
use std::str::FromStr;
use std::time::Duration;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("expected 'pretty' or 'json', got '{other}'")),
        }
    }
}

/// How the CLI authenticates against the SCIM target.
#[derive(Clone)]
pub enum ScimAuthConfig {
    Bearer {
        token: String,
    },
    OAuth2 {
        client_id: String,
        client_secret: String,
        token_endpoint: String,
    },
}

impl std::fmt::Debug for ScimAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer { .. } => f
                .debug_struct("Bearer")
                .field("token", &"[REDACTED]")
                .finish(),
            Self::OAuth2 {
                client_id,
                token_endpoint,
                ..
            } => f
                .debug_struct("OAuth2")
                .field("client_id", client_id)
                .field("client_secret", &"[REDACTED]")
                .field("token_endpoint", token_endpoint)
                .finish(),
        }
    }
}

/// Everything a reconciliation run needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// SCIM base URL, e.g. `https://scim.example.com/v2`.
    pub scim_base_url: String,
    pub scim_auth: ScimAuthConfig,
    /// Per-request HTTP timeout for the SCIM target and root-list downloads.
    pub scim_timeout: Duration,

    pub entra_tenant_id: String,
    pub entra_client_id: String,
    pub entra_client_secret: SecretString,
    pub entra_cloud: EntraCloudEnvironment,

    pub reconcile: ReconcileConfig,

    /// Default root list location for `batch`.
    pub root_list: Option<String>,
    pub log_format: LogFormat,
}

impl SyncConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    ///
    /// Tests use this to supply variables without touching the process environment.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let optional = |key: &str| {
            reader(key)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required =
            |key: &str| optional(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()));

        let scim_base_url = required("SCIM_BASE_URL")?;
        match url::Url::parse(&scim_base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(ConfigError::InvalidValue {
                    var: "SCIM_BASE_URL".into(),
                    message: format!("unsupported scheme '{}'", url.scheme()),
                })
            }
            Err(e) => {
                return Err(ConfigError::InvalidValue {
                    var: "SCIM_BASE_URL".into(),
                    message: e.to_string(),
                })
            }
        }

        let scim_auth = match optional("SCIM_TOKEN") {
            Some(token) => ScimAuthConfig::Bearer { token },
            None => match (
                optional("SCIM_CLIENT_ID"),
                optional("SCIM_CLIENT_SECRET"),
                optional("SCIM_TOKEN_ENDPOINT"),
            ) {
                (Some(client_id), Some(client_secret), Some(token_endpoint)) => {
                    ScimAuthConfig::OAuth2 {
                        client_id,
                        client_secret,
                        token_endpoint,
                    }
                }
                _ => {
                    return Err(ConfigError::MissingVar(
                        "SCIM_TOKEN (or SCIM_CLIENT_ID, SCIM_CLIENT_SECRET and SCIM_TOKEN_ENDPOINT)"
                            .into(),
                    ))
                }
            },
        };

        let scim_timeout = Duration::from_secs(parse_or(&optional, "SCIM_TIMEOUT_SECS", 30u64)?);

        let entra_tenant_id = required("ENTRA_TENANT_ID")?;
        let entra_client_id = required("ENTRA_CLIENT_ID")?;
        let entra_client_secret = SecretString::new(required("ENTRA_CLIENT_SECRET")?);
        let entra_cloud = match optional("ENTRA_CLOUD") {
            Some(value) => value
                .parse::<EntraCloudEnvironment>()
                .map_err(|e| ConfigError::InvalidValue {
                    var: "ENTRA_CLOUD".into(),
                    message: e.to_string(),
                })?,
            None => EntraCloudEnvironment::default(),
        };

        let reconcile = ReconcileConfig::default()
            .with_flatten_concurrency(parse_or(
                &optional,
                "SYNC_FLATTEN_CONCURRENCY",
                nestsync_engine::config::DEFAULT_FLATTEN_CONCURRENCY,
            )?)
            .with_root_concurrency(parse_or(
                &optional,
                "SYNC_ROOT_CONCURRENCY",
                nestsync_engine::config::DEFAULT_ROOT_CONCURRENCY,
            )?)
            .with_max_depth(parse_or(
                &optional,
                "SYNC_MAX_DEPTH",
                nestsync_engine::config::DEFAULT_MAX_DEPTH,
            )?);
        reconcile.validate().map_err(|e| match e {
            SyncError::Config(message) => ConfigError::Reconcile(message),
            other => ConfigError::Reconcile(other.to_string()),
        })?;

        let log_format = match optional("LOG_FORMAT") {
            Some(value) => value
                .parse::<LogFormat>()
                .map_err(|message| ConfigError::InvalidValue {
                    var: "LOG_FORMAT".into(),
                    message,
                })?,
            None => LogFormat::default(),
        };

        Ok(Self {
            scim_base_url,
            scim_auth,
            scim_timeout,
            entra_tenant_id,
            entra_client_id,
            entra_client_secret,
            entra_cloud,
            reconcile,
            root_list: optional("SYNC_ROOT_LIST"),
            log_format,
        })
    }
}

fn parse_or<T, R>(optional: &R, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    R: Fn(&str) -> Option<String>,
{
    match optional(key) {
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            var: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("invalid reconciliation settings: {0}")]
    Reconcile(String),
}
