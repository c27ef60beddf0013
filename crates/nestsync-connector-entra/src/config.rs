//! Connector configuration.

use secrecy::SecretString;
use std::str::FromStr;
use std::time::Duration;

use crate::{EntraError, EntraResult};

/// Default `$top` page size; Graph's maximum for directory objects.
pub const DEFAULT_PAGE_SIZE: u32 = 999;

/// Default cap on pages followed for a single listing.
pub const DEFAULT_MAX_PAGES: usize = 1000;

/// Default per-request HTTP timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Microsoft cloud the tenant lives in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EntraCloudEnvironment {
    /// Global Azure.
    #[default]
    Commercial,
    /// Azure US Government (GCC High / DoD).
    UsGovernment,
    /// Azure China, operated by 21Vianet.
    China,
    /// Explicit endpoints, e.g. a mock server.
    Custom {
        login_endpoint: String,
        graph_endpoint: String,
    },
}

impl EntraCloudEnvironment {
    /// Login (token) endpoint, without trailing slash.
    #[must_use]
    pub fn login_endpoint(&self) -> &str {
        match self {
            Self::Commercial => "https://login.microsoftonline.com",
            Self::UsGovernment => "https://login.microsoftonline.us",
            Self::China => "https://login.chinacloudapi.cn",
            Self::Custom { login_endpoint, .. } => login_endpoint.trim_end_matches('/'),
        }
    }

    /// Graph API endpoint, without trailing slash.
    #[must_use]
    pub fn graph_endpoint(&self) -> &str {
        match self {
            Self::Commercial => "https://graph.microsoft.com",
            Self::UsGovernment => "https://graph.microsoft.us",
            Self::China => "https://microsoftgraph.chinacloudapi.cn",
            Self::Custom { graph_endpoint, .. } => graph_endpoint.trim_end_matches('/'),
        }
    }
}

impl FromStr for EntraCloudEnvironment {
    type Err = EntraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "commercial" | "global" => Ok(Self::Commercial),
            "usgov" | "us_government" | "usgovernment" => Ok(Self::UsGovernment),
            "china" => Ok(Self::China),
            other => Err(EntraError::Config(format!(
                "unknown cloud environment '{other}' (expected commercial, usgov or china)"
            ))),
        }
    }
}

/// App registration credentials for the client credentials flow.
#[derive(Debug, Clone)]
pub struct EntraCredentials {
    /// Application (client) id.
    pub client_id: String,
    /// Client secret.
    pub client_secret: SecretString,
}

/// Entra connector configuration.
#[derive(Debug, Clone)]
pub struct EntraConfig {
    /// Directory (tenant) id.
    pub tenant_id: String,
    /// Cloud hosting the tenant.
    pub cloud_environment: EntraCloudEnvironment,
    /// Graph API version path segment.
    pub api_version: String,
    /// `$top` for member listings.
    pub page_size: u32,
    /// Listings needing more pages than this fail instead of returning a partial result.
    pub max_pages: usize,
    /// Per-request HTTP timeout, token requests included.
    pub timeout: Duration,
}

impl EntraConfig {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> EntraConfigBuilder {
        EntraConfigBuilder::default()
    }
}

/// Builder for [`EntraConfig`].
#[derive(Debug, Default)]
pub struct EntraConfigBuilder {
    tenant_id: Option<String>,
    cloud_environment: Option<EntraCloudEnvironment>,
    api_version: Option<String>,
    page_size: Option<u32>,
    max_pages: Option<usize>,
    timeout: Option<Duration>,
}

impl EntraConfigBuilder {
    #[must_use]
    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    #[must_use]
    pub fn cloud_environment(mut self, env: EntraCloudEnvironment) -> Self {
        self.cloud_environment = Some(env);
        self
    }

    #[must_use]
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    #[must_use]
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    #[must_use]
    pub fn max_pages(mut self, pages: usize) -> Self {
        self.max_pages = Some(pages);
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Validates and builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EntraError::Config`] when the tenant id is missing or a value is out of range.
    pub fn build(self) -> EntraResult<EntraConfig> {
        let tenant_id = self
            .tenant_id
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| EntraError::Config("tenant_id is required".into()))?;

        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=999).contains(&page_size) {
            return Err(EntraError::Config(format!(
                "page_size must be between 1 and 999, got {page_size}"
            )));
        }

        let max_pages = self.max_pages.unwrap_or(DEFAULT_MAX_PAGES);
        if max_pages == 0 {
            return Err(EntraError::Config("max_pages must be > 0".into()));
        }

        let cloud_environment = self.cloud_environment.unwrap_or_default();
        if let EntraCloudEnvironment::Custom {
            login_endpoint,
            graph_endpoint,
        } = &cloud_environment
        {
            for endpoint in [login_endpoint, graph_endpoint] {
                url::Url::parse(endpoint).map_err(|e| {
                    EntraError::Config(format!("invalid custom endpoint '{endpoint}': {e}"))
                })?;
            }
        }

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(EntraError::Config("timeout must be > 0".into()));
        }

        Ok(EntraConfig {
            tenant_id,
            cloud_environment,
            api_version: self.api_version.unwrap_or_else(|| "v1.0".to_string()),
            page_size,
            max_pages,
            timeout,
        })
    }
}
