//! Microsoft Entra ID source directory for nestsync
//!
//! Reads groups and their immediate members from Microsoft Entra ID (formerly Azure AD)
//! through the Microsoft Graph API and exposes them as a
//! [`nestsync_core::SourceDirectory`].
//!
//! # Features
//!
//! - `OAuth2` client credentials authentication with token caching
//! - Paged listing that follows `@odata.nextLink`; exceeding the page cap is an error
//! - Retries on 429 (honoring Retry-After), 5xx and connect or timeout failures, with
//!   exponential backoff and jitter
//! - Multi-cloud support (Commercial, US Government, China, custom endpoints)
//!
//! # Example
//!
//! ```no_run
//! use nestsync_core::SourceDirectory;
//! use nestsync_connector_entra::{EntraConfig, EntraCredentials, EntraDirectory};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EntraConfig::builder()
//!     .tenant_id("your-tenant-id")
//!     .build()?;
//!
//! let credentials = EntraCredentials {
//!     client_id: "your-client-id".to_string(),
//!     client_secret: "your-client-secret".to_string().into(),
//! };
//!
//! let directory = EntraDirectory::new(config, credentials)?;
//! let root = directory.resolve_group_by_name("Data Platform").await?;
//! # Ok(())
//! # }
//! ```

mod auth;
mod config;
mod directory;
mod error;
mod graph_client;
mod retry;

// Re-exports
pub use auth::TokenCache;
pub use config::{EntraCloudEnvironment, EntraConfig, EntraConfigBuilder, EntraCredentials};
pub use directory::{escape_odata_literal, EntraDirectory};
pub use error::{EntraError, EntraResult};
pub use graph_client::{GraphClient, Page};
pub use retry::RetryConfig;
