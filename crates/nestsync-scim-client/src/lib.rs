//! SCIM 2.0 target platform for nestsync.
//!
//! - [`client`] - HTTP client for `/Users` and `/Groups`
//! - [`auth`] - Bearer and `OAuth2` client-credentials authentication
//! - [`retry`] - Exponential backoff for reads
//! - [`target`] - [`ScimTarget`], the `TargetPlatform` implementation
//!
//! # Example
//!
//! ```no_run
//! use nestsync_core::TargetPlatform;
//! use nestsync_scim_client::{ScimAuth, ScimClient, ScimTarget};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ScimClient::new(
//!     "https://scim.example.com/v2",
//!     ScimAuth::bearer("token"),
//!     Duration::from_secs(30),
//! )?;
//! let target = ScimTarget::new(client);
//! let groups = target.list_groups().await?;
//! println!("{} groups on target", groups.len());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod retry;
pub mod target;

pub use auth::{ScimAuth, ScimCredentials};
pub use client::ScimClient;
pub use error::{ScimClientError, ScimClientResult};
pub use retry::RetryPolicy;
pub use target::{ScimTarget, DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE};
