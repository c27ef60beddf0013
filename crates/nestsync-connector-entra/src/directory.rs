//! Entra ID as a nestsync source directory.

use async_trait::async_trait;
use nestsync_core::{SourceDirectory, SourceGroup, SourceMember, SyncResult};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::retry::RetryConfig;
use crate::{EntraConfig, EntraCredentials, EntraError, EntraResult, GraphClient, Page, TokenCache};

const ODATA_USER: &str = "#microsoft.graph.user";
const ODATA_GROUP: &str = "#microsoft.graph.group";

/// Escapes a value for use inside a single-quoted `OData` string literal.
#[must_use]
pub fn escape_odata_literal(value: &str) -> String {
    value.replace('\'', "''")
}

#[derive(Debug, Deserialize)]
struct GraphGroup {
    id: String,
    #[serde(rename = "displayName")]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphDirectoryObject {
    #[serde(rename = "@odata.type")]
    odata_type: Option<String>,
    id: String,
    #[serde(rename = "displayName")]
    display_name: Option<String>,
    #[serde(rename = "userPrincipalName")]
    user_principal_name: Option<String>,
}

impl GraphDirectoryObject {
    fn into_member(self) -> Option<SourceMember> {
        let display_name = self.display_name.unwrap_or_default();
        match self.odata_type.as_deref() {
            Some(ODATA_USER) => match self.user_principal_name {
                Some(upn) if !upn.is_empty() => Some(SourceMember::user(self.id, display_name, upn)),
                _ => {
                    warn!(id = %self.id, "User without userPrincipalName dropped");
                    None
                }
            },
            Some(ODATA_GROUP) => Some(SourceMember::group(self.id, display_name)),
            other => {
                debug!(id = %self.id, odata_type = ?other, "Non user/group member ignored");
                None
            }
        }
    }
}

/// Reads groups and immediate members from Microsoft Graph.
#[derive(Debug, Clone)]
pub struct EntraDirectory {
    config: EntraConfig,
    graph: Arc<GraphClient>,
}

impl EntraDirectory {
    /// Creates a directory with the default retry budget.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: EntraConfig, credentials: EntraCredentials) -> EntraResult<Self> {
        Self::with_retry_config(config, credentials, RetryConfig::default())
    }

    /// Creates a directory with an explicit retry budget.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created or `retry` is invalid.
    pub fn with_retry_config(
        config: EntraConfig,
        credentials: EntraCredentials,
        retry: RetryConfig,
    ) -> EntraResult<Self> {
        retry.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("nestsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EntraError::Config(format!("failed to create HTTP client: {e}")))?;

        let tokens = Arc::new(TokenCache::new(http.clone(), &config, credentials));
        let base_url = format!(
            "{}/{}",
            config.cloud_environment.graph_endpoint(),
            config.api_version
        );
        let graph = GraphClient::new(http, tokens, base_url, retry);

        Ok(Self {
            config,
            graph: Arc::new(graph),
        })
    }

    fn group_lookup_url(&self, name: &str) -> String {
        let filter = format!("displayName eq '{}'", escape_odata_literal(name));
        format!(
            "{}/groups?$filter={}&$select=id,displayName",
            self.graph.base_url(),
            urlencoding::encode(&filter)
        )
    }

    fn members_url(&self, group_id: &str) -> String {
        format!(
            "{}/groups/{}/members?$select=id,displayName,userPrincipalName&$top={}",
            self.graph.base_url(),
            urlencoding::encode(group_id),
            self.config.page_size
        )
    }

    /// Looks a group up by exact display name; first match wins.
    #[instrument(skip(self))]
    pub async fn find_group(&self, name: &str) -> EntraResult<Option<SourceGroup>> {
        let page: Page<GraphGroup> = self.graph.get(&self.group_lookup_url(name)).await?;
        let found = page
            .value
            .into_iter()
            .next()
            .map(|g| SourceGroup::new(g.id, g.display_name.unwrap_or_default()));

        if found.is_none() {
            debug!("No group with that display name");
        }
        Ok(found)
    }

    /// Lists the immediate members of a group across all pages.
    ///
    /// Fails rather than returning a partial list when the page limit is reached.
    #[instrument(skip(self))]
    pub async fn fetch_members(&self, group_id: &str) -> EntraResult<Vec<SourceMember>> {
        let objects: Vec<GraphDirectoryObject> = self
            .graph
            .get_all(&self.members_url(group_id), self.config.max_pages)
            .await?;
        debug!(objects = objects.len(), "Listed group members");
        Ok(objects
            .into_iter()
            .filter_map(GraphDirectoryObject::into_member)
            .collect())
    }
}

#[async_trait]
impl SourceDirectory for EntraDirectory {
    async fn resolve_group_by_name(&self, name: &str) -> SyncResult<Option<SourceGroup>> {
        Ok(self.find_group(name).await?)
    }

    async fn list_group_members(&self, group_id: &str) -> SyncResult<Vec<SourceMember>> {
        Ok(self.fetch_members(group_id).await?)
    }
}
