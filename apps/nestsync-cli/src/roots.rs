//! Root group list for batch runs.
//!
//! The list is plain text, one group name per line. It lives either on disk or behind an
//! `http(s)` URL.

use nestsync_core::casefold;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{CliError, CliResult};

/// Parses list text: lines are trimmed, blank lines and `#` comments skipped, and
/// case-insensitive duplicates dropped keeping the first spelling.
pub fn parse_roots(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| seen.insert(casefold(line)))
        .map(String::from)
        .collect()
}

fn remote_url(location: &str) -> Option<url::Url> {
    url::Url::parse(location)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}

/// Reads and parses the root list at `location`.
pub async fn load_roots(location: &str, timeout: Duration) -> CliResult<Vec<String>> {
    let read_error = |message: String| CliError::RootList {
        location: location.to_string(),
        message,
    };

    let text = match remote_url(location) {
        Some(url) => {
            debug!(%url, "Downloading root list");
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| read_error(e.to_string()))?;
            client
                .get(url)
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|e| read_error(e.to_string()))?
                .text()
                .await
                .map_err(|e| read_error(e.to_string()))?
        }
        None => tokio::fs::read_to_string(location)
            .await
            .map_err(|e| read_error(e.to_string()))?,
    };

    let roots = parse_roots(&text);
    info!(location, count = roots.len(), "Loaded root list");
    Ok(roots)
}
