//! Extraction service client
//!
//! Fetches a readable markdown rendition of a web page via a Jina-style
//! reader endpoint: GET <base>/<url> with an Accept: application/json
//! header returns `{code, status, data: {title, description, content,
//! markdown}}`. Any transport or HTTP failure maps to a single flat error;
//! no retries.

use serde::Deserialize;
use std::time::Duration;

use crate::settings;

const FETCH_TIMEOUT_SECS: u64 = 30;

/// Normalized page content returned to the save pipeline
#[derive(Debug, Clone)]
pub struct PageContent {
    pub title: String,
    pub description: String,
    pub markdown: String,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    #[allow(dead_code)]
    code: Option<i64>,
    data: Option<ExtractData>,
}

#[derive(Debug, Default, Deserialize)]
struct ExtractData {
    title: Option<String>,
    description: Option<String>,
    content: Option<String>,
    markdown: Option<String>,
}

/// Fetch and normalize page content for a URL.
///
/// Missing fields degrade to "Untitled" / empty strings rather than failing;
/// only the network call itself is fallible.
pub async fn fetch_content(url: &str) -> Result<PageContent, String> {
    let base = settings::get_extraction_base_url();
    let endpoint = format!("{}/{}", base.trim_end_matches('/'), url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
        .build()
        .map_err(|e| format!("Failed to fetch page content: {}", e))?;

    let mut request = client.get(&endpoint).header("Accept", "application/json");
    if let Some(key) = settings::get_extraction_api_key() {
        request = request.bearer_auth(key);
    }

    let response = request
        .send()
        .await
        .map_err(|e| format!("Failed to fetch page content: {}", e))?;

    if !response.status().is_success() {
        return Err(format!(
            "Failed to fetch page content: HTTP {}",
            response.status()
        ));
    }

    let payload: ExtractResponse = response
        .json()
        .await
        .map_err(|e| format!("Failed to fetch page content: {}", e))?;

    Ok(normalize(payload.data.unwrap_or_default()))
}

fn normalize(data: ExtractData) -> PageContent {
    let markdown = data
        .content
        .filter(|c| !c.is_empty())
        .or(data.markdown)
        .unwrap_or_default();

    PageContent {
        title: data
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Untitled".to_string()),
        description: data.description.unwrap_or_default(),
        markdown,
    }
}
