//! AI content classification for saved pages
//!
//! Sends the page title and extracted text to an OpenAI-compatible chat
//! completion endpoint and asks for a category, up to three tags, and a
//! short summary. Existing category/tag names are embedded in the prompt so
//! the model reuses them instead of inventing near-duplicates.
//!
//! This module never fails: with no API key, a transport error, an API
//! error, or an unparseable reply, it degrades to fallback values and the
//! save continues.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::settings;

/// Content is truncated to this many bytes before prompting, to respect
/// model context limits.
const CONTENT_PREVIEW_BYTES: usize = 3500;

/// At most this many tags per note; the prompt also asks the model to
/// prefer zero tags over weak matches.
const MAX_TAGS: usize = 3;

const CLASSIFY_TIMEOUT_SECS: u64 = 30;

/// Result of AI analysis for a saved page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentAnalysis {
    pub category: String,
    pub tags: Vec<String>,
    pub summary: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Check if AI classification is available (API key is set)
pub fn is_available() -> bool {
    settings::has_classifier_api_key()
}

/// Classify a page into category, tags, and summary.
///
/// `categories` and `tags` are the distinct names already in use, most used
/// first; the first category doubles as the fallback.
pub async fn analyze(
    title: &str,
    markdown: &str,
    categories: &[String],
    tags: &[String],
) -> ContentAnalysis {
    let Some(api_key) = settings::get_classifier_api_key() else {
        println!("[CLASSIFY] No classifier API key set, using fallback values");
        return fallback(title, categories);
    };

    let request = ChatRequest {
        model: settings::get_classifier_model(),
        messages: vec![
            ChatMessage {
                role: "system".to_string(),
                content: build_system_prompt(categories, tags),
            },
            ChatMessage {
                role: "user".to_string(),
                content: build_user_prompt(title, markdown),
            },
        ],
        temperature: 0.3,
        max_tokens: 600,
    };

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(CLASSIFY_TIMEOUT_SECS))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[CLASSIFY] Failed to build HTTP client: {}", e);
            return fallback(title, categories);
        }
    };

    let response = match client
        .post(settings::get_classifier_base_url())
        .bearer_auth(&api_key)
        .json(&request)
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            eprintln!("[CLASSIFY] HTTP request failed: {}", e);
            return fallback(title, categories);
        }
    };

    if !response.status().is_success() {
        eprintln!("[CLASSIFY] API error {}, using fallback values", response.status());
        return fallback(title, categories);
    }

    let data: ChatResponse = match response.json().await {
        Ok(d) => d,
        Err(e) => {
            eprintln!("[CLASSIFY] Failed to parse response: {}", e);
            return fallback(title, categories);
        }
    };

    let text = data
        .choices
        .first()
        .map(|c| c.message.content.clone())
        .unwrap_or_default();

    parse_analysis(&text, title, categories)
}

fn build_system_prompt(categories: &[String], tags: &[String]) -> String {
    let category_list = if categories.is_empty() {
        "none yet".to_string()
    } else {
        categories.join(", ")
    };
    let tag_list = if tags.is_empty() {
        "none yet".to_string()
    } else {
        tags.join(", ")
    };

    format!(
        r#"You are a content analyst for a personal bookmark library. Analyze web page content and provide a category, tags, and a summary.

Existing categories (reuse the best match before inventing a new one):
{category_list}

Existing tags (reuse the best match before inventing a new one):
{tag_list}

Category rules:
- Prefer the closest existing category; only create a new one when nothing fits
- Be specific: "React development" or "Database design", not "Programming"

Tag rules (important):
- At most {MAX_TAGS} tags; fewer is better, and an empty list beats a weak match
- Only core technologies, tools, or concepts named in the content
- Concrete proper nouns, not descriptive adjectives

Summary rules:
- 120-200 characters, practical and informative
- Say what the page covers and why it is useful

Reply with pure JSON, no other text:
{{"category": "...", "tags": ["..."], "summary": "..."}}"#
    )
}

fn build_user_prompt(title: &str, markdown: &str) -> String {
    format!(
        "Analyze this web page:\n\nTitle: {}\n\nContent:\n{}\n\nReturn the JSON analysis based on the existing categories and tags:",
        title,
        truncate_at_char_boundary(markdown, CONTENT_PREVIEW_BYTES)
    )
}

/// Truncate at or before `max_bytes` on a valid UTF-8 boundary
fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Parse the model's reply. Each field falls back independently; a reply
/// that is not JSON at all yields the full fallback tuple.
fn parse_analysis(text: &str, title: &str, categories: &[String]) -> ContentAnalysis {
    let json_text = strip_code_fence(text.trim());

    match serde_json::from_str::<serde_json::Value>(&json_text) {
        Ok(json) => {
            let category = json
                .get("category")
                .and_then(|v| v.as_str())
                .filter(|c| !c.is_empty())
                .map(String::from)
                .unwrap_or_else(|| default_category(categories));

            let mut tags: Vec<String> = json
                .get("tags")
                .and_then(|v| v.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str())
                        .filter(|t| !t.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();
            tags.truncate(MAX_TAGS);

            let summary = json
                .get("summary")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .unwrap_or(title)
                .to_string();

            ContentAnalysis { category, tags, summary }
        }
        Err(_) => fallback(title, categories),
    }
}

/// Strip a surrounding markdown code fence (``` or ```json) if present
fn strip_code_fence(text: &str) -> String {
    if text.starts_with("```") {
        text.lines()
            .skip(1)
            .take_while(|l| !l.starts_with("```"))
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        text.to_string()
    }
}

/// Fallback tuple used on every failure path: first existing category or
/// "Uncategorized", no tags, the page title as summary.
fn fallback(title: &str, categories: &[String]) -> ContentAnalysis {
    ContentAnalysis {
        category: default_category(categories),
        tags: vec![],
        summary: title.to_string(),
    }
}

fn default_category(categories: &[String]) -> String {
    categories
        .first()
        .cloned()
        .unwrap_or_else(|| "Uncategorized".to_string())
}
