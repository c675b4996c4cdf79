//! Application settings storage
//!
//! Stores configuration like API keys and service endpoints in a JSON file
//! in the app data directory. Environment variables take precedence over
//! stored values so keys never have to touch disk.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

/// Global settings instance
static SETTINGS: RwLock<Option<Settings>> = RwLock::new(None);

/// Path to config file (set during init)
static CONFIG_PATH: RwLock<Option<PathBuf>> = RwLock::new(None);

pub const DEFAULT_EXTRACTION_BASE_URL: &str = "https://r.jina.ai";
pub const DEFAULT_CLASSIFIER_BASE_URL: &str =
    "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_CLASSIFIER_MODEL: &str = "llama-3.3-70b-versatile";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Base URL of the readability/extraction service
    #[serde(default)]
    pub extraction_base_url: Option<String>,
    #[serde(default)]
    pub extraction_api_key: Option<String>,
    /// OpenAI-compatible chat completion endpoint
    #[serde(default)]
    pub classifier_base_url: Option<String>,
    #[serde(default)]
    pub classifier_api_key: Option<String>,
    #[serde(default)]
    pub classifier_model: Option<String>,
    #[serde(default)]
    pub custom_db_path: Option<String>,
}

impl Settings {
    /// Load settings from disk or create default
    fn load(path: &PathBuf) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
                Err(_) => Settings::default(),
            }
        } else {
            Settings::default()
        }
    }

    /// Save settings to disk
    fn save(&self, path: &PathBuf) -> Result<(), String> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(path, content).map_err(|e| format!("Failed to write settings: {}", e))?;

        Ok(())
    }
}

/// Initialize settings with the app data directory
pub fn init(app_data_dir: PathBuf) {
    let config_path = app_data_dir.join("settings.json");
    let settings = Settings::load(&config_path);

    *CONFIG_PATH.write().unwrap() = Some(config_path);
    *SETTINGS.write().unwrap() = Some(settings);
}

fn read<T>(get: impl Fn(&Settings) -> Option<T>) -> Option<T> {
    let guard = SETTINGS.read().ok()?;
    let settings = guard.as_ref()?;
    get(settings)
}

fn update(apply: impl FnOnce(&mut Settings)) -> Result<(), String> {
    let mut settings_guard = SETTINGS
        .write()
        .map_err(|_| "Failed to acquire settings lock")?;

    let settings = settings_guard.get_or_insert_with(Settings::default);
    apply(settings);

    let config_path = CONFIG_PATH
        .read()
        .map_err(|_| "Failed to acquire config path lock")?
        .clone()
        .ok_or("Settings not initialized")?;

    settings.save(&config_path)
}

fn non_empty(key: String) -> Option<String> {
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

// ==================== Extraction service ====================

pub fn get_extraction_base_url() -> String {
    read(|s| s.extraction_base_url.clone())
        .unwrap_or_else(|| DEFAULT_EXTRACTION_BASE_URL.to_string())
}

pub fn set_extraction_base_url(url: Option<String>) -> Result<(), String> {
    update(|s| s.extraction_base_url = url.and_then(non_empty))
}

/// Get the extraction API key (checks env var first, then stored setting)
pub fn get_extraction_api_key() -> Option<String> {
    if let Ok(key) = std::env::var("JINA_API_KEY") {
        if !key.is_empty() {
            return Some(key);
        }
    }
    read(|s| s.extraction_api_key.clone())
}

pub fn set_extraction_api_key(key: String) -> Result<(), String> {
    update(|s| s.extraction_api_key = non_empty(key))?;
    println!("Extraction API key saved to settings");
    Ok(())
}

/// Get masked extraction API key for display (shows first/last 4 chars)
pub fn get_masked_extraction_api_key() -> Option<String> {
    get_extraction_api_key().map(mask_key)
}

// ==================== Classifier service ====================

pub fn get_classifier_base_url() -> String {
    read(|s| s.classifier_base_url.clone())
        .unwrap_or_else(|| DEFAULT_CLASSIFIER_BASE_URL.to_string())
}

pub fn set_classifier_base_url(url: Option<String>) -> Result<(), String> {
    update(|s| s.classifier_base_url = url.and_then(non_empty))
}

pub fn get_classifier_model() -> String {
    read(|s| s.classifier_model.clone())
        .unwrap_or_else(|| DEFAULT_CLASSIFIER_MODEL.to_string())
}

pub fn set_classifier_model(model: String) -> Result<(), String> {
    if model.is_empty() {
        return Err("Classifier model name cannot be empty".to_string());
    }
    update(|s| s.classifier_model = Some(model.clone()))?;
    println!("Classifier model set to: {}", model);
    Ok(())
}

/// Get the classifier API key (checks env var first, then stored setting)
pub fn get_classifier_api_key() -> Option<String> {
    if let Ok(key) = std::env::var("GROQ_API_KEY") {
        if !key.is_empty() {
            return Some(key);
        }
    }
    read(|s| s.classifier_api_key.clone())
}

pub fn has_classifier_api_key() -> bool {
    get_classifier_api_key().map(|k| !k.is_empty()).unwrap_or(false)
}

pub fn set_classifier_api_key(key: String) -> Result<(), String> {
    update(|s| s.classifier_api_key = non_empty(key))?;
    println!("Classifier API key saved to settings");
    Ok(())
}

/// Get masked classifier API key for display (shows first/last 4 chars)
pub fn get_masked_classifier_api_key() -> Option<String> {
    get_classifier_api_key().map(mask_key)
}

// ==================== Custom database path ====================

pub fn get_custom_db_path() -> Option<String> {
    read(|s| s.custom_db_path.clone())
}

pub fn set_custom_db_path(path: Option<String>) -> Result<(), String> {
    update(|s| s.custom_db_path = path.clone())?;
    println!("Custom DB path saved: {:?}", path);
    Ok(())
}

fn mask_key(key: String) -> String {
    // Slice on chars: keys are not guaranteed to be ASCII
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 12 {
        let head: String = chars[..8].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        "*".repeat(chars.len())
    }
}
