use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use super::defaults;
use super::paths::AppPaths;
use crate::core::errors::ApiError;

/// Loads and merges the YAML configuration files.
///
/// The public `config.yml` is deep-merged with `secrets.yaml` from the data
/// directory, so API keys never live in the checked-in config.
#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub download_timeout: Duration,
    pub session_capacity: u64,
    pub session_idle: Duration,
    /// When set, session indices are snapshotted to this directory and
    /// restored on a registry miss. Off by default.
    pub persist_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: String,
    pub embed_model: String,
    pub generate_model: String,
}

#[derive(Debug, Clone, Default)]
pub struct ServerSettings {
    pub api_token: Option<String>,
    pub cors_allowed_origins: Vec<String>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("POLICYQUERY_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let user_config = self.paths.user_data_dir.join("config.yml");
        if user_config.exists() {
            return user_config;
        }

        self.paths.project_root.join("config.yml")
    }

    pub fn load_config(&self) -> Result<Value, ApiError> {
        let public_config = load_yaml_file(&self.config_path());
        let secrets_config = load_yaml_file(&self.paths.secrets_path);
        Ok(deep_merge(&public_config, &secrets_config))
    }

    pub fn retrieval(&self) -> Result<RetrievalSettings, ApiError> {
        let config = self.load_config()?;
        let section = config.get("retrieval").cloned().unwrap_or(Value::Null);

        let chunk_size = get_usize(&section, "chunk_size", defaults::DEFAULT_CHUNK_SIZE);
        let chunk_overlap = get_usize(&section, "chunk_overlap", defaults::DEFAULT_CHUNK_OVERLAP);
        let top_k = get_usize(&section, "top_k", defaults::DEFAULT_TOP_K);
        let download_timeout_secs = get_u64(
            &section,
            "download_timeout_secs",
            defaults::DEFAULT_DOWNLOAD_TIMEOUT_SECS,
        );
        let session_capacity = get_u64(
            &section,
            "session_capacity",
            defaults::DEFAULT_SESSION_CAPACITY,
        );
        let session_idle_secs = get_u64(
            &section,
            "session_idle_secs",
            defaults::DEFAULT_SESSION_IDLE_SECS,
        );
        let persist_dir = section
            .get("persist_dir")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        if chunk_size == 0 {
            return Err(ApiError::Internal(
                "retrieval.chunk_size must be positive".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(ApiError::Internal(format!(
                "retrieval.chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        if top_k == 0 {
            return Err(ApiError::Internal(
                "retrieval.top_k must be positive".to_string(),
            ));
        }

        Ok(RetrievalSettings {
            chunk_size,
            chunk_overlap,
            top_k,
            download_timeout: Duration::from_secs(download_timeout_secs),
            session_capacity,
            session_idle: Duration::from_secs(session_idle_secs),
            persist_dir,
        })
    }

    pub fn llm(&self) -> Result<LlmSettings, ApiError> {
        let config = self.load_config()?;
        let section = config.get("llm").cloned().unwrap_or(Value::Null);

        let api_key = env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| {
                section
                    .get("api_key")
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.trim().is_empty())
                    .map(|s| s.to_string())
            })
            .ok_or_else(|| {
                ApiError::Internal(
                    "no embedding API key: set GEMINI_API_KEY or llm.api_key in secrets.yaml"
                        .to_string(),
                )
            })?;

        Ok(LlmSettings {
            base_url: get_string(&section, "base_url", defaults::DEFAULT_GEMINI_BASE_URL),
            api_key,
            embed_model: get_string(&section, "embed_model", defaults::DEFAULT_EMBED_MODEL),
            generate_model: get_string(
                &section,
                "generate_model",
                defaults::DEFAULT_GENERATE_MODEL,
            ),
        })
    }

    pub fn server(&self) -> Result<ServerSettings, ApiError> {
        let config = self.load_config()?;
        let section = config.get("server").cloned().unwrap_or(Value::Null);

        let api_token = section
            .get("api_token")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.to_string());

        let cors_allowed_origins = section
            .get("cors_allowed_origins")
            .and_then(|v| v.as_array())
            .map(|list| {
                list.iter()
                    .filter_map(|item| item.as_str())
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(|item| item.to_string())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        Ok(ServerSettings {
            api_token,
            cors_allowed_origins,
        })
    }
}

fn load_yaml_file(path: &Path) -> Value {
    if !path.exists() {
        return Value::Object(Map::new());
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<Value>(&contents) {
            Ok(value) => match value {
                Value::Object(_) => value,
                _ => Value::Object(Map::new()),
            },
            Err(_) => Value::Object(Map::new()),
        },
        Err(_) => Value::Object(Map::new()),
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn get_usize(section: &Value, key: &str, default: usize) -> usize {
    section
        .get(key)
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .unwrap_or(default)
}

fn get_u64(section: &Value, key: &str, default: u64) -> u64 {
    section.get(key).and_then(|v| v.as_u64()).unwrap_or(default)
}

fn get_string(section: &Value, key: &str, default: &str) -> String {
    section
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default)
        .to_string()
}
