use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::LlmProvider;
use super::types::EmbedTask;
use crate::core::config::LlmSettings;
use crate::core::errors::ApiError;

/// Client for the Google Generative Language API.
#[derive(Clone)]
pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    embed_model: String,
    generate_model: String,
    client: Client,
}

impl GeminiProvider {
    pub fn new(settings: LlmSettings) -> Self {
        Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key,
            embed_model: settings.embed_model,
            generate_model: settings.generate_model,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn embedding_model(&self) -> &str {
        &self.embed_model
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        let url = format!(
            "{}/models/{}?key={}",
            self.base_url, self.generate_model, self.api_key
        );
        let res = self.client.get(&url).send().await;
        match res {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    async fn embed(&self, inputs: &[String], task: EmbedTask) -> Result<Vec<Vec<f32>>, ApiError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!(
            "{}/models/{}:batchEmbedContents?key={}",
            self.base_url, self.embed_model, self.api_key
        );

        let requests: Vec<Value> = inputs
            .iter()
            .map(|text| {
                json!({
                    "model": format!("models/{}", self.embed_model),
                    "content": { "parts": [ { "text": text } ] },
                    "taskType": task.as_str(),
                })
            })
            .collect();

        let res = self
            .client
            .post(&url)
            .json(&json!({ "requests": requests }))
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "embedding call failed ({}): {}",
                status, text
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::upstream)?;

        let embeddings: Vec<Vec<f32>> = payload["embeddings"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .map(|item| {
                        item["values"]
                            .as_array()
                            .map(|vals| {
                                vals.iter()
                                    .filter_map(|v| v.as_f64().map(|f| f as f32))
                                    .collect()
                            })
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .unwrap_or_default();

        if embeddings.len() != inputs.len() {
            return Err(ApiError::Upstream(format!(
                "embedding service returned {} vectors for {} inputs",
                embeddings.len(),
                inputs.len()
            )));
        }

        Ok(embeddings)
    }

    async fn generate(&self, prompt: &str) -> Result<String, ApiError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.generate_model, self.api_key
        );

        let body = json!({
            "contents": [ { "parts": [ { "text": prompt } ] } ],
        });

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "generation call failed ({}): {}",
                status, text
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::upstream)?;

        let content = payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|text| text.to_string())
            .ok_or_else(|| {
                ApiError::Upstream("generation response contained no text candidate".to_string())
            })?;

        Ok(content)
    }
}
