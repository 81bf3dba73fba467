use serde::{Deserialize, Serialize};
use std::{env, str::FromStr, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub models: ModelConfig,
    pub uploads: UploadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Hugging Face token. Without it the service runs on the local fallback model.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub inference_url: String,
    pub chat_url: String,
    pub detector_model: String,
    pub generation_model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub max_file_bytes: usize,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: env_string("HOST", "0.0.0.0"),
                port: env_or("PORT", 5000),
                log_level: env_string("LOG_LEVEL", "info"),
            },
            models: ModelConfig {
                api_key: env::var("HUGGINGFACE_API_KEY")
                    .ok()
                    .map(|key| key.trim().to_string())
                    .filter(|key| !key.is_empty()),
                inference_url: env_string(
                    "HF_INFERENCE_URL",
                    "https://router.huggingface.co/hf-inference/models",
                ),
                chat_url: env_string(
                    "HF_CHAT_URL",
                    "https://router.huggingface.co/v1/chat/completions",
                ),
                detector_model: env_string(
                    "AI_DETECTOR_MODEL",
                    "openai-community/roberta-base-openai-detector",
                ),
                generation_model: env_string(
                    "GENERATION_MODEL",
                    "meta-llama/Llama-3.2-1B-Instruct",
                ),
                timeout_secs: env_or("MODEL_TIMEOUT_SECS", 30),
                max_retries: env_or("MODEL_MAX_RETRIES", 2),
                retry_backoff_ms: env_or("MODEL_RETRY_BACKOFF_MS", 300),
            },
            uploads: UploadConfig {
                max_file_bytes: env_or("MAX_UPLOAD_BYTES", 5 * 1024 * 1024),
            },
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config = Self::default();
        if config.models.timeout_secs == 0 {
            anyhow::bail!("MODEL_TIMEOUT_SECS must be greater than zero");
        }
        if config.uploads.max_file_bytes == 0 {
            anyhow::bail!("MAX_UPLOAD_BYTES must be greater than zero");
        }
        Ok(config)
    }
}

impl ModelConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}
