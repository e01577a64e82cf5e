//! Model/API-key lookup backed by Redis.

use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashMap;
use vtask_llm::{LlmError, LlmResult, ModelCredentials, ModelDirectory};

/// Reads `{prefix}:model:{id}` hashes with `name` and `api_key` fields.
pub struct RedisModelDirectory {
    client: redis::Client,
    prefix: String,
}

impl RedisModelDirectory {
    pub fn new(redis_url: &str) -> Result<Self, redis::RedisError> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
            prefix: "vtask".to_string(),
        })
    }

    fn key(&self, model_id: &str) -> String {
        format!("{}:model:{}", self.prefix, model_id)
    }
}

fn credentials_from_fields(model_id: &str, mut fields: HashMap<String, String>) -> LlmResult<ModelCredentials> {
    if fields.is_empty() {
        return Err(LlmError::ModelNotFound(model_id.to_string()));
    }
    let name = fields.remove("name").filter(|s| !s.is_empty());
    let key = fields.remove("api_key").filter(|s| !s.is_empty());
    match (name, key) {
        (Some(name), Some(key)) => Ok(ModelCredentials::new(name, key)),
        _ => Err(LlmError::Directory(format!(
            "model {} is missing its name or API key",
            model_id
        ))),
    }
}

#[async_trait]
impl ModelDirectory for RedisModelDirectory {
    async fn resolve(&self, model_id: &str) -> LlmResult<ModelCredentials> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| LlmError::Directory(e.to_string()))?;
        let fields: HashMap<String, String> = conn
            .hgetall(self.key(model_id))
            .await
            .map_err(|e| LlmError::Directory(e.to_string()))?;
        credentials_from_fields(model_id, fields)
    }
}
