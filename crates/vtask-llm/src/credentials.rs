//! Model and API-key lookup.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use crate::error::{LlmError, LlmResult};

/// Provider model name plus the key used to call it.
#[derive(Clone, PartialEq, Eq)]
pub struct ModelCredentials {
    pub model_name: String,
    pub api_key: String,
}

impl ModelCredentials {
    pub fn new(model_name: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            api_key: api_key.into(),
        }
    }
}

// Keep keys out of logs.
impl fmt::Debug for ModelCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCredentials")
            .field("model_name", &self.model_name)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Resolves a configured model id to credentials.
#[async_trait]
pub trait ModelDirectory: Send + Sync {
    /// Fails with [`LlmError::ModelNotFound`] for unknown ids.
    async fn resolve(&self, model_id: &str) -> LlmResult<ModelCredentials>;
}

/// Fixed in-process directory, for tests and single-model deployments.
#[derive(Default)]
pub struct StaticModelDirectory {
    models: RwLock<HashMap<String, ModelCredentials>>,
}

impl StaticModelDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(self, model_id: impl Into<String>, credentials: ModelCredentials) -> Self {
        if let Ok(mut models) = self.models.write() {
            models.insert(model_id.into(), credentials);
        }
        self
    }
}

#[async_trait]
impl ModelDirectory for StaticModelDirectory {
    async fn resolve(&self, model_id: &str) -> LlmResult<ModelCredentials> {
        let models = self
            .models
            .read()
            .map_err(|_| LlmError::Directory("model table lock poisoned".to_string()))?;
        models
            .get(model_id)
            .cloned()
            .ok_or_else(|| LlmError::ModelNotFound(model_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_directory() {
        let directory =
            StaticModelDirectory::new().with_model("m1", ModelCredentials::new("gemini-2.5-flash", "k"));

        let creds = directory.resolve("m1").await.unwrap();
        assert_eq!(creds.model_name, "gemini-2.5-flash");
        assert!(matches!(directory.resolve("m2").await, Err(LlmError::ModelNotFound(id)) if id == "m2"));
    }

    #[test]
    fn test_debug_redacts_key() {
        let creds = ModelCredentials::new("gemini-2.5-flash", "secret-key");
        assert!(!format!("{creds:?}").contains("secret-key"));
    }
}
