//! Model registry for managing available LLM providers

use super::{LlmError, LlmRequest, LlmResponse, LlmService, LoggingService, OpenAIModel, OpenAIService};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Configuration for LLM providers
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub openai_api_key: Option<String>,
    /// Gateway base URL; when set, requests go through it with an implicit key
    pub gateway: Option<String>,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            gateway: std::env::var("LLM_GATEWAY").ok(),
        }
    }
}

/// Registry of available LLM models
pub struct ModelRegistry {
    services: HashMap<String, Arc<dyn LlmService>>,
}

impl ModelRegistry {
    /// Registry with no models; every generation falls back to heuristics
    pub fn new_empty() -> Self {
        Self {
            services: HashMap::new(),
        }
    }

    pub fn new(config: &LlmConfig) -> Self {
        let mut registry = Self::new_empty();

        // In gateway mode the gateway handles authentication
        let api_key = if config.gateway.is_some() {
            Some("implicit".to_string())
        } else {
            config.openai_api_key.clone().filter(|k| !k.is_empty())
        };

        if let Some(api_key) = api_key {
            for model in OpenAIModel::ALL {
                let service = OpenAIService::new(api_key.clone(), model, config.gateway.as_deref());
                registry.register(Arc::new(service));
            }
        }

        registry
    }

    /// Add a service, wrapped with request logging
    pub fn register(&mut self, service: Arc<dyn LlmService>) {
        let id = service.model_id().to_string();
        self.services.insert(id, Arc::new(LoggingService::new(service)));
    }

    /// Get a model by ID
    pub fn get(&self, model_id: &str) -> Option<Arc<dyn LlmService>> {
        self.services.get(model_id).cloned()
    }

    pub fn has_models(&self) -> bool {
        !self.services.is_empty()
    }

    /// List all available model IDs
    pub fn available_models(&self) -> Vec<String> {
        let mut models: Vec<_> = self.services.keys().cloned().collect();
        models.sort();
        models
    }
}

/// Adapter that routes each request to the model it names
pub struct RegistryLlmClient {
    registry: Arc<ModelRegistry>,
}

impl RegistryLlmClient {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl LlmService for RegistryLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let llm = self
            .registry
            .get(&request.model)
            .ok_or_else(|| LlmError::network(format!("No LLM available for model {}", request.model)))?;
        llm.complete(request).await
    }

    fn model_id(&self) -> &str {
        "registry"
    }
}
