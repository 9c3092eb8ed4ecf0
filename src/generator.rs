//! Reply generation with heuristic fallback
//!
//! Calls the generation capability exactly once per turn. Any failure is
//! logged and answered from the heuristic pools instead, so callers always
//! get an in-character reply and never see an error.

use crate::config::EngineConfig;
use crate::heuristic;
use crate::llm::{LlmError, LlmRequest, LlmService};
use crate::persona::Persona;
use rand::Rng;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    Model,
    Fallback,
}

/// Text to append as a persona message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub source: ReplySource,
}

#[derive(Clone)]
pub struct ResponseGenerator {
    llm: Arc<dyn LlmService>,
    timeout: Duration,
    reply_delay_ms: RangeInclusive<u64>,
}

impl ResponseGenerator {
    pub fn new(llm: Arc<dyn LlmService>, config: &EngineConfig) -> Self {
        Self {
            llm,
            timeout: config.generation_timeout,
            reply_delay_ms: config.reply_delay_ms.clone(),
        }
    }

    /// Produce a reply to `utterance`.
    ///
    /// Model replies are held back by a random typing delay before being
    /// returned; fallback replies are returned immediately.
    pub async fn generate(&self, request: &LlmRequest, persona: &Persona, utterance: &str) -> Reply {
        match self.call_model(request).await {
            Ok(text) => {
                tokio::time::sleep(typing_delay(&self.reply_delay_ms)).await;
                Reply {
                    text,
                    source: ReplySource::Model,
                }
            }
            Err(e) => {
                tracing::warn!(
                    persona_id = %persona.id,
                    model = %request.model,
                    kind = e.kind.as_str(),
                    transient = e.kind.is_transient(),
                    error = %e.message,
                    "Generation failed, using heuristic reply"
                );
                Reply {
                    text: heuristic::respond(utterance, persona, &mut rand::thread_rng()),
                    source: ReplySource::Fallback,
                }
            }
        }
    }

    async fn call_model(&self, request: &LlmRequest) -> Result<String, LlmError> {
        let response = tokio::time::timeout(self.timeout, self.llm.complete(request))
            .await
            .map_err(|_| LlmError::network(format!("Generation timed out after {:?}", self.timeout)))??;

        response
            .usable_text()
            .map(ToString::to_string)
            .ok_or_else(|| LlmError::empty_response("Model returned no text"))
    }
}

/// Random human-like typing latency drawn from `range_ms`
pub fn typing_delay(range_ms: &RangeInclusive<u64>) -> Duration {
    if range_ms.is_empty() {
        return Duration::from_millis(*range_ms.start());
    }
    Duration::from_millis(rand::thread_rng().gen_range(range_ms.clone()))
}
