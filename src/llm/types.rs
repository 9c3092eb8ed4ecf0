//! Common types for LLM interactions

/// A single-prompt text generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmRequest {
    pub prompt: String,
    /// Model selector, e.g. `gpt-4o-mini`
    pub model: String,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub text: String,
    pub usage: Usage,
}

impl LlmResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: Usage::default(),
        }
    }

    /// Trimmed text, or `None` when the model produced nothing usable
    pub fn usable_text(&self) -> Option<&str> {
        let trimmed = self.text.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// Usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_text() {
        assert_eq!(LlmResponse::text("  hi there \n").usable_text(), Some("hi there"));
        assert_eq!(LlmResponse::text(" \n\t").usable_text(), None);
        assert_eq!(LlmResponse::default().usable_text(), None);
    }
}
