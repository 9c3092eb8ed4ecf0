//! Engine configuration
//!
//! Every timing, window and model constant the engine uses lives here, with
//! defaults matching the observed product behavior and environment overrides
//! for deployment.

use std::ops::RangeInclusive;
use std::time::Duration;

/// Number of trailing messages included in a generation request
pub const DEFAULT_TRANSCRIPT_WINDOW: usize = 10;
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_TOKENS: u32 = 200;
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(35);
pub const DEFAULT_INACTIVITY_THRESHOLD: Duration = Duration::from_secs(30);
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_PORT: u16 = 8000;

/// Artificial typing latency, in milliseconds
pub const DEFAULT_REPLY_DELAY_MS: RangeInclusive<u64> = 500..=1500;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Model selector passed to the generation capability
    pub model: String,
    /// Token budget for each generated reply
    pub max_tokens: u32,
    pub transcript_window: usize,
    /// How long after a persona message the follow-up check runs
    pub check_interval: Duration,
    /// Silence required at check time before a follow-up is sent
    pub inactivity_threshold: Duration,
    pub generation_timeout: Duration,
    pub reply_delay_ms: RangeInclusive<u64>,
    pub port: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            transcript_window: DEFAULT_TRANSCRIPT_WINDOW,
            check_interval: DEFAULT_CHECK_INTERVAL,
            inactivity_threshold: DEFAULT_INACTIVITY_THRESHOLD,
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
            reply_delay_ms: DEFAULT_REPLY_DELAY_MS,
            port: DEFAULT_PORT,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    ///
    /// Unparseable values are logged and ignored so a typo in one variable
    /// never prevents startup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(model) = lookup("PERSONA_CHAT_MODEL").filter(|m| !m.trim().is_empty()) {
            config.model = model.trim().to_string();
        }
        if let Some(max_tokens) = parse_var(&lookup, "PERSONA_CHAT_MAX_TOKENS") {
            config.max_tokens = max_tokens;
        }
        if let Some(secs) = parse_var(&lookup, "PERSONA_CHAT_CHECK_INTERVAL_SECS") {
            config.check_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var(&lookup, "PERSONA_CHAT_INACTIVITY_SECS") {
            config.inactivity_threshold = Duration::from_secs(secs);
        }
        if let Some(port) = parse_var(&lookup, "PERSONA_CHAT_PORT") {
            config.port = port;
        }

        if config.check_interval <= config.inactivity_threshold {
            tracing::warn!(
                check_interval_secs = config.check_interval.as_secs(),
                inactivity_secs = config.inactivity_threshold.as_secs(),
                "Follow-up check interval does not exceed the inactivity threshold; follow-ups will never fire"
            );
        }

        config
    }

    /// Configuration without typing latency, for tests
    #[cfg(test)]
    pub fn instant() -> Self {
        Self {
            reply_delay_ms: 0..=0,
            ..Self::default()
        }
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring malformed configuration value");
            None
        }
    }
}
