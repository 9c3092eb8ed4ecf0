//! Generation prompt construction
//!
//! Turns a persona, the recent conversation and the newest user utterance
//! into a single prompt. Construction is pure: the same inputs always yield
//! byte-identical output.

use crate::config::EngineConfig;
use crate::llm::LlmRequest;
use crate::message::{Message, Sender};
use crate::persona::Persona;
use std::fmt::Write;

const BEHAVIOR_GUIDELINES: &str = "BEHAVIORAL GUIDELINES:
- Stay fully in character as a real person with genuine emotions, memories and opinions
- Never say or imply that you are an AI, a bot, a language model or an assistant
- Keep replies conversational and short (1-4 sentences)
- React to what was just said and to earlier details of the conversation
- Use contractions and casual language that fit your personality
- Use emojis and expressions naturally, not excessively";

const EMPTY_TRANSCRIPT: &str = "This is the start of your conversation.";

/// Render the generation prompt.
///
/// `history` is the log as it stood before the newest user turn; only its
/// last `window` messages are included, oldest first.
pub fn build_prompt(persona: &Persona, history: &[Message], utterance: &str, window: usize) -> String {
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "You are {}, a real person with your own personality, memories and feelings.",
        persona.name
    );
    prompt.push('\n');

    prompt.push_str("CORE IDENTITY:\n");
    let _ = writeln!(prompt, "- Name: {}", persona.name);
    let _ = writeln!(prompt, "- Age: {}", persona.age);
    let _ = writeln!(prompt, "- Personality: {}", persona.personality);
    let _ = writeln!(prompt, "- Key traits: {}", persona.traits.join(", "));
    let _ = writeln!(prompt, "- Current mood: {}", persona.mood.as_str());
    let _ = writeln!(prompt, "- Communication style: {}", persona.response_style.as_str());
    let _ = writeln!(prompt, "- Interests & passions: {}", persona.interests.join(", "));
    prompt.push('\n');

    if !persona.custom_prompt.trim().is_empty() {
        prompt.push_str("CHARACTER INSTRUCTIONS:\n");
        prompt.push_str(&persona.custom_prompt);
        prompt.push_str("\n\n");
    }

    prompt.push_str(BEHAVIOR_GUIDELINES);
    prompt.push_str("\n\n");

    prompt.push_str("CONVERSATION CONTEXT:\n");
    let transcript = render_transcript(persona, history, window);
    if transcript.is_empty() {
        prompt.push_str(EMPTY_TRANSCRIPT);
        prompt.push('\n');
    } else {
        prompt.push_str("Previous conversation:\n");
        prompt.push_str(&transcript);
    }
    prompt.push('\n');

    let _ = writeln!(prompt, "User just said: \"{utterance}\"");
    prompt.push('\n');
    let _ = write!(prompt, "Respond as {} would naturally respond:", persona.name);

    prompt
}

/// Last `window` messages as `"<speaker>: <content>"` lines
fn render_transcript(persona: &Persona, history: &[Message], window: usize) -> String {
    let start = history.len().saturating_sub(window);
    let mut transcript = String::new();
    for message in &history[start..] {
        let speaker = match message.sender {
            Sender::User => "User",
            Sender::Persona => persona.name.as_str(),
        };
        let _ = writeln!(transcript, "{speaker}: {}", message.content);
    }
    transcript
}

/// Wrap a prompt into a request using the configured model and token budget
pub fn build_request(
    config: &EngineConfig,
    persona: &Persona,
    history: &[Message],
    utterance: &str,
) -> LlmRequest {
    LlmRequest {
        prompt: build_prompt(persona, history, utterance, config.transcript_window),
        model: config.model.clone(),
        max_tokens: config.max_tokens,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageLog;
    use crate::persona::PersonaCatalog;
    use proptest::prelude::*;

    fn sophia() -> Persona {
        (*PersonaCatalog::with_defaults().get("1").unwrap()).clone()
    }

    fn log_of(count: usize) -> MessageLog {
        let mut log = MessageLog::new();
        for i in 1..=count {
            if i % 2 == 1 {
                log.push_user(format!("user line {i:02}"));
            } else {
                log.push_persona(format!("persona line {i:02}"), "1");
            }
        }
        log
    }

    #[test]
    fn test_empty_history_marks_start() {
        let prompt = build_prompt(&sophia(), &[], "hey there", 10);
        assert!(prompt.contains("This is the start of your conversation."));
        assert!(!prompt.contains("Previous conversation:"));
        assert!(prompt.contains("User just said: \"hey there\""));
    }

    #[test]
    fn test_truncates_to_last_ten_in_order() {
        let log = log_of(15);
        let prompt = build_prompt(&sophia(), log.as_slice(), "and now?", 10);

        for i in 1..=5 {
            assert!(!prompt.contains(&format!("line {i:02}")), "message {i} should be dropped");
        }
        let positions: Vec<usize> = (6..=15)
            .map(|i| prompt.find(&format!("line {i:02}")).expect("kept message missing"))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_speaker_labels() {
        let log = log_of(2);
        let prompt = build_prompt(&sophia(), log.as_slice(), "hi", 10);
        assert!(prompt.contains("User: user line 01\n"));
        assert!(prompt.contains("Sophia: persona line 02\n"));
    }

    #[test]
    fn test_identity_and_instructions_included() {
        let persona = sophia();
        let prompt = build_prompt(&persona, &[], "hi", 10);
        assert!(prompt.contains("- Age: 28"));
        assert!(prompt.contains("- Current mood: flirty"));
        assert!(prompt.contains("- Communication style: seductive"));
        assert!(prompt.contains(&persona.custom_prompt));
        assert!(prompt.contains("Never say or imply that you are an AI"));
        assert!(prompt.ends_with("Respond as Sophia would naturally respond:"));
    }

    #[test]
    fn test_request_uses_config() {
        let config = EngineConfig::default();
        let request = build_request(&config, &sophia(), &[], "hi");
        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.max_tokens, 200);
    }

    proptest! {
        #[test]
        fn prop_prompt_is_deterministic(
            lines in proptest::collection::vec("[a-zA-Z ?!]{0,30}", 0..25),
            utterance in "[a-zA-Z ?!]{0,30}",
        ) {
            let mut log = MessageLog::new();
            for (i, line) in lines.iter().enumerate() {
                if i % 2 == 0 {
                    log.push_user(line.clone());
                } else {
                    log.push_persona(line.clone(), "1");
                }
            }
            let persona = sophia();
            let first = build_prompt(&persona, log.as_slice(), &utterance, 10);
            let second = build_prompt(&persona, log.as_slice(), &utterance, 10);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_transcript_never_exceeds_window(count in 0usize..40, window in 1usize..15) {
            let log = log_of(count);
            let transcript = render_transcript(&sophia(), log.as_slice(), window);
            prop_assert_eq!(transcript.lines().count(), count.min(window));
        }
    }
}
