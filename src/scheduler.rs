//! Inactivity watchdog for persona-initiated follow-ups
//!
//! A pure state machine decides when a follow-up is due; the session runtime
//! owns the actual timer and executes the effects it produces.

pub mod transition;

#[cfg(test)]
mod proptests;

pub use transition::{transition, SchedulerContext};

use crate::persona::Mood;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// Watchdog state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FollowUpState {
    /// No persona message awaiting a follow-up
    #[default]
    Idle,
    /// Timer running for the persona message `message_id`
    Armed { message_id: String, armed_at: Instant },
    /// A follow-up to `message_id` is being typed
    Firing { message_id: String },
}

impl FollowUpState {
    pub fn phase(&self) -> FollowUpPhase {
        match self {
            FollowUpState::Idle => FollowUpPhase::Idle,
            FollowUpState::Armed { .. } => FollowUpPhase::Armed,
            FollowUpState::Firing { .. } => FollowUpPhase::Firing,
        }
    }
}

/// Serializable summary of [`FollowUpState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpPhase {
    Idle,
    Armed,
    Firing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    PersonaMessageAppended { message_id: String, at: Instant },
    UserMessageAppended,
    /// Session ended or persona switched
    Reset,
    TimerExpired {
        message_id: String,
        now: Instant,
        /// Id of the newest message in the log at expiry
        last_message_id: Option<String>,
        generating: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEffect {
    CancelTimer,
    StartTimer { message_id: String, after: Duration },
    SendFollowUp { message_id: String },
}

const FLIRTY: [&str; 3] = [
    "*notices you've gone quiet* Everything okay, gorgeous? 😘",
    "You're being awfully quiet... did I say something that made you blush? 😏",
    "*playfully pokes you* Hey, don't leave me hanging here! 💕",
];

const ROMANTIC: [&str; 3] = [
    "*gently touches your hand* You seem lost in thought... what's on your mind? 💕",
    "I hope I didn't overwhelm you with my feelings... you mean a lot to me 🌹",
    "*soft smile* Take your time, I'm here whenever you're ready to talk 💖",
];

const PLAYFUL: [&str; 3] = [
    "*bounces excitedly* Helloooo? Did you fall asleep on me? 😄",
    "Okay, now I'm getting worried... or are you just thinking of something fun to say? 😉",
    "*waves hands* Earth to you! Come back to me! 🌟",
];

const MYSTERIOUS: [&str; 3] = [
    "*watches you with knowing eyes* Sometimes silence speaks louder than words... 🌙",
    "I can sense you're processing something deep... I'll wait 🔮",
    "*whispers* The quiet moments between us feel so... meaningful ✨",
];

const DOMINANT: [&str; 3] = [
    "I'm waiting for your response... don't keep me waiting too long 😏",
    "*raises eyebrow* Cat got your tongue? I prefer when you speak your mind",
    "Your silence is... interesting. But I'd rather hear your thoughts",
];

const SUBMISSIVE: [&str; 3] = [
    "*looks at you with gentle concern* Did I say something wrong? 🥺",
    "I hope you're okay... I'm here if you need anything 💕",
    "*quietly waits* I don't want to bother you, but I miss talking to you...",
];

/// Nudge messages sent after the user goes quiet
pub fn follow_up_templates(mood: Mood) -> &'static [&'static str] {
    match mood {
        Mood::Flirty => &FLIRTY,
        Mood::Romantic => &ROMANTIC,
        Mood::Playful => &PLAYFUL,
        Mood::Mysterious => &MYSTERIOUS,
        Mood::Dominant => &DOMINANT,
        Mood::Submissive => &SUBMISSIVE,
    }
}

pub fn pick_follow_up(mood: Mood, rng: &mut impl rand::Rng) -> String {
    use rand::seq::SliceRandom;
    follow_up_templates(mood)
        .choose(rng)
        .copied()
        .unwrap_or("Are you still there?")
        .to_string()
}
