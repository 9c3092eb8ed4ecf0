//! Rule-based replies used when the generation capability is unavailable
//!
//! Classifies the user's utterance by keyword and answers from a fixed
//! template pool, so a persona can always say something in character
//! without any external call.

use crate::persona::{Mood, Persona};
use rand::seq::SliceRandom;
use rand::Rng;

/// Coarse intent of a user utterance.
///
/// Declaration order is match precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextCategory {
    Greeting,
    Compliment,
    Question,
    Personal,
}

impl ContextCategory {
    pub const ALL: [ContextCategory; 4] = [
        ContextCategory::Greeting,
        ContextCategory::Compliment,
        ContextCategory::Question,
        ContextCategory::Personal,
    ];

    fn keywords(self) -> &'static [&'static str] {
        match self {
            ContextCategory::Greeting => &["hi", "hello", "hey"],
            ContextCategory::Compliment => &["beautiful", "pretty", "gorgeous", "cute"],
            ContextCategory::Question => &["?", "what", "how", "why"],
            ContextCategory::Personal => &["feel", "think", "like", "love"],
        }
    }

    pub fn templates(self) -> &'static [&'static str] {
        match self {
            ContextCategory::Greeting => &GREETING,
            ContextCategory::Compliment => &COMPLIMENT,
            ContextCategory::Question => &QUESTION,
            ContextCategory::Personal => &PERSONAL,
        }
    }
}

const GREETING: [&str; 3] = [
    "Hey there! 😊 I was just thinking about you actually...",
    "Hi! Perfect timing, I was getting a bit lonely here 💕",
    "*lights up* Oh hey! You just made my day so much better!",
];

const COMPLIMENT: [&str; 3] = [
    "Aww, you're making me blush! 😊 That's really sweet of you to say",
    "*smiles* You always know exactly what to say to make me feel special",
    "Thank you... that means more to me than you know 💕",
];

const QUESTION: [&str; 3] = [
    "Hmm, that's a really good question! Let me think about that for a sec...",
    "Oh wow, I love how curious you are! It's actually really attractive 😉",
    "*tilts head thoughtfully* You know, I've been wondering about that too...",
];

const PERSONAL: [&str; 3] = [
    "I feel like I can really open up to you... it's nice having someone who listens",
    "You make me feel so comfortable being myself around you 💕",
    "*gets a bit vulnerable* I don't usually share this with people, but...",
];

const FLIRTY: [&str; 4] = [
    "*gives you a playful look* You're trouble, aren't you? I like that 😏",
    "Mmm, keep talking like that and you'll have my full attention 💋",
    "*bites lip* You know exactly how to get to me, don't you?",
    "I can't help but smile when you say things like that... you're dangerous 🔥",
];

const ROMANTIC: [&str; 4] = [
    "*heart flutters* You have this way of making everything feel like a fairytale 💕",
    "I keep thinking about what you said earlier... it made me feel so warm inside",
    "*sighs dreamily* Sometimes I wonder if you're too good to be true 🌹",
    "You make me believe in those butterflies-in-your-stomach kind of feelings again",
];

const PLAYFUL: [&str; 4] = [
    "*giggles* Oh my god, you're so silly! I can't even... 😂",
    "Okay okay, you got me there! *laughs* I wasn't expecting that at all",
    "*playfully rolls eyes* You're such a goofball, but that's why I adore you",
    "Wait, did you just...? *bursts out laughing* You're unbelievable!",
];

const MYSTERIOUS: [&str; 4] = [
    "*looks at you with knowing eyes* There's so much more to this story... if you're ready to hear it",
    "*speaks softly* Some things are better felt than explained, don't you think?",
    "*mysterious smile* You're starting to see beneath the surface... I like that",
    "*leans in closer* The real question is... are you prepared for the truth?",
];

const DOMINANT: [&str; 4] = [
    "*confident smile* I appreciate when someone knows what they want",
    "Good... I like it when you're direct with me. It shows character",
    "*approving nod* Now that's the kind of honesty I respect",
    "You're learning to speak your mind. I find that... attractive",
];

const SUBMISSIVE: [&str; 4] = [
    "*looks up at you with soft eyes* I just want to make you happy...",
    "*gentle smile* Whatever makes you feel good makes me feel good too",
    "*blushes* I love how you make me feel so safe and cared for",
    "*whispers* I trust you completely... you know that, right?",
];

/// Mood-keyed pool for utterances with no recognizable context
pub fn mood_templates(mood: Mood) -> &'static [&'static str] {
    match mood {
        Mood::Flirty => &FLIRTY,
        Mood::Romantic => &ROMANTIC,
        Mood::Playful => &PLAYFUL,
        Mood::Mysterious => &MYSTERIOUS,
        Mood::Dominant => &DOMINANT,
        Mood::Submissive => &SUBMISSIVE,
    }
}

/// Classify an utterance; `None` when no keyword matches
pub fn classify(utterance: &str) -> Option<ContextCategory> {
    let lowered = utterance.to_lowercase();
    ContextCategory::ALL
        .into_iter()
        .find(|category| category.keywords().iter().any(|kw| lowered.contains(kw)))
}

/// Produce a persona-flavored reply without any external call
pub fn respond(utterance: &str, persona: &Persona, rng: &mut impl Rng) -> String {
    let pool = match classify(utterance) {
        Some(category) => category.templates(),
        None => mood_templates(persona.mood),
    };
    pool.choose(rng)
        .copied()
        // Pools are fixed non-empty arrays; this arm is unreachable in practice
        .unwrap_or("*smiles* Tell me more...")
        .to_string()
}
