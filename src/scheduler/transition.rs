//! Pure follow-up state transition function

use super::{FollowUpState, SchedulerEffect, SchedulerEvent};
use crate::config::EngineConfig;
use std::time::Duration;

/// Timing parameters for the watchdog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerContext {
    pub check_interval: Duration,
    pub inactivity_threshold: Duration,
}

impl From<&EngineConfig> for SchedulerContext {
    fn from(config: &EngineConfig) -> Self {
        Self {
            check_interval: config.check_interval,
            inactivity_threshold: config.inactivity_threshold,
        }
    }
}

/// Result of a state transition
#[derive(Debug, PartialEq, Eq)]
pub struct TransitionResult {
    pub new_state: FollowUpState,
    pub effects: Vec<SchedulerEffect>,
}

impl TransitionResult {
    pub fn new(state: FollowUpState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: SchedulerEffect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Pure transition function: no I/O, no clock reads.
pub fn transition(state: &FollowUpState, ctx: &SchedulerContext, event: SchedulerEvent) -> TransitionResult {
    match (state, event) {
        // Any persona message (reply or follow-up) restarts the countdown
        (_, SchedulerEvent::PersonaMessageAppended { message_id, at }) => TransitionResult::new(FollowUpState::Armed {
            message_id: message_id.clone(),
            armed_at: at,
        })
        .with_effect(SchedulerEffect::CancelTimer)
        .with_effect(SchedulerEffect::StartTimer {
            message_id,
            after: ctx.check_interval,
        }),

        (_, SchedulerEvent::UserMessageAppended | SchedulerEvent::Reset) => {
            TransitionResult::new(FollowUpState::Idle).with_effect(SchedulerEffect::CancelTimer)
        }

        (
            FollowUpState::Armed { message_id: armed_id, armed_at },
            SchedulerEvent::TimerExpired {
                message_id,
                now,
                last_message_id,
                generating,
            },
        ) if *armed_id == message_id
            && last_message_id.as_deref() == Some(message_id.as_str())
            && now.saturating_duration_since(*armed_at) > ctx.inactivity_threshold
            && !generating =>
        {
            TransitionResult::new(FollowUpState::Firing {
                message_id: message_id.clone(),
            })
            .with_effect(SchedulerEffect::SendFollowUp { message_id })
        }

        // Stale or premature expiry: nothing to do
        (_, SchedulerEvent::TimerExpired { .. }) => TransitionResult::new(state.clone()),
    }
}
