//! Property-based tests for the follow-up state machine

use super::*;
use proptest::prelude::*;
use tokio::time::Instant;

fn test_context() -> SchedulerContext {
    SchedulerContext {
        check_interval: Duration::from_secs(35),
        inactivity_threshold: Duration::from_secs(30),
    }
}

/// Event with times expressed as offsets from a shared base instant
#[derive(Debug, Clone)]
enum Step {
    Persona { id: u8, at_secs: u64 },
    User,
    Reset,
    Expired {
        id: u8,
        now_secs: u64,
        last_id: Option<u8>,
        generating: bool,
    },
}

fn arb_event() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0u8..4, 0u64..200).prop_map(|(id, at_secs)| Step::Persona { id, at_secs }),
        Just(Step::User),
        Just(Step::Reset),
        (0u8..4, 0u64..200, proptest::option::of(0u8..4), any::<bool>()).prop_map(
            |(id, now_secs, last_id, generating)| Step::Expired {
                id,
                now_secs,
                last_id,
                generating,
            }
        ),
    ]
}

fn realize(step: &Step, base: Instant) -> SchedulerEvent {
    match step {
        Step::Persona { id, at_secs } => SchedulerEvent::PersonaMessageAppended {
            message_id: format!("m{id}"),
            at: base + Duration::from_secs(*at_secs),
        },
        Step::User => SchedulerEvent::UserMessageAppended,
        Step::Reset => SchedulerEvent::Reset,
        Step::Expired {
            id,
            now_secs,
            last_id,
            generating,
        } => SchedulerEvent::TimerExpired {
            message_id: format!("m{id}"),
            now: base + Duration::from_secs(*now_secs),
            last_message_id: last_id.map(|l| format!("m{l}")),
            generating: *generating,
        },
    }
}

proptest! {
    /// A follow-up is only ever requested when every guard holds
    #[test]
    fn prop_send_only_when_guards_hold(events in proptest::collection::vec(arb_event(), 1..40)) {
        let ctx = test_context();
        let base = Instant::now();
        let mut state = FollowUpState::Idle;

        for step in &events {
            let event = realize(step, base);
            let before = state.clone();
            let result = transition(&state, &ctx, event.clone());

            if result.effects.iter().any(|e| matches!(e, SchedulerEffect::SendFollowUp { .. })) {
                let FollowUpState::Armed { message_id: armed_id, armed_at } = &before else {
                    return Err(TestCaseError::fail("fired while not armed"));
                };
                let SchedulerEvent::TimerExpired { message_id, now, last_message_id, generating } = &event else {
                    return Err(TestCaseError::fail("fired on a non-expiry event"));
                };
                prop_assert_eq!(armed_id, message_id);
                prop_assert_eq!(last_message_id.as_deref(), Some(message_id.as_str()));
                prop_assert!(now.saturating_duration_since(*armed_at) > ctx.inactivity_threshold);
                prop_assert!(!generating);
            }

            state = result.new_state;
        }
    }

    /// User activity and resets always leave the watchdog idle with its timer cancelled
    #[test]
    fn prop_user_activity_disarms(events in proptest::collection::vec(arb_event(), 0..20), reset in any::<bool>()) {
        let ctx = test_context();
        let base = Instant::now();
        let mut state = FollowUpState::Idle;
        for step in &events {
            state = transition(&state, &ctx, realize(step, base)).new_state;
        }

        let event = if reset { SchedulerEvent::Reset } else { SchedulerEvent::UserMessageAppended };
        let result = transition(&state, &ctx, event);
        prop_assert_eq!(result.new_state, FollowUpState::Idle);
        prop_assert_eq!(result.effects, vec![SchedulerEffect::CancelTimer]);
    }

    /// Every persona message starts exactly one fresh timer for itself
    #[test]
    fn prop_persona_message_starts_one_timer(
        events in proptest::collection::vec(arb_event(), 0..20),
        id in 0u8..4,
        at_secs in 0u64..200,
    ) {
        let ctx = test_context();
        let base = Instant::now();
        let mut state = FollowUpState::Idle;
        for step in &events {
            state = transition(&state, &ctx, realize(step, base)).new_state;
        }

        let result = transition(&state, &ctx, realize(&Step::Persona { id, at_secs }, base));
        let starts: Vec<_> = result
            .effects
            .iter()
            .filter(|e| matches!(e, SchedulerEffect::StartTimer { .. }))
            .collect();
        prop_assert_eq!(starts.len(), 1);
        prop_assert_eq!(
            starts[0],
            &SchedulerEffect::StartTimer { message_id: format!("m{id}"), after: ctx.check_interval }
        );
        prop_assert_eq!(result.effects.first(), Some(&SchedulerEffect::CancelTimer));
    }
}
