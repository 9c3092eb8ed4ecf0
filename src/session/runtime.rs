//! Session event loop

use super::{Pending, Session, SessionError, SessionEvent, SessionHandle, SessionUpdate};
use crate::config::EngineConfig;
use crate::generator::{typing_delay, ResponseGenerator};
use crate::message::Message;
use crate::persona::Persona;
use crate::prompt::build_request;
use crate::scheduler::{self, SchedulerContext, SchedulerEffect, SchedulerEvent};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub struct SessionRuntime {
    session: Session,
    config: Arc<EngineConfig>,
    scheduler_ctx: SchedulerContext,
    generator: ResponseGenerator,
    event_rx: mpsc::Receiver<SessionEvent>,
    event_tx: mpsc::Sender<SessionEvent>,
    broadcast_tx: broadcast::Sender<SessionUpdate>,
    /// Root token; cancelling it ends the session and everything it spawned
    cancel: CancellationToken,
    /// Token for the currently armed follow-up timer
    timer_token: Option<CancellationToken>,
}

impl SessionRuntime {
    pub fn new(persona: Arc<Persona>, config: Arc<EngineConfig>, generator: ResponseGenerator) -> (Self, SessionHandle) {
        let session = Session::new(persona.clone());
        let (event_tx, event_rx) = mpsc::channel(32);
        let (broadcast_tx, _) = broadcast::channel(128);
        let cancel = CancellationToken::new();

        let handle = SessionHandle {
            session_id: session.id.clone(),
            persona,
            event_tx: event_tx.clone(),
            broadcast_tx: broadcast_tx.clone(),
            cancel: cancel.clone(),
        };

        let runtime = Self {
            session,
            scheduler_ctx: SchedulerContext::from(config.as_ref()),
            config,
            generator,
            event_rx,
            event_tx,
            broadcast_tx,
            cancel,
            timer_token: None,
        };

        (runtime, handle)
    }

    /// Create a session and run its loop in the background
    pub fn spawn(persona: Arc<Persona>, config: Arc<EngineConfig>, generator: ResponseGenerator) -> SessionHandle {
        let (runtime, handle) = Self::new(persona, config, generator);
        tokio::spawn(runtime.run());
        handle
    }

    pub async fn run(mut self) {
        tracing::info!(
            session_id = %self.session.id,
            persona_id = %self.session.persona().id,
            "Starting session"
        );

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                Some(event) = self.event_rx.recv() => self.process_event(event),
                else => break,
            }
        }

        self.apply_scheduler(SchedulerEvent::Reset);
        if let Some(pending) = self.session.pending() {
            tracing::info!(session_id = %self.session.id, ?pending, "Discarding in-flight work");
        }
        let _ = self.broadcast_tx.send(SessionUpdate::Ended);
        tracing::info!(
            session_id = %self.session.id,
            messages = self.session.log().len(),
            "Session ended"
        );
    }

    fn process_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::UserMessage { text, reply } => {
                let result = self.handle_user_message(text);
                let _ = reply.send(result);
            }
            SessionEvent::GenerationComplete { turn, reply } => {
                if self.session.pending() != Some(&Pending::Reply { turn }) {
                    tracing::debug!(session_id = %self.session.id, turn, "Dropping stale generation result");
                    return;
                }
                tracing::debug!(session_id = %self.session.id, turn, source = ?reply.source, "Reply ready");
                self.append_persona(reply.text);
            }
            SessionEvent::FollowUpDue { message_id } => {
                let event = SchedulerEvent::TimerExpired {
                    message_id,
                    now: Instant::now(),
                    last_message_id: self.session.last_message_id(),
                    generating: self.session.is_generating(),
                };
                self.apply_scheduler(event);
            }
            SessionEvent::FollowUpReady { message_id, text } => {
                let expected = Pending::FollowUp {
                    message_id: message_id.clone(),
                };
                if self.session.pending() != Some(&expected)
                    || self.session.last_message_id().as_deref() != Some(message_id.as_str())
                {
                    tracing::debug!(session_id = %self.session.id, %message_id, "Dropping stale follow-up");
                    return;
                }
                tracing::info!(session_id = %self.session.id, "Sending follow-up after inactivity");
                self.append_persona(text);
            }
            SessionEvent::Snapshot { reply } => {
                let _ = reply.send(self.session.snapshot());
            }
        }
    }

    fn handle_user_message(&mut self, text: String) -> Result<Message, SessionError> {
        if text.trim().is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        if self.session.is_generating() {
            return Err(SessionError::Busy);
        }

        // Transcript covers history before this turn
        let persona = self.session.persona().clone();
        let request = build_request(&self.config, &persona, self.session.log().as_slice(), &text);

        let message = self.session.begin_turn(text.clone());
        self.broadcast(SessionUpdate::Message(message.clone()));
        self.apply_scheduler(SchedulerEvent::UserMessageAppended);
        self.broadcast(SessionUpdate::Typing { active: true });

        let turn = self.session.turn();
        let generator = self.generator.clone();
        let event_tx = self.event_tx.clone();
        let cancel = self.cancel.child_token();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                reply = generator.generate(&request, &persona, &text) => {
                    let _ = event_tx.send(SessionEvent::GenerationComplete { turn, reply }).await;
                }
            }
        });

        Ok(message)
    }

    fn append_persona(&mut self, text: String) {
        let message = self.session.append_persona(text, Instant::now());
        self.broadcast(SessionUpdate::Typing { active: false });
        self.broadcast(SessionUpdate::Message(message.clone()));
        self.apply_scheduler(SchedulerEvent::PersonaMessageAppended {
            message_id: message.id,
            at: self.session.last_activity().unwrap_or_else(Instant::now),
        });
    }

    fn apply_scheduler(&mut self, event: SchedulerEvent) {
        let result = scheduler::transition(&self.session.follow_up, &self.scheduler_ctx, event);
        self.session.follow_up = result.new_state;
        for effect in result.effects {
            self.execute_effect(effect);
        }
    }

    fn execute_effect(&mut self, effect: SchedulerEffect) {
        match effect {
            SchedulerEffect::CancelTimer => {
                if let Some(token) = self.timer_token.take() {
                    token.cancel();
                }
            }
            SchedulerEffect::StartTimer { message_id, after } => {
                let token = self.cancel.child_token();
                self.timer_token = Some(token.clone());
                let event_tx = self.event_tx.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        biased;
                        () = token.cancelled() => {}
                        () = tokio::time::sleep(after) => {
                            let _ = event_tx.send(SessionEvent::FollowUpDue { message_id }).await;
                        }
                    }
                });
            }
            SchedulerEffect::SendFollowUp { message_id } => {
                let text = scheduler::pick_follow_up(self.session.persona().mood, &mut rand::thread_rng());
                let delay = typing_delay(&self.config.reply_delay_ms);
                self.session.begin_follow_up(message_id.clone());
                self.broadcast(SessionUpdate::Typing { active: true });

                let event_tx = self.event_tx.clone();
                let cancel = self.cancel.child_token();
                tokio::spawn(async move {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {}
                        () = tokio::time::sleep(delay) => {
                            let _ = event_tx.send(SessionEvent::FollowUpReady { message_id, text }).await;
                        }
                    }
                });
            }
        }
    }

    fn broadcast(&self, update: SessionUpdate) {
        // No subscribers is fine
        let _ = self.broadcast_tx.send(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristic::ContextCategory;
    use crate::llm::{LlmErrorKind, LlmResponse};
    use crate::message::Sender;
    use crate::persona::PersonaCatalog;
    use crate::scheduler::{follow_up_templates, FollowUpPhase};
    use crate::session::testing::{FailingLlmClient, MockLlmClient};
    use std::time::Duration;

    fn persona(id: &str) -> Arc<Persona> {
        PersonaCatalog::with_defaults().get(id).unwrap()
    }

    fn spawn_with(llm: Arc<dyn crate::llm::LlmService>, config: EngineConfig, persona_id: &str) -> SessionHandle {
        let generator = ResponseGenerator::new(llm, &config);
        SessionRuntime::spawn(persona(persona_id), Arc::new(config), generator)
    }

    /// Wait for the next persona message on the broadcast channel
    async fn next_persona_message(rx: &mut broadcast::Receiver<SessionUpdate>) -> Message {
        loop {
            match rx.recv().await.expect("session ended unexpectedly") {
                SessionUpdate::Message(m) if m.sender == Sender::Persona => return m,
                _ => {}
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hey_there_with_failing_model() {
        let handle = spawn_with(
            Arc::new(FailingLlmClient::new(LlmErrorKind::ServerError)),
            EngineConfig::default(),
            "1",
        );
        let mut rx = handle.subscribe();

        let sent = handle.send_message("hey there").await.unwrap();
        assert_eq!(sent.sender, Sender::User);

        let reply = next_persona_message(&mut rx).await;
        assert!(ContextCategory::Greeting.templates().contains(&reply.content.as_str()));
        assert_eq!(reply.persona_id.as_deref(), Some("1"));

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.messages.len(), 2);
        assert!(!snapshot.generating);
        assert_eq!(snapshot.follow_up, FollowUpPhase::Armed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_sends_interleave() {
        let llm = Arc::new(MockLlmClient::new());
        for i in 0..5 {
            llm.queue_response(LlmResponse::text(format!("reply {i}")));
        }
        let handle = spawn_with(llm.clone(), EngineConfig::default(), "2");
        let mut rx = handle.subscribe();

        for i in 0..5 {
            handle.send_message(format!("message {i}")).await.unwrap();
            next_persona_message(&mut rx).await;
        }

        let messages = handle.snapshot().await.unwrap().messages;
        assert_eq!(messages.len(), 10);
        for (i, pair) in messages.chunks(2).enumerate() {
            assert_eq!(pair[0].sender, Sender::User);
            assert_eq!(pair[0].content, format!("message {i}"));
            assert_eq!(pair[1].sender, Sender::Persona);
            assert_eq!(pair[1].content, format!("reply {i}"));
        }
        assert!(messages.windows(2).all(|w| w[0].sequence < w[1].sequence));
        assert_eq!(llm.recorded_requests().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prompt_excludes_current_turn_from_transcript() {
        let llm = Arc::new(MockLlmClient::new());
        llm.queue_response(LlmResponse::text("first"));
        llm.queue_response(LlmResponse::text("second"));
        let handle = spawn_with(llm.clone(), EngineConfig::default(), "2");
        let mut rx = handle.subscribe();

        handle.send_message("opening line").await.unwrap();
        next_persona_message(&mut rx).await;
        handle.send_message("follow on").await.unwrap();
        next_persona_message(&mut rx).await;

        let requests = llm.recorded_requests();
        assert!(requests[0].prompt.contains("This is the start of your conversation."));
        assert!(requests[1].prompt.contains("User: opening line\nLuna: first\n"));
        assert!(requests[1].prompt.contains("User just said: \"follow on\""));
        assert!(!requests[1].prompt.contains("User: follow on"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejects_while_generating_and_empty() {
        let llm = Arc::new(MockLlmClient::new().with_delay(Duration::from_secs(5)));
        llm.queue_response(LlmResponse::text("slow reply"));
        let handle = spawn_with(llm, EngineConfig::default(), "3");

        assert_eq!(handle.send_message("   ").await, Err(SessionError::EmptyMessage));
        handle.send_message("first").await.unwrap();
        assert_eq!(handle.send_message("second").await, Err(SessionError::Busy));

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.messages.len(), 1);
        assert!(snapshot.generating);
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_up_after_inactivity() {
        let llm = Arc::new(MockLlmClient::new());
        llm.queue_response(LlmResponse::text("tell me about your day"));
        let handle = spawn_with(llm, EngineConfig::default(), "2");
        let mut rx = handle.subscribe();

        handle.send_message("hello").await.unwrap();
        let reply = next_persona_message(&mut rx).await;
        let replied_at = Instant::now();

        let follow_up = next_persona_message(&mut rx).await;
        let waited = replied_at.elapsed();
        assert!(waited >= Duration::from_secs(35), "follow-up came after {waited:?}");
        assert!(waited <= Duration::from_millis(36_500), "follow-up came after {waited:?}");
        assert!(follow_up_templates(persona("2").mood).contains(&follow_up.content.as_str()));
        assert!(follow_up.sequence > reply.sequence);

        // The follow-up re-arms the watchdog for another cycle
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.messages.len(), 3);
        assert_eq!(snapshot.follow_up, FollowUpPhase::Armed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_message_cancels_follow_up() {
        let llm = Arc::new(MockLlmClient::new());
        llm.queue_response(LlmResponse::text("one"));
        llm.queue_response(LlmResponse::text("two"));
        let handle = spawn_with(llm, EngineConfig::default(), "2");
        let mut rx = handle.subscribe();

        handle.send_message("hello").await.unwrap();
        next_persona_message(&mut rx).await;

        tokio::time::sleep(Duration::from_secs(20)).await;
        handle.send_message("still here").await.unwrap();
        let second = next_persona_message(&mut rx).await;
        assert_eq!(second.content, "two");

        // 20s later the first timer would have fired; the second has not yet
        tokio::time::sleep(Duration::from_secs(20)).await;
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.messages.len(), 4);
        let follow_ups = follow_up_templates(persona("2").mood);
        assert!(snapshot.messages.iter().all(|m| !follow_ups.contains(&m.content.as_str())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_follow_up_when_check_precedes_threshold() {
        let config = EngineConfig {
            check_interval: Duration::from_secs(20),
            inactivity_threshold: Duration::from_secs(30),
            ..EngineConfig::default()
        };
        let llm = Arc::new(MockLlmClient::new());
        llm.queue_response(LlmResponse::text("hi!"));
        let handle = spawn_with(llm, config, "1");
        let mut rx = handle.subscribe();

        handle.send_message("hello").await.unwrap();
        next_persona_message(&mut rx).await;

        tokio::time::sleep(Duration::from_secs(120)).await;
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.follow_up, FollowUpPhase::Armed);
    }

    #[tokio::test]
    async fn test_close_wins_over_queued_reply() {
        for _ in 0..100 {
            let config = Arc::new(EngineConfig::instant());
            let generator = ResponseGenerator::new(Arc::new(FailingLlmClient::new(LlmErrorKind::Network)), &config);
            let (mut runtime, handle) = SessionRuntime::new(persona("1"), config, generator);
            let mut rx = handle.subscribe();

            runtime.session.begin_turn("hi".to_string());
            let turn = runtime.session.turn();
            runtime
                .event_tx
                .try_send(SessionEvent::GenerationComplete {
                    turn,
                    reply: crate::generator::Reply {
                        text: "late".to_string(),
                        source: crate::generator::ReplySource::Model,
                    },
                })
                .unwrap();

            handle.close();
            runtime.run().await;

            assert_eq!(rx.recv().await.unwrap(), SessionUpdate::Ended);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_discards_in_flight_reply() {
        let llm = Arc::new(MockLlmClient::new().with_delay(Duration::from_secs(5)));
        llm.queue_response(LlmResponse::text("never shown"));
        let handle = spawn_with(llm, EngineConfig::default(), "1");
        let mut rx = handle.subscribe();

        handle.send_message("hello").await.unwrap();
        handle.close();

        let mut saw_reply = false;
        loop {
            match rx.recv().await {
                Ok(SessionUpdate::Message(m)) if m.sender == Sender::Persona => saw_reply = true,
                Ok(SessionUpdate::Ended) | Err(_) => break,
                Ok(_) => {}
            }
        }
        assert!(!saw_reply);
        assert!(handle.is_closed());
        assert_eq!(handle.send_message("anyone?").await, Err(SessionError::Closed));
    }
}
