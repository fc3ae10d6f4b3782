use crate::backends::GenerationBackend;
use crate::parse::parse_reply;
use crate::prompt;
use duelchat_core::{ChatReply, DuelchatError, DuelchatResult, Persona, Role, Transcript, Turn};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Acknowledgement committed when the backend fails during initialization.
const FALLBACK_ACK: &str = "Understood. I will stay in character.";
/// Reaction committed when the backend fails on the opponent introduction.
const FALLBACK_REACTION: &str = "So you are my opponent. Let us see what you are made of.";
/// Fixed analysis returned when the backend fails on an analysis turn.
const FALLBACK_ANALYSIS: &str = "I cannot analyze the current situation.";

/// Lifecycle state of one conversation.
///
/// `Ready` is re-entrant: chat and analysis actions leave it unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Initializing,
    Ready,
    Terminated,
}

/// Per-session finite-state machine driving initialization, chat turns, and
/// situational analyses. Owns the session's transcript.
///
/// The engine is not internally synchronized: the session store serializes
/// access through a per-session lock, so at most one transition runs at a
/// time. A caller-supplied deadline bounds the backend call only; if it
/// elapses, the transition aborts without committing any turn.
pub struct ConversationEngine {
    persona: Persona,
    opponent: Persona,
    language: String,
    transcript: Transcript,
    state: Lifecycle,
    correlation_id: Uuid,
}

impl ConversationEngine {
    /// Creates an uninitialized engine. No backend call happens here;
    /// initialization runs lazily on the first action.
    pub fn new(persona: Persona, opponent: Persona, language: impl Into<String>) -> Self {
        Self {
            persona,
            opponent,
            language: language.into(),
            transcript: Transcript::new(),
            state: Lifecycle::Uninitialized,
            correlation_id: Uuid::new_v4(),
        }
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state == Lifecycle::Terminated
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn opponent(&self) -> &Persona {
        &self.opponent
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Internal correlation identity for the current conversation run;
    /// replaced on every [`ConversationEngine::reset`].
    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// Runs initialization exactly once: persona intro, backend
    /// acknowledgement, synthesized opponent intro, backend reaction.
    ///
    /// Backend failures are recovered with fixed fallback turns and the
    /// session still becomes `Ready`. An elapsed deadline aborts the whole
    /// initialization with nothing committed.
    pub async fn ensure_initialized(
        &mut self,
        backend: &dyn GenerationBackend,
        deadline: Option<Duration>,
    ) -> DuelchatResult<()> {
        match self.state {
            Lifecycle::Ready => return Ok(()),
            Lifecycle::Terminated => {
                return Err(DuelchatError::Internal(
                    "conversation already terminated".to_string(),
                ))
            }
            Lifecycle::Uninitialized | Lifecycle::Initializing => {}
        }
        self.state = Lifecycle::Initializing;

        let intro = prompt::persona_intro(&self.persona, &self.language);
        let request = self.request_with(&[(Role::System, intro.clone())]);
        let ack = match call_backend(backend, &request, deadline).await {
            Ok(text) => text,
            Err(DuelchatError::DeadlineExceeded) => {
                self.state = Lifecycle::Uninitialized;
                return Err(DuelchatError::DeadlineExceeded);
            }
            Err(err) => {
                warn!(correlation_id = %self.correlation_id, error = %err,
                      "persona introduction failed, committing fallback acknowledgement");
                FALLBACK_ACK.to_string()
            }
        };

        let opponent_intro = prompt::opponent_intro(&self.opponent);
        let request = self.request_with(&[
            (Role::System, intro.clone()),
            (Role::Assistant, ack.clone()),
            (Role::User, opponent_intro.clone()),
        ]);
        let reaction = match call_backend(backend, &request, deadline).await {
            Ok(text) => text,
            Err(DuelchatError::DeadlineExceeded) => {
                self.state = Lifecycle::Uninitialized;
                return Err(DuelchatError::DeadlineExceeded);
            }
            Err(err) => {
                warn!(correlation_id = %self.correlation_id, error = %err,
                      "opponent introduction failed, committing fallback reaction");
                FALLBACK_REACTION.to_string()
            }
        };

        // Commit the whole introduction sequence at once.
        self.transcript.append(Role::System, intro);
        self.transcript.append(Role::Assistant, ack);
        self.transcript.append(Role::User, opponent_intro);
        self.transcript.append(Role::Assistant, reaction);
        self.state = Lifecycle::Ready;

        info!(
            correlation_id = %self.correlation_id,
            persona = %self.persona.role,
            opponent = %self.opponent.role,
            "conversation initialized"
        );
        Ok(())
    }

    /// One chat turn: user envelope in, structured `{speech, emotion}` out.
    ///
    /// Backend failures never reach the caller: a fixed fallback reply is
    /// committed and returned as a successful-but-degraded result.
    pub async fn chat(
        &mut self,
        backend: &dyn GenerationBackend,
        query: &str,
        deadline: Option<Duration>,
    ) -> DuelchatResult<ChatReply> {
        self.ensure_initialized(backend, deadline).await?;

        let envelope = prompt::chat_envelope(query, &self.opponent);
        let request = self.request_with(&[
            (Role::User, envelope.clone()),
            (Role::System, prompt::format_instruction(&self.language)),
        ]);

        let reply = match call_backend(backend, &request, deadline).await {
            Ok(raw) => parse_reply(&raw),
            Err(DuelchatError::DeadlineExceeded) => return Err(DuelchatError::DeadlineExceeded),
            Err(err) => {
                warn!(correlation_id = %self.correlation_id, error = %err,
                      "chat generation failed, returning fallback reply");
                ChatReply::fallback()
            }
        };

        self.transcript.append(Role::User, envelope);
        self.transcript
            .append(Role::Assistant, serde_json::to_string(&reply)?);

        debug!(
            correlation_id = %self.correlation_id,
            turns = self.transcript.len(),
            "chat turn committed"
        );
        Ok(reply)
    }

    /// One analysis turn: derive a free-form reaction from the opponent's
    /// actions. Failures are absorbed into a fixed fallback string.
    pub async fn analyze(
        &mut self,
        backend: &dyn GenerationBackend,
        opponent_actions: &str,
        deadline: Option<Duration>,
    ) -> DuelchatResult<String> {
        self.ensure_initialized(backend, deadline).await?;

        let instruction = prompt::analysis_instruction(opponent_actions);
        let request = self.request_with(&[(Role::System, instruction.clone())]);

        let analysis = match call_backend(backend, &request, deadline).await {
            Ok(raw) => raw,
            Err(DuelchatError::DeadlineExceeded) => return Err(DuelchatError::DeadlineExceeded),
            Err(err) => {
                warn!(correlation_id = %self.correlation_id, error = %err,
                      "analysis generation failed, returning fallback analysis");
                FALLBACK_ANALYSIS.to_string()
            }
        };

        self.transcript.append(Role::System, instruction);
        self.transcript.append(Role::Assistant, analysis.clone());
        Ok(analysis)
    }

    /// Discards the transcript and returns to `Uninitialized` under a fresh
    /// correlation identity. The next action re-runs initialization.
    pub fn reset(&mut self) {
        self.transcript.reset();
        self.state = Lifecycle::Uninitialized;
        self.correlation_id = Uuid::new_v4();
        info!(correlation_id = %self.correlation_id, "conversation reset");
    }

    /// Marks the conversation terminated. Every subsequent action fails.
    pub fn end(&mut self) {
        self.state = Lifecycle::Terminated;
    }

    /// The committed transcript plus pending per-call turns, as sent to the
    /// backend. Pending turns are only committed after the call succeeds or
    /// is classified as a recoverable failure.
    fn request_with(&self, pending: &[(Role, String)]) -> Vec<Turn> {
        let mut request: Vec<Turn> = self.transcript.turns().to_vec();
        let base = request.len() as u32;
        for (offset, (role, content)) in pending.iter().enumerate() {
            request.push(Turn::new(*role, content.clone(), base + offset as u32));
        }
        request
    }
}

async fn call_backend(
    backend: &dyn GenerationBackend,
    request: &[Turn],
    deadline: Option<Duration>,
) -> DuelchatResult<String> {
    match deadline {
        Some(limit) => match tokio::time::timeout(limit, backend.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(DuelchatError::DeadlineExceeded),
        },
        None => backend.generate(request).await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::backends::scripted::ScriptedBackend;
    use duelchat_core::PersonaCatalog;

    fn engine() -> ConversationEngine {
        let catalog = PersonaCatalog::builtin();
        ConversationEngine::new(
            catalog.get("Vargon").unwrap().clone(),
            catalog.get("Kagetsu").unwrap().clone(),
            "english",
        )
    }

    #[tokio::test]
    async fn test_initialization_runs_exactly_once() {
        let backend = ScriptedBackend::new();
        let mut engine = engine();

        engine.chat(&backend, "first", None).await.unwrap();
        assert_eq!(engine.state(), Lifecycle::Ready);
        // 2 init calls + 1 chat call.
        assert_eq!(backend.call_count(), 3);
        // 4 intro turns + user + assistant.
        assert_eq!(engine.transcript().len(), 6);

        engine.chat(&backend, "second", None).await.unwrap();
        assert_eq!(backend.call_count(), 4);
        assert_eq!(engine.transcript().len(), 8);
    }

    #[tokio::test]
    async fn test_intro_sequence_shape() {
        let backend = ScriptedBackend::with_replies(["ack line", "reaction line"]);
        let mut engine = engine();
        engine.ensure_initialized(&backend, None).await.unwrap();

        let turns = engine.transcript().turns();
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[0].role, Role::System);
        assert!(turns[0].content.contains("You are Vargon"));
        assert_eq!(turns[1].content, "ack line");
        assert_eq!(turns[2].role, Role::User);
        assert_eq!(turns[2].content, "I am Kagetsu of the human.");
        assert_eq!(turns[3].content, "reaction line");
    }

    #[tokio::test]
    async fn test_chat_returns_structured_reply() {
        let backend = ScriptedBackend::with_replies([
            "ack",
            "reaction",
            r#"{"speech": "Bow before me!", "emotion": "contempt"}"#,
        ]);
        let mut engine = engine();

        let reply = engine.chat(&backend, "hello", None).await.unwrap();
        assert_eq!(reply.speech, "Bow before me!");
        assert_eq!(reply.emotion, "contempt");

        // The committed assistant turn round-trips to the same reply.
        let last = engine.transcript().last().unwrap();
        let committed: ChatReply = serde_json::from_str(&last.content).unwrap();
        assert_eq!(committed, reply);
    }

    #[tokio::test]
    async fn test_backend_failure_becomes_degraded_success() {
        let backend = ScriptedBackend::new();
        let mut engine = engine();
        engine.ensure_initialized(&backend, None).await.unwrap();

        backend.set_failing(true);
        let reply = engine.chat(&backend, "hello", None).await.unwrap();
        assert_eq!(reply, ChatReply::fallback());
        // User envelope and fallback assistant turn were still committed.
        assert_eq!(engine.transcript().len(), 6);
    }

    #[tokio::test]
    async fn test_init_failure_commits_fallback_turns_and_becomes_ready() {
        let backend = ScriptedBackend::new();
        backend.set_failing(true);
        let mut engine = engine();

        engine.ensure_initialized(&backend, None).await.unwrap();
        assert_eq!(engine.state(), Lifecycle::Ready);
        let turns = engine.transcript().turns();
        assert_eq!(turns[1].content, FALLBACK_ACK);
        assert_eq!(turns[3].content, FALLBACK_REACTION);
    }

    #[tokio::test]
    async fn test_analysis_and_its_fallback() {
        let backend =
            ScriptedBackend::with_replies(["ack", "reaction", "They are preparing to strike."]);
        let mut engine = engine();

        let analysis = engine
            .analyze(&backend, "opponent drew their blade", None)
            .await
            .unwrap();
        assert_eq!(analysis, "They are preparing to strike.");
        let turns = engine.transcript().turns();
        assert!(turns[turns.len() - 2].content.contains("opponent drew their blade"));

        backend.set_failing(true);
        let analysis = engine.analyze(&backend, "opponent fled", None).await.unwrap();
        assert_eq!(analysis, FALLBACK_ANALYSIS);
    }

    #[tokio::test]
    async fn test_reset_forces_reinitialization() {
        let backend = ScriptedBackend::new();
        let mut engine = engine();
        engine.chat(&backend, "hello", None).await.unwrap();
        let first_correlation = engine.correlation_id();

        engine.reset();
        assert!(engine.transcript().is_empty());
        assert_eq!(engine.state(), Lifecycle::Uninitialized);
        assert_ne!(engine.correlation_id(), first_correlation);

        engine.chat(&backend, "again", None).await.unwrap();
        assert_eq!(engine.state(), Lifecycle::Ready);
        assert_eq!(engine.transcript().len(), 6);
    }

    #[tokio::test]
    async fn test_elapsed_deadline_commits_nothing() {
        let backend = ScriptedBackend::new();
        let mut engine = engine();
        engine.ensure_initialized(&backend, None).await.unwrap();
        let before = engine.transcript().len();

        backend.set_delay(Some(Duration::from_millis(200)));
        let err = engine
            .chat(&backend, "hello", Some(Duration::from_millis(10)))
            .await
            .unwrap_err();
        assert!(matches!(err, DuelchatError::DeadlineExceeded));
        assert_eq!(engine.transcript().len(), before);
    }

    #[tokio::test]
    async fn test_elapsed_deadline_during_init_leaves_uninitialized() {
        let backend = ScriptedBackend::new();
        backend.set_delay(Some(Duration::from_millis(200)));
        let mut engine = engine();

        let err = engine
            .chat(&backend, "hello", Some(Duration::from_millis(10)))
            .await
            .unwrap_err();
        assert!(matches!(err, DuelchatError::DeadlineExceeded));
        assert_eq!(engine.state(), Lifecycle::Uninitialized);
        assert!(engine.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_terminated_engine_rejects_actions() {
        let backend = ScriptedBackend::new();
        let mut engine = engine();
        engine.end();
        assert!(engine.is_terminated());
        assert!(engine.chat(&backend, "hello", None).await.is_err());
    }
}
