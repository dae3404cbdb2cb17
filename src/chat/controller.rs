use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::diagnosis::image::{self, EncodedImage};
use crate::diagnosis::{is_diagnostic_reply, DiagnosisRequest, DiagnosisService, IMAGE_ANALYSIS_PROMPT};
use crate::error::{AppError, AppResult};
use crate::i18n::{self, ChatStrings};
use crate::models::message::{ChatSnapshot, Message};
use crate::models::settings::Language;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComposeState {
    Idle,
    Composing,
}

/// Emitted on every change the chat view has to react to.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ConversationEvent {
    MessageAppended(Message),
    ComposingChanged { composing: bool },
}

struct ChatLog {
    messages: Vec<Message>,
    next_id: u64,
    input: String,
    /// Turns whose reply has not been appended yet, queued or in flight.
    pending: usize,
    language: Language,
}

/// A user turn that has been logged and still owes an assistant reply.
struct OpenTurn {
    request: DiagnosisRequest,
    language: Language,
    from_image: bool,
    done: oneshot::Sender<()>,
}

struct Shared<S> {
    service: S,
    session_id: String,
    log: Mutex<ChatLog>,
    events: broadcast::Sender<ConversationEvent>,
}

/// Owns one chat session: the append-only message log, the input buffer and
/// the composing state.
///
/// Turns are queued, in log order, to a worker task that makes the remote
/// calls one at a time, so replies land in the order the user submitted.
/// The worker owns each turn once it is logged: dropping a `submit_*`
/// future stops the wait, not the reply. The log lock is never held across
/// an await.
pub struct ConversationController<S: DiagnosisService> {
    shared: Arc<Shared<S>>,
    turns: mpsc::UnboundedSender<OpenTurn>,
    // Taken when the first turn spawns the worker.
    worker: Mutex<Option<mpsc::UnboundedReceiver<OpenTurn>>>,
}

impl<S: DiagnosisService> ConversationController<S> {
    /// Starts a session greeted in `language`.
    pub fn new(service: S, language: Language) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (turns, queued) = mpsc::unbounded_channel();
        let greeting = Message::assistant(1, i18n::chat_strings(language).greeting, false);
        let session_id = uuid::Uuid::new_v4().to_string();
        log::info!("Chat session {} started ({})", session_id, language);

        Self {
            shared: Arc::new(Shared {
                service,
                session_id,
                log: Mutex::new(ChatLog {
                    messages: vec![greeting],
                    next_id: 2,
                    input: String::new(),
                    pending: 0,
                    language,
                }),
                events,
            }),
            turns,
            worker: Mutex::new(Some(queued)),
        }
    }

    pub fn service(&self) -> &S {
        &self.shared.service
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.shared.events.subscribe()
    }

    pub fn language(&self) -> Language {
        self.shared.lock_log().language
    }

    /// Switches the language used for captions, chips and fallbacks of
    /// future turns. Messages already in the log are left as they are.
    pub fn set_language(&self, language: Language) {
        let mut log = self.shared.lock_log();
        if log.language != language {
            log::info!(
                "Chat session {} language: {} -> {}",
                self.shared.session_id,
                log.language,
                language
            );
            log.language = language;
        }
    }

    pub fn strings(&self) -> &'static ChatStrings {
        i18n::chat_strings(self.language())
    }

    pub fn messages(&self) -> Vec<Message> {
        self.shared.lock_log().messages.clone()
    }

    pub fn input(&self) -> String {
        self.shared.lock_log().input.clone()
    }

    pub fn set_input(&self, text: impl Into<String>) {
        self.shared.lock_log().input = text.into();
    }

    pub fn compose_state(&self) -> ComposeState {
        if self.shared.lock_log().pending > 0 {
            ComposeState::Composing
        } else {
            ComposeState::Idle
        }
    }

    pub fn is_composing(&self) -> bool {
        self.compose_state() == ComposeState::Composing
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        let log = self.shared.lock_log();
        ChatSnapshot {
            session_id: self.shared.session_id.clone(),
            messages: log.messages.clone(),
            input: log.input.clone(),
            composing: log.pending > 0,
        }
    }

    /// Fills the input buffer with suggestion chip `index`. Never submits.
    pub fn select_suggestion(&self, index: usize) -> AppResult<String> {
        let mut log = self.shared.lock_log();
        let chip = i18n::chat_strings(log.language)
            .suggestions
            .get(index)
            .ok_or_else(|| AppError::NotFound(format!("Suggestion {index}")))?;
        log.input = (*chip).to_string();
        Ok(log.input.clone())
    }

    /// Submits the input buffer and waits for the reply. Returns `false`,
    /// leaving everything untouched, when the buffer is blank.
    pub async fn submit_input(&self) -> bool {
        let done = {
            let mut log = self.shared.lock_log();
            if log.input.trim().is_empty() {
                return false;
            }
            let raw = std::mem::take(&mut log.input);
            self.open_text_turn(&mut log, &raw)
        };
        self.wait_for_reply(done).await;
        true
    }

    /// Submits `text` directly, clearing the input buffer, and waits for the
    /// reply. Blank text is ignored and returns `false`.
    pub async fn submit_text(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        let done = {
            let mut log = self.shared.lock_log();
            log.input.clear();
            self.open_text_turn(&mut log, text)
        };
        self.wait_for_reply(done).await;
        true
    }

    /// Reads the picked file and runs an image turn. See [`Self::upload_image`].
    pub async fn upload_image_file(&self, path: &Path) -> bool {
        let encoded = image::read_upload(path).await;
        self.run_image_turn(encoded).await
    }

    /// Runs an image turn for an in-memory upload.
    ///
    /// An unusable file appends a localized error reply instead, without a
    /// user turn or remote call, and returns `false`.
    pub async fn upload_image(&self, file_name: &str, bytes: &[u8]) -> bool {
        let encoded = image::encode_upload(file_name, bytes);
        self.run_image_turn(encoded).await
    }

    async fn run_image_turn(&self, encoded: AppResult<EncodedImage>) -> bool {
        let done = {
            let mut log = self.shared.lock_log();
            match encoded {
                Ok(image) => self.open_image_turn(&mut log, image),
                Err(e) => {
                    log::warn!("Rejected image upload in session {}: {}", self.shared.session_id, e);
                    let text = i18n::chat_strings(log.language).image_error;
                    self.shared.append(&mut log, |id| Message::assistant(id, text, false));
                    return false;
                }
            }
        };
        self.wait_for_reply(done).await;
        true
    }

    fn open_text_turn(&self, log: &mut ChatLog, raw: &str) -> oneshot::Receiver<()> {
        let text = raw.trim().to_string();
        log::info!("Session {}: text turn ({} chars)", self.shared.session_id, text.len());
        self.shared.append(log, |id| Message::user(id, text.clone(), None));
        self.enqueue(log, DiagnosisRequest::text(text), false)
    }

    fn open_image_turn(&self, log: &mut ChatLog, image: EncodedImage) -> oneshot::Receiver<()> {
        log::info!(
            "Session {}: image turn ({} base64 chars)",
            self.shared.session_id,
            image.base64.len()
        );
        let caption = i18n::chat_strings(log.language).image_caption;
        let EncodedImage { base64, data_uri } = image;
        self.shared.append(log, |id| Message::user(id, caption, Some(data_uri)));
        self.enqueue(log, DiagnosisRequest::with_image(IMAGE_ANALYSIS_PROMPT, base64), true)
    }

    /// Hands a logged turn to the worker. Called with the log locked so the
    /// queue order is the log order.
    fn enqueue(&self, log: &mut ChatLog, request: DiagnosisRequest, from_image: bool) -> oneshot::Receiver<()> {
        log.pending += 1;
        if log.pending == 1 {
            self.shared.emit(ConversationEvent::ComposingChanged { composing: true });
        }

        let (done, reply) = oneshot::channel();
        let turn = OpenTurn {
            request,
            language: log.language,
            from_image,
            done,
        };
        if let Err(mpsc::error::SendError(turn)) = self.turns.send(turn) {
            // Only reachable if the worker died; the turn still gets a reply.
            log::error!("Chat session {} has no worker; replying with fallback", self.shared.session_id);
            let fallback = i18n::chat_strings(turn.language).error_fallback;
            self.shared.finish_turn(log, fallback.to_string(), turn.from_image);
        }
        reply
    }

    async fn wait_for_reply(&self, reply: oneshot::Receiver<()>) {
        self.ensure_worker();
        // An error only means the worker is gone; its turns were answered.
        let _ = reply.await;
    }

    fn ensure_worker(&self) {
        let queued = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(queued) = queued {
            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move {
                log::debug!("Chat session {} worker started", shared.session_id);
                shared.answer_turns(queued).await;
            });
        }
    }
}

impl<S: DiagnosisService> Shared<S> {
    /// Answers queued turns one at a time until the controller is dropped.
    async fn answer_turns(&self, mut queued: mpsc::UnboundedReceiver<OpenTurn>) {
        while let Some(turn) = queued.recv().await {
            let reply = self.service.diagnose(turn.request, turn.language).await;
            {
                let mut log = self.lock_log();
                self.finish_turn(&mut log, reply, turn.from_image);
            }
            let _ = turn.done.send(());
        }
    }

    fn finish_turn(&self, log: &mut ChatLog, reply: String, from_image: bool) {
        let is_diagnostic = from_image || is_diagnostic_reply(&reply);
        self.append(log, |id| Message::assistant(id, reply, is_diagnostic));
        log.pending -= 1;
        if log.pending == 0 {
            self.emit(ConversationEvent::ComposingChanged { composing: false });
        }
    }

    fn append(&self, log: &mut ChatLog, build: impl FnOnce(u64) -> Message) {
        let message = build(log.next_id);
        log.next_id += 1;
        log.messages.push(message.clone());
        self.emit(ConversationEvent::MessageAppended(message));
    }

    fn emit(&self, event: ConversationEvent) {
        // No subscribers is fine: nobody is looking at the chat.
        let _ = self.events.send(event);
    }

    fn lock_log(&self) -> MutexGuard<'_, ChatLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::Sender;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::Notify;

    const TINY_JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0xFF, 0xD9];

    /// In-process stand-in for the remote model. Replies `reply to <prompt>`,
    /// or the fallback when told to fail. Prompts with a gate wait for it.
    #[derive(Default)]
    struct ScriptedService {
        fail: bool,
        delay: Option<Duration>,
        gates: HashMap<String, Arc<Notify>>,
        replies: HashMap<String, String>,
        calls: Mutex<Vec<DiagnosisRequest>>,
    }

    impl ScriptedService {
        fn failing() -> Self {
            Self { fail: true, ..Self::default() }
        }

        fn slow(delay: Duration) -> Self {
            Self { delay: Some(delay), ..Self::default() }
        }

        fn gated(prompt: &str) -> (Self, Arc<Notify>) {
            let gate = Arc::new(Notify::new());
            let mut service = Self::default();
            service.gates.insert(prompt.to_string(), gate.clone());
            (service, gate)
        }

        fn replying(prompt: &str, reply: &str) -> Self {
            let mut service = Self::default();
            service.replies.insert(prompt.to_string(), reply.to_string());
            service
        }

        fn calls(&self) -> Vec<DiagnosisRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl DiagnosisService for ScriptedService {
        async fn diagnose(&self, request: DiagnosisRequest, language: Language) -> String {
            self.calls.lock().unwrap().push(request.clone());
            if let Some(gate) = self.gates.get(&request.prompt_text) {
                gate.notified().await;
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return i18n::chat_strings(language).error_fallback.to_string();
            }
            self.replies
                .get(&request.prompt_text)
                .cloned()
                .unwrap_or_else(|| format!("reply to {}", request.prompt_text))
        }
    }

    fn controller(service: ScriptedService, language: Language) -> ConversationController<ScriptedService> {
        ConversationController::new(service, language)
    }

    async fn wait_until_idle(chat: &ConversationController<ScriptedService>) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while chat.is_composing() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("chat never went idle");
    }

    #[test]
    fn test_new_session_is_greeted() {
        let chat = controller(ScriptedService::default(), Language::En);
        let messages = chat.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender, Sender::Assistant);
        assert_eq!(messages[0].text, i18n::chat_strings(Language::En).greeting);
        assert!(!messages[0].is_diagnostic);
        assert_eq!(chat.compose_state(), ComposeState::Idle);
    }

    #[tokio::test]
    async fn test_text_submit_appends_user_then_assistant() {
        let chat = controller(ScriptedService::default(), Language::En);
        chat.set_input("My potato leaves have brown spots");

        assert!(chat.submit_input().await);

        let messages = chat.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].sender, Sender::User);
        assert_eq!(messages[1].text, "My potato leaves have brown spots");
        assert!(messages[1].image_attachment.is_none());
        assert_eq!(messages[2].sender, Sender::Assistant);
        assert!(!messages[2].text.is_empty());
        assert_eq!(chat.input(), "");
        assert_eq!(chat.compose_state(), ComposeState::Idle);

        let calls = chat.service().calls();
        assert_eq!(calls, vec![DiagnosisRequest::text("My potato leaves have brown spots")]);
    }

    #[tokio::test]
    async fn test_blank_submit_is_ignored() {
        let chat = controller(ScriptedService::default(), Language::Es);
        chat.set_input("   \n\t ");

        assert!(!chat.submit_input().await);
        assert!(!chat.submit_text("").await);

        assert_eq!(chat.messages().len(), 1);
        assert!(chat.service().calls().is_empty());
        assert_eq!(chat.input(), "   \n\t ");
    }

    #[tokio::test]
    async fn test_submitted_text_is_trimmed() {
        let chat = controller(ScriptedService::default(), Language::En);
        assert!(chat.submit_text("  yellow halo around spots \n").await);
        assert_eq!(chat.messages()[1].text, "yellow halo around spots");
        assert_eq!(chat.service().calls()[0].prompt_text, "yellow halo around spots");
    }

    #[tokio::test]
    async fn test_diagnostic_flag_from_reply() {
        let service = ScriptedService::replying("spots", "**Diagnosis:** Early Blight\nConfidence: high");
        let chat = controller(service, Language::En);
        chat.submit_text("spots").await;
        chat.submit_text("thanks").await;

        let messages = chat.messages();
        assert!(messages[2].is_diagnostic);
        assert!(!messages[4].is_diagnostic);
    }

    #[tokio::test]
    async fn test_suggestion_fills_buffer_without_sending() {
        let chat = controller(ScriptedService::default(), Language::En);
        let chip = i18n::chat_strings(Language::En).suggestions[1];

        assert_eq!(chat.select_suggestion(1).unwrap(), chip);
        assert_eq!(chat.input(), chip);
        assert_eq!(chat.messages().len(), 1);
        assert!(chat.service().calls().is_empty());

        assert!(chat.submit_input().await);
        assert_eq!(chat.messages()[1].text, chip);
    }

    #[test]
    fn test_unknown_suggestion() {
        let chat = controller(ScriptedService::default(), Language::En);
        chat.set_input("draft");
        assert!(matches!(chat.select_suggestion(99), Err(AppError::NotFound(_))));
        assert_eq!(chat.input(), "draft");
    }

    #[tokio::test]
    async fn test_image_upload_turn() {
        let chat = controller(ScriptedService::replying(IMAGE_ANALYSIS_PROMPT, "Looks healthy."), Language::En);

        assert!(chat.upload_image("leaf.jpg", TINY_JPEG).await);

        let messages = chat.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].text, "Analyze this leaf, please.");
        let preview = messages[1].image_attachment.as_deref().unwrap();
        assert!(preview.starts_with("data:image/jpeg;base64,"));
        // Image turns are diagnostic whatever the reply says.
        assert!(messages[2].is_diagnostic);

        let calls = chat.service().calls();
        assert_eq!(calls[0].prompt_text, IMAGE_ANALYSIS_PROMPT);
        assert!(preview.ends_with(calls[0].image_data.as_deref().unwrap()));
    }

    #[tokio::test]
    async fn test_failed_image_turn_is_still_diagnostic() {
        let chat = controller(ScriptedService::failing(), Language::En);

        assert!(chat.upload_image("leaf.jpg", TINY_JPEG).await);

        let reply = chat.messages().pop().unwrap();
        assert_eq!(reply.sender, Sender::Assistant);
        assert_eq!(reply.text, i18n::chat_strings(Language::En).error_fallback);
        assert!(reply.is_diagnostic);
        assert_eq!(chat.compose_state(), ComposeState::Idle);
    }

    #[tokio::test]
    async fn test_image_caption_follows_language() {
        let chat = controller(ScriptedService::default(), Language::Es);
        chat.upload_image("hoja.jpg", TINY_JPEG).await;
        assert_eq!(chat.messages()[1].text, "Analiza esta hoja, por favor.");
        // The model prompt stays English.
        assert_eq!(chat.service().calls()[0].prompt_text, IMAGE_ANALYSIS_PROMPT);
    }

    #[tokio::test]
    async fn test_unreadable_image_appends_error_reply() {
        let chat = controller(ScriptedService::default(), Language::En);

        assert!(!chat.upload_image("leaf.png", b"\x89PNG\r\n\x1a\n").await);
        assert!(!chat.upload_image_file(Path::new("/nonexistent/leaf.jpg")).await);

        let messages = chat.messages();
        assert_eq!(messages.len(), 3);
        for msg in &messages[1..] {
            assert_eq!(msg.sender, Sender::Assistant);
            assert_eq!(msg.text, i18n::chat_strings(Language::En).image_error);
        }
        assert!(chat.service().calls().is_empty());
        assert_eq!(chat.compose_state(), ComposeState::Idle);
    }

    #[tokio::test]
    async fn test_upload_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leaf.jpg");
        std::fs::write(&path, TINY_JPEG).unwrap();

        let chat = controller(ScriptedService::default(), Language::En);
        assert!(chat.upload_image_file(&path).await);
        assert!(chat.messages()[1].image_attachment.is_some());
    }

    #[tokio::test]
    async fn test_remote_failure_yields_fallback_and_idle() {
        let chat = controller(ScriptedService::failing(), Language::Es);
        chat.submit_text("manchas marrones").await;

        let messages = chat.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].text, i18n::chat_strings(Language::Es).error_fallback);
        assert_eq!(chat.compose_state(), ComposeState::Idle);
    }

    #[tokio::test]
    async fn test_reply_arrives_after_caller_stops_waiting() {
        let chat = controller(ScriptedService::slow(Duration::from_millis(200)), Language::En);

        let waited = tokio::time::timeout(Duration::from_millis(20), chat.submit_text("spots")).await;
        assert!(waited.is_err());
        assert_eq!(chat.messages().len(), 2);
        assert!(chat.is_composing());

        wait_until_idle(&chat).await;
        let messages = chat.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].sender, Sender::Assistant);
        assert_eq!(messages[2].text, "reply to spots");
    }

    #[tokio::test]
    async fn test_reply_arrives_after_submitting_task_is_aborted() {
        let chat = Arc::new(controller(ScriptedService::slow(Duration::from_millis(100)), Language::En));

        let task = tokio::spawn({
            let chat = chat.clone();
            async move { chat.submit_text("spots").await }
        });
        while chat.messages().len() < 2 {
            tokio::task::yield_now().await;
        }
        task.abort();

        wait_until_idle(&chat).await;
        let senders: Vec<Sender> = chat.messages().iter().map(|m| m.sender).collect();
        assert_eq!(senders, vec![Sender::Assistant, Sender::User, Sender::Assistant]);
    }

    #[tokio::test]
    async fn test_ids_strictly_increase() {
        let chat = controller(ScriptedService::default(), Language::En);
        chat.submit_text("one").await;
        chat.upload_image("leaf.jpg", TINY_JPEG).await;
        chat.upload_image("bad.gif", b"GIF89a").await;
        chat.submit_text("two").await;

        let ids: Vec<u64> = chat.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids.len(), 8);
        assert!(ids.windows(2).all(|w| w[0] < w[1]), "ids: {ids:?}");
    }

    #[tokio::test]
    async fn test_language_switch_keeps_history() {
        let chat = controller(ScriptedService::failing(), Language::Es);
        chat.set_language(Language::En);
        chat.submit_text("spots").await;

        let messages = chat.messages();
        assert_eq!(messages[0].text, i18n::chat_strings(Language::Es).greeting);
        assert_eq!(messages[2].text, i18n::chat_strings(Language::En).error_fallback);
        assert_eq!(chat.strings().send, "Send");
    }

    #[tokio::test]
    async fn test_rapid_submits_reply_in_submission_order() {
        let (service, gate) = ScriptedService::gated("A");
        let chat = Arc::new(controller(service, Language::En));

        let first = tokio::spawn({
            let chat = chat.clone();
            async move { chat.submit_text("A").await }
        });
        while chat.messages().len() < 2 {
            tokio::task::yield_now().await;
        }
        let second = tokio::spawn({
            let chat = chat.clone();
            async move { chat.submit_text("B").await }
        });
        while chat.messages().len() < 3 || chat.service().calls().is_empty() {
            tokio::task::yield_now().await;
        }
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        // Both user turns are logged; "B" is queued behind "A".
        assert!(chat.is_composing());
        assert_eq!(chat.service().calls().len(), 1);

        gate.notify_one();
        assert!(first.await.unwrap());
        assert!(second.await.unwrap());

        let log: Vec<(Sender, String)> = chat
            .messages()
            .into_iter()
            .skip(1)
            .map(|m| (m.sender, m.text))
            .collect();
        assert_eq!(
            log,
            vec![
                (Sender::User, "A".to_string()),
                (Sender::User, "B".to_string()),
                (Sender::Assistant, "reply to A".to_string()),
                (Sender::Assistant, "reply to B".to_string()),
            ]
        );
        assert_eq!(chat.compose_state(), ComposeState::Idle);
    }

    #[tokio::test]
    async fn test_events_follow_the_log() {
        let chat = controller(ScriptedService::default(), Language::En);
        let mut rx = chat.subscribe();
        chat.submit_text("spots").await;

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(match event {
                ConversationEvent::MessageAppended(m) => format!("message:{}", m.id),
                ConversationEvent::ComposingChanged { composing } => format!("composing:{composing}"),
            });
        }
        assert_eq!(seen, vec!["message:2", "composing:true", "message:3", "composing:false"]);
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(ConversationEvent::ComposingChanged { composing: true }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "composingChanged", "composing": true}));
    }
}
