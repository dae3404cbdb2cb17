use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

/// One turn in the conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: u64,
    pub sender: Sender,
    pub text: String,
    /// Local hour:minute, ready for display.
    pub timestamp: String,
    pub created_at: DateTime<Utc>,
    /// Data URI of the image the user attached, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_attachment: Option<String>,
    #[serde(default)]
    pub is_diagnostic: bool,
}

impl Message {
    pub fn user(id: u64, text: impl Into<String>, image_attachment: Option<String>) -> Self {
        Self::new(id, Sender::User, text.into(), image_attachment, false)
    }

    pub fn assistant(id: u64, text: impl Into<String>, is_diagnostic: bool) -> Self {
        Self::new(id, Sender::Assistant, text.into(), None, is_diagnostic)
    }

    fn new(
        id: u64,
        sender: Sender,
        text: String,
        image_attachment: Option<String>,
        is_diagnostic: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            sender,
            text,
            timestamp: display_time(now.with_timezone(&Local)),
            created_at: now,
            image_attachment,
            is_diagnostic,
        }
    }
}

/// `HH:MM` on the 24-hour clock for every language and OS locale. The chat
/// shows the same clock to Spanish and English farmers.
pub fn display_time(at: DateTime<Local>) -> String {
    at.format("%H:%M").to_string()
}

/// Everything the chat view needs to redraw itself.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSnapshot {
    pub session_id: String,
    pub messages: Vec<Message>,
    pub input: String,
    pub composing: bool,
}
