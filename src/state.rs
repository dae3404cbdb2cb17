use std::sync::Arc;

use rusqlite::Connection;

use crate::chat::ConversationController;
use crate::db::{migrations, settings_repo};
use crate::diagnosis::client::GeminiClient;
use crate::diagnosis::config::DiagnosisConfig;
use crate::error::{AppError, AppResult};
use crate::models::settings::Preferences;

pub type Conversation = ConversationController<GeminiClient>;

pub struct AppState {
    /// SQLite connection holding the persisted preferences
    pub db: Arc<std::sync::Mutex<Connection>>,
    /// The diagnosis chat session of this window
    pub conversation: Arc<Conversation>,
}

impl AppState {
    pub fn new(conn: Connection, conversation: Conversation) -> Self {
        Self {
            db: Arc::new(std::sync::Mutex::new(conn)),
            conversation: Arc::new(conversation),
        }
    }

    /// Opens the preference store and starts a chat in the stored language.
    pub fn initialize() -> AppResult<Self> {
        let conn = migrations::init_db()?;
        let prefs = settings_repo::load_preferences(&conn)?;
        log::info!("Preferences loaded: theme={}, lang={}", prefs.theme, prefs.language);

        let client = GeminiClient::new(DiagnosisConfig::from_env())?;
        log::info!("Diagnosis model: {}", client.config().model);
        Ok(Self::new(conn, ConversationController::new(client, prefs.language)))
    }

    pub fn preferences(&self) -> AppResult<Preferences> {
        let db = self.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
        settings_repo::load_preferences(&db)
    }
}

// Implement Clone manually to allow state sharing in spawned tasks
impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            conversation: Arc::clone(&self.conversation),
        }
    }
}
