use crate::db::settings_repo;
use crate::error::{AppError, AppResult};
use crate::models::settings::{Language, Preferences, Theme};
use crate::state::AppState;

#[tauri::command]
pub async fn get_preferences(state: tauri::State<'_, AppState>) -> AppResult<Preferences> {
    let state = state.inner().clone();
    tokio::task::spawn_blocking(move || state.preferences())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}

#[tauri::command]
pub async fn set_theme(state: tauri::State<'_, AppState>, theme: Theme) -> AppResult<()> {
    let state = state.inner().clone();
    tokio::task::spawn_blocking(move || {
        let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
        settings_repo::save_theme(&db, theme)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

/// Persists the language and re-localizes the open chat.
#[tauri::command]
pub async fn set_language(state: tauri::State<'_, AppState>, language: Language) -> AppResult<()> {
    let state = state.inner().clone();
    let conversation = state.conversation.clone();
    tokio::task::spawn_blocking(move || {
        let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
        settings_repo::save_language(&db, language)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    conversation.set_language(language);
    Ok(())
}
