use std::path::PathBuf;
use std::sync::Arc;

use tauri::Emitter;
use tokio::sync::broadcast::error::RecvError;

use crate::chat::ConversationEvent;
use crate::error::AppResult;
use crate::i18n::ChatStrings;
use crate::models::message::{ChatSnapshot, Message};
use crate::state::{AppState, Conversation};

#[tauri::command]
pub async fn get_messages(state: tauri::State<'_, AppState>) -> AppResult<Vec<Message>> {
    Ok(state.conversation.messages())
}

#[tauri::command]
pub async fn get_chat_state(state: tauri::State<'_, AppState>) -> AppResult<ChatSnapshot> {
    Ok(state.conversation.snapshot())
}

#[tauri::command]
pub async fn get_chat_strings(state: tauri::State<'_, AppState>) -> AppResult<ChatStrings> {
    Ok(*state.conversation.strings())
}

#[tauri::command]
pub async fn set_input(state: tauri::State<'_, AppState>, text: String) -> AppResult<()> {
    state.conversation.set_input(text);
    Ok(())
}

#[tauri::command]
pub async fn select_suggestion(
    state: tauri::State<'_, AppState>,
    index: usize,
) -> AppResult<String> {
    state.conversation.select_suggestion(index)
}

/// Submits the input buffer and resolves once the reply is in the log.
#[tauri::command]
pub async fn send_message(state: tauri::State<'_, AppState>) -> AppResult<bool> {
    let conversation = state.conversation.clone();
    Ok(conversation.submit_input().await)
}

#[tauri::command(rename_all = "camelCase")]
pub async fn upload_image(state: tauri::State<'_, AppState>, file_path: String) -> AppResult<bool> {
    log::info!("upload_image called: {}", file_path);
    let conversation = state.conversation.clone();
    Ok(conversation.upload_image_file(&PathBuf::from(file_path)).await)
}

/// Relays conversation events to the web view for as long as the app runs.
pub fn forward_events(app: tauri::AppHandle, conversation: Arc<Conversation>) {
    let mut rx = conversation.subscribe();
    tauri::async_runtime::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ConversationEvent::MessageAppended(message)) => {
                    app.emit("chat:message", &message).ok();
                }
                Ok(ConversationEvent::ComposingChanged { composing }) => {
                    app.emit("chat:composing", &serde_json::json!({ "composing": composing }))
                        .ok();
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Chat event relay skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
