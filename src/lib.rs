pub mod chat;
#[cfg(feature = "desktop")]
pub mod commands;
pub mod db;
pub mod diagnosis;
pub mod error;
pub mod i18n;
pub mod models;
pub mod state;

#[cfg(feature = "desktop")]
use state::AppState;

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use tauri::Manager;

    let state = AppState::initialize().expect("Failed to initialize app state");

    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            if cfg!(debug_assertions) {
                app.handle().plugin(
                    tauri_plugin_log::Builder::default()
                        .level(log::LevelFilter::Debug)
                        .build(),
                )?;
            } else {
                app.handle().plugin(
                    tauri_plugin_log::Builder::default()
                        .level(log::LevelFilter::Info)
                        .build(),
                )?;
            }

            let conversation = app.state::<AppState>().conversation.clone();
            commands::chat_commands::forward_events(app.handle().clone(), conversation);
            Ok(())
        })
        .manage(state)
        .invoke_handler(tauri::generate_handler![
            // Chat commands
            commands::chat_commands::get_messages,
            commands::chat_commands::get_chat_state,
            commands::chat_commands::get_chat_strings,
            commands::chat_commands::set_input,
            commands::chat_commands::select_suggestion,
            commands::chat_commands::send_message,
            commands::chat_commands::upload_image,
            // Settings commands
            commands::settings_commands::get_preferences,
            commands::settings_commands::set_theme,
            commands::settings_commands::set_language,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
