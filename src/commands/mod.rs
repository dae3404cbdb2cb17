pub mod chat_commands;
pub mod settings_commands;
