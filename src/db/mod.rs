pub mod migrations;
pub mod settings_repo;
