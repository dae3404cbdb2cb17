use rusqlite::{params, Connection};

use crate::error::{AppError, AppResult};
use crate::models::settings::{AppSettings, Language, Preferences, Theme, LANGUAGE_KEY, THEME_KEY};

pub fn get_setting(db: &Connection, key: &str) -> AppResult<Option<AppSettings>> {
    let result = db.query_row(
        "SELECT key, value, updated_at FROM settings WHERE key = ?1",
        params![key],
        |row| {
            Ok(AppSettings {
                key: row.get(0)?,
                value: row.get(1)?,
                updated_at: row.get(2)?,
            })
        },
    );

    match result {
        Ok(s) => Ok(Some(s)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(AppError::Database(e.to_string())),
    }
}

pub fn set_setting(db: &Connection, key: &str, value: &str) -> AppResult<()> {
    db.execute(
        "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, datetime('now'))",
        params![key, value],
    )
    .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}

/// Reads theme and language, falling back to defaults for missing or
/// unrecognized values.
pub fn load_preferences(db: &Connection) -> AppResult<Preferences> {
    // Only an explicit "dark" turns dark mode on.
    let theme = match get_setting(db, THEME_KEY)? {
        Some(s) if s.value == Theme::Dark.as_str() => Theme::Dark,
        _ => Theme::Light,
    };

    let language = match get_setting(db, LANGUAGE_KEY)? {
        Some(s) => s.value.parse::<Language>().unwrap_or_else(|e| {
            log::warn!("Ignoring stored language: {}", e);
            Language::default()
        }),
        None => Language::default(),
    };

    Ok(Preferences { theme, language })
}

pub fn save_theme(db: &Connection, theme: Theme) -> AppResult<()> {
    set_setting(db, THEME_KEY, theme.as_str())
}

pub fn save_language(db: &Connection, language: Language) -> AppResult<()> {
    set_setting(db, LANGUAGE_KEY, language.as_str())
}
