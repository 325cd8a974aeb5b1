
// Handles SQLite-backed app configuration (API key, window geometry)

use rusqlite::{Connection, OptionalExtension};
use std::sync::Arc;
use tokio::sync::Mutex;
use tauri::api::path::app_data_dir;
use std::fs;
use std::path::PathBuf;


// Initialize SQLite Database
pub fn init_db() -> Arc<Mutex<Connection>> {
    // Get the app data directory for the platform
    let base_dir = app_data_dir(&tauri::Config::default())
        .expect("Failed to retrieve application data directory")
        .join("revisualise");

    let db_path: PathBuf = base_dir.join("revisualise.db");

    // Ensure the directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).expect("Failed to create database directory");
        }
    }

    let conn = Connection::open(db_path).expect("Failed to open SQLite database");

    conn.execute(
        "CREATE TABLE IF NOT EXISTS app_config (
            key TEXT PRIMARY KEY,
            value TEXT
        )",
        [],
    ).expect("Failed to create app_config table");

    Arc::new(Mutex::new(conn))
}

/// Inserts or updates a configuration key-value pair.
pub fn update_config_value(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO app_config (key, value) VALUES (?1, ?2)",
        [key, value],
    )?;
    Ok(())
}

/// Retrieves a configuration value by key. Returns `None` if the key doesn't exist.
pub fn get_config_value(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        [key],
        |row| row.get(0),
    ).optional()
}
