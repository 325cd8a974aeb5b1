// Handles Tauri command definitions

use crate::db;
use crate::gemini_api;
use crate::session::{ImageRole, SessionSnapshot, SessionState, DOWNLOAD_FILENAME};
use std::sync::Arc;
use tauri::{command, State};
use tokio::sync::Mutex;
use rusqlite::Connection;

/// What the frontend needs to trigger the client-side file save.
#[derive(Debug, serde::Serialize)]
pub struct DownloadTarget {
    pub data_uri: String,
    pub file_name: String,
}

// Get the stored Gemini API key
#[command]
pub async fn get_api_key(conn: State<'_, Arc<Mutex<Connection>>>) -> Result<String, String> {
    let conn = conn.lock().await;
    db::get_config_value(&conn, "gemini_api_key")
        .map(|key| key.unwrap_or_else(|| "".to_string()))
        .map_err(|e| e.to_string())
}

// Save the Gemini API key
#[command]
pub async fn save_api_key(
    conn: State<'_, Arc<Mutex<Connection>>>,
    api_key: String,
) -> Result<(), String> {
    let conn = conn.lock().await;
    db::update_config_value(&conn, "gemini_api_key", &api_key)
        .map_err(|e| e.to_string())?;
    Ok(())
}

#[command]
pub async fn set_child_image(
    data_uri: String,
    state: State<'_, Arc<Mutex<SessionState>>>,
) -> Result<SessionSnapshot, String> {
    let mut session = state.lock().await;
    session.set_image(ImageRole::Child, data_uri);
    Ok(session.snapshot())
}

#[command]
pub async fn set_adult_image(
    data_uri: String,
    state: State<'_, Arc<Mutex<SessionState>>>,
) -> Result<SessionSnapshot, String> {
    let mut session = state.lock().await;
    session.set_image(ImageRole::Adult, data_uri);
    Ok(session.snapshot())
}

#[command]
pub async fn get_session(
    state: State<'_, Arc<Mutex<SessionState>>>,
) -> Result<SessionSnapshot, String> {
    let session = state.lock().await;
    Ok(session.snapshot())
}

#[command]
pub async fn reset_session(
    state: State<'_, Arc<Mutex<SessionState>>>,
) -> Result<SessionSnapshot, String> {
    let mut session = state.lock().await;
    session.reset();
    Ok(session.snapshot())
}

// Run one generation attempt against the Gemini API. The returned snapshot
// carries the outcome; a guard failure returns the session unchanged.
#[command]
pub async fn generate_moment(
    state: State<'_, Arc<Mutex<SessionState>>>,
    db_conn: State<'_, Arc<Mutex<Connection>>>,
) -> Result<SessionSnapshot, String> {
    let api_key = {
        let conn = db_conn.lock().await;
        db::get_config_value(&conn, "gemini_api_key")
            .map_err(|e| e.to_string())?
            .unwrap_or_default()
    };

    let snapshot = gemini_api::process_generation(state.inner(), |child, adult| async move {
        if api_key.trim().is_empty() {
            return Err(gemini_api::GenerationError::Rejected(
                "No API key is configured. Add your Gemini API key in settings.".to_string(),
            ));
        }
        gemini_api::revisualise_photos(&child, &adult, &api_key).await
    })
    .await;

    Ok(snapshot)
}

// Download info for the generated image; None until a generation succeeded
#[command]
pub async fn get_download_target(
    state: State<'_, Arc<Mutex<SessionState>>>,
) -> Result<Option<DownloadTarget>, String> {
    let session = state.lock().await;
    Ok(session.result_image.as_ref().map(|uri| DownloadTarget {
        data_uri: uri.clone(),
        file_name: DOWNLOAD_FILENAME.to_string(),
    }))
}
