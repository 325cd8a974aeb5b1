// Handles communication with the external image generation API (Gemini)

use crate::session::{SessionSnapshot, SessionState};

use std::future::Future;
use std::sync::Arc;

use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const GEMINI_MODEL: &str = "gemini-2.5-flash-image-preview";

const COMPOSITE_PROMPT: &str = "Create a single photorealistic image in which the \
adult from the second photo warmly embraces the child from the first photo. Both \
are the same person at different ages. Keep each face faithful to its source \
photo, place them together in a softly lit natural setting, and make the moment \
feel tender and candid. Respond with the image only.";

/// Failure modes of one generation call. Every path out of the service boundary
/// resolves to one of these; nothing escapes as an uncontrolled fault.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Could not reach the image service: {0}")]
    Transport(String),

    #[error("{0}")]
    Rejected(String),

    #[error("The image service returned no image. Please try different photos.")]
    EmptyResponse,

    #[error("Could not read the image service response: {0}")]
    Decode(String),

    #[error("{0}")]
    Unknown(String),
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<Part>>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(rename = "inlineData")]
    inline_data: Option<InlineData>,
}

#[derive(Deserialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: Option<String>,
    data: String,
}

#[derive(Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

struct InlinePayload {
    mime_type: String,
    data: String,
}

// Splits a "data:<mime>;base64,<payload>" URI into the pieces the API wants.
fn split_data_uri(uri: &str) -> Result<InlinePayload, GenerationError> {
    let rest = uri.strip_prefix("data:").ok_or_else(|| {
        GenerationError::Rejected(
            "One of the selected photos could not be read. Please re-select it.".to_string(),
        )
    })?;
    let (mime_type, data) = rest.split_once(";base64,").ok_or_else(|| {
        GenerationError::Rejected(
            "One of the selected photos could not be read. Please re-select it.".to_string(),
        )
    })?;
    Ok(InlinePayload {
        mime_type: mime_type.to_string(),
        data: data.to_string(),
    })
}

// Pulls the API's own error message out of a non-2xx body, if it has one.
fn extract_api_error(body: &str, status: reqwest::StatusCode) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(|m| m.to_string())
        })
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("The image service rejected the request (status {}).", status))
}

/// Sends both photos plus the fixed composite prompt to Gemini and returns the
/// generated image as a data URI ready for display and download.
pub async fn revisualise_photos(
    child_image: &str,
    adult_image: &str,
    api_key: &str,
) -> Result<String, GenerationError> {
    let child = split_data_uri(child_image)?;
    let adult = split_data_uri(adult_image)?;

    let request_body = serde_json::json!({
        "contents": [{
            "parts": [
                { "inlineData": { "mimeType": child.mime_type, "data": child.data } },
                { "inlineData": { "mimeType": adult.mime_type, "data": adult.data } },
                { "text": COMPOSITE_PROMPT }
            ]
        }],
        "generationConfig": {
            "responseModalities": ["IMAGE"]
        }
    });

    let url = format!(
        "{}/models/{}:generateContent?key={}",
        GEMINI_BASE_URL, GEMINI_MODEL, api_key
    );

    let client = Client::new();
    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .json(&request_body)
        .send()
        .await
        .map_err(|e| GenerationError::Transport(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| GenerationError::Transport(e.to_string()))?;

    if !status.is_success() {
        return Err(GenerationError::Rejected(extract_api_error(&body, status)));
    }

    let parsed: GenerateContentResponse =
        serde_json::from_str(&body).map_err(|e| GenerationError::Decode(e.to_string()))?;

    if let Some(reason) = parsed
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(GenerationError::Rejected(format!(
            "The image service declined these photos ({}). Please try different ones.",
            reason
        )));
    }

    let parts = parsed
        .candidates
        .and_then(|mut candidates| {
            if candidates.is_empty() {
                None
            } else {
                candidates.remove(0).content
            }
        })
        .and_then(|content| content.parts)
        .ok_or(GenerationError::EmptyResponse)?;

    for part in parts {
        if let Some(inline) = part.inline_data {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(inline.data.as_bytes())
                .map_err(|e| GenerationError::Decode(e.to_string()))?;
            if bytes.is_empty() {
                return Err(GenerationError::EmptyResponse);
            }
            let mime_type = inline.mime_type.unwrap_or_else(|| "image/png".to_string());
            return Ok(format!("data:{};base64,{}", mime_type, inline.data));
        }
    }

    Err(GenerationError::EmptyResponse)
}

/// Runs one submit: takes the Generating transition if the guard allows it,
/// calls the client with the lock released, then settles the session to
/// Success or Error. Generic over the client so tests can substitute one.
pub async fn process_generation<F, Fut>(
    state: &Arc<Mutex<SessionState>>,
    client: F,
) -> SessionSnapshot
where
    F: FnOnce(String, String) -> Fut,
    Fut: Future<Output = Result<String, GenerationError>>,
{
    let (child_image, adult_image) = {
        let mut session = state.lock().await;
        match session.begin_generation() {
            Some(images) => images,
            // Guard failed: missing image or already generating. Submit is a
            // no-op and the client is never called.
            None => return session.snapshot(),
        }
    };

    let outcome = client(child_image, adult_image).await;

    let mut session = state.lock().await;
    match outcome {
        Ok(result_image) => session.complete(result_image),
        Err(e) => {
            log::error!("generation failed: {}", e);
            session.fail(e.to_string());
        }
    }
    session.snapshot()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ImageRole, Phase, GENERIC_ERROR_MESSAGE};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ready_state() -> Arc<Mutex<SessionState>> {
        let mut session = SessionState::default();
        session.set_image(ImageRole::Child, "C".to_string());
        session.set_image(ImageRole::Adult, "A".to_string());
        Arc::new(Mutex::new(session))
    }

    #[tokio::test]
    async fn successful_generation_reaches_success_with_result() {
        let state = ready_state();

        let snapshot = process_generation(&state, |child, adult| async move {
            assert_eq!(child, "C");
            assert_eq!(adult, "A");
            Ok("OUT1".to_string())
        })
        .await;

        assert_eq!(snapshot.phase, Phase::Success);
        assert_eq!(snapshot.result_image.as_deref(), Some("OUT1"));
        assert_eq!(snapshot.error_message, None);
    }

    #[tokio::test]
    async fn rejected_generation_reaches_error_with_message() {
        let state = ready_state();

        let snapshot = process_generation(&state, |_, _| async {
            Err(GenerationError::Rejected("quota exceeded".to_string()))
        })
        .await;

        assert_eq!(snapshot.phase, Phase::Error);
        assert_eq!(snapshot.error_message.as_deref(), Some("quota exceeded"));
        assert_eq!(snapshot.result_image, None);
    }

    #[tokio::test]
    async fn blank_failure_message_uses_generic_fallback() {
        let state = ready_state();

        let snapshot = process_generation(&state, |_, _| async {
            Err(GenerationError::Unknown("   ".to_string()))
        })
        .await;

        assert_eq!(snapshot.phase, Phase::Error);
        assert_eq!(
            snapshot.error_message.as_deref(),
            Some(GENERIC_ERROR_MESSAGE)
        );
    }

    #[tokio::test]
    async fn submit_without_both_images_never_calls_client() {
        let calls = AtomicUsize::new(0);
        let state = Arc::new(Mutex::new(SessionState::default()));

        let snapshot = process_generation(&state, |_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok("OUT1".to_string()) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(snapshot.phase, Phase::Idle);
        assert_eq!(snapshot.result_image, None);
    }

    #[tokio::test]
    async fn submit_while_generating_never_calls_client() {
        let calls = AtomicUsize::new(0);
        let state = ready_state();
        state.lock().await.begin_generation().unwrap();

        let snapshot = process_generation(&state, |_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok("OUT2".to_string()) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(snapshot.phase, Phase::Generating);
    }

    #[test]
    fn split_data_uri_extracts_mime_and_payload() {
        let payload = split_data_uri("data:image/jpeg;base64,aGVsbG8=").unwrap();
        assert_eq!(payload.mime_type, "image/jpeg");
        assert_eq!(payload.data, "aGVsbG8=");

        assert!(split_data_uri("not-a-data-uri").is_err());
        assert!(split_data_uri("data:image/png,rawpayload").is_err());
    }

    #[test]
    fn extract_api_error_prefers_service_message() {
        let body = r#"{"error":{"message":"quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(
            extract_api_error(body, reqwest::StatusCode::TOO_MANY_REQUESTS),
            "quota exceeded"
        );

        let fallback = extract_api_error("not json", reqwest::StatusCode::BAD_GATEWAY);
        assert!(fallback.contains("502"));

        let blank = extract_api_error(
            r#"{"error":{"message":"  "}}"#,
            reqwest::StatusCode::BAD_REQUEST,
        );
        assert!(blank.contains("400"));
    }
}
