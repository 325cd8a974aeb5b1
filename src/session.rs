// Owns the lifecycle of a single generation attempt

use serde::{Deserialize, Serialize};

/// Filename offered by the download action for the generated image.
pub const DOWNLOAD_FILENAME: &str = "revisualise-moment.png";

/// Shown when a generation failure carries no usable message of its own.
pub const GENERIC_ERROR_MESSAGE: &str =
    "Something went wrong while reimagining your photos. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Idle,
    Generating,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageRole {
    Child,
    Adult,
}

/// Read-only view of the session handed to the frontend after every command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub child_image: Option<String>,
    pub adult_image: Option<String>,
    pub result_image: Option<String>,
    pub error_message: Option<String>,
}

/// The one state holder for the session. Lives in Tauri managed state as
/// `Arc<Mutex<SessionState>>`; mutation happens only through the transition
/// methods below.
pub struct SessionState {
    pub phase: Phase,
    pub child_image: Option<String>,
    pub adult_image: Option<String>,
    pub result_image: Option<String>,
    pub error_message: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            child_image: None,
            adult_image: None,
            result_image: None,
            error_message: None,
        }
    }
}

impl SessionState {
    /// Replaces the image for one role. Re-selection does not touch the other
    /// role or the current phase.
    pub fn set_image(&mut self, role: ImageRole, data_uri: String) {
        match role {
            ImageRole::Child => self.child_image = Some(data_uri),
            ImageRole::Adult => self.adult_image = Some(data_uri),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.child_image.is_some() && self.adult_image.is_some()
    }

    /// Guarded entry into Generating, taken only from Idle or Error. Returns
    /// the two images to send when the transition is taken, or `None` when
    /// either image is missing, a generation is already in flight, or a
    /// result is being shown (submit is then a no-op; Success exits via
    /// reset).
    pub fn begin_generation(&mut self) -> Option<(String, String)> {
        if !matches!(self.phase, Phase::Idle | Phase::Error) || !self.is_ready() {
            return None;
        }
        let child = self.child_image.clone()?;
        let adult = self.adult_image.clone()?;
        self.phase = Phase::Generating;
        self.error_message = None;
        Some((child, adult))
    }

    pub fn complete(&mut self, result_image: String) {
        self.phase = Phase::Success;
        self.result_image = Some(result_image);
    }

    /// Records a failed generation. Empty or whitespace-only messages are
    /// treated as absent and replaced with the generic fallback. The error
    /// message and a result image never coexist, so any stale result is
    /// dropped here.
    pub fn fail(&mut self, message: String) {
        self.phase = Phase::Error;
        self.result_image = None;
        self.error_message = if message.trim().is_empty() {
            Some(GENERIC_ERROR_MESSAGE.to_string())
        } else {
            Some(message)
        };
    }

    /// Back to Idle for another attempt. Keeps the selected images; only
    /// re-selection replaces those. A no-op while a generation is in flight:
    /// there is no cancellation, so the pending outcome must land in the
    /// phase that produced it.
    pub fn reset(&mut self) {
        if self.phase == Phase::Generating {
            return;
        }
        self.phase = Phase::Idle;
        self.result_image = None;
        self.error_message = None;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            child_image: self.child_image.clone(),
            adult_image: self.adult_image.clone(),
            result_image: self.result_image.clone(),
            error_message: self.error_message.clone(),
        }
    }
}
