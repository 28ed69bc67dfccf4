use serde::Serialize;
use uuid::Uuid;

use crate::edit::asset::ImageAsset;

/// User-facing error left on the session after a failed dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

/// Per-session data owned by the orchestrator. No logic lives here beyond
/// construction; every mutation goes through `EditOrchestrator`.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub session_id: String,
    pub original_image: Option<ImageAsset>,
    pub current_edited: Option<ImageAsset>,
    pub pending_instruction: String,
    pub last_error: Option<ErrorInfo>,
    pub last_guidance: Option<String>,
    pub busy: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            original_image: None,
            current_edited: None,
            pending_instruction: String::new(),
            last_error: None,
            last_guidance: None,
            busy: false,
        }
    }
}

/// Consistent read view taken under the orchestrator lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub original_image: Option<ImageAsset>,
    pub current_edited: Option<ImageAsset>,
    pub pending_instruction: String,
    pub last_error: Option<ErrorInfo>,
    pub last_guidance: Option<String>,
    pub busy: bool,
    /// Whether an undo has anything to restore.
    pub has_history: bool,
    pub history_len: usize,
    pub history_instructions: Vec<String>,
}
