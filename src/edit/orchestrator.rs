use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::edit::asset::ImageAsset;
use crate::edit::derive::{PassThroughDeriver, SharedArtifactDeriver};
use crate::edit::history::{EditHistory, HistoryEntry};
use crate::edit::phase::EditPhase;
use crate::edit::presets::preset_instruction;
use crate::edit::remote::{RemoteEditFailure, RemoteEditRequest, SharedRemoteEditService};
use crate::edit::session::{ErrorInfo, SessionSnapshot, SessionState};

pub const REMOTE_EDIT_FAILED_CODE: &str = "remote_edit_failed";

/// Inbound edit request. `image` and `instruction` fall back to the session's
/// uploaded image and pending instruction when absent.
#[derive(Clone, Default)]
pub struct SubmitEdit {
    pub credential: String,
    pub image: Option<ImageAsset>,
    pub instruction: Option<String>,
}

impl fmt::Debug for SubmitEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmitEdit")
            .field("credential", &"<redacted>")
            .field("image", &self.image)
            .field("instruction", &self.instruction)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditOutcome {
    pub edited: ImageAsset,
    pub guidance: String,
    pub history_len: usize,
    /// Session as left by this edit, read under the same lock.
    pub session: SessionSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoOutcome {
    pub restored: ImageAsset,
    pub undone_instruction: String,
    pub history_len: usize,
    pub session: SessionSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetOutcome {
    /// A dispatch was still outstanding; its result will be discarded.
    pub orphaned_dispatch: bool,
    pub session: SessionSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadArtifact {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

struct OrchestratorState {
    session: SessionState,
    history: EditHistory,
    phase: EditPhase,
    /// Bumped on reset so a dispatch started before it cannot write into the
    /// new session.
    generation: u64,
}

impl OrchestratorState {
    fn transition(&mut self, next: EditPhase) {
        if !self.phase.can_transition_to(next) {
            warn!(
                from = self.phase.as_str(),
                to = next.as_str(),
                "unexpected edit phase transition"
            );
        }
        debug!(
            session_id = %self.session.session_id,
            from = self.phase.as_str(),
            to = next.as_str(),
            "edit phase transition"
        );
        self.phase = next;
    }

    fn prepare_dispatch(&self, request: SubmitEdit) -> Result<Dispatch, ValidationError> {
        let credential = request.credential.trim();
        if credential.is_empty() {
            return Err(ValidationError::MissingCredential);
        }
        let image = request
            .image
            .or_else(|| self.session.original_image.clone())
            .ok_or(ValidationError::MissingImage)?;
        let instruction = match request.instruction.as_deref() {
            Some(explicit) => explicit.trim(),
            None => self.session.pending_instruction.trim(),
        };
        if instruction.is_empty() {
            return Err(ValidationError::MissingInstruction);
        }

        Ok(Dispatch {
            request: RemoteEditRequest::new(credential, image, instruction),
            generation: self.generation,
        })
    }

    fn finish(&mut self, terminal: EditPhase) {
        self.session.busy = false;
        self.transition(terminal);
        self.transition(EditPhase::Idle);
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session.session_id.clone(),
            original_image: self.session.original_image.clone(),
            current_edited: self.session.current_edited.clone(),
            pending_instruction: self.session.pending_instruction.clone(),
            last_error: self.session.last_error.clone(),
            last_guidance: self.session.last_guidance.clone(),
            busy: self.session.busy,
            has_history: self.history.has_entries(),
            history_len: self.history.len(),
            history_instructions: self
                .history
                .entries()
                .map(|entry| entry.instruction.clone())
                .collect(),
        }
    }
}

struct Dispatch {
    request: RemoteEditRequest,
    generation: u64,
}

/// Owns the session and its undo history and serializes every edit through a
/// single outstanding dispatch.
///
/// The state lock is released while the remote call runs, so concurrent
/// callers observe `busy` and get `EditError::Busy` instead of queueing.
pub struct EditOrchestrator {
    remote: SharedRemoteEditService,
    deriver: SharedArtifactDeriver,
    inner: Mutex<OrchestratorState>,
}

pub type SharedEditOrchestrator = Arc<EditOrchestrator>;

impl EditOrchestrator {
    pub fn new(remote: SharedRemoteEditService) -> Self {
        Self::with_deriver(remote, Arc::new(PassThroughDeriver))
    }

    pub fn with_deriver(remote: SharedRemoteEditService, deriver: SharedArtifactDeriver) -> Self {
        Self {
            remote,
            deriver,
            inner: Mutex::new(OrchestratorState {
                session: SessionState::default(),
                history: EditHistory::new(),
                phase: EditPhase::Idle,
                generation: 0,
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, OrchestratorState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock_state().snapshot()
    }

    pub fn phase(&self) -> EditPhase {
        self.lock_state().phase
    }

    /// Upload: replaces the source image and starts a fresh edit trail.
    pub fn load_image(&self, image: ImageAsset) -> Result<SessionSnapshot, EditError> {
        let mut state = self.lock_state();
        if state.session.busy {
            return Err(EditError::Busy);
        }
        info!(
            session_id = %state.session.session_id,
            media_type = image.media_type(),
            "image loaded"
        );
        state.session.original_image = Some(image);
        state.session.current_edited = None;
        state.session.last_error = None;
        state.session.last_guidance = None;
        state.history.clear();
        Ok(state.snapshot())
    }

    pub fn set_instruction(&self, instruction: impl Into<String>) -> SessionSnapshot {
        let mut state = self.lock_state();
        state.session.pending_instruction = instruction.into();
        state.snapshot()
    }

    pub fn apply_preset(&self, name: &str) -> Result<SessionSnapshot, EditError> {
        let instruction = preset_instruction(name)?;
        Ok(self.set_instruction(instruction))
    }

    pub fn submit_edit(&self, request: SubmitEdit) -> Result<EditOutcome, EditError> {
        let dispatch = {
            let mut state = self.lock_state();
            if state.session.busy {
                warn!(
                    session_id = %state.session.session_id,
                    "edit rejected: another edit is in flight"
                );
                return Err(EditError::Busy);
            }

            state.transition(EditPhase::Validating);
            let dispatch = match state.prepare_dispatch(request) {
                Ok(dispatch) => dispatch,
                Err(error) => {
                    info!(
                        session_id = %state.session.session_id,
                        error = %error,
                        "edit request failed validation"
                    );
                    state.transition(EditPhase::Failed);
                    state.transition(EditPhase::Idle);
                    return Err(EditError::Validation(error));
                }
            };

            state.session.busy = true;
            state.transition(EditPhase::Dispatching);
            info!(
                session_id = %state.session.session_id,
                instruction = %dispatch.request.instruction,
                "dispatching edit"
            );
            dispatch
        };

        let result = self.remote.request_edit(&dispatch.request);

        let mut state = self.lock_state();
        if state.generation != dispatch.generation {
            warn!(
                session_id = %state.session.session_id,
                succeeded = result.is_ok(),
                "discarding edit result for a session that was reset mid-flight"
            );
            return Err(EditError::Superseded);
        }

        match result {
            Ok(guidance) => {
                let edited = self
                    .deriver
                    .derive_edited_artifact(&dispatch.request.image, guidance.as_str());
                if let Some(prior) = state.session.current_edited.replace(edited.clone()) {
                    state
                        .history
                        .push(HistoryEntry::new(prior, dispatch.request.instruction.clone()));
                }
                if state.session.original_image.is_none() {
                    state.session.original_image = Some(dispatch.request.image.clone());
                }
                state.session.pending_instruction = dispatch.request.instruction.clone();
                state.session.last_error = None;
                state.session.last_guidance = Some(guidance.clone());
                state.finish(EditPhase::Succeeded);
                info!(
                    session_id = %state.session.session_id,
                    history_len = state.history.len(),
                    "edit applied"
                );
                Ok(EditOutcome {
                    edited,
                    guidance,
                    history_len: state.history.len(),
                    session: state.snapshot(),
                })
            }
            Err(failure) => {
                warn!(
                    session_id = %state.session.session_id,
                    error = %failure,
                    "edit failed"
                );
                let error = EditError::RemoteEdit(failure);
                state.session.last_error = Some(ErrorInfo {
                    code: String::from(REMOTE_EDIT_FAILED_CODE),
                    message: error.to_string(),
                });
                state.finish(EditPhase::Failed);
                Err(error)
            }
        }
    }

    pub fn undo(&self) -> Result<UndoOutcome, EditError> {
        let mut state = self.lock_state();
        if state.session.busy {
            return Err(EditError::Busy);
        }
        let entry = state.history.pop().ok_or(EditError::EmptyHistory)?;
        state.session.current_edited = Some(entry.snapshot.clone());
        info!(
            session_id = %state.session.session_id,
            undone_instruction = %entry.instruction,
            history_len = state.history.len(),
            "edit undone"
        );
        Ok(UndoOutcome {
            restored: entry.snapshot,
            undone_instruction: entry.instruction,
            history_len: state.history.len(),
            session: state.snapshot(),
        })
    }

    /// Always succeeds. An outstanding dispatch is orphaned, not cancelled.
    pub fn reset(&self) -> ResetOutcome {
        let mut state = self.lock_state();
        let orphaned_dispatch = state.session.busy;
        if orphaned_dispatch {
            warn!(
                session_id = %state.session.session_id,
                "session reset while an edit is in flight; its result will be discarded"
            );
        }
        state.generation = state.generation.wrapping_add(1);
        state.session = SessionState::default();
        state.history.clear();
        state.phase = EditPhase::Idle;
        info!(session_id = %state.session.session_id, "session reset");
        ResetOutcome {
            orphaned_dispatch,
            session: state.snapshot(),
        }
    }

    pub fn download_current(&self) -> Result<DownloadArtifact, EditError> {
        let edited = self
            .lock_state()
            .session
            .current_edited
            .clone()
            .ok_or(EditError::NothingToDownload)?;
        let bytes = edited
            .decode_bytes()
            .map_err(|e| ValidationError::InvalidImage(format!("image base64 decode failed: {e}")))?;
        Ok(DownloadArtifact {
            file_name: format!(
                "edited-photo-{}.{}",
                Utc::now().timestamp_millis(),
                edited.file_extension()
            ),
            media_type: edited.media_type().to_string(),
            bytes,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please provide an API key")]
    MissingCredential,
    #[error("Please upload an image")]
    MissingImage,
    #[error("Please provide an editing instruction")]
    MissingInstruction,
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error("unknown preset '{0}'")]
    UnknownPreset(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("an edit is already in progress")]
    Busy,
    #[error("Failed to edit image: {0}")]
    RemoteEdit(#[source] RemoteEditFailure),
    #[error("session was reset while the edit was in flight")]
    Superseded,
    #[error("nothing to undo")]
    EmptyHistory,
    #[error("no edited image to download")]
    NothingToDownload,
}

impl EditError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Busy => "edit_in_progress",
            Self::RemoteEdit(_) => REMOTE_EDIT_FAILED_CODE,
            Self::Superseded => "session_reset",
            Self::EmptyHistory => "empty_history",
            Self::NothingToDownload => "nothing_to_download",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::mpsc;
    use std::thread;

    use crate::edit::remote::RemoteEditService;

    #[derive(Default)]
    struct FakeRemote {
        seen: Mutex<Vec<RemoteEditRequest>>,
        next: Mutex<VecDeque<Result<String, RemoteEditFailure>>>,
    }

    impl FakeRemote {
        fn with_results(results: Vec<Result<String, RemoteEditFailure>>) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                next: Mutex::new(results.into()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().expect("fake remote mutex poisoned").len()
        }

        fn take_seen(&self) -> Vec<RemoteEditRequest> {
            std::mem::take(&mut *self.seen.lock().expect("fake remote mutex poisoned"))
        }
    }

    impl RemoteEditService for FakeRemote {
        fn request_edit(&self, request: &RemoteEditRequest) -> Result<String, RemoteEditFailure> {
            self.seen
                .lock()
                .expect("fake remote mutex poisoned")
                .push(request.clone());
            self.next
                .lock()
                .expect("fake remote mutex poisoned")
                .pop_front()
                .unwrap_or_else(|| Ok(String::from("Increase contrast by 10%")))
        }
    }

    /// Blocks inside the remote call until the test releases it.
    struct GatedRemote {
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<Result<String, RemoteEditFailure>>>,
    }

    impl RemoteEditService for GatedRemote {
        fn request_edit(&self, _request: &RemoteEditRequest) -> Result<String, RemoteEditFailure> {
            let _ = self
                .entered
                .lock()
                .expect("gated remote mutex poisoned")
                .send(());
            self.release
                .lock()
                .expect("gated remote mutex poisoned")
                .recv()
                .unwrap_or_else(|_| Err(RemoteEditFailure::new("gate dropped")))
        }
    }

    struct Gate {
        entered: mpsc::Receiver<()>,
        release: mpsc::Sender<Result<String, RemoteEditFailure>>,
    }

    fn gated_orchestrator() -> (Arc<EditOrchestrator>, Gate) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let remote = Arc::new(GatedRemote {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        });
        (
            Arc::new(EditOrchestrator::new(remote)),
            Gate {
                entered: entered_rx,
                release: release_tx,
            },
        )
    }

    fn image(tag: &[u8]) -> ImageAsset {
        ImageAsset::from_bytes(tag, Some("image/png")).expect("test image should build")
    }

    fn submit(credential: &str, image: &ImageAsset, instruction: &str) -> SubmitEdit {
        SubmitEdit {
            credential: credential.to_string(),
            image: Some(image.clone()),
            instruction: Some(instruction.to_string()),
        }
    }

    #[test]
    fn first_edit_keeps_history_empty_and_second_snapshots_prior_artifact() {
        let remote = FakeRemote::with_results(Vec::new());
        let orchestrator = EditOrchestrator::new(remote.clone());
        let a = image(b"photo-a");

        let first = orchestrator
            .submit_edit(submit("key", &a, "Remove background"))
            .expect("first edit should succeed");
        let a_prime = first.edited.clone();
        assert_eq!(first.history_len, 0);
        assert_eq!(orchestrator.snapshot().current_edited, Some(a_prime.clone()));

        let second = orchestrator
            .submit_edit(submit("key", &a_prime, "Enhance colors"))
            .expect("second edit should succeed");
        assert_eq!(second.history_len, 1);
        let snapshot = orchestrator.snapshot();
        assert_eq!(snapshot.history_instructions, vec![String::from("Enhance colors")]);

        let undone = orchestrator.undo().expect("undo should succeed");
        assert_eq!(undone.restored, a_prime);
        assert_eq!(undone.undone_instruction, "Enhance colors");
        let snapshot = orchestrator.snapshot();
        assert_eq!(snapshot.current_edited, Some(a_prime));
        assert_eq!(snapshot.history_len, 0);
        assert_eq!(remote.calls(), 2);
    }

    #[test]
    fn repeated_undo_walks_back_to_the_artifact_before_the_sequence() {
        let orchestrator = EditOrchestrator::new(FakeRemote::with_results(Vec::new()));
        let base = image(b"base");
        orchestrator
            .submit_edit(submit("key", &base, "Fix lighting"))
            .expect("seed edit should succeed");
        let before_sequence = orchestrator.snapshot().current_edited;

        let steps = [image(b"one"), image(b"two"), image(b"three")];
        for (i, step) in steps.iter().enumerate() {
            orchestrator
                .submit_edit(submit("key", step, &format!("step {i}")))
                .expect("edit should succeed");
        }
        assert_eq!(orchestrator.snapshot().history_len, steps.len());

        for _ in 0..steps.len() {
            orchestrator.undo().expect("undo should succeed");
        }
        let snapshot = orchestrator.snapshot();
        assert_eq!(snapshot.current_edited, before_sequence);
        assert_eq!(snapshot.history_len, 0);
    }

    #[test]
    fn missing_inputs_fail_validation_without_dispatch_or_state_change() {
        let remote = FakeRemote::with_results(Vec::new());
        let orchestrator = EditOrchestrator::new(remote.clone());
        let a = image(b"photo-a");
        let before = orchestrator.snapshot();

        let cases = [
            (submit("", &a, "x"), ValidationError::MissingCredential),
            (submit("key", &a, "   "), ValidationError::MissingInstruction),
            (
                SubmitEdit {
                    credential: String::from("key"),
                    image: None,
                    instruction: Some(String::from("x")),
                },
                ValidationError::MissingImage,
            ),
        ];
        for (request, expected) in cases {
            let err = orchestrator
                .submit_edit(request)
                .expect_err("validation should fail");
            assert_eq!(err, EditError::Validation(expected));
            assert_eq!(orchestrator.phase(), EditPhase::Idle);
        }

        assert_eq!(orchestrator.snapshot(), before);
        assert_eq!(remote.calls(), 0);
    }

    #[test]
    fn remote_failure_records_error_and_leaves_artifact_and_history_alone() {
        let remote = FakeRemote::with_results(vec![
            Ok(String::from("Lift shadows")),
            Err(RemoteEditFailure::new("HTTP 401: invalid key")),
        ]);
        let orchestrator = EditOrchestrator::new(remote);
        let a = image(b"photo-a");
        orchestrator
            .submit_edit(submit("key", &a, "Fix lighting"))
            .expect("first edit should succeed");
        let before = orchestrator.snapshot();

        let err = orchestrator
            .submit_edit(submit("bad-key", &a, "Portrait mode"))
            .expect_err("remote failure should surface");
        assert_eq!(
            err,
            EditError::RemoteEdit(RemoteEditFailure::new("HTTP 401: invalid key"))
        );

        let after = orchestrator.snapshot();
        assert_eq!(after.current_edited, before.current_edited);
        assert_eq!(after.history_len, 0);
        assert!(!after.busy);
        assert_eq!(after.last_guidance.as_deref(), Some("Lift shadows"));
        let last_error = after.last_error.expect("last error should be recorded");
        assert_eq!(last_error.code, REMOTE_EDIT_FAILED_CODE);
        assert_eq!(last_error.message, "Failed to edit image: HTTP 401: invalid key");
        assert_eq!(orchestrator.phase(), EditPhase::Idle);
    }

    #[test]
    fn explicit_blank_instruction_does_not_fall_back_to_pending() {
        let remote = FakeRemote::with_results(Vec::new());
        let orchestrator = EditOrchestrator::new(remote.clone());
        let a = image(b"photo-a");
        orchestrator.set_instruction("Fix lighting");
        let before = orchestrator.snapshot();

        for blank in ["", "  \t "] {
            let err = orchestrator
                .submit_edit(submit("key", &a, blank))
                .expect_err("blank instruction should fail");
            assert_eq!(err, EditError::Validation(ValidationError::MissingInstruction));
        }

        assert_eq!(orchestrator.snapshot(), before);
        assert_eq!(remote.calls(), 0);
    }

    #[test]
    fn remote_failure_changes_nothing_but_last_error() {
        let remote = FakeRemote::with_results(vec![Err(RemoteEditFailure::new(
            "HTTP 503: overloaded",
        ))]);
        let orchestrator = EditOrchestrator::new(remote.clone());
        let before = orchestrator.snapshot();

        orchestrator
            .submit_edit(submit("key", &image(b"photo-a"), "Portrait mode"))
            .expect_err("remote failure should surface");
        assert_eq!(remote.calls(), 1);

        let after = orchestrator.snapshot();
        assert!(after.last_error.is_some());
        assert_eq!(
            SessionSnapshot {
                last_error: None,
                ..after
            },
            before
        );
    }

    #[test]
    fn outcomes_carry_the_session_they_left_behind() {
        let orchestrator = EditOrchestrator::new(FakeRemote::with_results(Vec::new()));
        let a = image(b"a");

        let first = orchestrator.submit_edit(submit("key", &a, "one")).expect("edit");
        assert!(!first.session.has_history);
        let second = orchestrator.submit_edit(submit("key", &a, "two")).expect("edit");
        assert!(second.session.has_history);
        assert_eq!(second.session, orchestrator.snapshot());

        let undone = orchestrator.undo().expect("undo");
        assert!(!undone.session.has_history);
        assert_eq!(undone.session, orchestrator.snapshot());

        let reset = orchestrator.reset();
        assert_eq!(reset.session, orchestrator.snapshot());
        assert_eq!(reset.session.original_image, None);
    }

    #[test]
    fn success_after_failure_clears_last_error() {
        let remote = FakeRemote::with_results(vec![
            Err(RemoteEditFailure::new("edit request failed: timeout")),
            Ok(String::from("Warm the highlights")),
        ]);
        let orchestrator = EditOrchestrator::new(remote);
        let a = image(b"photo-a");

        orchestrator
            .submit_edit(submit("key", &a, "Add vintage filter"))
            .expect_err("first call fails");
        assert!(orchestrator.snapshot().last_error.is_some());
        orchestrator
            .submit_edit(submit("key", &a, "Add vintage filter"))
            .expect("second call succeeds");
        assert!(orchestrator.snapshot().last_error.is_none());
    }

    #[test]
    fn undo_on_empty_history_is_a_reported_no_op() {
        let orchestrator = EditOrchestrator::new(FakeRemote::with_results(Vec::new()));
        let before = orchestrator.snapshot();
        assert_eq!(orchestrator.undo(), Err(EditError::EmptyHistory));
        assert_eq!(orchestrator.snapshot(), before);
    }

    #[test]
    fn submit_falls_back_to_uploaded_image_and_pending_instruction() {
        let remote = FakeRemote::with_results(Vec::new());
        let orchestrator = EditOrchestrator::new(remote.clone());
        let a = image(b"uploaded");
        orchestrator.load_image(a.clone()).expect("upload should succeed");
        orchestrator
            .apply_preset("vintage")
            .expect("preset should apply");

        orchestrator
            .submit_edit(SubmitEdit {
                credential: String::from(" key "),
                ..SubmitEdit::default()
            })
            .expect("edit should use session defaults");

        let seen = remote.take_seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].credential, "key");
        assert_eq!(seen[0].image, a);
        assert_eq!(
            seen[0].instruction,
            "Add warm vintage tones with slight grain and faded effect"
        );
        assert_eq!(seen[0].max_tokens, 4096);
    }

    #[test]
    fn load_image_starts_a_fresh_trail() {
        let orchestrator = EditOrchestrator::new(FakeRemote::with_results(Vec::new()));
        let a = image(b"a");
        orchestrator.submit_edit(submit("key", &a, "one")).expect("edit");
        orchestrator.submit_edit(submit("key", &a, "two")).expect("edit");
        assert_eq!(orchestrator.snapshot().history_len, 1);

        let b = image(b"b");
        let snapshot = orchestrator.load_image(b.clone()).expect("upload");
        assert_eq!(snapshot.original_image, Some(b));
        assert_eq!(snapshot.current_edited, None);
        assert_eq!(snapshot.history_len, 0);
    }

    #[test]
    fn reset_clears_session_and_history() {
        let orchestrator = EditOrchestrator::new(FakeRemote::with_results(Vec::new()));
        let a = image(b"a");
        orchestrator.submit_edit(submit("key", &a, "one")).expect("edit");
        orchestrator.submit_edit(submit("key", &a, "two")).expect("edit");
        let old_session = orchestrator.snapshot().session_id;

        let outcome = orchestrator.reset();
        assert!(!outcome.orphaned_dispatch);
        let snapshot = orchestrator.snapshot();
        assert_ne!(snapshot.session_id, old_session);
        assert_eq!(snapshot.original_image, None);
        assert_eq!(snapshot.current_edited, None);
        assert_eq!(snapshot.pending_instruction, "");
        assert_eq!(snapshot.history_len, 0);
    }

    #[test]
    fn busy_session_rejects_submit_undo_and_upload() {
        let (orchestrator, gate) = gated_orchestrator();
        let a = image(b"a");

        let worker = {
            let orchestrator = orchestrator.clone();
            let request = submit("key", &a, "Increase sharpness");
            thread::spawn(move || orchestrator.submit_edit(request))
        };
        gate.entered.recv().expect("dispatch should start");

        let before = orchestrator.snapshot();
        assert!(before.busy);
        assert_eq!(orchestrator.phase(), EditPhase::Dispatching);
        assert_eq!(
            orchestrator.submit_edit(submit("key", &a, "Fix lighting")),
            Err(EditError::Busy)
        );
        assert_eq!(orchestrator.undo(), Err(EditError::Busy));
        assert_eq!(orchestrator.load_image(image(b"b")), Err(EditError::Busy));
        assert_eq!(orchestrator.snapshot(), before);

        gate.release
            .send(Ok(String::from("Apply unsharp mask, radius 1.2")))
            .expect("release should send");
        let outcome = worker
            .join()
            .expect("worker should not panic")
            .expect("gated edit should succeed");
        assert_eq!(outcome.edited, a);
        assert!(!orchestrator.snapshot().busy);
        assert_eq!(orchestrator.phase(), EditPhase::Idle);
    }

    #[test]
    fn reset_mid_flight_orphans_the_dispatch_result() {
        let (orchestrator, gate) = gated_orchestrator();
        let a = image(b"a");

        let worker = {
            let orchestrator = orchestrator.clone();
            let request = submit("key", &a, "Portrait mode");
            thread::spawn(move || orchestrator.submit_edit(request))
        };
        gate.entered.recv().expect("dispatch should start");

        let outcome = orchestrator.reset();
        assert!(outcome.orphaned_dispatch);
        let fresh = orchestrator.snapshot();
        assert!(!fresh.busy);

        gate.release
            .send(Ok(String::from("Blur background")))
            .expect("release should send");
        let result = worker.join().expect("worker should not panic");
        assert_eq!(result, Err(EditError::Superseded));

        let after = orchestrator.snapshot();
        assert_eq!(after, fresh);
        assert_eq!(after.current_edited, None);
    }

    #[test]
    fn download_exports_current_artifact() {
        let orchestrator = EditOrchestrator::new(FakeRemote::with_results(Vec::new()));
        assert_eq!(
            orchestrator.download_current(),
            Err(EditError::NothingToDownload)
        );

        let a = ImageAsset::from_bytes(b"jpeg bytes", Some("image/jpeg")).expect("asset");
        orchestrator
            .submit_edit(submit("key", &a, "Make professional"))
            .expect("edit");
        let artifact = orchestrator.download_current().expect("download");
        assert_eq!(artifact.bytes, b"jpeg bytes".to_vec());
        assert_eq!(artifact.media_type, "image/jpeg");
        assert!(artifact.file_name.starts_with("edited-photo-"));
        assert!(artifact.file_name.ends_with(".jpg"));
    }

    #[test]
    fn submit_debug_output_redacts_credential() {
        let rendered = format!("{:?}", submit("sk-secret", &image(b"a"), "x"));
        assert!(!rendered.contains("sk-secret"));
    }
}
