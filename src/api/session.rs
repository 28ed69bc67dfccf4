use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::handler_utils::{
    into_json, map_edit_error, task_failure, validation_error, ApiObject,
};
use crate::api::server::AppState;
use crate::edit::presets::{preset_catalog, Preset};
use crate::edit::session::ErrorInfo;
use crate::edit::{ImageAsset, SessionSnapshot, SubmitEdit};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionQuery {
    #[serde(default)]
    pub include_images: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadImageInput {
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetInstructionInput {
    #[serde(default)]
    pub instruction: Option<String>,
    #[serde(default)]
    pub preset: Option<String>,
}

#[derive(Clone, Deserialize)]
pub struct SubmitEditInput {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub instruction: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssetView {
    pub media_type: String,
    pub fingerprint: String,
    pub payload_len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_uri: Option<String>,
}

impl AssetView {
    fn from_asset(asset: &ImageAsset, include_data: bool) -> Self {
        Self {
            media_type: asset.media_type().to_string(),
            fingerprint: asset.fingerprint(),
            payload_len: asset.payload().len(),
            data_uri: include_data.then(|| asset.to_data_uri()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub original_image: Option<AssetView>,
    pub current_edited: Option<AssetView>,
    pub pending_instruction: String,
    pub busy: bool,
    pub can_undo: bool,
    pub history_len: usize,
    pub history: Vec<String>,
    pub last_error: Option<ErrorInfo>,
    pub last_guidance: Option<String>,
}

impl SessionView {
    fn from_snapshot(snapshot: SessionSnapshot, include_images: bool) -> Self {
        Self {
            session_id: snapshot.session_id,
            original_image: snapshot
                .original_image
                .as_ref()
                .map(|asset| AssetView::from_asset(asset, include_images)),
            current_edited: snapshot
                .current_edited
                .as_ref()
                .map(|asset| AssetView::from_asset(asset, include_images)),
            pending_instruction: snapshot.pending_instruction,
            busy: snapshot.busy,
            can_undo: snapshot.has_history && !snapshot.busy,
            history_len: snapshot.history_len,
            history: snapshot.history_instructions,
            last_error: snapshot.last_error,
            last_guidance: snapshot.last_guidance,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct SessionResponse {
    ok: bool,
    session: SessionView,
}

#[derive(Debug, Clone, Serialize)]
struct EditPayload {
    guidance: String,
    edited: AssetView,
    history_len: usize,
}

#[derive(Debug, Clone, Serialize)]
struct EditResponse {
    ok: bool,
    edit: EditPayload,
    session: SessionView,
}

#[derive(Debug, Clone, Serialize)]
struct UndoPayload {
    restored: AssetView,
    undone_instruction: String,
    history_len: usize,
}

#[derive(Debug, Clone, Serialize)]
struct UndoResponse {
    ok: bool,
    undo: UndoPayload,
    session: SessionView,
}

#[derive(Debug, Clone, Serialize)]
struct ResetResponse {
    ok: bool,
    orphaned_dispatch: bool,
    session: SessionView,
}

#[derive(Debug, Clone, Serialize)]
struct PresetsResponse {
    ok: bool,
    quick_edits: Vec<&'static str>,
    presets: Vec<Preset>,
}

pub async fn list_presets_handler() -> ApiObject<Value> {
    let catalog = preset_catalog();
    (
        StatusCode::OK,
        into_json(PresetsResponse {
            ok: true,
            quick_edits: catalog.quick_edits,
            presets: catalog.presets,
        }),
    )
}

pub async fn get_session_handler(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> ApiObject<Value> {
    let snapshot = state.orchestrator.snapshot();
    session_ok(snapshot, query.include_images.unwrap_or(false))
}

pub async fn load_image_handler(
    State(state): State<AppState>,
    Json(payload): Json<LoadImageInput>,
) -> ApiObject<Value> {
    let Some(raw) = payload.image.filter(|v| !v.trim().is_empty()) else {
        return validation_error("Field 'image' is required");
    };
    let image = match ImageAsset::parse(raw.as_str()) {
        Ok(image) => image,
        Err(error) => return map_edit_error(error.into()),
    };

    match state.orchestrator.load_image(image) {
        Ok(snapshot) => session_ok(snapshot, false),
        Err(error) => map_edit_error(error),
    }
}

pub async fn set_instruction_handler(
    State(state): State<AppState>,
    Json(payload): Json<SetInstructionInput>,
) -> ApiObject<Value> {
    if let Some(preset) = payload.preset.as_deref().filter(|v| !v.trim().is_empty()) {
        return match state.orchestrator.apply_preset(preset) {
            Ok(snapshot) => session_ok(snapshot, false),
            Err(error) => map_edit_error(error),
        };
    }
    let Some(instruction) = payload.instruction else {
        return validation_error("Field 'instruction' or 'preset' is required");
    };
    session_ok(state.orchestrator.set_instruction(instruction), false)
}

pub async fn submit_edit_handler(
    State(state): State<AppState>,
    Json(payload): Json<SubmitEditInput>,
) -> ApiObject<Value> {
    // An absent image falls back to the uploaded one; a blank one is an error.
    let image = match payload.image.as_deref() {
        Some(raw) => match ImageAsset::parse(raw) {
            Ok(image) => Some(image),
            Err(error) => return map_edit_error(error.into()),
        },
        None => None,
    };
    let request = SubmitEdit {
        credential: payload.api_key.unwrap_or_default(),
        image,
        instruction: payload.instruction,
    };

    let orchestrator = state.orchestrator.clone();
    let result = tokio::task::spawn_blocking(move || orchestrator.submit_edit(request)).await;

    match result {
        Ok(Ok(outcome)) => (
            StatusCode::OK,
            into_json(EditResponse {
                ok: true,
                edit: EditPayload {
                    guidance: outcome.guidance,
                    edited: AssetView::from_asset(&outcome.edited, false),
                    history_len: outcome.history_len,
                },
                session: SessionView::from_snapshot(outcome.session, false),
            }),
        ),
        Ok(Err(error)) => map_edit_error(error),
        Err(join_error) => task_failure("edit dispatch", join_error),
    }
}

pub async fn undo_handler(State(state): State<AppState>) -> ApiObject<Value> {
    match state.orchestrator.undo() {
        Ok(outcome) => (
            StatusCode::OK,
            into_json(UndoResponse {
                ok: true,
                undo: UndoPayload {
                    restored: AssetView::from_asset(&outcome.restored, false),
                    undone_instruction: outcome.undone_instruction,
                    history_len: outcome.history_len,
                },
                session: SessionView::from_snapshot(outcome.session, false),
            }),
        ),
        Err(error) => map_edit_error(error),
    }
}

pub async fn reset_handler(State(state): State<AppState>) -> ApiObject<Value> {
    let outcome = state.orchestrator.reset();
    (
        StatusCode::OK,
        into_json(ResetResponse {
            ok: true,
            orphaned_dispatch: outcome.orphaned_dispatch,
            session: SessionView::from_snapshot(outcome.session, false),
        }),
    )
}

pub async fn download_handler(State(state): State<AppState>) -> Response {
    let orchestrator = state.orchestrator.clone();
    let result = tokio::task::spawn_blocking(move || orchestrator.download_current()).await;

    match result {
        Ok(Ok(artifact)) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, artifact.media_type),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", artifact.file_name),
                ),
            ],
            artifact.bytes,
        )
            .into_response(),
        Ok(Err(error)) => map_edit_error(error).into_response(),
        Err(join_error) => {
            task_failure("download", join_error).into_response()
        }
    }
}

fn session_ok(snapshot: SessionSnapshot, include_images: bool) -> ApiObject<Value> {
    (
        StatusCode::OK,
        into_json(SessionResponse {
            ok: true,
            session: SessionView::from_snapshot(snapshot, include_images),
        }),
    )
}
