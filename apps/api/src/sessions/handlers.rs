use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::document::CvDocument;
use crate::driver::{spawn_session, MoveDirection, NavigateAction, PaginationSnapshot, SessionHandle};
use crate::errors::AppError;
use crate::pagination::PaginationConfig;
use crate::state::AppState;

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct CreateSessionRequest {
    pub document: CvDocument,
    pub config: Option<PaginationConfig>,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub snapshot: Arc<PaginationSnapshot>,
}

#[derive(Deserialize)]
pub struct ReorderRequest {
    pub from: usize,
    pub to: usize,
}

#[derive(Deserialize)]
pub struct MoveRequest {
    pub section_id: String,
    pub direction: MoveDirection,
}

#[derive(Deserialize)]
pub struct JumpRequest {
    pub section_id: String,
}

#[derive(Serialize)]
pub struct ChangeResponse {
    /// False when the request was a no-op (same index, out of range, first/last page).
    pub changed: bool,
    pub snapshot: Arc<PaginationSnapshot>,
}

#[derive(Serialize)]
pub struct JumpResponse {
    pub page: u32,
    pub snapshot: Arc<PaginationSnapshot>,
}

async fn find_session(state: &AppState, id: Uuid) -> Result<SessionHandle, AppError> {
    state
        .session(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))
}

/// POST /api/v1/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let config = req.config.unwrap_or_else(|| state.page_config.clone());
    let handle = spawn_session(
        req.document,
        config,
        Arc::clone(&state.measurer),
        state.config.debounce,
    )?;
    let snapshot = handle.flush().await?;

    let session_id = Uuid::new_v4();
    state.insert_session(session_id, handle).await;
    info!(%session_id, pages = snapshot.state.total_pages, "Pagination session opened");

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            session_id,
            snapshot,
        }),
    ))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let handle = find_session(&state, id).await?;
    Ok(Json(SessionResponse {
        session_id: id,
        snapshot: handle.snapshot(),
    }))
}

/// PUT /api/v1/sessions/:id/document
/// Accepted immediately; the new layout is published after the debounce window.
pub async fn handle_update_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(document): Json<CvDocument>,
) -> Result<StatusCode, AppError> {
    let handle = find_session(&state, id).await?;
    handle.update_document(document).await?;
    Ok(StatusCode::ACCEPTED)
}

/// PUT /api/v1/sessions/:id/config
pub async fn handle_update_config(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(config): Json<PaginationConfig>,
) -> Result<Json<SessionResponse>, AppError> {
    let handle = find_session(&state, id).await?;
    handle.update_config(config).await?;
    let snapshot = handle.flush().await?;
    Ok(Json(SessionResponse {
        session_id: id,
        snapshot,
    }))
}

/// POST /api/v1/sessions/:id/reorder
pub async fn handle_reorder(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReorderRequest>,
) -> Result<Json<ChangeResponse>, AppError> {
    let handle = find_session(&state, id).await?;
    let changed = handle.reorder(req.from, req.to).await?;
    let snapshot = handle.flush().await?;
    Ok(Json(ChangeResponse { changed, snapshot }))
}

/// POST /api/v1/sessions/:id/move
pub async fn handle_move_section(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<MoveRequest>,
) -> Result<Json<ChangeResponse>, AppError> {
    let handle = find_session(&state, id).await?;
    let changed = handle.move_section(req.section_id, req.direction).await?;
    let snapshot = handle.flush().await?;
    Ok(Json(ChangeResponse { changed, snapshot }))
}

/// POST /api/v1/sessions/:id/navigate
pub async fn handle_navigate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(action): Json<NavigateAction>,
) -> Result<Json<ChangeResponse>, AppError> {
    let handle = find_session(&state, id).await?;
    let changed = handle.navigate(action).await?;
    Ok(Json(ChangeResponse {
        changed,
        snapshot: handle.snapshot(),
    }))
}

/// POST /api/v1/sessions/:id/jump
pub async fn handle_jump_to_section(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<JumpRequest>,
) -> Result<Json<JumpResponse>, AppError> {
    let handle = find_session(&state, id).await?;
    let page = handle.jump_to_section(req.section_id).await?;
    Ok(Json(JumpResponse {
        page,
        snapshot: handle.snapshot(),
    }))
}

/// DELETE /api/v1/sessions/:id
/// Dropping the last handle stops the session actor.
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .sessions
        .write()
        .await
        .remove(&id)
        .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))?;
    info!(session_id = %id, "Pagination session closed");
    Ok(StatusCode::NO_CONTENT)
}
