//! Notes API Endpoints
//! Mission: Expose note CRUD to authenticated owners

use crate::auth::AuthenticatedUser;
use crate::error::json_error;
use crate::notes::{
    models::{CreateNoteRequest, Note, UpdateNoteRequest},
    service::{NoteError, NoteService},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

#[derive(Clone)]
pub struct NoteState {
    pub service: Arc<NoteService>,
}

impl NoteState {
    pub fn new(service: Arc<NoteService>) -> Self {
        Self { service }
    }
}

/// List own notes - GET /notes
pub async fn list_notes(
    State(state): State<NoteState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Note>>, NoteApiError> {
    Ok(Json(state.service.list(user.user_id)?))
}

/// Create note - POST /notes
pub async fn create_note(
    State(state): State<NoteState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateNoteRequest>,
) -> Result<(StatusCode, Json<Note>), NoteApiError> {
    let note = state
        .service
        .create(user.user_id, &payload.title, &payload.content)?;
    Ok((StatusCode::CREATED, Json(note)))
}

/// Get note - GET /notes/:id
pub async fn get_note(
    State(state): State<NoteState>,
    user: AuthenticatedUser,
    Path(note_id): Path<String>,
) -> Result<Json<Note>, NoteApiError> {
    let note_id = parse_note_id(&note_id)?;
    Ok(Json(state.service.get(user.user_id, note_id)?))
}

/// Update note - PUT /notes/:id
pub async fn update_note(
    State(state): State<NoteState>,
    user: AuthenticatedUser,
    Path(note_id): Path<String>,
    Json(payload): Json<UpdateNoteRequest>,
) -> Result<Json<Note>, NoteApiError> {
    let note_id = parse_note_id(&note_id)?;
    let note = state
        .service
        .update(user.user_id, note_id, &payload.title, &payload.content)?;
    Ok(Json(note))
}

/// Delete note - DELETE /notes/:id
pub async fn delete_note(
    State(state): State<NoteState>,
    user: AuthenticatedUser,
    Path(note_id): Path<String>,
) -> Result<StatusCode, NoteApiError> {
    let note_id = parse_note_id(&note_id)?;
    state.service.delete(user.user_id, note_id)?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_note_id(raw: &str) -> Result<Uuid, NoteApiError> {
    Uuid::parse_str(raw).map_err(|_| NoteApiError::InvalidNoteId)
}

/// Notes API errors
#[derive(Debug)]
pub enum NoteApiError {
    InvalidNoteId,
    Validation(&'static str),
    NotFound,
    InternalError,
}

impl From<NoteError> for NoteApiError {
    fn from(err: NoteError) -> Self {
        match err {
            NoteError::Validation(msg) => NoteApiError::Validation(msg),
            // Not owned looks exactly like not there
            NoteError::NotFound | NoteError::AccessDenied => NoteApiError::NotFound,
            NoteError::Storage(e) => {
                error!("Note storage failure: {}", e);
                NoteApiError::InternalError
            }
        }
    }
}

impl IntoResponse for NoteApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            NoteApiError::InvalidNoteId => (StatusCode::BAD_REQUEST, "Invalid note ID format"),
            NoteApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            NoteApiError::NotFound => (StatusCode::NOT_FOUND, "Note not found"),
            NoteApiError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        json_error(status, message)
    }
}
