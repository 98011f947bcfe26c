use axum::{
    Json,
    body::{Body, to_bytes},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::{
    archive::ArchiveError,
    error::{AppError, AppResult},
    identity::UserId,
    models::EditContext,
    pages,
    route::Operation,
    state::AppState,
    storage::{ElectionDb, ElectionRecord},
};

/// Largest election document accepted on create or update.
pub const ELECTION_BODY_LIMIT: usize = 1_000_000;

/// Largest scanned image accepted on upload.
pub const SCAN_BODY_LIMIT: usize = 20 * 1024 * 1024;

/// Runs one resolved operation. Identity is checked before any storage,
/// cache or body access.
pub async fn handle(
    state: &AppState,
    operation: Operation,
    user: Option<UserId>,
    headers: &HeaderMap,
    body: Body,
) -> AppResult<Response> {
    if operation.requires_identity() && user.is_none() {
        return Err(AppError::unauthorized());
    }

    match operation {
        Operation::Home => Ok(pages::home(user).into_response()),
        Operation::Unsupported => Ok(nope()),
        Operation::BadItem => Err(AppError::bad_request("bad item")),
        Operation::ScanForm(id) => Ok(pages::scan_form(id).into_response()),
        Operation::CreateElection => {
            let owner = user.ok_or_else(AppError::unauthorized)?;
            create_election(state, owner, body).await
        }
        Operation::UpdateElection(id) => {
            let caller = user.ok_or_else(AppError::unauthorized)?;
            update_election(state, caller, id, body).await
        }
        Operation::ReadElection(id) => read_election(state, id).await,
        Operation::ElectionPdf(id) => {
            let ballot = state.artifacts.ballot(state.storage.as_ref(), id).await?;
            Ok(([(header::CONTENT_TYPE, "application/pdf")], ballot.pdf).into_response())
        }
        Operation::ElectionBubbles(id) => {
            let ballot = state.artifacts.ballot(state.storage.as_ref(), id).await?;
            Ok(([(header::CONTENT_TYPE, "application/json")], ballot.bubbles).into_response())
        }
        Operation::ElectionPng(id) => {
            let png = state.artifacts.png(state.storage.as_ref(), id).await?;
            Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
        }
        Operation::ScanUpload(id) => {
            let caller = user.ok_or_else(AppError::unauthorized)?;
            upload_scan(state, caller, id, headers, body).await
        }
    }
}

/// Answer for a known election path asked with a method it does not serve.
fn nope() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": "nope" })),
    )
        .into_response()
}

async fn open_db(state: &AppState) -> AppResult<Box<dyn ElectionDb>> {
    state
        .storage
        .connect()
        .await
        .map_err(|err| AppError::backend("could not open db", err))
}

/// Reads a size-limited body that must hold a JSON object (or `null`); the
/// text is kept exactly as sent.
async fn election_document(body: Body) -> AppResult<String> {
    let bytes = to_bytes(body, ELECTION_BODY_LIMIT)
        .await
        .map_err(|_| AppError::bad_request("bad body"))?;
    let text = String::from_utf8(bytes.to_vec()).map_err(|_| AppError::bad_request("bad json"))?;
    serde_json::from_str::<Option<Map<String, Value>>>(&text)
        .map_err(|_| AppError::bad_request("bad json"))?;
    Ok(text)
}

async fn create_election(state: &AppState, owner: UserId, body: Body) -> AppResult<Response> {
    let data = election_document(body).await?;
    let mut db = open_db(state).await?;

    let id = db
        .put_election(&ElectionRecord::new(owner, data))
        .await
        .map_err(|err| AppError::storage("db put fail", err))?;
    state.artifacts.invalidate(id);

    info!(election_id = id, %owner, "created election");
    Ok(Json(EditContext::for_election(id)).into_response())
}

async fn update_election(
    state: &AppState,
    caller: UserId,
    id: i64,
    body: Body,
) -> AppResult<Response> {
    let data = election_document(body).await?;
    let mut db = open_db(state).await?;

    let existing = db
        .get_election(id)
        .await
        .map_err(|err| AppError::storage("db get fail", err))?;
    if existing.owner != caller {
        warn!(election_id = id, %caller, owner = %existing.owner, "update by non-owner refused");
        return Err(AppError::unauthorized());
    }

    let record = ElectionRecord {
        id,
        owner: existing.owner,
        data,
    };
    let id = db
        .put_election(&record)
        .await
        .map_err(|err| AppError::storage("db put fail", err))?;
    state.artifacts.invalidate(id);

    info!(election_id = id, "updated election");
    Ok(Json(EditContext::for_election(id)).into_response())
}

async fn read_election(state: &AppState, id: i64) -> AppResult<Response> {
    let mut db = open_db(state).await?;
    let record = db
        .get_election(id)
        .await
        .map_err(|err| AppError::storage("db get fail", err))?;

    Ok(([(header::CONTENT_TYPE, "application/json")], record.data).into_response())
}

async fn upload_scan(
    state: &AppState,
    caller: UserId,
    id: i64,
    headers: &HeaderMap,
    body: Body,
) -> AppResult<Response> {
    let archiver = state
        .archiver
        .as_ref()
        .ok_or_else(|| AppError::backend("scan archive fail", ArchiveError::NotConfigured))?;

    let image = to_bytes(body, SCAN_BODY_LIMIT)
        .await
        .map_err(|_| AppError::bad_request("bad body"))?;
    if image.is_empty() {
        return Err(AppError::bad_request("bad body"));
    }

    let mut db = open_db(state).await?;
    db.get_election(id)
        .await
        .map_err(|err| AppError::storage("db get fail", err))?;
    drop(db);

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    archiver
        .archive(id, content_type, image)
        .await
        .map_err(|err| AppError::backend("scan archive fail", err))?;

    info!(election_id = id, %caller, "scan uploaded");
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "text/plain")], "ok").into_response())
}
