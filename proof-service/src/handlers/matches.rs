//! Bank statement matching wizard.

use crate::handlers::{read_multipart, MultipartForm};
use crate::middleware::CallerToken;
use crate::services::reconciliation::{ApplyMatch, AppliedMatches, MatchReport};
use crate::services::UploadedFile;
use crate::startup::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

const FILE_FIELD: &str = "file";
const MATCHES_FIELD: &str = "matches";

pub async fn match_statement(
    State(state): State<AppState>,
    CallerToken(token): CallerToken,
    Path(tranche_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<MatchReport>, AppError> {
    let form = read_multipart(multipart).await?;
    let file = statement_file(form.files)?;

    let report = state
        .service
        .match_statement(&token, tranche_id, file)
        .await?;
    Ok(Json(report))
}

pub async fn apply_matches(
    State(state): State<AppState>,
    CallerToken(token): CallerToken,
    Path(tranche_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<AppliedMatches>), AppError> {
    let MultipartForm { files, fields } = read_multipart(multipart).await?;
    let file = statement_file(files)?;

    let raw = fields.get(MATCHES_FIELD).ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!("Missing '{}' field", MATCHES_FIELD))
    })?;
    let matches: Vec<ApplyMatch> = serde_json::from_str(raw)
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid matches: {}", e)))?;

    let applied = state
        .service
        .apply_matches(&token, tranche_id, file, matches)
        .await?;
    Ok((StatusCode::CREATED, Json(applied)))
}

/// The single statement upload; extra files are ignored.
fn statement_file(files: Vec<UploadedFile>) -> Result<UploadedFile, AppError> {
    files
        .into_iter()
        .next()
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Missing '{}' upload", FILE_FIELD)))
}
