//! Single payment proof endpoints: analyse, confirm, discard, list, delete.

use crate::handlers::read_multipart;
use crate::middleware::CallerToken;
use crate::models::PaymentProof;
use crate::services::reconciliation::{
    AnalyzedProof, ConfirmProofRequest, ConfirmedProof, DeletedProof, DiscardRequest,
};
use crate::startup::AppState;
use crate::utils::ValidatedJson;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

pub async fn analyze_proof(
    State(state): State<AppState>,
    CallerToken(token): CallerToken,
    Path(payment_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<AnalyzedProof>, AppError> {
    let form = read_multipart(multipart).await?;
    tracing::info!(
        payment_id = %payment_id,
        files = form.files.len(),
        "Proof analysis requested"
    );

    let analyzed = state
        .service
        .analyze_proof(&token, payment_id, form.files)
        .await?;
    Ok(Json(analyzed))
}

pub async fn confirm_proof(
    State(state): State<AppState>,
    CallerToken(token): CallerToken,
    Path(payment_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<ConfirmProofRequest>,
) -> Result<(StatusCode, Json<ConfirmedProof>), AppError> {
    let confirmed = state
        .service
        .confirm_proof(&token, payment_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(confirmed)))
}

pub async fn discard_analysis(
    State(state): State<AppState>,
    CallerToken(token): CallerToken,
    Path(payment_id): Path<Uuid>,
    Json(request): Json<DiscardRequest>,
) -> Result<StatusCode, AppError> {
    state
        .service
        .discard_analysis(&token, payment_id, &request.temp_paths)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_proofs(
    State(state): State<AppState>,
    CallerToken(token): CallerToken,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<Vec<PaymentProof>>, AppError> {
    let proofs = state.service.list_proofs(&token, payment_id).await?;
    Ok(Json(proofs))
}

pub async fn delete_proof(
    State(state): State<AppState>,
    CallerToken(token): CallerToken,
    Path(proof_id): Path<Uuid>,
) -> Result<Json<DeletedProof>, AppError> {
    let deleted = state.service.delete_proof(&token, proof_id).await?;
    Ok(Json(deleted))
}
