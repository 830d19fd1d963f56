use crate::matching::validate_siren;
use axum::{extract::Path, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct SirenCheck {
    pub siren: String,
    pub valid: bool,
}

/// Checksum-only validation of a French company identifier.
pub async fn check_siren(Path(siren): Path<String>) -> Json<SirenCheck> {
    let valid = validate_siren(&siren);
    Json(SirenCheck { siren, valid })
}
