//! Payment proof reconciliation flows.
//!
//! Single proof: upload → rasterise → temp bucket → remote analysis →
//! confirm (copy to permanent bucket, proof row, payment paid) or discard.
//! Statement wizard: extract candidate lines from a CSV/PDF statement, match
//! them against the tranche's subscriptions, then apply the retained matches.

use crate::matching::{match_candidate, MatchOutcome};
use crate::models::{
    ExtractedPaymentData, MatchStatus, NewPaymentProof, Payment, PaymentProof, PaymentStatus,
    PaymentStatusUpdate, ProofAnalysis, Subscription, Tranche, PAYMENTS_TABLE, PROOFS_TABLE,
    SUBSCRIPTIONS_TABLE, TRANCHES_TABLE,
};
use crate::services::analysis::{AnalysisClient, ExpectedPayment};
use crate::services::backend::{AccessToken, BackendClient, Query};
use crate::services::converter::{DocumentConverter, ProofImage, ProofKind, UploadedFile};
use crate::services::metrics;
use crate::services::statement::{self, StatementCandidate, StatementFormat};
use crate::services::storage::Storage;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

const SUBSCRIPTION_WITH_INVESTOR: &str = "*,investisseur:investisseurs(*)";
const WIZARD_CONFIDENCE: f64 = 100.0;

// ============================================================================
// Request / response shapes
// ============================================================================

#[derive(Debug, Serialize)]
pub struct AnalyzedProof {
    pub temp_paths: Vec<String>,
    pub file_urls: Vec<String>,
    pub analysis: ProofAnalysis,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ConfirmProofRequest {
    pub temp_paths: Vec<String>,
    #[validate(length(min = 1, max = 255))]
    pub file_name: String,
    #[serde(default)]
    pub analysis: Option<ProofAnalysis>,
}

#[derive(Debug, Deserialize)]
pub struct DiscardRequest {
    pub temp_paths: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ConfirmedProof {
    pub proof: PaymentProof,
    pub payment_status: PaymentStatus,
    pub date_paiement: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct DeletedProof {
    pub proof_id: Uuid,
    pub payment_id: Uuid,
    pub remaining_proofs: bool,
    /// New payment status when the last proof was removed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
}

#[derive(Debug, Serialize)]
pub struct StatementMatch {
    pub candidate: StatementCandidate,
    #[serde(flatten)]
    pub outcome: MatchOutcome,
    /// Earliest unpaid payment of the matched subscription.
    pub payment: Option<Payment>,
}

#[derive(Debug, Default, Serialize)]
pub struct MatchCounts {
    pub ok: usize,
    pub mismatch: usize,
    pub no_match: usize,
    pub ambiguous: usize,
}

#[derive(Debug, Serialize)]
pub struct MatchReport {
    pub tranche_id: Uuid,
    pub tranche_name: String,
    pub counts: MatchCounts,
    pub matches: Vec<StatementMatch>,
}

/// One wizard line retained by the user, possibly overridden by hand.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplyMatch {
    pub payment_id: Uuid,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AppliedMatches {
    pub file_url: String,
    pub proofs: Vec<PaymentProof>,
}

// ============================================================================
// Service
// ============================================================================

pub struct ReconciliationService {
    backend: BackendClient,
    storage: Arc<dyn Storage>,
    analysis: AnalysisClient,
    converter: DocumentConverter,
    temp_bucket: String,
    proof_bucket: String,
    max_upload_bytes: usize,
}

pub struct ReconciliationSettings {
    pub temp_bucket: String,
    pub proof_bucket: String,
    pub max_upload_bytes: usize,
}

impl ReconciliationService {
    pub fn new(
        backend: BackendClient,
        storage: Arc<dyn Storage>,
        analysis: AnalysisClient,
        converter: DocumentConverter,
        settings: ReconciliationSettings,
    ) -> Self {
        Self {
            backend,
            storage,
            analysis,
            converter,
            temp_bucket: settings.temp_bucket,
            proof_bucket: settings.proof_bucket,
            max_upload_bytes: settings.max_upload_bytes,
        }
    }

    pub fn backend(&self) -> &BackendClient {
        &self.backend
    }

    /// Upload proof files to the temp bucket and have them analysed against
    /// the payment. Temp files are removed again if anything fails.
    #[instrument(skip(self, token, files), fields(files = files.len()))]
    pub async fn analyze_proof(
        &self,
        token: &AccessToken,
        payment_id: Uuid,
        files: Vec<UploadedFile>,
    ) -> Result<AnalyzedProof, AppError> {
        let typed = self.check_uploads(files)?;

        let payment = self.load_payment(token, payment_id).await?;
        let investor_name = match payment.souscription_id {
            Some(subscription_id) => self
                .load_subscription(token, subscription_id)
                .await?
                .and_then(|s| s.investor_name().map(str::to_string)),
            None => None,
        };

        let mut images = Vec::new();
        for (kind, file) in &typed {
            images.extend(self.converter.to_images(*kind, file).await?);
        }

        let expected = ExpectedPayment {
            payment_id,
            amount: payment.montant,
            investor_name,
            due_date: payment.date_echeance,
        };

        let mut temp_paths = Vec::with_capacity(images.len());
        match self
            .upload_and_analyze(token, &expected, images, &mut temp_paths)
            .await
        {
            Ok((file_urls, analysis)) => {
                metrics::record_analysis(analysis.status.as_str());
                Ok(AnalyzedProof {
                    temp_paths,
                    file_urls,
                    analysis,
                })
            }
            Err(e) => {
                metrics::record_analysis("failed");
                self.remove_temp_files(token, &temp_paths).await;
                Err(e)
            }
        }
    }

    async fn upload_and_analyze(
        &self,
        token: &AccessToken,
        expected: &ExpectedPayment,
        images: Vec<ProofImage>,
        temp_paths: &mut Vec<String>,
    ) -> Result<(Vec<String>, ProofAnalysis), AppError> {
        let batch = Uuid::new_v4();
        for (index, image) in images.into_iter().enumerate() {
            let path = format!(
                "{}/{}-{}.{}",
                expected.payment_id,
                batch,
                index + 1,
                image.kind.extension()
            );
            self.storage
                .upload(
                    token,
                    &self.temp_bucket,
                    &path,
                    image.kind.content_type(),
                    image.data,
                )
                .await?;
            temp_paths.push(path);
        }

        let file_urls: Vec<String> = temp_paths
            .iter()
            .map(|p| self.storage.public_url(&self.temp_bucket, p))
            .collect();

        let analysis = self.analysis.analyze(token, expected, &file_urls).await?;
        Ok((file_urls, analysis))
    }

    /// Keep the first analysed image as the payment's proof and mark the
    /// payment paid.
    #[instrument(skip(self, token, request))]
    pub async fn confirm_proof(
        &self,
        token: &AccessToken,
        payment_id: Uuid,
        request: ConfirmProofRequest,
    ) -> Result<ConfirmedProof, AppError> {
        check_temp_paths(payment_id, &request.temp_paths)?;
        let payment = self.load_payment(token, payment_id).await?;

        let first = &request.temp_paths[0];
        let data = self
            .storage
            .download(token, &self.temp_bucket, first)
            .await?;
        let kind = ProofKind::sniff(&data);
        let extension = kind
            .map(|k| k.extension())
            .or_else(|| first.rsplit_once('.').map(|(_, ext)| ext))
            .unwrap_or("bin");
        let content_type = kind
            .map(|k| k.content_type())
            .unwrap_or("application/octet-stream");

        let permanent_path = format!("{}/{}.{}", payment_id, Uuid::new_v4(), extension);
        let file_size = data.len() as i64;
        self.storage
            .upload(token, &self.proof_bucket, &permanent_path, content_type, data)
            .await?;

        let (extracted, confidence) = request
            .analysis
            .map(|a| (a.extracted, a.confidence))
            .unwrap_or_default();
        let paid_on = extracted.date.unwrap_or_else(|| Utc::now().date_naive());

        let row = NewPaymentProof {
            paiement_id: payment.id,
            file_url: permanent_path.clone(),
            file_name: request.file_name,
            file_size,
            extracted_data: extracted,
            confidence,
            validated_at: Utc::now(),
        };
        let proof: PaymentProof = match self.backend.insert(token, PROOFS_TABLE, &row).await {
            Ok(proof) => proof,
            Err(e) => {
                metrics::record_confirmation("failed");
                self.remove_files(token, &self.proof_bucket, &[permanent_path])
                    .await;
                return Err(e);
            }
        };

        // Temp files are kept on failure so the user can retry the confirmation.
        if let Err(e) = self.mark_paid(token, payment.id, paid_on).await {
            metrics::record_confirmation("failed");
            self.remove_proof_row(token, proof.id).await;
            self.remove_files(token, &self.proof_bucket, &[permanent_path])
                .await;
            return Err(e);
        }
        self.remove_temp_files(token, &request.temp_paths).await;

        metrics::record_confirmation("confirmed");
        info!(proof_id = %proof.id, payment_id = %payment.id, "Payment proof confirmed");

        Ok(ConfirmedProof {
            proof,
            payment_status: PaymentStatus::Paid,
            date_paiement: paid_on,
        })
    }

    /// Drop an analysis the user rejected.
    pub async fn discard_analysis(
        &self,
        token: &AccessToken,
        payment_id: Uuid,
        temp_paths: &[String],
    ) -> Result<(), AppError> {
        check_temp_paths(payment_id, temp_paths)?;
        self.storage
            .delete(token, &self.temp_bucket, temp_paths)
            .await?;
        metrics::record_confirmation("discarded");
        Ok(())
    }

    pub async fn list_proofs(
        &self,
        token: &AccessToken,
        payment_id: Uuid,
    ) -> Result<Vec<PaymentProof>, AppError> {
        let query = Query::table(PROOFS_TABLE)
            .select("*")
            .eq("paiement_id", payment_id)
            .order("validated_at", true);
        self.backend.select(token, &query).await
    }

    /// Remove a proof; the payment falls back to pending/late once it has
    /// none left.
    #[instrument(skip(self, token))]
    pub async fn delete_proof(
        &self,
        token: &AccessToken,
        proof_id: Uuid,
    ) -> Result<DeletedProof, AppError> {
        let proof: PaymentProof = self
            .backend
            .select_one(token, Query::table(PROOFS_TABLE).select("*").eq("id", proof_id))
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Proof {} not found", proof_id)))?;

        // Statement proofs share one file across payments.
        let sharing: Vec<IdRow> = self
            .backend
            .select(
                token,
                &Query::table(PROOFS_TABLE)
                    .select("id")
                    .eq("file_url", &proof.file_url),
            )
            .await?;
        let shared = sharing.iter().any(|row| row.id != proof.id);

        let deleted = self
            .backend
            .delete_rows(token, &Query::table(PROOFS_TABLE).eq("id", proof.id))
            .await?;
        if deleted == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Proof {} not found",
                proof_id
            )));
        }

        if !shared {
            self.remove_files(token, &self.proof_bucket, &[proof.file_url.clone()])
                .await;
        }

        let remaining: Vec<IdRow> = self
            .backend
            .select(
                token,
                &Query::table(PROOFS_TABLE)
                    .select("id")
                    .eq("paiement_id", proof.paiement_id)
                    .limit(1),
            )
            .await?;

        let mut payment_status = None;
        if remaining.is_empty() {
            let payment = self.load_payment(token, proof.paiement_id).await?;
            let status =
                PaymentStatus::unpaid_for(payment.date_echeance, Utc::now().date_naive());
            self.update_payment(
                token,
                payment.id,
                &PaymentStatusUpdate {
                    statut: status,
                    date_paiement: None,
                },
            )
            .await?;
            info!(payment_id = %payment.id, status = status.as_str(), "Payment reverted after last proof removed");
            payment_status = Some(status);
        }

        Ok(DeletedProof {
            proof_id: proof.id,
            payment_id: proof.paiement_id,
            remaining_proofs: !remaining.is_empty(),
            payment_status,
        })
    }

    /// Match every line of a bank statement against the tranche's subscriptions.
    #[instrument(skip(self, token, file), fields(file_name = %file.file_name))]
    pub async fn match_statement(
        &self,
        token: &AccessToken,
        tranche_id: Uuid,
        file: UploadedFile,
    ) -> Result<MatchReport, AppError> {
        self.check_size(&file)?;
        let candidates = self.extract_candidates(&file).await?;
        let tranche = self.load_tranche(token, tranche_id).await?;

        let subscriptions: Vec<Subscription> = self
            .backend
            .select(
                token,
                &Query::table(SUBSCRIPTIONS_TABLE)
                    .select(SUBSCRIPTION_WITH_INVESTOR)
                    .eq("tranche_id", tranche_id),
            )
            .await?;
        let unpaid: Vec<Payment> = self
            .backend
            .select(
                token,
                &Query::table(PAYMENTS_TABLE)
                    .select("*")
                    .eq("tranche_id", tranche_id)
                    .in_list(
                        "statut",
                        &[PaymentStatus::Pending.as_str(), PaymentStatus::Late.as_str()],
                    )
                    .order("date_echeance", false),
            )
            .await?;

        let mut counts = MatchCounts::default();
        let matches: Vec<StatementMatch> = candidates
            .into_iter()
            .map(|candidate| {
                let outcome = match_candidate(&candidate.name, candidate.amount, &subscriptions);
                counts.record(&outcome);
                metrics::record_match(outcome.status.as_str());

                let payment = match (&outcome.status, &outcome.best) {
                    (MatchStatus::Ok | MatchStatus::Mismatch, Some(best)) => unpaid
                        .iter()
                        .find(|p| p.souscription_id == Some(best.subscription_id))
                        .cloned(),
                    _ => None,
                };

                StatementMatch {
                    candidate,
                    outcome,
                    payment,
                }
            })
            .collect();

        info!(
            candidates = matches.len(),
            ok = counts.ok,
            mismatch = counts.mismatch,
            no_match = counts.no_match,
            "Statement matched"
        );

        Ok(MatchReport {
            tranche_id,
            tranche_name: tranche.tranche_name,
            counts,
            matches,
        })
    }

    /// Store the statement once and record it as the proof of every retained
    /// payment, marking each paid.
    #[instrument(skip(self, token, file, matches), fields(matches = matches.len()))]
    pub async fn apply_matches(
        &self,
        token: &AccessToken,
        tranche_id: Uuid,
        file: UploadedFile,
        matches: Vec<ApplyMatch>,
    ) -> Result<AppliedMatches, AppError> {
        if matches.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!("No matches to apply")));
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = matches.iter().find(|m| !seen.insert(m.payment_id)) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment {} listed more than once",
                duplicate.payment_id
            )));
        }

        self.check_size(&file)?;
        let format = StatementFormat::detect(&file.file_name, &file.content_type, &file.data)
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Statement must be a CSV or PDF file")))?;

        let ids: Vec<Uuid> = matches.iter().map(|m| m.payment_id).collect();
        let payments: Vec<Payment> = self
            .backend
            .select(
                token,
                &Query::table(PAYMENTS_TABLE).select("*").in_list("id", &ids),
            )
            .await?;
        for id in &ids {
            match payments.iter().find(|p| p.id == *id) {
                Some(p) if p.tranche_id == tranche_id => {}
                _ => {
                    return Err(AppError::BadRequest(anyhow::anyhow!(
                        "Payment {} does not belong to tranche {}",
                        id,
                        tranche_id
                    )))
                }
            }
        }

        let (extension, content_type) = match format {
            StatementFormat::Pdf => ("pdf", "application/pdf"),
            StatementFormat::Csv => ("csv", "text/csv"),
        };
        let file_url = format!("{}/{}.{}", tranche_id, Uuid::new_v4(), extension);
        let file_size = file.data.len() as i64;
        self.storage
            .upload(token, &self.proof_bucket, &file_url, content_type, file.data)
            .await?;

        let today = Utc::now().date_naive();
        let mut proofs = Vec::with_capacity(matches.len());
        for m in matches {
            let row = NewPaymentProof {
                paiement_id: m.payment_id,
                file_url: file_url.clone(),
                file_name: file.file_name.clone(),
                file_size,
                extracted_data: ExtractedPaymentData {
                    amount: m.amount,
                    date: Some(today),
                    beneficiary: m.name,
                    reference: None,
                },
                confidence: WIZARD_CONFIDENCE,
                validated_at: Utc::now(),
            };

            let inserted = self.backend.insert(token, PROOFS_TABLE, &row).await;
            let proof: PaymentProof = match inserted {
                Ok(proof) => proof,
                Err(e) => {
                    metrics::record_confirmation("failed");
                    if proofs.is_empty() {
                        self.remove_files(token, &self.proof_bucket, &[file_url.clone()])
                            .await;
                    }
                    return Err(e);
                }
            };
            self.mark_paid(token, m.payment_id, today).await?;
            metrics::record_confirmation("confirmed");
            proofs.push(proof);
        }

        info!(tranche_id = %tranche_id, proofs = proofs.len(), "Statement matches applied");
        Ok(AppliedMatches { file_url, proofs })
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn check_uploads(
        &self,
        files: Vec<UploadedFile>,
    ) -> Result<Vec<(ProofKind, UploadedFile)>, AppError> {
        if files.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!("No file uploaded")));
        }
        files
            .into_iter()
            .map(|file| {
                self.check_size(&file)?;
                let kind = ProofKind::from_upload(&file.content_type, &file.data).ok_or_else(|| {
                    AppError::BadRequest(anyhow::anyhow!(
                        "Unsupported file type for {}: expected PDF, PNG, JPEG or WebP",
                        file.file_name
                    ))
                })?;
                Ok((kind, file))
            })
            .collect()
    }

    fn check_size(&self, file: &UploadedFile) -> Result<(), AppError> {
        if file.data.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "{} is empty",
                file.file_name
            )));
        }
        if file.data.len() > self.max_upload_bytes {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "{} exceeds the {} byte upload limit",
                file.file_name,
                self.max_upload_bytes
            )));
        }
        Ok(())
    }

    async fn extract_candidates(
        &self,
        file: &UploadedFile,
    ) -> Result<Vec<StatementCandidate>, AppError> {
        match StatementFormat::detect(&file.file_name, &file.content_type, &file.data) {
            Some(StatementFormat::Csv) => statement::parse_csv(&file.data),
            Some(StatementFormat::Pdf) => {
                let text = self.converter.pdf_text(&file.data).await?;
                Ok(statement::parse_text(&text))
            }
            None => Err(AppError::BadRequest(anyhow::anyhow!(
                "Statement must be a CSV or PDF file"
            ))),
        }
    }

    async fn load_payment(&self, token: &AccessToken, payment_id: Uuid) -> Result<Payment, AppError> {
        self.backend
            .select_one(token, Query::table(PAYMENTS_TABLE).select("*").eq("id", payment_id))
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment {} not found", payment_id)))
    }

    async fn load_subscription(
        &self,
        token: &AccessToken,
        subscription_id: Uuid,
    ) -> Result<Option<Subscription>, AppError> {
        self.backend
            .select_one(
                token,
                Query::table(SUBSCRIPTIONS_TABLE)
                    .select(SUBSCRIPTION_WITH_INVESTOR)
                    .eq("id", subscription_id),
            )
            .await
    }

    async fn load_tranche(&self, token: &AccessToken, tranche_id: Uuid) -> Result<Tranche, AppError> {
        self.backend
            .select_one(token, Query::table(TRANCHES_TABLE).select("*").eq("id", tranche_id))
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Tranche {} not found", tranche_id)))
    }

    async fn mark_paid(
        &self,
        token: &AccessToken,
        payment_id: Uuid,
        paid_on: NaiveDate,
    ) -> Result<(), AppError> {
        self.update_payment(
            token,
            payment_id,
            &PaymentStatusUpdate {
                statut: PaymentStatus::Paid,
                date_paiement: Some(paid_on),
            },
        )
        .await
    }

    async fn update_payment(
        &self,
        token: &AccessToken,
        payment_id: Uuid,
        update: &PaymentStatusUpdate,
    ) -> Result<(), AppError> {
        let updated = self
            .backend
            .update(token, &Query::table(PAYMENTS_TABLE).eq("id", payment_id), update)
            .await?;
        if updated == 0 {
            return Err(AppError::Forbidden(anyhow::anyhow!(
                "Payment {} could not be updated",
                payment_id
            )));
        }
        Ok(())
    }

    async fn remove_proof_row(&self, token: &AccessToken, proof_id: Uuid) {
        if let Err(e) = self
            .backend
            .delete_rows(token, &Query::table(PROOFS_TABLE).eq("id", proof_id))
            .await
        {
            metrics::record_error("proof_rollback");
            warn!(proof_id = %proof_id, error = %e, "Failed to remove orphaned proof row");
        }
    }

    async fn remove_temp_files(&self, token: &AccessToken, paths: &[String]) {
        self.remove_files(token, &self.temp_bucket, paths).await;
    }

    /// Best-effort cleanup; failures are logged, never returned.
    async fn remove_files(&self, token: &AccessToken, bucket: &str, paths: &[String]) {
        if paths.is_empty() {
            return;
        }
        if let Err(e) = self.storage.delete(token, bucket, paths).await {
            metrics::record_error("storage_cleanup");
            warn!(bucket = %bucket, files = paths.len(), error = %e, "Failed to remove files");
        }
    }
}

impl MatchCounts {
    fn record(&mut self, outcome: &MatchOutcome) {
        match outcome.status {
            MatchStatus::Ok => self.ok += 1,
            MatchStatus::Mismatch => self.mismatch += 1,
            MatchStatus::NoMatch => self.no_match += 1,
        }
        if outcome.ambiguous {
            self.ambiguous += 1;
        }
    }
}

#[derive(Debug, Deserialize)]
struct IdRow {
    id: Uuid,
}

/// Temp files of a payment live under `{payment_id}/`.
pub fn check_temp_paths(payment_id: Uuid, paths: &[String]) -> Result<(), AppError> {
    if paths.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "At least one temporary file is required"
        )));
    }
    let prefix = format!("{}/", payment_id);
    for path in paths {
        let valid = path.strip_prefix(&prefix).is_some_and(|rest| {
            !rest
                .split('/')
                .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        });
        if !valid {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Temporary file {} does not belong to payment {}",
                path,
                payment_id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_paths_must_stay_under_the_payment() {
        let id = Uuid::new_v4();
        let own = format!("{}/{}-1.png", id, Uuid::new_v4());
        assert!(check_temp_paths(id, &[own]).is_ok());

        let other = format!("{}/x-1.png", Uuid::new_v4());
        assert!(matches!(
            check_temp_paths(id, &[other]),
            Err(AppError::BadRequest(_))
        ));
        assert!(check_temp_paths(id, &[format!("{}/../other/x.png", id)]).is_err());
        assert!(check_temp_paths(id, &[format!("{}/", id)]).is_err());
        assert!(check_temp_paths(id, &[]).is_err());
    }

    #[test]
    fn counts_follow_outcomes() {
        let mut counts = MatchCounts::default();
        counts.record(&MatchOutcome {
            status: MatchStatus::Ok,
            best: None,
            ambiguous: true,
            tied_subscription_ids: vec![Uuid::nil(), Uuid::nil()],
        });
        counts.record(&MatchOutcome {
            status: MatchStatus::NoMatch,
            best: None,
            ambiguous: false,
            tied_subscription_ids: Vec::new(),
        });
        assert_eq!((counts.ok, counts.mismatch, counts.no_match, counts.ambiguous), (1, 0, 1, 1));
    }

    #[test]
    fn apply_match_accepts_numeric_amounts() {
        let m: ApplyMatch = serde_json::from_value(serde_json::json!({
            "payment_id": Uuid::nil(),
            "amount": 125.5,
            "name": "Jean Dupont"
        }))
        .unwrap();
        assert_eq!(m.amount, Some("125.5".parse().unwrap()));

        let bare: ApplyMatch =
            serde_json::from_value(serde_json::json!({ "payment_id": Uuid::nil() })).unwrap();
        assert!(bare.amount.is_none() && bare.name.is_none());
    }
}
