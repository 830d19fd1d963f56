//! Client for the remote proof analysis function.
//!
//! The function reads the uploaded images, extracts the transfer fields and
//! scores them against the expected payment. Older deployments answer with
//! French keys, a 0-1 confidence or no status at all; those are normalised
//! here so callers always get a complete [`ProofAnalysis`].

use crate::matching::{amounts_match, classify, name_similarity};
use crate::models::{ExtractedPaymentData, MatchStatus, ProofAnalysis};
use crate::services::backend::{AccessToken, BackendClient};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use service_core::error::AppError;
use uuid::Uuid;

/// What the proof is checked against.
#[derive(Debug, Clone)]
pub struct ExpectedPayment {
    pub payment_id: Uuid,
    pub amount: Decimal,
    pub investor_name: Option<String>,
    pub due_date: NaiveDate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzePaymentRequest<'a> {
    payment_id: Uuid,
    file_urls: &'a [String],
    #[serde(with = "rust_decimal::serde::float")]
    expected_amount: Decimal,
    investor_name: Option<&'a str>,
    due_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct AnalyzePaymentResponse {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default, alias = "extractedData", alias = "extracted_data")]
    extracted: Option<ExtractedPaymentData>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default, deserialize_with = "lenient_status")]
    status: Option<MatchStatus>,
    #[serde(default)]
    details: Value,
    #[serde(default)]
    error: Option<String>,
}

fn default_success() -> bool {
    true
}

fn lenient_status<'de, D>(deserializer: D) -> Result<Option<MatchStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| match s.trim().to_ascii_lowercase().as_str() {
        "ok" | "match" | "matched" => Some(MatchStatus::Ok),
        "mismatch" | "partial" => Some(MatchStatus::Mismatch),
        "no_match" | "nomatch" | "no-match" | "none" => Some(MatchStatus::NoMatch),
        _ => None,
    }))
}

#[derive(Clone)]
pub struct AnalysisClient {
    backend: BackendClient,
    function: String,
}

impl AnalysisClient {
    pub fn new(backend: BackendClient, function: impl Into<String>) -> Self {
        Self {
            backend,
            function: function.into(),
        }
    }

    #[tracing::instrument(skip(self, token, file_urls), fields(payment_id = %expected.payment_id, files = file_urls.len()))]
    pub async fn analyze(
        &self,
        token: &AccessToken,
        expected: &ExpectedPayment,
        file_urls: &[String],
    ) -> Result<ProofAnalysis, AppError> {
        let request = AnalyzePaymentRequest {
            payment_id: expected.payment_id,
            file_urls,
            expected_amount: expected.amount,
            investor_name: expected.investor_name.as_deref(),
            due_date: expected.due_date,
        };

        let response: AnalyzePaymentResponse = self
            .backend
            .invoke_function(token, &self.function, &request)
            .await?;

        let analysis = interpret(response, expected)?;
        tracing::info!(
            status = analysis.status.as_str(),
            confidence = analysis.confidence,
            "Proof analysed"
        );
        Ok(analysis)
    }
}

fn interpret(
    response: AnalyzePaymentResponse,
    expected: &ExpectedPayment,
) -> Result<ProofAnalysis, AppError> {
    if !response.success || response.error.is_some() {
        let message = response
            .error
            .unwrap_or_else(|| "analysis reported failure".to_string());
        return Err(AppError::BadGateway(format!("Proof analysis failed: {}", message)));
    }

    let extracted = response.extracted.unwrap_or_default();
    let confidence = normalize_confidence(response.confidence.unwrap_or(0.0));

    let (status, details) = match response.status {
        Some(status) => (status, response.details),
        None => local_verdict(&extracted, expected, response.details),
    };

    Ok(ProofAnalysis {
        extracted,
        confidence,
        status,
        details,
    })
}

/// Scores on a 0-1 scale are lifted to percent; the result is clamped to 0-100.
pub fn normalize_confidence(raw: f64) -> f64 {
    if !raw.is_finite() {
        return 0.0;
    }
    let percent = if raw <= 1.0 { raw * 100.0 } else { raw };
    percent.clamp(0.0, 100.0)
}

fn local_verdict(
    extracted: &ExtractedPaymentData,
    expected: &ExpectedPayment,
    remote_details: Value,
) -> (MatchStatus, Value) {
    let score = match (&extracted.beneficiary, &expected.investor_name) {
        (Some(found), Some(investor)) => name_similarity(found, investor),
        _ => 0.0,
    };
    let amount_matches = extracted
        .amount
        .is_some_and(|amount| amounts_match(amount, expected.amount));
    let status = classify(score, amount_matches);

    let details = json!({
        "computed_locally": true,
        "name_score": score,
        "amount_matches": amount_matches,
        "expected_amount": expected.amount.to_string(),
        "remote": remote_details,
    });
    (status, details)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected() -> ExpectedPayment {
        ExpectedPayment {
            payment_id: Uuid::nil(),
            amount: "1250.00".parse().unwrap(),
            investor_name: Some("Jean Dupont".to_string()),
            due_date: NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
        }
    }

    fn response(value: Value) -> AnalyzePaymentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn request_uses_camel_case_and_float_amount() {
        let urls = vec!["https://x/1.png".to_string()];
        let exp = expected();
        let request = AnalyzePaymentRequest {
            payment_id: exp.payment_id,
            file_urls: &urls,
            expected_amount: exp.amount,
            investor_name: exp.investor_name.as_deref(),
            due_date: exp.due_date,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["fileUrls"][0], "https://x/1.png");
        assert_eq!(value["expectedAmount"], 1250.0);
        assert_eq!(value["investorName"], "Jean Dupont");
        assert_eq!(value["dueDate"], "2026-03-31");
    }

    #[test]
    fn remote_status_is_kept() {
        let analysis = interpret(
            response(json!({
                "success": true,
                "extractedData": { "montant": 1250.0, "nom_emetteur": "DUPONT JEAN" },
                "confidence": 0.92,
                "status": "ok",
                "details": { "note": "clear" }
            })),
            &expected(),
        )
        .unwrap();

        assert_eq!(analysis.status, MatchStatus::Ok);
        assert!((analysis.confidence - 92.0).abs() < 1e-9);
        assert_eq!(analysis.details["note"], "clear");
        assert_eq!(analysis.extracted.beneficiary.as_deref(), Some("DUPONT JEAN"));
    }

    #[test]
    fn missing_status_is_computed_locally() {
        let analysis = interpret(
            response(json!({
                "extracted": { "amount": 1249.5, "beneficiary": "Jean Dupont" },
                "confidence": 87
            })),
            &expected(),
        )
        .unwrap();

        assert_eq!(analysis.status, MatchStatus::Mismatch);
        assert_eq!(analysis.confidence, 87.0);
        assert_eq!(analysis.details["computed_locally"], true);
        assert_eq!(analysis.details["amount_matches"], false);
    }

    #[test]
    fn unknown_status_falls_back_to_local_verdict() {
        let analysis = interpret(
            response(json!({
                "extracted": { "amount": 1250, "beneficiary": "Jean Dupont" },
                "status": "probably"
            })),
            &expected(),
        )
        .unwrap();
        assert_eq!(analysis.status, MatchStatus::Ok);
    }

    #[test]
    fn reported_failure_is_bad_gateway() {
        let err = interpret(
            response(json!({ "success": false, "error": "no text found" })),
            &expected(),
        )
        .unwrap_err();

        assert!(matches!(err, AppError::BadGateway(ref m) if m.contains("no text found")));
    }

    #[test]
    fn confidence_scale() {
        assert_eq!(normalize_confidence(0.5), 50.0);
        assert_eq!(normalize_confidence(1.0), 100.0);
        assert_eq!(normalize_confidence(73.0), 73.0);
        assert_eq!(normalize_confidence(140.0), 100.0);
        assert_eq!(normalize_confidence(-3.0), 0.0);
        assert_eq!(normalize_confidence(f64::NAN), 0.0);
    }
}
