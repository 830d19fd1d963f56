//! Domain models for proof-service.
//!
//! Rows are owned by the hosted store; these types mirror the columns the
//! reconciliation flows read and write.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

pub const TRANCHES_TABLE: &str = "tranches";
pub const SUBSCRIPTIONS_TABLE: &str = "souscriptions";
pub const PAYMENTS_TABLE: &str = "paiements";
pub const PROOFS_TABLE: &str = "payment_proofs";

// ============================================================================
// Issuance Models
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tranche {
    pub id: Uuid,
    pub projet_id: Uuid,
    pub tranche_name: String,
    pub taux_nominal: Option<Decimal>,
    pub periodicite_coupons: Option<String>,
    pub date_emission: Option<NaiveDate>,
    pub date_echeance_finale: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Investor {
    pub id: Uuid,
    pub nom_raison_sociale: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub siren: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub tranche_id: Uuid,
    pub investisseur_id: Uuid,
    pub montant_investi: Decimal,
    #[serde(default)]
    pub coupon_brut: Option<Decimal>,
    #[serde(default)]
    pub coupon_net: Option<Decimal>,
    #[serde(default)]
    pub date_souscription: Option<NaiveDate>,
    /// Present when selected with `investisseur:investisseurs(*)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investisseur: Option<Investor>,
}

impl Subscription {
    /// Amount an investor is expected to transfer for one coupon.
    ///
    /// Net coupon first, then gross coupon, then the invested amount for
    /// subscriptions whose coupons were never computed.
    pub fn expected_amount(&self) -> Decimal {
        self.coupon_net
            .or(self.coupon_brut)
            .unwrap_or(self.montant_investi)
    }

    pub fn investor_name(&self) -> Option<&str> {
        self.investisseur
            .as_ref()
            .map(|i| i.nom_raison_sociale.as_str())
    }
}

// ============================================================================
// Payment Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Late,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Late => "late",
            Self::Paid => "paid",
        }
    }

    /// Status of a payment with no confirmed proof, relative to `today`.
    pub fn unpaid_for(due_date: NaiveDate, today: NaiveDate) -> Self {
        if due_date < today {
            Self::Late
        } else {
            Self::Pending
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub tranche_id: Uuid,
    #[serde(default)]
    pub souscription_id: Option<Uuid>,
    pub montant: Decimal,
    pub date_echeance: NaiveDate,
    #[serde(default)]
    pub date_paiement: Option<NaiveDate>,
    pub statut: PaymentStatus,
}

/// Partial update applied to a `paiements` row.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentStatusUpdate {
    pub statut: PaymentStatus,
    pub date_paiement: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentProof {
    pub id: Uuid,
    pub paiement_id: Uuid,
    pub file_url: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
    #[serde(default)]
    pub extracted_data: Option<ExtractedPaymentData>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub validated_at: Option<DateTime<Utc>>,
}

/// Insert payload for `payment_proofs`.
#[derive(Debug, Clone, Serialize)]
pub struct NewPaymentProof {
    pub paiement_id: Uuid,
    /// Object path inside the permanent bucket.
    pub file_url: String,
    pub file_name: String,
    pub file_size: i64,
    pub extracted_data: ExtractedPaymentData,
    pub confidence: f64,
    pub validated_at: DateTime<Utc>,
}

// ============================================================================
// Analysis Models
// ============================================================================

/// Payment fields read off a proof document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedPaymentData {
    #[serde(default, alias = "montant")]
    pub amount: Option<Decimal>,
    #[serde(
        default,
        alias = "date_paiement",
        alias = "date_virement",
        deserialize_with = "lenient_date"
    )]
    pub date: Option<NaiveDate>,
    #[serde(
        default,
        alias = "nom_beneficiaire",
        alias = "nom_emetteur",
        alias = "emetteur"
    )]
    pub beneficiary: Option<String>,
    #[serde(default, alias = "reference_virement")]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Ok,
    Mismatch,
    NoMatch,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Mismatch => "mismatch",
            Self::NoMatch => "no_match",
        }
    }
}

/// Outcome of the remote analysis of one proof upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofAnalysis {
    pub extracted: ExtractedPaymentData,
    /// 0 to 100.
    pub confidence: f64,
    pub status: MatchStatus,
    #[serde(default)]
    pub details: serde_json::Value,
}

/// Accepts ISO dates and the `dd/mm/yyyy` form OCR output tends to use;
/// anything else becomes `None` rather than failing the whole payload.
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| parse_date(&s)))
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let s = s.get(..10).unwrap_or(s);
    ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}
