//! Pure heuristics used to reconcile payments: identifier checksums, amount
//! normalisation and investor name/amount matching.

pub mod amount;
pub mod matcher;
pub mod siren;

pub use amount::{amounts_match, parse_amount, AMOUNT_TOLERANCE};
pub use matcher::{
    classify, match_candidate, name_similarity, normalize_name, MatchOutcome, ScoredCandidate,
};
pub use siren::validate_siren;
