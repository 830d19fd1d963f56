//! Investor name / amount matching against known subscriptions.

use crate::matching::amount::amounts_match;
use crate::models::{MatchStatus, Subscription};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

const EXACT_SCORE: f64 = 1.0;
const SUBSTRING_SCORE: f64 = 0.8;
const OK_THRESHOLD: f64 = 0.8;
const MISMATCH_THRESHOLD: f64 = 0.6;

/// Lowercase, fold French diacritics and ligatures, turn punctuation into
/// spaces and collapse whitespace.
pub fn normalize_name(name: &str) -> String {
    let mut folded = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        match c {
            'à' | 'â' | 'ä' | 'á' | 'ã' | 'å' => folded.push('a'),
            'ç' => folded.push('c'),
            'é' | 'è' | 'ê' | 'ë' => folded.push('e'),
            'î' | 'ï' | 'í' | 'ì' => folded.push('i'),
            'ô' | 'ö' | 'ó' | 'ò' | 'õ' => folded.push('o'),
            'ù' | 'û' | 'ü' | 'ú' => folded.push('u'),
            'ÿ' | 'ý' => folded.push('y'),
            'ñ' => folded.push('n'),
            'œ' => folded.push_str("oe"),
            'æ' => folded.push_str("ae"),
            c if c.is_alphanumeric() => folded.push(c),
            _ => folded.push(' '),
        }
    }
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Similarity in `[0, 1]` between two names.
///
/// Identical after normalisation scores 1.0, containment 0.8, otherwise the
/// share of distinct tokens in common relative to the longer name.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_name(a);
    let b = normalize_name(b);

    if a == b {
        return EXACT_SCORE;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a.contains(&b) || b.contains(&a) {
        return SUBSTRING_SCORE;
    }

    let tokens_a: HashSet<&str> = a.split(' ').collect();
    let tokens_b: HashSet<&str> = b.split(' ').collect();
    let common = tokens_a.intersection(&tokens_b).count();

    common as f64 / tokens_a.len().max(tokens_b.len()) as f64
}

pub fn classify(score: f64, amount_matches: bool) -> MatchStatus {
    if score > OK_THRESHOLD && amount_matches {
        MatchStatus::Ok
    } else if score > MISMATCH_THRESHOLD {
        MatchStatus::Mismatch
    } else {
        MatchStatus::NoMatch
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub subscription_id: Uuid,
    pub investor_name: String,
    pub score: f64,
    pub expected_amount: Decimal,
    pub amount_matches: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchOutcome {
    pub status: MatchStatus,
    /// Highest-scoring subscription; the first one seen when several tie.
    pub best: Option<ScoredCandidate>,
    /// Set when more than one subscription shares the best score. The pick in
    /// `best` is then arbitrary and must be confirmed by hand.
    pub ambiguous: bool,
    pub tied_subscription_ids: Vec<Uuid>,
}

impl MatchOutcome {
    fn no_match() -> Self {
        Self {
            status: MatchStatus::NoMatch,
            best: None,
            ambiguous: false,
            tied_subscription_ids: Vec::new(),
        }
    }
}

/// Score `name` against every subscription's investor and classify the best.
///
/// Subscriptions selected without their investor are skipped.
pub fn match_candidate(
    name: &str,
    amount: Option<Decimal>,
    subscriptions: &[Subscription],
) -> MatchOutcome {
    if normalize_name(name).is_empty() {
        return MatchOutcome::no_match();
    }

    let mut best: Option<ScoredCandidate> = None;
    let mut tied: Vec<Uuid> = Vec::new();

    for subscription in subscriptions {
        let Some(investor_name) = subscription.investor_name() else {
            continue;
        };

        let score = name_similarity(name, investor_name);
        let best_score = best.as_ref().map_or(0.0, |b| b.score);

        if score > best_score {
            let expected_amount = subscription.expected_amount();
            best = Some(ScoredCandidate {
                subscription_id: subscription.id,
                investor_name: investor_name.to_string(),
                score,
                expected_amount,
                amount_matches: amount.is_some_and(|a| amounts_match(a, expected_amount)),
            });
            tied = vec![subscription.id];
        } else if score > 0.0 && score == best_score {
            tied.push(subscription.id);
        }
    }

    let Some(best) = best else {
        return MatchOutcome::no_match();
    };

    let ambiguous = tied.len() > 1;
    if ambiguous {
        tracing::debug!(
            candidate = %name,
            score = best.score,
            tied = tied.len(),
            "Several subscriptions share the best score"
        );
    }

    MatchOutcome {
        status: classify(best.score, best.amount_matches),
        best: Some(best),
        ambiguous,
        tied_subscription_ids: if ambiguous { tied } else { Vec::new() },
    }
}
