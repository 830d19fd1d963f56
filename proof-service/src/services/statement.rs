//! Candidate payer lines read from a bank statement export.

use crate::matching::{normalize_name, parse_amount};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use service_core::error::AppError;

const NAME_HEADERS: &[&str] = &[
    "nom",
    "name",
    "investisseur",
    "beneficiaire",
    "emetteur",
    "raison sociale",
    "donneur d ordre",
];
const AMOUNT_HEADERS: &[&str] = &["montant", "amount", "credit"];

/// Words bank statements prepend to the payer's name.
const BANKING_NOISE: &[&str] = &[
    "vir", "virement", "sepa", "recu", "inst", "instantane", "prlv", "ref", "emis", "ordre",
    "cb", "credit",
];

static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{1,2}[./-]\d{1,2}[./-]\d{2,4}\b").expect("valid date regex")
});

// Amounts on statements always carry cents; thousands groups are three digits.
// The leading group keeps a match from starting inside a preceding number.
static AMOUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?P<lead>^|[^\d.,\u{a0}\u{202f}-]|\s)(?P<amount>-?(?:\d{1,3}(?:[ \u{a0}\u{202f}.,]\d{3})+|\d+)[.,]\d{2})\b",
    )
    .expect("valid amount regex")
});

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementCandidate {
    /// 1-based line (text) or record (CSV) number.
    pub line: usize,
    pub name: String,
    pub amount: Option<Decimal>,
    pub raw: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementFormat {
    Pdf,
    Csv,
}

impl StatementFormat {
    pub fn detect(file_name: &str, content_type: &str, data: &[u8]) -> Option<Self> {
        if data.starts_with(b"%PDF-") {
            return Some(Self::Pdf);
        }
        let content_type = content_type.split(';').next().unwrap_or("").trim();
        let is_csv_type = matches!(
            content_type,
            "text/csv" | "application/csv" | "text/plain" | "application/vnd.ms-excel"
        );
        let is_csv_name = file_name.to_ascii_lowercase().ends_with(".csv");
        (is_csv_type || is_csv_name).then_some(Self::Csv)
    }
}

/// Parse a CSV export: the delimiter is guessed from the header line and the
/// name/amount columns found by header keywords. Rows without an amount are
/// skipped.
pub fn parse_csv(data: &[u8]) -> Result<Vec<StatementCandidate>, AppError> {
    let text = String::from_utf8_lossy(data);
    let text = text.trim_start_matches('\u{feff}');
    let delimiter = guess_delimiter(text.lines().next().unwrap_or(""));

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Unreadable CSV header: {}", e)))?
        .iter()
        .map(normalize_name)
        .collect();

    let name_col = find_column(&headers, NAME_HEADERS).ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!("CSV has no investor name column"))
    })?;
    let amount_col = find_column(&headers, AMOUNT_HEADERS)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("CSV has no amount column")))?;

    let mut candidates = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Malformed CSV row: {}", e)))?;

        let Some(amount) = record.get(amount_col).and_then(parse_amount) else {
            continue;
        };
        let name = record.get(name_col).unwrap_or("").to_string();

        candidates.push(StatementCandidate {
            line: index + 1,
            name,
            amount: Some(amount),
            raw: record.iter().collect::<Vec<_>>().join(" | "),
        });
    }

    Ok(candidates)
}

/// Parse the text layer of a statement: every line holding an amount becomes
/// a candidate, named by what remains once dates, amounts and banking
/// boilerplate are removed.
///
/// The first amount after the payer is the transfer; later columns on the
/// same line hold the running balance.
pub fn parse_text(text: &str) -> Vec<StatementCandidate> {
    text.lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let without_dates = DATE_RE.replace_all(line, " ");
            let amount = AMOUNT_RE
                .captures(&without_dates)
                .and_then(|c| parse_amount(&c["amount"]))?;

            let remainder = AMOUNT_RE.replace_all(&without_dates, "$lead ");
            let name = normalize_name(&remainder)
                .split(' ')
                .filter(|token| !token.is_empty())
                .filter(|token| !BANKING_NOISE.contains(token))
                .filter(|token| !token.chars().all(|c| c.is_ascii_digit()))
                .collect::<Vec<_>>()
                .join(" ");

            if name.is_empty() {
                return None;
            }

            Some(StatementCandidate {
                line: index + 1,
                name,
                amount: Some(amount),
                raw: line.trim().to_string(),
            })
        })
        .collect()
}

fn guess_delimiter(header_line: &str) -> u8 {
    [b';', b',', b'\t']
        .into_iter()
        .max_by_key(|d| header_line.bytes().filter(|b| b == d).count())
        .filter(|d| header_line.as_bytes().contains(d))
        .unwrap_or(b',')
}

fn find_column(headers: &[String], keywords: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| keywords.iter().any(|k| h.contains(k)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn semicolon_csv_with_french_amounts() {
        let csv = "\u{feff}Date;Nom de l'investisseur;Montant (€)\n\
                   15/03/2026;Jean Dupont;1 234,56\n\
                   15/03/2026;SCI Les Tilleuls;250,00\n\
                   16/03/2026;Frais bancaires;\n";

        let candidates = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].name, "Jean Dupont");
        assert_eq!(candidates[0].amount, Some(dec("1234.56")));
        assert_eq!(candidates[0].line, 1);
        assert_eq!(candidates[1].name, "SCI Les Tilleuls");
        assert_eq!(candidates[1].amount, Some(dec("250.00")));
    }

    #[test]
    fn comma_csv_with_english_headers() {
        let csv = "name,amount,reference\nMarie Curie,\"1,500.00\",REF-1\n";
        let candidates = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].amount, Some(dec("1500.00")));
        assert_eq!(candidates[0].raw, "Marie Curie | 1,500.00 | REF-1");
    }

    #[test]
    fn csv_without_amount_column_is_rejected() {
        let err = parse_csv(b"nom;date\nJean;2026-01-01\n").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn text_lines_yield_payer_and_amount() {
        let text = "RELEVE DE COMPTE\n\
                    15/03/2026  VIR SEPA JEAN DUPONT          1 234,56\n\
                    16.03.2026  VIREMENT RECU SCI LES TILLEULS  250,00   12 480,12\n\
                    Solde au 16/03/2026\n";

        let candidates = parse_text(text);
        assert_eq!(candidates.len(), 2);

        assert_eq!(candidates[0].line, 2);
        assert_eq!(candidates[0].name, "jean dupont");
        assert_eq!(candidates[0].amount, Some(dec("1234.56")));

        assert_eq!(candidates[1].name, "sci les tilleuls");
        assert_eq!(candidates[1].amount, Some(dec("250.00")));
    }

    #[test]
    fn amounts_never_borrow_digits_from_a_preceding_number() {
        let candidates = parse_text("VIREMENT JEAN DUPONT REF 98765 250,00\n");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].amount, Some(dec("250.00")));
        assert_eq!(candidates[0].name, "jean dupont");

        let candidates = parse_text("VIR SCI LES TILLEULS 2026 1 250,00\n");
        assert_eq!(candidates[0].amount, Some(dec("1250.00")));

        let candidates = parse_text("VIR MARIE CURIE -75,50\n");
        assert_eq!(candidates[0].amount, Some(dec("-75.50")));
    }

    #[test]
    fn format_detection() {
        assert_eq!(
            StatementFormat::detect("releve.pdf", "application/pdf", b"%PDF-1.5"),
            Some(StatementFormat::Pdf)
        );
        assert_eq!(
            StatementFormat::detect("export.CSV", "application/octet-stream", b"a;b"),
            Some(StatementFormat::Csv)
        );
        assert_eq!(
            StatementFormat::detect("x", "text/csv; charset=utf-8", b"a;b"),
            Some(StatementFormat::Csv)
        );
        assert_eq!(StatementFormat::detect("photo.png", "image/png", b"\x89PNG"), None);
    }
}
