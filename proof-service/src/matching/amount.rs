use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Two amounts match when they differ by less than one cent.
pub const AMOUNT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

pub fn amounts_match(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() < AMOUNT_TOLERANCE
}

/// Parse an amount as written on statements, transfer receipts and OCR output.
///
/// Currency markers and spacing (including NBSP) are ignored. With both `,` and
/// `.` present the right-most one is the decimal separator; a single separator
/// followed by exactly three digits, or a repeated one, groups thousands.
/// Parentheses or a leading minus sign negate. Rounded to cents.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    let (mut negative, inner) = match trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
    {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };

    let mut kept = String::with_capacity(inner.len());
    for c in inner.chars() {
        match c {
            '0'..='9' | ',' | '.' => kept.push(c),
            '-' | '\u{2212}' if kept.is_empty() => negative = true,
            _ => {}
        }
    }

    let kept = kept.trim_matches(|c| c == ',' || c == '.');
    if !kept.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }

    let normalized = normalize_separators(kept)?;
    let value = Decimal::from_str(&normalized)
        .ok()?
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    Some(if negative { -value } else { value })
}

fn normalize_separators(s: &str) -> Option<String> {
    let decimal_separator = match (s.rfind(','), s.rfind('.')) {
        (Some(comma), Some(dot)) => {
            let sep = if comma > dot { ',' } else { '.' };
            if s.matches(sep).count() > 1 {
                return None;
            }
            Some(sep)
        }
        (Some(_), None) => lone_decimal_separator(s, ','),
        (None, Some(_)) => lone_decimal_separator(s, '.'),
        (None, None) => None,
    };

    Some(
        s.chars()
            .filter_map(|c| match c {
                '0'..='9' => Some(c),
                c if Some(c) == decimal_separator => Some('.'),
                _ => None,
            })
            .collect(),
    )
}

fn lone_decimal_separator(s: &str, sep: char) -> Option<char> {
    if s.matches(sep).count() > 1 {
        return None;
    }
    let digits_after = s.rsplit(sep).next().map_or(0, str::len);
    if digits_after == 3 {
        None
    } else {
        Some(sep)
    }
}
