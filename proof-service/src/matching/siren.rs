/// SIREN identifiers are 9 digits protected by a Luhn (mod 10) checksum.
pub fn validate_siren(siren: &str) -> bool {
    if siren.len() != 9 || !siren.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let sum: u32 = siren
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let digit = u32::from(b - b'0');
            if i % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                digit
            }
        })
        .sum();

    sum % 10 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_siren() {
        assert!(validate_siren("732829320"));
        assert!(validate_siren("443061841"));
        assert!(validate_siren("000000000"));
    }

    #[test]
    fn rejects_bad_checksum() {
        assert!(!validate_siren("123456789"));
        assert!(!validate_siren("732829321"));
    }

    #[test]
    fn rejects_wrong_shape() {
        assert!(!validate_siren(""));
        assert!(!validate_siren("73282932"));
        assert!(!validate_siren("7328293200"));
        assert!(!validate_siren("732 829 320"));
        assert!(!validate_siren("73282932a"));
        // Non-ASCII digits are not digits here.
        assert!(!validate_siren("７３２８２９３２０"));
    }

    #[test]
    fn checksum_agrees_with_reference_luhn_for_every_check_digit() {
        let prefix = "73282932";
        let valid: Vec<char> = ('0'..='9')
            .filter(|c| validate_siren(&format!("{prefix}{c}")))
            .collect();
        assert_eq!(valid, vec!['0']);
    }
}
