use regex::Regex;
use std::sync::LazyLock;

// ASCII digits only; `\d` would also admit other Unicode digits.
static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+[0-9]{10,15}$").unwrap_or_else(|e| panic!("invalid phone pattern: {e}"))
});

/// True iff `phone` is a `+` followed by 10 to 15 digits and nothing else.
pub fn validate_phone(phone: &str) -> bool {
    PHONE.is_match(phone)
}

#[cfg(test)]
mod tests {
    use super::validate_phone;

    #[test]
    fn accepts_plus_and_ten_to_fifteen_digits() {
        assert!(validate_phone("+6281234567890"));
        assert!(validate_phone("+1234567890"));
        assert!(validate_phone("+123456789012345"));
    }

    #[test]
    fn rejects_missing_plus() {
        assert!(!validate_phone("6281234567890"));
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(!validate_phone("+62812"));
        assert!(!validate_phone("+123456789"));
        assert!(!validate_phone("+1234567890123456"));
        assert!(!validate_phone("+628123456789012345"));
    }

    #[test]
    fn rejects_anything_else() {
        assert!(!validate_phone(""));
        assert!(!validate_phone("+"));
        assert!(!validate_phone("++6281234567890"));
        assert!(!validate_phone("+62 812 3456 7890"));
        assert!(!validate_phone("+62-812-3456-7890"));
        assert!(!validate_phone(" +6281234567890"));
        assert!(!validate_phone("+6281234567890\n"));
        // Arabic-Indic digits
        assert!(!validate_phone("+٦٢٨١٢٣٤٥٦٧٨٩٠"));
    }
}
