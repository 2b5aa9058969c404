//! Password derivation from national-identifier strings.
//!
//! Identifiers like `12.345.678-9` carry separators and a trailing check
//! digit. The derived password is a fixed-width window of the digits with
//! the check digit dropped. This transform gates opening the encrypted
//! PDF, so its boundaries are exact and covered by tests; any drift here
//! silently locks users out.

/// Derive a numeric password from `identifier`.
///
/// Every non-digit is stripped first. With `n` digits remaining:
///
/// - `n <= keep_digits`: the first `n - 1` digits (the last digit is the
///   check digit); empty when `n <= 1`.
/// - otherwise: the `keep_digits` digits that end immediately before the
///   check digit.
///
/// ```
/// use folio::credential::derive_password;
///
/// assert_eq!(derive_password("123456789", 5), "45678");
/// assert_eq!(derive_password("12.345.678-9", 5), "45678");
/// assert_eq!(derive_password("123", 5), "12");
/// ```
pub fn derive_password(identifier: &str, keep_digits: usize) -> String {
    let digits: String = identifier.chars().filter(char::is_ascii_digit).collect();
    let n = digits.len();

    if n <= 1 {
        return String::new();
    }
    if n <= keep_digits {
        return digits[..n - 1].to_string();
    }
    digits[n - 1 - keep_digits..n - 1].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_before_check_digit() {
        assert_eq!(derive_password("123456789", 5), "45678");
    }

    #[test]
    fn test_short_identifier_drops_only_check_digit() {
        assert_eq!(derive_password("123", 5), "12");
        assert_eq!(derive_password("12345", 5), "1234");
    }

    #[test]
    fn test_separators_are_stripped() {
        assert_eq!(derive_password("12.345.678-9", 5), "45678");
        assert_eq!(derive_password(" 1 2 3 4 5 6 7 8 9 ", 5), "45678");
    }

    #[test]
    fn test_degenerate_identifiers() {
        assert_eq!(derive_password("", 5), "");
        assert_eq!(derive_password("x-y-z", 5), "");
        assert_eq!(derive_password("7", 5), "");
    }

    #[test]
    fn test_four_digit_window() {
        assert_eq!(derive_password("123456789", 4), "5678");
        assert_eq!(derive_password("12.345.678-9", 4), "5678");
    }

    #[test]
    fn test_zero_keep_digits() {
        assert_eq!(derive_password("123456789", 0), "");
    }
}
