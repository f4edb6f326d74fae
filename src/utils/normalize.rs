//! Normalizers for the identifiers the Messages database hands back
//! (phone handles and email handles), so they can be matched against
//! Contacts entries.

use once_cell::sync::Lazy;
use regex::Regex;

static E164ISH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\+?\d[\d\-()\s]{6,}$").expect("phone pattern is valid")
});

/// Normalize a phone number string to an E.164-ish form
/// (e.g. `"(909) 555-1234"` -> `"+19095551234"`). Returns `None` when the
/// input doesn't look like a phone number at all.
pub fn normalize_phone(phone: &str) -> Option<String> {
    let phone = phone.trim();
    if phone.is_empty() || !E164ISH.is_match(phone) {
        return None;
    }

    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }

    // 10 digits: assume US. 11 starting with 1: same number with country code.
    if digits.len() == 10 {
        return Some(format!("+1{}", digits));
    }
    if phone.starts_with('+') || (digits.len() == 11 && digits.starts_with('1')) {
        return Some(format!("+{}", digits));
    }
    Some(format!("+{}", digits))
}

/// Normalize an email address to lowercase. Returns `None` for strings
/// that can't be an email.
pub fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return None;
    }
    Some(email)
}
