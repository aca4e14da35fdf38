//! Input validation for sign-up payloads: address grammar and password
//! strength. Pure functions, no I/O.

use std::sync::LazyLock;

use regex::Regex;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$")
        .expect("email regex is valid")
});

// Unicode punctuation or symbol; control characters and whitespace do not
// count towards password strength.
static SYMBOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{P}\p{S}]").expect("symbol regex is valid"));

pub fn valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// At least 8 characters with one lowercase letter, one uppercase letter,
/// one digit and one punctuation/symbol character.
pub fn strong_password(password: &str) -> bool {
    password.chars().count() >= 8
        && password.chars().any(char::is_lowercase)
        && password.chars().any(char::is_uppercase)
        && password.chars().any(|c| c.is_ascii_digit())
        && SYMBOL_RE.is_match(password)
}
