pub mod analyze;
pub mod auth;
pub mod health;
pub(crate) mod principal;
pub mod root;
pub mod types;

use regex::Regex;

/// Basic email format check.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("demo@fintech.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_malformed() {
        assert!(!valid_email("demo"));
        assert!(!valid_email("demo@fintech"));
        assert!(!valid_email("de mo@fintech.com"));
        assert!(!valid_email(""));
    }
}
