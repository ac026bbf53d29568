//! Field-level input validation collected into a single 422 response.

use crate::error::ApiError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

/// Loose RFC 5322 shape check: something@something.tld, no whitespace.
pub static EMAIL_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$")
        .expect("email regex is valid")
});

/// Accumulates `field -> message` errors. The first message recorded for a field wins.
#[derive(Debug, Default)]
pub struct Validator {
    // ---
    errors: BTreeMap<String, String>,
}

impl Validator {
    // ---
    pub fn new() -> Self {
        // ---
        Self::default()
    }

    pub fn valid(&self) -> bool {
        // ---
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        // ---
        &self.errors
    }

    pub fn add_error(&mut self, key: &str, message: &str) {
        // ---
        self.errors
            .entry(key.to_string())
            .or_insert_with(|| message.to_string());
    }

    pub fn check(&mut self, ok: bool, key: &str, message: &str) {
        // ---
        if !ok {
            self.add_error(key, message);
        }
    }

    /// `Ok(())` when no errors were recorded, otherwise a 422 carrying all of them.
    pub fn finish(self) -> Result<(), ApiError> {
        // ---
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.errors))
        }
    }
}

/// Character-count bounds check for required text fields.
pub fn check_text(v: &mut Validator, value: &str, key: &str, max_chars: usize) {
    // ---
    v.check(!value.trim().is_empty(), key, "must be provided");
    v.check(
        value.chars().count() <= max_chars,
        key,
        &format!("must not be more than {max_chars} characters long"),
    );
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn first_error_per_field_wins() {
        // ---
        let mut v = Validator::new();
        v.check(false, "email", "must be provided");
        v.check(false, "email", "must be a valid email address");
        v.check(true, "username", "never recorded");

        assert!(!v.valid());
        assert_eq!(v.errors().len(), 1);
        assert_eq!(v.errors()["email"], "must be provided");
    }

    #[test]
    fn finish_maps_to_validation_error() {
        // ---
        assert!(Validator::new().finish().is_ok());

        let mut v = Validator::new();
        v.add_error("page", "must be greater than zero");
        match v.finish() {
            Err(ApiError::Validation(errors)) => assert_eq!(errors.len(), 1),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn email_regex_accepts_common_addresses() {
        // ---
        assert!(EMAIL_RX.is_match("frodo@shire.example"));
        assert!(EMAIL_RX.is_match("sam.gamgee+garden@bag-end.co.uk"));

        assert!(!EMAIL_RX.is_match("frodo"));
        assert!(!EMAIL_RX.is_match("frodo@"));
        assert!(!EMAIL_RX.is_match("frodo @shire.example"));
        assert!(!EMAIL_RX.is_match("frodo@shire"));
    }

    #[test]
    fn text_bounds_count_characters_not_bytes() {
        // ---
        let mut v = Validator::new();
        check_text(&mut v, &"é".repeat(255), "content", 255);
        assert!(v.valid());

        let mut v = Validator::new();
        check_text(&mut v, "   ", "content", 255);
        assert_eq!(v.errors()["content"], "must be provided");

        let mut v = Validator::new();
        check_text(&mut v, &"x".repeat(256), "content", 255);
        assert!(v.errors()["content"].contains("255"));
    }
}
