/// file: src/validation.rs
/// description: client-side form checks applied before hitting the API
use clap::ValueEnum;
use regex::Regex;
use std::{fmt, sync::LazyLock};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_SKILL_NAME_LEN: usize = 2;
/// Skill suggestions are not requested for shorter queries.
pub const MIN_SEARCH_LEN: usize = 2;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));
static SKILL_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9\s\-]+$").expect("valid skill name pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Field {
    Email,
    Password,
    SkillName,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Email => "email",
            Field::Password => "password",
            Field::SkillName => "skill name",
        };
        f.write_str(name)
    }
}

pub fn validate_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

pub fn validate_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
}

/// Letters, digits, whitespace and hyphens only.
pub fn validate_skill_name(name: &str) -> bool {
    name.chars().count() >= MIN_SKILL_NAME_LEN && SKILL_NAME_PATTERN.is_match(name)
}

/// Check `value` as `field`, returning the message to show when it fails.
pub fn check(field: Field, value: &str) -> Result<(), String> {
    let (valid, message) = match field {
        Field::Email => (validate_email(value), "Please enter a valid email address"),
        Field::Password => (
            validate_password(value),
            "Password must be at least 6 characters long",
        ),
        Field::SkillName => (
            validate_skill_name(value),
            "Skill name must be at least 2 characters and contain only letters, numbers, spaces, and hyphens",
        ),
    };
    if valid { Ok(()) } else { Err(message.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails() {
        assert!(validate_email("ada@example.com"));
        assert!(validate_email("a.b+c@mail.example.org"));
        assert!(validate_email("a..b@x.y"));
        assert!(!validate_email(""));
        assert!(!validate_email("ada@example"));
        assert!(!validate_email("ada@.com"));
        assert!(!validate_email("ada@example."));
        assert!(!validate_email("@example.com"));
        assert!(!validate_email("ada lovelace@example.com"));
        assert!(!validate_email("ada@@example.com"));
        assert!(!validate_email("ada@example.com\n"));
    }

    #[test]
    fn passwords() {
        assert!(!validate_password("12345"));
        assert!(validate_password("123456"));
    }

    #[test]
    fn skill_names() {
        assert!(validate_skill_name("Rust"));
        assert!(validate_skill_name("Front-end Design 2"));
        assert!(!validate_skill_name("R"));
        assert!(!validate_skill_name("C++"));
        assert!(!validate_skill_name("node.js"));
        assert!(!validate_skill_name("Café"));
    }

    #[test]
    fn check_reports_a_message() {
        assert_eq!(check(Field::SkillName, "Go"), Ok(()));
        let err = check(Field::Password, "abc").unwrap_err();
        assert!(err.contains("6 characters"));
    }
}
