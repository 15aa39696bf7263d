use crate::utils::error::{Result, ScopeError};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static MEMBER_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*([.\-][A-Za-z0-9_$]+)*$").expect("member name pattern")
});

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ScopeError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

/// Member and dependency names: identifier segments joined by `.` or `-`.
pub fn validate_member_name(field_name: &str, name: &str) -> Result<()> {
    if !MEMBER_NAME.is_match(name) {
        return Err(ScopeError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: name.to_string(),
            reason: "Expected identifier segments separated by '.' or '-'".to_string(),
        });
    }
    Ok(())
}

pub fn validate_member_names(field_name: &str, names: &[String]) -> Result<()> {
    for name in names {
        validate_member_name(field_name, name)?;
    }
    Ok(())
}

pub fn validate_unique_names<'a>(
    field_name: &str,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ScopeError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: name.to_string(),
                reason: "Duplicate name".to_string(),
            });
        }
    }
    Ok(())
}

pub fn validate_one_of(field_name: &str, value: &str, allowed: &[&str]) -> Result<()> {
    if !allowed.contains(&value) {
        return Err(ScopeError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Valid values: {}", allowed.join(", ")),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(ScopeError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_member_name() {
        assert!(validate_member_name("expose", "label").is_ok());
        assert!(validate_member_name("expose", "user.first_name").is_ok());
        assert!(validate_member_name("expose", "user-name").is_ok());
        assert!(validate_member_name("inject", "$scope").is_ok());
        assert!(validate_member_name("inject", "greeter.service").is_ok());
        assert!(validate_member_name("expose", "").is_err());
        assert!(validate_member_name("expose", "1abc").is_err());
        assert!(validate_member_name("expose", "a..b").is_err());
        assert!(validate_member_name("expose", "has space").is_err());
    }

    #[test]
    fn test_validate_unique_names() {
        assert!(validate_unique_names("components", ["a", "b"]).is_ok());
        assert!(validate_unique_names("components", ["a", "b", "a"]).is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("settings.digest_ttl", 10, 1, 100).is_ok());
        assert!(validate_range("settings.digest_ttl", 0, 1, 100).is_err());
    }

    #[test]
    fn test_validate_one_of() {
        assert!(validate_one_of("kind", "controller", &["controller", "filter"]).is_ok());
        assert!(validate_one_of("kind", "widget", &["controller", "filter"]).is_err());
    }
}
