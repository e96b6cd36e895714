//! Explicit request validation.
//!
//! Request payloads are checked by plain functions that return a [`Validated`]
//! value: either the validated command or every field-level error found. The
//! HTTP boundary calls these before touching any manager, and the managers reuse
//! the same error type for their own guards.

use serde::Serialize;
use std::fmt;

/// One failed check on one input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// All field errors collected while validating one input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

/// Outcome of validating an input: the value, or every field error.
pub type Validated<T> = Result<T, ValidationErrors>;

impl ValidationErrors {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Shorthand for a single-field failure
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// Names of the fields that failed, in the order they were checked
    pub fn fields(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.field.as_str()).collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Accumulates field checks and produces a [`Validated`] result.
///
/// # Example
///
/// ```
/// use ringside::validation::Validator;
///
/// let mut v = Validator::new();
/// v.require_range("amount", 50, 100, 1_000_000)
///     .require_len("provider", "card", 1, 32);
/// let result = v.finish(50);
/// assert_eq!(result.unwrap_err().fields(), vec!["amount"]);
/// ```
#[derive(Debug, Default)]
pub struct Validator {
    errors: ValidationErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` against `field` unless `ok` holds
    pub fn check(&mut self, ok: bool, field: &str, message: impl Into<String>) -> &mut Self {
        if !ok {
            self.errors.push(field, message);
        }
        self
    }

    pub fn require_positive(&mut self, field: &str, value: i64) -> &mut Self {
        self.check(value > 0, field, "must be a positive integer")
    }

    /// Inclusive range check
    pub fn require_range(&mut self, field: &str, value: i64, min: i64, max: i64) -> &mut Self {
        self.check(
            (min..=max).contains(&value),
            field,
            format!("must be between {min} and {max}"),
        )
    }

    /// Character-count check on a trimmed string
    pub fn require_len(&mut self, field: &str, value: &str, min: usize, max: usize) -> &mut Self {
        let len = value.trim().chars().count();
        self.check(
            (min..=max).contains(&len),
            field,
            format!("must be {min}-{max} characters"),
        )
    }

    /// Fold in the errors of a nested check
    pub fn merge(&mut self, result: Result<(), ValidationErrors>) -> &mut Self {
        if let Err(errors) = result {
            self.errors.0.extend(errors.0);
        }
        self
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn finish<T>(self, value: T) -> Validated<T> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(self.errors)
        }
    }

    /// Like [`Validator::finish`], but only builds the value when every check passed
    pub fn finish_with<T>(self, build: impl FnOnce() -> T) -> Validated<T> {
        if self.errors.is_empty() {
            Ok(build())
        } else {
            Err(self.errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_every_failure() {
        let mut v = Validator::new();
        v.require_positive("amount", 0)
            .require_len("provider", "", 1, 32)
            .check(true, "fight_id", "unused");

        let errors = v.finish(()).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.fields(), vec!["amount", "provider"]);
    }

    #[test]
    fn test_passes_value_through_when_clean() {
        let mut v = Validator::new();
        v.require_range("amount", 500, 100, 1_000);
        assert_eq!(v.finish(500), Ok(500));
    }

    #[test]
    fn test_range_is_inclusive() {
        let mut v = Validator::new();
        v.require_range("amount", 100, 100, 1_000)
            .require_range("other", 1_000, 100, 1_000);
        assert!(!v.has_errors());
    }

    #[test]
    fn test_finish_with_skips_builder_on_error() {
        let mut v = Validator::new();
        v.require_positive("amount", -5);
        let result: Validated<i64> = v.finish_with(|| panic!("builder must not run"));
        assert!(result.is_err());
    }

    #[test]
    fn test_display_joins_fields() {
        let mut errors = ValidationErrors::single("amount", "too small");
        errors.push("odds", "must exceed 1");
        assert_eq!(errors.to_string(), "amount: too small; odds: must exceed 1");
    }

    #[test]
    fn test_serializes_as_array() {
        let errors = ValidationErrors::single("amount", "too small");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json[0]["field"], "amount");
        assert_eq!(json[0]["message"], "too small");
    }
}
