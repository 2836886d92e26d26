//! Submission validation

use thiserror::Error;

/// Reasons a request is rejected before anything touches the disk
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntakeError {
    #[error("Code is required")]
    Missing,

    #[error("Code exceeds maximum length of {limit} bytes")]
    TooLarge { limit: usize, actual: usize },

    #[error("Invalid request body")]
    Malformed,
}

/// A validated, non-empty piece of source text
///
/// Whitespace-only source is accepted; the interpreter decides what it means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    code: String,
}

impl Submission {
    /// Validate raw request input against a source size ceiling
    pub fn new(code: Option<String>, max_source_bytes: usize) -> Result<Self, IntakeError> {
        let code = match code {
            Some(code) if !code.is_empty() => code,
            _ => return Err(IntakeError::Missing),
        };

        if code.len() > max_source_bytes {
            return Err(IntakeError::TooLarge {
                limit: max_source_bytes,
                actual: code.len(),
            });
        }

        Ok(Self { code })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_and_empty_code_are_rejected() {
        assert_eq!(Submission::new(None, 100), Err(IntakeError::Missing));
        assert_eq!(
            Submission::new(Some(String::new()), 100),
            Err(IntakeError::Missing)
        );
    }

    #[test]
    fn whitespace_only_code_is_accepted() {
        let submission = Submission::new(Some("   \n".into()), 100).unwrap();
        assert_eq!(submission.code(), "   \n");
    }

    #[test]
    fn oversized_code_is_rejected() {
        let err = Submission::new(Some("x".repeat(11)), 10).unwrap_err();
        assert_eq!(err, IntakeError::TooLarge { limit: 10, actual: 11 });
        assert_eq!(err.to_string(), "Code exceeds maximum length of 10 bytes");
    }

    #[test]
    fn code_at_limit_is_accepted() {
        let submission = Submission::new(Some("x".repeat(10)), 10).unwrap();
        assert_eq!(submission.len(), 10);
    }

    #[test]
    fn messages_match_wire_format() {
        assert_eq!(IntakeError::Missing.to_string(), "Code is required");
        assert_eq!(IntakeError::Malformed.to_string(), "Invalid request body");
    }
}
