//! Input validation utilities.

use validator::{Validate, ValidationError};

use crate::error::StudyHubError;

/// Validate a request body, returning a StudyHubError::Validation on failure.
pub fn validate_request<T: Validate>(body: &T) -> Result<(), StudyHubError> {
    body.validate().map_err(|e| StudyHubError::Validation {
        message: format_validation_errors(e),
    })
}

/// Format validation errors into a human-readable string.
fn format_validation_errors(errors: validator::ValidationErrors) -> String {
    let mut messages = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for '{field}'"))
            })
        })
        .collect::<Vec<_>>();
    messages.sort();
    messages.join("; ")
}

/// Community names must contain something other than whitespace.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Name cannot be empty or whitespace only".into());
        return Err(err);
    }
    Ok(())
}

/// At most 10 tags, each 1-30 characters.
pub fn validate_tags(tags: &[String]) -> Result<(), ValidationError> {
    if tags.len() > 10 {
        let mut err = ValidationError::new("too_many_tags");
        err.message = Some("A community can have at most 10 tags".into());
        return Err(err);
    }
    if tags.iter().any(|t| t.trim().is_empty() || t.chars().count() > 30) {
        let mut err = ValidationError::new("tag_length");
        err.message = Some("Tags must be 1-30 characters".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_names_are_rejected() {
        assert!(validate_name("   ").is_err());
        assert!(validate_name("Algorithms").is_ok());
    }

    #[test]
    fn tag_rules() {
        assert!(validate_tags(&["graphs".into(), "dp".into()]).is_ok());
        assert!(validate_tags(&vec!["x".to_string(); 11]).is_err());
        assert!(validate_tags(&["a".repeat(31)]).is_err());
        assert!(validate_tags(&[" ".into()]).is_err());
    }
}
