use grantwell_core::{AppError, AppResult};

/// Separator used between composite ledger key components.
pub const KEY_SEPARATOR: char = '~';

/// Longest accepted principal, resource or permission identifier.
pub const IDENTIFIER_MAX_LENGTH: usize = 256;

/// Validates an opaque identifier used as a ledger key component.
///
/// Identifiers are embedded in composite keys, so they must not contain the
/// key separator or control characters.
pub fn validate_identifier(field_name: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!(
            "{field_name} must not be empty"
        )));
    }

    if value.len() > IDENTIFIER_MAX_LENGTH {
        return Err(AppError::Validation(format!(
            "{field_name} must not exceed {IDENTIFIER_MAX_LENGTH} characters"
        )));
    }

    if value.contains(KEY_SEPARATOR) || value.chars().any(char::is_control) {
        return Err(AppError::Validation(format!(
            "{field_name} '{}' contains a reserved character",
            value.escape_debug()
        )));
    }

    Ok(())
}
