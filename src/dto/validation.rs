//! Validation helpers for DTOs.

use validator::ValidationError;

const MAX_NAME_LEN: usize = 64;

/// Validates a display name: not blank, at most 64 characters.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("name_blank");
        err.message = Some("Name must not be blank".into());
        return Err(err);
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        let mut err = ValidationError::new("name_length");
        err.message = Some(format!("Name must be at most {MAX_NAME_LEN} characters").into());
        return Err(err);
    }
    Ok(())
}

/// Validates a dialable phone number: optional leading `+`, then 6 to 15 digits.
/// Spaces, dashes and dots are accepted as separators.
///
/// # Examples
///
/// ```ignore
/// validate_phone("+33 6 12 34 56 78") // Ok
/// validate_phone("06-12-34")          // Err - too short
/// validate_phone("call me")           // Err - not digits
/// ```
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let body = phone.trim();
    let body = body.strip_prefix('+').unwrap_or(body);

    if !body
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '.'))
    {
        let mut err = ValidationError::new("phone_format");
        err.message = Some("Phone number may only contain digits and separators".into());
        return Err(err);
    }

    let digits = body.chars().filter(char::is_ascii_digit).count();
    if !(6..=15).contains(&digits) {
        let mut err = ValidationError::new("phone_length");
        err.message = Some(format!("Phone number must have 6 to 15 digits (got {digits})").into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_phone_valid() {
        assert!(validate_phone("+33 6 12 34 56 78").is_ok());
        assert!(validate_phone("555-0100").is_ok());
        assert!(validate_phone("0612345678").is_ok());
    }

    #[test]
    fn test_validate_phone_invalid() {
        assert!(validate_phone("").is_err());
        assert!(validate_phone("12345").is_err()); // too short
        assert!(validate_phone("1234567890123456").is_err()); // too long
        assert!(validate_phone("06 12 AB 56 78").is_err());
        assert!(validate_phone("++33612345678").is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("The Owls").is_ok());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(65)).is_err());
    }
}
