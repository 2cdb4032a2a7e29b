//! Common validation utilities.

use validator::{ValidateEmail, ValidationError};

/// Maximum length of a single recipient address.
pub const MAX_ADDRESS_LENGTH: usize = 254;

/// Maximum number of recipients accepted for one gift.
pub const MAX_RECIPIENTS: usize = 50;

/// Maximum length of a custom message attached to a gift.
pub const MAX_CUSTOM_MESSAGE_LENGTH: usize = 10_000;

/// Validates a single email address.
pub fn validate_address(address: &str) -> Result<(), ValidationError> {
    if address.len() > MAX_ADDRESS_LENGTH {
        let mut err = ValidationError::new("address_length");
        err.message = Some(format!("Address must be at most {} characters", MAX_ADDRESS_LENGTH).into());
        return Err(err);
    }

    if address.validate_email() {
        Ok(())
    } else {
        let mut err = ValidationError::new("address_format");
        err.message = Some(format!("Invalid email address: {}", address).into());
        Err(err)
    }
}

/// Validates a recipient list at configuration time.
///
/// The list must be non-empty, bounded, and every entry must be a well-formed
/// address. Duplicates are allowed.
pub fn validate_recipients<S: AsRef<str>>(recipients: &[S]) -> Result<(), ValidationError> {
    if recipients.is_empty() {
        let mut err = ValidationError::new("recipients_empty");
        err.message = Some("At least one recipient is required".into());
        return Err(err);
    }

    if recipients.len() > MAX_RECIPIENTS {
        let mut err = ValidationError::new("recipients_count");
        err.message = Some(format!("At most {} recipients are allowed", MAX_RECIPIENTS).into());
        return Err(err);
    }

    recipients
        .iter()
        .try_for_each(|address| validate_address(address.as_ref()))
}

/// Validates that a username query value is usable.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("username_required");
        err.message = Some("Username is required".into());
        return Err(err);
    }
    if trimmed.len() > 64 {
        let mut err = ValidationError::new("username_length");
        err.message = Some("Username must be at most 64 characters".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_address() {
        assert!(validate_address("a@x.com").is_ok());
        assert!(validate_address("first.last+tag@example.org").is_ok());
        assert!(validate_address("not-an-address").is_err());
        assert!(validate_address("").is_err());
    }

    #[test]
    fn test_validate_generated_addresses() {
        use fake::faker::internet::en::SafeEmail;
        use fake::Fake;

        for _ in 0..20 {
            let address: String = SafeEmail().fake();
            assert!(validate_address(&address).is_ok(), "{address}");
        }
    }

    #[test]
    fn test_validate_address_too_long() {
        let long = format!("{}@example.com", "a".repeat(250));
        let err = validate_address(&long).unwrap_err();
        assert_eq!(err.code, "address_length");
    }

    #[test]
    fn test_validate_address_error_message() {
        let err = validate_address("broken").unwrap_err();
        assert_eq!(
            err.message.unwrap().to_string(),
            "Invalid email address: broken"
        );
    }

    #[test]
    fn test_validate_recipients_empty() {
        let empty: Vec<String> = vec![];
        let err = validate_recipients(&empty).unwrap_err();
        assert_eq!(
            err.message.unwrap().to_string(),
            "At least one recipient is required"
        );
    }

    #[test]
    fn test_validate_recipients_duplicates_allowed() {
        assert!(validate_recipients(&["a@x.com", "a@x.com"]).is_ok());
    }

    #[test]
    fn test_validate_recipients_rejects_bad_entry() {
        let err = validate_recipients(&["a@x.com", "nope"]).unwrap_err();
        assert_eq!(err.code, "address_format");
    }

    #[test]
    fn test_validate_recipients_too_many() {
        let many: Vec<String> = (0..=MAX_RECIPIENTS)
            .map(|i| format!("user{}@example.com", i))
            .collect();
        let err = validate_recipients(&many).unwrap_err();
        assert_eq!(err.code, "recipients_count");
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("   ").is_err());
        assert!(validate_username(&"u".repeat(65)).is_err());
    }
}
