use thiserror::Error;

/// Maximum length for a Postgres replication slot name in bytes.
pub const MAX_SLOT_NAME_LENGTH: usize = 63;

/// Error type for slot name validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReplicationSlotNameError {
    #[error("Replication slot name is empty")]
    Empty,

    #[error("Invalid slot name length: {0}")]
    InvalidLength(String),

    #[error("Invalid slot name: {0}, only lower case letters, digits and underscores are allowed")]
    InvalidCharacters(String),
}

/// Checks that `slot_name` is accepted by Postgres as a replication slot name.
pub fn validate_slot_name(slot_name: &str) -> Result<(), ReplicationSlotNameError> {
    if slot_name.is_empty() {
        return Err(ReplicationSlotNameError::Empty);
    }

    if slot_name.len() > MAX_SLOT_NAME_LENGTH {
        return Err(ReplicationSlotNameError::InvalidLength(slot_name.into()));
    }

    let valid = slot_name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
    if !valid {
        return Err(ReplicationSlotNameError::InvalidCharacters(slot_name.into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_names() {
        assert!(validate_slot_name("replicant").is_ok());
        assert!(validate_slot_name("slot_01").is_ok());
        assert!(validate_slot_name(&"a".repeat(MAX_SLOT_NAME_LENGTH)).is_ok());
    }

    #[test]
    fn rejects_empty_name() {
        assert_eq!(validate_slot_name(""), Err(ReplicationSlotNameError::Empty));
    }

    #[test]
    fn rejects_long_name() {
        let name = "a".repeat(MAX_SLOT_NAME_LENGTH + 1);
        assert!(matches!(
            validate_slot_name(&name),
            Err(ReplicationSlotNameError::InvalidLength(_))
        ));
    }

    #[test]
    fn rejects_invalid_characters() {
        for name in ["Replicant", "slot-name", "slot name", "slot.1"] {
            assert!(matches!(
                validate_slot_name(name),
                Err(ReplicationSlotNameError::InvalidCharacters(_))
            ));
        }
    }
}
