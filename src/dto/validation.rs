//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::services::matchmaking::{ROOM_CODE_ALPHABET, ROOM_CODE_LENGTH, normalize_room_code};

/// Validates a user-typed room code: six symbols of the room-code alphabet, any case.
///
/// # Examples
///
/// ```ignore
/// validate_room_code("K7QX2M")  // Ok
/// validate_room_code(" k7qx2m") // Ok - trimmed and upper-cased
/// validate_room_code("K7QX0M")  // Err - `0` is not part of the alphabet
/// ```
pub fn validate_room_code(code: &str) -> Result<(), ValidationError> {
    let code = normalize_room_code(code);
    if code.len() != ROOM_CODE_LENGTH {
        let mut err = ValidationError::new("room_code_length");
        err.message = Some(
            format!(
                "Room code must be exactly {ROOM_CODE_LENGTH} characters (got {})",
                code.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b)) {
        let mut err = ValidationError::new("room_code_format");
        err.message = Some("Room code contains characters that are never used in codes".into());
        return Err(err);
    }

    Ok(())
}
