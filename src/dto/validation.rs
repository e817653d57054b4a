//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest accepted player name, in characters.
pub const MAX_PLAYER_NAME_LEN: usize = 32;

/// Characters that cannot appear in a store path segment.
const FORBIDDEN_NAME_CHARS: [char; 6] = ['/', '.', '#', '$', '[', ']'];

/// Validates a player name once surrounding whitespace has been trimmed.
///
/// The name doubles as the key of the player record, so it must be usable as a
/// single store path segment.
///
/// # Examples
///
/// ```ignore
/// validate_player_name("Alice")      // Ok
/// validate_player_name("   ")        // Err - empty
/// validate_player_name("team/alpha") // Err - forbidden character
/// ```
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        let mut err = ValidationError::new("player_name_empty");
        err.message = Some("Player name must not be empty".into());
        return Err(err);
    }

    let len = name.chars().count();
    if len > MAX_PLAYER_NAME_LEN {
        let mut err = ValidationError::new("player_name_length");
        err.message = Some(
            format!("Player name must be at most {MAX_PLAYER_NAME_LEN} characters (got {len})")
                .into(),
        );
        return Err(err);
    }

    if let Some(c) = name.chars().find(|c| FORBIDDEN_NAME_CHARS.contains(c)) {
        let mut err = ValidationError::new("player_name_format");
        err.message = Some(format!("Player name must not contain `{c}`").into());
        return Err(err);
    }

    Ok(())
}
