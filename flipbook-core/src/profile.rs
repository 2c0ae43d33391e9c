use std::fmt;

use thiserror::Error;

pub const MAX_NAME_CHARS: usize = 20;
pub const MAX_SIGNATURE_CHARS: usize = 50;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("role must be between 1 and 5, got {0}")]
    RoleOutOfRange(u8),
}

/// Trims the reader's name and limits it to [`MAX_NAME_CHARS`] characters.
pub fn normalize_name(raw: &str) -> Result<String, ProfileError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ProfileError::EmptyName);
    }
    Ok(truncate_chars(trimmed, MAX_NAME_CHARS))
}

/// Pledge card signature; may be empty, in which case the line is left blank.
pub fn normalize_signature(raw: &str) -> String {
    truncate_chars(raw.trim(), MAX_SIGNATURE_CHARS)
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

/// Avatar the reader picked, 1 through 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Role(u8);

impl Role {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn asset_name(self) -> String {
        format!("role{:02}.png", self.0)
    }
}

impl Default for Role {
    fn default() -> Self {
        Role(Self::MIN)
    }
}

impl TryFrom<u8> for Role {
    type Error = ProfileError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Role(value))
        } else {
            Err(ProfileError::RoleOutOfRange(value))
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
