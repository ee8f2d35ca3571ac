// ABOUTME: Validated cloud resource identifiers and SSH principals.
// ABOUTME: Rejects empty values, whitespace, and control characters.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResourceNameError {
    #[error("{0} cannot be empty")]
    Empty(&'static str),

    #[error("{field} exceeds maximum length of {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("invalid character in {field}: {found:?}")]
    InvalidChar { field: &'static str, found: char },
}

/// Maximum length accepted for any identifier.
const MAX_LEN: usize = 255;

/// A non-empty identifier such as a project, zone, instance or user name.
///
/// The `field` label is only used to make validation errors readable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceName(String);

impl ResourceName {
    pub fn new(field: &'static str, value: &str) -> Result<Self, ResourceNameError> {
        if value.is_empty() {
            return Err(ResourceNameError::Empty(field));
        }

        if value.len() > MAX_LEN {
            return Err(ResourceNameError::TooLong {
                field,
                max: MAX_LEN,
            });
        }

        if let Some(c) = value.chars().find(|c| c.is_whitespace() || c.is_control()) {
            return Err(ResourceNameError::InvalidChar { field, found: c });
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
