use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Normalized contact identifier: the digits of the sender's phone number.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CustomerId(pub String);

impl CustomerId {
    /// Normalizes a raw gateway identifier such as `+55 (11) 99999-0000` or
    /// `5511999990000@c.us`. Returns `None` when no digits remain.
    pub fn normalize(raw: &str) -> Option<Self> {
        Self::parse(raw).ok()
    }

    /// Like [`CustomerId::normalize`], for identifiers that must be valid (configured numbers).
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let local = raw.split('@').next().unwrap_or_default();
        let digits: String = local.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            Err(DomainError::InvalidCustomerId(raw.to_owned()))
        } else {
            Ok(Self(digits))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
