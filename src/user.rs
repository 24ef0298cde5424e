//! The user ID that owns receipts and transactions.
//!
//! Users themselves are managed by the authentication service, so the only
//! thing this crate checks is that an ID is well-formed.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for UserID {
    type Err = Error;

    /// Parse a user ID sent by a client.
    ///
    /// # Errors
    /// Returns [Error::InvalidUserIdentifier] unless `s` is a positive integer,
    /// optionally surrounded by whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().parse::<i64>() {
            Ok(id) if id > 0 => Ok(Self(id)),
            _ => Err(Error::InvalidUserIdentifier(s.to_owned())),
        }
    }
}

/// Parse an optional user ID from a request.
///
/// # Errors
/// Returns [Error::InvalidUserIdentifier] if `raw` is missing or malformed.
pub fn parse_user_id(raw: Option<&str>) -> Result<UserID, Error> {
    raw.ok_or_else(|| Error::InvalidUserIdentifier(String::new()))?
        .parse()
}
