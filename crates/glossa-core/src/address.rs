//! Participant identity.
//!
//! Wallet addresses arrive from clients in whatever casing their wallet
//! produces. Every lookup table in the daemon is keyed by [`Address`], which
//! lowercases on construction so two spellings of the same wallet can never
//! occupy separate entries.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// A case-normalized wallet address.
///
/// Construction is the only way in (including deserialization), so an
/// `Address` held anywhere in the process is already trimmed and lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Address {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Address::new(raw))
    }
}

/// Which side of a session a participant is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Tutor,
    Student,
}

impl Role {
    pub fn other(self) -> Role {
        match self {
            Role::Tutor => Role::Student,
            Role::Student => Role::Tutor,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Tutor => f.write_str("tutor"),
            Role::Student => f.write_str("student"),
        }
    }
}
