//! Agent identifier types.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// Identifier for the agent owning a set of persisted files.
///
/// The identifier is embedded in storage keys of the form
/// `files:<agent-id>:data:<path>`, so it may not contain `:` or whitespace.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentId(String);

impl AgentId {
    /// Creates an identifier after validating the supplied value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAgentId`] when the value is empty or contains
    /// `:` or whitespace.
    pub fn new(value: impl Into<String>) -> crate::Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(Error::InvalidAgentId {
                id: value,
                reason: "identifier must not be empty".into(),
            });
        }
        if let Some(bad) = value.chars().find(|c| *c == ':' || c.is_whitespace()) {
            return Err(Error::InvalidAgentId {
                reason: format!("identifier must not contain {bad:?}"),
                id: value,
            });
        }
        Ok(Self(value))
    }

    /// Generates a random identifier backed by a v4 UUID.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::random()
    }
}

impl Display for AgentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Uuid> for AgentId {
    fn from(value: Uuid) -> Self {
        Self(value.to_string())
    }
}

impl From<AgentId> for String {
    fn from(value: AgentId) -> Self {
        value.0
    }
}

impl TryFrom<String> for AgentId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl FromStr for AgentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
