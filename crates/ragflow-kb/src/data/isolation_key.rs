use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::errors::KbError;

/// Scopes every stored vector and every search to one upload session.
///
/// Upload clients build keys of the form `<session uuid>--<document name>`,
/// so two uploads of the same file in different sessions never share data.
/// Any non-blank string is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IsolationKey(String);

impl IsolationKey {
    /// Separates the session part from the document name
    pub const SEPARATOR: &'static str = "--";

    /// Validate a caller-supplied key. Blank keys are rejected.
    pub fn parse(raw: impl Into<String>) -> Result<Self, KbError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(KbError::IsolationViolation(
                "isolation key must not be empty".to_string(),
            ));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The document name part of the key, or the whole key when it has no session prefix
    pub fn display_name(&self) -> &str {
        self.0
            .split_once(Self::SEPARATOR)
            .map(|(_, name)| name)
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.0)
    }

    /// Deterministic id of the chunk at `index` under this key.
    ///
    /// Re-ingesting the same document under the same key overwrites its
    /// records instead of duplicating them.
    pub fn record_id(&self, index: usize) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("{}:{}", self.0, index).as_bytes())
    }
}

impl fmt::Display for IsolationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for IsolationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for IsolationKey {
    type Error = KbError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<IsolationKey> for String {
    fn from(key: IsolationKey) -> Self {
        key.0
    }
}
