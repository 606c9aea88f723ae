use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{Field, KeyGateError};

/// Longest alias accepted, in bytes. Aliases name files in filesystem
/// stores, and their base58 form has to fit a 255-byte file name.
pub const MAX_ALIAS_LEN: usize = 128;

/// A caller-chosen name for a key pair.
///
/// Aliases are unique per key store, never empty and at most
/// [`MAX_ALIAS_LEN`] bytes long. Surrounding whitespace is significant and
/// preserved, but an alias made only of whitespace counts as missing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyAlias(String);

impl KeyAlias {
    /// Validate and wrap an alias.
    ///
    /// # Errors
    ///
    /// Returns [`KeyGateError::MissingArgument`] for an empty alias and
    /// [`KeyGateError::InvalidArgument`] for one longer than
    /// [`MAX_ALIAS_LEN`].
    pub fn new(alias: impl Into<String>) -> Result<Self, KeyGateError> {
        let alias = alias.into();
        if alias.trim().is_empty() {
            return Err(KeyGateError::MissingArgument(Field::Key));
        }
        if alias.len() > MAX_ALIAS_LEN {
            return Err(KeyGateError::InvalidArgument {
                field: Field::Key,
                reason: format!("{} bytes long, at most {MAX_ALIAS_LEN} allowed", alias.len()),
            });
        }
        Ok(Self(alias))
    }

    /// The alias text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Storage key for records addressed by this alias.
    pub(crate) fn storage_key(&self) -> String {
        self.0.clone()
    }
}

impl fmt::Display for KeyAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for KeyAlias {
    type Err = KeyGateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for KeyAlias {
    type Error = KeyGateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<KeyAlias> for String {
    fn from(alias: KeyAlias) -> Self {
        alias.0
    }
}

impl AsRef<str> for KeyAlias {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_aliases_are_missing() {
        assert!(matches!(
            KeyAlias::new(""),
            Err(KeyGateError::MissingArgument(Field::Key))
        ));
        assert!(matches!(
            KeyAlias::new("   "),
            Err(KeyGateError::MissingArgument(Field::Key))
        ));
    }

    #[test]
    fn overlong_aliases_are_invalid() {
        assert!(KeyAlias::new("a".repeat(MAX_ALIAS_LEN)).is_ok());
        assert!(matches!(
            KeyAlias::new("a".repeat(MAX_ALIAS_LEN + 1)),
            Err(KeyGateError::InvalidArgument {
                field: Field::Key,
                ..
            })
        ));
    }

    #[test]
    fn aliases_round_trip_through_json() {
        let alias: KeyAlias = "user-42".parse().unwrap();
        let json = serde_json::to_string(&alias).unwrap();
        assert_eq!(json, "\"user-42\"");
        assert_eq!(serde_json::from_str::<KeyAlias>(&json).unwrap(), alias);
        assert!(serde_json::from_str::<KeyAlias>("\"\"").is_err());
    }
}
