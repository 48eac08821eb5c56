//! Redacting wrapper for OAuth tokens, passwords and consumer secrets.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A string whose contents never appear in Debug, Display or default serialization.
///
/// The inner value is zeroed on drop. Code that must persist or return the real
/// value has to ask for it explicitly, either through [`SecretString::expose_secret`]
/// or by annotating the field with `#[serde(with = "crate::secrets::exposed")]`.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl SecretString {
    /// Wraps a secret value.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Returns the underlying value. Never log the result.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Length of the secret without exposing it.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no secret was supplied.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for SecretString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretString)
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecretString {}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Serde adapter that writes the real secret value.
///
/// Only for records that must round-trip through storage or be handed to the
/// host as issued credential material.
pub mod exposed {
    use super::SecretString;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(secret.expose_secret())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretString::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_redacted_in_debug_and_display() {
        let token = SecretString::new("ya29.token-value");

        assert_eq!(format!("{:?}", token), "SecretString([REDACTED])");
        assert_eq!(token.to_string(), "[REDACTED]");
        assert_eq!(token.expose_secret(), "ya29.token-value");
    }

    #[test]
    fn test_default_serialization_redacts() {
        let json = serde_json::to_string(&SecretString::new("hunter2")).unwrap();
        assert_eq!(json, "\"[REDACTED]\"");
    }

    #[derive(Serialize, Deserialize)]
    struct Stored {
        #[serde(with = "exposed", default)]
        password: SecretString,
    }

    #[test]
    fn test_exposed_adapter_round_trips_value() {
        let stored = Stored { password: SecretString::new("hunter2") };
        let json = serde_json::to_string(&stored).unwrap();
        assert_eq!(json, r#"{"password":"hunter2"}"#);

        let back: Stored = serde_json::from_str(&json).unwrap();
        assert_eq!(back.password.expose_secret(), "hunter2");

        let missing: Stored = serde_json::from_str("{}").unwrap();
        assert!(missing.password.is_empty());
    }
}
