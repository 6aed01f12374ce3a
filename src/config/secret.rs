//! Key material handling using the secrecy crate
//!
//! Correspondence store keys are read from configuration as base64 strings.
//! They are held in [`SecretString`], which zeroes its memory on drop and
//! redacts itself in `Debug` output, so a logged or dumped config never shows
//! a key.
//!
//! # Example
//!
//! ```rust
//! use veil::config::secret_string;
//! use secrecy::ExposeSecret;
//!
//! let key = secret_string("c2VjcmV0LWtleS1tYXRlcmlhbA==".to_string());
//! let exposed: &str = key.expose_secret().as_ref();
//! assert_eq!(exposed, "c2VjcmV0LWtleS1tYXRlcmlhbA==");
//! assert!(!format!("{key:?}").contains("c2Vj"));
//! ```

use secrecy::{CloneableSecret, DebugSecret, Secret, SerializableSecret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

/// String newtype that can live inside a [`Secret`]
#[derive(Clone, Debug, Zeroize)]
#[zeroize(drop)]
pub struct SecretValue(String);

impl CloneableSecret for SecretValue {}
impl DebugSecret for SecretValue {}
impl SerializableSecret for SecretValue {}

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        SecretValue(s)
    }
}

impl AsRef<str> for SecretValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl SecretValue {
    /// Whether the value is empty or whitespace
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Serialize for SecretValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretValue)
    }
}

/// A configuration secret, zeroed on drop and redacted in `Debug`
pub type SecretString = Secret<SecretValue>;

/// Wrap a string as a [`SecretString`]
#[inline]
pub fn secret_string(value: String) -> SecretString {
    Secret::new(SecretValue::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_secret_debug_redacted() {
        let secret = secret_string("sensitive-key".to_string());
        let debug_output = format!("{secret:?}");
        assert!(!debug_output.contains("sensitive-key"));
    }

    #[test]
    fn test_secret_deserializes_from_toml() {
        #[derive(Deserialize)]
        struct Keys {
            hmac_key: SecretString,
        }

        let keys: Keys = toml::from_str("hmac_key = \"abc\"").unwrap();
        let exposed: &str = keys.hmac_key.expose_secret().as_ref();
        assert_eq!(exposed, "abc");
        assert!(!keys.hmac_key.expose_secret().is_blank());
        assert!(secret_string("  ".to_string()).expose_secret().is_blank());
    }
}
