use std::fmt;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

const SECRET_DOMAIN: &[u8] = b"unify-secret-v1:";
const SECRET_LENGTH: usize = 48;

/// A one-time secret handed to a voter (verification link, invitation link).
///
/// The raw secret only ever travels to the voter. Stores keep the
/// [`SecretDigest`] and look rows up by digest.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(String);

impl SecretKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generate a random alphanumeric secret.
    pub fn generate() -> Self {
        let value: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SECRET_LENGTH)
            .map(char::from)
            .collect();
        Self(value)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Domain-separated BLAKE3 digest of the trimmed secret.
    pub fn digest(&self) -> SecretDigest {
        let mut hasher = blake3::Hasher::new();
        hasher.update(SECRET_DOMAIN);
        hasher.update(self.0.trim().as_bytes());
        SecretDigest(*hasher.finalize().as_bytes())
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

/// Stored fingerprint of a [`SecretKey`]. Serialized as hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SecretDigest([u8; 32]);

impl SecretDigest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl From<SecretDigest> for String {
    fn from(digest: SecretDigest) -> Self {
        digest.to_hex()
    }
}

impl TryFrom<String> for SecretDigest {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl fmt::Debug for SecretDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretDigest({})", &self.to_hex()[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic_and_trims() {
        let a = SecretKey::new("abc123").digest();
        let b = SecretKey::new("  abc123\n").digest();
        assert_eq!(a, b);
        assert_ne!(a, SecretKey::new("abc124").digest());
    }

    #[test]
    fn generated_secrets_differ() {
        let a = SecretKey::generate();
        let b = SecretKey::generate();
        assert_eq!(a.expose().len(), SECRET_LENGTH);
        assert_ne!(a, b);
    }

    #[test]
    fn debug_redacts_raw_secret() {
        let key = SecretKey::new("do-not-print");
        assert!(!format!("{key:?}").contains("do-not-print"));
    }

    #[test]
    fn digest_serializes_as_hex() {
        let digest = SecretKey::new("s").digest();
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json.len(), 64 + 2);
        let back: SecretDigest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, digest);
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        assert_eq!(
            SecretDigest::from_hex("abcd"),
            Err(TypeError::InvalidLength {
                expected: 32,
                actual: 2
            })
        );
    }
}
