//! Protection of originals at rest
//!
//! - lookup digests: HMAC-SHA256 over `technique_id \0 original`
//! - reversible originals: AES-256-GCM with a random 96-bit nonce, the technique
//!   id bound as associated data
//! - one-way pseudonyms: derived from a second, domain-separated HMAC

use crate::domain::errors::StoreError;
use crate::domain::ids::{Pseudonym, TechniqueId};
use crate::store::StoreResult;
use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{digest::Output, Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// AES-256 key length in bytes
pub const ENCRYPTION_KEY_LEN: usize = 32;

/// Minimum accepted HMAC key length in bytes
pub const MIN_HMAC_KEY_LEN: usize = 16;

const NONCE_LEN: usize = 12;
const LOOKUP_LABEL: &[u8] = b"veil/lookup/v1";
const PSEUDONYM_LABEL: &[u8] = b"veil/pseudonym/v1";

/// AES-256-GCM ciphertext with its nonce, base64 encoded for the journal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedValue {
    /// 96-bit nonce
    pub nonce: String,
    /// Ciphertext including the authentication tag
    pub ciphertext: String,
}

/// Keyed protection for correspondence entries
pub struct ValueProtector {
    cipher: Aes256Gcm,
    mac: HmacSha256,
}

impl ValueProtector {
    /// Build from raw key bytes
    pub fn new(encryption_key: &[u8], hmac_key: &[u8]) -> StoreResult<Self> {
        if encryption_key.len() != ENCRYPTION_KEY_LEN {
            return Err(StoreError::Crypto(format!(
                "encryption key must be {ENCRYPTION_KEY_LEN} bytes, got {}",
                encryption_key.len()
            )));
        }
        if hmac_key.len() < MIN_HMAC_KEY_LEN {
            return Err(StoreError::Crypto(format!(
                "HMAC key must be at least {MIN_HMAC_KEY_LEN} bytes, got {}",
                hmac_key.len()
            )));
        }
        let cipher = Aes256Gcm::new_from_slice(encryption_key)
            .map_err(|e| StoreError::Crypto(e.to_string()))?;
        let mac = <HmacSha256 as Mac>::new_from_slice(hmac_key)
            .map_err(|e| StoreError::Crypto(e.to_string()))?;
        Ok(Self { cipher, mac })
    }

    /// Build from base64 encoded keys as found in configuration
    pub fn from_base64(encryption_key: &str, hmac_key: &str) -> StoreResult<Self> {
        let encryption_key = Zeroizing::new(decode_key(encryption_key, "encryption_key")?);
        let hmac_key = Zeroizing::new(decode_key(hmac_key, "hmac_key")?);
        Self::new(&encryption_key, &hmac_key)
    }

    /// Fresh random keys, for stores that do not outlive the process
    pub fn ephemeral() -> StoreResult<Self> {
        let mut encryption_key = Zeroizing::new([0u8; ENCRYPTION_KEY_LEN]);
        let mut hmac_key = Zeroizing::new([0u8; 32]);
        rand::thread_rng().fill_bytes(encryption_key.as_mut_slice());
        rand::thread_rng().fill_bytes(hmac_key.as_mut_slice());
        Self::new(encryption_key.as_slice(), hmac_key.as_slice())
    }

    fn mac(&self, label: &[u8], technique_id: &TechniqueId, original: &str) -> Output<HmacSha256> {
        let mut mac = self.mac.clone();
        mac.update(label);
        mac.update(&[0]);
        mac.update(technique_id.as_str().as_bytes());
        mac.update(&[0]);
        mac.update(original.as_bytes());
        mac.finalize().into_bytes()
    }

    /// Keyed digest identifying `(technique_id, original)` without revealing it
    pub fn lookup_digest(&self, technique_id: &TechniqueId, original: &str) -> String {
        format!("{:x}", self.mac(LOOKUP_LABEL, technique_id, original))
    }

    /// Deterministic one-way pseudonym: `prefix` + 32 hex characters
    pub fn one_way_pseudonym(
        &self,
        technique_id: &TechniqueId,
        original: &str,
        prefix: &str,
    ) -> Pseudonym {
        let digest = self.mac(PSEUDONYM_LABEL, technique_id, original);
        Pseudonym::new(format!("{prefix}{digest:.32x}"))
    }

    /// Encrypt an original, binding it to its technique id
    pub fn seal(&self, technique_id: &TechniqueId, original: &str) -> StoreResult<SealedValue> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(
                nonce,
                Payload {
                    msg: original.as_bytes(),
                    aad: technique_id.as_str().as_bytes(),
                },
            )
            .map_err(|_| StoreError::Crypto("AEAD encryption failed".to_string()))?;

        Ok(SealedValue {
            nonce: BASE64.encode(nonce_bytes),
            ciphertext: BASE64.encode(ciphertext),
        })
    }

    /// Decrypt an original sealed under the same technique id
    pub fn open(&self, technique_id: &TechniqueId, sealed: &SealedValue) -> StoreResult<String> {
        let nonce_bytes = BASE64
            .decode(&sealed.nonce)
            .map_err(|e| StoreError::Crypto(format!("invalid nonce encoding: {e}")))?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(StoreError::Crypto(format!(
                "nonce must be {NONCE_LEN} bytes, got {}",
                nonce_bytes.len()
            )));
        }
        let ciphertext = BASE64
            .decode(&sealed.ciphertext)
            .map_err(|e| StoreError::Crypto(format!("invalid ciphertext encoding: {e}")))?;

        let plaintext = Zeroizing::new(
            self.cipher
                .decrypt(
                    Nonce::from_slice(&nonce_bytes),
                    Payload {
                        msg: &ciphertext,
                        aad: technique_id.as_str().as_bytes(),
                    },
                )
                .map_err(|_| StoreError::Crypto("AEAD decryption failed".to_string()))?,
        );

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| StoreError::Crypto("decrypted original is not UTF-8".to_string()))
    }
}

impl std::fmt::Debug for ValueProtector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueProtector").finish_non_exhaustive()
    }
}

/// Generate a random base64 key of `len` bytes, as written by `veil init`
pub fn generate_key_base64(len: usize) -> String {
    let mut key = Zeroizing::new(vec![0u8; len]);
    rand::thread_rng().fill_bytes(key.as_mut_slice());
    BASE64.encode(key.as_slice())
}

fn decode_key(encoded: &str, name: &str) -> StoreResult<Vec<u8>> {
    BASE64
        .decode(encoded.trim())
        .map_err(|e| StoreError::Crypto(format!("{name} is not valid base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> TechniqueId {
        TechniqueId::new(s).unwrap()
    }

    fn protector() -> ValueProtector {
        ValueProtector::new(&[7u8; 32], &[9u8; 32]).unwrap()
    }

    #[test]
    fn test_seal_and_open() {
        let p = protector();
        let sealed = p.seal(&id("customer"), "jane.doe@corp.com").unwrap();
        assert!(!sealed.ciphertext.contains("jane"));
        assert_eq!(p.open(&id("customer"), &sealed).unwrap(), "jane.doe@corp.com");
    }

    #[test]
    fn test_open_rejects_other_technique_id() {
        let p = protector();
        let sealed = p.seal(&id("customer"), "secret").unwrap();
        assert!(matches!(
            p.open(&id("patient"), &sealed),
            Err(StoreError::Crypto(_))
        ));
    }

    #[test]
    fn test_digests_are_keyed_and_scoped() {
        let p = protector();
        let other = ValueProtector::new(&[7u8; 32], &[1u8; 32]).unwrap();
        let a = p.lookup_digest(&id("customer"), "x");
        assert_eq!(a, p.lookup_digest(&id("customer"), "x"));
        assert_ne!(a, p.lookup_digest(&id("patient"), "x"));
        assert_ne!(a, other.lookup_digest(&id("customer"), "x"));
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
    }

    #[test]
    fn test_one_way_pseudonym_is_deterministic() {
        let p = protector();
        let a = p.one_way_pseudonym(&id("customer"), "x", "H_");
        assert_eq!(a, p.one_way_pseudonym(&id("customer"), "x", "H_"));
        assert!(a.as_str().starts_with("H_"));
        assert_eq!(a.as_str().len(), 2 + 32);
        assert!(a.as_str()[2..].chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
        let digest = p.lookup_digest(&id("customer"), "x");
        assert_ne!(&a.as_str()[2..], &digest[..32]);
    }

    #[test]
    fn test_key_validation() {
        assert!(ValueProtector::new(&[0u8; 16], &[0u8; 32]).is_err());
        assert!(ValueProtector::new(&[0u8; 32], &[0u8; 4]).is_err());
        let enc = generate_key_base64(32);
        let mac = generate_key_base64(32);
        assert!(ValueProtector::from_base64(&enc, &mac).is_ok());
        assert!(ValueProtector::from_base64("not base64!", &mac).is_err());
    }
}
