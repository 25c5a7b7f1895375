//! Entry signing
//!
//! Entries are signed with secp256k1 ECDSA over
//! `SHA-256(entry_hash || "|" || timestamp)`. Without a secret key the
//! signer degrades to a truncated-hash pseudo-signature; the two schemes
//! carry different tags so the weaker guarantee is always visible.

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

use crate::audit::hasher::canonical_timestamp;
use crate::error::ComplianceError;

pub const ECDSA_TAG: &str = "ECDSA";
pub const WEAK_TAG: &str = "HASH";

const WEAK_SIGNATURE_LEN: usize = 16;

/// A parsed entry signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrySignature {
    /// secp256k1 ECDSA signature, encoded as `ECDSA-<r hex>-<s hex>`
    Cryptographic(Signature),
    /// Truncated SHA-256, encoded as `HASH-<hex>`. Offers no non-repudiation.
    Weak([u8; WEAK_SIGNATURE_LEN]),
}

impl EntrySignature {
    pub fn scheme(&self) -> &'static str {
        match self {
            EntrySignature::Cryptographic(_) => ECDSA_TAG,
            EntrySignature::Weak(_) => WEAK_TAG,
        }
    }

    pub fn is_cryptographic(&self) -> bool {
        matches!(self, EntrySignature::Cryptographic(_))
    }
}

impl fmt::Display for EntrySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntrySignature::Cryptographic(signature) => {
                let compact = signature.serialize_compact();
                write!(
                    f,
                    "{}-{}-{}",
                    ECDSA_TAG,
                    hex::encode(&compact[..32]),
                    hex::encode(&compact[32..])
                )
            }
            EntrySignature::Weak(bytes) => write!(f, "{}-{}", WEAK_TAG, hex::encode(bytes)),
        }
    }
}

impl FromStr for EntrySignature {
    type Err = ComplianceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| {
            ComplianceError::ValidationError(format!("Invalid signature encoding: {}", reason))
        };

        let (tag, body) = s.split_once('-').ok_or_else(|| invalid("missing scheme tag"))?;
        match tag {
            ECDSA_TAG => {
                let (r, s) = body
                    .split_once('-')
                    .ok_or_else(|| invalid("expected r and s components"))?;
                let r = hex::decode(r).map_err(|_| invalid("r is not hex"))?;
                let s = hex::decode(s).map_err(|_| invalid("s is not hex"))?;
                if r.len() != 32 || s.len() != 32 {
                    return Err(invalid("r and s must be 32 bytes each"));
                }
                let mut compact = [0u8; 64];
                compact[..32].copy_from_slice(&r);
                compact[32..].copy_from_slice(&s);
                let signature = Signature::from_compact(&compact)
                    .map_err(|e| invalid(&e.to_string()))?;
                Ok(EntrySignature::Cryptographic(signature))
            }
            WEAK_TAG => {
                let bytes = hex::decode(body).map_err(|_| invalid("digest is not hex"))?;
                let bytes: [u8; WEAK_SIGNATURE_LEN] = bytes
                    .try_into()
                    .map_err(|_| invalid("weak signature has the wrong length"))?;
                Ok(EntrySignature::Weak(bytes))
            }
            other => Err(invalid(&format!("unknown scheme {}", other))),
        }
    }
}

/// What the signer can do with its keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningMode {
    /// Signs and verifies ECDSA
    Cryptographic,
    /// Public key only: verifies ECDSA, cannot sign
    VerifyOnly,
    /// No key: weak pseudo-signatures only
    Weak,
}

pub struct IntegritySigner {
    secp: Secp256k1<secp256k1::All>,
    secret_key: Option<SecretKey>,
    public_key: Option<PublicKey>,
}

impl IntegritySigner {
    pub fn new(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secp,
            secret_key: Some(secret_key),
            public_key: Some(public_key),
        }
    }

    /// Generate a fresh signing key, falling back to weak signatures if the
    /// OS random source is unavailable.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        if let Err(e) = OsRng.try_fill_bytes(&mut bytes) {
            warn!("Signing key generation failed, using weak signatures: {}", e);
            return Self::weak();
        }

        match SecretKey::from_slice(&bytes) {
            Ok(secret_key) => {
                let signer = Self::new(secret_key);
                info!(
                    "Generated ephemeral audit signing key (public key: {})",
                    signer.public_key_hex().unwrap_or_default()
                );
                signer
            }
            Err(e) => {
                warn!("Signing key generation failed, using weak signatures: {}", e);
                Self::weak()
            }
        }
    }

    /// Signer without any key. Produces `HASH-` pseudo-signatures only.
    pub fn weak() -> Self {
        Self {
            secp: Secp256k1::new(),
            secret_key: None,
            public_key: None,
        }
    }

    /// Verify-only signer for checking entries signed elsewhere.
    pub fn verifier(public_key: PublicKey) -> Self {
        Self {
            secp: Secp256k1::new(),
            secret_key: None,
            public_key: Some(public_key),
        }
    }

    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, ComplianceError> {
        let bytes = hex::decode(secret_hex.trim())
            .map_err(|e| ComplianceError::ConfigError(format!("Invalid signing key hex: {}", e)))?;
        let secret_key = SecretKey::from_slice(&bytes)
            .map_err(|e| ComplianceError::ConfigError(format!("Invalid signing key: {}", e)))?;
        Ok(Self::new(secret_key))
    }

    pub fn from_key_file(path: &Path) -> Result<Self, ComplianceError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ComplianceError::ConfigError(format!("Failed to read signing key {:?}: {}", path, e))
        })?;
        Self::from_secret_hex(&contents)
    }

    pub fn mode(&self) -> SigningMode {
        match (&self.secret_key, &self.public_key) {
            (Some(_), _) => SigningMode::Cryptographic,
            (None, Some(_)) => SigningMode::VerifyOnly,
            (None, None) => SigningMode::Weak,
        }
    }

    pub fn public_key(&self) -> Option<PublicKey> {
        self.public_key
    }

    pub fn public_key_hex(&self) -> Option<String> {
        self.public_key.map(|key| key.to_string())
    }

    fn signing_digest(entry_hash: &str, timestamp: &DateTime<Utc>) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(entry_hash.as_bytes());
        hasher.update(b"|");
        hasher.update(canonical_timestamp(timestamp).as_bytes());
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&hasher.finalize());
        digest
    }

    fn weak_signature(digest: &[u8; 32]) -> EntrySignature {
        let mut bytes = [0u8; WEAK_SIGNATURE_LEN];
        bytes.copy_from_slice(&digest[..WEAK_SIGNATURE_LEN]);
        EntrySignature::Weak(bytes)
    }

    /// Sign an entry hash. Never fails: without a usable key the result is a
    /// weak signature.
    pub fn sign(&self, entry_hash: &str, timestamp: &DateTime<Utc>) -> EntrySignature {
        let digest = Self::signing_digest(entry_hash, timestamp);

        let Some(secret_key) = &self.secret_key else {
            return Self::weak_signature(&digest);
        };

        match Message::from_digest_slice(&digest) {
            Ok(message) => EntrySignature::Cryptographic(self.secp.sign_ecdsa(&message, secret_key)),
            Err(e) => {
                warn!("ECDSA signing failed, falling back to weak signature: {}", e);
                Self::weak_signature(&digest)
            }
        }
    }

    pub fn verify(
        &self,
        signature: &EntrySignature,
        entry_hash: &str,
        timestamp: &DateTime<Utc>,
    ) -> bool {
        let digest = Self::signing_digest(entry_hash, timestamp);

        match signature {
            EntrySignature::Cryptographic(signature) => {
                let Some(public_key) = &self.public_key else {
                    return false;
                };
                match Message::from_digest_slice(&digest) {
                    Ok(message) => self
                        .secp
                        .verify_ecdsa(&message, signature, public_key)
                        .is_ok(),
                    Err(_) => false,
                }
            }
            // a keyed signer never produces weak signatures
            EntrySignature::Weak(bytes) => {
                self.public_key.is_none() && digest[..WEAK_SIGNATURE_LEN] == bytes[..]
            }
        }
    }

    /// Verify a signature in its stored text form. Malformed or unknown
    /// encodings verify as false.
    pub fn verify_encoded(&self, encoded: &str, entry_hash: &str, timestamp: &DateTime<Utc>) -> bool {
        match encoded.parse::<EntrySignature>() {
            Ok(signature) => self.verify(&signature, entry_hash, timestamp),
            Err(_) => false,
        }
    }
}

impl Default for IntegritySigner {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Debug for IntegritySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntegritySigner")
            .field("mode", &self.mode())
            .field("public_key", &self.public_key_hex())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

    fn flip_char(s: &str, index: usize) -> String {
        let mut chars: Vec<char> = s.chars().collect();
        chars[index] = if chars[index] == '0' { '1' } else { '0' };
        chars.into_iter().collect()
    }

    #[test]
    fn test_ecdsa_sign_and_verify() {
        let signer = IntegritySigner::generate();
        assert_eq!(signer.mode(), SigningMode::Cryptographic);

        let now = Utc::now();
        let signature = signer.sign(HASH, &now);
        assert!(signature.is_cryptographic());
        assert!(signer.verify(&signature, HASH, &now));
    }

    #[test]
    fn test_ecdsa_rejects_altered_inputs() {
        let signer = IntegritySigner::generate();
        let now = Utc::now();
        let signature = signer.sign(HASH, &now);

        assert!(!signer.verify(&signature, &flip_char(HASH, 0), &now));
        assert!(!signer.verify(&signature, &flip_char(HASH, 63), &now));
        assert!(!signer.verify(&signature, HASH, &(now + chrono::Duration::nanoseconds(1))));
    }

    #[test]
    fn test_weak_signature_fallback() {
        let signer = IntegritySigner::weak();
        assert_eq!(signer.mode(), SigningMode::Weak);

        let now = Utc::now();
        let signature = signer.sign(HASH, &now);
        assert!(!signature.is_cryptographic());
        assert!(signature.to_string().starts_with("HASH-"));
        assert_eq!(signature.to_string().len(), 5 + 32);
        assert!(signer.verify(&signature, HASH, &now));
        assert!(!signer.verify(&signature, &flip_char(HASH, 10), &now));
    }

    #[test]
    fn test_encoding_round_trip() {
        let signer = IntegritySigner::generate();
        let now = Utc::now();
        let signature = signer.sign(HASH, &now);
        let encoded = signature.to_string();

        assert!(encoded.starts_with("ECDSA-"));
        assert_eq!(encoded.split('-').count(), 3);
        assert_eq!(encoded.parse::<EntrySignature>().unwrap(), signature);
        assert!(signer.verify_encoded(&encoded, HASH, &now));
    }

    #[test]
    fn test_malformed_signatures_verify_false() {
        let signer = IntegritySigner::generate();
        let now = Utc::now();

        for encoded in [
            "",
            "ECDSA",
            "ECDSA-zz-11",
            "ECDSA-00-00",
            "HASH-1234",
            "RSA-abcdef",
            "garbage",
        ] {
            assert!(
                !signer.verify_encoded(encoded, HASH, &now),
                "{} should not verify",
                encoded
            );
        }
    }

    #[test]
    fn test_signature_from_other_key_fails() {
        let signer = IntegritySigner::generate();
        let other = IntegritySigner::generate();
        let now = Utc::now();

        let signature = other.sign(HASH, &now);
        assert!(!signer.verify(&signature, HASH, &now));
    }

    #[test]
    fn test_verifier_checks_without_secret() {
        let signer = IntegritySigner::generate();
        let verifier = IntegritySigner::verifier(signer.public_key().unwrap());
        let now = Utc::now();

        let signature = signer.sign(HASH, &now);
        assert!(verifier.verify(&signature, HASH, &now));
        assert_eq!(verifier.mode(), SigningMode::VerifyOnly);
    }

    #[test]
    fn test_keyed_signer_rejects_weak_signatures() {
        let signer = IntegritySigner::generate();
        let verifier = IntegritySigner::verifier(signer.public_key().unwrap());
        let now = Utc::now();

        let weak = IntegritySigner::weak().sign(HASH, &now);
        assert!(IntegritySigner::weak().verify(&weak, HASH, &now));
        assert!(!signer.verify(&weak, HASH, &now));
        assert!(!verifier.verify(&weak, HASH, &now));
        assert!(!signer.verify_encoded(&weak.to_string(), HASH, &now));
    }

    #[test]
    fn test_weak_signer_cannot_verify_ecdsa() {
        let signer = IntegritySigner::generate();
        let now = Utc::now();
        let signature = signer.sign(HASH, &now);

        assert!(!IntegritySigner::weak().verify(&signature, HASH, &now));
    }

    #[test]
    fn test_from_secret_hex() {
        let signer = IntegritySigner::generate();
        let now = Utc::now();
        let secret = "0101010101010101010101010101010101010101010101010101010101010101";

        let a = IntegritySigner::from_secret_hex(secret).unwrap();
        let b = IntegritySigner::from_secret_hex(&format!("{}\n", secret)).unwrap();
        assert_eq!(a.public_key(), b.public_key());
        assert_ne!(a.public_key(), signer.public_key());

        let signature = a.sign(HASH, &now);
        assert!(b.verify(&signature, HASH, &now));

        assert!(IntegritySigner::from_secret_hex("not-hex").is_err());
        assert!(IntegritySigner::from_secret_hex("00").is_err());
    }
}
