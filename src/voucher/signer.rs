//! Oracle Signing
//!
//! Holds the oracle's secp256k1 key and produces recoverable signatures
//! over voucher hashes, prefixed the way EVM verifiers expect so the
//! settlement side can recover the oracle address from the signature
//! alone.

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use thiserror::Error;
use tracing::warn;

use crate::core::address::Address;
use crate::core::hash::{keccak256, Hash256};

/// Environment variable the oracle key is read from.
pub const ORACLE_KEY_ENV: &str = "ORACLE_PRIVATE_KEY";

const MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Signing-side failures.
#[derive(Debug, Error)]
pub enum SignError {
    /// The configured key is not 32 bytes of hex.
    #[error("oracle key is not 32 bytes of hex")]
    InvalidKeyEncoding,
    /// The key bytes are outside the curve order.
    #[error("oracle key is not a valid secp256k1 scalar")]
    InvalidKey,
    /// The signature bytes do not decode.
    #[error("signature is not a valid 65-byte recoverable signature")]
    InvalidSignature,
    /// The underlying ECDSA operation failed.
    #[error("ecdsa failure: {0}")]
    Ecdsa(#[from] k256::ecdsa::Error),
}

/// The oracle's signing identity.
#[derive(Clone)]
pub struct OracleSigner {
    signing_key: SigningKey,
}

impl OracleSigner {
    /// Build a signer from 32 raw key bytes.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, SignError> {
        let signing_key = SigningKey::from_slice(bytes).map_err(|_| SignError::InvalidKey)?;
        Ok(Self { signing_key })
    }

    /// Build a signer from a hex-encoded key, with or without `0x`.
    pub fn from_hex(hex_key: &str) -> Result<Self, SignError> {
        let trimmed = hex_key.strip_prefix("0x").unwrap_or(hex_key);
        let decoded = hex::decode(trimmed).map_err(|_| SignError::InvalidKeyEncoding)?;
        let bytes: [u8; 32] = decoded
            .try_into()
            .map_err(|_| SignError::InvalidKeyEncoding)?;
        Self::from_bytes(&bytes)
    }

    /// Load the key from [`ORACLE_KEY_ENV`], or generate an ephemeral key
    /// when the variable is unset. A malformed value is an error, never a
    /// silent fallback.
    pub fn from_env() -> Result<Self, SignError> {
        match std::env::var(ORACLE_KEY_ENV) {
            Ok(value) => Self::from_hex(&value),
            Err(_) => {
                warn!("{ORACLE_KEY_ENV} unset, using an ephemeral oracle key");
                Ok(Self::ephemeral())
            }
        }
    }

    /// Generate a fresh random key. Vouchers signed with it do not survive
    /// a restart, so this is for development and tests only.
    pub fn ephemeral() -> Self {
        // Rejection-sample the scalar; a miss is a ~2^-128 event
        loop {
            let bytes: [u8; 32] = rand::random();
            if let Ok(signer) = Self::from_bytes(&bytes) {
                return signer;
            }
        }
    }

    /// The oracle's address: the trailing 20 bytes of the Keccak-256 of
    /// the uncompressed public key.
    pub fn address(&self) -> Address {
        verifying_key_address(self.signing_key.verifying_key())
    }

    /// Sign a voucher hash. Returns the 65-byte r ‖ s ‖ v signature with
    /// v in {27, 28}.
    pub fn sign(&self, voucher_hash: &Hash256) -> Result<[u8; 65], SignError> {
        let digest = prefixed_digest(voucher_hash);
        let (signature, recovery_id) = self.signing_key.sign_prehash_recoverable(&digest)?;

        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&signature.to_bytes());
        out[64] = recovery_id.to_byte() + 27;
        Ok(out)
    }
}

impl std::fmt::Debug for OracleSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleSigner")
            .field("address", &self.address())
            .finish()
    }
}

/// Recover the signing address from a voucher hash and its signature.
/// This mirrors what the settlement verifier does on chain.
pub fn recover_signer(voucher_hash: &Hash256, signature: &[u8; 65]) -> Result<Address, SignError> {
    let v = signature[64];
    if v != 27 && v != 28 {
        return Err(SignError::InvalidSignature);
    }
    let recovery_id = RecoveryId::from_byte(v - 27).ok_or(SignError::InvalidSignature)?;
    let sig =
        Signature::from_slice(&signature[..64]).map_err(|_| SignError::InvalidSignature)?;

    let digest = prefixed_digest(voucher_hash);
    let verifying_key = VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id)?;
    Ok(verifying_key_address(&verifying_key))
}

/// keccak256("\x19Ethereum Signed Message:\n32" ‖ hash)
fn prefixed_digest(voucher_hash: &Hash256) -> Hash256 {
    let mut buf = Vec::with_capacity(MESSAGE_PREFIX.len() + 32);
    buf.extend_from_slice(MESSAGE_PREFIX);
    buf.extend_from_slice(voucher_hash);
    keccak256(&buf)
}

fn verifying_key_address(key: &VerifyingKey) -> Address {
    let encoded = key.to_encoded_point(false);
    // Skip the 0x04 uncompressed-point marker
    let digest = keccak256(&encoded.as_bytes()[1..]);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest[12..]);
    Address(out)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

    #[test]
    fn test_known_key_address() {
        // The address of private key 1 is a fixed point of secp256k1
        let signer = OracleSigner::from_hex(TEST_KEY).unwrap();
        assert_eq!(
            signer.address().to_string(),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn test_sign_and_recover() {
        let signer = OracleSigner::from_hex(TEST_KEY).unwrap();
        let hash = [0x42u8; 32];

        let signature = signer.sign(&hash).unwrap();
        assert!(signature[64] == 27 || signature[64] == 28);

        let recovered = recover_signer(&hash, &signature).unwrap();
        assert_eq!(recovered, signer.address());
    }

    #[test]
    fn test_recovery_fails_for_other_hash() {
        let signer = OracleSigner::from_hex(TEST_KEY).unwrap();
        let signature = signer.sign(&[0x42u8; 32]).unwrap();

        // Recovery over a different hash yields some other address
        match recover_signer(&[0x43u8; 32], &signature) {
            Ok(recovered) => assert_ne!(recovered, signer.address()),
            Err(_) => {}
        }
    }

    #[test]
    fn test_rejects_bad_recovery_byte() {
        let signer = OracleSigner::from_hex(TEST_KEY).unwrap();
        let mut signature = signer.sign(&[0x42u8; 32]).unwrap();
        signature[64] = 99;
        assert!(recover_signer(&[0x42u8; 32], &signature).is_err());
    }

    #[test]
    fn test_rejects_malformed_keys() {
        assert!(OracleSigner::from_hex("0xzz").is_err());
        assert!(OracleSigner::from_hex("0x0011").is_err());
        // The zero scalar is outside the group
        assert!(OracleSigner::from_bytes(&[0u8; 32]).is_err());
    }

    #[test]
    fn test_ephemeral_keys_differ() {
        let a = OracleSigner::ephemeral();
        let b = OracleSigner::ephemeral();
        assert_ne!(a.address(), b.address());
    }
}
