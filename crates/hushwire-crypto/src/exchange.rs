//! Ephemeral secp256k1 key exchange.
//!
//! One keypair per chat session. The private half lives only in process
//! memory (the `EphemeralSecret` type offers no way to export it) and the
//! derived shared secret is zeroized on drop. Public keys travel as
//! base64-encoded uncompressed SEC1 points inside signed claim tokens.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use k256::{PublicKey, ecdh::EphemeralSecret, elliptic_curve::sec1::ToEncodedPoint};
use zeroize::Zeroize;

use crate::error::CryptoError;

/// Size of the derived shared secret in bytes.
pub const SECRET_SIZE: usize = 32;

/// A per-session ephemeral keypair on secp256k1.
pub struct EphemeralKeypair {
    secret: EphemeralSecret,
    public: PublicKey,
}

impl EphemeralKeypair {
    /// Generate a fresh keypair for one session.
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random(&mut rand::rngs::OsRng);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Own public key as a base64 SEC1 point, ready to embed in a claim token.
    pub fn public_key_base64(&self) -> String {
        STANDARD.encode(self.public.to_encoded_point(false).as_bytes())
    }

    /// Derive the shared session secret from the peer's public key.
    ///
    /// Deterministic and symmetric: both parties derive the identical value
    /// from their own private half and the peer's public half.
    pub fn derive_secret(&self, peer: &PublicKey) -> SessionSecret {
        let shared = self.secret.diffie_hellman(peer);
        let mut bytes = [0u8; SECRET_SIZE];
        bytes.copy_from_slice(shared.raw_secret_bytes());
        SessionSecret { bytes }
    }
}

impl std::fmt::Debug for EphemeralKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralKeypair").finish_non_exhaustive()
    }
}

/// Decode a peer's base64 SEC1 public key received in a claim token.
pub fn decode_peer_key(encoded: &str) -> Result<PublicKey, CryptoError> {
    let bytes =
        STANDARD.decode(encoded).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    PublicKey::from_sec1_bytes(&bytes).map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

/// The shared secret for one session.
///
/// Doubles as the AES-256 key for message bodies. Persisted in the local
/// store for the session lifetime, zeroized in memory on drop.
pub struct SessionSecret {
    bytes: [u8; SECRET_SIZE],
}

impl SessionSecret {
    /// Reconstruct a secret loaded from the store.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; SECRET_SIZE] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey(format!("secret must be {SECRET_SIZE} bytes")))?;
        Ok(Self { bytes })
    }

    /// Raw secret bytes, for persistence and cipher keying.
    pub fn as_bytes(&self) -> &[u8; SECRET_SIZE] {
        &self.bytes
    }
}

impl Drop for SessionSecret {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSecret").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_is_symmetric() {
        let alice = EphemeralKeypair::generate();
        let bob = EphemeralKeypair::generate();

        let alice_secret = alice.derive_secret(&decode_peer_key(&bob.public_key_base64()).unwrap());
        let bob_secret = bob.derive_secret(&decode_peer_key(&alice.public_key_base64()).unwrap());

        assert_eq!(alice_secret.as_bytes(), bob_secret.as_bytes());
    }

    #[test]
    fn different_peers_yield_different_secrets() {
        let alice = EphemeralKeypair::generate();
        let bob = EphemeralKeypair::generate();
        let carol = EphemeralKeypair::generate();

        let with_bob = alice.derive_secret(&decode_peer_key(&bob.public_key_base64()).unwrap());
        let with_carol = alice.derive_secret(&decode_peer_key(&carol.public_key_base64()).unwrap());

        assert_ne!(with_bob.as_bytes(), with_carol.as_bytes());
    }

    #[test]
    fn public_key_encoding_roundtrips() {
        let keypair = EphemeralKeypair::generate();
        let decoded = decode_peer_key(&keypair.public_key_base64()).unwrap();
        assert_eq!(decoded, keypair.public);
    }

    #[test]
    fn garbage_peer_key_is_rejected() {
        assert!(decode_peer_key("not base64!").is_err());
        assert!(decode_peer_key(&STANDARD.encode([0u8; 65])).is_err());
    }

    #[test]
    fn secret_from_bytes_validates_length() {
        assert!(SessionSecret::from_bytes(&[0u8; 32]).is_ok());
        assert!(SessionSecret::from_bytes(&[0u8; 16]).is_err());
    }
}
