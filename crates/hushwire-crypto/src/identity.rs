//! Long-term RSA identity keypair.
//!
//! One keypair per user covers both asymmetric roles the protocol needs:
//! PKCS#1 v1.5 SHA-256 signatures (claim tokens, login password proof) and
//! PKCS#1 v1.5 encryption (wrapping per-message integrity keys). The private
//! key is persisted as PKCS#8 PEM in the local store; the public key PEM is
//! what friends exchange out of band.

use rsa::{
    Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey,
    pkcs1v15::{Signature, SigningKey, VerifyingKey},
    pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding},
    signature::{SignatureEncoding, Signer, Verifier},
};
use sha2::Sha256;

use crate::error::CryptoError;

/// RSA modulus size for generated identities.
const KEY_BITS: usize = 2048;

/// A user's long-term signing/encryption keypair.
#[derive(Clone)]
pub struct Identity {
    private: RsaPrivateKey,
    public: RsaPublicKey,
}

impl Identity {
    /// Generate a fresh identity keypair.
    ///
    /// Provisioning happens once per user; sessions load the stored key.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut rng = rand::rngs::OsRng;
        let private = RsaPrivateKey::new(&mut rng, KEY_BITS)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let public = RsaPublicKey::from(&private);
        Ok(Self { private, public })
    }

    /// Load an identity from its PKCS#8 PEM private key.
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, CryptoError> {
        let private = RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let public = RsaPublicKey::from(&private);
        Ok(Self { private, public })
    }

    /// Export the private key as PKCS#8 PEM for the local store.
    pub fn to_pkcs8_pem(&self) -> Result<String, CryptoError> {
        let pem = self
            .private
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(pem.to_string())
    }

    /// Export the public key as SPKI PEM for distribution to friends.
    pub fn public_key_pem(&self) -> Result<String, CryptoError> {
        self.public
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    /// Sign a message with PKCS#1 v1.5 over SHA-256.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signing_key = SigningKey::<Sha256>::new(self.private.clone());
        signing_key.sign(message).to_vec()
    }

    /// Verify a signature against a signer's public key PEM.
    pub fn verify_pem(
        signer_pub_pem: &str,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), CryptoError> {
        let public = RsaPublicKey::from_public_key_pem(signer_pub_pem)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let verifying_key = VerifyingKey::<Sha256>::new(public);
        let signature = Signature::try_from(signature)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        verifying_key
            .verify(message, &signature)
            .map_err(|_| CryptoError::IntegrityFailure)
    }

    /// Wrap a symmetric key under a recipient's public key PEM.
    pub fn wrap_key(receiver_pub_pem: &str, key: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let public = RsaPublicKey::from_public_key_pem(receiver_pub_pem)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let mut rng = rand::rngs::OsRng;
        public
            .encrypt(&mut rng, Pkcs1v15Encrypt, key)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    /// Unwrap a symmetric key with our private key.
    pub fn unwrap_key(&self, wrapped: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.private.decrypt(Pkcs1v15Encrypt, wrapped).map_err(|_| CryptoError::KeyUnwrapFailure)
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose key material through Debug output.
        f.debug_struct("Identity").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::OnceLock;

    use super::*;

    fn test_identity() -> &'static Identity {
        static ID: OnceLock<Identity> = OnceLock::new();
        ID.get_or_init(|| Identity::generate().unwrap())
    }

    fn other_identity() -> &'static Identity {
        static ID: OnceLock<Identity> = OnceLock::new();
        ID.get_or_init(|| Identity::generate().unwrap())
    }

    #[test]
    fn pem_roundtrip_preserves_identity() {
        let id = test_identity();
        let pem = id.to_pkcs8_pem().unwrap();
        let restored = Identity::from_pkcs8_pem(&pem).unwrap();

        let sig = id.sign(b"hello");
        Identity::verify_pem(&restored.public_key_pem().unwrap(), b"hello", &sig).unwrap();
    }

    #[test]
    fn sign_verify_roundtrip() {
        let id = test_identity();
        let sig = id.sign(b"the password");
        Identity::verify_pem(&id.public_key_pem().unwrap(), b"the password", &sig).unwrap();
    }

    #[test]
    fn wrong_signer_key_fails() {
        let sig = test_identity().sign(b"message");
        let other_pem = other_identity().public_key_pem().unwrap();
        assert_eq!(
            Identity::verify_pem(&other_pem, b"message", &sig),
            Err(CryptoError::IntegrityFailure)
        );
    }

    #[test]
    fn tampered_message_fails() {
        let id = test_identity();
        let sig = id.sign(b"message");
        assert!(Identity::verify_pem(&id.public_key_pem().unwrap(), b"messagf", &sig).is_err());
    }

    #[test]
    fn wrap_unwrap_roundtrip() {
        let id = test_identity();
        let key = [0x42u8; 32];
        let wrapped = Identity::wrap_key(&id.public_key_pem().unwrap(), &key).unwrap();
        assert_eq!(id.unwrap_key(&wrapped).unwrap(), key);
    }

    #[test]
    fn unwrap_with_wrong_key_fails() {
        let wrapped =
            Identity::wrap_key(&test_identity().public_key_pem().unwrap(), &[7u8; 32]).unwrap();
        assert_eq!(other_identity().unwrap_key(&wrapped), Err(CryptoError::KeyUnwrapFailure));
    }
}
