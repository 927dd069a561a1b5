//! Error types for cryptographic operations.
//!
//! Every failure here is terminal for the message or token being processed;
//! callers never receive partial plaintext or partially verified claims.

use thiserror::Error;

/// Errors from key handling and message encryption/decryption.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// A key could not be parsed or generated.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// The wrapped integrity key could not be recovered with our private key.
    #[error("failed to unwrap message key")]
    KeyUnwrapFailure,

    /// The integrity tag did not match the received ciphertext.
    #[error("integrity tag not valid")]
    IntegrityFailure,

    /// The envelope wire form did not have the expected shape.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Block cipher failure (bad padding or corrupt ciphertext).
    #[error("cipher failure: {0}")]
    CipherFailure(String),
}

/// Errors from claim-token signing and verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The token's expiry time has passed.
    #[error("token expired")]
    Expired,

    /// The signature did not verify against the claimed signer's key.
    #[error("token signature not valid")]
    InvalidSignature,

    /// The token could not be parsed into body and signature.
    #[error("malformed token: {0}")]
    Malformed(String),
}
