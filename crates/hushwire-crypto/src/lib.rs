//! Hushwire cryptographic primitives.
//!
//! Building blocks for the private chat session engine, split by key
//! lifetime:
//!
//! - [`identity`]: the long-term RSA keypair that names a user. Signs claim
//!   tokens and the login password proof, and wraps per-message integrity
//!   keys addressed to this user.
//! - [`exchange`]: the per-session ephemeral secp256k1 keypair and the ECDH
//!   shared secret derived from it. The private half never leaves process
//!   memory.
//! - [`envelope`]: the hybrid per-message construction. The session secret
//!   encrypts the body (AES-256-CBC); a fresh random key authenticates it
//!   (HMAC-SHA256) and is wrapped under the recipient's long-term key.
//! - [`token`]: compact signed claim-sets with issued-at and expiry, used to
//!   authenticate every handshake step and message to its claimed sender.
//!
//! # Security
//!
//! - A shared secret is only ever derived after the peer's claim token
//!   verified against their long-term public key.
//! - Decryption compares the integrity tag in constant time and returns no
//!   plaintext on mismatch.
//! - Binding the integrity key to the recipient's long-term identity (rather
//!   than the session secret) means an attacker holding the session secret
//!   still cannot forge messages that verify, without also holding the
//!   recipient's private key.

#![forbid(unsafe_code)]

mod envelope;
mod error;
mod exchange;
mod identity;
pub mod token;

pub use envelope::{Envelope, open, seal};
pub use error::{CryptoError, TokenError};
pub use exchange::{EphemeralKeypair, SessionSecret, decode_peer_key};
pub use identity::Identity;
