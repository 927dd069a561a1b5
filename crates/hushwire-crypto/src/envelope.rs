//! Hybrid message envelope.
//!
//! Each chat line becomes a four-field envelope:
//!
//! ```text
//! wrapped-key # ciphertext # iv # tag      (each field base64)
//! ```
//!
//! The session secret keys an AES-256-CBC body cipher with a fresh random
//! IV. A fresh random 256-bit key authenticates the encoded ciphertext and
//! IV with HMAC-SHA256 and is itself wrapped under the recipient's long-term
//! RSA key. Decryption verifies the tag in constant time before touching the
//! body; a mismatch yields no plaintext.

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::{Identity, SessionSecret, error::CryptoError};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// AES block size; the IV is one block.
const IV_SIZE: usize = 16;

/// HMAC-SHA256 output size.
const TAG_SIZE: usize = 32;

/// Field separator in the wire form.
const FIELD_SEPARATOR: char = '#';

/// One encrypted message in transit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Integrity key wrapped under the recipient's long-term public key.
    pub wrapped_key: Vec<u8>,
    /// AES-256-CBC ciphertext of the message body.
    pub ciphertext: Vec<u8>,
    /// Random initialization vector used for this message.
    pub iv: [u8; IV_SIZE],
    /// HMAC-SHA256 tag over the encoded ciphertext and IV.
    pub tag: [u8; TAG_SIZE],
}

impl Envelope {
    /// Serialize to the `#`-joined wire form.
    pub fn to_wire(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}{sep}{}",
            STANDARD.encode(&self.wrapped_key),
            STANDARD.encode(&self.ciphertext),
            STANDARD.encode(self.iv),
            STANDARD.encode(self.tag),
            sep = FIELD_SEPARATOR,
        )
    }

    /// Parse the `#`-joined wire form.
    ///
    /// Anything other than exactly four decodable fields with the right
    /// lengths is a `MalformedEnvelope`.
    pub fn from_wire(wire: &str) -> Result<Self, CryptoError> {
        let fields: Vec<&str> = wire.split(FIELD_SEPARATOR).collect();
        let [wrapped_key, ciphertext, iv, tag] = fields.as_slice() else {
            return Err(CryptoError::MalformedEnvelope(format!(
                "expected 4 fields, got {}",
                fields.len()
            )));
        };

        let decode = |field: &str| {
            STANDARD
                .decode(field)
                .map_err(|e| CryptoError::MalformedEnvelope(e.to_string()))
        };

        let iv: [u8; IV_SIZE] = decode(iv)?
            .try_into()
            .map_err(|_| CryptoError::MalformedEnvelope("iv must be 16 bytes".into()))?;
        let tag: [u8; TAG_SIZE] = decode(tag)?
            .try_into()
            .map_err(|_| CryptoError::MalformedEnvelope("tag must be 32 bytes".into()))?;

        Ok(Self { wrapped_key: decode(wrapped_key)?, ciphertext: decode(ciphertext)?, iv, tag })
    }
}

/// Encrypt a message for the peer.
///
/// `secret` is the session's shared secret; `receiver_pub_pem` is the peer's
/// long-term public key, which must be resolvable from the friend list
/// before any message can be sent.
pub fn seal(
    secret: &SessionSecret,
    receiver_pub_pem: &str,
    plaintext: &str,
) -> Result<Envelope, CryptoError> {
    let mut hmac_key = [0u8; 32];
    let mut iv = [0u8; IV_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut hmac_key);
    rand::rngs::OsRng.fill_bytes(&mut iv);

    let ciphertext = Aes256CbcEnc::new(secret.as_bytes().into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    let tag = compute_tag(&hmac_key, &ciphertext, &iv)?;
    let wrapped_key = Identity::wrap_key(receiver_pub_pem, &hmac_key);
    hmac_key.zeroize();

    Ok(Envelope { wrapped_key: wrapped_key?, ciphertext, iv, tag })
}

/// Decrypt a received envelope.
///
/// Order matters: unwrap the integrity key, verify the tag in constant
/// time, and only then run the block cipher. Every failure is terminal for
/// this message with no partial output.
pub fn open(
    secret: &SessionSecret,
    identity: &Identity,
    envelope: &Envelope,
) -> Result<String, CryptoError> {
    let mut hmac_key = identity.unwrap_key(&envelope.wrapped_key)?;

    let verified = verify_tag(&hmac_key, &envelope.ciphertext, &envelope.iv, &envelope.tag);
    hmac_key.zeroize();
    verified?;

    let plaintext = Aes256CbcDec::new(secret.as_bytes().into(), &envelope.iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(&envelope.ciphertext)
        .map_err(|e| CryptoError::CipherFailure(e.to_string()))?;

    String::from_utf8(plaintext).map_err(|e| CryptoError::CipherFailure(e.to_string()))
}

/// Tag over the base64-encoded ciphertext and IV, matching the wire fields.
fn compute_tag(
    hmac_key: &[u8],
    ciphertext: &[u8],
    iv: &[u8; IV_SIZE],
) -> Result<[u8; TAG_SIZE], CryptoError> {
    let mut mac = HmacSha256::new_from_slice(hmac_key)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    mac.update(STANDARD.encode(ciphertext).as_bytes());
    mac.update(STANDARD.encode(iv).as_bytes());

    let mut tag = [0u8; TAG_SIZE];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    Ok(tag)
}

/// Constant-time tag comparison via the MAC itself.
fn verify_tag(
    hmac_key: &[u8],
    ciphertext: &[u8],
    iv: &[u8; IV_SIZE],
    tag: &[u8; TAG_SIZE],
) -> Result<(), CryptoError> {
    let mut mac = HmacSha256::new_from_slice(hmac_key)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    mac.update(STANDARD.encode(ciphertext).as_bytes());
    mac.update(STANDARD.encode(iv).as_bytes());
    mac.verify_slice(tag).map_err(|_| CryptoError::IntegrityFailure)
}

#[cfg(test)]
mod tests {
    use std::sync::OnceLock;

    use super::*;
    use crate::EphemeralKeypair;

    fn receiver() -> &'static Identity {
        static ID: OnceLock<Identity> = OnceLock::new();
        ID.get_or_init(|| Identity::generate().unwrap())
    }

    fn session_secret() -> SessionSecret {
        let ours = EphemeralKeypair::generate();
        let theirs = EphemeralKeypair::generate();
        let peer = crate::exchange::decode_peer_key(&theirs.public_key_base64()).unwrap();
        ours.derive_secret(&peer)
    }

    #[test]
    fn seal_open_roundtrip() {
        let secret = session_secret();
        let receiver = receiver();
        let pem = receiver.public_key_pem().unwrap();

        let envelope = seal(&secret, &pem, "hello there").unwrap();
        assert_eq!(open(&secret, receiver, &envelope).unwrap(), "hello there");
    }

    #[test]
    fn empty_message_roundtrips() {
        let secret = session_secret();
        let receiver = receiver();
        let envelope = seal(&secret, &receiver.public_key_pem().unwrap(), "").unwrap();
        assert_eq!(open(&secret, receiver, &envelope).unwrap(), "");
    }

    #[test]
    fn wire_form_roundtrips() {
        let secret = session_secret();
        let envelope = seal(&secret, &receiver().public_key_pem().unwrap(), "msg").unwrap();
        let parsed = Envelope::from_wire(&envelope.to_wire()).unwrap();
        assert_eq!(parsed, envelope);
    }

    #[test]
    fn wrong_field_count_is_malformed() {
        assert!(matches!(
            Envelope::from_wire("a#b#c"),
            Err(CryptoError::MalformedEnvelope(_))
        ));
        assert!(matches!(
            Envelope::from_wire("a#b#c#d#e"),
            Err(CryptoError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn tampered_ciphertext_fails_integrity() {
        let secret = session_secret();
        let receiver = receiver();
        let mut envelope = seal(&secret, &receiver.public_key_pem().unwrap(), "msg").unwrap();

        envelope.ciphertext[0] ^= 0x01;
        assert_eq!(open(&secret, receiver, &envelope), Err(CryptoError::IntegrityFailure));
    }

    #[test]
    fn tampered_iv_fails_integrity() {
        let secret = session_secret();
        let receiver = receiver();
        let mut envelope = seal(&secret, &receiver.public_key_pem().unwrap(), "msg").unwrap();

        envelope.iv[3] ^= 0x80;
        assert_eq!(open(&secret, receiver, &envelope), Err(CryptoError::IntegrityFailure));
    }

    #[test]
    fn tampered_tag_fails_integrity() {
        let secret = session_secret();
        let receiver = receiver();
        let mut envelope = seal(&secret, &receiver.public_key_pem().unwrap(), "msg").unwrap();

        envelope.tag[31] ^= 0xFF;
        assert_eq!(open(&secret, receiver, &envelope), Err(CryptoError::IntegrityFailure));
    }

    #[test]
    fn wrong_session_secret_fails_cipher_not_integrity() {
        // The tag binds to the recipient identity, not the session secret, so
        // a wrong secret passes the tag check and fails in the block cipher
        // (or yields garbage that is not valid UTF-8 / padding).
        let secret = session_secret();
        let other = session_secret();
        let receiver = receiver();
        let envelope = seal(&secret, &receiver.public_key_pem().unwrap(), "msg").unwrap();

        let result = open(&other, receiver, &envelope);
        assert!(result.is_err() || result.is_ok_and(|p| p != "msg"));
    }

    #[test]
    fn wrong_recipient_cannot_unwrap() {
        let secret = session_secret();
        let envelope = seal(&secret, &receiver().public_key_pem().unwrap(), "msg").unwrap();

        let stranger = Identity::generate().unwrap();
        assert_eq!(open(&secret, &stranger, &envelope), Err(CryptoError::KeyUnwrapFailure));
    }
}
