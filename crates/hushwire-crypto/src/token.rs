//! Compact signed claim tokens.
//!
//! A token is `base64url(body) "." base64url(signature)` where the body is
//! the JSON `{claims, iat, exp}` and the signature is the sender's long-term
//! RSA signature over those exact body bytes. Tokens authenticate every
//! handshake step and chat message to its claimed sender independently of
//! the channel connection, and expire one hour after issue.
//!
//! Verification checks the signature first, then the expiry, and only then
//! surfaces the claims.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{Identity, error::TokenError};

/// Token lifetime: one hour from issue.
pub const TOKEN_TTL_SECS: u64 = 60 * 60;

/// Claims carrying an ephemeral DH public key during the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyClaims {
    /// Base64 SEC1 encoding of the sender's ephemeral public key.
    pub dh: String,
}

/// Claims carrying an encrypted message envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgClaims {
    /// Wire form of the message envelope.
    pub msg: String,
}

#[derive(Serialize, Deserialize)]
struct TokenBody<C> {
    claims: C,
    iat: u64,
    exp: u64,
}

/// Sign a claim set, stamping issued-at now and expiry one hour out.
pub fn sign_claims<C: Serialize>(claims: &C, identity: &Identity) -> Result<String, TokenError> {
    sign_claims_at(claims, identity, unix_now())
}

/// Sign a claim set with an explicit issue time.
pub fn sign_claims_at<C: Serialize>(
    claims: &C,
    identity: &Identity,
    iat: u64,
) -> Result<String, TokenError> {
    let body = TokenBody { claims, iat, exp: iat + TOKEN_TTL_SECS };
    let body_bytes =
        serde_json::to_vec(&body).map_err(|e| TokenError::Malformed(e.to_string()))?;
    let signature = identity.sign(&body_bytes);

    Ok(format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(&body_bytes),
        URL_SAFE_NO_PAD.encode(&signature)
    ))
}

/// Verify a token against the claimed signer's public key PEM.
pub fn verify_claims<C: DeserializeOwned>(
    token: &str,
    signer_pub_pem: &str,
) -> Result<C, TokenError> {
    verify_claims_at(token, signer_pub_pem, unix_now())
}

/// Verify a token with an explicit current time.
pub fn verify_claims_at<C: DeserializeOwned>(
    token: &str,
    signer_pub_pem: &str,
    now: u64,
) -> Result<C, TokenError> {
    let (body_part, sig_part) = token
        .split_once('.')
        .ok_or_else(|| TokenError::Malformed("missing signature separator".into()))?;

    let body_bytes = URL_SAFE_NO_PAD
        .decode(body_part)
        .map_err(|e| TokenError::Malformed(e.to_string()))?;
    let signature = URL_SAFE_NO_PAD
        .decode(sig_part)
        .map_err(|e| TokenError::Malformed(e.to_string()))?;

    Identity::verify_pem(signer_pub_pem, &body_bytes, &signature)
        .map_err(|_| TokenError::InvalidSignature)?;

    let body: TokenBody<C> =
        serde_json::from_slice(&body_bytes).map_err(|e| TokenError::Malformed(e.to_string()))?;

    if now >= body.exp {
        return Err(TokenError::Expired);
    }

    Ok(body.claims)
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use std::sync::OnceLock;

    use super::*;

    fn signer() -> &'static Identity {
        static ID: OnceLock<Identity> = OnceLock::new();
        ID.get_or_init(|| Identity::generate().unwrap())
    }

    fn stranger() -> &'static Identity {
        static ID: OnceLock<Identity> = OnceLock::new();
        ID.get_or_init(|| Identity::generate().unwrap())
    }

    #[test]
    fn sign_verify_roundtrip() {
        let claims = KeyClaims { dh: "AAAA".into() };
        let token = sign_claims(&claims, signer()).unwrap();

        let verified: KeyClaims =
            verify_claims(&token, &signer().public_key_pem().unwrap()).unwrap();
        assert_eq!(verified, claims);
    }

    #[test]
    fn expired_token_is_rejected_despite_valid_signature() {
        let claims = MsgClaims { msg: "payload".into() };
        let token = sign_claims_at(&claims, signer(), 1_000).unwrap();

        let pem = signer().public_key_pem().unwrap();
        // Just before expiry: fine. At expiry: rejected.
        assert!(verify_claims_at::<MsgClaims>(&token, &pem, 1_000 + TOKEN_TTL_SECS - 1).is_ok());
        assert_eq!(
            verify_claims_at::<MsgClaims>(&token, &pem, 1_000 + TOKEN_TTL_SECS),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn wrong_signer_key_is_invalid_signature() {
        let token = sign_claims(&KeyClaims { dh: "AAAA".into() }, signer()).unwrap();
        assert_eq!(
            verify_claims_at::<KeyClaims>(&token, &stranger().public_key_pem().unwrap(), 0),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn tampered_body_is_invalid_signature() {
        let token = sign_claims(&MsgClaims { msg: "original".into() }, signer()).unwrap();
        let (_, sig) = token.split_once('.').unwrap();

        let forged_body = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&TokenBody {
                claims: MsgClaims { msg: "forged".into() },
                iat: 0,
                exp: u64::MAX,
            })
            .unwrap(),
        );
        let forged = format!("{forged_body}.{sig}");

        assert_eq!(
            verify_claims_at::<MsgClaims>(&forged, &signer().public_key_pem().unwrap(), 0),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn garbage_tokens_are_malformed() {
        let pem = signer().public_key_pem().unwrap();
        assert!(matches!(
            verify_claims_at::<KeyClaims>("no-separator", &pem, 0),
            Err(TokenError::Malformed(_))
        ));
        assert!(matches!(
            verify_claims_at::<KeyClaims>("!!!.???", &pem, 0),
            Err(TokenError::Malformed(_))
        ));
    }
}
