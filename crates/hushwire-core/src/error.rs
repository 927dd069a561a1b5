//! Error taxonomy for the session core.
//!
//! Every error below is unrecoverable for the current session: the caller
//! logs it, runs the logout sequence, and exits non-zero. The single
//! expected termination is [`ProtocolError::PeerRejected`], which exits
//! zero. The machine never retries a failed cryptographic or protocol step.

use thiserror::Error;

use crate::{session::SessionState, store::StoreError};

/// Violations of the event protocol.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// An event arrived that is not valid for the current state.
    #[error("unexpected event '{event}' in state {state:?}")]
    UnexpectedEvent {
        /// State the machine was in when the event arrived.
        state: SessionState,
        /// Wire name of the offending event.
        event: String,
    },

    /// The peer declined the chat request. Expected, non-fatal termination.
    #[error("{peer} rejected the offer")]
    PeerRejected {
        /// Name of the peer that declined.
        peer: String,
    },
}

/// Failures of channel authentication and login.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The relay refused our auth token or credentials.
    #[error("unauthorized: {reason}")]
    Unauthorized {
        /// Refusal reason from the relay.
        reason: String,
    },

    /// A success reply arrived without the token it was supposed to carry.
    #[error("no authorization token in reply")]
    MissingToken,
}

/// Any failure surfaced by the session core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Local store access failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Encryption, decryption, or key handling failed.
    #[error(transparent)]
    Crypto(#[from] hushwire_crypto::CryptoError),

    /// A claim token failed verification.
    #[error(transparent)]
    Token(#[from] hushwire_crypto::TokenError),

    /// The event protocol was violated.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Channel authentication failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A message names a peer that is not in the friend list.
    #[error("no public key on record for '{name}'")]
    UnknownFriend {
        /// The unresolvable name.
        name: String,
    },
}

impl CoreError {
    /// Whether this error is the expected peer-rejection termination.
    pub fn is_peer_rejection(&self) -> bool {
        matches!(self, Self::Protocol(ProtocolError::PeerRejected { .. }))
    }
}
