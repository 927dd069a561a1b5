//! Named channel events and their JSON wire framing.
//!
//! Each event is serialized as `{"event": "<name>", "data": {...}}`. Event
//! names are stable wire identifiers; the enum variant names map to them via
//! kebab-case renaming, so adding a variant automatically yields its wire
//! name.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failed to encode or decode a channel event.
#[derive(Error, Debug)]
pub enum WireError {
    /// Inbound text was not a valid event frame.
    #[error("malformed event frame: {0}")]
    Decode(String),

    /// Outbound event could not be serialized.
    #[error("failed to encode event: {0}")]
    Encode(String),
}

/// A named event exchanged with the relay.
///
/// Direction notes follow the protocol contract: `req-chat` is emitted by the
/// initiator and arrives at the responder as `req-priv-chat` (the relay
/// assigns the room); `priv-chat-sender-key` is emitted by the initiator and
/// arrives at the responder as `priv-chat-sender-pubkey`. The `token` fields
/// carry signed claim tokens and are opaque to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ChannelEvent {
    /// Present the stored auth token to bind this connection to an identity.
    Authenticate {
        /// Opaque auth token from the login flow.
        token: String,
    },

    /// Connection accepted; chat events may now flow.
    Authenticated,

    /// Connection refused; fatal for the session.
    Unauthorized {
        /// Human-readable refusal reason.
        reason: String,
    },

    /// Prove password possession to the auth service.
    Login {
        /// Account name.
        username: String,
        /// Password being proven.
        password: String,
        /// Base64 signature of the password under the identity key.
        signature: String,
    },

    /// Login accepted; carries the auth token to persist.
    LoginSuccess {
        /// Token to present on subsequent connections.
        token: String,
    },

    /// Login refused.
    LoginErr {
        /// Refusal reason.
        reason: String,
    },

    /// Initiator asks the relay to open a private chat with a friend.
    ReqChat {
        /// Initiator's name.
        sender: String,
        /// Target friend's name.
        receiver: String,
    },

    /// Relay-forwarded chat request as seen by the responder.
    ReqPrivChat {
        /// Initiator's name.
        sender: String,
        /// Relay-assigned room for this session.
        room: String,
    },

    /// Responder declined; seen by the initiator.
    ReqChatReject {
        /// Initiator's name.
        sender: String,
        /// Responder's name.
        receiver: String,
    },

    /// Responder accepts, attaching a claim token with its ephemeral DH key.
    ReqPrivChatAccept {
        /// Initiator's name.
        sender: String,
        /// Responder's name.
        receiver: String,
        /// Session room.
        room: String,
        /// Claim token carrying the responder's DH public key.
        token: String,
    },

    /// Responder declines an offered chat.
    ReqPrivChatReject {
        /// Initiator's name.
        sender: String,
        /// Responder's name.
        receiver: String,
        /// Session room.
        room: String,
    },

    /// Acceptance as seen by the initiator (relay-forwarded).
    PrivChatAccepted {
        /// Initiator's name.
        sender: String,
        /// Responder's name.
        receiver: String,
        /// Session room.
        room: String,
        /// Claim token carrying the responder's DH public key.
        token: String,
    },

    /// Initiator sends its own ephemeral DH key token.
    PrivChatSenderKey {
        /// Initiator's name.
        sender: String,
        /// Responder's name.
        receiver: String,
        /// Session room.
        room: String,
        /// Claim token carrying the initiator's DH public key.
        token: String,
    },

    /// Initiator's key token as seen by the responder (relay-forwarded).
    PrivChatSenderPubkey {
        /// Initiator's name.
        sender: String,
        /// Responder's name.
        receiver: String,
        /// Session room.
        room: String,
        /// Claim token carrying the initiator's DH public key.
        token: String,
    },

    /// Responder confirms it derived the shared secret.
    PrivChatKeyExchanged {
        /// Session room.
        room: String,
        /// Initiator's name.
        sender: String,
        /// Responder's name.
        receiver: String,
    },

    /// Relay signals both ends that the session is live.
    PrivChatReady {
        /// Initiator's name.
        sender: String,
        /// Responder's name.
        receiver: String,
        /// Session room.
        room: String,
    },

    /// Encrypted message from the initiator.
    PrivMsg {
        /// Session room.
        room: String,
        /// Sending party's name.
        sender: String,
        /// Claim token carrying the message envelope.
        token: String,
    },

    /// Encrypted message from the responder.
    PrivMsgRes {
        /// Session room.
        room: String,
        /// Sending party's name.
        sender: String,
        /// Claim token carrying the message envelope.
        token: String,
    },

    /// Revoke the auth token and end the connection.
    Logout {
        /// Token being revoked.
        token: String,
    },

    /// Logout acknowledged.
    LogoutSuccess {
        /// Farewell message from the relay.
        message: String,
    },

    /// Logout failed; logged but not fatal beyond the session already ending.
    LogoutErr {
        /// Failure reason.
        reason: String,
    },
}

impl ChannelEvent {
    /// Wire name of this event, for logs and protocol errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Authenticate { .. } => "authenticate",
            Self::Authenticated => "authenticated",
            Self::Unauthorized { .. } => "unauthorized",
            Self::Login { .. } => "login",
            Self::LoginSuccess { .. } => "login-success",
            Self::LoginErr { .. } => "login-err",
            Self::ReqChat { .. } => "req-chat",
            Self::ReqPrivChat { .. } => "req-priv-chat",
            Self::ReqChatReject { .. } => "req-chat-reject",
            Self::ReqPrivChatAccept { .. } => "req-priv-chat-accept",
            Self::ReqPrivChatReject { .. } => "req-priv-chat-reject",
            Self::PrivChatAccepted { .. } => "priv-chat-accepted",
            Self::PrivChatSenderKey { .. } => "priv-chat-sender-key",
            Self::PrivChatSenderPubkey { .. } => "priv-chat-sender-pubkey",
            Self::PrivChatKeyExchanged { .. } => "priv-chat-key-exchanged",
            Self::PrivChatReady { .. } => "priv-chat-ready",
            Self::PrivMsg { .. } => "priv-msg",
            Self::PrivMsgRes { .. } => "priv-msg-res",
            Self::Logout { .. } => "logout",
            Self::LogoutSuccess { .. } => "logout-success",
            Self::LogoutErr { .. } => "logout-err",
        }
    }

    /// Encode this event as a JSON wire frame.
    pub fn to_wire(&self) -> Result<String, WireError> {
        serde_json::to_string(self).map_err(|e| WireError::Encode(e.to_string()))
    }

    /// Decode a JSON wire frame into an event.
    pub fn from_wire(text: &str) -> Result<Self, WireError> {
        serde_json::from_str(text).map_err(|e| WireError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_match_wire_tags() {
        let events = vec![
            ChannelEvent::Authenticate { token: "t".into() },
            ChannelEvent::Authenticated,
            ChannelEvent::ReqChat { sender: "a".into(), receiver: "b".into() },
            ChannelEvent::ReqPrivChat { sender: "a".into(), room: "r".into() },
            ChannelEvent::PrivChatSenderPubkey {
                sender: "a".into(),
                receiver: "b".into(),
                room: "r".into(),
                token: "tok".into(),
            },
            ChannelEvent::PrivChatKeyExchanged {
                room: "r".into(),
                sender: "a".into(),
                receiver: "b".into(),
            },
            ChannelEvent::PrivMsgRes { room: "r".into(), sender: "b".into(), token: "tok".into() },
            ChannelEvent::LogoutSuccess { message: "bye".into() },
        ];

        for event in events {
            let wire = event.to_wire().unwrap();
            let value: serde_json::Value = serde_json::from_str(&wire).unwrap();
            assert_eq!(value["event"], event.name(), "wire tag mismatch for {wire}");
        }
    }

    #[test]
    fn roundtrip_all_payload_shapes() {
        let events = vec![
            ChannelEvent::Login {
                username: "alice".into(),
                password: "pw".into(),
                signature: "c2ln".into(),
            },
            ChannelEvent::LoginSuccess { token: "tok".into() },
            ChannelEvent::Unauthorized { reason: "bad token".into() },
            ChannelEvent::PrivChatAccepted {
                sender: "alice".into(),
                receiver: "bob".into(),
                room: "room-1".into(),
                token: "jwtish".into(),
            },
            ChannelEvent::PrivMsg {
                room: "room-1".into(),
                sender: "alice".into(),
                token: "jwtish".into(),
            },
            ChannelEvent::Logout { token: "tok".into() },
        ];

        for event in events {
            let wire = event.to_wire().unwrap();
            let decoded = ChannelEvent::from_wire(&wire).unwrap();
            assert_eq!(decoded, event);
        }
    }

    #[test]
    fn unit_variant_decodes_without_data() {
        let decoded = ChannelEvent::from_wire(r#"{"event":"authenticated"}"#).unwrap();
        assert_eq!(decoded, ChannelEvent::Authenticated);
    }

    #[test]
    fn unknown_event_is_rejected() {
        assert!(ChannelEvent::from_wire(r#"{"event":"join-room","data":{}}"#).is_err());
        assert!(ChannelEvent::from_wire("not json").is_err());
    }
}
