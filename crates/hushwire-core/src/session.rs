//! Handshake and messaging state machine.
//!
//! A pure state machine: it consumes [`SessionEvent`] inputs and produces
//! [`SessionAction`] instructions for the runtime to execute, never touching
//! a socket or the terminal itself. Each transition is a function of
//! (current state, event); events that are not valid for the current state
//! are protocol errors, and the machine makes no attempt to resynchronize.
//!
//! Two roles share the machine. The initiator emits `req-chat` and walks
//! `Offered → Accepted → KeyExchanging → Ready`; the responder is offered a
//! chat, emits its acceptance token, and mirrors the same walk from the
//! other side. Both ends persist the derived secret the moment the peer's
//! key token verifies, and persist session metadata on `priv-chat-ready`.
//!
//! Failure semantics: any store, crypto, token, or protocol error aborts the
//! session. Peer rejection is the one expected termination and is surfaced
//! as an action, not an error.

use hushwire_crypto::{
    Envelope, EphemeralKeypair, Identity, SessionSecret, decode_peer_key, open, seal,
    token::{self, KeyClaims, MsgClaims},
};
use hushwire_proto::ChannelEvent;
use serde::{Deserialize, Serialize};

use crate::{
    error::{CoreError, ProtocolError},
    friends::FriendList,
    store::{Store, StoreError, keys},
};

/// Store keys cleared together by the logout sequence.
pub const LOGOUT_KEYS: [&str; 3] = [keys::AUTH_TOKEN, keys::SESSION_META, keys::SESSION_SECRET];

/// Which side of the handshake this process plays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// We send the chat request.
    Initiator {
        /// Friend name we are targeting.
        peer: String,
    },
    /// We listen for incoming chat requests.
    Responder,
}

/// Lifecycle of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing in flight.
    Idle,
    /// A chat request is outstanding (sent, or presented to the user).
    Offered,
    /// The offer was accepted; waiting for the peer's key material.
    Accepted,
    /// The peer declined our request.
    Rejected,
    /// Secret derived and persisted; waiting for the ready signal.
    KeyExchanging,
    /// Session metadata persisted; messaging may begin.
    Ready,
    /// At least one message has flowed.
    Messaging,
    /// Session torn down.
    Closed,
}

/// Metadata of the active session, persisted for the interactive phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMeta {
    /// Relay-assigned room.
    pub room: String,
    /// Initiator's name.
    pub sender: String,
    /// Responder's name.
    pub receiver: String,
}

/// Inputs to the machine.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// An event arrived on the relay channel.
    Channel(ChannelEvent),
    /// The local user accepted the offered chat.
    Accept,
    /// The local user declined the offered chat.
    Decline,
    /// The local user typed a line to send.
    Line(String),
    /// End of input or interrupt; begin teardown.
    Hangup,
}

/// Instructions for the runtime, executed in order.
#[derive(Debug, Clone)]
pub enum SessionAction {
    /// Send an event to the relay.
    Emit(ChannelEvent),
    /// Show a status line to the user.
    Notify(String),
    /// Ask the user to accept or decline an offered chat.
    PromptAccept {
        /// Name of the requesting friend.
        from: String,
    },
    /// Show a decrypted message attributed to its verified sender.
    Deliver {
        /// Verified sender name.
        from: String,
        /// Decrypted plaintext.
        text: String,
    },
    /// The session ended on an expected path; run logout and exit.
    End {
        /// Why the session ended.
        reason: EndReason,
    },
}

/// Expected (non-error) session terminations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// The peer declined our chat request. Exits zero.
    PeerRejected {
        /// Name of the peer that declined.
        peer: String,
    },
    /// Local end of input or interrupt.
    LocalHangup,
}

/// An offer held while the local user decides.
#[derive(Debug, Clone)]
struct PendingOffer {
    sender: String,
    room: String,
}

/// The session state machine.
///
/// Owns the session context: the store handle, the long-term identity, and
/// the per-session ephemeral keypair (generated at construction, never
/// persisted). Not shared across threads.
pub struct SessionMachine<S: Store> {
    role: Role,
    username: String,
    state: SessionState,
    store: S,
    identity: Identity,
    ephemeral: EphemeralKeypair,
    pending_offer: Option<PendingOffer>,
    meta: Option<SessionMeta>,
}

impl<S: Store> SessionMachine<S> {
    /// Create a machine in `Idle` with a fresh ephemeral keypair.
    pub fn new(role: Role, username: String, store: S, identity: Identity) -> Self {
        Self {
            role,
            username,
            state: SessionState::Idle,
            store,
            identity,
            ephemeral: EphemeralKeypair::generate(),
            pending_offer: None,
            meta: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Kick off the handshake. Initiator-only, from `Idle`.
    pub fn start(&mut self) -> Result<Vec<SessionAction>, CoreError> {
        let Role::Initiator { peer } = &self.role else {
            return Err(self.unexpected("start"));
        };
        if self.state != SessionState::Idle {
            return Err(self.unexpected("start"));
        }

        let peer = peer.clone();
        self.state = SessionState::Offered;
        tracing::debug!(%peer, "chat request sent");

        Ok(vec![
            SessionAction::Emit(ChannelEvent::ReqChat {
                sender: self.username.clone(),
                receiver: peer.clone(),
            }),
            SessionAction::Notify(format!(
                "a private chat request sent to {peer}, waiting for a response.."
            )),
        ])
    }

    /// Process one event and return the actions it produced.
    pub fn handle(&mut self, event: SessionEvent) -> Result<Vec<SessionAction>, CoreError> {
        match event {
            SessionEvent::Channel(ev) => self.handle_channel(ev),
            SessionEvent::Accept => self.handle_accept(),
            SessionEvent::Decline => self.handle_decline(),
            SessionEvent::Line(text) => self.handle_line(text),
            SessionEvent::Hangup => {
                self.state = SessionState::Closed;
                Ok(vec![SessionAction::End { reason: EndReason::LocalHangup }])
            },
        }
    }

    fn handle_channel(&mut self, event: ChannelEvent) -> Result<Vec<SessionAction>, CoreError> {
        match (self.state, event) {
            // Initiator: the peer declined.
            (SessionState::Offered, ChannelEvent::ReqChatReject { receiver, .. })
                if self.is_initiator() =>
            {
                self.state = SessionState::Rejected;
                Ok(vec![
                    SessionAction::Notify(format!("{receiver} rejected the offer")),
                    SessionAction::End { reason: EndReason::PeerRejected { peer: receiver } },
                ])
            },

            // Initiator: the peer accepted with its key token.
            (
                SessionState::Offered,
                ChannelEvent::PrivChatAccepted { sender, receiver, room, token },
            ) if self.is_initiator() => self.on_peer_accepted(sender, receiver, room, &token),

            // Responder: an incoming chat request to present to the user.
            (SessionState::Idle, ChannelEvent::ReqPrivChat { sender, room })
                if self.is_responder() =>
            {
                self.pending_offer = Some(PendingOffer { sender: sender.clone(), room });
                self.state = SessionState::Offered;
                Ok(vec![SessionAction::PromptAccept { from: sender }])
            },

            // Responder: the initiator's key token.
            (
                SessionState::Accepted,
                ChannelEvent::PrivChatSenderPubkey { sender, receiver, room, token },
            ) if self.is_responder() => self.on_sender_key(sender, receiver, room, &token),

            // Both: the relay signals the session is live.
            (SessionState::KeyExchanging, ChannelEvent::PrivChatReady { sender, receiver, room }) => {
                self.on_ready(SessionMeta { room, sender, receiver })
            },

            // Inbound messages, gated by role and direction.
            (
                SessionState::Ready | SessionState::Messaging,
                ChannelEvent::PrivMsgRes { sender, token, .. },
            ) if self.is_initiator() => self.on_message(&sender, &token),
            (
                SessionState::Ready | SessionState::Messaging,
                ChannelEvent::PrivMsg { sender, token, .. },
            ) if self.is_responder() => self.on_message(&sender, &token),

            (state, event) => Err(ProtocolError::UnexpectedEvent {
                state,
                event: event.name().to_string(),
            }
            .into()),
        }
    }

    /// Initiator: verify the acceptance token, derive and persist the
    /// secret, then answer with our own signed key token.
    fn on_peer_accepted(
        &mut self,
        sender: String,
        receiver: String,
        room: String,
        peer_token: &str,
    ) -> Result<Vec<SessionAction>, CoreError> {
        let peer_pem = self.friend_key(&receiver)?;
        let claims: KeyClaims = token::verify_claims(peer_token, &peer_pem)?;
        self.state = SessionState::Accepted;

        let peer_pub = decode_peer_key(&claims.dh)?;
        let secret = self.ephemeral.derive_secret(&peer_pub);
        self.store.put(keys::SESSION_SECRET, secret.as_bytes())?;
        tracing::debug!(peer = %receiver, "shared secret derived");

        let own_token = token::sign_claims(
            &KeyClaims { dh: self.ephemeral.public_key_base64() },
            &self.identity,
        )?;
        self.state = SessionState::KeyExchanging;

        Ok(vec![SessionAction::Emit(ChannelEvent::PrivChatSenderKey {
            sender,
            receiver,
            room,
            token: own_token,
        })])
    }

    /// Responder: the user accepted; emit our signed key token.
    fn handle_accept(&mut self) -> Result<Vec<SessionAction>, CoreError> {
        if !(self.is_responder() && self.state == SessionState::Offered) {
            return Err(self.unexpected("accept"));
        }
        let Some(offer) = self.pending_offer.take() else {
            return Err(self.unexpected("accept"));
        };

        let own_token = token::sign_claims(
            &KeyClaims { dh: self.ephemeral.public_key_base64() },
            &self.identity,
        )?;
        self.state = SessionState::Accepted;

        Ok(vec![SessionAction::Emit(ChannelEvent::ReqPrivChatAccept {
            sender: offer.sender,
            receiver: self.username.clone(),
            room: offer.room,
            token: own_token,
        })])
    }

    /// Responder: the user declined; reject and keep listening.
    fn handle_decline(&mut self) -> Result<Vec<SessionAction>, CoreError> {
        if !(self.is_responder() && self.state == SessionState::Offered) {
            return Err(self.unexpected("decline"));
        }
        let Some(offer) = self.pending_offer.take() else {
            return Err(self.unexpected("decline"));
        };

        self.state = SessionState::Idle;

        Ok(vec![
            SessionAction::Emit(ChannelEvent::ReqPrivChatReject {
                sender: offer.sender.clone(),
                receiver: self.username.clone(),
                room: offer.room,
            }),
            SessionAction::Notify(format!("a reject response sent to {}", offer.sender)),
        ])
    }

    /// Responder: verify the initiator's key token, derive and persist the
    /// secret, and confirm the exchange.
    fn on_sender_key(
        &mut self,
        sender: String,
        receiver: String,
        room: String,
        peer_token: &str,
    ) -> Result<Vec<SessionAction>, CoreError> {
        let peer_pem = self.friend_key(&sender)?;
        let claims: KeyClaims = token::verify_claims(peer_token, &peer_pem)?;

        let peer_pub = decode_peer_key(&claims.dh)?;
        let secret = self.ephemeral.derive_secret(&peer_pub);
        self.store.put(keys::SESSION_SECRET, secret.as_bytes())?;
        tracing::debug!(peer = %sender, "shared secret derived");

        self.state = SessionState::KeyExchanging;

        Ok(vec![SessionAction::Emit(ChannelEvent::PrivChatKeyExchanged {
            room,
            sender,
            receiver,
        })])
    }

    /// Both roles: persist session metadata and open the interactive phase.
    fn on_ready(&mut self, meta: SessionMeta) -> Result<Vec<SessionAction>, CoreError> {
        let json = serde_json::to_vec(&meta)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.store.put(keys::SESSION_META, &json)?;

        let line = format!(
            "{} and {} are ready to have a private conversation",
            meta.sender, meta.receiver
        );
        self.meta = Some(meta);
        self.state = SessionState::Ready;

        Ok(vec![SessionAction::Notify(line)])
    }

    /// Verify an inbound message token and decrypt its envelope.
    fn on_message(&mut self, sender: &str, msg_token: &str) -> Result<Vec<SessionAction>, CoreError> {
        let peer_pem = self.friend_key(sender)?;
        let claims: MsgClaims = token::verify_claims(msg_token, &peer_pem)?;

        let envelope = Envelope::from_wire(&claims.msg)?;
        let secret = self.load_secret()?;
        let text = open(&secret, &self.identity, &envelope)?;

        self.state = SessionState::Messaging;
        Ok(vec![SessionAction::Deliver { from: sender.to_string(), text }])
    }

    /// Encrypt and sign a local line for the peer.
    fn handle_line(&mut self, text: String) -> Result<Vec<SessionAction>, CoreError> {
        if !matches!(self.state, SessionState::Ready | SessionState::Messaging) {
            return Err(self.unexpected("line"));
        }
        let Some(meta) = self.meta.clone() else {
            return Err(self.unexpected("line"));
        };

        let peer = self.peer_name(&meta).to_string();
        let peer_pem = self.friend_key(&peer)?;
        let secret = self.load_secret()?;

        let envelope = seal(&secret, &peer_pem, &text)?;
        let msg_token =
            token::sign_claims(&MsgClaims { msg: envelope.to_wire() }, &self.identity)?;

        self.state = SessionState::Messaging;

        let event = if self.is_initiator() {
            ChannelEvent::PrivMsg {
                room: meta.room,
                sender: self.username.clone(),
                token: msg_token,
            }
        } else {
            ChannelEvent::PrivMsgRes {
                room: meta.room,
                sender: self.username.clone(),
                token: msg_token,
            }
        };

        Ok(vec![SessionAction::Emit(event)])
    }

    fn is_initiator(&self) -> bool {
        matches!(self.role, Role::Initiator { .. })
    }

    fn is_responder(&self) -> bool {
        matches!(self.role, Role::Responder)
    }

    /// The other party's name, from persisted session metadata.
    fn peer_name<'m>(&self, meta: &'m SessionMeta) -> &'m str {
        match self.role {
            Role::Initiator { .. } => &meta.receiver,
            Role::Responder => &meta.sender,
        }
    }

    /// The peer's long-term public key from the friend list. First match
    /// wins on duplicate names.
    fn friend_key(&self, name: &str) -> Result<String, CoreError> {
        let list = FriendList::load(&self.store)?;
        list.lookup(name)
            .map(str::to_string)
            .ok_or_else(|| CoreError::UnknownFriend { name: name.to_string() })
    }

    fn load_secret(&self) -> Result<SessionSecret, CoreError> {
        let bytes = self.store.get(keys::SESSION_SECRET)?;
        Ok(SessionSecret::from_bytes(&bytes)?)
    }

    fn unexpected(&self, event: &str) -> CoreError {
        ProtocolError::UnexpectedEvent { state: self.state, event: event.to_string() }.into()
    }
}

/// Clear the auth token and session state in one atomic batch.
///
/// Part of the logout sequence; callers log failures but do not re-fail the
/// process over them.
pub fn clear_session<S: Store>(store: &S) -> Result<(), StoreError> {
    store.delete_batch(&LOGOUT_KEYS)
}
