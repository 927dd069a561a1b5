//! Hushwire wire schema.
//!
//! The relay forwards named events between two authenticated connections
//! without inspecting their contents. This crate defines those events as a
//! single tagged enum, [`ChannelEvent`], plus the JSON framing used on the
//! wire. Everything confidential inside an event (ephemeral public keys,
//! message envelopes) travels as an opaque claim-token string produced by
//! `hushwire-crypto`; the relay only ever routes on the plaintext metadata
//! fields (sender, receiver, room).

#![forbid(unsafe_code)]

mod events;

pub use events::{ChannelEvent, WireError};
