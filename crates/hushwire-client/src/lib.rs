//! Hushwire client library.
//!
//! Wires the pure session core to the outside world: the WebSocket event
//! channel to the relay, the terminal, and the on-disk store. The binary in
//! `main.rs` only parses arguments and dispatches into here.

#![forbid(unsafe_code)]

pub mod channel;
pub mod login;
pub mod runtime;

use hushwire_core::{AuthError, CoreError, store::StoreError};
use hushwire_crypto::{CryptoError, Identity, TokenError};
use thiserror::Error;

use crate::channel::ChannelError;

/// Any failure surfaced by the client.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The relay channel failed.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// The session core failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Terminal or file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for ClientError {
    fn from(err: StoreError) -> Self {
        Self::Core(err.into())
    }
}

impl From<CryptoError> for ClientError {
    fn from(err: CryptoError) -> Self {
        Self::Core(err.into())
    }
}

impl From<TokenError> for ClientError {
    fn from(err: TokenError) -> Self {
        Self::Core(err.into())
    }
}

impl From<AuthError> for ClientError {
    fn from(err: AuthError) -> Self {
        Self::Core(err.into())
    }
}

/// Load the long-term identity from the store.
pub(crate) fn load_identity<S: hushwire_core::store::Store>(
    store: &S,
) -> Result<Identity, ClientError> {
    let pem = hushwire_core::store::get_string(store, hushwire_core::store::keys::PRIVATE_KEY)?;
    Ok(Identity::from_pkcs8_pem(&pem)?)
}
