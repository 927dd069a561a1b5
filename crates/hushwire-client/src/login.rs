//! Credential bootstrap.
//!
//! Login proves password possession: the password is signed with the
//! identity private key and submitted alongside it; the relay's auth
//! service answers with the opaque token that later authenticates the chat
//! channel. The token is persisted until logout.

use std::io::{Write as _, stdin, stdout};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use hushwire_core::{
    AuthError,
    store::{Store, keys},
};
use hushwire_proto::ChannelEvent;

use crate::{ClientError, channel::EventChannel, load_identity};

/// Run the interactive login flow against the relay's auth service.
pub async fn login<S: Store>(relay_url: &str, store: &S) -> Result<(), ClientError> {
    let username = prompt_line("username: ")?;
    let password = rpassword::prompt_password("password: ")?;

    let identity = load_identity(store)?;
    let signature = STANDARD.encode(identity.sign(password.as_bytes()));

    let mut channel = EventChannel::connect(relay_url).await?;
    channel
        .send(&ChannelEvent::Login { username: username.clone(), password, signature })
        .await?;

    let result = loop {
        match channel.next_event().await {
            Ok(ChannelEvent::LoginSuccess { token }) => {
                if token.is_empty() {
                    break Err(AuthError::MissingToken.into());
                }
                store.put(keys::AUTH_TOKEN, token.as_bytes())?;
                println!("\nlogged in successfully");
                break Ok(());
            },
            Ok(ChannelEvent::LoginErr { reason }) => {
                break Err(AuthError::Unauthorized { reason }.into());
            },
            Ok(other) => {
                tracing::warn!(event = other.name(), "ignoring event during login");
            },
            Err(e) => break Err(e.into()),
        }
    };

    channel.close().await;
    result
}

fn prompt_line(prompt: &str) -> Result<String, std::io::Error> {
    print!("{prompt}");
    stdout().flush()?;

    let mut line = String::new();
    stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
