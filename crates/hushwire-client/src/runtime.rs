//! Interactive session runtime.
//!
//! A single `tokio::select!` loop over three sources: lines from stdin,
//! events from the relay channel, and the interrupt signal. Each input
//! becomes one [`SessionEvent`] for the machine; the machine's actions are
//! executed in order before the next input is taken, so exactly one logical
//! step is ever in flight and channel events are processed in arrival
//! order.
//!
//! Any machine error tears the session down through the logout sequence and
//! surfaces non-zero; peer rejection and local hangup run the same teardown
//! but exit clean.

use std::io::Write as _;

use hushwire_core::{
    session::{
        self, EndReason, Role, SessionAction, SessionEvent, SessionMachine, SessionState,
    },
    store::{self, Store, keys},
};
use hushwire_proto::ChannelEvent;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{ClientError, channel::EventChannel, load_identity};

/// Run one chat session in the given role until it ends.
///
/// Returns `Ok` for the expected terminations (peer rejection, local
/// hangup); every error is fatal for the session and has already been
/// preceded by best-effort logout.
pub async fn run_session<S: Store>(
    role: Role,
    relay_url: &str,
    store: S,
) -> Result<(), ClientError> {
    let username = store::get_string(&store, keys::USERNAME)?;
    let token = store::get_string(&store, keys::AUTH_TOKEN)?;
    let identity = load_identity(&store)?;

    let mut channel = EventChannel::connect(relay_url).await?;
    channel.authenticate(&token).await?;

    let mut machine = SessionMachine::new(role.clone(), username.clone(), store.clone(), identity);
    let mut awaiting_accept = false;

    let startup = match role {
        Role::Initiator { .. } => machine.start().map_err(ClientError::from),
        Role::Responder => {
            println!("Your friends private chat requests will be shown up here..");
            Ok(Vec::new())
        },
    };

    let mut result = match startup {
        Ok(actions) => execute(actions, &mut channel, &mut awaiting_accept).await.map(|_| ()),
        Err(e) => Err(e),
    };

    if result.is_ok() {
        result = event_loop(&mut machine, &mut channel, &username, &mut awaiting_accept).await;
    }

    logout(&mut channel, &store).await;

    result
}

/// Drive the machine until the session ends or fails.
async fn event_loop<S: Store>(
    machine: &mut SessionMachine<S>,
    channel: &mut EventChannel,
    username: &str,
    awaiting_accept: &mut bool,
) -> Result<(), ClientError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let event = tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(text)) => {
                    if *awaiting_accept {
                        *awaiting_accept = false;
                        if is_yes(&text) { SessionEvent::Accept } else { SessionEvent::Decline }
                    } else {
                        SessionEvent::Line(text)
                    }
                },
                Ok(None) => SessionEvent::Hangup,
                Err(e) => return Err(ClientError::Io(e)),
            },

            inbound = channel.next_event() => match inbound {
                Ok(event) => SessionEvent::Channel(event),
                Err(e) => return Err(e.into()),
            },

            _ = tokio::signal::ctrl_c() => SessionEvent::Hangup,
        };

        let actions = machine.handle(event)?;
        if let Some(reason) = execute(actions, channel, awaiting_accept).await? {
            match reason {
                EndReason::PeerRejected { .. } | EndReason::LocalHangup => return Ok(()),
            }
        }

        show_prompt(machine.state(), username, *awaiting_accept)?;
    }
}

/// Execute the machine's actions in order. Returns the end reason if the
/// session finished.
async fn execute(
    actions: Vec<SessionAction>,
    channel: &mut EventChannel,
    awaiting_accept: &mut bool,
) -> Result<Option<EndReason>, ClientError> {
    let mut ended = None;

    for action in actions {
        match action {
            SessionAction::Emit(event) => channel.send(&event).await?,
            SessionAction::Notify(line) => println!("\n{line}"),
            SessionAction::PromptAccept { from } => {
                print!("\n{from} wants to have a private conversation. Do you accept? [y/n] ");
                std::io::stdout().flush()?;
                *awaiting_accept = true;
            },
            SessionAction::Deliver { from, text } => println!("\n{from}: {text}"),
            SessionAction::End { reason } => ended = Some(reason),
        }
    }

    Ok(ended)
}

/// Re-show the input prompt while a conversation is live.
fn show_prompt(state: SessionState, username: &str, awaiting_accept: bool) -> Result<(), ClientError> {
    if awaiting_accept {
        return Ok(());
    }
    if matches!(state, SessionState::Ready | SessionState::Messaging) {
        print!("{username}: ");
        std::io::stdout().flush()?;
    }
    Ok(())
}

/// Revoke the auth token and clear session state. Best-effort: failures are
/// logged but never override the session's own outcome.
async fn logout<S: Store>(channel: &mut EventChannel, store: &S) {
    match store::get_string(store, keys::AUTH_TOKEN) {
        Ok(token) => {
            if let Err(e) = channel.send(&ChannelEvent::Logout { token }).await {
                tracing::warn!(error = %e, "failed to emit logout");
            } else {
                wait_for_logout_reply(channel).await;
            }
        },
        Err(e) => tracing::debug!(error = %e, "no auth token to revoke"),
    }

    if let Err(e) = session::clear_session(store) {
        tracing::warn!(error = %e, "failed to clear session state");
    }

    channel.close().await;
}

async fn wait_for_logout_reply(channel: &mut EventChannel) {
    loop {
        match channel.next_event().await {
            Ok(ChannelEvent::LogoutSuccess { message }) => {
                println!("\n{message}");
                return;
            },
            Ok(ChannelEvent::LogoutErr { reason }) => {
                tracing::warn!(%reason, "logout refused");
                return;
            },
            Ok(other) => {
                tracing::debug!(event = other.name(), "ignoring event during logout");
            },
            Err(e) => {
                tracing::warn!(error = %e, "connection lost during logout");
                return;
            },
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::is_yes;

    #[test]
    fn accept_answers() {
        assert!(is_yes("y"));
        assert!(is_yes("Yes"));
        assert!(is_yes("  YES "));
        assert!(!is_yes("n"));
        assert!(!is_yes(""));
        assert!(!is_yes("yeah"));
    }
}
