//! Hushwire client binary.
//!
//! # Usage
//!
//! ```bash
//! # Log in and store the auth token
//! hushwire login
//!
//! # Listen for incoming private chat requests
//! hushwire
//!
//! # List known friends
//! hushwire ls
//!
//! # Start a private chat with a friend
//! hushwire bob
//! ```

use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use hushwire_client::{ClientError, login::login, runtime::run_session};
use hushwire_core::{friends::FriendList, session::Role, store::RedbStore};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// End-to-end encrypted private chat over an event relay
#[derive(Parser, Debug)]
#[command(name = "hushwire")]
#[command(about = "End-to-end encrypted private chat client")]
#[command(version)]
struct Args {
    /// Friend to chat with, or a mode: `login`, `ls`. No argument listens
    /// for incoming requests.
    target: Option<String>,

    /// Relay WebSocket URL
    #[arg(long, default_value = "wss://localhost:3761/live")]
    relay: String,

    /// Path to the local state database
    #[arg(long, default_value = "hushwire.redb")]
    db: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\nerror: {e}");
            ExitCode::FAILURE
        },
    }
}

async fn run(args: Args) -> Result<(), ClientError> {
    let store = RedbStore::open(&args.db)?;

    match args.target.as_deref().filter(|t| !t.is_empty()) {
        Some("login") => login(&args.relay, &store).await,
        Some("ls") => list_friends(&store),
        Some(name) => {
            run_session(Role::Initiator { peer: name.to_string() }, &args.relay, store).await
        },
        None => run_session(Role::Responder, &args.relay, store).await,
    }
}

fn list_friends(store: &RedbStore) -> Result<(), ClientError> {
    let list = FriendList::load(store)?;
    let names = list.distinct_names();

    if names.is_empty() {
        println!("no friend found");
    } else {
        for name in names {
            println!("{name}");
        }
    }
    Ok(())
}
