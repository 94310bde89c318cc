//! Realtime Chat Client - Entry Point
//!
//! Starts the ChatClient actor, joins the chat and bridges the terminal:
//! stdin lines become messages, snapshots are printed to stdout.

use std::env;

use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chat_client_v1::{
    ChatClient, ChatHandle, ChatSnapshot, ClientConfig, ClientError, ConnectionState, Identity,
    Message, Notification,
};

const USAGE: &str = "usage: chat_client_v1 <username> <user_id> [server_url]";

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_client_v1=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chat_client_v1=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let (Some(username), Some(user_id)) = (args.next(), args.next()) else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };
    let user_id: i64 = user_id
        .parse()
        .map_err(|_| ClientError::Config(format!("user id is not a number: {}", user_id)))?;

    // Server URL from command line overrides the environment
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = args.next() {
        config = config.with_server_url(url);
    }

    // Create ChatClient actor channel and start
    let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);
    let client = ChatClient::new(cmd_rx, &config);
    let updates = client.subscribe();
    let client_task = tokio::spawn(client.run());
    tokio::spawn(render(updates));

    let chat = ChatHandle::new(cmd_tx);
    let identity = Identity::new(username, user_id);

    info!("Connecting to {} as '{}'", config.server_url, identity.username);
    if let Err(e) = chat.join(identity.clone()).await {
        error!("Cannot join: {}", e);
        return Err(e);
    }

    // Input loop
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => {}
            "/quit" => break,
            "/join" => chat.join(identity.clone()).await?,
            "/typing" => chat.set_typing(true).await?,
            _ => {
                if let Err(e) = chat.send_message(line.clone()).await {
                    eprintln!("!! {}", e.notice());
                }
            }
        }
    }

    chat.leave().await?;
    drop(chat);
    if let Err(e) = client_task.await {
        error!("Client task failed: {}", e);
    }

    Ok(())
}

/// Print state changes, new messages and notifications as they arrive
async fn render(mut updates: watch::Receiver<ChatSnapshot>) {
    let mut state = ConnectionState::Disconnected;
    let mut generation = 0;
    let mut printed = 0;
    let mut notice: Option<Notification> = None;

    while updates.changed().await.is_ok() {
        let snapshot = updates.borrow_and_update().clone();

        if snapshot.state != state {
            state = snapshot.state;
            println!("-- {}", state);
        }

        // History was replaced: print it from the top
        if snapshot.history_generation != generation {
            generation = snapshot.history_generation;
            printed = 0;
        }
        for message in snapshot.messages.iter().skip(printed) {
            println!("{}", format_message(message));
        }
        printed = snapshot.messages.len();

        if let Some(line) = notification_line(&mut notice, snapshot.notification.as_ref()) {
            println!("{}", line);
        }
    }
}

/// Line to print if `current` differs from the last notification seen
///
/// A repeat of the same text is a new notification with its own deadline,
/// so it is printed again.
fn notification_line(
    last: &mut Option<Notification>,
    current: Option<&Notification>,
) -> Option<String> {
    if last.as_ref() == current {
        return None;
    }
    *last = current.cloned();
    current.map(|n| {
        let marker = if n.is_error { "!!" } else { "--" };
        format!("{} {}", marker, n.text)
    })
}

fn format_message(message: &Message) -> String {
    if message.is_system {
        return format!("* {}", message.content);
    }
    format!(
        "[{}] {}: {}",
        message.timestamp.with_timezone(&Local).format("%H:%M:%S"),
        message.author.username,
        message.content
    )
}
