use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::prelude::*;

use scoutchat_client::{ChatSession, SessionEvent};

/// How long the typing notice stays visible after the last typing event.
const TYPING_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Parser)]
#[command(name = "scoutchat")]
#[command(about = "Line-oriented terminal client for the scout chat relay")]
struct Cli {
    /// Relay WebSocket URL
    #[arg(long, default_value = "ws://127.0.0.1:4000/ws")]
    url: String,

    /// Display name to chat under
    #[arg(short, long)]
    username: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so they never interleave with the chat itself.
    let default_directive = if cli.debug {
        "scoutchat_client=debug,info"
    } else {
        "scoutchat_client=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();

    let mut session = ChatSession::connect(&cli.url, TYPING_TIMEOUT)
        .await
        .with_context(|| format!("Could not reach relay at {}", cli.url))?;
    let mut events = session
        .take_events()
        .context("Event stream already taken")?;

    println!("Connected to {} as {}", cli.url, cli.username);
    println!("Type a line to send it. /typing announces you are typing, /quit leaves.");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                match line.trim() {
                    "/quit" => break,
                    "/typing" => session.notify_typing(&cli.username).await?,
                    _ => {
                        // Empty lines are a silent no-op, same as the send
                        // button doing nothing on an empty field.
                        session.submit(&cli.username, &line).await?;
                    }
                }
            }
            event = events.recv() => {
                let Some(event) = event else {
                    println!("Connection to relay lost.");
                    break;
                };
                match event {
                    SessionEvent::Message(msg) => {
                        println!("[{}] {}: {}", msg.timestamp, msg.username, msg.text);
                    }
                    SessionEvent::Typing { username } => {
                        println!("· {} is typing...", username);
                    }
                }
            }
        }
    }

    Ok(())
}
