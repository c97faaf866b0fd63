//! Terminal client: joins a room, prints what happens, and turns typed
//! lines into chat or player commands (`/seek 42`, `/pause`, `/play`,
//! `/ready`, `/unready`, `/file <name> [duration]`, `/users`, `/ping`,
//! `/quit`).
//!
//! ```text
//! cowatch-cli <username> [room] [url]
//! ```
//!
//! Set `RUST_LOG=cowatch=debug` to see protocol traffic.

use std::env;

use cowatch::prelude::*;
use cowatch::{DEFAULT_ROOM, DEFAULT_URL};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

type CliClient = SessionClient<WebSocketChannel, mpsc::UnboundedSender<SessionEvent>>;

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Command {
    Chat(String),
    Seek(f64),
    Pause,
    Play,
    Ready(bool),
    File(FileInfo),
    Users,
    Ping,
    Quit,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Chat(line.to_string()));
    };
    let mut parts = rest.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("seek"), Some(pos)) => pos
            .parse()
            .map(Command::Seek)
            .map_err(|_| format!("not a position: {pos}")),
        (Some("pause"), None) => Ok(Command::Pause),
        (Some("play"), None) => Ok(Command::Play),
        (Some("ready"), None) => Ok(Command::Ready(true)),
        (Some("unready"), None) => Ok(Command::Ready(false)),
        (Some("file"), Some(name)) => {
            let duration = match parts.next() {
                Some(d) => d.parse().map_err(|_| format!("not a duration: {d}"))?,
                None => 0.0,
            };
            Ok(Command::File(FileInfo::new(name, duration)))
        }
        (Some("users"), None) => Ok(Command::Users),
        (Some("ping"), None) => Ok(Command::Ping),
        (Some("quit"), None) => Ok(Command::Quit),
        _ => Err(format!("unknown command: {line}")),
    }
}

/// Returns `false` when the user asked to quit.
async fn run_command(client: &mut CliClient, command: Command) -> Result<bool, CowatchError> {
    match command {
        Command::Chat(text) => client.send_chat(&text).await?,
        Command::Seek(position) => client.seek_to(position).await?,
        Command::Pause => client.set_paused(true).await?,
        Command::Play => client.set_paused(false).await?,
        Command::Ready(ready) => client.set_ready(ready).await?,
        Command::File(file) => client.set_file(file).await?,
        Command::Users => print_roster(client.roster()),
        Command::Ping => print_latency(client.latency()),
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::Connected(banner) => println!("* {banner}"),
        SessionEvent::Error(message) => println!("! server error: {message}"),
        SessionEvent::Joined { user, room } => println!("* {user} joined {room}"),
        SessionEvent::Left { user, room } => println!("* {user} left {room}"),
        SessionEvent::Moved { user, room } => println!("* {user} moved to {room}"),
        SessionEvent::RosterUpdated(_) => {}
        SessionEvent::Seek { position, set_by } => println!("> {set_by} seeked to {position:.1}s"),
        SessionEvent::Pause { set_by } => println!("> {set_by} paused"),
        SessionEvent::Unpause { set_by } => println!("> {set_by} unpaused"),
        SessionEvent::Chat { user, message } => println!("<{user}> {message}"),
    }
}

fn print_roster(roster: &RosterTracker) {
    for user in roster.roster().values() {
        let ready = match user.is_ready {
            Some(true) => "ready",
            Some(false) => "not ready",
            None => "?",
        };
        let file = user.file.as_ref().map_or("-", |f| f.name.as_str());
        println!("  {} [{}] {} {}", user.username, user.room, ready, file);
    }
}

fn print_latency(ping: &PingService) {
    println!(
        "  rtt {:.0} ms (avg {:.0} ms), forward delay {:.0} ms",
        ping.rtt() * 1000.0,
        ping.average_rtt() * 1000.0,
        ping.forward_delay() * 1000.0
    );
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = env::args().skip(1);
    let username = args.next().ok_or("usage: cowatch-cli <username> [room] [url]")?;
    let room = args.next().unwrap_or_else(|| DEFAULT_ROOM.to_string());
    let url = args.next().unwrap_or_else(|| DEFAULT_URL.to_string());

    let (events, mut event_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let mut client = SessionClientBuilder::new()
        .url(&url)
        .username(&username)
        .room(&room)
        .connect(events)
        .await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            frame = client.recv_frame() => match frame? {
                Some(data) => client.handle_frame(&data).await?,
                None => break,
            },
            Some(event) = event_rx.recv() => print_event(&event),
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match parse_command(line) {
                    Ok(command) => {
                        if !run_command(&mut client, command).await? {
                            break;
                        }
                    }
                    Err(message) => println!("! {message}"),
                }
            }
        }
    }

    client.disconnect().await;
    while let Ok(event) = event_rx.try_recv() {
        print_event(&event);
    }
    Ok(())
}
