//! thread-watch - follow one conversation thread from the terminal.
//!
//! Prints the thread history, then live messages as they arrive. Each line
//! typed on stdin is sent to the thread.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use thread_sync::{
    ClientConfig, LiveUpdate, MarketClient, Message, OutgoingContent, ParticipantRole, Session,
    ThreadView, ViewStatus,
};

#[derive(Parser)]
#[command(name = "thread-watch")]
#[command(about = "Follow a conversation thread: history, live messages, and sending")]
#[command(version)]
struct Cli {
    /// Thread (subscription) id
    thread: String,

    /// Bearer credential
    #[arg(short, long, env = "THREAD_SYNC_TOKEN")]
    token: Option<String>,

    /// Which side of the thread you are on
    #[arg(short, long, default_value = "fan")]
    role: ParticipantRole,

    /// REST API base URL (overrides config)
    #[arg(long)]
    api_url: Option<String>,

    /// Config file (defaults to the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reconnect the live transport with backoff when it drops
    #[arg(long)]
    reconnect: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            let mut config = ClientConfig::from_path(path)?;
            config.apply_env();
            config
        }
        None => ClientConfig::load()?,
    };
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }
    if cli.reconnect {
        config.reconnect.enabled = true;
    }

    let session = Session::new(cli.token, cli.role);
    let api = Arc::new(MarketClient::new(&config, &session)?);
    let mut view = ThreadView::new(api, session, &config, cli.thread.into());

    if let Err(e) = view.open().await {
        return match view.status() {
            ViewStatus::NotFound => {
                eprintln!("Thread not found");
                Ok(())
            }
            _ => Err(e).context("failed to load thread"),
        };
    }

    if let Some(info) = view.info() {
        println!("== {} ({}) [{}]", info.title, info.subtitle, info.status);
    }
    for message in view.messages() {
        print_message(message, view.session().role());
    }
    if !view.is_live() {
        eprintln!("(live updates unavailable; showing history only)");
    }

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut live = view.is_live();

    loop {
        tokio::select! {
            line = stdin.next_line() => {
                let Some(line) = line? else { break };
                view.set_draft(line);
                match view.send_draft().await {
                    Ok(message) => print_message(&message, view.session().role()),
                    Err(e) => eprintln!("send failed: {}", e),
                }
            }
            update = view.pump_live(), if live => match update {
                LiveUpdate::Appended => {
                    if let Some(message) = view.messages().last() {
                        print_message(message, view.session().role());
                    }
                }
                LiveUpdate::Skipped => {}
                LiveUpdate::Disconnected => {
                    eprintln!("(live updates stopped)");
                    live = false;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    view.close().await;
    Ok(())
}

fn print_message(message: &Message, role: ParticipantRole) {
    println!(
        "[{}] {}: {}",
        message.display_time(),
        message.sender_label(role),
        message.display_text()
    );
}
