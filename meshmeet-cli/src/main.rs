use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use colored::*;
use dialoguer::Password;
use meshmeet_client::media::SyntheticDevices;
use meshmeet_client::peer::{LoopbackNetwork, PeerState, WebRtcLinkFactory};
use meshmeet_client::{
    ClientConfig, MeshCoordinator, MeshError, MeshEvent, MeshSession, SignalingClient,
    SignalingConnection,
};
use meshmeet_core::{Identity, RoomOptions};
use meshmeet_server::{ServerConfig, SignalingService};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const DEMO_WAIT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "meshmeet", version, about = "Peer-to-peer mesh meetings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signaling relay.
    Serve {
        #[arg(long)]
        bind: Option<String>,

        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Relay and a full mesh of participants in one process, over the loopback transport.
    Demo {
        #[arg(long, default_value_t = 3)]
        peers: usize,

        #[arg(long, default_value = "demo")]
        room: String,
    },
    /// Text chat in a room from the terminal.
    Chat(ChatArgs),
}

#[derive(Args)]
struct ChatArgs {
    /// Relay WebSocket url. Overrides the config file.
    #[arg(long)]
    url: Option<String>,

    #[arg(long)]
    identity: String,

    #[arg(long)]
    room: String,

    /// Host the room instead of joining it.
    #[arg(long)]
    create: bool,

    #[arg(long)]
    capacity: Option<usize>,

    #[arg(long)]
    ask_password: bool,

    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Commands::Serve { bind, config } => serve(bind, config).await,
        Commands::Demo { peers, room } => demo(peers, &room).await,
        Commands::Chat(args) => chat(args).await,
    }
}

async fn serve(bind: Option<String>, config: Option<PathBuf>) -> Result<()> {
    let mut config = match config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = bind {
        config.bind_addr = bind;
    }
    println!(
        "{}",
        format!("Relay starting on {}", config.bind_addr).green().bold()
    );
    meshmeet_server::serve(config).await
}

async fn demo(peers: usize, room: &str) -> Result<()> {
    if peers < 2 {
        bail!("a mesh needs at least two peers");
    }
    println!(
        "{}",
        format!("Starting an in-process mesh of {peers} peers").green().bold()
    );

    let config = ClientConfig::default();
    let service = SignalingService::new(&ServerConfig::default());
    let network = LoopbackNetwork::new();

    let mut sessions: Vec<(String, MeshSession)> = Vec::with_capacity(peers);
    for i in 1..=peers {
        let name = format!("peer-{i}");
        let local = service.connect_local();
        let signaling = SignalingClient::new(
            SignalingConnection::from_parts(local.outgoing, local.incoming),
            config.rpc_timeout(),
        );
        let session = MeshCoordinator::start(
            Identity::new(name.as_str()),
            config.clone(),
            signaling,
            Arc::new(SyntheticDevices::new()),
            Arc::new(network.factory_for(name.as_str())),
        )
        .await?;

        if i == 1 {
            session
                .handle
                .create_room_with(room, RoomOptions::with_capacity(peers))
                .await?;
            println!("  {} {} hosts '{}'", "+".cyan(), name, room);
        } else {
            session.handle.join_room(room, "").await?;
            println!("  {} {} joined", "+".cyan(), name);
        }
        sessions.push((name, session));
    }

    let expected = peers - 1;
    for (name, session) in &mut sessions {
        tokio::time::timeout(
            DEMO_WAIT,
            session.state.wait_for(|s| {
                s.peers
                    .values()
                    .filter(|state| **state == PeerState::Connected)
                    .count()
                    == expected
            }),
        )
        .await
        .with_context(|| format!("{name} never reached a full mesh"))??;
    }
    println!("{}", "Full mesh established".green());

    for (name, session) in &sessions {
        let report = session
            .handle
            .send_text(&format!("hello from {name}"))
            .await?;
        if !report.is_complete() {
            println!("{}", format!("  {name}: {} undelivered", report.failed.len()).yellow());
        }
    }

    for (name, session) in &mut sessions {
        let state = tokio::time::timeout(
            DEMO_WAIT,
            session.state.wait_for(|s| s.messages.len() == peers),
        )
        .await
        .with_context(|| format!("{name} is missing chat messages"))??
        .clone();

        println!("{}", format!("{name} sees:").bold());
        for message in &state.messages {
            println!("  [{}] {}", message.from.as_str().cyan(), message.text);
        }
    }

    if let Some((host, session)) = sessions.first() {
        session.handle.close_room().await?;
        println!("{}", format!("{host} closed '{room}'").green().bold());
    }
    Ok(())
}

async fn chat(args: ChatArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    }
    .without_media();
    if let Some(url) = args.url {
        config.signaling_url = url;
    }

    let password = if args.ask_password {
        Password::new()
            .with_prompt("Room password")
            .allow_empty_password(true)
            .interact()?
    } else {
        String::new()
    };

    let signaling = SignalingClient::connect(&config.signaling_url, config.rpc_timeout()).await?;
    let factory = WebRtcLinkFactory::new()?;
    let MeshSession {
        handle, mut events, ..
    } = MeshCoordinator::start(
        Identity::new(args.identity.as_str()),
        config,
        signaling,
        Arc::new(SyntheticDevices::new()),
        Arc::new(factory),
    )
    .await?;

    if args.create {
        let mut options = RoomOptions::default();
        if let Some(capacity) = args.capacity {
            options.capacity = capacity;
        }
        if !password.is_empty() {
            options = options.password(password);
        }
        handle.create_room_with(&args.room, options).await?;
        println!("{}", format!("Hosting '{}'", args.room).green().bold());
    } else {
        let room = handle.join_room(&args.room, &password).await?;
        let names: Vec<&str> = room.participants.iter().map(|p| p.identity.as_str()).collect();
        println!(
            "{}",
            format!("Joined '{}' with {}", room.name, names.join(", "))
                .green()
                .bold()
        );
    }
    println!(
        "{}",
        "Type to chat, /peers to list links, /record <name> and /stop <name> to record, /quit to leave."
            .dimmed()
    );

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => continue,
            "/quit" => break,
            "/peers" => {
                for (identity, state) in handle.peer_states().await? {
                    println!("  {identity}: {state}");
                }
            }
            command if command.starts_with("/record ") || command.starts_with("/stop ") => {
                let (verb, name) = command.split_once(' ').unwrap_or((command, ""));
                let identity = Identity::new(name.trim());
                let result = if verb == "/record" {
                    handle.start_recording(&identity).await
                } else {
                    handle.stop_recording(&identity).await.map(|_| ())
                };
                if let Err(e) = result {
                    println!("{}", format!("  {verb} {identity}: {e}").yellow());
                }
            }
            text => match handle.send_text(text).await {
                Ok(report) => {
                    for (identity, e) in report.failed {
                        println!("{}", format!("  not delivered to {identity}: {e}").yellow());
                    }
                }
                Err(MeshError::SessionEnded) => break,
                Err(e) => return Err(e.into()),
            },
        }
    }

    let left = if args.create {
        handle.close_room().await
    } else {
        handle.leave_room().await
    };
    if let Err(e) = left {
        debug!("Leaving failed: {}", e);
    }
    printer.abort();
    Ok(())
}

fn print_event(event: &MeshEvent) {
    match event {
        MeshEvent::PeerJoined(identity) => println!("{}", format!("-> {identity} joined").green()),
        MeshEvent::PeerConnected(identity) => {
            println!("{}", format!("   linked to {identity}").cyan())
        }
        MeshEvent::RemoteStream { identity, track } => {
            println!("{}", format!("   {} video from {identity}", track.id).dimmed())
        }
        MeshEvent::TextMessage(message) => {
            println!("[{}] {}", message.from.as_str().bold(), message.text)
        }
        MeshEvent::FileReceived(file) => println!(
            "{}",
            format!("   {} sent '{}' ({} bytes)", file.from, file.name, file.data.len()).cyan()
        ),
        MeshEvent::PeerLeft(identity) => println!("{}", format!("<- {identity} left").yellow()),
        MeshEvent::RoomClosed(room) => println!("{}", format!("Room '{room}' was closed").red()),
        MeshEvent::Broadcast { from, payload } => {
            println!("{}", format!("   {from}: {payload}").dimmed())
        }
        MeshEvent::RecordingFinished(recording) => println!(
            "{}",
            format!(
                "   recorded {} ({} chunks, {} bytes, {:.1}s)",
                recording.file_name(),
                recording.chunks.len(),
                recording.byte_len(),
                recording.duration.as_secs_f64()
            )
            .cyan()
        ),
        MeshEvent::MediaUnavailable(e) => println!("{}", format!("   no local media: {e}").yellow()),
        MeshEvent::SignalingLost => println!(
            "{}",
            "Lost the signaling server. /quit and rejoin to recover.".red()
        ),
    }
}
