use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use route_pilot::client::{EventKind, LifecycleEvent, Session, SessionBuilder, SessionConfig};
use route_pilot::protocol::{self, ChannelCommandSink, RecordingCommandSink, StreamSource};
use route_pilot::state::{PlannedRoute, SportType, WorldId};

#[derive(Parser)]
#[command(name = "route-pilot")]
#[command(about = "Steers a rider along a planned route by sending turn commands to the game")]
struct Args {
    /// JSON session configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory with segments-<world>.json and markers-<world>.json
    #[arg(long)]
    segments: Option<PathBuf>,

    /// Planned route (JSON)
    #[arg(long)]
    route: Option<PathBuf>,

    #[arg(long)]
    world: Option<WorldId>,

    #[arg(long)]
    sport: Option<SportType>,

    /// Address of the game's companion channel
    #[arg(long, conflicts_with = "replay", required_unless_present = "replay")]
    connect: Option<SocketAddr>,

    /// Replay a captured byte stream instead of connecting
    #[arg(long)]
    replay: Option<PathBuf>,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn load_config(args: &Args) -> Result<SessionConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => SessionConfig::default(),
    };
    if let Some(dir) = &args.segments {
        config.data_dir = dir.clone();
    }
    if let Some(world) = args.world {
        config.world = world;
    }
    if let Some(sport) = args.sport {
        config.sport = sport;
    }
    Ok(config)
}

/// The companion channel only opens once the game has logged the rider in
async fn announce_connection(session: &Session) -> route_pilot::Result<()> {
    for event in [
        LifecycleEvent::LoggedIn,
        LifecycleEvent::WaitingForConnection,
        LifecycleEvent::Connected,
    ] {
        session.lifecycle(event).await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();
    let config = load_config(&args)?;

    let route = match &args.route {
        Some(path) => {
            let route: PlannedRoute = serde_json::from_str(&std::fs::read_to_string(path)?)?;
            info!("Loaded route {} from {}", route.name, path.display());
            Some(route)
        }
        None => None,
    };

    let mut builder = SessionBuilder::new(config);
    if let Some(route) = route {
        builder = builder.route(route);
    }

    let recorder = Arc::new(RecordingCommandSink::new());
    let (session, mut completed, receiver, writer) = if let Some(addr) = args.connect {
        let (source, write_half) = protocol::connect(addr).await?;
        let (sink, commands) = ChannelCommandSink::new(16);
        let session = builder.sink(Arc::new(sink)).start().await?;
        let completed = session.subscribe(&[EventKind::RouteCompleted]);
        let writer = session.spawn_command_writer(commands, write_half);
        announce_connection(&session).await?;
        let receiver = session.spawn_receiver(source);
        (session, completed, receiver, Some(writer))
    } else if let Some(path) = &args.replay {
        let file = tokio::fs::File::open(path).await?;
        info!("Replaying {}", path.display());
        let session = builder.sink(recorder.clone()).start().await?;
        let completed = session.subscribe(&[EventKind::RouteCompleted]);
        announce_connection(&session).await?;
        let receiver = session.spawn_receiver(StreamSource::new(file));
        (session, completed, receiver, None)
    } else {
        return Err("either --connect or --replay is required".into());
    };

    tokio::select! {
        result = receiver => {
            match result {
                Ok(Ok(())) => info!("Stream ended"),
                Ok(Err(e)) => error!("Receive loop failed: {}", e),
                Err(e) => error!("Receive task panicked: {}", e),
            }
            if let Err(e) = session.drain().await {
                error!("Failed to drain the message queue: {}", e);
            }
        }
        _ = completed.recv() => info!("Route completed"),
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    info!("Final state: {}", session.state());
    session.shutdown().await;
    if let Some(writer) = writer {
        if let Ok(Err(e)) = writer.await {
            error!("Command writer failed: {}", e);
        }
    }

    let recorded = recorder.commands();
    if !recorded.is_empty() {
        info!("{} commands would have been sent", recorded.len());
    }
    Ok(())
}
