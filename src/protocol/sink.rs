use std::sync::Mutex;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client::shutdown::Shutdown;
use crate::codec::OutboundCommand;
use crate::error::Result;
use crate::state::TurnDirection;

/// Outbound side of the game connection
pub trait CommandSink: Send + Sync {
    fn send_turn_command(&self, direction: TurnDirection, sequence_number: u32);
    fn send_initial_pairing_message(&self, rider_id: u32, sequence_number: u32);
}

/// Queues commands for [`run_command_writer`]
#[derive(Debug, Clone)]
pub struct ChannelCommandSink {
    tx: mpsc::Sender<OutboundCommand>,
}

impl ChannelCommandSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<OutboundCommand>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    fn enqueue(&self, command: OutboundCommand) {
        if let Err(e) = self.tx.try_send(command) {
            warn!("Dropping outbound command {:?}: {}", command, e);
        }
    }
}

impl CommandSink for ChannelCommandSink {
    fn send_turn_command(&self, direction: TurnDirection, sequence_number: u32) {
        self.enqueue(OutboundCommand::Turn { direction, sequence_number });
    }

    fn send_initial_pairing_message(&self, rider_id: u32, sequence_number: u32) {
        self.enqueue(OutboundCommand::InitialPairing { rider_id, sequence_number });
    }
}

/// Keeps commands in memory instead of sending them, for replays
#[derive(Debug, Default)]
pub struct RecordingCommandSink {
    commands: Mutex<Vec<OutboundCommand>>,
}

impl RecordingCommandSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<OutboundCommand> {
        self.commands.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, command: OutboundCommand) {
        info!("Recorded {:?}", command);
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(command);
        }
    }
}

impl CommandSink for RecordingCommandSink {
    fn send_turn_command(&self, direction: TurnDirection, sequence_number: u32) {
        self.record(OutboundCommand::Turn { direction, sequence_number });
    }

    fn send_initial_pairing_message(&self, rider_id: u32, sequence_number: u32) {
        self.record(OutboundCommand::InitialPairing { rider_id, sequence_number });
    }
}

/// Frame queued commands onto `writer` until the queue closes or shutdown
pub async fn run_command_writer<W: AsyncWrite + Unpin>(
    mut rx: mpsc::Receiver<OutboundCommand>,
    mut writer: W,
    mut shutdown: Shutdown,
) -> Result<()> {
    loop {
        let command = tokio::select! {
            _ = shutdown.cancelled() => break,
            command = rx.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };

        let frame = command.encode()?;
        writer.write_all(&frame).await?;
        writer.flush().await?;
        info!("Sent {:?}", command);
    }

    debug!("Command writer stopped");
    Ok(())
}
