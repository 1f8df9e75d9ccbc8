use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::io::AsyncWrite;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::events::{Dispatcher, EventKind, Subscription};
use crate::client::handler::{HandlerInput, LifecycleEvent, MessageHandler};
use crate::client::navigator::{Navigator, NAVIGATOR_EVENTS};
use crate::client::shutdown::{self, ShutdownTrigger};
use crate::codec::OutboundCommand;
use crate::error::{Error, Result};
use crate::protocol::{run_command_writer, run_receive_loop, ByteSource, CommandSink, RecordingCommandSink};
use crate::state::{GameState, JsonSegmentStore, PlannedRoute, SegmentStore, SportType, WorldId};

/// Re-issues the connect request to the game relay
pub trait ConnectionRelay: Send + Sync {
    fn request_connection(&self) -> impl Future<Output = Result<()>> + Send;
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("route-pilot")
}

/// Session configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct SessionConfig {
    pub world: WorldId,
    pub sport: SportType,
    /// Directory holding `segments-<world>.json` and `markers-<world>.json`
    pub data_dir: PathBuf,
    pub queue_capacity: usize,
    pub event_capacity: usize,
    /// Enter-game polls before the connection is requested again
    pub poll_attempts: u32,
    pub poll_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            world: WorldId::Watopia,
            sport: SportType::Cycling,
            data_dir: default_data_dir(),
            queue_capacity: 256,
            event_capacity: 64,
            poll_attempts: 10,
            poll_interval_ms: 1000,
        }
    }
}

impl SessionConfig {
    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Builder for navigation sessions
pub struct SessionBuilder {
    config: SessionConfig,
    store: Option<Arc<dyn SegmentStore>>,
    sink: Option<Arc<dyn CommandSink>>,
    route: Option<PlannedRoute>,
}

impl SessionBuilder {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            store: None,
            sink: None,
            route: None,
        }
    }

    pub fn world(mut self, world: WorldId) -> Self {
        self.config.world = world;
        self
    }

    pub fn sport(mut self, sport: SportType) -> Self {
        self.config.sport = sport;
        self
    }

    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    pub fn store(mut self, store: Arc<dyn SegmentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn CommandSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn route(mut self, route: PlannedRoute) -> Self {
        self.route = Some(route);
        self
    }

    /// Load the segment graph and spawn the handler and navigator tasks
    pub async fn start(self) -> Result<Session> {
        Session::start(self).await
    }
}

/// Running navigation session
pub struct Session {
    config: SessionConfig,
    dispatcher: Arc<Dispatcher>,
    queue: mpsc::Sender<HandlerInput>,
    trigger: ShutdownTrigger,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    async fn start(builder: SessionBuilder) -> Result<Self> {
        let SessionBuilder { config, store, sink, route } = builder;

        let store = store.unwrap_or_else(|| {
            Arc::new(JsonSegmentStore::new(&config.data_dir)) as Arc<dyn SegmentStore>
        });
        let segments = store.load_segments(config.world, config.sport)?;
        let markers = store.load_markers(config.world)?;
        info!(
            "Session for {} ({:?}): {} segments, {} markers",
            config.world,
            config.sport,
            segments.len(),
            markers.len()
        );

        let sink =
            sink.unwrap_or_else(|| Arc::new(RecordingCommandSink::new()) as Arc<dyn CommandSink>);
        let dispatcher = Arc::new(Dispatcher::new(config.event_capacity));
        let (queue, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (trigger, signal) = shutdown::channel();

        let navigator = Navigator::new(Arc::clone(&sink));
        let navigator_events = dispatcher.subscribe(NAVIGATOR_EVENTS);
        let handler = MessageHandler::new(config.world, segments, Arc::clone(&dispatcher), sink)
            .with_markers(markers);

        let tasks = vec![
            tokio::spawn(navigator.run(navigator_events, signal.clone())),
            tokio::spawn(handler.run(rx, signal)),
        ];

        let session = Self { config, dispatcher, queue, trigger, tasks };
        if let Some(route) = route {
            session.select_route(route).await?;
        }
        Ok(session)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current game state
    pub fn state(&self) -> GameState {
        self.dispatcher.current()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn subscribe(&self, kinds: &[EventKind]) -> Subscription {
        self.dispatcher.subscribe(kinds)
    }

    /// Sender for feeding the handler directly
    pub fn sender(&self) -> mpsc::Sender<HandlerInput> {
        self.queue.clone()
    }

    pub async fn send(&self, input: HandlerInput) -> Result<()> {
        self.queue.send(input).await.map_err(|_| Error::QueueClosed)
    }

    pub async fn select_route(&self, route: PlannedRoute) -> Result<()> {
        self.send(HandlerInput::SelectRoute(route)).await
    }

    pub async fn lifecycle(&self, event: LifecycleEvent) -> Result<()> {
        self.send(HandlerInput::Lifecycle(event)).await
    }

    /// Wait until the handler has applied every input queued before this call
    pub async fn drain(&self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.send(HandlerInput::Flush(ack)).await?;
        done.await.map_err(|_| Error::QueueClosed)
    }

    /// Spawn the receive loop over `source`
    pub fn spawn_receiver<S: ByteSource + 'static>(&self, source: S) -> JoinHandle<Result<()>> {
        tokio::spawn(run_receive_loop(source, self.sender(), self.trigger.subscribe()))
    }

    /// Spawn the task writing queued commands to `writer`
    pub fn spawn_command_writer<W: AsyncWrite + Unpin + Send + 'static>(
        &self,
        commands: mpsc::Receiver<OutboundCommand>,
        writer: W,
    ) -> JoinHandle<Result<()>> {
        tokio::spawn(run_command_writer(commands, writer, self.trigger.subscribe()))
    }

    /// Wait until the rider is in game
    ///
    /// Polls the state `poll_attempts` times, then asks `relay` to connect
    /// again and starts over. Returns [`Error::Cancelled`] on shutdown.
    pub async fn wait_for_game<R: ConnectionRelay>(&self, relay: &R) -> Result<GameState> {
        let mut shutdown = self.trigger.subscribe();
        let interval = self.config.poll_interval();

        loop {
            for _ in 0..self.config.poll_attempts {
                let state = self.state();
                if state.is_in_game() {
                    return Ok(state);
                }
                tokio::select! {
                    _ = shutdown.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(interval) => {}
                }
            }

            let state = self.state();
            if state.is_in_game() {
                return Ok(state);
            }
            warn!(
                "Not in game after {} polls ({}), requesting connection again",
                self.config.poll_attempts,
                state.name()
            );
            relay.request_connection().await?;
        }
    }

    /// Stop every loop and wait for the session tasks
    pub async fn shutdown(self) {
        self.trigger.trigger();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Session task failed: {}", e);
            }
        }
        debug!("Session stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::GameMessage;
    use crate::state::MemorySegmentStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn builder() -> SessionBuilder {
        let config = SessionConfig { poll_attempts: 2, poll_interval_ms: 5, ..SessionConfig::default() };
        SessionBuilder::new(config).store(Arc::new(MemorySegmentStore::default()))
    }

    #[test]
    fn test_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.queue_capacity, 256);
        assert_eq!(config.event_capacity, 64);
        assert_eq!(config.poll_attempts, 10);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert!(config.data_dir.ends_with("route-pilot"));
    }

    #[test]
    fn test_config_from_partial_json() {
        let config = SessionConfig::from_json(r#"{"world": "london", "poll_attempts": 3}"#).unwrap();
        assert_eq!(config.world, WorldId::London);
        assert_eq!(config.sport, SportType::Cycling);
        assert_eq!(config.poll_attempts, 3);
    }

    struct Relay {
        queue: mpsc::Sender<HandlerInput>,
        calls: AtomicU32,
    }

    impl ConnectionRelay for Relay {
        async fn request_connection(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            for event in [LifecycleEvent::WaitingForConnection, LifecycleEvent::Connected] {
                self.queue.send(HandlerInput::Lifecycle(event)).await.map_err(|_| Error::QueueClosed)?;
            }
            let details = GameMessage::ActivityDetails { rider_id: 1, activity_id: 99 };
            self.queue.send(HandlerInput::Message(details)).await.map_err(|_| Error::QueueClosed)
        }
    }

    #[tokio::test]
    async fn test_wait_for_game_requests_connection_after_budget() {
        let session = builder().start().await.unwrap();
        session.lifecycle(LifecycleEvent::LoggedIn).await.unwrap();

        let relay = Relay { queue: session.sender(), calls: AtomicU32::new(0) };
        let state = tokio::time::timeout(Duration::from_secs(5), session.wait_for_game(&relay))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(state.name(), "InGame");
        assert_eq!(relay.calls.load(Ordering::SeqCst), 1);
        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_drain_waits_for_queued_inputs() {
        let session = builder().start().await.unwrap();
        for event in [
            LifecycleEvent::LoggedIn,
            LifecycleEvent::WaitingForConnection,
            LifecycleEvent::Connected,
        ] {
            session.lifecycle(event).await.unwrap();
        }

        session.drain().await.unwrap();
        assert_eq!(session.state(), GameState::ConnectedToGame);
        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_tasks() {
        let session = builder().start().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), session.shutdown()).await.unwrap();
    }
}
