//! Consumer side of the message queue
//!
//! Drains parsed game messages, route selections and lifecycle events,
//! applies them to the current [`GameState`] and publishes the result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::client::events::{Dispatcher, Event};
use crate::client::shutdown::Shutdown;
use crate::codec::GameMessage;
use crate::error::Result;
use crate::protocol::CommandSink;
use crate::state::{find_closest, GameState, PlannedRoute, Segment, TrackPoint, WorldId};

/// Login and connection progress reported by the outer client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    LoggedIn,
    InvalidCredentials,
    WaitingForConnection,
    Connected,
    IncorrectConnectionSecret,
    Failed(String),
    LoggedOut,
}

#[derive(Debug)]
pub enum HandlerInput {
    Message(GameMessage),
    SelectRoute(PlannedRoute),
    Lifecycle(LifecycleEvent),
    /// Acknowledged once every earlier input has been applied
    Flush(oneshot::Sender<()>),
}

pub struct MessageHandler {
    world: WorldId,
    segments: Vec<Arc<Segment>>,
    markers: Vec<Arc<Segment>>,
    route: Option<PlannedRoute>,
    dispatcher: Arc<Dispatcher>,
    sink: Arc<dyn CommandSink>,
    paired: AtomicBool,
    last_sequence_number: u32,
    active_marker: Option<Arc<Segment>>,
}

impl MessageHandler {
    pub fn new(
        world: WorldId,
        segments: Vec<Arc<Segment>>,
        dispatcher: Arc<Dispatcher>,
        sink: Arc<dyn CommandSink>,
    ) -> Self {
        Self {
            world,
            segments,
            markers: Vec::new(),
            route: None,
            dispatcher,
            sink,
            paired: AtomicBool::new(false),
            last_sequence_number: 0,
            active_marker: None,
        }
    }

    pub fn with_markers(mut self, markers: Vec<Arc<Segment>>) -> Self {
        self.markers = markers;
        self
    }

    pub fn route(&self) -> Option<&PlannedRoute> {
        self.route.as_ref()
    }

    /// Drain the queue until it closes or shutdown is requested
    pub async fn run(mut self, mut queue: mpsc::Receiver<HandlerInput>, mut shutdown: Shutdown) {
        loop {
            let input = tokio::select! {
                _ = shutdown.cancelled() => break,
                input = queue.recv() => match input {
                    Some(input) => input,
                    None => break,
                },
            };

            if let Err(e) = self.handle(input) {
                error!("Failed to handle input: {}", e);
            }
        }
        debug!("Message handler stopped");
    }

    pub fn handle(&mut self, input: HandlerInput) -> Result<()> {
        match input {
            HandlerInput::Message(message) => self.handle_message(message),
            HandlerInput::SelectRoute(route) => {
                info!("Selected route {} ({} segments)", route.name, route.sequence().len());
                self.dispatcher.publish(Event::RouteSelected(route.progress()));
                self.route = Some(route);
                Ok(())
            }
            HandlerInput::Lifecycle(event) => self.handle_lifecycle(event),
            HandlerInput::Flush(ack) => {
                let _ = ack.send(());
                Ok(())
            }
        }
    }

    fn handle_lifecycle(&mut self, event: LifecycleEvent) -> Result<()> {
        let state = self.dispatcher.current();
        let next = match event {
            LifecycleEvent::LoggedIn => state.log_in()?,
            LifecycleEvent::InvalidCredentials => state.invalid_credentials()?,
            LifecycleEvent::WaitingForConnection => state.wait_for_connection()?,
            LifecycleEvent::Connected => state.connected()?,
            LifecycleEvent::IncorrectConnectionSecret => state.incorrect_connection_secret()?,
            LifecycleEvent::Failed(message) => state.fail(message),
            LifecycleEvent::LoggedOut => {
                self.reset_route();
                state.log_out()
            }
        };
        self.transition(next);
        Ok(())
    }

    fn handle_message(&mut self, message: GameMessage) -> Result<()> {
        match message {
            GameMessage::RiderPosition { latitude, longitude, altitude } => {
                let position = TrackPoint::new(latitude, longitude, altitude, self.world);
                self.update_position(position)
            }
            GameMessage::CommandAvailable { command_type, sequence_number } => {
                self.last_sequence_number = sequence_number;
                self.dispatcher.publish(Event::LastSequenceNumber(sequence_number));
                let next = self.dispatcher.current().turn_command_available(&command_type)?;
                self.transition(next);
                Ok(())
            }
            GameMessage::ActivityDetails { rider_id, activity_id } => {
                self.activity_details(rider_id, activity_id)
            }
            GameMessage::Ping { rider_id } => {
                if !self.paired.swap(true, Ordering::SeqCst) {
                    info!("Pairing with rider {}", rider_id);
                    self.sink.send_initial_pairing_message(rider_id, self.last_sequence_number);
                }
                Ok(())
            }
        }
    }

    fn update_position(&mut self, position: TrackPoint) -> Result<()> {
        let state = self.dispatcher.current();
        if !state.is_in_game() {
            debug!("Ignoring position {} while {}", position, state.name());
            return Ok(());
        }

        let next = state.update_position(position.clone(), &self.segments, self.route.as_mut())?;
        self.transition(next);
        self.track_markers(&position);
        Ok(())
    }

    fn activity_details(&mut self, rider_id: u32, activity_id: u64) -> Result<()> {
        let state = self.dispatcher.current();

        if activity_id == 0 {
            let next = state.leave_game()?;
            self.reset_route();
            self.transition(next);
            return Ok(());
        }

        match state.activity() {
            Some(ids) if ids.activity_id != activity_id => {
                info!("Activity changed from {} to {}", ids.activity_id, activity_id);
                let left = state.leave_game()?;
                self.reset_route();
                let entered = left.enter_game(rider_id, activity_id)?;
                self.transition(left);
                self.transition(entered);
            }
            _ => {
                let next = state.enter_game(rider_id, activity_id)?;
                self.transition(next);
            }
        }
        Ok(())
    }

    fn reset_route(&mut self) {
        if let Some(route) = self.route.as_mut() {
            route.reset();
            self.dispatcher.publish(Event::RouteReset(route.progress()));
        }
        self.active_marker = None;
    }

    fn transition(&self, next: GameState) {
        let current = self.dispatcher.current();
        if current.name() != next.name() {
            info!("{} -> {}", current.name(), next);
        }
        self.dispatcher.publish_state(next);
    }

    fn track_markers(&mut self, position: &TrackPoint) {
        let matched = find_closest(&self.markers, position, None).map(|(marker, _)| Arc::clone(marker));
        let unchanged = match (&self.active_marker, &matched) {
            (Some(a), Some(b)) => a.id == b.id,
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return;
        }

        if let Some(left) = self.active_marker.take() {
            info!("Left {:?} {}", left.segment_type, left.name);
            self.dispatcher.publish(Event::MarkerLeft(left));
        }
        if let Some(entered) = matched {
            info!("Entered {:?} {}", entered.segment_type, entered.name);
            self.dispatcher.publish(Event::MarkerEntered(Arc::clone(&entered)));
            self.active_marker = Some(entered);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::events::EventKind;
    use crate::codec::OutboundCommand;
    use crate::error::Error;
    use crate::protocol::RecordingCommandSink;
    use crate::state::{SegmentDirection, SegmentSequenceEntry, SegmentType, SportType};

    fn road(id: &str, lat0: f64) -> Arc<Segment> {
        let points = (0..10)
            .map(|i| TrackPoint::new(lat0 - i as f64 * 0.0001, 166.95, 0.0, WorldId::Watopia))
            .collect();
        Arc::new(Segment::new(id, points).with_world(WorldId::Watopia))
    }

    fn handler() -> (MessageHandler, Arc<Dispatcher>, Arc<RecordingCommandSink>) {
        let dispatcher = Arc::new(Dispatcher::new(64));
        let sink = Arc::new(RecordingCommandSink::new());
        let handler = MessageHandler::new(
            WorldId::Watopia,
            vec![road("seg-1", -11.6400)],
            Arc::clone(&dispatcher),
            sink.clone(),
        );
        (handler, dispatcher, sink)
    }

    fn connect(handler: &mut MessageHandler) {
        for event in [
            LifecycleEvent::LoggedIn,
            LifecycleEvent::WaitingForConnection,
            LifecycleEvent::Connected,
        ] {
            handler.handle(HandlerInput::Lifecycle(event)).unwrap();
        }
    }

    fn position(lat: f64) -> HandlerInput {
        HandlerInput::Message(GameMessage::RiderPosition { latitude: lat, longitude: 166.95, altitude: 0.0 })
    }

    fn activity(activity_id: u64) -> HandlerInput {
        HandlerInput::Message(GameMessage::ActivityDetails { rider_id: 42, activity_id })
    }

    #[test]
    fn test_lifecycle_reaches_connected() {
        let (mut handler, dispatcher, _) = handler();
        connect(&mut handler);
        assert_eq!(dispatcher.current(), GameState::ConnectedToGame);

        let err = handler
            .handle(HandlerInput::Lifecycle(LifecycleEvent::InvalidCredentials))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { operation: "invalid_credentials", .. }));
        assert_eq!(dispatcher.current(), GameState::ConnectedToGame);
    }

    #[test]
    fn test_flush_acks_after_earlier_inputs() {
        let (mut handler, dispatcher, _) = handler();
        let (ack, mut done) = oneshot::channel();
        handler.handle(HandlerInput::Lifecycle(LifecycleEvent::LoggedIn)).unwrap();
        handler.handle(HandlerInput::Flush(ack)).unwrap();

        assert!(done.try_recv().is_ok());
        assert_eq!(dispatcher.current(), GameState::LoggedIn);
    }

    #[test]
    fn test_first_ping_pairs_once() {
        let (mut handler, _, sink) = handler();
        for _ in 0..3 {
            handler.handle(HandlerInput::Message(GameMessage::Ping { rider_id: 42 })).unwrap();
        }
        assert_eq!(
            sink.commands(),
            vec![OutboundCommand::InitialPairing { rider_id: 42, sequence_number: 0 }]
        );
    }

    #[test]
    fn test_position_ignored_before_game() {
        let (mut handler, dispatcher, _) = handler();
        connect(&mut handler);
        handler.handle(position(-11.6403)).unwrap();
        assert_eq!(dispatcher.current(), GameState::ConnectedToGame);
    }

    #[test]
    fn test_position_in_game_starts_route() {
        let (mut handler, dispatcher, _) = handler();
        connect(&mut handler);
        let route = PlannedRoute::new(
            "short",
            WorldId::Watopia,
            SportType::Cycling,
            vec![SegmentSequenceEntry::new("seg-1", SegmentDirection::AtoB)],
        )
        .unwrap();
        let mut selected = dispatcher.subscribe(&[EventKind::RouteSelected]);

        handler.handle(HandlerInput::SelectRoute(route)).unwrap();
        handler.handle(activity(1001)).unwrap();
        handler.handle(position(-11.6403)).unwrap();

        assert!(selected.try_recv().is_some());
        assert_eq!(dispatcher.current().name(), "OnRoute");
        assert!(handler.route().unwrap().has_started());
    }

    #[test]
    fn test_activity_switch_leaves_then_enters() {
        let (mut handler, dispatcher, _) = handler();
        connect(&mut handler);
        handler.handle(activity(1001)).unwrap();

        let mut sub = dispatcher.subscribe(&[EventKind::EnteredGame, EventKind::LeftGame]);
        handler.handle(activity(1001)).unwrap();
        handler.handle(activity(2002)).unwrap();

        let kinds: Vec<_> = std::iter::from_fn(|| sub.try_recv()).map(|e| e.kind()).collect();
        assert_eq!(kinds, vec![EventKind::LeftGame, EventKind::EnteredGame]);
        assert_eq!(dispatcher.current().activity().unwrap().activity_id, 2002);

        handler.handle(activity(0)).unwrap();
        assert_eq!(dispatcher.current(), GameState::ConnectedToGame);
    }

    #[test]
    fn test_leaving_game_rewinds_route() {
        let (mut handler, dispatcher, _) = handler();
        connect(&mut handler);
        let route = PlannedRoute::new(
            "short",
            WorldId::Watopia,
            SportType::Cycling,
            vec![SegmentSequenceEntry::new("seg-1", SegmentDirection::AtoB)],
        )
        .unwrap();
        handler.handle(HandlerInput::SelectRoute(route)).unwrap();
        handler.handle(activity(1001)).unwrap();
        handler.handle(position(-11.6403)).unwrap();

        let mut sub = dispatcher.subscribe(&[EventKind::RouteReset]);
        handler.handle(activity(0)).unwrap();

        assert!(matches!(sub.try_recv(), Some(Event::RouteReset(route)) if !route.has_started));
        assert!(!handler.route().unwrap().has_started());
    }

    #[test]
    fn test_command_available_publishes_sequence_number() {
        let (mut handler, dispatcher, _) = handler();
        connect(&mut handler);
        handler.handle(activity(1001)).unwrap();
        let mut sub = dispatcher.subscribe(&[EventKind::LastSequenceNumber]);

        handler
            .handle(HandlerInput::Message(GameMessage::CommandAvailable {
                command_type: "ride on".into(),
                sequence_number: 17,
            }))
            .unwrap();
        assert!(matches!(sub.try_recv(), Some(Event::LastSequenceNumber(17))));
    }

    #[test]
    fn test_marker_entered_and_left() {
        let (handler, dispatcher, _) = handler();
        let climb = Arc::new(
            Segment::new("kom", road("kom", -11.6400).points().to_vec())
                .with_world(WorldId::Watopia)
                .with_type(SegmentType::Climb),
        );
        let mut handler = handler.with_markers(vec![climb]);
        connect(&mut handler);
        handler.handle(activity(1001)).unwrap();

        let mut sub = dispatcher.subscribe(&[EventKind::MarkerEntered, EventKind::MarkerLeft]);
        handler.handle(position(-11.6403)).unwrap();
        handler.handle(position(-11.6404)).unwrap();
        handler.handle(position(-11.7000)).unwrap();

        let kinds: Vec<_> = std::iter::from_fn(|| sub.try_recv()).map(|e| e.kind()).collect();
        assert_eq!(kinds, vec![EventKind::MarkerEntered, EventKind::MarkerLeft]);
    }
}
