use std::sync::Arc;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, watch};
use tracing::{trace, warn};

use crate::state::{ActivityIds, GameState, RouteProgress, Segment, TrackPoint, TurnDirections};

/// Events fanned out to subscribers
#[derive(Debug, Clone)]
pub enum Event {
    /// Any change of the game state
    StateChanged(GameState),

    PositionChanged(TrackPoint),

    /// Rider was matched to a different segment
    SegmentChanged {
        segment_id: String,
        route: Option<RouteProgress>,
    },

    /// The upcoming junction is fully known
    TurnsAvailable {
        directions: TurnDirections,
        route: RouteProgress,
    },

    EnteredGame(ActivityIds),

    LeftGame,

    RouteSelected(RouteProgress),

    /// The route was rewound to unstarted (leaving the game or logging out)
    RouteReset(RouteProgress),

    RouteCompleted(RouteProgress),

    /// Sequence number of the latest command announcement
    LastSequenceNumber(u32),

    MarkerEntered(Arc<Segment>),

    MarkerLeft(Arc<Segment>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StateChanged,
    PositionChanged,
    SegmentChanged,
    TurnsAvailable,
    EnteredGame,
    LeftGame,
    RouteSelected,
    RouteReset,
    RouteCompleted,
    LastSequenceNumber,
    MarkerEntered,
    MarkerLeft,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::StateChanged(_) => EventKind::StateChanged,
            Self::PositionChanged(_) => EventKind::PositionChanged,
            Self::SegmentChanged { .. } => EventKind::SegmentChanged,
            Self::TurnsAvailable { .. } => EventKind::TurnsAvailable,
            Self::EnteredGame(_) => EventKind::EnteredGame,
            Self::LeftGame => EventKind::LeftGame,
            Self::RouteSelected(_) => EventKind::RouteSelected,
            Self::RouteReset(_) => EventKind::RouteReset,
            Self::RouteCompleted(_) => EventKind::RouteCompleted,
            Self::LastSequenceNumber(_) => EventKind::LastSequenceNumber,
            Self::MarkerEntered(_) => EventKind::MarkerEntered,
            Self::MarkerLeft(_) => EventKind::MarkerLeft,
        }
    }
}

/// Events implied by a state replacement
fn derive_events(previous: &GameState, current: &GameState) -> Vec<Event> {
    let mut events = Vec::new();
    if previous == current {
        return events;
    }
    events.push(Event::StateChanged(current.clone()));

    if !previous.is_in_game() && current.is_in_game() {
        if let Some(ids) = current.activity() {
            events.push(Event::EnteredGame(ids));
        }
    }

    if let Some(position) = current.position() {
        if previous.position() != Some(position) {
            events.push(Event::PositionChanged(position.clone()));
        }
    }

    if let Some(fix) = current.fix() {
        if previous.fix().map(|f| f.segment_id()) != Some(fix.segment_id()) {
            events.push(Event::SegmentChanged {
                segment_id: fix.segment_id().to_string(),
                route: current.route().cloned(),
            });
        }
    }

    if let (Some(directions), Some(route)) = (current.directions(), current.route()) {
        if previous.directions() != Some(directions) {
            events.push(Event::TurnsAvailable { directions, route: route.clone() });
        }
    }

    if let GameState::CompletedRoute { route, .. } = current {
        if !matches!(previous, GameState::CompletedRoute { .. }) {
            events.push(Event::RouteCompleted(route.clone()));
        }
    }

    if previous.is_in_game() && !current.is_in_game() {
        events.push(Event::LeftGame);
    }

    events
}

/// Holds the current state and broadcasts events
#[derive(Debug)]
pub struct Dispatcher {
    state: watch::Sender<GameState>,
    events: broadcast::Sender<Event>,
}

impl Dispatcher {
    pub fn new(capacity: usize) -> Self {
        let (state, _) = watch::channel(GameState::default());
        let (events, _) = broadcast::channel(capacity.max(1));
        Self { state, events }
    }

    pub fn current(&self) -> GameState {
        self.state.borrow().clone()
    }

    /// Broadcast `event`; having no subscribers is fine
    pub fn publish(&self, event: Event) {
        trace!("Publishing {:?}", event.kind());
        let _ = self.events.send(event);
    }

    /// Replace the current state and publish the events it implies
    pub fn publish_state(&self, state: GameState) {
        let previous = self.state.send_replace(state.clone());
        for event in derive_events(&previous, &state) {
            self.publish(event);
        }
    }

    /// Subscribe to `kinds`, or to everything when empty
    pub fn subscribe(&self, kinds: &[EventKind]) -> Subscription {
        Subscription {
            rx: self.events.subscribe(),
            kinds: kinds.to_vec(),
        }
    }
}

/// Filtered event receiver
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<Event>,
    kinds: Vec<EventKind>,
}

impl Subscription {
    fn accepts(&self, event: &Event) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&event.kind())
    }

    /// Next matching event, `None` once the dispatcher is gone
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Subscriber lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event already queued
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Subscriber lagged, skipped {} events", skipped);
                }
                Err(_) => return None,
            }
        }
    }
}
