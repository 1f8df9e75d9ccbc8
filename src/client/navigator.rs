use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::client::events::{Event, EventKind, Subscription};
use crate::client::shutdown::Shutdown;
use crate::protocol::CommandSink;
use crate::state::{RouteProgress, TurnDirection, TurnDirections};

/// Events the navigator needs
pub const NAVIGATOR_EVENTS: &[EventKind] = &[
    EventKind::RouteSelected,
    EventKind::RouteReset,
    EventKind::LastSequenceNumber,
    EventKind::SegmentChanged,
    EventKind::TurnsAvailable,
    EventKind::RouteCompleted,
];

/// Sends the planned turn when the upcoming junction becomes known
pub struct Navigator {
    sink: Arc<dyn CommandSink>,
    last_sequence_number: Option<u32>,
    /// (loop, step) of the last junction handled
    handled_step: Option<(u32, usize)>,
    completion_logged: bool,
}

impl Navigator {
    pub fn new(sink: Arc<dyn CommandSink>) -> Self {
        Self {
            sink,
            last_sequence_number: None,
            handled_step: None,
            completion_logged: false,
        }
    }

    pub async fn run(mut self, mut events: Subscription, mut shutdown: Shutdown) {
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            self.handle(&event);
        }
        debug!("Navigator stopped");
    }

    pub fn handle(&mut self, event: &Event) {
        match event {
            Event::RouteSelected(route) => {
                info!("Navigating {} ({} steps)", route.name, route.total_steps);
                self.handled_step = None;
                self.completion_logged = false;
            }
            Event::RouteReset(route) => {
                debug!("Route {} rewound", route.name);
                self.handled_step = None;
                self.completion_logged = false;
            }
            Event::LastSequenceNumber(n) => self.last_sequence_number = Some(*n),
            Event::SegmentChanged { segment_id, route: Some(route) }
                if route.has_started && !route.has_completed =>
            {
                info!(
                    "Step {}/{}: {} then {}",
                    route.step + 1,
                    route.total_steps,
                    segment_id,
                    route.turn_to_next
                );
            }
            Event::TurnsAvailable { directions, route } => self.turns_available(*directions, route),
            Event::RouteCompleted(route) if !self.completion_logged => {
                info!("Completed {} after {} loops", route.name, route.loop_count + 1);
                self.completion_logged = true;
            }
            _ => {}
        }
    }

    fn turns_available(&mut self, directions: TurnDirections, route: &RouteProgress) {
        if !route.has_started || route.has_completed {
            return;
        }
        let step = (route.loop_count, route.step);
        if self.handled_step == Some(step) {
            return;
        }

        let turn = route.turn_to_next;
        if turn == TurnDirection::None {
            debug!("No turn planned at step {}", route.step + 1);
            return;
        }

        if !directions.has(turn) {
            error!(
                "Route expects {} after {} but the junction offers {}",
                turn,
                route.current_segment_id.as_deref().unwrap_or("?"),
                directions
            );
            self.handled_step = Some(step);
            return;
        }

        let Some(sequence_number) = self.last_sequence_number else {
            warn!("No command sequence number yet, cannot send {}", turn);
            return;
        };

        info!("Turning {} towards {}", turn, route.next_segment_id.as_deref().unwrap_or("?"));
        self.sink.send_turn_command(turn, sequence_number);
        self.handled_step = Some(step);
    }
}
