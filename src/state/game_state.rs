//! Rider game state machine
//!
//! Every operation takes the current state by reference and returns the next
//! one. Illegal operations return [`Error::InvalidTransition`] and leave the
//! caller's state untouched.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::state::matcher;
use crate::state::route::{PlannedRoute, RouteProgress};
use crate::state::segment::{Segment, SegmentDirection, TurnDirection};
use crate::state::track_point::TrackPoint;
use crate::state::turns::{TurnDirections, TurnReconciler};

/// Off-route positions this close to the last on-route position are treated as noise
pub const ROUTE_LOCK_RADIUS_METERS: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActivityIds {
    pub rider_id: u32,
    pub activity_id: u64,
}

/// Distance and climbing accumulated since entering the game
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ElapsedMetrics {
    pub distance: f64,
    pub ascent: f64,
    pub descent: f64,
}

impl ElapsedMetrics {
    fn advance(self, distance: f64, from_altitude: f64, to_altitude: f64) -> Self {
        let climb = to_altitude - from_altitude;
        Self {
            distance: self.distance + distance,
            ascent: self.ascent + climb.max(0.0),
            descent: self.descent + (-climb).max(0.0),
        }
    }
}

/// Where the rider was last matched on the segment graph
#[derive(Debug, Clone)]
pub struct SegmentFix {
    pub segment: Arc<Segment>,
    pub point: TrackPoint,
    pub direction: SegmentDirection,
    pub elapsed: ElapsedMetrics,
}

impl SegmentFix {
    fn following(
        previous: Option<&SegmentFix>,
        elapsed: ElapsedMetrics,
        segment: &Arc<Segment>,
        point: &TrackPoint,
    ) -> Self {
        let (elapsed, direction) = match previous {
            Some(prev) if prev.segment.id == segment.id => {
                let travelled =
                    (point.distance_along_segment - prev.point.distance_along_segment).abs();
                let direction = match segment.direction_of(&prev.point, point) {
                    SegmentDirection::Unknown => prev.direction,
                    known => known,
                };
                (elapsed.advance(travelled, prev.point.altitude, point.altitude), direction)
            }
            Some(prev) => (
                elapsed.advance(prev.point.distance_to(point), prev.point.altitude, point.altitude),
                SegmentDirection::Unknown,
            ),
            None => (elapsed, SegmentDirection::Unknown),
        };

        Self {
            segment: Arc::clone(segment),
            point: point.clone(),
            direction,
            elapsed,
        }
    }

    pub fn segment_id(&self) -> &str {
        &self.segment.id
    }
}

impl PartialEq for SegmentFix {
    fn eq(&self, other: &Self) -> bool {
        self.segment.id == other.segment.id
            && self.point == other.point
            && self.direction == other.direction
            && self.elapsed == other.elapsed
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum GameState {
    #[default]
    NotLoggedIn,
    LoggedIn,
    InvalidCredentials,
    WaitingForConnection,
    ConnectedToGame,
    IncorrectConnectionSecret,
    InGame {
        ids: ActivityIds,
    },
    /// In game but not on any known segment
    Positioned {
        ids: ActivityIds,
        position: TrackPoint,
        elapsed: ElapsedMetrics,
    },
    OnSegment {
        ids: ActivityIds,
        position: TrackPoint,
        fix: SegmentFix,
    },
    OnRoute {
        ids: ActivityIds,
        position: TrackPoint,
        fix: SegmentFix,
        route: RouteProgress,
        turns: TurnReconciler,
    },
    UpcomingTurn {
        ids: ActivityIds,
        position: TrackPoint,
        fix: SegmentFix,
        route: RouteProgress,
        directions: TurnDirections,
    },
    LostRouteLock {
        ids: ActivityIds,
        position: TrackPoint,
        fix: SegmentFix,
        route: RouteProgress,
    },
    CompletedRoute {
        ids: ActivityIds,
        position: TrackPoint,
        fix: SegmentFix,
        route: RouteProgress,
    },
    Error {
        message: String,
    },
}

impl GameState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotLoggedIn => "NotLoggedIn",
            Self::LoggedIn => "LoggedIn",
            Self::InvalidCredentials => "InvalidCredentials",
            Self::WaitingForConnection => "WaitingForConnection",
            Self::ConnectedToGame => "ConnectedToGame",
            Self::IncorrectConnectionSecret => "IncorrectConnectionSecret",
            Self::InGame { .. } => "InGame",
            Self::Positioned { .. } => "Positioned",
            Self::OnSegment { .. } => "OnSegment",
            Self::OnRoute { .. } => "OnRoute",
            Self::UpcomingTurn { .. } => "UpcomingTurn",
            Self::LostRouteLock { .. } => "LostRouteLock",
            Self::CompletedRoute { .. } => "CompletedRoute",
            Self::Error { .. } => "Error",
        }
    }

    pub fn is_in_game(&self) -> bool {
        self.activity().is_some()
    }

    pub fn activity(&self) -> Option<ActivityIds> {
        match self {
            Self::InGame { ids }
            | Self::Positioned { ids, .. }
            | Self::OnSegment { ids, .. }
            | Self::OnRoute { ids, .. }
            | Self::UpcomingTurn { ids, .. }
            | Self::LostRouteLock { ids, .. }
            | Self::CompletedRoute { ids, .. } => Some(*ids),
            _ => None,
        }
    }

    pub fn position(&self) -> Option<&TrackPoint> {
        match self {
            Self::Positioned { position, .. }
            | Self::OnSegment { position, .. }
            | Self::OnRoute { position, .. }
            | Self::UpcomingTurn { position, .. }
            | Self::LostRouteLock { position, .. }
            | Self::CompletedRoute { position, .. } => Some(position),
            _ => None,
        }
    }

    pub fn fix(&self) -> Option<&SegmentFix> {
        match self {
            Self::OnSegment { fix, .. }
            | Self::OnRoute { fix, .. }
            | Self::UpcomingTurn { fix, .. }
            | Self::LostRouteLock { fix, .. }
            | Self::CompletedRoute { fix, .. } => Some(fix),
            _ => None,
        }
    }

    pub fn route(&self) -> Option<&RouteProgress> {
        match self {
            Self::OnRoute { route, .. }
            | Self::UpcomingTurn { route, .. }
            | Self::LostRouteLock { route, .. }
            | Self::CompletedRoute { route, .. } => Some(route),
            _ => None,
        }
    }

    /// Resolved turn set, only while a turn is upcoming
    pub fn directions(&self) -> Option<TurnDirections> {
        match self {
            Self::UpcomingTurn { directions, .. } => Some(*directions),
            _ => None,
        }
    }

    pub fn elapsed(&self) -> ElapsedMetrics {
        match self {
            Self::Positioned { elapsed, .. } => *elapsed,
            other => other.fix().map(|f| f.elapsed).unwrap_or_default(),
        }
    }

    fn holds_route_lock(&self) -> bool {
        matches!(self, Self::OnRoute { .. } | Self::UpcomingTurn { .. })
    }

    fn invalid(&self, operation: &'static str) -> Error {
        Error::InvalidTransition { state: self.name(), operation }
    }

    pub fn log_in(&self) -> Result<GameState> {
        match self {
            Self::NotLoggedIn | Self::InvalidCredentials | Self::Error { .. } => Ok(Self::LoggedIn),
            _ => Err(self.invalid("log_in")),
        }
    }

    pub fn invalid_credentials(&self) -> Result<GameState> {
        match self {
            Self::LoggedIn => Ok(Self::InvalidCredentials),
            _ => Err(self.invalid("invalid_credentials")),
        }
    }

    pub fn wait_for_connection(&self) -> Result<GameState> {
        match self {
            Self::LoggedIn | Self::IncorrectConnectionSecret => Ok(Self::WaitingForConnection),
            _ => Err(self.invalid("wait_for_connection")),
        }
    }

    pub fn connected(&self) -> Result<GameState> {
        match self {
            Self::WaitingForConnection => Ok(Self::ConnectedToGame),
            _ => Err(self.invalid("connected")),
        }
    }

    pub fn incorrect_connection_secret(&self) -> Result<GameState> {
        match self {
            Self::WaitingForConnection => Ok(Self::IncorrectConnectionSecret),
            _ => Err(self.invalid("incorrect_connection_secret")),
        }
    }

    pub fn enter_game(&self, rider_id: u32, activity_id: u64) -> Result<GameState> {
        match (self, self.activity()) {
            (Self::ConnectedToGame, _) => Ok(Self::InGame { ids: ActivityIds { rider_id, activity_id } }),
            (_, Some(ids)) if ids.activity_id == activity_id => Ok(self.clone()),
            _ => Err(self.invalid("enter_game")),
        }
    }

    pub fn leave_game(&self) -> Result<GameState> {
        if self.is_in_game() || matches!(self, Self::ConnectedToGame) {
            Ok(Self::ConnectedToGame)
        } else {
            Err(self.invalid("leave_game"))
        }
    }

    pub fn fail(&self, message: impl Into<String>) -> GameState {
        Self::Error { message: message.into() }
    }

    pub fn log_out(&self) -> GameState {
        Self::NotLoggedIn
    }

    /// Resolve a new rider position against the segment graph and the route
    ///
    /// The route cursor is advanced when the rider enters the starting or
    /// next segment, and completed when the rider leaves the last segment
    /// through its exit junction.
    pub fn update_position(
        &self,
        position: TrackPoint,
        segments: &[Arc<Segment>],
        route: Option<&mut PlannedRoute>,
    ) -> Result<GameState> {
        if matches!(self, Self::CompletedRoute { .. }) {
            return Ok(self.clone());
        }
        let ids = self.activity().ok_or_else(|| self.invalid("update_position"))?;

        let previous = self.fix();
        let reference_altitude = previous.map_or(position.altitude, |f| f.point.altitude);
        let Some((segment, point)) = matcher::find_closest(segments, &position, Some(reference_altitude))
        else {
            return Ok(Self::Positioned { ids, position, elapsed: self.elapsed() });
        };
        let fix = SegmentFix::following(previous, self.elapsed(), segment, point);

        let Some(route) = route else {
            return Ok(self.off_route(ids, position, fix, None));
        };

        if !route.has_started() {
            if segment.id == route.starting_segment_id() {
                route.entered_segment(&segment.id)?;
                return Ok(Self::OnRoute {
                    ids,
                    position,
                    fix,
                    route: route.progress(),
                    turns: TurnReconciler::new(),
                });
            }
        } else if !route.has_completed() {
            if route.current_segment_id() == Some(segment.id.as_str()) {
                let progress = route.progress();
                return Ok(match self {
                    Self::UpcomingTurn { fix: prev, directions, .. } if prev.segment.id == segment.id => {
                        Self::UpcomingTurn { ids, position, fix, route: progress, directions: *directions }
                    }
                    Self::OnRoute { fix: prev, turns, .. } if prev.segment.id == segment.id => {
                        Self::OnRoute { ids, position, fix, route: progress, turns: *turns }
                    }
                    _ => Self::OnRoute { ids, position, fix, route: progress, turns: TurnReconciler::new() },
                });
            }

            if route.next_segment_id() == Some(segment.id.as_str()) {
                route.entered_segment(&segment.id)?;
                return Ok(Self::OnRoute {
                    ids,
                    position,
                    fix,
                    route: route.progress(),
                    turns: TurnReconciler::new(),
                });
            }

            if route.is_on_last_segment() {
                return Ok(if exits_last_segment(route, segments, &segment.id) {
                    route.complete();
                    Self::CompletedRoute { ids, position, fix, route: route.progress() }
                } else {
                    Self::LostRouteLock { ids, position, fix, route: route.progress() }
                });
            }
        }

        Ok(self.off_route(ids, position, fix, Some(route.progress())))
    }

    fn off_route(
        &self,
        ids: ActivityIds,
        position: TrackPoint,
        fix: SegmentFix,
        progress: Option<RouteProgress>,
    ) -> GameState {
        if self.holds_route_lock() {
            if let Some(last) = self.position() {
                if last.distance_to(&position) < ROUTE_LOCK_RADIUS_METERS {
                    return self.clone();
                }
            }
        }

        match (self, progress.or_else(|| self.route().cloned())) {
            (Self::OnRoute { .. } | Self::UpcomingTurn { .. } | Self::LostRouteLock { .. }, Some(route)) => {
                Self::LostRouteLock { ids, position, fix, route }
            }
            _ => Self::OnSegment { ids, position, fix },
        }
    }

    /// Feed a command type announced by the game
    pub fn turn_command_available(&self, command_type: &str) -> Result<GameState> {
        if !self.is_in_game() {
            return Err(self.invalid("turn_command_available"));
        }
        let Some(direction) = TurnDirection::from_command_type(command_type) else {
            return Ok(self.clone());
        };

        match self {
            Self::OnRoute { ids, position, fix, route, turns } => {
                let turns = turns.observe(direction);
                let exit = match fix.direction {
                    SegmentDirection::Unknown => route.current_direction,
                    known => known,
                };
                let edges = fix.segment.next_segments(exit).len();

                Ok(match turns.resolve(edges) {
                    Some(directions) => Self::UpcomingTurn {
                        ids: *ids,
                        position: position.clone(),
                        fix: fix.clone(),
                        route: route.clone(),
                        directions,
                    },
                    None => Self::OnRoute {
                        ids: *ids,
                        position: position.clone(),
                        fix: fix.clone(),
                        route: route.clone(),
                        turns,
                    },
                })
            }
            _ => Ok(self.clone()),
        }
    }
}

/// Whether `segment_id` is reachable from the exit junction of the route's last segment
fn exits_last_segment(route: &PlannedRoute, segments: &[Arc<Segment>], segment_id: &str) -> bool {
    let Some(entry) = route.current_entry() else {
        return false;
    };
    if entry.next_segment_id.as_deref().is_some_and(|declared| declared != segment_id) {
        return false;
    }
    let Some(last) = segments.iter().find(|s| s.id == entry.segment_id) else {
        return false;
    };

    let reaches = |direction| last.next_segments(direction).iter().any(|t| t.segment_id == segment_id);
    match entry.direction {
        SegmentDirection::Unknown => reaches(SegmentDirection::AtoB) || reaches(SegmentDirection::BtoA),
        known => reaches(known),
    }
}

impl std::fmt::Display for GameState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.fix() {
            Some(fix) => write!(f, "{} ({})", self.name(), fix.segment.id),
            None => f.write_str(self.name()),
        }
    }
}
