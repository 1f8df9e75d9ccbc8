pub mod game_state;
pub mod matcher;
pub mod route;
pub mod segment;
pub mod store;
pub mod track_point;
pub mod turns;
pub mod world;

pub use game_state::{ActivityIds, ElapsedMetrics, GameState, SegmentFix, ROUTE_LOCK_RADIUS_METERS};
pub use matcher::find_closest;
pub use route::{PlannedRoute, RouteProgress, SegmentSequenceEntry, SequenceType};
pub use segment::{Segment, SegmentDirection, SegmentType, Turn, TurnDirection};
pub use store::{JsonSegmentStore, MemorySegmentStore, SegmentStore};
pub use track_point::{TrackPoint, ALTITUDE_TOLERANCE, CLOSE_DISTANCE_METERS};
pub use turns::{TurnDirections, TurnReconciler};
pub use world::{SportType, WorldId};
