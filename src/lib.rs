//! Route Pilot
//!
//! Companion navigation engine for a cycling game. Decodes the game's
//! length-prefixed message stream, matches rider positions against a segment
//! graph, tracks progress along a planned route and sends the turn command
//! for each junction.

pub mod client;
pub mod codec;
pub mod error;
pub mod protocol;
pub mod state;

pub use error::{Error, Result};
pub use client::{
    Dispatcher, Event, EventKind, HandlerInput, LifecycleEvent,
    Session, SessionBuilder, SessionConfig,
};
pub use codec::{FrameDecoder, GameMessage, OutboundCommand};
pub use protocol::{ByteSource, CommandSink, StreamSource};
pub use state::{
    GameState, PlannedRoute, Segment, SegmentStore, TrackPoint,
    TurnDirection, TurnDirections, WorldId, SportType,
};
