pub mod events;
pub mod handler;
pub mod navigator;
pub mod session;
pub mod shutdown;

pub use events::{Dispatcher, Event, EventKind, Subscription};
pub use handler::{HandlerInput, LifecycleEvent, MessageHandler};
pub use navigator::{Navigator, NAVIGATOR_EVENTS};
pub use session::{ConnectionRelay, Session, SessionBuilder, SessionConfig};
pub use shutdown::{Shutdown, ShutdownTrigger};
