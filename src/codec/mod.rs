pub mod reader;
pub mod writer;
pub mod frame;
pub mod message;
pub mod command;

pub use reader::BinaryReader;
pub use writer::BinaryWriter;
pub use frame::{FrameDecoder, encode_frame, MAX_PAYLOAD_LEN};
pub use message::{GameMessage, MessageTag, PAYLOAD_VERSION};
pub use command::OutboundCommand;
