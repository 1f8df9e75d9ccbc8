pub mod sink;
pub mod transport;

pub use sink::{run_command_writer, ChannelCommandSink, CommandSink, RecordingCommandSink};
pub use transport::{connect, run_receive_loop, ByteSource, StreamSource};
