use std::future::Future;
use std::net::SocketAddr;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::client::handler::HandlerInput;
use crate::client::shutdown::Shutdown;
use crate::codec::{FrameDecoder, GameMessage};
use crate::error::{Error, Result};

const READ_CHUNK: usize = 4096;

/// Source of raw bytes from the game
pub trait ByteSource: Send {
    /// Whatever bytes are available, possibly none. `Ok(None)` on graceful close.
    fn receive_available_bytes(&mut self) -> impl Future<Output = Result<Option<Bytes>>> + Send;
}

/// Byte source over any async reader
pub struct StreamSource<R> {
    reader: R,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin + Send> StreamSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: BytesMut::with_capacity(READ_CHUNK),
        }
    }
}

impl<R: AsyncRead + Unpin + Send> ByteSource for StreamSource<R> {
    async fn receive_available_bytes(&mut self) -> Result<Option<Bytes>> {
        self.buf.reserve(READ_CHUNK);
        let n = self.reader.read_buf(&mut self.buf).await?;
        if n == 0 {
            return Ok(None);
        }
        trace!("Received {} bytes", n);
        Ok(Some(self.buf.split().freeze()))
    }
}

/// Connect to the game's TCP command channel
pub async fn connect(addr: SocketAddr) -> Result<(StreamSource<OwnedReadHalf>, OwnedWriteHalf)> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    info!("Connected to {}", addr);
    let (reader, writer) = stream.into_split();
    Ok((StreamSource::new(reader), writer))
}

/// Pump bytes from `source` into the handler queue until close or shutdown
///
/// Payloads that fail to parse are logged and dropped. A stream that closes
/// in the middle of a frame is reported as [`Error::MalformedStream`].
pub async fn run_receive_loop<S: ByteSource>(
    mut source: S,
    queue: mpsc::Sender<HandlerInput>,
    mut shutdown: Shutdown,
) -> Result<()> {
    let mut decoder = FrameDecoder::new();

    loop {
        let received = tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Receive loop shutting down");
                return Ok(());
            }
            received = source.receive_available_bytes() => received?,
        };

        let Some(bytes) = received else {
            info!("Byte source closed");
            return decoder.finish();
        };

        decoder.push(&bytes);
        while let Some(frame) = decoder.next_frame() {
            match GameMessage::parse(&frame) {
                Ok(message) => {
                    trace!("Received {:?}", message);
                    queue
                        .send(HandlerInput::Message(message))
                        .await
                        .map_err(|_| Error::QueueClosed)?;
                }
                Err(e) => warn!("Dropping payload of {} bytes: {}", frame.len(), e),
            }
        }
    }
}
