#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid transition: {operation} is not allowed in state {state}")]
    InvalidTransition { state: &'static str, operation: &'static str },

    #[error("unexpected segment {actual}: expected {}", expected.as_deref().unwrap_or("none"))]
    UnexpectedSegment { expected: Option<String>, actual: String },

    #[error("route already completed")]
    RouteCompleted,

    #[error("invalid route: {0}")]
    InvalidRoute(String),

    #[error("segment not found: {0}")]
    SegmentNotFound(String),

    #[error("malformed stream: {remaining} undecoded bytes left at end of stream")]
    MalformedStream { remaining: usize },

    #[error("frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("unknown message tag: {0:#04x}")]
    UnknownMessageTag(u8),

    #[error("unsupported payload version {version} for tag {tag:#04x}")]
    UnsupportedVersion { tag: u8, version: u8 },

    #[error("unexpected end of data")]
    UnexpectedEof,

    #[error("string too long: {len} bytes (max {max})")]
    StringTooLong { len: usize, max: usize },

    #[error("queue closed")]
    QueueClosed,

    #[error("cancelled")]
    Cancelled,

    #[error("json error: {0}")]
    Json(String),

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
