use thiserror::Error;

#[derive(Error, Debug)]
pub enum SkillSwapError {
    #[error("WebSocket connection error: {0}")]
    WebSocketError(#[from] fastwebsockets::WebSocketError),

    #[error("TLS error: {0}")]
    TlsError(#[from] rustls::Error),

    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Connection timeout")]
    Timeout,

    #[error("WebSocket handshake failed: {reason}")]
    HandshakeFailed { reason: String },

    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    #[error("Maximum reconnection attempts exceeded")]
    MaxReconnectsExceeded,

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    #[error("Malformed {event} payload: {reason}")]
    MalformedPayload { event: String, reason: String },

    #[error("Unexpected HTTP status {status} from {endpoint}")]
    UnexpectedStatus { endpoint: String, status: u16 },

    #[error("Event loop is no longer running")]
    LoopClosed,

    #[error("Metrics server error: {0}")]
    MetricsError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, SkillSwapError>;
