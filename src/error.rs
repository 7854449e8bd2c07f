use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Failures of a locally-initiated protocol response.
///
/// These are returned synchronously to the caller so they can be shown
/// inline. Nothing is transmitted when one of them is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResponseError {
    #[error("not connected")]
    NotConnected,

    #[error("validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("no pending request for {key}")]
    NoPendingRequest { key: String },

    #[error("failed to transmit response: {0}")]
    Transmit(String),
}

impl ResponseError {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        Self::ValidationFailed {
            reason: reason.into(),
        }
    }
}

/// Handshake failures reported by a [`Connector`](crate::port::Connector).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// The venue rejected the credential. Reconnecting with it is pointless.
    #[error("authentication rejected: {0}")]
    AuthExpired(String),

    #[error("transient network failure: {0}")]
    Transient(String),
}

impl ConnectError {
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::AuthExpired(_))
    }
}

/// REST API errors.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("authentication failed")]
    AuthExpired,

    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Response(#[from] ResponseError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("connection error: {0}")]
    Connection(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(Box::new(err))
    }
}
