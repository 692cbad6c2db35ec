use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server rejected the token; the caller should sign in again.
    #[error("Not signed in")]
    Unauthorized,

    #[error("{message} ({status})")]
    Api { status: u16, message: String },

    #[error("Network error")]
    Network(#[source] reqwest::Error),

    #[error("WebSocket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid server URL: {0}")]
    Url(String),

    #[error("Notification socket is closed")]
    SocketClosed,
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Network(e)
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
