use tokio::time::error::Elapsed;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
#[error("link error")]
pub enum AppError {
    /// general errors
    #[error("illegal state: {0}")]
    IllegalStateError(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("I/O error: {0}")]
    DetailedIoError(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("channel send error: {0}")]
    ChannelSendError(String),

    #[error("accept error: {0}")]
    Accept(String),

    /// wire-level errors
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// no bytes read within the heartbeat window
    #[error("read stalled: {0}")]
    Stalled(#[from] Elapsed),

    /// marker error
    Incomplete,
}
