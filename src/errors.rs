use thiserror::Error;

pub type StreamResult<T> = std::result::Result<T, StreamError>;

/// Errors raised by the event-stream connection side of the engine.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("invalid stream url: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type SnapshotResult<T> = std::result::Result<T, SnapshotError>;

/// Errors raised by snapshot fetches.
///
/// `Unauthorized` is the only variant the engine acts on structurally (it
/// forces a session reset); everything else is logged and the previous
/// snapshot stays visible.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("invalid snapshot url: {0}")]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SnapshotError {
    pub(crate) fn from_status(status: u16, body: String) -> Self {
        if status == 401 {
            SnapshotError::Unauthorized
        } else {
            SnapshotError::Http { status, body }
        }
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Errors returned by the high level engine API.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("invalid config: {field}: {why}")]
    InvalidConfig {
        field: &'static str,
        why: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_401_maps_to_unauthorized() {
        assert!(matches!(
            SnapshotError::from_status(401, String::new()),
            SnapshotError::Unauthorized
        ));
    }

    #[test]
    fn other_statuses_stay_generic() {
        match SnapshotError::from_status(503, "upstream down".to_string()) {
            SnapshotError::Http { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "upstream down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
