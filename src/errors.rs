use thiserror::Error;

pub type GenericError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum NearMeError {
    #[error("backend query failed: backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("backend query failed: backend rejected the query with status {status}: {detail}")]
    BackendRejected { status: u16, detail: String },
    #[error("backend query failed: malformed response: {0}")]
    MalformedResponse(String),
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),
    #[error("invalid search radius: {0} km")]
    InvalidRadius(f64),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("missing required argument `{0}`")]
    MissingArgument(&'static str),
    #[error("tool not found: {0}")]
    ToolNotFound(String),
    #[error("invalid bearer token")]
    InvalidBearerToken,
}

impl NearMeError {
    /// True for the fatal conditions raised while talking to the geodata backend.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            NearMeError::BackendUnavailable(_)
                | NearMeError::BackendRejected { .. }
                | NearMeError::MalformedResponse(_)
        )
    }
}
