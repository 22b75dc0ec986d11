#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[cfg(feature = "graphql")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{operation} failed: {detail}")]
    GraphQl {
        operation: &'static str,
        detail: String,
    },
    #[error("{0}: response carried no data")]
    MissingData(&'static str),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid user vote: {0}")]
    InvalidUserVote(String),
}

impl From<crate::session::StoreError> for Error {
    fn from(e: crate::session::StoreError) -> Self {
        Self::Storage(e.to_string())
    }
}
