use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("event warehouse rejected query: {0}")]
    Warehouse(String),

    #[error("no score configured for contribution type '{0}'")]
    ScoreNotFound(String),

    #[error("user with github id {0} is not tracked")]
    UserNotTracked(i64),

    #[error("malformed event payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
