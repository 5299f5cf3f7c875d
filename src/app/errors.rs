use crate::semantic::CacheError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("catalog cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("unexpected error: {0:?}")]
    Other(#[from] anyhow::Error),
}
