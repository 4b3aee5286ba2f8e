#![forbid(unsafe_code)]

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AsarError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid archive: {0}")]
    Format(String),

    #[error("bad header magic: expected 4, got {0}")]
    BadMagic(u32),

    #[error("invalid index json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("path is outside input dir: {0}")]
    Outside(String),
}

impl AsarError {
    /// True for errors caused by the archive/index contents rather than by I/O.
    pub fn is_format(&self) -> bool {
        !matches!(self, AsarError::Io(_))
    }
}

pub type AsarResult<T> = Result<T, AsarError>;
