use thiserror::Error;

#[derive(Error, Debug)]
pub enum AtlasError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("db error: {0}")]
    Db(#[from] atlasd_db::DbError),

    #[error("hash error: {0}")]
    Hash(#[from] atlasd_hash::HashError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid host:port: {0}")]
    InvalidHostPort(String),

    #[error("zonefile too large: {0} bytes")]
    ZonefileTooLarge(usize),
}

impl From<reqwest::Error> for AtlasError {
    fn from(err: reqwest::Error) -> Self {
        AtlasError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AtlasError>;
