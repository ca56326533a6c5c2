use thiserror::Error;

#[derive(Error, Debug)]
pub enum TypesError {
    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("invalid namespace id: {0}")]
    InvalidNamespaceId(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid hash: {0}")]
    InvalidHash(#[from] atlasd_hash::HashError),
}

pub type Result<T> = std::result::Result<T, TypesError>;
