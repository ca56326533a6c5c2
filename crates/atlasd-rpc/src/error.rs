use thiserror::Error;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("db error: {0}")]
    Db(#[from] atlasd_db::DbError),

    #[error("atlas error: {0}")]
    Atlas(#[from] atlasd_atlas::AtlasError),

    #[error("chain error: {0}")]
    Chain(#[from] atlasd_chain::ChainError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        RpcError::InvalidParams(err.to_string())
    }
}

impl From<std::io::Error> for RpcError {
    fn from(err: std::io::Error) -> Self {
        RpcError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
