use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("entity store error: {0}")]
    Store(#[from] anyhow::Error),

    #[error("upload failed for scene {scene}: {source}")]
    Upload {
        scene: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("unexpected input: {0}")]
    Unexpected(String),
}

pub type Result<T> = std::result::Result<T, ImportError>;
