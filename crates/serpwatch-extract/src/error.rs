use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    /// Object-store write or read failure. Aborts the extraction before any
    /// observation exists; the raw artifact is retained for reprocessing.
    #[error("object store I/O error for {path}: {source}")]
    Store {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
