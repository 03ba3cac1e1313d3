use thiserror::Error;

/// Main error type for kgserve
#[derive(Error, Debug)]
pub enum KgserveError {
    /// Graph database transport errors (connection refused, dropped, I/O)
    #[error("Graph database error: {0}")]
    Graph(#[from] redis::RedisError),

    /// Query rejected by the graph database (syntax, unknown graph, ...)
    #[error("Graph query error: {0}")]
    Query(String),

    /// HTTP client errors (model provider, source fetching)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Model provider returned an error or an unusable completion
    #[error("Model error: {0}")]
    Model(String),

    /// Source could not be parsed or loaded
    #[error("Source error: {0}")]
    Source(String),

    /// Ontology could not be inferred or is unusable
    #[error("Ontology error: {0}")]
    Ontology(String),

    /// No graph with the requested name exists
    #[error("Graph not found: {0}")]
    GraphNotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File system / socket I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenient Result type using KgserveError
pub type Result<T> = std::result::Result<T, KgserveError>;
