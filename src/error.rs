//! Error types for the case router.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Rule cache errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The cached payload could not be encoded or decoded.
    #[error("Cached payload is malformed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache {name} unavailable: {reason}")]
    Unavailable { name: String, reason: String },
}

/// Result type alias for the router.
pub type Result<T> = std::result::Result<T, Error>;
