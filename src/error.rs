use thiserror::Error;

/// Main error type for the document store and dead-letter recovery engines
#[derive(Error, Debug)]
pub enum RedriveError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Conversion error: {0}")]
    Conversion(String),

    // Document store errors
    #[error("Document {id} not found in collection {collection}")]
    DocumentNotFound { collection: String, id: String },

    #[error("Document {id} already exists in collection {collection}")]
    DocumentAlreadyExists { collection: String, id: String },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    // Dead-letter errors
    #[error("Dead letter {0} not found")]
    DeadLetterNotFound(String),

    // Channel errors
    #[error("Channel publish failed: {0}")]
    Publish(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for RedriveError
pub type Result<T> = std::result::Result<T, RedriveError>;
