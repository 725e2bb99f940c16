use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeskError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("File contains no rows")]
    EmptyFile,

    #[error("Required column '{field}' is not mapped")]
    MissingRequiredMapping { field: String },

    #[error("Column '{field}' mapped to index {index}, but the file has {columns} columns")]
    MappingOutOfRange { field: String, index: usize, columns: usize },

    #[error("{what} '{id}' not found")]
    NotFound { what: &'static str, id: String },

    #[error("Fitness platform error: {0}")]
    Platform(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type DeskResult<T> = Result<T, DeskError>;
