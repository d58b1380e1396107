use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Empty import: {0} contains no data rows")]
    EmptyImport(String),

    #[error("Missing required column '{column}' in {table}")]
    MissingColumn { table: String, column: String },

    #[error("Invalid fiscal quarter {0}: must be between 1 and 4")]
    InvalidQuarter(u32),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
