use std::path::PathBuf;
use thiserror::Error;

/// Reasons a raw export table is rejected by the block parser.
#[derive(Error, Debug)]
pub enum FormatError {
    /// No row in the identification column looked like a driver header.
    #[error("Format not recognized: no driver header rows found in column '{column}'")]
    NoHeaderRows { column: String },

    /// The configured identification column is not present in the table.
    #[error("Identification column '{0}' not found")]
    MissingIdColumn(String),

    /// A header row matched the pattern but did not split into three parts.
    #[error("Malformed driver header at row {row}: '{text}'")]
    MalformedHeader { row: usize, text: String },

    /// The configured header pattern is not a valid regular expression.
    #[error("Invalid header pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// All errors produced by the timing engine.
#[derive(Error, Debug)]
pub enum TimingError {
    /// The export file could not be segmented into driver blocks.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// No stored session exists under the given key.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// No stored reference profile exists under the given name.
    #[error("Reference profile not found: {0}")]
    ReferenceNotFound(String),

    /// The driver has no records in the session.
    #[error("Driver not found: {0}")]
    DriverNotFound(String),

    /// A record's sector layout does not match the session schema.
    #[error("Sector count mismatch: session has {expected}, record has {found}")]
    SchemaMismatch { expected: usize, found: usize },

    /// A session type label is not one of the official sessions.
    #[error("Unknown session type: {0}")]
    UnknownSessionType(String),

    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CSV reader rejected the input.
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the timing crates.
pub type Result<T> = std::result::Result<T, TimingError>;
