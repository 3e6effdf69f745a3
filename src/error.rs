use thiserror::Error;

pub type Result<O, E = IngestError> = std::result::Result<O, E>;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("sqlite failure: '{0}'")]
    SqliteError(#[from] rusqlite::Error),

    #[error("sqlite migration failure: '{0}'")]
    SqliteMigrationError(#[from] rusqlite_migration::Error),

    // Can't use #[from]: winnow's ContextError isn't `std::error::Error`.
    #[error("parser error: '{0}'")]
    ParserError(winnow::error::ContextError),

    #[error("io error: '{0}'")]
    IOError(#[from] std::io::Error),

    #[error("csv error: '{0}'")]
    CsvError(#[from] csv::Error),

    #[error("json error: '{0}'")]
    JsonError(#[from] serde_json::Error),

    #[error("malformed filename '{0}': {1}")]
    MalformedFilename(String, String),

    /// Duplicate record/level with mismatched label, zero-width range,
    /// relation key reasserted mid-block without an intervening emit, or any
    /// other fatal condition in a DCF file.
    #[error("malformed dictionary: {0}")]
    DcfFatal(String),

    /// A record's field-descriptor list changed length partway through a DAT
    /// file.
    #[error("field count drift in record '{record}': expected {expected} fields, found {found}")]
    DatFieldCountDrift {
        record: String,
        expected: usize,
        found: usize,
    },

    #[error("encoding detection failed for '{0}'")]
    EncodingDetectionFailed(String),
}

impl From<winnow::error::ContextError> for IngestError {
    fn from(e: winnow::error::ContextError) -> Self {
        IngestError::ParserError(e)
    }
}
