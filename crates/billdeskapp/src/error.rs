use thiserror::Error;

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// The remote counter backend failed (transport, auth, exhausted retries).
    #[error("Remote counter error: {0}")]
    Remote(String),

    /// A remote transaction was aborted by a concurrent writer and may be retried.
    #[error("Remote transaction conflict: {0}")]
    RemoteConflict(String),

    #[error("Unknown document type: {0}")]
    UnknownDocumentType(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: i64 },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BillingError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, BillingError::RemoteConflict(_))
    }
}

pub type Result<T> = std::result::Result<T, BillingError>;

/// Raised when a project archive cannot be imported.
///
/// Every variant except [`ImportError::Apply`] is produced before the import
/// touches the database or the assets directory.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Archive is not a readable zip file: {0}")]
    InvalidArchive(#[source] zip::result::ZipError),

    #[error("Archive missing required file: {0}")]
    MissingMember(String),

    #[error("Archive member {member} is not valid JSON: {source}")]
    InvalidJson {
        member: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported project schema version: {found}. Expected {expected}.")]
    UnsupportedSchema { found: String, expected: u32 },

    #[error("Invalid project data: {0}")]
    InvalidPayload(String),

    #[error("Failed to read archive member {member}: {source}")]
    Read {
        member: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to stage archive assets: {0}")]
    Staging(#[source] std::io::Error),

    #[error("Failed to import archive: {0}")]
    Apply(#[source] BillingError),
}
