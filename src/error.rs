use thiserror::Error;

/// Error type for the resource isolation core.
///
/// Admission and quota checks return plain `bool`/`Option` where the
/// data model treats "denied" as an expected outcome, not a failure;
/// `CoreError` is reserved for operations that can genuinely fail.
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    #[error("tenant already exists: {0}")]
    TenantExists(String),

    #[error("unknown tenant: {0}")]
    TenantUnknown(String),

    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("cgroup io error: {0}")]
    CgroupIo(String),

    #[error("component used before initialize(): {0}")]
    Uninitialized(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
