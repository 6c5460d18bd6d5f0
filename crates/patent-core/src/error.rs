/// Everything that can go wrong while executing a function call.
///
/// None of these are fatal: the executor turns them into `success: false`
/// results the model can read back to the user.
#[derive(Debug, thiserror::Error)]
pub enum PatentError {
    #[error("No active patent session found")]
    NoActiveSession,
    #[error("Patent document not found: {0}")]
    NotFound(String),
    #[error("Storage error while {context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Unknown function: {0}")]
    UnknownOperation(String),
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("duplicate")]
    DuplicateSuppressed,
}

impl PatentError {
    pub(crate) fn storage(context: impl Into<String>, source: std::io::Error) -> Self {
        PatentError::Storage {
            context: context.into(),
            source,
        }
    }
}
