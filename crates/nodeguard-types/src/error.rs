use thiserror::Error;

#[derive(Error, Debug)]
pub enum GuardError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Update error: {0}")]
    Update(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Invalid lifecycle transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GuardError {
    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

impl From<std::io::Error> for GuardError {
    fn from(e: std::io::Error) -> Self {
        GuardError::Io(e.to_string())
    }
}

pub type GuardResult<T> = Result<T, GuardError>;
