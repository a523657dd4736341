use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConditionalError {
    #[error("conditional parse error at byte {position}: {message}")]
    Parse { position: usize, message: String },
    #[error("conditional evaluation failed: {message}")]
    Eval { message: String },
}

impl ConditionalError {
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    pub fn eval(message: impl Into<String>) -> Self {
        Self::Eval {
            message: message.into(),
        }
    }
}
