use std::io;
use thiserror::Error;
use vbstudio_core::{CompilerError, ErrorCode};

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Failures at the [`Compiler`](crate::Compiler) boundary.
///
/// None of these reach the caller as an `Err` from `compile`; they are
/// folded into a failed result with a single diagnostic.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to start worker threads: {0}")]
    WorkerSpawn(#[from] io::Error),

    #[error("compiler has been disposed")]
    Disposed,

    #[error("compilation panicked: {0}")]
    Panicked(String),
}

impl PipelineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            PipelineError::Disposed => ErrorCode::Disposed,
            PipelineError::WorkerSpawn(_) | PipelineError::Panicked(_) => {
                ErrorCode::CompilationFailed
            }
        }
    }
}

impl From<&PipelineError> for CompilerError {
    fn from(error: &PipelineError) -> Self {
        CompilerError::unpositioned(error.code(), error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes() {
        let spawn = PipelineError::from(io::Error::other("no threads"));
        assert_eq!(spawn.code(), ErrorCode::CompilationFailed);
        assert!(spawn.to_string().contains("no threads"));

        let diagnostic = CompilerError::from(&PipelineError::Disposed);
        assert_eq!(diagnostic.code, ErrorCode::Disposed);
        assert_eq!(diagnostic.line, 0);
    }
}
