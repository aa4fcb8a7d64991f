//! Worker pool dispatch.
//!
//! Units are compiled on a fixed set of OS threads that share nothing with
//! the coordinator. Requests and replies are [`WorkerMessage`]s correlated
//! by id, each request with its own deadline.

mod message;
mod pool;

pub use message::{CompileUnitPayload, ErrorPayload, MessageType, WorkerMessage, message_id};
pub use pool::{PendingCompilation, UnitHandler, WorkerPool, batch_size};

use std::time::Duration;
use thiserror::Error;
use vbstudio_core::{CompilerError, ErrorCode};

/// Why a dispatched unit produced no result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("unit '{unit}' did not complete within {timeout:?}")]
    WorkerTimeout { unit: String, timeout: Duration },

    #[error("worker pool has been disposed")]
    Disposed,

    #[error("worker failed on unit '{unit}': {message}")]
    WorkerFailed { unit: String, message: String },

    #[error("worker channel closed while compiling '{unit}'")]
    ChannelClosed { unit: String },
}

impl DispatchError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DispatchError::WorkerTimeout { .. } => ErrorCode::WorkerTimeout,
            DispatchError::Disposed => ErrorCode::Disposed,
            DispatchError::WorkerFailed { .. } | DispatchError::ChannelClosed { .. } => {
                ErrorCode::WorkerFailed
            }
        }
    }
}

impl From<&DispatchError> for CompilerError {
    fn from(error: &DispatchError) -> Self {
        CompilerError::unpositioned(error.code(), error.to_string())
    }
}
