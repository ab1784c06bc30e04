use std::any::Any;

use thiserror::Error;

/// The terminal error of a [`Pipeline`](crate::Pipeline).
///
/// A pipeline ends in exactly one terminal state. `Pipeline::error()` returns
/// `None` after a successful run, or one of these variants after an aborted
/// one. The first error to reach `Pipeline::cancel` wins; later errors are
/// dropped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    /// The pipeline was canceled explicitly through `Pipeline::cancel`.
    #[error("pipeline canceled: {0}")]
    Canceled(String),

    /// The external cancellation context the pipeline was created with ended.
    #[error("pipeline context canceled")]
    ContextCanceled,

    /// A worker task panicked. Carries the panic message; the panic itself is
    /// contained and never crosses the library boundary.
    #[error("worker panicked: {0}")]
    WorkerPanic(String),
}

impl PipelineError {
    /// Convenience constructor for explicit cancellation.
    pub fn canceled(reason: impl Into<String>) -> Self {
        PipelineError::Canceled(reason.into())
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        PipelineError::WorkerPanic(panic_message(&*payload))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "opaque panic payload".to_owned()
    }
}
