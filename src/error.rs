//! Error types carried on a pipeline's per-element error channel.

use std::error::Error as StdError;

use thiserror::Error;

/// Boxed error raised by a fallible stage or source.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result alias used by every terminal operation.
pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

/// A condition raised while pulling one element through a pipeline.
///
/// Errors are element-scoped: a failure pulling one element does not stop
/// the stages from producing the next one. Unless a `catch` stage resolves
/// it, the error aborts the terminal operation that drove the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Raised by a user function (`try_map`) or a fallible source.
    #[error(transparent)]
    Element(BoxError),

    /// A parallel worker panicked while mapping an element.
    #[error("parallel worker panicked: {message}")]
    WorkerPanicked { message: String },

    /// The worker pool could not be started.
    #[error("worker pool unavailable: {0}")]
    PoolUnavailable(String),
}

impl PipelineError {
    /// Wrap any error as an element error.
    pub fn element(err: impl Into<BoxError>) -> Self {
        PipelineError::Element(err.into())
    }

    /// Returns true if this is an element error whose source is a `K`.
    pub fn is<K: StdError + 'static>(&self) -> bool {
        match self {
            PipelineError::Element(inner) => inner.is::<K>(),
            _ => false,
        }
    }

    /// Extract the element error as a `K`, handing `self` back on mismatch.
    pub fn downcast<K: StdError + 'static>(self) -> std::result::Result<K, Self> {
        match self {
            PipelineError::Element(inner) => match inner.downcast::<K>() {
                Ok(k) => Ok(*k),
                Err(inner) => Err(PipelineError::Element(inner)),
            },
            other => Err(other),
        }
    }
}
