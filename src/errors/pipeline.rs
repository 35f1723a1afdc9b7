use thiserror::Error;

/// Error taxonomy for the pipeline workers (Sampler, Preprocessor, OCR worker).
///
/// The variant a worker returns decides what the job queue does with the
/// job: `Transient` and `BadInput` are both nack-and-retry from the queue's
/// point of view, but `BadInput` is logged at `warn` and expected to skip
/// the offending frame rather than poison the whole job, while `Engine`
/// short-circuits straight to `failed` (see `JobStore::nack`).
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Network blip, storage hiccup, DB contention — worth retrying as-is.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Malformed frame, zero-byte blob, or similar — skip this unit, don't fail the job.
    #[error("bad input: {0}")]
    BadInput(String),

    /// External engine (OCR, scene detector) is broken in a way retrying won't fix.
    #[error("engine failure: {0}")]
    Engine(String),

    /// A data invariant broke in a way that should never happen in normal operation.
    #[error("invariant violation: {0}")]
    Invariant(String),
}

impl PipelineError {
    /// Whether the job queue should requeue (subject to `JOB_MAX_RETRIES`) or
    /// fail immediately without counting against the retry budget.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::Engine(_))
    }
}

impl From<sqlx::Error> for PipelineError {
    fn from(e: sqlx::Error) -> Self {
        PipelineError::Transient(e.to_string())
    }
}

impl From<anyhow::Error> for PipelineError {
    fn from(e: anyhow::Error) -> Self {
        PipelineError::Transient(e.to_string())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        PipelineError::Transient(e.to_string())
    }
}
