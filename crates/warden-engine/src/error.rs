//! Pipeline error types.

use warden_model::PlayerId;

/// Errors surfaced when submitting events to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// The player disconnected; no further events are dispatched for them.
    #[error("player {0} is disconnected")]
    Disconnected(PlayerId),

    /// The target worker's queue is full; the event was not enqueued.
    #[error("worker queue full, event for player {0} dropped")]
    QueueFull(PlayerId),

    /// The pipeline has shut down.
    #[error("pipeline is shut down")]
    ShutDown,
}
