//! Cache error types.

use thiserror::Error;

use crate::events::EventKind;

/// Failures local to a single event.
///
/// None of these stop the pipeline; the event is dropped and the next one is
/// applied normally.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The payload could not be decoded or lacked an id.
    #[error("malformed {event} payload: {source}")]
    MalformedPayload {
        event: EventKind,
        #[source]
        source: serde_json::Error,
    },

    /// The invalidation queue consumer is gone.
    #[error("invalidation channel closed")]
    FeedbackClosed,
}

impl CacheError {
    pub(crate) fn malformed(event: EventKind) -> impl FnOnce(serde_json::Error) -> Self {
        move |source| Self::MalformedPayload { event, source }
    }
}

pub type Result<T, E = CacheError> = std::result::Result<T, E>;
