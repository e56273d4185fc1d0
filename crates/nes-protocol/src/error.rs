use thiserror::Error;

/// Reasons an inbound message payload failed to decode.
///
/// The callback router treats every variant as a silent drop; the distinction
/// exists for logging and for tests that pin down the decode rules.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("payload has no \"type\" tag")]
    MissingTag,

    #[error("unrecognized message tag {0:?}")]
    UnknownTag(String),

    #[error("{tag:?} message is missing its data field")]
    MissingData { tag: &'static str },

    #[error("{tag:?} message data is not {expected}")]
    WrongShape {
        tag: &'static str,
        expected: &'static str,
    },

    #[error("data field of {len} bytes exceeds the payload cap")]
    OversizedPayload { len: usize },
}
