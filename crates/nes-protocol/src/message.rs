use serde_json::{json, Value};

use crate::error::MessageError;
use crate::frame;
use crate::MAX_PAYLOAD_BYTES;

const TAG_READY: &str = "ready";
const TAG_AUDIO: &str = "audio";
const TAG_VIDEO: &str = "video";
const TAG_SAVE: &str = "save";

/// One message from the sandboxed runtime to the host.
///
/// Ephemeral by contract: decoded, dispatched once, discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Runtime bootstrap (including callback registration) finished.
    Ready,
    /// One frame's worth of raw PCM bytes (44.1 kHz mono s16).
    Audio(Vec<u8>),
    /// One decoded video frame (RGB565, [`crate::FRAME_BUFFER_BYTES`] bytes
    /// when well-formed).
    Video(Vec<u8>),
    /// The core flushed battery-backed save data; the host should persist.
    SaveRequested,
}

impl Message {
    /// Decode a payload from its JSON text form.
    pub fn from_json_str(payload: &str) -> Result<Self, MessageError> {
        let value: Value = serde_json::from_str(payload)?;
        Self::from_json(&value)
    }

    /// Decode a payload from an already-parsed JSON value.
    ///
    /// Unknown or missing tags and wrong-shaped data fields are errors;
    /// extra fields are ignored. Video data is accepted either as a byte
    /// array (the binary-safe transport) or as the legacy UTF-16 packed
    /// string (see [`frame::unpack_utf16`]).
    pub fn from_json(value: &Value) -> Result<Self, MessageError> {
        let object = value.as_object().ok_or(MessageError::NotAnObject)?;
        let tag = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or(MessageError::MissingTag)?;

        match tag {
            TAG_READY => Ok(Message::Ready),
            TAG_SAVE => Ok(Message::SaveRequested),
            TAG_AUDIO => {
                let data = object
                    .get("data")
                    .ok_or(MessageError::MissingData { tag: TAG_AUDIO })?;
                Ok(Message::Audio(decode_byte_array(data, TAG_AUDIO)?))
            }
            TAG_VIDEO => {
                let data = object
                    .get("data")
                    .ok_or(MessageError::MissingData { tag: TAG_VIDEO })?;
                match data {
                    Value::String(packed) => {
                        if packed.len() > MAX_PAYLOAD_BYTES {
                            return Err(MessageError::OversizedPayload { len: packed.len() });
                        }
                        Ok(Message::Video(frame::unpack_utf16(packed)))
                    }
                    Value::Array(_) => Ok(Message::Video(decode_byte_array(data, TAG_VIDEO)?)),
                    _ => Err(MessageError::WrongShape {
                        tag: TAG_VIDEO,
                        expected: "a byte array or packed string",
                    }),
                }
            }
            other => Err(MessageError::UnknownTag(other.to_owned())),
        }
    }

    /// Encode into the wire JSON value. Byte payloads use the binary-safe
    /// array transport.
    pub fn to_json(&self) -> Value {
        match self {
            Message::Ready => json!({ "type": TAG_READY }),
            Message::SaveRequested => json!({ "type": TAG_SAVE }),
            Message::Audio(bytes) => json!({ "type": TAG_AUDIO, "data": bytes }),
            Message::Video(bytes) => json!({ "type": TAG_VIDEO, "data": bytes }),
        }
    }
}

fn decode_byte_array(data: &Value, tag: &'static str) -> Result<Vec<u8>, MessageError> {
    let items = data.as_array().ok_or(MessageError::WrongShape {
        tag,
        expected: "a byte array",
    })?;
    if items.len() > MAX_PAYLOAD_BYTES {
        return Err(MessageError::OversizedPayload { len: items.len() });
    }
    let mut bytes = Vec::with_capacity(items.len());
    for item in items {
        let byte = item
            .as_u64()
            .filter(|v| *v <= u8::MAX as u64)
            .ok_or(MessageError::WrongShape {
                tag,
                expected: "a byte array",
            })?;
        bytes.push(byte as u8);
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_tag_only_messages() {
        assert_eq!(
            Message::from_json_str(r#"{"type":"ready"}"#).unwrap(),
            Message::Ready
        );
        assert_eq!(
            Message::from_json_str(r#"{"type":"save"}"#).unwrap(),
            Message::SaveRequested
        );
    }

    #[test]
    fn decodes_audio_bytes() {
        let msg = Message::from_json_str(r#"{"type":"audio","data":[0,127,255]}"#).unwrap();
        assert_eq!(msg, Message::Audio(vec![0, 127, 255]));
    }

    #[test]
    fn decodes_video_from_both_transports() {
        let binary = Message::from_json_str(r#"{"type":"video","data":[1,2,3,4]}"#).unwrap();
        assert_eq!(binary, Message::Video(vec![1, 2, 3, 4]));

        // "ȁЃ" packs the same bytes little-endian.
        let legacy = Message::from_json_str(r#"{"type":"video","data":"ȁЃ"}"#).unwrap();
        assert_eq!(legacy, binary);
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert!(matches!(
            Message::from_json_str("[1,2]"),
            Err(MessageError::NotAnObject)
        ));
        assert!(matches!(
            Message::from_json_str(r#"{"data":[1]}"#),
            Err(MessageError::MissingTag)
        ));
        assert!(matches!(
            Message::from_json_str(r#"{"type":"bogus"}"#),
            Err(MessageError::UnknownTag(_))
        ));
        assert!(matches!(
            Message::from_json_str(r#"{"type":"audio"}"#),
            Err(MessageError::MissingData { tag: "audio" })
        ));
        assert!(matches!(
            Message::from_json_str(r#"{"type":"audio","data":[256]}"#),
            Err(MessageError::WrongShape { tag: "audio", .. })
        ));
        assert!(matches!(
            Message::from_json_str(r#"{"type":"video","data":7}"#),
            Err(MessageError::WrongShape { tag: "video", .. })
        ));
    }

    #[test]
    fn round_trips_through_to_json() {
        for msg in [
            Message::Ready,
            Message::SaveRequested,
            Message::Audio(vec![9, 8, 7]),
            Message::Video(vec![0, 255]),
        ] {
            assert_eq!(Message::from_json(&msg.to_json()).unwrap(), msg);
        }
    }
}
