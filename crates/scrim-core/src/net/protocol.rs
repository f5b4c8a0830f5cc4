use serde::Deserialize;
use serde_json::Value;

use super::messages::{ClientEvent, ServerEvent};

/// Maximum accepted frame size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 8 * 1024; // 8 KiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::PayloadTooLarge(size) => {
                write!(f, "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})")
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// A parsed but not yet validated wire envelope. The `data` payload is
/// only trusted after it passes the validation gate for its event.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEnvelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// Parse a raw text frame into an envelope, enforcing the size limit.
pub fn decode_envelope(text: &str) -> Result<RawEnvelope, ProtocolError> {
    if text.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    if text.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(text.len()));
    }
    serde_json::from_str(text).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Encode a `ServerEvent` to its wire envelope.
pub fn encode_server_event(event: &ServerEvent) -> Result<String, ProtocolError> {
    serde_json::to_string(event).map_err(|e| ProtocolError::SerializeError(e.to_string()))
}

/// Encode a `ClientEvent` to its wire envelope.
pub fn encode_client_event(event: &ClientEvent) -> Result<String, ProtocolError> {
    serde_json::to_string(event).map_err(|e| ProtocolError::SerializeError(e.to_string()))
}

/// Decode a server wire envelope. Used by clients and test harnesses.
pub fn decode_server_event(text: &str) -> Result<ServerEvent, ProtocolError> {
    if text.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    serde_json::from_str(text).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::messages::{BadPayloadMsg, PingMsg, PongMsg, SetReadyMsg, TickMsg};
    use crate::net::validate::Issue;
    use crate::room::{Phase, Room};

    #[test]
    fn envelope_extracts_event_and_data() {
        let env = decode_envelope(r#"{"event":"join","data":{"code":"AB12","name":"Bella"}}"#)
            .unwrap();
        assert_eq!(env.event, "join");
        assert_eq!(env.data["code"], "AB12");
        assert_eq!(env.data["name"], "Bella");
    }

    #[test]
    fn envelope_without_data_defaults_to_null() {
        let env = decode_envelope(r#"{"event":"ping"}"#).unwrap();
        assert_eq!(env.event, "ping");
        assert!(env.data.is_null());
    }

    #[test]
    fn empty_frame_rejected() {
        assert!(matches!(
            decode_envelope(""),
            Err(ProtocolError::EmptyMessage)
        ));
    }

    #[test]
    fn oversized_frame_rejected() {
        let padding = "x".repeat(MAX_MESSAGE_SIZE);
        let text = format!(r#"{{"event":"ping","data":{{"hello":"{padding}"}}}}"#);
        assert!(matches!(
            decode_envelope(&text),
            Err(ProtocolError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn garbage_frame_rejected() {
        assert!(matches!(
            decode_envelope("not json"),
            Err(ProtocolError::DeserializeError(_))
        ));
    }

    #[test]
    fn client_events_use_wire_names() {
        let text = encode_client_event(&ClientEvent::SetReady(SetReadyMsg { ready: true }))
            .unwrap();
        assert_eq!(text, r#"{"event":"setReady","data":{"ready":true}}"#);

        let text = encode_client_event(&ClientEvent::Ping(PingMsg {
            hello: "world".to_string(),
        }))
        .unwrap();
        assert_eq!(text, r#"{"event":"ping","data":{"hello":"world"}}"#);
    }

    #[test]
    fn state_event_spells_fields_like_the_wire() {
        let room = Room::new("AB12".to_string());
        let text = encode_server_event(&ServerEvent::State(room.state)).unwrap();
        assert!(text.contains(r#""event":"state""#), "bad envelope: {text}");
        assert!(text.contains(r#""phase":"lobby""#), "bad phase: {text}");
        assert!(text.contains(r#""matchId":null"#), "bad matchId: {text}");
        assert!(text.contains(r#""teams":{"t0":0,"t1":0}"#), "bad teams: {text}");
        assert!(text.contains(r#""point":{"progress":0}"#), "bad point: {text}");
    }

    #[test]
    fn rejection_events_use_namespaced_names() {
        let text = encode_server_event(&ServerEvent::BadPayload(BadPayloadMsg {
            event: "join".to_string(),
            issues: vec![Issue {
                path: "code".to_string(),
                message: "required".to_string(),
            }],
        }))
        .unwrap();
        assert!(text.contains(r#""event":"rejected:badPayload""#), "{text}");
        assert!(text.contains(r#""path":"code""#), "{text}");
    }

    #[test]
    fn pong_uses_camel_case_server_time() {
        let text = encode_server_event(&ServerEvent::Pong(PongMsg {
            echo: PingMsg {
                hello: "hi".to_string(),
            },
            server_time: 1234,
        }))
        .unwrap();
        assert!(text.contains(r#""serverTime":1234"#), "{text}");
        assert!(text.contains(r#""hello":"hi""#), "{text}");
    }

    #[test]
    fn phase_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Phase::Countdown).unwrap(), r#""countdown""#);
        assert_eq!(serde_json::to_string(&Phase::Match).unwrap(), r#""match""#);
    }

    #[test]
    fn server_event_roundtrip() {
        let event = ServerEvent::Tick(TickMsg { tick: 42 });
        let text = encode_server_event(&event).unwrap();
        let back = decode_server_event(&text).unwrap();
        assert_eq!(back, event);
    }
}
