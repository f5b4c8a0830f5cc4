use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::messages::{ClientEvent, CreateMsg, JoinMsg, PingMsg, SetReadyMsg};
use crate::room::{CODE_MAX_LEN, CODE_MIN_LEN};

/// Bounds for player-facing names, in characters.
pub const NAME_MIN: usize = 1;
pub const NAME_MAX: usize = 20;

/// A single field-level validation failure, reported to the client
/// inside a `rejected:badPayload` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub path: String,
    pub message: String,
}

impl Issue {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

/// Validate an inbound envelope against the shape its event name
/// requires. Collects every field failure rather than stopping at the
/// first, so one rejection carries the full issue list.
pub fn parse_event(event: &str, data: &Value) -> Result<ClientEvent, Vec<Issue>> {
    match event {
        "ping" => parse_ping(data),
        "create" => parse_create(data),
        "join" => parse_join(data),
        "setReady" => parse_set_ready(data),
        other => Err(vec![Issue::new("event", format!("unknown event: {other}"))]),
    }
}

fn parse_ping(data: &Value) -> Result<ClientEvent, Vec<Issue>> {
    object_guard(data)?;
    let mut issues = Vec::new();
    match string_field(data, "hello", &mut issues) {
        Some(hello) => Ok(ClientEvent::Ping(PingMsg { hello })),
        None => Err(issues),
    }
}

fn parse_create(data: &Value) -> Result<ClientEvent, Vec<Issue>> {
    object_guard(data)?;
    let mut issues = Vec::new();
    match name_field(data, "hostName", &mut issues) {
        Some(host_name) => Ok(ClientEvent::Create(CreateMsg { host_name })),
        None => Err(issues),
    }
}

fn parse_join(data: &Value) -> Result<ClientEvent, Vec<Issue>> {
    object_guard(data)?;
    let mut issues = Vec::new();
    let code = code_field(data, "code", &mut issues);
    let name = name_field(data, "name", &mut issues);
    match (code, name) {
        (Some(code), Some(name)) => Ok(ClientEvent::Join(JoinMsg { code, name })),
        _ => Err(issues),
    }
}

fn parse_set_ready(data: &Value) -> Result<ClientEvent, Vec<Issue>> {
    object_guard(data)?;
    let mut issues = Vec::new();
    match bool_field(data, "ready", &mut issues) {
        Some(ready) => Ok(ClientEvent::SetReady(SetReadyMsg { ready })),
        None => Err(issues),
    }
}

fn object_guard(data: &Value) -> Result<(), Vec<Issue>> {
    if data.is_object() {
        Ok(())
    } else {
        Err(vec![Issue::new("", "expected an object")])
    }
}

fn string_field(data: &Value, key: &str, issues: &mut Vec<Issue>) -> Option<String> {
    match data.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            issues.push(Issue::new(key, "expected a string"));
            None
        },
        None => {
            issues.push(Issue::new(key, "required"));
            None
        },
    }
}

fn bool_field(data: &Value, key: &str, issues: &mut Vec<Issue>) -> Option<bool> {
    match data.get(key) {
        Some(Value::Bool(b)) => Some(*b),
        Some(_) => {
            issues.push(Issue::new(key, "expected a boolean"));
            None
        },
        None => {
            issues.push(Issue::new(key, "required"));
            None
        },
    }
}

/// A string field bounded to `NAME_MIN..=NAME_MAX` characters.
fn name_field(data: &Value, key: &str, issues: &mut Vec<Issue>) -> Option<String> {
    let value = string_field(data, key, issues)?;
    let len = value.chars().count();
    if !(NAME_MIN..=NAME_MAX).contains(&len) {
        issues.push(Issue::new(
            key,
            format!("must be {NAME_MIN} to {NAME_MAX} characters"),
        ));
        return None;
    }
    Some(value)
}

/// A string field in the accepted room-code length range. Codes are
/// matched case-sensitively against the registry, so no normalization
/// happens here.
fn code_field(data: &Value, key: &str, issues: &mut Vec<Issue>) -> Option<String> {
    let value = string_field(data, key, issues)?;
    let len = value.chars().count();
    if !(CODE_MIN_LEN..=CODE_MAX_LEN).contains(&len) {
        issues.push(Issue::new(
            key,
            format!("must be {CODE_MIN_LEN} to {CODE_MAX_LEN} characters"),
        ));
        return None;
    }
    Some(value)
}
