use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{CoreError, Resource};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Added,
    Modified,
    Deleted,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Added => "ADDED",
            EventKind::Modified => "MODIFIED",
            EventKind::Deleted => "DELETED",
            EventKind::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ADDED" => Some(EventKind::Added),
            "MODIFIED" => Some(EventKind::Modified),
            "DELETED" => Some(EventKind::Deleted),
            "ERROR" => Some(EventKind::Error),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Payload of an ERROR watch event (a `meta/v1 Status`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchStatus {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

/// A single change notification for one object.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Added(Resource),
    Modified(Resource),
    Deleted(Resource),
    Error(WatchStatus),
    /// Well-formed envelope with a `type` outside the known set.
    Unrecognized { kind: String },
}

impl ChangeEvent {
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            ChangeEvent::Added(_) => Some(EventKind::Added),
            ChangeEvent::Modified(_) => Some(EventKind::Modified),
            ChangeEvent::Deleted(_) => Some(EventKind::Deleted),
            ChangeEvent::Error(_) => Some(EventKind::Error),
            ChangeEvent::Unrecognized { .. } => None,
        }
    }

    /// The object for ADDED/MODIFIED/DELETED events.
    pub fn object(&self) -> Option<&Resource> {
        match self {
            ChangeEvent::Added(o) | ChangeEvent::Modified(o) | ChangeEvent::Deleted(o) => Some(o),
            ChangeEvent::Error(_) | ChangeEvent::Unrecognized { .. } => None,
        }
    }

    pub fn is_upsert(&self) -> bool {
        matches!(self, ChangeEvent::Added(_) | ChangeEvent::Modified(_))
    }

    /// Decode a watch line of the form `{"type": "...", "object": {...}}`.
    pub fn from_wire(value: Value) -> Result<Self, CoreError> {
        let Value::Object(mut map) = value else {
            return Err(CoreError::MalformedEvent("event is not an object".into()));
        };
        let kind = match map.remove("type") {
            Some(Value::String(s)) => s,
            _ => return Err(CoreError::MalformedEvent("missing event type".into())),
        };
        let object = map.remove("object");
        let Some(parsed) = EventKind::parse(&kind) else {
            return Ok(ChangeEvent::Unrecognized { kind });
        };
        let object = object.ok_or_else(|| CoreError::MalformedEvent(format!("{} event without object", kind)))?;
        Ok(match parsed {
            EventKind::Added => ChangeEvent::Added(Resource::new(object)),
            EventKind::Modified => ChangeEvent::Modified(Resource::new(object)),
            EventKind::Deleted => ChangeEvent::Deleted(Resource::new(object)),
            EventKind::Error => {
                let status = serde_json::from_value(object).map_err(|e| CoreError::MalformedEvent(e.to_string()))?;
                ChangeEvent::Error(status)
            }
        })
    }

    pub fn from_wire_slice(bytes: &[u8]) -> Result<Self, CoreError> {
        let value: Value = serde_json::from_slice(bytes).map_err(|e| CoreError::MalformedEvent(e.to_string()))?;
        Self::from_wire(value)
    }
}

/// Notification emitted by a watch transport.
///
/// After every `Connect` the transport relists the full state as a sequence of
/// `Added` events, closed by `Listed`.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Connect,
    /// The relist that followed the last `Connect` is complete.
    Listed { count: usize },
    Disconnect { reason: Option<String> },
    Reconnect { attempt: u32, delay: Duration },
    Error { message: String },
    Event(ChangeEvent),
}

impl From<ChangeEvent> for Signal {
    fn from(ev: ChangeEvent) -> Self { Signal::Event(ev) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_known_kinds() {
        let ev = ChangeEvent::from_wire(json!({ "type": "ADDED", "object": { "metadata": { "name": "x" } } })).expect("ok");
        assert_eq!(ev.kind(), Some(EventKind::Added));
        assert_eq!(ev.object().and_then(|o| o.name()), Some("x"));
    }

    #[test]
    fn decodes_error_status() {
        let ev = ChangeEvent::from_wire_slice(
            br#"{"type":"ERROR","object":{"kind":"Status","code":410,"reason":"Expired","message":"too old resource version"}}"#,
        )
        .expect("ok");
        assert_eq!(
            ev,
            ChangeEvent::Error(WatchStatus { code: 410, reason: "Expired".into(), message: "too old resource version".into() })
        );
    }

    #[test]
    fn unknown_type_is_unrecognized() {
        let ev = ChangeEvent::from_wire(json!({ "type": "BOOKMARK", "object": {} })).expect("ok");
        assert_eq!(ev, ChangeEvent::Unrecognized { kind: "BOOKMARK".into() });
        assert!(ev.kind().is_none());
    }

    #[test]
    fn missing_type_or_object_is_malformed() {
        assert!(ChangeEvent::from_wire(json!({ "object": {} })).is_err());
        assert!(ChangeEvent::from_wire(json!({ "type": "MODIFIED" })).is_err());
        assert!(ChangeEvent::from_wire(json!([1, 2])).is_err());
    }
}
