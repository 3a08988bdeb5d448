use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A mirrored object as delivered by the watch stream.
///
/// The payload stays opaque JSON; typed accessors only cover the metadata the
/// cache and the views need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource {
    raw: Value,
}

/// Revision marker of an object (`metadata.resourceVersion`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revision<'a> {
    Numeric(u64),
    Opaque(&'a str),
    Absent,
}

impl Resource {
    pub fn new(mut raw: Value) -> Self {
        #[cfg(feature = "strip-managed-fields")]
        strip_managed_fields(&mut raw);
        #[cfg(not(feature = "strip-managed-fields"))]
        let _ = &mut raw;
        Self { raw }
    }

    pub fn raw(&self) -> &Value { &self.raw }

    pub fn into_raw(self) -> Value { self.raw }

    /// JSON pointer lookup, e.g. `/status/phase`.
    pub fn pointer(&self, path: &str) -> Option<&Value> { self.raw.pointer(path) }

    pub fn str_at(&self, path: &str) -> Option<&str> {
        self.raw.pointer(path).and_then(|v| v.as_str())
    }

    pub fn name(&self) -> Option<&str> { self.str_at("/metadata/name") }

    pub fn namespace(&self) -> Option<&str> { self.str_at("/metadata/namespace") }

    pub fn uid(&self) -> Option<&str> { self.str_at("/metadata/uid") }

    pub fn creation_timestamp(&self) -> Option<&str> { self.str_at("/metadata/creationTimestamp") }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.raw
            .pointer("/metadata/labels")
            .and_then(|v| v.get(key))
            .and_then(|v| v.as_str())
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.raw
            .pointer("/metadata/annotations")
            .and_then(|v| v.get(key))
            .and_then(|v| v.as_str())
    }

    pub fn revision(&self) -> Revision<'_> {
        match self.raw.pointer("/metadata/resourceVersion") {
            Some(Value::Number(n)) => n.as_u64().map(Revision::Numeric).unwrap_or(Revision::Absent),
            Some(Value::String(s)) => match s.parse::<u64>() {
                Ok(n) => Revision::Numeric(n),
                Err(_) => Revision::Opaque(s.as_str()),
            },
            _ => Revision::Absent,
        }
    }

    /// Whether `self` carries a newer revision than `previous`.
    ///
    /// Numeric markers must strictly increase. Opaque markers only need to
    /// differ. Objects without a marker always count as newer.
    pub fn is_newer_than(&self, previous: &Resource) -> bool {
        match (self.revision(), previous.revision()) {
            (Revision::Numeric(a), Revision::Numeric(b)) => a > b,
            (Revision::Opaque(a), Revision::Opaque(b)) => a != b,
            _ => true,
        }
    }

    /// `namespace/name` (or just `name`) for log lines.
    pub fn display_name(&self) -> String {
        match (self.namespace(), self.name()) {
            (Some(ns), Some(name)) => format!("{}/{}", ns, name),
            (None, Some(name)) => name.to_string(),
            _ => "<unnamed>".to_string(),
        }
    }
}

impl From<Value> for Resource {
    fn from(raw: Value) -> Self { Self::new(raw) }
}

#[cfg(feature = "strip-managed-fields")]
fn strip_managed_fields(v: &mut Value) {
    if let Some(meta) = v.get_mut("metadata") {
        if let Some(obj) = meta.as_object_mut() {
            obj.remove("managedFields");
        }
    }
}
