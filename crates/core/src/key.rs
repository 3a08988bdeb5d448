use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::{CoreError, Resource};

type Extract = dyn Fn(&Resource) -> Option<String> + Send + Sync;

/// Accessor that derives the identifying key of an object.
///
/// Fixed per cache instance. Two objects with equal keys are the same entity.
#[derive(Clone)]
pub struct KeyPath {
    label: Cow<'static, str>,
    extract: Arc<Extract>,
}

impl KeyPath {
    /// `metadata.name`, for cluster-scoped kinds such as projects.
    pub fn name() -> Self {
        Self::pointer("/metadata/name")
    }

    /// `namespace/name`; cluster-scoped objects key by name alone.
    pub fn namespaced_name() -> Self {
        Self::custom("metadata.namespace/metadata.name", |obj| {
            let name = obj.name()?;
            Some(match obj.namespace() {
                Some(ns) => format!("{}/{}", ns, name),
                None => name.to_string(),
            })
        })
    }

    pub fn uid() -> Self {
        Self::pointer("/metadata/uid")
    }

    /// Any string-valued JSON pointer.
    pub fn pointer(path: &'static str) -> Self {
        Self::custom(path, move |obj| obj.str_at(path).map(|s| s.to_string()))
    }

    pub fn custom<F>(label: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(&Resource) -> Option<String> + Send + Sync + 'static,
    {
        Self { label: label.into(), extract: Arc::new(f) }
    }

    pub fn label(&self) -> &str { &self.label }

    pub fn key_of(&self, obj: &Resource) -> Result<String, CoreError> {
        match (self.extract)(obj) {
            Some(k) if !k.is_empty() => Ok(k),
            _ => Err(CoreError::MissingKey { path: self.label.to_string() }),
        }
    }
}

impl fmt::Debug for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPath").field("label", &self.label).finish()
    }
}
