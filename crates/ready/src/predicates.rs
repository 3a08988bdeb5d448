//! Built-in readiness predicates for Gardener resources.

use vigil_core::Resource;

use crate::Readiness;

/// `status.phase == phase`. A `Failed` phase is terminal and carries
/// `status.message` as detail.
pub fn phase_is(phase: impl Into<String>) -> impl Fn(&Resource) -> Readiness + Send + Sync + Clone {
    let phase = phase.into();
    move |obj: &Resource| match obj.str_at("/status/phase") {
        Some(p) if p == phase => Readiness::Ready,
        Some("Failed") => Readiness::Failed(obj.str_at("/status/message").unwrap_or("phase Failed").to_string()),
        _ => Readiness::Pending,
    }
}

/// `status.lastOperation.state == "Succeeded"`; a `Failed` state is terminal.
pub fn last_operation_succeeded() -> impl Fn(&Resource) -> Readiness + Send + Sync + Clone {
    |obj: &Resource| match obj.str_at("/status/lastOperation/state") {
        Some("Succeeded") => Readiness::Ready,
        Some("Failed") => Readiness::Failed(last_error_detail(obj)),
        _ => Readiness::Pending,
    }
}

fn last_error_detail(obj: &Resource) -> String {
    let joined = obj
        .pointer("/status/lastErrors")
        .and_then(|v| v.as_array())
        .map(|errs| {
            errs.iter()
                .filter_map(|e| e.get("description").and_then(|d| d.as_str()))
                .collect::<Vec<_>>()
                .join("; ")
        })
        .unwrap_or_default();
    if !joined.is_empty() {
        return joined;
    }
    obj.str_at("/status/lastOperation/description").unwrap_or("last operation failed").to_string()
}
