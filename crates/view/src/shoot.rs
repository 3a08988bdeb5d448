//! Gardener conventions read off shoot metadata and status.

use serde_json::Value;
use vigil_core::Resource;

pub const STATUS_LABEL: &str = "shoot.gardener.cloud/status";

const CREATED_BY: [&str; 2] = ["gardener.cloud/created-by", "garden.sapcloud.io/createdBy"];
const IGNORE: [&str; 2] = ["shoot.gardener.cloud/ignore", "shoot.garden.sapcloud.io/ignore"];

/// Error codes caused by the user's own infrastructure or configuration.
pub const USER_ERROR_CODES: &[&str] = &[
    "ERR_INFRA_UNAUTHORIZED",
    "ERR_INFRA_INSUFFICIENT_PRIVILEGES",
    "ERR_INFRA_QUOTA_EXCEEDED",
    "ERR_INFRA_DEPENDENCIES",
    "ERR_INFRA_RESOURCES_DEPLETED",
    "ERR_CONFIGURATION_PROBLEM",
];

pub fn created_by(obj: &Resource) -> Option<&str> {
    CREATED_BY.iter().find_map(|k| obj.annotation(k))
}

/// Project owning a namespace: `garden-foo` belongs to `foo`, `garden` to itself.
pub fn project_name(obj: &Resource) -> Option<&str> {
    let ns = obj.namespace()?;
    Some(ns.strip_prefix("garden-").filter(|p| !p.is_empty()).unwrap_or(ns))
}

pub fn is_reconciliation_deactivated(obj: &Resource) -> bool {
    IGNORE.iter().any(|k| obj.annotation(k) == Some("true"))
}

pub fn is_progressing(obj: &Resource) -> bool {
    obj.label(STATUS_LABEL) == Some("progressing")
}

/// Anything but an explicit non-healthy status label counts as healthy.
pub fn has_issue(obj: &Resource) -> bool {
    obj.label(STATUS_LABEL).map(|s| s != "healthy").unwrap_or(false)
}

pub fn is_hibernated(obj: &Resource) -> bool {
    obj.pointer("/status/hibernated").and_then(Value::as_bool).unwrap_or(false)
}

/// All `codes` of an array of error-like entries (`lastErrors`, `conditions`).
pub fn error_codes(entries: Option<&Value>) -> Vec<&str> {
    entries
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|e| e.get("codes").and_then(Value::as_array))
                .flatten()
                .filter_map(Value::as_str)
                .collect()
        })
        .unwrap_or_default()
}

/// A non-empty code list made up only of user error codes.
pub fn is_user_error(codes: &[&str]) -> bool {
    !codes.is_empty() && codes.iter().all(|c| USER_ERROR_CODES.contains(c))
}

pub fn last_errors(obj: &Resource) -> Option<&Value> { obj.pointer("/status/lastErrors") }

pub fn conditions(obj: &Resource) -> Option<&Value> { obj.pointer("/status/conditions") }

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn project_from_namespace() {
        let r = |ns: &str| Resource::new(json!({ "metadata": { "name": "s", "namespace": ns } }));
        assert_eq!(project_name(&r("garden-dev")), Some("dev"));
        assert_eq!(project_name(&r("garden")), Some("garden"));
        assert_eq!(project_name(&r("other")), Some("other"));
    }

    #[test]
    fn created_by_falls_back_to_legacy_annotation() {
        let legacy = Resource::new(json!({ "metadata": { "annotations": { "garden.sapcloud.io/createdBy": "jane" } } }));
        assert_eq!(created_by(&legacy), Some("jane"));
        let both = Resource::new(json!({ "metadata": { "annotations": {
            "garden.sapcloud.io/createdBy": "jane", "gardener.cloud/created-by": "john"
        } } }));
        assert_eq!(created_by(&both), Some("john"));
    }

    #[test]
    fn user_errors_need_only_user_codes() {
        let obj = Resource::new(json!({ "status": { "lastErrors": [
            { "description": "x", "codes": ["ERR_INFRA_QUOTA_EXCEEDED"] },
            { "description": "y" }
        ] } }));
        let codes = error_codes(last_errors(&obj));
        assert_eq!(codes, vec!["ERR_INFRA_QUOTA_EXCEEDED"]);
        assert!(is_user_error(&codes));
        assert!(!is_user_error(&["ERR_INFRA_QUOTA_EXCEEDED", "ERR_CLEANUP_CLUSTER_RESOURCES"]));
        assert!(!is_user_error(&[]));
    }

    #[test]
    fn status_label_drives_issue_and_progressing() {
        let r = |s: &str| Resource::new(json!({ "metadata": { "labels": { "shoot.gardener.cloud/status": s } } }));
        assert!(!has_issue(&r("healthy")));
        assert!(has_issue(&r("unhealthy")));
        assert!(is_progressing(&r("progressing")));
        assert!(!has_issue(&Resource::new(json!({ "metadata": {} }))));
    }
}
