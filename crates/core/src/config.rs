//! Runtime settings read from `VIGIL_*` environment variables.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Buffer size of each signal hub (per watch session).
    pub hub_capacity: usize,
    /// First reconnect delay after a stream error.
    pub watch_backoff_initial: Duration,
    /// Upper bound for reconnect delays.
    pub watch_backoff_max: Duration,
    /// Default bound for readiness waits.
    pub ready_timeout: Duration,
    /// Ticket labels that hide a cluster in the issues-only view.
    pub hide_ticket_labels: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hub_capacity: 1024,
            watch_backoff_initial: Duration::from_millis(500),
            watch_backoff_max: Duration::from_secs(30),
            ready_timeout: Duration::from_millis(60_000),
            hide_ticket_labels: Vec::new(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Same as [`Settings::from_env`] with an injectable lookup (used by tests).
    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let hub_capacity = get("VIGIL_HUB_CAPACITY").and_then(|s| s.parse().ok()).filter(|n: &usize| *n > 0).unwrap_or(d.hub_capacity);
        let watch_backoff_initial = get("VIGIL_WATCH_BACKOFF_INITIAL_MS").and_then(|s| s.parse().ok()).map(Duration::from_millis).unwrap_or(d.watch_backoff_initial);
        let watch_backoff_max = get("VIGIL_WATCH_BACKOFF_MAX_SECS").and_then(|s| s.parse().ok()).map(Duration::from_secs).unwrap_or(d.watch_backoff_max);
        let ready_timeout = get("VIGIL_READY_TIMEOUT_MS").and_then(|s| s.parse().ok()).map(Duration::from_millis).unwrap_or(d.ready_timeout);
        let hide_ticket_labels = get("VIGIL_HIDE_TICKET_LABELS")
            .map(|s| s.split(',').map(|l| l.trim().to_string()).filter(|l| !l.is_empty()).collect())
            .unwrap_or(d.hide_ticket_labels);
        Self { hub_capacity, watch_backoff_initial, watch_backoff_max, ready_timeout, hide_ticket_labels }
    }
}
