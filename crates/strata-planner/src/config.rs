use serde::Deserialize;

use crate::error::PlannerError;

/// Planner settings.
///
/// ```json
/// { "default_commit_depth": 10, "explain_counters": true }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Depth applied to commit selects that do not set one. `None` walks
    /// the whole history.
    pub default_commit_depth: Option<u64>,
    /// Include per-node counters in simple explain output.
    pub explain_counters: bool,
}

impl PlannerConfig {
    pub fn from_json(s: &str) -> Result<Self, PlannerError> {
        serde_json::from_str(s).map_err(|e| PlannerError::InvalidRequest(format!("config: {e}")))
    }
}
