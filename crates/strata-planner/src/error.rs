use strata_store::StoreError;

use crate::plan::NodeId;

#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    // ── Build time ──────────────────────────────────────────
    #[error("collection not found: {0}")]
    CollectionNotFound(String),
    #[error("field not found: {0}")]
    FieldNotFound(String),
    #[error("unknown relation for `{0}`")]
    UnknownRelation(String),
    #[error("unresolved aggregate dependency `{dependency}` of `{aggregate}`")]
    UnresolvedDependency { aggregate: String, dependency: String },
    #[error("invalid filter argument for {op}: {reason}")]
    InvalidFilterArgument { op: &'static str, reason: String },
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // ── Persisted history ───────────────────────────────────
    #[error("malformed commit block {cid}: {reason}")]
    MalformedBlock { cid: String, reason: String },

    // ── Execution ───────────────────────────────────────────
    #[error("{aggregate}: unsupported numeric value {found}")]
    UnsupportedNumeric { aggregate: String, found: String },
    #[error("document already exists: {0}")]
    DocumentExists(String),
    #[error("document not found: {0}")]
    DocumentNotFound(String),
    #[error("malformed key: {0}")]
    MalformedKey(String),
    #[error("{0} is not wired to a source")]
    Unwired(&'static str),
    #[error("plan node {0:?} is missing or already in use")]
    NodeUnavailable(NodeId),

    #[error("encoding error: {0}")]
    Encoding(String),
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{}", join_errors(.0))]
    Multiple(Vec<PlannerError>),
}

impl From<bson::error::Error> for PlannerError {
    fn from(e: bson::error::Error) -> Self {
        PlannerError::Encoding(e.to_string())
    }
}

fn join_errors(errors: &[PlannerError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl PlannerError {
    /// Combine an execution error with a teardown error.
    pub(crate) fn combine(first: PlannerError, second: PlannerError) -> PlannerError {
        match first {
            PlannerError::Multiple(mut errors) => {
                errors.push(second);
                PlannerError::Multiple(errors)
            }
            other => PlannerError::Multiple(vec![other, second]),
        }
    }
}
