use strata_query::{DocumentMapping, ExplainMode, Operation, Request};
use strata_store::Datastore;
use tracing::warn;

use crate::config::PlannerConfig;
use crate::error::PlannerError;
use crate::explain;
use crate::plan::{Arena, NodeId};
use crate::planner::Planner;

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    Rows(Vec<bson::Document>),
    Explain(bson::Document),
}

impl ExecutionResult {
    pub fn rows(&self) -> &[bson::Document] {
        match self {
            ExecutionResult::Rows(rows) => rows,
            ExecutionResult::Explain(_) => &[],
        }
    }

    pub fn into_rows(self) -> Vec<bson::Document> {
        match self {
            ExecutionResult::Rows(rows) => rows,
            ExecutionResult::Explain(_) => Vec::new(),
        }
    }
}

/// Plan, run and render one request against `ds`.
///
/// The plan is closed whatever happens. An execution error followed by a
/// failed close is reported as [`PlannerError::Multiple`].
pub fn execute_request(
    ds: &dyn Datastore,
    request: &Request,
    config: &PlannerConfig,
) -> Result<ExecutionResult, PlannerError> {
    let mut planner = Planner::new(ds, config.clone());
    let built = planner
        .new_plan(request)
        .and_then(|root| planner.expand_plan(root).map(|()| root));
    let mut arena = planner.into_arena();

    let (outcome, closed) = match built {
        Ok(root) => {
            let outcome = run(&mut arena, root, request, config);
            (outcome, arena.close(root))
        }
        Err(e) => (Err(e), arena.close_all()),
    };

    match (outcome, closed) {
        (Ok(result), Ok(())) => Ok(result),
        (Ok(_), Err(e)) | (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close)) => {
            warn!(error = %close, "closing plan failed after execution error");
            Err(PlannerError::combine(e, close))
        }
    }
}

fn run(
    arena: &mut Arena<'_>,
    root: NodeId,
    request: &Request,
    config: &PlannerConfig,
) -> Result<ExecutionResult, PlannerError> {
    match request.explain {
        Some(mode @ (ExplainMode::Simple | ExplainMode::Debug)) => {
            return Ok(ExecutionResult::Explain(explain::explain(arena, root, mode, config)?));
        }
        Some(ExplainMode::Execute) => {
            arena.init(root)?;
            arena.start(root)?;
            while arena.next(root)? {}
            return Ok(ExecutionResult::Explain(explain::explain(
                arena,
                root,
                ExplainMode::Execute,
                config,
            )?));
        }
        None => {}
    }

    let mapping = output_mapping(request);
    arena.init(root)?;
    arena.start(root)?;
    let mut rows = Vec::new();
    while arena.next(root)? {
        rows.push(mapping.to_map(arena.value(root)?));
    }
    Ok(ExecutionResult::Rows(rows))
}

fn output_mapping(request: &Request) -> &DocumentMapping {
    match &request.operation {
        Operation::Select(select) => &select.mapping,
        Operation::TopLevel(top) => &top.mapping,
        Operation::Commits(commits) => &commits.mapping,
        Operation::Mutation(mutation) => &mutation.select.mapping,
    }
}
