//! Definition tree to linear execution plan.
//!
//! The engine never walks the nested definition; it interprets a flat unit
//! list where every loop is bracketed by `LoopEnter`/`LoopExit` markers. A
//! side table keeps each loop's bracket indices so jumping back to a loop
//! start is an index assignment, not a search.

use std::collections::HashMap;

use tapflow_types::error::EngineError;
use tapflow_types::workflow::{LoopId, LoopKind, StepDefinition, WorkflowItem};

/// One executable unit of a flattened plan.
#[derive(Debug, Clone)]
pub enum PlanUnit {
    Step(StepDefinition),
    LoopEnter(LoopId),
    LoopExit(LoopId),
}

/// Bounds and policy of one loop within the plan.
#[derive(Debug, Clone)]
pub struct LoopInfo {
    /// Index of the loop's `LoopEnter` marker.
    pub enter: usize,
    /// Index of the loop's `LoopExit` marker.
    pub exit: usize,
    pub kind: LoopKind,
    pub iteration_delay_secs: f64,
}

impl LoopInfo {
    pub fn iteration_delay(&self) -> std::time::Duration {
        std::time::Duration::try_from_secs_f64(self.iteration_delay_secs).unwrap_or_default()
    }
}

/// A linear rendering of a workflow definition.
///
/// Invariant: `len() == steps + 2 * loops`, and the enter/exit markers are
/// balanced and properly nested.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    units: Vec<PlanUnit>,
    loops: HashMap<LoopId, LoopInfo>,
}

impl ExecutionPlan {
    pub fn units(&self) -> &[PlanUnit] {
        &self.units
    }

    pub fn unit(&self, index: usize) -> Option<&PlanUnit> {
        self.units.get(index)
    }

    pub fn loop_info(&self, id: LoopId) -> Option<&LoopInfo> {
        self.loops.get(&id)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn loop_count(&self) -> usize {
        self.loops.len()
    }
}

/// Flatten a definition tree depth-first into an execution plan.
///
/// Rejects a counted loop with zero iterations, an empty loop body, and a
/// duplicate loop id. Definitions are trees by construction, but plans are
/// also built from loader output, so the id check guards against malformed
/// input rather than trusting it.
pub fn flatten(items: &[WorkflowItem]) -> Result<ExecutionPlan, EngineError> {
    let mut units = Vec::new();
    let mut loops = HashMap::new();
    flatten_into(items, &mut units, &mut loops)?;
    Ok(ExecutionPlan { units, loops })
}

fn flatten_into(
    items: &[WorkflowItem],
    units: &mut Vec<PlanUnit>,
    loops: &mut HashMap<LoopId, LoopInfo>,
) -> Result<(), EngineError> {
    for item in items {
        match item {
            WorkflowItem::Step(step) => units.push(PlanUnit::Step(step.clone())),
            WorkflowItem::Loop(def) => {
                if let LoopKind::Counted { iterations: 0 } = def.kind {
                    return Err(EngineError::Configuration(format!(
                        "loop {} declares zero iterations",
                        def.id
                    )));
                }
                if def.body.is_empty() {
                    return Err(EngineError::Configuration(format!(
                        "loop {} has an empty body",
                        def.id
                    )));
                }
                if loops.contains_key(&def.id) {
                    return Err(EngineError::Configuration(format!(
                        "duplicate loop id {}",
                        def.id
                    )));
                }

                let enter = units.len();
                units.push(PlanUnit::LoopEnter(def.id));
                // Registered before descending so a nested reuse of this id
                // is caught by the duplicate check above.
                loops.insert(
                    def.id,
                    LoopInfo {
                        enter,
                        exit: enter,
                        kind: def.kind.clone(),
                        iteration_delay_secs: def.iteration_delay_secs,
                    },
                );
                flatten_into(&def.body, units, loops)?;
                let exit = units.len();
                units.push(PlanUnit::LoopExit(def.id));
                if let Some(info) = loops.get_mut(&def.id) {
                    info.exit = exit;
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
