//! Evaluation plans
//!
//! A plan holds every compiled formula of a table and the order in which
//! settings are visited. It is built once per table and shared by clones.

use crate::diagnostic::ExpressionRole;
use crate::resolver::EvaluationOrder;
use crate::table::Setting;
use ahash::AHashMap;
use presetkit_formula::{CompileError, CompiledExpression, DependencyGraph, ExpressionCompiler};
use std::sync::Arc;
use thiserror::Error;

/// Why a formula cannot be evaluated at all
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("Unknown reference: {0}")]
    UnknownReference(String),
}

pub(crate) type PlanExpression = Result<Arc<CompiledExpression>, PlanError>;

/// Compiled formulas of one setting
#[derive(Debug, Clone, Default)]
pub(crate) struct PlanEntry {
    pub value: Option<PlanExpression>,
    pub minimum: Option<PlanExpression>,
    pub maximum: Option<PlanExpression>,
    pub enabled: Option<PlanExpression>,
}

impl PlanEntry {
    fn roles(&self) -> impl Iterator<Item = (ExpressionRole, &PlanExpression)> {
        [
            (ExpressionRole::Value, self.value.as_ref()),
            (ExpressionRole::Minimum, self.minimum.as_ref()),
            (ExpressionRole::Maximum, self.maximum.as_ref()),
            (ExpressionRole::Enabled, self.enabled.as_ref()),
        ]
        .into_iter()
        .filter_map(|(role, expr)| expr.map(|e| (role, e)))
    }
}

/// Compiled formulas plus visiting order for one table
#[derive(Debug)]
pub struct EvaluationPlan {
    order_kind: EvaluationOrder,
    order: Vec<usize>,
    cyclic: Vec<usize>,
    pub(crate) entries: Vec<PlanEntry>,
}

impl EvaluationPlan {
    pub(crate) fn build(
        settings: &[Setting],
        index: &AHashMap<String, usize>,
        order_kind: EvaluationOrder,
        compiler: &ExpressionCompiler,
    ) -> Self {
        let compile = |source: Option<&String>| -> Option<PlanExpression> {
            source.map(|source| {
                let compiled = compiler.compile(source)?;
                match compiled
                    .references()
                    .iter()
                    .find(|r| !index.contains_key(r.as_str()))
                {
                    Some(missing) => Err(PlanError::UnknownReference(missing.clone())),
                    None => Ok(compiled),
                }
            })
        };

        let entries: Vec<PlanEntry> = settings
            .iter()
            .map(|setting| {
                let def = setting.definition();
                PlanEntry {
                    value: compile(def.value_expression.as_ref()),
                    minimum: compile(def.minimum_expression.as_ref()),
                    maximum: compile(def.maximum_expression.as_ref()),
                    enabled: compile(def.enabled_expression.as_ref()),
                }
            })
            .collect();

        let (order, cyclic) = match order_kind {
            EvaluationOrder::Declared => ((0..settings.len()).collect(), Vec::new()),
            EvaluationOrder::Dependency => {
                let graph = dependency_graph(&entries, index);
                let sorted = graph.evaluation_order();
                (sorted.order, sorted.cyclic)
            }
        };

        tracing::debug!(
            settings = settings.len(),
            order = ?order_kind,
            cyclic = cyclic.len(),
            "built evaluation plan"
        );

        Self {
            order_kind,
            order,
            cyclic,
            entries,
        }
    }

    pub fn order_kind(&self) -> EvaluationOrder {
        self.order_kind
    }

    /// Setting slots in visiting order
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Slots on a reference cycle (dependency order only)
    pub fn cyclic(&self) -> &[usize] {
        &self.cyclic
    }
}

/// Edges from every referenced key to the setting reading it.
///
/// An `enabled` formula runs after its own setting is written, so reading
/// its own key is not a dependency.
fn dependency_graph(entries: &[PlanEntry], index: &AHashMap<String, usize>) -> DependencyGraph {
    let mut graph = DependencyGraph::with_nodes(entries.len());

    for (slot, entry) in entries.iter().enumerate() {
        for (role, expr) in entry.roles() {
            let Ok(compiled) = expr else { continue };
            for reference in compiled.references() {
                let Some(&precedent) = index.get(reference) else {
                    continue;
                };
                if precedent == slot && role == ExpressionRole::Enabled {
                    continue;
                }
                graph.add_dependency(precedent, slot);
            }
        }
    }

    graph
}
