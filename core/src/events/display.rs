use serde::Serialize;

use crate::error::GraphError;
use crate::executor::PlanGraph;

use super::record::{PlanRecord, StepSnapshot};

/// A persisted plan grouped back into its execution layers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayView {
    pub plan_id: String,
    pub layers: Vec<Vec<StepSnapshot>>,
}

impl DisplayView {
    pub fn layer_ids(&self) -> Vec<Vec<String>> {
        self.layers
            .iter()
            .map(|layer| layer.iter().map(|s| s.id.clone()).collect())
            .collect()
    }
}

/// Rebuilds layers from recorded dependencies only. No tool is resolved or
/// called, and no sequential normalization is applied: records already hold
/// normalized dependencies.
pub fn rebuild_for_display(record: &PlanRecord) -> Result<DisplayView, GraphError> {
    let graph = PlanGraph::from_steps(&record.steps)?;
    let layers = graph
        .layers()?
        .into_iter()
        .map(|layer| {
            layer
                .into_iter()
                .filter_map(|id| graph.nodes.get(&id).cloned())
                .collect()
        })
        .collect();

    Ok(DisplayView {
        plan_id: record.plan_id.clone(),
        layers,
    })
}
