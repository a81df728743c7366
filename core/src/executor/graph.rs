use std::collections::{HashMap, HashSet};

use crate::error::GraphError;
use crate::plan::{positional_step_id, Plan, Step, StepDescriptor, StepStatus};

/// Anything the graph can layer: live steps and persisted snapshots alike.
pub trait StepLike: Clone + Send + Sync {
    fn id(&self) -> &str;
    fn dependencies(&self) -> &[String];
}

impl StepLike for Step {
    fn id(&self) -> &str {
        &self.id
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }
}

/// Step dependency graph (DAG)
#[derive(Debug, Clone)]
pub struct PlanGraph<T: StepLike> {
    /// Step nodes: step_id -> step
    pub nodes: HashMap<String, T>,

    /// Dependency edges: step_id -> list of dependencies
    pub edges: HashMap<String, Vec<String>>,

    /// Original insertion order (for stable layering and cycle reports)
    insertion_order: Vec<String>,
}

impl<T: StepLike> PlanGraph<T> {
    /// Construct the graph from steps in plan order.
    pub fn from_steps(steps: &[T]) -> Result<Self, GraphError> {
        let mut nodes = HashMap::with_capacity(steps.len());
        let mut edges = HashMap::with_capacity(steps.len());
        let mut insertion_order = Vec::with_capacity(steps.len());

        for (position, step) in steps.iter().enumerate() {
            if step.id().trim().is_empty() {
                return Err(GraphError::EmptyStepId(position + 1));
            }
            if nodes.contains_key(step.id()) {
                return Err(GraphError::DuplicateStepId(step.id().to_string()));
            }

            let step_id = step.id().to_string();
            nodes.insert(step_id.clone(), step.clone());
            edges.insert(step_id.clone(), step.dependencies().to_vec());
            insertion_order.push(step_id);
        }

        Ok(Self {
            nodes,
            edges,
            insertion_order,
        })
    }

    pub fn len(&self) -> usize {
        self.insertion_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insertion_order.is_empty()
    }

    /// Step ids in plan order.
    pub fn order(&self) -> &[String] {
        &self.insertion_order
    }

    /// Validate dependency relationships
    pub fn validate(&self) -> Result<(), GraphError> {
        for step_id in &self.insertion_order {
            for dep in &self.edges[step_id] {
                if !self.nodes.contains_key(dep) {
                    return Err(GraphError::DependencyNotFound {
                        step_id: step_id.clone(),
                        missing_dep: dep.clone(),
                    });
                }
            }
        }

        if let Some(cycle) = self.detect_cycle() {
            return Err(GraphError::CircularDependency(cycle));
        }

        Ok(())
    }

    /// Dependency depth of every step: 0 without dependencies, else one more
    /// than the deepest dependency. Memoized, so shared ancestors in diamond
    /// shapes are visited once.
    ///
    /// Iterative post-order walk; chain length is not bounded by the call
    /// stack. Requires a validated graph: an edge back onto the current walk
    /// is ignored.
    pub fn depths(&self) -> HashMap<String, usize> {
        let mut memo: HashMap<String, usize> = HashMap::with_capacity(self.nodes.len());
        let mut walking: HashSet<&str> = HashSet::new();
        let mut frames: Vec<(&str, usize)> = Vec::new();

        for root in &self.insertion_order {
            if memo.contains_key(root) {
                continue;
            }
            walking.insert(root.as_str());
            frames.push((root.as_str(), 0));

            while let Some(&(node, next)) = frames.last() {
                let deps = self.deps_of(node);
                if let Some(dep) = deps.get(next) {
                    if let Some(top) = frames.last_mut() {
                        top.1 += 1;
                    }
                    if !memo.contains_key(dep) && walking.insert(dep.as_str()) {
                        frames.push((dep.as_str(), 0));
                    }
                    continue;
                }

                frames.pop();
                walking.remove(node);
                let depth = deps
                    .iter()
                    .filter_map(|dep| memo.get(dep))
                    .map(|d| d + 1)
                    .max()
                    .unwrap_or(0);
                memo.insert(node.to_string(), depth);
            }
        }

        memo
    }

    fn deps_of(&self, node: &str) -> &[String] {
        self.edges.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Execution layers, validated first.
    ///
    /// Layers are ordered by depth; steps inside a layer keep plan order.
    pub fn layers(&self) -> Result<Vec<Vec<String>>, GraphError> {
        self.validate()?;

        let depths = self.depths();
        let layer_count = depths.values().max().map_or(0, |max| max + 1);
        let mut layers = vec![Vec::new(); layer_count];

        for step_id in &self.insertion_order {
            layers[depths[step_id]].push(step_id.clone());
        }

        Ok(layers)
    }

    /// Detect circular dependencies using DFS with an explicit stack
    ///
    /// Roots are tried in plan order and dependencies in declared order, so
    /// the reported path is stable.
    fn detect_cycle(&self) -> Option<String> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut on_path: HashSet<&str> = HashSet::new();
        let mut path: Vec<&str> = Vec::new();
        let mut frames: Vec<(&str, usize)> = Vec::new();

        for root in &self.insertion_order {
            let root = root.as_str();
            if !visited.insert(root) {
                continue;
            }
            on_path.insert(root);
            path.push(root);
            frames.push((root, 0));

            while let Some(&(node, next)) = frames.last() {
                let Some(dep) = self.deps_of(node).get(next) else {
                    frames.pop();
                    path.pop();
                    on_path.remove(node);
                    continue;
                };
                if let Some(top) = frames.last_mut() {
                    top.1 += 1;
                }

                if on_path.contains(dep.as_str()) {
                    let pos = path.iter().position(|n| *n == dep.as_str())?;
                    let mut cycle = path[pos..].to_vec();
                    cycle.push(dep.as_str());
                    return Some(format_cycle_path(&cycle));
                }

                let dep = dep.as_str();
                if visited.insert(dep) {
                    on_path.insert(dep);
                    path.push(dep);
                    frames.push((dep, 0));
                }
            }
        }

        None
    }
}

fn format_cycle_path(stack: &[&str]) -> String {
    stack.join(" -> ")
}

/// A validated plan together with its execution layers.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanDag {
    pub plan: Plan,
    pub layers: Vec<Vec<String>>,
}

impl PlanDag {
    pub fn plan_id(&self) -> &str {
        &self.plan.id
    }

    pub fn step_count(&self) -> usize {
        self.plan.steps.len()
    }

    /// Layer index of a step.
    pub fn layer_of(&self, step_id: &str) -> Option<usize> {
        self.layers
            .iter()
            .position(|layer| layer.iter().any(|id| id == step_id))
    }
}

/// Turns parsed descriptors into a validated DAG.
///
/// Missing ids become `step-<n>`. When no step declares dependencies the plan
/// is read as a sequence (see [`normalize_sequential`]). Repeated entries in
/// one dependency list collapse to one.
pub fn build_plan(
    plan_id: impl Into<String>,
    descriptors: Vec<StepDescriptor>,
) -> Result<PlanDag, GraphError> {
    let mut steps: Vec<Step> = descriptors
        .into_iter()
        .enumerate()
        .map(|(index, d)| Step {
            id: d.id.unwrap_or_else(|| positional_step_id(index)),
            tool: d.tool,
            input: d.input,
            reason: d.reason,
            dependencies: dedup_preserving_order(d.dependencies),
            status: StepStatus::Pending,
            error: None,
            output: None,
        })
        .collect();

    if normalize_sequential(&mut steps) {
        tracing::debug!(steps = steps.len(), "no dependencies declared, chaining steps");
    }

    let graph = PlanGraph::from_steps(&steps)?;
    let layers = graph.layers()?;

    Ok(PlanDag {
        plan: Plan {
            id: plan_id.into(),
            steps,
        },
        layers,
    })
}

/// If no step declares any dependency, make step *i* depend on step *i-1*.
///
/// Returns whether the chain was applied.
pub fn normalize_sequential(steps: &mut [Step]) -> bool {
    if steps.len() < 2 || steps.iter().any(|s| !s.dependencies.is_empty()) {
        return false;
    }

    for i in 1..steps.len() {
        let previous = steps[i - 1].id.clone();
        steps[i].dependencies = vec![previous];
    }
    true
}

fn dedup_preserving_order(deps: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(deps.len());
    deps.into_iter().filter(|d| seen.insert(d.clone())).collect()
}
