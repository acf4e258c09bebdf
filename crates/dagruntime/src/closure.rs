use crate::graph::Dag;
use dagcore::GraphError;
use petgraph::graph::NodeIndex;
use std::collections::HashMap;

/// Which nodes a caller wants back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Targets {
    /// Every node in the graph; nothing is released early
    All,
    Names(Vec<String>),
}

impl Targets {
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Targets::Names(names.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<String>> for Targets {
    fn from(names: Vec<String>) -> Self {
        Targets::Names(names)
    }
}

impl From<&[&str]> for Targets {
    fn from(names: &[&str]) -> Self {
        Targets::names(names.iter().copied())
    }
}

/// Topological execution order covering exactly the nodes needed for the
/// requested targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    order: Vec<String>,
    targets: Vec<String>,
}

impl ExecutionPlan {
    /// Resolve the closure of `targets` over `dag`.
    ///
    /// The order is a depth-first post-order starting from the targets in
    /// the given order and visiting inputs in declared order, so identical
    /// inputs always yield the identical sequence.
    pub fn resolve(dag: &Dag, targets: impl Into<Targets>) -> Result<ExecutionPlan, GraphError> {
        let targets = match targets.into() {
            Targets::All => dag.node_names(),
            Targets::Names(names) => {
                let mut unique: Vec<String> = Vec::with_capacity(names.len());
                for name in names {
                    if !unique.contains(&name) {
                        unique.push(name);
                    }
                }
                unique
            }
        };

        let mut roots = Vec::with_capacity(targets.len());
        for target in &targets {
            let idx = dag
                .index_of(target)
                .ok_or_else(|| GraphError::UnknownTarget(target.clone()))?;
            roots.push(idx);
        }

        let order: Vec<String> = post_order(dag, &roots)?
            .into_iter()
            .map(|idx| dag.node_at(idx).name().to_string())
            .collect();

        tracing::debug!(
            "Resolved plan: {} of {} nodes for {} targets",
            order.len(),
            dag.len(),
            targets.len()
        );

        Ok(ExecutionPlan { order, targets })
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn is_target(&self, name: &str) -> bool {
        self.targets.iter().any(|t| t == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.order.iter().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of planned consumers of each planned node
    pub fn consumer_counts(&self, dag: &Dag) -> HashMap<String, usize> {
        let mut counts: HashMap<String, usize> =
            self.order.iter().map(|name| (name.clone(), 0)).collect();
        for name in &self.order {
            for input in dag.inputs(name) {
                if let Some(count) = counts.get_mut(input) {
                    *count += 1;
                }
            }
        }
        counts
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

/// Iterative depth-first post-order from `roots` over producer edges.
///
/// Each reachable node appears once, after all of its inputs. Reaching a
/// node that is still on the current path fails with the full cycle.
pub(crate) fn post_order(dag: &Dag, roots: &[NodeIndex]) -> Result<Vec<NodeIndex>, GraphError> {
    let mut marks: HashMap<NodeIndex, Mark> =
        dag.node_indices().map(|idx| (idx, Mark::Unvisited)).collect();
    let mut order = Vec::new();

    for &root in roots {
        if marks[&root] == Mark::Done {
            continue;
        }

        // (node, its producers, next producer to visit)
        let mut stack: Vec<(NodeIndex, Vec<NodeIndex>, usize)> =
            vec![(root, dag.input_indices(root), 0)];
        marks.insert(root, Mark::OnPath);

        while let Some((node, producers, next)) = stack.last_mut() {
            if *next < producers.len() {
                let producer = producers[*next];
                *next += 1;
                match marks[&producer] {
                    Mark::Done => {}
                    Mark::OnPath => {
                        let start = stack
                            .iter()
                            .position(|(idx, _, _)| *idx == producer)
                            .unwrap_or(0);
                        let path = stack[start..]
                            .iter()
                            .map(|(idx, _, _)| dag.node_at(*idx).name().to_string())
                            .collect();
                        return Err(GraphError::Cycle { path });
                    }
                    Mark::Unvisited => {
                        marks.insert(producer, Mark::OnPath);
                        stack.push((producer, dag.input_indices(producer), 0));
                    }
                }
            } else {
                let node = *node;
                marks.insert(node, Mark::Done);
                order.push(node);
                stack.pop();
            }
        }
    }

    Ok(order)
}
