use crate::closure;
use crate::registry::FunctionRegistry;
use dagcore::{FunctionSpec, GraphError};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, HashSet};

/// What a graph node stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Function,
    Data,
}

#[derive(Debug, Clone)]
pub(crate) enum DagNode {
    Function(FunctionSpec),
    Data(String),
}

impl DagNode {
    pub(crate) fn name(&self) -> &str {
        match self {
            DagNode::Function(spec) => &spec.name,
            DagNode::Data(name) => name,
        }
    }
}

/// Immutable dependency graph over function and data nodes.
///
/// Edges point from producer to consumer and are derived from each
/// function's declared inputs at build time.
#[derive(Debug, Clone)]
pub struct Dag {
    graph: DiGraph<DagNode, ()>,
    indices: HashMap<String, NodeIndex>,
    shadowed: Vec<String>,
}

impl Dag {
    /// Build the graph for a registry and the names of the supplied data.
    ///
    /// A supplied data name always wins over a function of the same name;
    /// the function is left out of the graph entirely.
    pub fn build<I, S>(registry: &FunctionRegistry, supplied_data: I) -> Result<Dag, GraphError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut data_names: Vec<String> = supplied_data
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .collect();
        data_names.sort();
        data_names.dedup();
        let supplied: HashSet<&str> = data_names.iter().map(String::as_str).collect();

        let mut graph = DiGraph::new();
        let mut indices = HashMap::new();
        let mut shadowed = Vec::new();

        for spec in registry.iter() {
            if supplied.contains(spec.name.as_str()) {
                tracing::debug!("Supplied data shadows function: {}", spec.name);
                shadowed.push(spec.name.clone());
                continue;
            }
            if spec.inputs.iter().any(|input| input == &spec.name) {
                return Err(GraphError::SelfDependency(spec.name.clone()));
            }
            let idx = graph.add_node(DagNode::Function(spec.clone()));
            indices.insert(spec.name.clone(), idx);
        }

        for name in &data_names {
            let idx = graph.add_node(DagNode::Data(name.clone()));
            indices.insert(name.clone(), idx);
        }

        // Derive producer -> consumer edges
        for consumer in graph.node_indices().collect::<Vec<_>>() {
            let DagNode::Function(spec) = &graph[consumer] else {
                continue;
            };
            let mut producers = Vec::with_capacity(spec.inputs.len());
            for input in &spec.inputs {
                let producer = indices.get(input).ok_or_else(|| GraphError::UnresolvedInput {
                    missing: input.clone(),
                    required_by: spec.name.clone(),
                })?;
                producers.push(*producer);
            }
            for producer in producers {
                graph.add_edge(producer, consumer, ());
            }
        }

        let dag = Dag {
            graph,
            indices,
            shadowed,
        };

        // Check for cycles, then recover the full path for the diagnostic
        if toposort(&dag.graph, None).is_err() {
            let roots: Vec<NodeIndex> = dag.graph.node_indices().collect();
            closure::post_order(&dag, &roots)?;
        }

        tracing::info!(
            "Built graph: {} functions, {} data nodes, {} edges",
            dag.function_names().len(),
            dag.data_names().len(),
            dag.graph.edge_count()
        );

        Ok(dag)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.indices.contains_key(name)
    }

    pub fn kind(&self, name: &str) -> Option<NodeKind> {
        self.node(name).map(|node| match node {
            DagNode::Function(_) => NodeKind::Function,
            DagNode::Data(_) => NodeKind::Data,
        })
    }

    /// The function spec behind `name`, if it is a function node
    pub fn spec(&self, name: &str) -> Option<&FunctionSpec> {
        match self.node(name)? {
            DagNode::Function(spec) => Some(spec),
            DagNode::Data(_) => None,
        }
    }

    /// Declared inputs of `name`; empty for data nodes
    pub fn inputs(&self, name: &str) -> &[String] {
        self.spec(name).map(|spec| spec.inputs.as_slice()).unwrap_or(&[])
    }

    /// Nodes that declare `name` as an input, in graph order
    pub fn consumers(&self, name: &str) -> Vec<String> {
        let Some(&idx) = self.indices.get(name) else {
            return Vec::new();
        };
        let mut consumers: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .collect();
        consumers.sort();
        consumers.dedup();
        consumers
            .into_iter()
            .map(|c| self.graph[c].name().to_string())
            .collect()
    }

    /// Every node name: functions in registration order, then data sorted
    pub fn node_names(&self) -> Vec<String> {
        self.graph
            .node_indices()
            .map(|idx| self.graph[idx].name().to_string())
            .collect()
    }

    pub fn function_names(&self) -> Vec<String> {
        self.names_of(NodeKind::Function)
    }

    pub fn data_names(&self) -> Vec<String> {
        self.names_of(NodeKind::Data)
    }

    /// Registered functions left out because data of the same name was supplied
    pub fn shadowed(&self) -> &[String] {
        &self.shadowed
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub(crate) fn index_of(&self, name: &str) -> Option<NodeIndex> {
        self.indices.get(name).copied()
    }

    pub(crate) fn node_at(&self, idx: NodeIndex) -> &DagNode {
        &self.graph[idx]
    }

    pub(crate) fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    /// Producer indices of `idx` in declared input order
    pub(crate) fn input_indices(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        match &self.graph[idx] {
            DagNode::Function(spec) => spec
                .inputs
                .iter()
                .filter_map(|input| self.indices.get(input).copied())
                .collect(),
            DagNode::Data(_) => Vec::new(),
        }
    }

    fn node(&self, name: &str) -> Option<&DagNode> {
        self.indices.get(name).map(|&idx| &self.graph[idx])
    }

    fn names_of(&self, kind: NodeKind) -> Vec<String> {
        self.graph
            .node_indices()
            .filter(|&idx| {
                matches!(
                    (&self.graph[idx], kind),
                    (DagNode::Function(_), NodeKind::Function) | (DagNode::Data(_), NodeKind::Data)
                )
            })
            .map(|idx| self.graph[idx].name().to_string())
            .collect()
    }
}
