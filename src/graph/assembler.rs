//! Graph assembly and integrity validation
//!
//! [`GraphAssembler`] concatenates per-statement [`Subgraph`]s into one
//! [`CompiledGraph`], allocating ids from a counter per prefix that is shared
//! by every statement of the compilation.

use crate::graph::error::{GraphError, GraphResult};
use crate::graph::operation::{Operation, OperationId, OperationKind, OperationSpec};
use crate::graph::subgraph::Subgraph;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::trace;

/// Directed `parent -> child` edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub parent: OperationId,
    pub child: OperationId,
}

/// The complete output of one compilation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledGraph {
    /// Nodes in insertion order
    pub operations: Vec<Operation>,
    /// Edges in wiring order
    pub edges: Vec<Edge>,
    /// Reference instant every relative time was resolved against
    pub now: DateTime<Utc>,
}

impl CompiledGraph {
    /// Find a node by id
    pub fn operation(&self, id: &str) -> Option<&Operation> {
        self.operations.iter().find(|op| op.id == id)
    }

    /// Parents of a node, in edge order
    pub fn parents(&self, id: &str) -> Vec<&OperationId> {
        self.edges
            .iter()
            .filter(|e| e.child == id)
            .map(|e| &e.parent)
            .collect()
    }

    /// Children of a node, in edge order
    pub fn children(&self, id: &str) -> Vec<&OperationId> {
        self.edges
            .iter()
            .filter(|e| e.parent == id)
            .map(|e| &e.child)
            .collect()
    }

    /// Nodes of one kind, in insertion order
    pub fn operations_of_kind(&self, kind: OperationKind) -> Vec<&Operation> {
        self.operations.iter().filter(|op| op.kind() == kind).collect()
    }

    /// Yield nodes with their result names, in insertion order
    pub fn yields(&self) -> Vec<(&str, &OperationId)> {
        self.operations
            .iter()
            .filter_map(|op| match &op.spec {
                OperationSpec::Yield(spec) => Some((spec.name.as_str(), &op.id)),
                _ => None,
            })
            .collect()
    }

    /// Ids from a source down to `id`, following the first parent of each node
    pub fn lineage(&self, id: &str) -> Vec<&OperationId> {
        let mut chain = Vec::new();
        let mut current = self.operation(id).map(|op| &op.id);
        while let Some(node) = current {
            // Bounded by the node count so a malformed graph cannot spin
            if chain.len() > self.operations.len() {
                break;
            }
            chain.push(node);
            current = self.parents(node.as_str()).first().copied();
        }
        chain.reverse();
        chain
    }

    /// Check that the graph is a DAG whose roots are exactly the source scans
    /// and whose every node is reachable from one of them
    pub fn validate(&self) -> GraphResult<()> {
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(self.operations.len());
        for (i, op) in self.operations.iter().enumerate() {
            if index.insert(op.id.as_str(), i).is_some() {
                return Err(GraphError::DuplicateId(op.id.to_string()));
            }
        }

        let n = self.operations.len();
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut in_degree = vec![0usize; n];
        for edge in &self.edges {
            let (parent, child) = match (
                index.get(edge.parent.as_str()),
                index.get(edge.child.as_str()),
            ) {
                (Some(&p), Some(&c)) => (p, c),
                _ => {
                    return Err(GraphError::DanglingEdge {
                        parent: edge.parent.to_string(),
                        child: edge.child.to_string(),
                    })
                }
            };
            if parent == child {
                return Err(GraphError::Cycle(edge.parent.to_string()));
            }
            children[parent].push(child);
            in_degree[child] += 1;
        }

        for (op, &degree) in self.operations.iter().zip(&in_degree) {
            match (op.kind() == OperationKind::From, degree) {
                (true, d) if d > 0 => return Err(GraphError::SourceWithParent(op.id.to_string())),
                (false, 0) => return Err(GraphError::Orphan(op.id.to_string())),
                _ => {}
            }
        }

        // Kahn's algorithm
        let mut remaining = in_degree.clone();
        let mut queue: VecDeque<usize> = (0..n).filter(|&i| remaining[i] == 0).collect();
        let mut visited = vec![false; n];
        let mut processed = 0;
        while let Some(node) = queue.pop_front() {
            visited[node] = true;
            processed += 1;
            for &child in &children[node] {
                remaining[child] -= 1;
                if remaining[child] == 0 {
                    queue.push_back(child);
                }
            }
        }
        if processed < n {
            if let Some(i) = (0..n).find(|&i| remaining[i] > 0) {
                return Err(GraphError::Cycle(self.operations[i].id.to_string()));
            }
        }

        // Every root is a source, so topological order visits exactly the
        // nodes reachable from sources
        if let Some(i) = visited.iter().position(|v| !v) {
            return Err(GraphError::Unreachable(self.operations[i].id.to_string()));
        }

        Ok(())
    }
}

/// Collects statement subgraphs under one id namespace
#[derive(Debug)]
pub struct GraphAssembler {
    operations: Vec<Operation>,
    edges: Vec<Edge>,
    counters: HashMap<&'static str, usize>,
    now: DateTime<Utc>,
}

impl GraphAssembler {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            operations: Vec::new(),
            edges: Vec::new(),
            counters: HashMap::new(),
            now,
        }
    }

    /// Append a subgraph, returning the ids assigned to its nodes by index
    pub fn append(&mut self, subgraph: Subgraph) -> GraphResult<Vec<OperationId>> {
        let (nodes, edges) = subgraph.into_parts();

        let mut ids = Vec::with_capacity(nodes.len());
        for spec in nodes {
            let id = self.next_id(spec.id_prefix());
            trace!(id = %id, kind = %spec.kind(), "Allocated operation");
            ids.push(id.clone());
            self.operations.push(Operation { id, spec });
        }

        for (parent, child) in edges {
            match (ids.get(parent.index()), ids.get(child.index())) {
                (Some(p), Some(c)) => {
                    trace!(parent = %p, child = %c, "Wired edge");
                    self.edges.push(Edge {
                        parent: p.clone(),
                        child: c.clone(),
                    });
                }
                _ => {
                    return Err(GraphError::DanglingEdge {
                        parent: format!("#{}", parent.index()),
                        child: format!("#{}", child.index()),
                    })
                }
            }
        }

        Ok(ids)
    }

    fn next_id(&mut self, prefix: &'static str) -> OperationId {
        let counter = self.counters.entry(prefix).or_insert(0);
        let id = OperationId::new(format!("{}{}", prefix, counter));
        *counter += 1;
        id
    }

    /// Validate and package the graph
    pub fn finish(self) -> GraphResult<CompiledGraph> {
        let graph = CompiledGraph {
            operations: self.operations,
            edges: self.edges,
            now: self.now,
        };
        graph.validate()?;
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::operation::{BucketId, FromSpec, GroupSpec, RangeSpec, YieldSpec};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn chain(name: &str) -> Subgraph {
        let mut sub = Subgraph::new();
        let from = sub.add_source(OperationSpec::From(FromSpec {
            bucket: BucketId::new("b"),
        }));
        let range = sub.add(OperationSpec::Range(RangeSpec::new(0, 10)), from);
        sub.add(
            OperationSpec::Yield(YieldSpec {
                name: name.to_string(),
            }),
            range,
        );
        sub
    }

    fn op(id: &str, spec: OperationSpec) -> Operation {
        Operation {
            id: OperationId::new(id),
            spec,
        }
    }

    fn edge(parent: &str, child: &str) -> Edge {
        Edge {
            parent: OperationId::new(parent),
            child: OperationId::new(child),
        }
    }

    #[test]
    fn test_ids_are_counted_per_prefix_across_subgraphs() {
        let mut assembler = GraphAssembler::new(now());
        let first = assembler.append(chain("0")).unwrap();
        let second = assembler.append(chain("1")).unwrap();
        let graph = assembler.finish().unwrap();

        let ids = |names: [&str; 3]| names.map(OperationId::new).to_vec();
        assert_eq!(first, ids(["from0", "range0", "yield0"]));
        assert_eq!(second, ids(["from1", "range1", "yield1"]));
        assert_eq!(graph.edges.len(), 4);
        assert_eq!(graph.edges[2], edge("from1", "range1"));
        assert_eq!(graph.yields(), vec![("0", &first[2]), ("1", &second[2])]);
        assert_eq!(graph.now, now());
    }

    #[test]
    fn test_lineage() {
        let mut assembler = GraphAssembler::new(now());
        assembler.append(chain("0")).unwrap();
        let graph = assembler.finish().unwrap();

        let lineage: Vec<_> = graph.lineage("yield0").iter().map(|id| id.as_str()).collect();
        assert_eq!(lineage, vec!["from0", "range0", "yield0"]);
        assert!(graph.lineage("missing").is_empty());
    }

    #[test]
    fn test_validate_rejects_cycle() {
        let graph = CompiledGraph {
            operations: vec![
                op("from0", OperationSpec::From(FromSpec { bucket: BucketId::new("b") })),
                op("group0", OperationSpec::Group(GroupSpec { by: vec![] })),
                op("group1", OperationSpec::Group(GroupSpec { by: vec![] })),
            ],
            edges: vec![
                edge("from0", "group0"),
                edge("group0", "group1"),
                edge("group1", "group0"),
            ],
            now: now(),
        };

        assert!(matches!(graph.validate(), Err(GraphError::Cycle(_))));
    }

    #[test]
    fn test_validate_rejects_orphan_and_dangling() {
        let orphan = CompiledGraph {
            operations: vec![
                op("from0", OperationSpec::From(FromSpec { bucket: BucketId::new("b") })),
                op("range0", OperationSpec::Range(RangeSpec::new(0, 1))),
            ],
            edges: vec![],
            now: now(),
        };
        assert_eq!(orphan.validate(), Err(GraphError::Orphan("range0".into())));

        let dangling = CompiledGraph {
            operations: vec![op(
                "from0",
                OperationSpec::From(FromSpec { bucket: BucketId::new("b") }),
            )],
            edges: vec![edge("from0", "nowhere")],
            now: now(),
        };
        assert!(matches!(
            dangling.validate(),
            Err(GraphError::DanglingEdge { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_duplicates_and_fed_sources() {
        let duplicate = CompiledGraph {
            operations: vec![
                op("from0", OperationSpec::From(FromSpec { bucket: BucketId::new("b") })),
                op("from0", OperationSpec::From(FromSpec { bucket: BucketId::new("c") })),
            ],
            edges: vec![],
            now: now(),
        };
        assert_eq!(
            duplicate.validate(),
            Err(GraphError::DuplicateId("from0".into()))
        );

        let fed = CompiledGraph {
            operations: vec![
                op("from0", OperationSpec::From(FromSpec { bucket: BucketId::new("b") })),
                op("from1", OperationSpec::From(FromSpec { bucket: BucketId::new("b") })),
            ],
            edges: vec![edge("from0", "from1")],
            now: now(),
        };
        assert_eq!(
            fed.validate(),
            Err(GraphError::SourceWithParent("from1".into()))
        );
    }

    #[test]
    fn test_serialized_shape() {
        let mut assembler = GraphAssembler::new(now());
        assembler.append(chain("0")).unwrap();
        let graph = assembler.finish().unwrap();
        let json = serde_json::to_value(&graph).unwrap();

        assert_eq!(json["operations"][0]["id"], "from0");
        assert_eq!(json["operations"][0]["kind"], "from");
        assert_eq!(json["operations"][0]["bucket"], "b");
        assert_eq!(json["edges"][0]["parent"], "from0");
        assert_eq!(json["now"], "2024-01-01T00:00:00Z");
    }
}
