//! Inter-class graphs: class references (FANIN, FANOUT, CA) and
//! inheritance depth (DIT).

use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::model::resolve::{direct_superclasses, resolve_alias};
use crate::model::visit::{walk_class, walk_expr, Visitor};
use crate::model::{Expr, Location, Snapshot};

/// Directed graph of class-to-class references, one node per class.
pub struct ReferenceGraph {
    graph: DiGraph<Location, ()>,
    nodes: HashMap<Location, NodeIndex>,
}

impl ReferenceGraph {
    pub fn build(snapshot: &Snapshot) -> Self {
        let mut graph: DiGraph<Location, ()> = DiGraph::new();
        let mut nodes: HashMap<Location, NodeIndex> = HashMap::new();
        let mut by_name: HashMap<&str, Vec<NodeIndex>> = HashMap::new();

        for (loc, class) in snapshot.classes() {
            let idx = graph.add_node(loc.clone());
            nodes.insert(loc, idx);
            by_name.entry(class.name.as_str()).or_default().push(idx);
        }

        for (loc, class) in snapshot.classes() {
            let Some(container) = snapshot.container(&loc.file) else {
                continue;
            };
            let from = nodes[&loc];
            let mut names = NameCollector::default();
            walk_class(&mut names, class);

            let mut targets: HashSet<NodeIndex> = HashSet::new();
            for name in &names.names {
                let canonical = resolve_alias(container, name);
                if canonical == class.name {
                    continue;
                }
                if let Some(found) = by_name.get(canonical) {
                    targets.extend(found.iter().copied().filter(|&to| to != from));
                }
            }
            for to in targets {
                graph.add_edge(from, to, ());
            }
        }

        Self { graph, nodes }
    }

    /// Distinct classes referenced by the class at `loc`.
    pub fn fan_out(&self, loc: &Location) -> usize {
        self.neighbors(loc, Direction::Outgoing).count()
    }

    /// Distinct classes referencing the class at `loc`.
    pub fn fan_in(&self, loc: &Location) -> usize {
        self.neighbors(loc, Direction::Incoming).count()
    }

    /// Distinct classes in other files referencing the class at `loc`.
    pub fn afferent(&self, loc: &Location) -> usize {
        self.neighbors(loc, Direction::Incoming)
            .filter(|idx| self.graph[*idx].file != loc.file)
            .count()
    }

    fn neighbors<'g>(
        &'g self,
        loc: &Location,
        direction: Direction,
    ) -> impl Iterator<Item = NodeIndex> + 'g {
        self.nodes
            .get(loc)
            .into_iter()
            .flat_map(move |&idx| self.graph.neighbors_directed(idx, direction))
    }
}

/// Every bare identifier mentioned anywhere in a class.
#[derive(Default)]
struct NameCollector {
    names: HashSet<String>,
}

impl Visitor for NameCollector {
    fn visit_expr(&mut self, expr: &Expr) {
        if let Expr::Name(id) = expr {
            self.names.insert(id.clone());
        }
        walk_expr(self, expr);
    }
}

/// Depth of inheritance for every class, memoized over the inheritance
/// graph. Cycles count as roots.
pub fn inheritance_depths(snapshot: &Snapshot) -> HashMap<Location, usize> {
    let mut graph: DiGraph<Location, ()> = DiGraph::new();
    let mut nodes: HashMap<Location, NodeIndex> = HashMap::new();
    for loc in snapshot.class_locations() {
        let idx = graph.add_node(loc.clone());
        nodes.insert(loc, idx);
    }
    for (loc, &child) in &nodes {
        for parent in direct_superclasses(snapshot, loc) {
            if let Some(&p) = nodes.get(&parent) {
                graph.add_edge(child, p, ());
            }
        }
    }

    let mut memo: HashMap<NodeIndex, usize> = HashMap::new();
    let mut on_stack: HashSet<NodeIndex> = HashSet::new();
    for idx in graph.node_indices() {
        depth(&graph, idx, &mut memo, &mut on_stack);
    }

    nodes
        .into_iter()
        .map(|(loc, idx)| (loc, memo.get(&idx).copied().unwrap_or(0)))
        .collect()
}

fn depth(
    graph: &DiGraph<Location, ()>,
    node: NodeIndex,
    memo: &mut HashMap<NodeIndex, usize>,
    on_stack: &mut HashSet<NodeIndex>,
) -> usize {
    if let Some(&d) = memo.get(&node) {
        return d;
    }
    if !on_stack.insert(node) {
        return 0;
    }
    let parents: Vec<NodeIndex> = graph.neighbors_directed(node, Direction::Outgoing).collect();
    let d = parents
        .into_iter()
        .map(|p| depth(graph, p, memo, on_stack) + 1)
        .max()
        .unwrap_or(0);
    on_stack.remove(&node);
    memo.insert(node, d);
    d
}
