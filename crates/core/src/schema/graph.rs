//! Dependency graph and declaration order
//!
//! Each node is one rendered declaration. Dependencies are found by scanning
//! the rendered text for qualified `module::Name` paths that name another
//! node, so whatever the emitter writes is exactly what gets ordered.

use std::collections::HashMap;

use tracing::{debug, error};

/// A rendered declaration, as input to the graph
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphNode {
    /// Qualified name other bodies reference this node by (`module::Name`)
    pub name: String,
    /// Rendered declaration text
    pub body: String,
    /// Other qualified names declared inside `body` (nested enums)
    pub declares: Vec<String>,
}

/// Result of [`DependencyGraph::sort`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SortOutcome {
    /// Every node, dependencies first
    pub order: Vec<String>,
    /// Strongly connected sets of nodes that reference each other
    pub cycles: Vec<Vec<String>>,
}

impl SortOutcome {
    pub fn has_cycles(&self) -> bool {
        !self.cycles.is_empty()
    }
}

/// Directed "must be declared before" graph over rendered declarations
#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    names: Vec<String>,
    index: HashMap<String, usize>,
    /// Per node, indices of its dependencies in first-reference order
    edges: Vec<Vec<usize>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

impl DependencyGraph {
    /// Build the graph from rendered nodes; node order is kept as input order
    pub fn build<'a>(nodes: impl IntoIterator<Item = &'a GraphNode>) -> Self {
        let nodes: Vec<&GraphNode> = nodes.into_iter().collect();

        let mut owners: HashMap<&str, usize> = HashMap::new();
        for (i, node) in nodes.iter().enumerate() {
            owners.insert(node.name.as_str(), i);
            for declared in &node.declares {
                owners.insert(declared.as_str(), i);
            }
        }

        let mut edges = Vec::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            let mut deps: Vec<usize> = Vec::new();
            for path in qualified_paths(&node.body) {
                match owners.get(path) {
                    Some(&dep) if dep != i && !deps.contains(&dep) => {
                        debug!("{} depends on {}", node.name, nodes[dep].name);
                        deps.push(dep);
                    }
                    _ => {}
                }
            }
            edges.push(deps);
        }

        Self {
            index: nodes
                .iter()
                .enumerate()
                .map(|(i, n)| (n.name.clone(), i))
                .collect(),
            names: nodes.into_iter().map(|n| n.name.clone()).collect(),
            edges,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Node names in input order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Direct dependencies of `name`, in first-reference order
    pub fn dependencies(&self, name: &str) -> Vec<&str> {
        self.index
            .get(name)
            .map(|&i| self.edges[i].iter().map(|&d| self.names[d].as_str()).collect())
            .unwrap_or_default()
    }

    /// Order nodes so every dependency precedes its dependents.
    ///
    /// Iterative depth-first search with three marks. Reaching a node that is
    /// still in progress is a cycle: it is logged and the edge ignored, so the
    /// sort always completes and every node appears exactly once.
    pub fn sort(&self) -> SortOutcome {
        let mut marks = vec![Mark::Unvisited; self.len()];
        let mut order = Vec::with_capacity(self.len());
        let mut saw_cycle = false;

        for root in 0..self.len() {
            if marks[root] != Mark::Unvisited {
                continue;
            }
            marks[root] = Mark::InProgress;
            let mut stack = vec![(root, 0usize)];

            while let Some(frame) = stack.last_mut() {
                let node = frame.0;
                if let Some(&dep) = self.edges[node].get(frame.1) {
                    frame.1 += 1;
                    match marks[dep] {
                        Mark::Unvisited => {
                            marks[dep] = Mark::InProgress;
                            stack.push((dep, 0));
                        }
                        Mark::InProgress => {
                            error!(
                                "Cyclic dependency detected involving record: {} (via {})",
                                self.names[dep], self.names[node]
                            );
                            saw_cycle = true;
                        }
                        Mark::Done => {}
                    }
                } else {
                    marks[node] = Mark::Done;
                    order.push(self.names[node].clone());
                    stack.pop();
                }
            }
        }

        let cycles = if saw_cycle {
            self.cyclic_sets()
        } else {
            Vec::new()
        };

        SortOutcome { order, cycles }
    }

    /// Sets of nodes that reference each other, in input order
    pub fn cyclic_sets(&self) -> Vec<Vec<String>> {
        self.strongly_connected()
            .into_iter()
            .map(|set| set.into_iter().map(|i| self.names[i].clone()).collect())
            .collect()
    }

    /// Components with more than one node (Tarjan, iterative)
    fn strongly_connected(&self) -> Vec<Vec<usize>> {
        let n = self.len();
        let mut index_of: Vec<Option<usize>> = vec![None; n];
        let mut low = vec![0usize; n];
        let mut on_stack = vec![false; n];
        let mut stack: Vec<usize> = Vec::new();
        let mut next_index = 0usize;
        let mut components = Vec::new();

        for root in 0..n {
            if index_of[root].is_some() {
                continue;
            }
            index_of[root] = Some(next_index);
            low[root] = next_index;
            next_index += 1;
            stack.push(root);
            on_stack[root] = true;
            let mut calls = vec![(root, 0usize)];

            while let Some(frame) = calls.last_mut() {
                let node = frame.0;
                if let Some(&dep) = self.edges[node].get(frame.1) {
                    frame.1 += 1;
                    match index_of[dep] {
                        None => {
                            index_of[dep] = Some(next_index);
                            low[dep] = next_index;
                            next_index += 1;
                            stack.push(dep);
                            on_stack[dep] = true;
                            calls.push((dep, 0));
                        }
                        Some(dep_index) if on_stack[dep] => {
                            low[node] = low[node].min(dep_index);
                        }
                        Some(_) => {}
                    }
                    continue;
                }

                calls.pop();
                if let Some(&(parent, _)) = calls.last() {
                    low[parent] = low[parent].min(low[node]);
                }
                if Some(low[node]) == index_of[node] {
                    let mut component = Vec::new();
                    while let Some(member) = stack.pop() {
                        on_stack[member] = false;
                        component.push(member);
                        if member == node {
                            break;
                        }
                    }
                    if component.len() > 1 {
                        component.sort_unstable();
                        components.push(component);
                    }
                }
            }
        }

        components.sort_by_key(|c| c[0]);
        components
    }
}

/// Qualified `a::b` paths in Rust source, outside string literals and comments
fn qualified_paths(source: &str) -> Vec<&str> {
    let bytes = source.as_bytes();
    let mut paths = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    i += if bytes[i] == b'\\' { 2 } else { 1 };
                }
                i += 1;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            c if is_ident_start(c) => {
                let start = i;
                let mut end = scan_ident(bytes, i);
                // extend over `::segment` repetitions
                while bytes.get(end) == Some(&b':')
                    && bytes.get(end + 1) == Some(&b':')
                    && bytes.get(end + 2).is_some_and(|&c| is_ident_start(c))
                {
                    end = scan_ident(bytes, end + 2);
                }
                let path = &source[start..end];
                let leading_colons = start >= 2 && &bytes[start - 2..start] == b"::";
                if path.contains("::") && !leading_colons {
                    paths.push(path);
                }
                i = end;
            }
            _ => i += 1,
        }
    }
    paths
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn scan_ident(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, body: &str) -> GraphNode {
        GraphNode {
            name: name.to_string(),
            body: body.to_string(),
            declares: Vec::new(),
        }
    }

    fn position(order: &[String], name: &str) -> usize {
        order.iter().position(|n| n == name).unwrap()
    }

    #[test]
    fn test_scan_ignores_strings_comments_and_absolute_paths() {
        let paths = qualified_paths(
            "#[record(namespace = \"NMS::Fake\")]\n// NMS::Comment\npub a: NMS::Colour,\npub b: ::std::vec::Vec<NMS_Toolkit::TkId>,",
        );
        assert_eq!(paths, ["NMS::Colour", "NMS_Toolkit::TkId"]);
    }

    #[test]
    fn test_dependencies_precede_dependents() {
        let nodes = vec![
            node("NMS::GcBiome", "pub a: NMS::GcOption,\npub b: Vec<NMS::GcColour>,"),
            node("NMS::GcOption", "pub c: NMS::GcColour,"),
            node("NMS::GcColour", "pub r: f32,"),
            node("NMS::GcLone", "pub x: i32,"),
        ];
        let graph = DependencyGraph::build(&nodes);
        assert_eq!(graph.dependencies("NMS::GcBiome"), ["NMS::GcOption", "NMS::GcColour"]);

        let outcome = graph.sort();
        assert!(!outcome.has_cycles());
        assert_eq!(
            outcome.order,
            ["NMS::GcColour", "NMS::GcOption", "NMS::GcBiome", "NMS::GcLone"]
        );
    }

    #[test]
    fn test_self_and_declared_references_are_pruned() {
        let mut biome = node(
            "NMS::GcBiome",
            "pub enum GcBiome_Kind { A = 0 }\npub kind: NMS::GcBiome_Kind,\npub next: Vec<NMS::GcBiome>,",
        );
        biome.declares.push("NMS::GcBiome_Kind".to_string());
        let other = node("NMS::GcUser", "pub kind: NMS::GcBiome_Kind,");

        let nodes = [biome, other];
        let graph = DependencyGraph::build(&nodes);
        assert!(graph.dependencies("NMS::GcBiome").is_empty());
        // enums nested in another record resolve to their owner
        assert_eq!(graph.dependencies("NMS::GcUser"), ["NMS::GcBiome"]);
    }

    #[test]
    fn test_two_node_cycle_is_reported() {
        let nodes = [
            node("NMS::A", "pub b: NMS::B,"),
            node("NMS::B", "pub a: NMS::A,"),
            node("NMS::C", "pub a: NMS::A,"),
        ];
        let outcome = DependencyGraph::build(&nodes).sort();

        assert_eq!(outcome.order.len(), 3);
        assert_eq!(outcome.cycles, vec![vec!["NMS::A".to_string(), "NMS::B".to_string()]]);
        assert!(position(&outcome.order, "NMS::A") < position(&outcome.order, "NMS::C"));
    }

    #[test]
    fn test_cycle_with_tail_reports_whole_set() {
        let nodes = [
            node("NMS::Root", "pub a: NMS::A,"),
            node("NMS::A", "pub b: NMS::B, pub leaf: NMS::Leaf,"),
            node("NMS::B", "pub c: NMS::C,"),
            node("NMS::C", "pub a: NMS::A,"),
            node("NMS::Leaf", "pub x: u8,"),
        ];
        let outcome = DependencyGraph::build(&nodes).sort();

        assert_eq!(outcome.cycles.len(), 1);
        assert_eq!(outcome.cycles[0], ["NMS::A", "NMS::B", "NMS::C"]);
        assert!(position(&outcome.order, "NMS::Leaf") < position(&outcome.order, "NMS::A"));
        assert_eq!(outcome.order.last().map(String::as_str), Some("NMS::Root"));
    }

    #[test]
    fn test_long_chain_does_not_recurse() {
        let nodes: Vec<_> = (0..10_000)
            .map(|i| node(&format!("NMS::N{i}"), &format!("pub next: NMS::N{},", i + 1)))
            .collect();
        let outcome = DependencyGraph::build(&nodes).sort();
        assert_eq!(outcome.order.first().map(String::as_str), Some("NMS::N9999"));
        assert_eq!(outcome.order.len(), 10_000);
    }
}
