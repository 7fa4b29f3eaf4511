//! Library dependency graph and build level computation
use crate::error::{BuildError, BuildResult};
use forge_config::LibraryConfig;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A library in the dependency graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryNode {
    /// Library name
    pub name: String,
    /// Library version
    pub version: String,
    /// Names of libraries this one depends on
    pub dependencies: Vec<String>,
}

impl LibraryNode {
    /// Create a new library node
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            dependencies: Vec::new(),
        }
    }

    /// Add dependencies
    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }
}

impl From<&LibraryConfig> for LibraryNode {
    fn from(library: &LibraryConfig) -> Self {
        Self::new(library.name.clone(), library.version.clone())
            .with_dependencies(library.dependencies.clone())
    }
}

/// Dependency DAG over a set of libraries
///
/// Nodes are stored sorted by name; edges are kept as index lists in both
/// directions.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: Vec<LibraryNode>,
    index: HashMap<String, usize>,
    /// deps[i] = indices node i depends on
    deps: Vec<Vec<usize>>,
    /// dependents[i] = indices that depend on node i
    dependents: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Build and validate a graph
    ///
    /// Fails on repeated names, on dependencies outside the node set and
    /// on cycles.
    pub fn build(nodes: impl IntoIterator<Item = LibraryNode>) -> BuildResult<Self> {
        let mut nodes: Vec<LibraryNode> = nodes.into_iter().collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(pair) = nodes.windows(2).find(|pair| pair[0].name == pair[1].name) {
            return Err(BuildError::DuplicateLibrary(pair[0].name.clone()));
        }

        let index: HashMap<String, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.name.clone(), i))
            .collect();

        let mut deps = vec![Vec::new(); nodes.len()];
        let mut dependents = vec![Vec::new(); nodes.len()];

        for (i, node) in nodes.iter().enumerate() {
            for dep in &node.dependencies {
                let &d = index
                    .get(dep)
                    .ok_or_else(|| BuildError::UnknownDependency {
                        library: node.name.clone(),
                        dependency: dep.clone(),
                    })?;
                if !deps[i].contains(&d) {
                    deps[i].push(d);
                    dependents[d].push(i);
                }
            }
        }

        let graph = Self {
            nodes,
            index,
            deps,
            dependents,
        };
        graph.topological_order()?;
        Ok(graph)
    }

    /// Build a graph from library configs
    pub fn from_libraries<'a>(
        libraries: impl IntoIterator<Item = &'a LibraryConfig>,
    ) -> BuildResult<Self> {
        Self::build(libraries.into_iter().map(LibraryNode::from))
    }

    /// Get a node by name
    pub fn get(&self, name: &str) -> Option<&LibraryNode> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    /// All nodes, sorted by name
    pub fn nodes(&self) -> &[LibraryNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Topological order using Kahn's algorithm
    ///
    /// In-degree is the dependency count; ready nodes are taken in name
    /// order so the result is deterministic.
    pub fn topological_sort(&self) -> BuildResult<Vec<String>> {
        Ok(self
            .topological_order()?
            .into_iter()
            .map(|i| self.nodes[i].name.clone())
            .collect())
    }

    fn topological_order(&self) -> BuildResult<Vec<usize>> {
        let mut in_degree: Vec<usize> = self.deps.iter().map(Vec::len).collect();
        // Node indices follow name order, so an ordered set yields name order
        let mut ready: BTreeSet<usize> = (0..self.nodes.len())
            .filter(|&i| in_degree[i] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(i) = ready.pop_first() {
            order.push(i);
            for &dependent in &self.dependents[i] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() != self.nodes.len() {
            return Err(BuildError::CircularDependency {
                nodes: self.cycle_members(&in_degree),
            });
        }

        Ok(order)
    }

    /// Nodes stuck after Kahn's algorithm, minus nodes that only sit
    /// downstream of a cycle
    fn cycle_members(&self, in_degree: &[usize]) -> Vec<String> {
        let mut stuck: BTreeSet<usize> = (0..self.nodes.len())
            .filter(|&i| in_degree[i] > 0)
            .collect();

        // A cycle member always has a dependent inside the stuck set
        loop {
            let before = stuck.len();
            let snapshot = stuck.clone();
            stuck.retain(|&i| self.dependents[i].iter().any(|d| snapshot.contains(d)));
            if stuck.len() == before {
                break;
            }
        }

        stuck
            .into_iter()
            .map(|i| self.nodes[i].name.clone())
            .collect()
    }

    /// Group libraries into build levels
    ///
    /// `level(n) = 0` without dependencies, else `1 + max(level(dep))`.
    /// Each level is sorted by name.
    pub fn get_build_levels(&self) -> BuildResult<Vec<Vec<String>>> {
        let order = self.topological_order()?;
        let mut level = vec![0usize; self.nodes.len()];

        // Dependencies precede dependents in `order`, so one pass settles every level
        for &i in &order {
            level[i] = self.deps[i]
                .iter()
                .map(|&d| level[d] + 1)
                .max()
                .unwrap_or(0);
        }

        let mut grouped: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for (i, node) in self.nodes.iter().enumerate() {
            grouped.entry(level[i]).or_default().push(node.name.clone());
        }

        Ok(grouped
            .into_values()
            .map(|mut names| {
                names.sort();
                names
            })
            .collect())
    }

    /// All transitive dependencies of a library, sorted by name
    pub fn get_all_dependencies(&self, name: &str) -> BuildResult<BTreeSet<String>> {
        let &start = self
            .index
            .get(name)
            .ok_or_else(|| BuildError::UnknownLibrary(name.to_string()))?;

        let mut seen = vec![false; self.nodes.len()];
        let mut stack = self.deps[start].clone();
        let mut result = BTreeSet::new();

        while let Some(i) = stack.pop() {
            if seen[i] {
                continue;
            }
            seen[i] = true;
            result.insert(self.nodes[i].name.clone());
            stack.extend(self.deps[i].iter().copied().filter(|&d| !seen[d]));
        }

        Ok(result)
    }
}
