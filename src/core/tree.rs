// upstream tree materialization
use std::cmp::Ordering;
use std::collections::VecDeque;

use tracing::{debug, instrument};

use crate::core::error::AnalysisError;
use crate::core::graph::LinkGraph;
use crate::core::state::ContributionSet;
use crate::core::types::{Category, EdgeIdx, NodeIdx, Provider, ProviderIdx};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeOptions {
    /// Deepest level materialized; the root is level 0.
    pub max_depth: usize,
    /// Children whose |share of the root total| is below this fraction are
    /// not materialized. `0.0` keeps everything.
    pub cutoff: f64,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self::depth(3)
    }
}

impl TreeOptions {
    pub fn depth(max_depth: usize) -> Self {
        Self {
            max_depth,
            cutoff: 0.0,
        }
    }
}

/// One node of an upstream tree. Holds arena indices only; provider and edge
/// data stay in the `LinkGraph`.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub provider: ProviderIdx,
    /// Supply edge leading from this node's provider to its parent.
    pub edge: Option<EdgeIdx>,
    pub parent: Option<NodeIdx>,
    pub depth: usize,
    /// Product of the supply fractions on the path from the root.
    pub scale: f64,
    pub children: Vec<NodeIdx>,
}

/// Rooted, ordered view decomposing a provider's total into supplier
/// subtrees, for one category.
///
/// Children are sorted by descending |total|, ties by ascending provider id,
/// so two builds over the same contributions are identical.
#[derive(Debug, Clone)]
pub struct UpstreamTree<'a> {
    graph: &'a LinkGraph,
    contributions: &'a ContributionSet,
    nodes: Vec<TreeNode>,
    max_depth: usize,
}

impl<'a> UpstreamTree<'a> {
    pub fn build(
        graph: &'a LinkGraph,
        contributions: &'a ContributionSet,
        root: ProviderIdx,
        max_depth: usize,
    ) -> Result<Self, AnalysisError> {
        Self::build_with(graph, contributions, root, TreeOptions::depth(max_depth))
    }

    #[instrument(level = "debug", skip_all, fields(root = root, max_depth = options.max_depth))]
    pub fn build_with(
        graph: &'a LinkGraph,
        contributions: &'a ContributionSet,
        root: ProviderIdx,
        options: TreeOptions,
    ) -> Result<Self, AnalysisError> {
        if contributions.get(root).is_none() {
            return Err(AnalysisError::NotFound(format!(
                "contribution of provider #{root} in category `{}`",
                contributions.category().id
            )));
        }

        let mut nodes = vec![TreeNode {
            provider: root,
            edge: None,
            parent: None,
            depth: 0,
            scale: 1.0,
            children: Vec::new(),
        }];
        let root_total = contributions.total(root);

        let mut queue = VecDeque::from([0usize]);
        while let Some(idx) = queue.pop_front() {
            let (provider, depth, scale) = {
                let n = &nodes[idx];
                (n.provider, n.depth, n.scale)
            };
            if depth >= options.max_depth {
                continue;
            }

            let mut children: Vec<(f64, &str, EdgeIdx, ProviderIdx, f64)> = graph
                .suppliers_of(provider)
                .filter_map(|(eid, edge)| {
                    let s = graph.provider(edge.supplier)?;
                    let child_scale = scale * graph.fraction(edge);
                    let value = child_scale * contributions.total(edge.supplier);
                    Some((value, s.id.as_str(), eid, edge.supplier, child_scale))
                })
                .filter(|(value, ..)| keep(*value, root_total, options.cutoff))
                .collect();

            children.sort_by(|a, b| child_order((a.0, a.1, a.2), (b.0, b.1, b.2)));

            for (_, _, eid, supplier, child_scale) in children {
                let child = nodes.len();
                nodes.push(TreeNode {
                    provider: supplier,
                    edge: Some(eid),
                    parent: Some(idx),
                    depth: depth + 1,
                    scale: child_scale,
                    children: Vec::new(),
                });
                nodes[idx].children.push(child);
                queue.push_back(child);
            }
        }

        debug!(nodes = nodes.len(), "upstream tree built");
        Ok(Self {
            graph,
            contributions,
            nodes,
            max_depth: options.max_depth,
        })
    }

    pub fn graph(&self) -> &'a LinkGraph {
        self.graph
    }

    pub fn contributions(&self) -> &'a ContributionSet {
        self.contributions
    }

    pub fn category(&self) -> &'a Category {
        self.contributions.category()
    }

    pub fn root(&self) -> &TreeNode {
        &self.nodes[0]
    }

    pub fn node(&self, idx: NodeIdx) -> Option<&TreeNode> {
        self.nodes.get(idx)
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Depth the tree was built with.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Deepest level actually materialized.
    pub fn depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    pub fn children(&self, idx: NodeIdx) -> impl Iterator<Item = (NodeIdx, &TreeNode)> + '_ {
        self.nodes
            .get(idx)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |&c| (c, &self.nodes[c]))
    }

    pub fn provider(&self, node: &TreeNode) -> Option<&'a Provider> {
        self.graph.provider(node.provider)
    }

    /// Upstream-inclusive contribution of the node to the root.
    pub fn total(&self, node: &TreeNode) -> f64 {
        node.scale * self.contributions.total(node.provider)
    }

    /// Direct contribution of the node to the root.
    pub fn direct(&self, node: &TreeNode) -> f64 {
        node.scale * self.contributions.direct(node.provider)
    }

    /// Amount of the edge used to reach the node; `None` for the root.
    pub fn edge_amount(&self, node: &TreeNode) -> Option<f64> {
        node.edge
            .and_then(|e| self.graph.edge(e))
            .map(|e| e.amount)
    }

    pub fn root_total(&self) -> f64 {
        self.total(self.root())
    }
}

fn keep(value: f64, root_total: f64, cutoff: f64) -> bool {
    if cutoff <= 0.0 || root_total == 0.0 {
        return true;
    }
    (value / root_total).abs() >= cutoff
}

// descending |value|, then ascending provider id, then edge index
fn child_order(a: (f64, &str, EdgeIdx), b: (f64, &str, EdgeIdx)) -> Ordering {
    b.0.abs()
        .total_cmp(&a.0.abs())
        .then_with(|| a.1.cmp(b.1))
        .then_with(|| a.2.cmp(&b.2))
}
