// depth-bounded pre-order traversal for reporting
use crate::core::tree::{TreeNode, UpstreamTree};
use crate::core::types::NodeIdx;
use crate::report::ReportRow;

/// One visited node of a walk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkStep<'t> {
    pub index: NodeIdx,
    pub node: &'t TreeNode,
    pub depth: usize,
    pub total: f64,
    pub percent_of_root: f64,
}

/// Lazy pre-order walk over an `UpstreamTree`.
///
/// A walker is single-use; start a fresh one with `UpstreamTree::walk`.
/// Asking for more depth than the tree was built with just stops at the
/// tree's own depth.
pub struct TreeWalker<'t, 'a> {
    tree: &'t UpstreamTree<'a>,
    stack: Vec<NodeIdx>,
    max_depth: usize,
    root_total: f64,
}

impl<'t, 'a> TreeWalker<'t, 'a> {
    pub fn new(tree: &'t UpstreamTree<'a>, max_depth: usize) -> Self {
        Self {
            tree,
            stack: vec![0],
            max_depth,
            root_total: tree.root_total(),
        }
    }
}

impl<'t, 'a> Iterator for TreeWalker<'t, 'a> {
    type Item = WalkStep<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.stack.pop()?;
        let tree: &'t UpstreamTree<'a> = self.tree;
        let node = tree.node(index)?;

        if node.depth < self.max_depth {
            self.stack.extend(node.children.iter().rev());
        }

        let total = tree.total(node);
        Some(WalkStep {
            index,
            node,
            depth: node.depth,
            total,
            percent_of_root: percent_of(total, self.root_total),
        })
    }
}

/// `value / root * 100`, or `0` when the share is undefined.
pub fn percent_of(value: f64, root: f64) -> f64 {
    if root == 0.0 {
        return 0.0;
    }
    let p = value / root * 100.0;
    if p.is_finite() { p } else { 0.0 }
}

impl<'a> UpstreamTree<'a> {
    pub fn walk(&self, max_depth: usize) -> TreeWalker<'_, 'a> {
        TreeWalker::new(self, max_depth)
    }

    /// Flattens a walk into reporter rows labelled with provider names,
    /// indented two spaces per level.
    pub fn rows(&self, max_depth: usize) -> Vec<ReportRow> {
        let unit = &self.category().reference_unit;
        self.walk(max_depth)
            .map(|step| {
                let name = self
                    .provider(step.node)
                    .map_or("?", |p| p.name.as_str());
                ReportRow::new(
                    format!("{}{}", "  ".repeat(step.depth), name),
                    step.total,
                    unit.clone(),
                )
            })
            .collect()
    }
}
