use std::collections::HashMap;

use crate::config::AnalysisConfig;
use crate::core::error::AnalysisError;
use crate::core::graph::LinkGraph;
use crate::core::resolve::{CycleSettings, Resolver};
use crate::core::state::ContributionSet;
use crate::core::tree::{TreeOptions, UpstreamTree};
use crate::core::types::{Category, ProviderIdx};
use crate::sources::ResultSource;

/// One analysis request over a linked graph and its root provider.
///
/// Contribution sets are resolved once per category and reused for the
/// lifetime of the session. The graph is borrowed immutably, so a cached set
/// can never go stale; a new graph or root means a new session.
pub struct Analysis<'a> {
    graph: &'a LinkGraph,
    results: &'a dyn ResultSource,
    root: ProviderIdx,
    cycles: CycleSettings,
    tree: TreeOptions,
    cache: HashMap<String, ContributionSet>,
}

impl<'a> Analysis<'a> {
    pub fn new(graph: &'a LinkGraph, results: &'a dyn ResultSource, root: ProviderIdx) -> Self {
        Self {
            graph,
            results,
            root,
            cycles: CycleSettings::default(),
            tree: TreeOptions::default(),
            cache: HashMap::new(),
        }
    }

    /// Session rooted at the provider with identifier `root_id`.
    pub fn for_provider(
        graph: &'a LinkGraph,
        results: &'a dyn ResultSource,
        root_id: &str,
    ) -> Result<Self, AnalysisError> {
        let root = graph.require_id(root_id)?;
        Ok(Self::new(graph, results, root))
    }

    pub fn with_config(mut self, config: &AnalysisConfig) -> Self {
        self.cycles = config.cycle_settings();
        self.tree = config.tree_options();
        self
    }

    pub fn graph(&self) -> &'a LinkGraph {
        self.graph
    }

    pub fn root(&self) -> ProviderIdx {
        self.root
    }

    pub fn is_resolved(&self, category: &Category) -> bool {
        self.cache.contains_key(&category.id)
    }

    pub fn contributions(&mut self, category: &Category) -> Result<&ContributionSet, AnalysisError> {
        if !self.cache.contains_key(&category.id) {
            let set = Resolver::new(self.graph, self.results)
                .with_cycle_settings(self.cycles)
                .resolve(category, self.root)?;
            self.cache.insert(category.id.clone(), set);
        }
        self.cache
            .get(&category.id)
            .ok_or_else(|| AnalysisError::NotFound(format!("category `{}`", category.id)))
    }

    /// Upstream-inclusive total of the root for `category`.
    pub fn total_impact(&mut self, category: &Category) -> Result<f64, AnalysisError> {
        Ok(self.contributions(category)?.root_total())
    }

    /// Tree bounded by the session's configured depth and cutoff.
    pub fn upstream_tree(&mut self, category: &Category) -> Result<UpstreamTree<'_>, AnalysisError> {
        let options = self.tree;
        self.upstream_tree_with(category, options)
    }

    pub fn upstream_tree_with(
        &mut self,
        category: &Category,
        options: TreeOptions,
    ) -> Result<UpstreamTree<'_>, AnalysisError> {
        let graph = self.graph;
        let root = self.root;
        let set = self.contributions(category)?;
        UpstreamTree::build_with(graph, set, root, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Provider;
    use crate::sources::DirectResults;

    fn mk_session_fixture() -> (LinkGraph, DirectResults) {
        let mut g = LinkGraph::new();
        g.add_provider(Provider::new("kettle", "Kettle", 1.0)).unwrap();
        g.add_provider(Provider::new("grid", "Grid", 1.0)).unwrap();
        g.link("grid", "kettle", "electricity", 0.35).unwrap();

        let results = DirectResults::new()
            .with("kettle", "gwp", 0.3)
            .with("grid", "gwp", 2.0)
            .with("kettle", "adp", 1.0)
            .with("grid", "adp", 10.0);
        (g, results)
    }

    #[test]
    fn contributions_are_resolved_once_per_category() {
        let (g, results) = mk_session_fixture();
        let gwp = Category::new("gwp", "Climate change", "kg CO2 eq");
        let adp = Category::new("adp", "Abiotic depletion, fossil fuels", "MJ");

        let mut analysis = Analysis::for_provider(&g, &results, "kettle").unwrap();
        assert!(!analysis.is_resolved(&gwp));

        let first = analysis.total_impact(&gwp).unwrap();
        assert!(analysis.is_resolved(&gwp));
        assert!(!analysis.is_resolved(&adp));
        assert!((first - 1.0).abs() < 1e-12);

        let again = analysis.total_impact(&gwp).unwrap();
        assert_eq!(first, again);
        assert!((analysis.total_impact(&adp).unwrap() - 4.5).abs() < 1e-12);
    }

    #[test]
    fn upstream_tree_uses_cached_contributions() {
        let (g, results) = mk_session_fixture();
        let gwp = Category::new("gwp", "Climate change", "kg CO2 eq");

        let mut analysis = Analysis::new(&g, &results, 0);
        let tree = analysis.upstream_tree(&gwp).unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.category().id, "gwp");
        assert!(analysis.is_resolved(&gwp));
    }

    #[test]
    fn unknown_root_id_is_not_found() {
        let (g, results) = mk_session_fixture();
        let err = Analysis::for_provider(&g, &results, "boiler").err().unwrap();
        assert!(matches!(err, AnalysisError::NotFound(_)));
    }

    #[test]
    fn configured_depth_bounds_the_tree() {
        // coal -> grid -> kettle
        let (mut g, mut results) = mk_session_fixture();
        g.add_provider(Provider::new("coal", "Coal", 1.0)).unwrap();
        g.link("coal", "grid", "hard coal", 0.5).unwrap();
        results.set("coal", "gwp", 2.0);
        let gwp = Category::new("gwp", "Climate change", "kg CO2 eq");

        let config = AnalysisConfig {
            max_depth: 1,
            ..Default::default()
        };
        let mut analysis = Analysis::new(&g, &results, 0).with_config(&config);
        let tree = analysis.upstream_tree(&gwp).unwrap();
        assert_eq!(tree.max_depth(), 1);
        assert_eq!(tree.len(), 2);

        let deep = analysis.upstream_tree_with(&gwp, TreeOptions::depth(5)).unwrap();
        assert_eq!(deep.len(), 3);
    }
}
