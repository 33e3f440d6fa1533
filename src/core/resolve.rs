// upstream contribution resolution
use tracing::{debug, instrument, warn};

use crate::core::error::AnalysisError;
use crate::core::graph::LinkGraph;
use crate::core::state::{ContributionRecord, ContributionSet, ContributionWarning, VisitState};
use crate::core::types::{Category, ProviderIdx};
use crate::sources::ResultSource;

/// Bounds for the refinement pass run when a supply loop was cut.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleSettings {
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            max_iterations: 64,
            tolerance: 1e-12,
        }
    }
}

/// Resolves upstream-inclusive totals over a link graph.
///
/// `total(P) = direct(P) + Σ fraction(E) * total(S)` for every supply edge
/// `E: S -> P`, where `fraction(E) = amount(E) / reference_amount(S)`.
///
/// Resolution is an explicit depth-first worklist, so deep graphs never grow
/// the call stack. A supplier met again while it is still in progress closes a
/// loop: that edge contributes zero on the first pass, and every reachable
/// total is then refined by Gauss-Seidel sweeps until the largest change drops
/// to `tolerance` or `max_iterations` is hit. Totals on cyclic graphs are an
/// approximation; affected records carry `CycleApproximation`.
pub struct Resolver<'a> {
    graph: &'a LinkGraph,
    results: &'a dyn ResultSource,
    cycles: CycleSettings,
}

struct Frame {
    provider: ProviderIdx,
    next_edge: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(graph: &'a LinkGraph, results: &'a dyn ResultSource) -> Self {
        Self {
            graph,
            results,
            cycles: CycleSettings::default(),
        }
    }

    pub fn with_cycle_settings(mut self, cycles: CycleSettings) -> Self {
        self.cycles = cycles;
        self
    }

    #[instrument(level = "debug", skip_all, fields(category = %category.id, root = root))]
    pub fn resolve(
        &self,
        category: &Category,
        root: ProviderIdx,
    ) -> Result<ContributionSet, AnalysisError> {
        let g = self.graph;
        let reachable = g.reachable_from(root)?;
        debug!(providers = reachable.len(), "resolving contributions");

        let n = g.provider_count();
        let mut direct = vec![0.0; n];
        for &p in &reachable {
            // reachable_from only yields indices of the arena
            if let Some(provider) = g.provider(p) {
                let value = self.results.direct_contribution(provider, category)?;
                if !value.is_finite() {
                    return Err(AnalysisError::InvalidResult {
                        provider: provider.id.clone(),
                        category: category.id.clone(),
                        value,
                    });
                }
                direct[p] = value;
            }
        }

        let mut state = vec![VisitState::Unvisited; n];
        let mut total = vec![0.0; n];
        let mut post_order = Vec::with_capacity(reachable.len());
        // (consumer, supplier) pairs cut on the first pass
        let mut cut_edges: Vec<(ProviderIdx, ProviderIdx)> = Vec::new();

        let mut stack = vec![Frame {
            provider: root,
            next_edge: 0,
        }];
        state[root] = VisitState::InProgress;

        while let Some(frame) = stack.last_mut() {
            let p = frame.provider;
            let edges = g.supply_edges(p);

            if let Some(&eid) = edges.get(frame.next_edge) {
                frame.next_edge += 1;
                let Some(edge) = g.edge(eid) else { continue };
                let s = edge.supplier;
                match state[s] {
                    VisitState::Unvisited => {
                        state[s] = VisitState::InProgress;
                        stack.push(Frame {
                            provider: s,
                            next_edge: 0,
                        });
                    }
                    VisitState::InProgress => {
                        warn!(consumer = p, supplier = s, "supply loop, using zero contribution");
                        cut_edges.push((p, s));
                    }
                    VisitState::Done => {}
                }
                continue;
            }

            // all suppliers handled; ancestors still in progress count as zero
            let mut value = direct[p];
            for (_, edge) in g.suppliers_of(p) {
                if state[edge.supplier] == VisitState::Done {
                    value += g.fraction(edge) * total[edge.supplier];
                }
            }
            total[p] = value;
            state[p] = VisitState::Done;
            post_order.push(p);
            stack.pop();
        }

        let mut warnings: Vec<Vec<ContributionWarning>> = vec![Vec::new(); n];
        if !cut_edges.is_empty() {
            let (iterations, converged) = self.refine(&post_order, &direct, &mut total);
            debug!(iterations, converged, loops = cut_edges.len(), "cyclic refinement finished");
            for (consumer, supplier) in cut_edges {
                warnings[consumer].push(ContributionWarning::CycleApproximation {
                    supplier,
                    iterations,
                    converged,
                });
            }
        }

        let mut records: Vec<Option<ContributionRecord>> = vec![None; n];
        for p in post_order {
            records[p] = Some(ContributionRecord {
                direct: direct[p],
                total: total[p],
                warnings: std::mem::take(&mut warnings[p]),
            });
        }

        Ok(ContributionSet::new(category.clone(), root, records))
    }

    // Gauss-Seidel sweeps in post-order; returns (iterations run, converged).
    fn refine(&self, order: &[ProviderIdx], direct: &[f64], total: &mut [f64]) -> (usize, bool) {
        let g = self.graph;
        let mut iterations = 0;

        while iterations < self.cycles.max_iterations {
            iterations += 1;
            let mut max_delta: f64 = 0.0;

            for &p in order {
                let mut value = direct[p];
                for (_, edge) in g.suppliers_of(p) {
                    value += g.fraction(edge) * total[edge.supplier];
                }
                // f64::max drops NaN, which would read as converged
                let delta = (value - total[p]).abs();
                if delta.is_nan() || delta > max_delta {
                    max_delta = delta;
                }
                total[p] = value;
            }

            if !max_delta.is_finite() {
                return (iterations, false);
            }
            if max_delta <= self.cycles.tolerance {
                return (iterations, true);
            }
        }
        (iterations, false)
    }
}

/// Resolve with default cycle settings.
pub fn resolve(
    graph: &LinkGraph,
    results: &dyn ResultSource,
    category: &Category,
    root: ProviderIdx,
) -> Result<ContributionSet, AnalysisError> {
    Resolver::new(graph, results).resolve(category, root)
}

/*
Fixture used by most tests (boiling water):

    coal (direct 2.0, ref 1.0) --0.5--> grid (direct 1.0, ref 1.0) --0.35--> kettle (direct 0.4, ref 1.0)
    water (direct 0.1, ref 1.0) --1.0--> kettle

    total(coal)   = 2.0
    total(grid)   = 1.0 + 0.5 * 2.0           = 2.0
    total(water)  = 0.1
    total(kettle) = 0.4 + 0.35 * 2.0 + 0.1    = 1.2
*/

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::core::types::Provider;
    use crate::sources::DirectResults;

    fn gwp() -> Category {
        Category::new("gwp", "Climate change", "kg CO2 eq")
    }

    fn mk_graph(providers: &[(&str, f64)], links: &[(&str, &str, f64)]) -> LinkGraph {
        let mut g = LinkGraph::new();
        for (id, reference) in providers {
            g.add_provider(Provider::new(*id, id.to_uppercase(), *reference))
                .unwrap();
        }
        for (supplier, consumer, amount) in links {
            g.link(supplier, consumer, format!("{supplier}-out"), *amount)
                .unwrap();
        }
        g
    }

    fn boiling_water() -> (LinkGraph, DirectResults) {
        let g = mk_graph(
            &[("kettle", 1.0), ("grid", 1.0), ("coal", 1.0), ("water", 1.0)],
            &[
                ("grid", "kettle", 0.35),
                ("water", "kettle", 1.0),
                ("coal", "grid", 0.5),
            ],
        );
        let results = DirectResults::new()
            .with("kettle", "gwp", 0.4)
            .with("grid", "gwp", 1.0)
            .with("coal", "gwp", 2.0)
            .with("water", "gwp", 0.1);
        (g, results)
    }

    #[test]
    fn acyclic_totals_follow_reconstruction_law() {
        let (g, results) = boiling_water();
        let kettle = g.index_of("kettle").unwrap();

        let set = resolve(&g, &results, &gwp(), kettle).unwrap();

        assert_eq!(set.len(), 4);
        assert!((set.root_total() - 1.2).abs() < 1e-12);

        // every node: total == direct + Σ fraction * total(supplier), bit for bit
        for (p, record) in set.iter() {
            let mut expected = record.direct;
            for (_, edge) in g.suppliers_of(p) {
                expected += g.fraction(edge) * set.total(edge.supplier);
            }
            assert_eq!(record.total, expected, "reconstruction failed for #{p}");
            assert!(record.warnings.is_empty());
        }
    }

    #[test]
    fn single_provider_total_equals_direct() {
        let g = mk_graph(&[("smelter", 1.0)], &[]);
        let results = DirectResults::new().with("smelter", "gwp", 12.5);

        let set = resolve(&g, &results, &gwp(), 0).unwrap();
        let r = set.get(0).unwrap();
        assert_eq!(r.total, r.direct);
        assert_eq!(r.total, 12.5);
    }

    #[test]
    fn supplier_scaling_uses_reference_amount() {
        // grid produces 2 units per reference; kettle takes 0.5 of them
        let g = mk_graph(&[("kettle", 1.0), ("grid", 2.0)], &[("grid", "kettle", 0.5)]);
        let results = DirectResults::new()
            .with("kettle", "gwp", 0.0)
            .with("grid", "gwp", 8.0);

        let set = resolve(&g, &results, &gwp(), 0).unwrap();
        assert_eq!(set.root_total(), 2.0);
    }

    #[test]
    fn only_upstream_of_root_gets_records() {
        let (g, results) = boiling_water();
        let grid = g.index_of("grid").unwrap();

        let set = resolve(&g, &results, &gwp(), grid).unwrap();

        assert_eq!(set.len(), 2);
        assert!(set.get(g.index_of("kettle").unwrap()).is_none());
        assert!(set.get(g.index_of("water").unwrap()).is_none());
        assert_eq!(set.root_total(), 2.0);
    }

    #[test]
    fn missing_direct_result_aborts_resolution() {
        let (g, _) = boiling_water();
        let partial = DirectResults::new().with("kettle", "gwp", 0.4);

        let err = resolve(&g, &partial, &gwp(), 0).unwrap_err();
        assert!(matches!(err, AnalysisError::NotFound(_)));
    }

    #[test]
    fn unknown_root_is_not_found() {
        let (g, results) = boiling_water();
        let err = resolve(&g, &results, &gwp(), 42).unwrap_err();
        assert!(matches!(err, AnalysisError::NotFound(_)));
    }

    #[test]
    fn two_node_loop_terminates_and_is_flagged() {
        // a <-0.5- b and b <-0.5- a
        let g = mk_graph(&[("a", 1.0), ("b", 1.0)], &[("b", "a", 0.5), ("a", "b", 0.5)]);
        let results = DirectResults::new().with("a", "gwp", 1.0).with("b", "gwp", 1.0);

        let set = resolve(&g, &results, &gwp(), 0).unwrap();

        // fixed point: a = 1 + 0.5 b, b = 1 + 0.5 a  =>  a = b = 2
        assert!((set.total(0) - 2.0).abs() < 1e-9);
        assert!((set.total(1) - 2.0).abs() < 1e-9);

        let flagged = set.approximated();
        assert!(!flagged.is_empty());
        let warning = flagged
            .iter()
            .flat_map(|&p| set.get(p).unwrap().warnings.iter())
            .next()
            .unwrap();
        match warning {
            ContributionWarning::CycleApproximation {
                iterations,
                converged,
                ..
            } => {
                assert!(*converged);
                assert!(*iterations <= CycleSettings::default().max_iterations);
            }
        }
    }

    #[test]
    fn self_loop_terminates() {
        let g = mk_graph(&[("boiler", 1.0)], &[("boiler", "boiler", 0.1)]);
        let results = DirectResults::new().with("boiler", "gwp", 9.0);

        let set = resolve(&g, &results, &gwp(), 0).unwrap();
        assert!((set.root_total() - 10.0).abs() < 1e-9);
        assert!(set.get(0).unwrap().is_approximated());
    }

    #[test]
    fn diverging_loop_stops_at_iteration_cap() {
        let g = mk_graph(&[("a", 1.0), ("b", 1.0)], &[("b", "a", 2.0), ("a", "b", 2.0)]);
        let results = DirectResults::new().with("a", "gwp", 1.0).with("b", "gwp", 1.0);

        let set = Resolver::new(&g, &results)
            .with_cycle_settings(CycleSettings {
                max_iterations: 5,
                tolerance: 1e-12,
            })
            .resolve(&gwp(), 0)
            .unwrap();

        let warnings: Vec<_> = set.iter().flat_map(|(_, r)| r.warnings.clone()).collect();
        assert_eq!(
            warnings,
            vec![ContributionWarning::CycleApproximation {
                supplier: 0,
                iterations: 5,
                converged: false,
            }]
        );
    }

    #[test]
    fn non_finite_direct_result_is_rejected() {
        let g = mk_graph(&[("a", 1.0), ("b", 1.0)], &[("b", "a", 0.5), ("a", "b", 0.5)]);
        let results = DirectResults::new().with("a", "gwp", f64::NAN).with("b", "gwp", 1.0);

        let err = resolve(&g, &results, &gwp(), 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidResult);
        match err {
            AnalysisError::InvalidResult { provider, category, value } => {
                assert_eq!((provider.as_str(), category.as_str()), ("a", "gwp"));
                assert!(value.is_nan());
            }
            other => panic!("expected InvalidResult, got {other:?}"),
        }
    }

    #[test]
    fn overflowing_loop_is_not_reported_as_converged() {
        let g = mk_graph(&[("a", 1.0), ("b", 1.0)], &[("b", "a", 1e300), ("a", "b", 1e300)]);
        let results = DirectResults::new().with("a", "gwp", 1.0).with("b", "gwp", 1.0);

        let set = resolve(&g, &results, &gwp(), 0).unwrap();
        for (_, record) in set.iter() {
            for w in &record.warnings {
                let ContributionWarning::CycleApproximation { converged, .. } = w;
                assert!(!converged);
            }
        }
        assert!(set.get(0).unwrap().is_approximated());
    }
}
