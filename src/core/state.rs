use serde::Serialize;

use crate::core::types::{Category, ProviderIdx};

/// Resolution progress of a single provider during one resolver run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitState {
    Unvisited,
    InProgress,
    Done,
}

/// Informational notes attached to a contribution record. Never fatal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ContributionWarning {
    /// The edge from `supplier` closed a supply loop and was first counted
    /// with zero contribution; the total was then refined by a bounded
    /// iteration. The result is an approximation for cyclic graphs.
    CycleApproximation {
        supplier: ProviderIdx,
        iterations: usize,
        converged: bool,
    },
}

impl ContributionWarning {
    pub fn is_cycle_approximation(&self) -> bool {
        matches!(self, ContributionWarning::CycleApproximation { .. })
    }
}

/// Direct and upstream-inclusive contribution of one provider to one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContributionRecord {
    pub direct: f64,
    pub total: f64,
    pub warnings: Vec<ContributionWarning>,
}

impl ContributionRecord {
    pub fn is_approximated(&self) -> bool {
        self.warnings.iter().any(ContributionWarning::is_cycle_approximation)
    }
}

/// Write-once contribution records for every provider reachable from `root`.
///
/// Records are indexed by provider arena index; providers outside the root's
/// upstream have no record.
#[derive(Debug, Clone)]
pub struct ContributionSet {
    category: Category,
    root: ProviderIdx,
    records: Vec<Option<ContributionRecord>>,
}

impl ContributionSet {
    pub(crate) fn new(
        category: Category,
        root: ProviderIdx,
        records: Vec<Option<ContributionRecord>>,
    ) -> Self {
        Self {
            category,
            root,
            records,
        }
    }

    pub fn category(&self) -> &Category {
        &self.category
    }

    pub fn root(&self) -> ProviderIdx {
        self.root
    }

    pub fn get(&self, provider: ProviderIdx) -> Option<&ContributionRecord> {
        self.records.get(provider).and_then(Option::as_ref)
    }

    pub fn total(&self, provider: ProviderIdx) -> f64 {
        self.get(provider).map_or(0.0, |r| r.total)
    }

    pub fn direct(&self, provider: ProviderIdx) -> f64 {
        self.get(provider).map_or(0.0, |r| r.direct)
    }

    pub fn root_total(&self) -> f64 {
        self.total(self.root)
    }

    pub fn len(&self) -> usize {
        self.records.iter().filter(|r| r.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProviderIdx, &ContributionRecord)> + '_ {
        self.records
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().map(|r| (i, r)))
    }

    /// Providers carrying a cycle approximation warning.
    pub fn approximated(&self) -> Vec<ProviderIdx> {
        self.iter()
            .filter(|(_, r)| r.is_approximated())
            .map(|(i, _)| i)
            .collect()
    }
}
