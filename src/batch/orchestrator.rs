use rayon::prelude::*;
use tracing::{info, instrument, warn};

use crate::batch::{BatchReport, CancelFlag, ItemOutcome, ItemStatus, WorkItem};
use crate::config::AnalysisConfig;
use crate::core::error::AnalysisError;
use crate::core::session::Analysis;
use crate::core::types::Category;
use crate::report::{ReportRow, Reporter};
use crate::sources::{GraphSource, MethodCatalog, ResultSource};

/// Drives link -> resolve -> report for a sequence of work items.
///
/// Items are independent: each links its own graph and opens its own
/// analysis session over the shared, read-only sources. A failing item is
/// recorded and the batch moves on. Reporter writes always happen on the
/// calling thread, in input order.
pub struct BatchOrchestrator<'a> {
    graphs: &'a dyn GraphSource,
    results: &'a dyn ResultSource,
    methods: &'a dyn MethodCatalog,
    config: AnalysisConfig,
    cancel: CancelFlag,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(
        graphs: &'a dyn GraphSource,
        results: &'a dyn ResultSource,
        methods: &'a dyn MethodCatalog,
    ) -> Self {
        Self {
            graphs,
            results,
            methods,
            config: AnalysisConfig::default(),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Calculates every item against all categories of `method`.
    ///
    /// Only batch-wide problems (invalid config, unknown method, pool setup)
    /// return `Err`; item failures land in the report.
    #[instrument(skip_all, fields(method = method, items = items.len()))]
    pub fn run(
        &self,
        method: &str,
        items: &[WorkItem],
        reporter: &mut dyn Reporter,
    ) -> Result<BatchReport, AnalysisError> {
        self.config.validate()?;
        let categories = self.methods.categories_of(method)?;

        let outcomes: Vec<ItemOutcome> = if self.config.batch.parallel {
            let mut computed = self.compute_parallel(items, &categories)?;
            computed.sort_by_key(|o| o.index);
            computed
                .into_iter()
                .map(|o| self.emit(o, reporter))
                .collect()
        } else {
            items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    let outcome = self.attempt(index, item, &categories);
                    self.emit(outcome, reporter)
                })
                .collect()
        };

        let report = BatchReport { outcomes };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "batch finished"
        );
        Ok(report)
    }

    fn compute_parallel(
        &self,
        items: &[WorkItem],
        categories: &[Category],
    ) -> Result<Vec<ItemOutcome>, AnalysisError> {
        let compute = || {
            items
                .par_iter()
                .enumerate()
                .map(|(index, item)| self.attempt(index, item, categories))
                .collect::<Vec<_>>()
        };

        match self.config.batch.workers {
            Some(n) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| AnalysisError::Config(e.to_string()))?;
                Ok(pool.install(compute))
            }
            None => Ok(compute()),
        }
    }

    fn attempt(&self, index: usize, item: &WorkItem, categories: &[Category]) -> ItemOutcome {
        info!(item = %item.name, "running impact calculation");
        let status = match self.impacts_of(item, categories) {
            Ok(rows) => ItemStatus::Completed(rows),
            Err(e) => {
                warn!(item = %item.name, error = %e, "work item failed");
                ItemStatus::Failed(e)
            }
        };
        ItemOutcome {
            index,
            name: item.name.clone(),
            status,
        }
    }

    fn emit(&self, mut outcome: ItemOutcome, reporter: &mut dyn Reporter) -> ItemOutcome {
        if let ItemStatus::Completed(rows) = &outcome.status {
            if let Err(e) = reporter.write_group(&outcome.name, rows) {
                warn!(item = %outcome.name, error = %e, "could not report work item");
                outcome.status = ItemStatus::Failed(e.into());
            }
        }
        outcome
    }

    fn check_cancel(&self) -> Result<(), AnalysisError> {
        if self.cancel.is_cancelled() {
            Err(AnalysisError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn impacts_of(
        &self,
        item: &WorkItem,
        categories: &[Category],
    ) -> Result<Vec<ReportRow>, AnalysisError> {
        self.check_cancel()?;
        if !item.amount.is_finite() {
            return Err(AnalysisError::Config(format!(
                "amount of `{}` must be finite, got {}",
                item.name, item.amount
            )));
        }

        let graph = self.graphs.linked_graph(&item.descriptor)?;
        // linking may take a while; a cancel raised meanwhile drops the graph
        self.check_cancel()?;

        let root = graph
            .root()
            .or_else(|| graph.index_of(&item.descriptor))
            .ok_or_else(|| AnalysisError::Linking {
                descriptor: Some(item.descriptor.clone()),
                reason: "linked graph has no reference provider".into(),
            })?;
        let reference = graph
            .provider(root)
            .map(|p| p.reference_amount)
            .ok_or_else(|| AnalysisError::NotFound(format!("provider #{root}")))?;
        let scale = item.amount / reference;

        let mut analysis = Analysis::new(&graph, self.results, root).with_config(&self.config);
        let mut rows = Vec::with_capacity(categories.len());
        for category in categories {
            self.check_cancel()?;
            let total = analysis.total_impact(category)?;
            rows.push(ReportRow::new(
                category.name.clone(),
                total * scale,
                category.reference_unit.clone(),
            ));
        }
        Ok(rows)
    }
}
