//! Runs the impact calculation for many work items and reports one group of
//! `(category, value, unit)` rows per item.

mod cancel;
mod orchestrator;

pub use cancel::CancelFlag;
pub use orchestrator::BatchOrchestrator;

use serde::{Deserialize, Serialize};

use crate::core::error::{AnalysisError, ErrorKind};
use crate::report::ReportRow;

/// A named process to calculate, scaled to `amount` of its reference flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub name: String,
    /// Identifier handed to the graph source (e.g. a process uuid).
    pub descriptor: String,
    pub amount: f64,
}

impl WorkItem {
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>, amount: f64) -> Self {
        Self {
            name: name.into(),
            descriptor: descriptor.into(),
            amount,
        }
    }
}

#[derive(Deserialize)]
struct WorkList {
    items: Vec<WorkItem>,
}

/// Reads a TOON work list:
///
/// ```text
/// items[2]{name,descriptor,amount}:
///   Kettle,p-kettle,1
///   Smelter,p-smelter,2.5
/// ```
pub fn parse_work_items(input: &str) -> Result<Vec<WorkItem>, AnalysisError> {
    let list: WorkList =
        toon_format::decode_default(input).map_err(|e| AnalysisError::Config(e.to_string()))?;
    Ok(list.items)
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemStatus {
    Completed(Vec<ReportRow>),
    Failed(AnalysisError),
}

/// Result of one attempted work item, success or failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemOutcome {
    /// Position of the item in the input sequence.
    pub index: usize,
    pub name: String,
    pub status: ItemStatus,
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, ItemStatus::Completed(_))
    }

    pub fn rows(&self) -> Option<&[ReportRow]> {
        match &self.status {
            ItemStatus::Completed(rows) => Some(rows),
            ItemStatus::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&AnalysisError> {
        match &self.status {
            ItemStatus::Completed(_) => None,
            ItemStatus::Failed(e) => Some(e),
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error().map(AnalysisError::kind)
    }
}

/// One outcome per input item, in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_accessors_follow_status() {
        let ok = ItemOutcome {
            index: 0,
            name: "Kettle".into(),
            status: ItemStatus::Completed(vec![ReportRow::new("Climate change", 1.0, "kg CO2 eq")]),
        };
        let bad = ItemOutcome {
            index: 1,
            name: "Smelter".into(),
            status: ItemStatus::Failed(AnalysisError::Cancelled),
        };

        assert!(ok.is_success());
        assert_eq!(ok.rows().unwrap().len(), 1);
        assert_eq!(bad.error_kind(), Some(ErrorKind::Cancelled));

        let report = BatchReport {
            outcomes: vec![ok, bad],
        };
        assert_eq!((report.succeeded(), report.failed()), (1, 1));
    }

    #[test]
    fn work_list_reads_toon_table() {
        let input = "items[2]{name,descriptor,amount}:\n  Kettle,p-kettle,1\n  Smelter,p-smelter,2.5";

        let items = parse_work_items(input).unwrap();
        assert_eq!(
            items,
            vec![
                WorkItem::new("Kettle", "p-kettle", 1.0),
                WorkItem::new("Smelter", "p-smelter", 2.5),
            ]
        );
    }
}
