//! Contribution analysis over linked product-system graphs.
//!
//! Given a linked graph of providers and externally computed direct impacts,
//! the crate resolves upstream-inclusive contributions per impact category,
//! arranges them into an ordered upstream tree, walks that tree for
//! reporting, and runs whole batches of items against an impact method.
//!
//! ```text
//!  GraphSource ──► LinkGraph ──► Resolver ──► ContributionSet
//!                                   ▲               │
//!                    ResultSource ──┘               ▼
//!                                            UpstreamTree ──► TreeWalker ──► Reporter
//! ```

pub mod batch;
pub mod config;
pub mod core;
pub mod report;
pub mod sources;

pub use batch::{BatchOrchestrator, BatchReport, CancelFlag, ItemOutcome, ItemStatus, WorkItem};
pub use config::{AnalysisConfig, BatchConfig};
pub use crate::core::error::{AnalysisError, ErrorKind, SourceError};
pub use crate::core::graph::{GraphError, GraphSnapshot, LinkGraph};
pub use crate::core::resolve::{CycleSettings, Resolver, resolve};
pub use crate::core::session::Analysis;
pub use crate::core::state::{ContributionRecord, ContributionSet, ContributionWarning};
pub use crate::core::tree::{TreeNode, TreeOptions, UpstreamTree};
pub use crate::core::types::{Category, ExchangeEdge, Provider};
pub use crate::core::walk::{TreeWalker, WalkStep};
pub use report::{MemoryReporter, ReportError, ReportRow, Reporter, ToonReporter};
pub use sources::{DirectResults, GraphCatalog, GraphSource, MethodCatalog, ResultSource, StaticMethodCatalog};
