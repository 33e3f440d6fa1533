//! Seams to the excluded collaborators: system linking, the calculation
//! result store and the impact method catalog.
//!
//! The in-memory implementations serve hosts that already hold their data
//! and the crate's own tests.

use std::collections::HashMap;

use crate::core::error::SourceError;
use crate::core::graph::{GraphError, GraphSnapshot, LinkGraph};
use crate::core::types::{Category, Provider};

/// Produces a fully linked graph for a root descriptor (e.g. a process id).
pub trait GraphSource: Send + Sync {
    /// Fails with `NotFound` for unknown descriptors and `Linking` when the
    /// graph cannot be fully linked.
    fn linked_graph(&self, descriptor: &str) -> Result<LinkGraph, SourceError>;
}

/// Precomputed direct impact of a provider for a category.
pub trait ResultSource: Send + Sync {
    fn direct_contribution(
        &self,
        provider: &Provider,
        category: &Category,
    ) -> Result<f64, SourceError>;
}

/// Ordered impact categories of an impact method.
pub trait MethodCatalog: Send + Sync {
    fn categories_of(&self, method: &str) -> Result<Vec<Category>, SourceError>;
}

/// Graph snapshots keyed by descriptor, linked on every request.
#[derive(Debug, Clone, Default)]
pub struct GraphCatalog {
    snapshots: HashMap<String, GraphSnapshot>,
}

impl GraphCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, descriptor: impl Into<String>, snapshot: GraphSnapshot) {
        self.snapshots.insert(descriptor.into(), snapshot);
    }

    pub fn insert_graph(&mut self, descriptor: impl Into<String>, graph: &LinkGraph) {
        self.insert(descriptor, graph.to_snapshot());
    }

    pub fn insert_toon(
        &mut self,
        descriptor: impl Into<String>,
        input: &str,
    ) -> Result<(), GraphError> {
        let snapshot = GraphSnapshot::from_toon(input)?;
        self.insert(descriptor, snapshot);
        Ok(())
    }
}

impl GraphSource for GraphCatalog {
    fn linked_graph(&self, descriptor: &str) -> Result<LinkGraph, SourceError> {
        let snapshot = self
            .snapshots
            .get(descriptor)
            .ok_or_else(|| SourceError::not_found(format!("graph `{descriptor}`")))?;

        LinkGraph::from_snapshot(snapshot)
            .map_err(|e| SourceError::linking(descriptor, e.to_string()))
    }
}

/// Direct contributions keyed by `(provider id, category id)`.
#[derive(Debug, Clone, Default)]
pub struct DirectResults {
    values: HashMap<(String, String), f64>,
}

impl DirectResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, provider: impl Into<String>, category: impl Into<String>, value: f64) {
        self.values.insert((provider.into(), category.into()), value);
    }

    pub fn with(mut self, provider: &str, category: &str, value: f64) -> Self {
        self.set(provider, category, value);
        self
    }
}

impl ResultSource for DirectResults {
    fn direct_contribution(
        &self,
        provider: &Provider,
        category: &Category,
    ) -> Result<f64, SourceError> {
        self.values
            .get(&(provider.id.clone(), category.id.clone()))
            .copied()
            .ok_or_else(|| {
                SourceError::not_found(format!(
                    "result for provider `{}` in category `{}`",
                    provider.id, category.id
                ))
            })
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticMethodCatalog {
    methods: HashMap<String, Vec<Category>>,
}

impl StaticMethodCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, method: impl Into<String>, categories: Vec<Category>) {
        self.methods.insert(method.into(), categories);
    }
}

impl MethodCatalog for StaticMethodCatalog {
    fn categories_of(&self, method: &str) -> Result<Vec<Category>, SourceError> {
        self.methods
            .get(method)
            .cloned()
            .ok_or_else(|| SourceError::not_found(format!("impact method `{method}`")))
    }
}
