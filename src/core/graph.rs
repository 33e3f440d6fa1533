use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{EdgeIdx, ExchangeEdge, Provider, ProviderIdx};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("provider `{0}` is already part of the graph")]
    DuplicateProvider(String),

    #[error("provider `{0}` not found")]
    ProviderNotFound(String),

    #[error("provider index {0} is out of range")]
    ProviderIdxOutOfRange(ProviderIdx),

    #[error("edge index {0} is out of range")]
    EdgeNotFound(EdgeIdx),

    #[error("provider `{id}` has invalid reference amount {amount}")]
    InvalidReferenceAmount { id: String, amount: f64 },

    #[error("exchange of flow `{flow}` has non-finite amount {amount}")]
    InvalidEdgeAmount { flow: String, amount: f64 },

    #[error("malformed graph snapshot: {0}")]
    Snapshot(String),
}

/// Arena of providers and the exchange edges linking them.
///
/// Supply loops are legal. Providers and edges are never removed, so arena
/// indices handed out by `add_provider`/`add_edge` stay valid for the graph's
/// lifetime.
#[derive(Debug, Clone, Default)]
pub struct LinkGraph {
    providers: Vec<Provider>,
    edges: Vec<ExchangeEdge>,
    by_id: HashMap<String, ProviderIdx>,
    // consumer -> incoming supply edges, in insertion order
    supplies: Vec<Vec<EdgeIdx>>,
    root: Option<ProviderIdx>,
}

impl LinkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_provider(&mut self, provider: Provider) -> Result<ProviderIdx, GraphError> {
        if !provider.reference_amount.is_finite() || provider.reference_amount == 0.0 {
            return Err(GraphError::InvalidReferenceAmount {
                id: provider.id,
                amount: provider.reference_amount,
            });
        }
        if self.by_id.contains_key(&provider.id) {
            return Err(GraphError::DuplicateProvider(provider.id));
        }

        let idx = self.providers.len();
        self.by_id.insert(provider.id.clone(), idx);
        self.providers.push(provider);
        self.supplies.push(Vec::new());
        Ok(idx)
    }

    pub fn add_edge(&mut self, edge: ExchangeEdge) -> Result<EdgeIdx, GraphError> {
        self.expect_provider(edge.supplier)?;
        self.expect_provider(edge.consumer)?;
        if !edge.amount.is_finite() {
            return Err(GraphError::InvalidEdgeAmount {
                flow: edge.flow,
                amount: edge.amount,
            });
        }

        let idx = self.edges.len();
        self.supplies[edge.consumer].push(idx);
        self.edges.push(edge);
        Ok(idx)
    }

    /// Convenience for linking by provider identifiers.
    pub fn link(
        &mut self,
        supplier: &str,
        consumer: &str,
        flow: impl Into<String>,
        amount: f64,
    ) -> Result<EdgeIdx, GraphError> {
        let supplier = self.require_id(supplier)?;
        let consumer = self.require_id(consumer)?;
        self.add_edge(ExchangeEdge {
            supplier,
            consumer,
            flow: flow.into(),
            amount,
        })
    }

    /// Marks the reference provider the graph was linked for.
    pub fn set_root(&mut self, idx: ProviderIdx) -> Result<(), GraphError> {
        self.expect_provider(idx)?;
        self.root = Some(idx);
        Ok(())
    }

    pub fn root(&self) -> Option<ProviderIdx> {
        self.root
    }

    fn expect_provider(&self, idx: ProviderIdx) -> Result<(), GraphError> {
        if idx < self.providers.len() {
            Ok(())
        } else {
            Err(GraphError::ProviderIdxOutOfRange(idx))
        }
    }

    pub fn require_id(&self, id: &str) -> Result<ProviderIdx, GraphError> {
        self.index_of(id)
            .ok_or_else(|| GraphError::ProviderNotFound(id.to_string()))
    }

    pub fn index_of(&self, id: &str) -> Option<ProviderIdx> {
        self.by_id.get(id).copied()
    }

    pub fn provider(&self, idx: ProviderIdx) -> Option<&Provider> {
        self.providers.get(idx)
    }

    pub fn edge(&self, idx: EdgeIdx) -> Option<&ExchangeEdge> {
        self.edges.get(idx)
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn providers(&self) -> impl Iterator<Item = (ProviderIdx, &Provider)> + '_ {
        self.providers.iter().enumerate()
    }

    /// Incoming supply edges of `consumer`, in insertion order.
    pub fn supply_edges(&self, consumer: ProviderIdx) -> &[EdgeIdx] {
        self.supplies
            .get(consumer)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// `(edge index, edge)` pairs of the direct suppliers of `consumer`.
    pub fn suppliers_of(
        &self,
        consumer: ProviderIdx,
    ) -> impl Iterator<Item = (EdgeIdx, &ExchangeEdge)> + '_ {
        self.supply_edges(consumer)
            .iter()
            .map(move |&eid| (eid, &self.edges[eid]))
    }

    /// Fraction of the supplier's reference output that the edge represents:
    /// `amount(edge) / reference_amount(supplier)`.
    pub fn supply_fraction(&self, edge: EdgeIdx) -> Result<f64, GraphError> {
        let e = self.edges.get(edge).ok_or(GraphError::EdgeNotFound(edge))?;
        Ok(self.fraction(e))
    }

    // Edges only enter the arena through `add_edge`, so both endpoints exist.
    pub(crate) fn fraction(&self, e: &ExchangeEdge) -> f64 {
        e.amount / self.providers[e.supplier].reference_amount
    }

    /// Every provider reachable from `root` by walking supply edges upstream,
    /// `root` first, each provider exactly once. Terminates on supply loops.
    pub fn reachable_from(&self, root: ProviderIdx) -> Result<Vec<ProviderIdx>, GraphError> {
        self.expect_provider(root)?;

        let mut seen = vec![false; self.providers.len()];
        let mut order = Vec::new();
        let mut stack = vec![root];
        seen[root] = true;

        while let Some(p) = stack.pop() {
            order.push(p);
            for &eid in self.supply_edges(p).iter().rev() {
                let s = self.edges[eid].supplier;
                if !seen[s] {
                    seen[s] = true;
                    stack.push(s);
                }
            }
        }
        Ok(order)
    }

    pub fn from_snapshot(snapshot: &GraphSnapshot) -> Result<Self, GraphError> {
        let mut g = Self::new();
        for p in &snapshot.providers {
            g.add_provider(p.clone())?;
        }
        for l in &snapshot.links {
            g.link(&l.supplier, &l.consumer, l.flow.clone(), l.amount)?;
        }
        if let Some(root) = &snapshot.root {
            let idx = g.require_id(root)?;
            g.set_root(idx)?;
        }
        Ok(g)
    }

    pub fn to_snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            root: self.root.map(|r| self.providers[r].id.clone()),
            providers: self.providers.clone(),
            links: self
                .edges
                .iter()
                .map(|e| SnapshotLink {
                    supplier: self.providers[e.supplier].id.clone(),
                    consumer: self.providers[e.consumer].id.clone(),
                    flow: e.flow.clone(),
                    amount: e.amount,
                })
                .collect(),
        }
    }
}

/// Serializable form of a linked graph; links reference providers by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub root: Option<String>,
    pub providers: Vec<Provider>,
    #[serde(default)]
    pub links: Vec<SnapshotLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotLink {
    pub supplier: String,
    pub consumer: String,
    pub flow: String,
    pub amount: f64,
}

impl GraphSnapshot {
    pub fn from_toon(input: &str) -> Result<Self, GraphError> {
        toon_format::decode_default(input).map_err(|e| GraphError::Snapshot(e.to_string()))
    }

    pub fn to_toon(&self) -> Result<String, GraphError> {
        toon_format::encode_default(self).map_err(|e| GraphError::Snapshot(e.to_string()))
    }
}
