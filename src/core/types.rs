use serde::{Deserialize, Serialize};

/// Arena index of a provider inside a `LinkGraph`.
pub type ProviderIdx = usize;
/// Arena index of an exchange edge inside a `LinkGraph`.
pub type EdgeIdx = usize;
/// Arena index of a node inside an `UpstreamTree`.
pub type NodeIdx = usize;

/// A process or sub-product-system node of a linked graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    /// Quantity of the provider's reference flow the graph is scaled to.
    pub reference_amount: f64,
}

impl Provider {
    pub fn new(id: impl Into<String>, name: impl Into<String>, reference_amount: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            reference_amount,
        }
    }
}

/// An impact category of an impact method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub reference_unit: String,
}

impl Category {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        reference_unit: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            reference_unit: reference_unit.into(),
        }
    }
}

/// Directed supply link: `supplier` delivers `amount` of `flow` to `consumer`.
///
/// Positive amounts are outputs of the supplier consumed downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeEdge {
    pub supplier: ProviderIdx,
    pub consumer: ProviderIdx,
    pub flow: String,
    pub amount: f64,
}
