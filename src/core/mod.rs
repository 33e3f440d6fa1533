pub mod error;
pub mod graph;
pub mod resolve;
pub mod session;
pub mod state;
pub mod tree;
pub mod types;
pub mod walk;
