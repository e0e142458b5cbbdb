//! State Store (C3): the persistent data model, its invariants, and the
//! atomic-write store that guards every read-modify-write cycle.

pub mod document;
pub mod model;
pub mod validate;

pub use document::{StateDocument, StateStore};
pub use model::{Cluster, ClusterNode, NodeRole, NodeStatus, Route};
