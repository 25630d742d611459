//! Core traits and abstractions.
//!
//! - [`DocumentClient`] - the document store the adapter persists into
//! - [`QueryCursor`] - batch-wise access to query results
//! - [`PolicyAdapter`] - the operations an enforcer calls on its adapter
//!
//! ```text
//! enforcer ──▶ PolicyAdapter (ArangoAdapter)
//!                   │  RuleQuery / CasbinRule
//!                   ▼
//!              DocumentClient ──▶ ArangoDB | memory
//! ```

pub mod adapter;
pub mod client;

pub use adapter::PolicyAdapter;
pub use client::{BackendKind, CollectionScope, DocumentClient, QueryCursor, TransactionId};
