//! # casbin-arangodb-adapter
//!
//! ArangoDB storage adapter for Casbin access-control policies.
//!
//! Policy rules (a policy type plus up to six string values) are stored one
//! document per rule in an ArangoDB collection. The adapter loads them into
//! an in-memory policy model, writes single changes back as they happen, and
//! can replace the whole collection from a model.
//!
//! # Features
//!
//! - **Incremental updates**: add, remove, update, and remove by field filter
//! - **Filtered loading**: load only the rules matching one or more filters
//! - **Transactions**: ArangoDB streaming transactions, either as an explicit
//!   context or as a closure that commits on success and rolls back on error
//! - **Clusters and TLS**: round-robin over several endpoints, custom CA
//!   certificates and client identities
//! - **Bound parameters**: rule values never appear in query text
//!
//! # Backend Features
//!
//! - `arangodb` (default) - HTTP client for ArangoDB
//! - `arangodb-integration` - integration tests against a containerized
//!   ArangoDB (requires Docker)
//!
//! The in-memory backend in [`backends::memory`] is always available.
//!
//! # Architecture
//!
//! - [`config`] - Connection settings and environment loading
//! - [`core`] - Traits at the seams: [`DocumentClient`], [`PolicyAdapter`]
//! - [`backends`] - ArangoDB and in-memory document stores
//! - [`rule`] - The rule document and its codec
//! - [`filter`] - Filters for partial loads
//! - [`query`] - Query builder with AQL rendering
//! - [`model`] - The policy model the adapter loads into
//! - [`adapter`] - [`ArangoAdapter`]
//! - [`transaction`] - Streaming transactions
//! - [`error`] - Error types for all operations
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use casbin_arangodb_adapter::backends::memory::MemoryClient;
//! use casbin_arangodb_adapter::{ArangoAdapter, Filter, MemoryModel, PolicyAdapter};
//!
//! # tokio_test_block(async {
//! let adapter = ArangoAdapter::from_client(Arc::new(MemoryClient::new()), "casbin", "casbin_rule")
//!     .await
//!     .unwrap();
//!
//! let rules = vec![
//!     vec!["alice".to_string(), "data1".to_string(), "read".to_string()],
//!     vec!["bob".to_string(), "data2".to_string(), "write".to_string()],
//! ];
//! adapter.add_policies("p", "p", &rules).await.unwrap();
//!
//! let mut model = MemoryModel::new();
//! adapter
//!     .load_filtered_policy(&mut model, Filter::new().value(0, ["alice"]).into())
//!     .await
//!     .unwrap();
//!
//! assert_eq!(model.len(), 1);
//! assert!(adapter.is_filtered());
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod adapter;
pub mod backends;
pub mod config;
pub mod core;
pub mod error;
pub mod filter;
pub mod model;
pub mod query;
pub mod rule;
pub mod transaction;

// Re-export commonly used types at crate root
pub use adapter::ArangoAdapter;
pub use config::{Config, TlsConfig, TlsSettings, TlsVersion};
pub use core::{DocumentClient, PolicyAdapter};
pub use error::{StorageError, StorageResult};
pub use filter::{BatchFilter, Filter};
pub use model::{MemoryModel, PolicyModel};
pub use rule::CasbinRule;
pub use transaction::{ArangoTransactionContext, TransactionState};
