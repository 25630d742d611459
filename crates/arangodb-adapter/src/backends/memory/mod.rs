//! In-process document store.
//!
//! [`MemoryClient`] keeps databases and collections in process memory and
//! evaluates [`RuleQuery`](crate::query::RuleQuery) predicates directly
//! instead of parsing AQL. Streaming transactions work on a private copy
//! of their write collections that replaces the committed ones on commit.
//!
//! Intended for unit tests and applications that want the adapter's
//! behavior without running a database. Nothing is persisted.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use casbin_arangodb_adapter::backends::memory::MemoryClient;
//! use casbin_arangodb_adapter::{ArangoAdapter, PolicyAdapter};
//!
//! # tokio_test_block(async {
//! let client = Arc::new(MemoryClient::new());
//! let adapter = ArangoAdapter::from_client(client.clone(), "casbin", "casbin_rule")
//!     .await
//!     .unwrap();
//!
//! adapter
//!     .add_policy("p", "p", &["alice".into(), "data1".into(), "read".into()])
//!     .await
//!     .unwrap();
//! assert_eq!(client.document_count("casbin", "casbin_rule"), 1);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

mod client;

pub use client::MemoryClient;
