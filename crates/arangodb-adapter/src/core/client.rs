//! Document store abstraction.
//!
//! The adapter talks to its database exclusively through [`DocumentClient`].
//! The trait covers what the adapter needs from a document store: database
//! and collection bootstrap, bulk and single inserts, truncation, rule
//! queries with cursor-style results, and streaming transactions scoped to
//! a list of collections.

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StorageResult;
use crate::query::RuleQuery;

/// Identifies the type of document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// ArangoDB over its HTTP API.
    ArangoDB,
    /// In-process memory store.
    Memory,
    /// Custom or unknown backend.
    Custom(&'static str),
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::ArangoDB => write!(f, "arangodb"),
            BackendKind::Memory => write!(f, "memory"),
            BackendKind::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// Identifier of a streaming transaction, as handed out by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    /// Wraps a store-issued transaction id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The collection an operation targets, optionally inside a transaction.
#[derive(Debug, Clone, Copy)]
pub struct CollectionScope<'a> {
    /// Database name.
    pub database: &'a str,
    /// Collection name.
    pub collection: &'a str,
    /// Transaction the operation belongs to, if any.
    pub transaction: Option<&'a TransactionId>,
}

impl<'a> CollectionScope<'a> {
    /// Creates a scope outside of any transaction.
    pub fn new(database: &'a str, collection: &'a str) -> Self {
        Self {
            database,
            collection,
            transaction: None,
        }
    }

    /// Binds the scope to a transaction.
    pub fn in_transaction(mut self, transaction: Option<&'a TransactionId>) -> Self {
        self.transaction = transaction;
        self
    }
}

/// Result documents of a query, fetched batch by batch.
#[async_trait]
pub trait QueryCursor: Send {
    /// Returns the next document, or `None` once the cursor is drained.
    async fn next_document(&mut self) -> StorageResult<Option<Value>>;

    /// Releases server-side resources held by the cursor.
    async fn close(&mut self) -> StorageResult<()>;
}

/// A document store client.
///
/// Implementations must be cheap to share behind an `Arc`; the adapter and
/// all of its transaction-scoped copies use the same client.
#[async_trait]
pub trait DocumentClient: Send + Sync + Debug {
    /// Returns the kind of backend.
    fn kind(&self) -> BackendKind;

    /// Returns true if the database exists.
    async fn database_exists(&self, name: &str) -> StorageResult<bool>;

    /// Creates a database.
    async fn create_database(&self, name: &str) -> StorageResult<()>;

    /// Returns true if the collection exists in `database`.
    async fn collection_exists(&self, database: &str, name: &str) -> StorageResult<bool>;

    /// Creates a document collection in `database`.
    async fn create_collection(&self, database: &str, name: &str) -> StorageResult<()>;

    /// Ensures a persistent index over `fields` exists on the collection.
    async fn ensure_index(&self, scope: CollectionScope<'_>, fields: &[&str]) -> StorageResult<()>;

    /// Removes every document from the collection.
    async fn truncate_collection(&self, scope: CollectionScope<'_>) -> StorageResult<()>;

    /// Inserts one document.
    async fn insert_document(
        &self,
        scope: CollectionScope<'_>,
        document: Value,
    ) -> StorageResult<()>;

    /// Inserts documents in a single request.
    async fn insert_documents(
        &self,
        scope: CollectionScope<'_>,
        documents: Vec<Value>,
    ) -> StorageResult<()>;

    /// Executes a rule query and returns a cursor over its result documents.
    ///
    /// Removal and update queries produce an empty cursor.
    async fn query(
        &self,
        scope: CollectionScope<'_>,
        query: &RuleQuery,
    ) -> StorageResult<Box<dyn QueryCursor>>;

    /// Begins a streaming transaction with write access to `write_collections`.
    async fn begin_transaction(
        &self,
        database: &str,
        write_collections: &[String],
    ) -> StorageResult<TransactionId>;

    /// Commits a streaming transaction.
    async fn commit_transaction(&self, database: &str, id: &TransactionId) -> StorageResult<()>;

    /// Aborts a streaming transaction.
    async fn abort_transaction(&self, database: &str, id: &TransactionId) -> StorageResult<()>;

    /// Drops client-side state for a transaction that is abandoned without
    /// commit or abort.
    fn release_transaction(&self, _id: &TransactionId) {}
}
