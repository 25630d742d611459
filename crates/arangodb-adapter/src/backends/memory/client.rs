//! The in-process [`DocumentClient`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::core::{BackendKind, CollectionScope, DocumentClient, QueryCursor, TransactionId};
use crate::error::{BackendError, StorageError, StorageResult, TransactionError};
use crate::query::{QueryAction, RuleQuery};
use crate::rule::CasbinRule;

const BACKEND_NAME: &str = "memory";

// ArangoDB error numbers reused for the same conditions.
const ERROR_DUPLICATE_NAME: i64 = 1207;
const ERROR_TRANSACTION_UNREGISTERED_COLLECTION: i64 = 1652;

type Collections = HashMap<String, Vec<CasbinRule>>;

#[derive(Debug, Default)]
struct MemoryState {
    databases: HashMap<String, Collections>,
    indexes: HashMap<(String, String), Vec<Vec<String>>>,
    transactions: HashMap<TransactionId, Workspace>,
}

/// Private copy of a transaction's write collections.
///
/// Reads inside the transaction see `collections`. Commit replays `log`
/// onto the committed collections, so writes made outside the transaction
/// in the meantime survive.
#[derive(Debug)]
struct Workspace {
    database: String,
    collections: Collections,
    log: Vec<(String, WriteOp)>,
}

/// A change to one collection.
#[derive(Debug)]
enum WriteOp {
    Insert(Vec<CasbinRule>),
    Truncate,
    Modify(RuleQuery),
}

impl WriteOp {
    fn apply(&self, collection: &mut Vec<CasbinRule>) {
        match self {
            WriteOp::Insert(rules) => collection.extend(rules.iter().cloned()),
            WriteOp::Truncate => collection.clear(),
            WriteOp::Modify(query) => match query.action() {
                QueryAction::Return => {}
                QueryAction::Remove => collection.retain(|rule| !query.matches(rule)),
                QueryAction::Update(new) => {
                    for rule in collection.iter_mut().filter(|rule| query.matches(rule)) {
                        let key = std::mem::take(&mut rule.key);
                        *rule = CasbinRule {
                            key,
                            ..new.clone()
                        };
                    }
                }
            },
        }
    }
}

impl MemoryState {
    fn collection(&self, scope: CollectionScope<'_>) -> StorageResult<&Vec<CasbinRule>> {
        match scope.transaction {
            Some(id) => self
                .workspace(scope, id)?
                .collections
                .get(scope.collection)
                .ok_or_else(|| unregistered_collection(scope)),
            None => self
                .databases
                .get(scope.database)
                .ok_or_else(|| database_not_found(scope.database))?
                .get(scope.collection)
                .ok_or_else(|| collection_not_found(scope.database, scope.collection)),
        }
    }

    fn workspace(&self, scope: CollectionScope<'_>, id: &TransactionId) -> StorageResult<&Workspace> {
        let workspace = self
            .transactions
            .get(id)
            .ok_or_else(|| transaction_not_found(id))?;
        if workspace.database != scope.database {
            return Err(unregistered_collection(scope));
        }
        Ok(workspace)
    }

    fn apply_write(&mut self, scope: CollectionScope<'_>, op: WriteOp) -> StorageResult<()> {
        match scope.transaction {
            Some(id) => {
                let workspace = self
                    .transactions
                    .get_mut(id)
                    .ok_or_else(|| transaction_not_found(id))?;
                if workspace.database != scope.database {
                    return Err(unregistered_collection(scope));
                }
                let collection = workspace
                    .collections
                    .get_mut(scope.collection)
                    .ok_or_else(|| unregistered_collection(scope))?;
                op.apply(collection);
                workspace.log.push((scope.collection.to_string(), op));
            }
            None => {
                let collection = self
                    .databases
                    .get_mut(scope.database)
                    .ok_or_else(|| database_not_found(scope.database))?
                    .get_mut(scope.collection)
                    .ok_or_else(|| collection_not_found(scope.database, scope.collection))?;
                op.apply(collection);
            }
        }
        Ok(())
    }
}

/// A [`DocumentClient`] keeping everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryClient {
    state: RwLock<MemoryState>,
    next_key: AtomicU64,
    insert_budget: Mutex<Option<usize>>,
}

impl MemoryClient {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes insert requests fail once `documents` more documents have
    /// been inserted.
    ///
    /// A request that would exceed the remaining budget fails without
    /// inserting anything.
    pub fn fail_inserts_after(&self, documents: usize) {
        *self.insert_budget.lock() = Some(documents);
    }

    /// Removes a limit set by [`fail_inserts_after`](Self::fail_inserts_after).
    pub fn clear_insert_failures(&self) {
        *self.insert_budget.lock() = None;
    }

    /// Returns the number of committed documents in a collection.
    pub fn document_count(&self, database: &str, collection: &str) -> usize {
        self.state
            .read()
            .databases
            .get(database)
            .and_then(|collections| collections.get(collection))
            .map_or(0, Vec::len)
    }

    /// Returns the committed documents of a collection.
    pub fn documents(&self, database: &str, collection: &str) -> Vec<CasbinRule> {
        self.state
            .read()
            .databases
            .get(database)
            .and_then(|collections| collections.get(collection))
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the index field lists created on a collection.
    pub fn indexes(&self, database: &str, collection: &str) -> Vec<Vec<String>> {
        self.state
            .read()
            .indexes
            .get(&(database.to_string(), collection.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the number of transactions that are neither committed nor
    /// aborted.
    pub fn active_transactions(&self) -> usize {
        self.state.read().transactions.len()
    }

    fn take_insert_budget(&self, documents: usize) -> StorageResult<()> {
        let mut budget = self.insert_budget.lock();
        match budget.as_mut() {
            Some(remaining) if *remaining < documents => Err(StorageError::Backend(
                BackendError::Unavailable {
                    backend_name: BACKEND_NAME.to_string(),
                    message: "injected insert failure".to_string(),
                },
            )),
            Some(remaining) => {
                *remaining -= documents;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn prepare(&self, document: Value) -> StorageResult<CasbinRule> {
        let mut rule: CasbinRule = serde_json::from_value(document)?;
        if rule.key.is_empty() {
            rule.key = (self.next_key.fetch_add(1, Ordering::Relaxed) + 1).to_string();
        }
        Ok(rule)
    }
}

#[async_trait]
impl DocumentClient for MemoryClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    async fn database_exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.state.read().databases.contains_key(name))
    }

    async fn create_database(&self, name: &str) -> StorageResult<()> {
        let mut state = self.state.write();
        if state.databases.contains_key(name) {
            return Err(duplicate_name(name));
        }
        state.databases.insert(name.to_string(), Collections::new());
        Ok(())
    }

    async fn collection_exists(&self, database: &str, name: &str) -> StorageResult<bool> {
        let state = self.state.read();
        let collections = state
            .databases
            .get(database)
            .ok_or_else(|| database_not_found(database))?;
        Ok(collections.contains_key(name))
    }

    async fn create_collection(&self, database: &str, name: &str) -> StorageResult<()> {
        let mut state = self.state.write();
        let collections = state
            .databases
            .get_mut(database)
            .ok_or_else(|| database_not_found(database))?;
        if collections.contains_key(name) {
            return Err(duplicate_name(name));
        }
        collections.insert(name.to_string(), Vec::new());
        Ok(())
    }

    async fn ensure_index(&self, scope: CollectionScope<'_>, fields: &[&str]) -> StorageResult<()> {
        let mut state = self.state.write();
        state.collection(scope)?;

        let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        let indexes = state
            .indexes
            .entry((scope.database.to_string(), scope.collection.to_string()))
            .or_default();
        if !indexes.contains(&fields) {
            indexes.push(fields);
        }
        Ok(())
    }

    async fn truncate_collection(&self, scope: CollectionScope<'_>) -> StorageResult<()> {
        self.state.write().apply_write(scope, WriteOp::Truncate)
    }

    async fn insert_document(
        &self,
        scope: CollectionScope<'_>,
        document: Value,
    ) -> StorageResult<()> {
        self.insert_documents(scope, vec![document]).await
    }

    async fn insert_documents(
        &self,
        scope: CollectionScope<'_>,
        documents: Vec<Value>,
    ) -> StorageResult<()> {
        let rules = documents
            .into_iter()
            .map(|document| self.prepare(document))
            .collect::<StorageResult<Vec<_>>>()?;

        let mut state = self.state.write();
        state.collection(scope)?;
        self.take_insert_budget(rules.len())?;
        state.apply_write(scope, WriteOp::Insert(rules))
    }

    async fn query(
        &self,
        scope: CollectionScope<'_>,
        query: &RuleQuery,
    ) -> StorageResult<Box<dyn QueryCursor>> {
        let results = match query.action() {
            QueryAction::Return => self
                .state
                .read()
                .collection(scope)?
                .iter()
                .filter(|rule| query.matches(rule))
                .map(serde_json::to_value)
                .collect::<Result<Vec<_>, _>>()?,
            QueryAction::Remove | QueryAction::Update(_) => {
                self.state
                    .write()
                    .apply_write(scope, WriteOp::Modify(query.clone()))?;
                Vec::new()
            }
        };

        Ok(Box::new(MemoryCursor {
            documents: results.into_iter(),
        }))
    }

    async fn begin_transaction(
        &self,
        database: &str,
        write_collections: &[String],
    ) -> StorageResult<TransactionId> {
        let mut state = self.state.write();
        let committed = state
            .databases
            .get(database)
            .ok_or_else(|| database_not_found(database))?;

        let mut collections = Collections::new();
        for name in write_collections {
            let documents = committed
                .get(name)
                .ok_or_else(|| collection_not_found(database, name))?;
            collections.insert(name.clone(), documents.clone());
        }

        let id = TransactionId::new(uuid::Uuid::new_v4().to_string());
        state.transactions.insert(
            id.clone(),
            Workspace {
                database: database.to_string(),
                collections,
                log: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn commit_transaction(&self, database: &str, id: &TransactionId) -> StorageResult<()> {
        let mut state = self.state.write();
        let workspace = take_workspace(&mut state, database, id)?;
        let committed = state
            .databases
            .get_mut(database)
            .ok_or_else(|| database_not_found(database))?;
        if let Some((name, _)) = workspace
            .log
            .iter()
            .find(|(name, _)| !committed.contains_key(name))
        {
            return Err(collection_not_found(database, name));
        }

        for (name, op) in &workspace.log {
            if let Some(collection) = committed.get_mut(name) {
                op.apply(collection);
            }
        }
        Ok(())
    }

    async fn abort_transaction(&self, database: &str, id: &TransactionId) -> StorageResult<()> {
        take_workspace(&mut self.state.write(), database, id)?;
        Ok(())
    }

    fn release_transaction(&self, id: &TransactionId) {
        self.state.write().transactions.remove(id);
    }
}

fn take_workspace(
    state: &mut MemoryState,
    database: &str,
    id: &TransactionId,
) -> StorageResult<Workspace> {
    match state.transactions.remove(id) {
        Some(workspace) if workspace.database == database => Ok(workspace),
        Some(workspace) => {
            state.transactions.insert(id.clone(), workspace);
            Err(transaction_not_found(id))
        }
        None => Err(transaction_not_found(id)),
    }
}

/// Cursor over documents materialized by a memory query.
struct MemoryCursor {
    documents: std::vec::IntoIter<Value>,
}

#[async_trait]
impl QueryCursor for MemoryCursor {
    async fn next_document(&mut self) -> StorageResult<Option<Value>> {
        Ok(self.documents.next())
    }

    async fn close(&mut self) -> StorageResult<()> {
        self.documents = Vec::new().into_iter();
        Ok(())
    }
}

fn database_not_found(name: &str) -> StorageError {
    StorageError::Backend(BackendError::DatabaseNotFound {
        name: name.to_string(),
    })
}

fn collection_not_found(database: &str, name: &str) -> StorageError {
    StorageError::Backend(BackendError::CollectionNotFound {
        database: database.to_string(),
        name: name.to_string(),
    })
}

fn transaction_not_found(id: &TransactionId) -> StorageError {
    StorageError::Transaction(TransactionError::NotFound { id: id.to_string() })
}

fn duplicate_name(name: &str) -> StorageError {
    StorageError::Backend(BackendError::Request {
        backend_name: BACKEND_NAME.to_string(),
        status: 409,
        error_num: Some(ERROR_DUPLICATE_NAME),
        message: format!("duplicate name: {}", name),
    })
}

fn unregistered_collection(scope: CollectionScope<'_>) -> StorageError {
    StorageError::Backend(BackendError::Request {
        backend_name: BACKEND_NAME.to_string(),
        status: 400,
        error_num: Some(ERROR_TRANSACTION_UNREGISTERED_COLLECTION),
        message: format!(
            "collection {}/{} is not part of the transaction",
            scope.database, scope.collection
        ),
    })
}
