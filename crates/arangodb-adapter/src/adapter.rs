//! The policy adapter.
//!
//! [`ArangoAdapter`] implements [`PolicyAdapter`] on top of any
//! [`DocumentClient`]. It owns no policy state of its own: every operation
//! is translated into document inserts or a [`RuleQuery`] against the rule
//! collection.
//!
//! # Example
//!
//! ```no_run
//! use casbin_arangodb_adapter::{ArangoAdapter, Config, MemoryModel, PolicyAdapter};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let adapter = ArangoAdapter::new(
//!     Config::default()
//!         .with_endpoints(["http://localhost:8529"])
//!         .with_authentication("root", "password"),
//! )
//! .await?;
//!
//! adapter
//!     .add_policy("p", "p", &["alice".into(), "data1".into(), "read".into()])
//!     .await?;
//!
//! let mut model = MemoryModel::new();
//! adapter.load_policy(&mut model).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

#[cfg(feature = "arangodb")]
use crate::backends::arangodb::ArangoClient;
#[cfg(feature = "arangodb")]
use crate::config::Config;
use crate::core::{CollectionScope, DocumentClient, PolicyAdapter, QueryCursor};
use crate::error::{BackendError, StorageError, StorageResult, TransactionError, ValidationError};
use crate::filter::BatchFilter;
use crate::model::{POLICY_SECTIONS, PolicyModel};
use crate::query::RuleQuery;
use crate::rule::{CasbinRule, RuleField};
use crate::transaction::TransactionHandle;

/// Documents per bulk insert when no configuration supplies a batch size.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Persists Casbin policy rules in an ArangoDB collection.
///
/// Cloning is cheap: clones share the client, the filtered flag and the
/// transaction lock.
#[derive(Debug, Clone)]
pub struct ArangoAdapter {
    client: Arc<dyn DocumentClient>,
    database: String,
    collection: String,
    batch_size: usize,
    filtered: Arc<AtomicBool>,
    pub(crate) transaction: Option<TransactionHandle>,
    pub(crate) transaction_lock: Arc<tokio::sync::Mutex<()>>,
}

impl ArangoAdapter {
    /// Connects to ArangoDB and prepares the database, collection and index.
    #[cfg(feature = "arangodb")]
    pub async fn new(config: Config) -> StorageResult<Self> {
        let client = ArangoClient::new(&config)?;
        let adapter = Self::unbootstrapped(
            Arc::new(client),
            config.database_name,
            config.collection_name,
        )
        .with_batch_size(config.batch_size);
        adapter.bootstrap().await?;
        Ok(adapter)
    }

    /// Like [`new`](Self::new), but the adapter starts out filtered so that
    /// a full save is refused by enforcers until a complete load has run.
    #[cfg(feature = "arangodb")]
    pub async fn new_filtered(config: Config) -> StorageResult<Self> {
        let adapter = Self::new(config).await?;
        adapter.filtered.store(true, Ordering::SeqCst);
        Ok(adapter)
    }

    /// Creates an adapter on an existing client.
    ///
    /// The database, collection and index are created if missing.
    pub async fn from_client(
        client: Arc<dyn DocumentClient>,
        database: impl Into<String>,
        collection: impl Into<String>,
    ) -> StorageResult<Self> {
        let adapter = Self::unbootstrapped(client, database.into(), collection.into());
        adapter.bootstrap().await?;
        Ok(adapter)
    }

    fn unbootstrapped(
        client: Arc<dyn DocumentClient>,
        database: String,
        collection: String,
    ) -> Self {
        Self {
            client,
            database,
            collection,
            batch_size: DEFAULT_BATCH_SIZE,
            filtered: Arc::new(AtomicBool::new(false)),
            transaction: None,
            transaction_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Sets the number of documents per bulk insert during a full save.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Returns the database name.
    pub fn database_name(&self) -> &str {
        &self.database
    }

    /// Returns the collection name.
    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    /// Returns the underlying document client.
    pub fn client(&self) -> &Arc<dyn DocumentClient> {
        &self.client
    }

    /// Returns the number of documents per bulk insert.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Returns true if this adapter is bound to a transaction.
    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    pub(crate) fn scoped(&self, handle: TransactionHandle) -> Self {
        Self {
            transaction: Some(handle),
            ..self.clone()
        }
    }

    async fn bootstrap(&self) -> StorageResult<()> {
        let client = &self.client;

        if !client.database_exists(&self.database).await? {
            tolerate_conflict(client.create_database(&self.database).await)?;
            tracing::info!(database = %self.database, "Created policy database");
        }

        if !client
            .collection_exists(&self.database, &self.collection)
            .await?
        {
            tolerate_conflict(
                client
                    .create_collection(&self.database, &self.collection)
                    .await,
            )?;
            tracing::info!(
                database = %self.database,
                collection = %self.collection,
                "Created policy collection"
            );
        }

        let fields = RuleField::ALL.map(RuleField::name);
        client
            .ensure_index(CollectionScope::new(&self.database, &self.collection), &fields)
            .await?;

        tracing::debug!(
            backend = %client.kind(),
            database = %self.database,
            collection = %self.collection,
            "Policy adapter ready"
        );
        Ok(())
    }

    fn scope(&self) -> StorageResult<CollectionScope<'_>> {
        let transaction = match &self.transaction {
            Some(handle) if !handle.is_active() => {
                return Err(TransactionError::InvalidTransaction.into());
            }
            Some(handle) => Some(handle.id()),
            None => None,
        };
        Ok(CollectionScope::new(&self.database, &self.collection).in_transaction(transaction))
    }

    /// Runs a removal or update query.
    async fn execute(&self, query: RuleQuery) -> StorageResult<()> {
        let mut cursor = self.client.query(self.scope()?, &query).await?;
        cursor.close().await
    }

    /// Runs a query and loads every returned rule into `model`.
    async fn load_matching(
        &self,
        model: &mut dyn PolicyModel,
        query: &RuleQuery,
    ) -> StorageResult<usize> {
        let cursor = self.client.query(self.scope()?, query).await?;
        drain_into(cursor, model).await
    }
}

/// Loads the documents of `cursor` into `model`, closing the cursor even
/// when a document fails to load.
async fn drain_into(
    mut cursor: Box<dyn QueryCursor>,
    model: &mut dyn PolicyModel,
) -> StorageResult<usize> {
    let mut loaded = 0;
    let outcome = loop {
        let document = match cursor.next_document().await {
            Ok(Some(document)) => document,
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        };
        let rule: CasbinRule = match serde_json::from_value(document) {
            Ok(rule) => rule,
            Err(e) => break Err(e.into()),
        };
        let Some(line) = rule.decode() else {
            continue;
        };
        if let Err(e) = model.load_policy_line(&line) {
            break Err(e);
        }
        loaded += 1;
    };

    let closed = cursor.close().await;
    outcome?;
    closed?;
    Ok(loaded)
}

fn tolerate_conflict(result: StorageResult<()>) -> StorageResult<()> {
    match result {
        // Created concurrently by another process.
        Err(StorageError::Backend(BackendError::Request { status: 409, .. })) => Ok(()),
        other => other,
    }
}

#[async_trait]
impl PolicyAdapter for ArangoAdapter {
    async fn load_policy(&self, model: &mut dyn PolicyModel) -> StorageResult<()> {
        let loaded = self.load_matching(model, &RuleQuery::all()).await?;
        self.filtered.store(false, Ordering::SeqCst);
        tracing::debug!(collection = %self.collection, count = loaded, "Loaded policy");
        Ok(())
    }

    async fn load_filtered_policy(
        &self,
        model: &mut dyn PolicyModel,
        batch: BatchFilter,
    ) -> StorageResult<()> {
        if batch.is_empty() {
            return self.load_policy(model).await;
        }

        let mut loaded = 0;
        for filter in batch.filters() {
            loaded += self.load_matching(model, &RuleQuery::filtered(filter)).await?;
        }
        self.filtered.store(true, Ordering::SeqCst);
        tracing::debug!(
            collection = %self.collection,
            filters = batch.filters().len(),
            count = loaded,
            "Loaded filtered policy"
        );
        Ok(())
    }

    fn is_filtered(&self) -> bool {
        self.filtered.load(Ordering::SeqCst)
    }

    async fn save_policy(&self, model: &dyn PolicyModel) -> StorageResult<()> {
        let scope = self.scope()?;
        self.client.truncate_collection(scope).await?;

        let mut batch = Vec::with_capacity(self.batch_size);
        let mut saved = 0;
        for sec in POLICY_SECTIONS {
            for (ptype, rules) in model.policies(sec) {
                for rule in rules {
                    batch.push(serde_json::to_value(CasbinRule::encode(&ptype, &rule))?);
                    if batch.len() >= self.batch_size {
                        saved += batch.len();
                        self.client
                            .insert_documents(scope, std::mem::take(&mut batch))
                            .await?;
                    }
                }
            }
        }
        if !batch.is_empty() {
            saved += batch.len();
            self.client.insert_documents(scope, batch).await?;
        }

        tracing::info!(
            database = %self.database,
            collection = %self.collection,
            count = saved,
            "Saved policy"
        );
        Ok(())
    }

    async fn clear_policy(&self) -> StorageResult<()> {
        self.client.truncate_collection(self.scope()?).await?;
        tracing::debug!(collection = %self.collection, "Cleared policy");
        Ok(())
    }

    async fn add_policy(&self, _sec: &str, ptype: &str, rule: &[String]) -> StorageResult<()> {
        let document = serde_json::to_value(CasbinRule::encode(ptype, rule))?;
        self.client.insert_document(self.scope()?, document).await?;
        tracing::debug!(ptype = %ptype, "Added policy");
        Ok(())
    }

    async fn add_policies(
        &self,
        _sec: &str,
        ptype: &str,
        rules: &[Vec<String>],
    ) -> StorageResult<()> {
        if rules.is_empty() {
            return Ok(());
        }
        let documents = rules
            .iter()
            .map(|rule| serde_json::to_value(CasbinRule::encode(ptype, rule)))
            .collect::<Result<Vec<_>, _>>()?;
        self.client.insert_documents(self.scope()?, documents).await?;
        tracing::debug!(ptype = %ptype, count = rules.len(), "Added policies");
        Ok(())
    }

    async fn remove_policy(&self, _sec: &str, ptype: &str, rule: &[String]) -> StorageResult<()> {
        self.execute(RuleQuery::remove_exact(&CasbinRule::encode(ptype, rule)))
            .await?;
        tracing::debug!(ptype = %ptype, "Removed policy");
        Ok(())
    }

    async fn remove_policies(
        &self,
        sec: &str,
        ptype: &str,
        rules: &[Vec<String>],
    ) -> StorageResult<()> {
        for rule in rules {
            self.remove_policy(sec, ptype, rule).await?;
        }
        Ok(())
    }

    async fn remove_filtered_policy(
        &self,
        _sec: &str,
        ptype: &str,
        field_index: usize,
        field_values: &[String],
    ) -> StorageResult<()> {
        self.execute(RuleQuery::remove_filtered(ptype, field_index, field_values))
            .await?;
        tracing::debug!(
            ptype = %ptype,
            field_index,
            values = field_values.len(),
            "Removed filtered policy"
        );
        Ok(())
    }

    async fn update_policy(
        &self,
        _sec: &str,
        ptype: &str,
        old_rule: &[String],
        new_rule: &[String],
    ) -> StorageResult<()> {
        let old = CasbinRule::encode(ptype, old_rule);
        let new = CasbinRule::encode(ptype, new_rule);
        self.execute(RuleQuery::update(&old, new)).await?;
        tracing::debug!(ptype = %ptype, "Updated policy");
        Ok(())
    }

    async fn update_policies(
        &self,
        sec: &str,
        ptype: &str,
        old_rules: &[Vec<String>],
        new_rules: &[Vec<String>],
    ) -> StorageResult<()> {
        if old_rules.len() != new_rules.len() {
            return Err(ValidationError::RuleCountMismatch {
                old: old_rules.len(),
                new: new_rules.len(),
            }
            .into());
        }
        for (old_rule, new_rule) in old_rules.iter().zip(new_rules) {
            self.update_policy(sec, ptype, old_rule, new_rule).await?;
        }
        Ok(())
    }

    /// Stores `new_rules` and returns no replaced rules.
    ///
    /// Rules matching the field filter are left in place; callers that need
    /// them removed should call
    /// [`remove_filtered_policy`](PolicyAdapter::remove_filtered_policy)
    /// first.
    async fn update_filtered_policies(
        &self,
        sec: &str,
        ptype: &str,
        new_rules: &[Vec<String>],
        field_index: usize,
        field_values: &[String],
    ) -> StorageResult<Vec<Vec<String>>> {
        self.add_policies(sec, ptype, new_rules).await?;
        tracing::debug!(
            ptype = %ptype,
            field_index,
            values = field_values.len(),
            added = new_rules.len(),
            "Filtered update stored new policies only"
        );
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::MemoryClient;
    use crate::model::MemoryModel;

    fn rule(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    async fn create_adapter() -> (Arc<MemoryClient>, ArangoAdapter) {
        let client = Arc::new(MemoryClient::new());
        let adapter = ArangoAdapter::from_client(client.clone(), "casbin", "casbin_rule")
            .await
            .unwrap();
        (client, adapter)
    }

    #[tokio::test]
    async fn test_bootstrap_creates_storage_and_index() {
        let (client, adapter) = create_adapter().await;
        assert!(client.database_exists("casbin").await.unwrap());
        assert!(client.collection_exists("casbin", "casbin_rule").await.unwrap());
        assert_eq!(
            client.indexes("casbin", "casbin_rule"),
            vec![rule(&["ptype", "v0", "v1", "v2", "v3", "v4", "v5"])]
        );
        assert_eq!(adapter.database_name(), "casbin");
        assert_eq!(adapter.collection_name(), "casbin_rule");
        assert_eq!(adapter.batch_size(), DEFAULT_BATCH_SIZE);
    }

    #[tokio::test]
    async fn test_bootstrap_is_idempotent() {
        let (client, _adapter) = create_adapter().await;
        ArangoAdapter::from_client(client.clone(), "casbin", "casbin_rule")
            .await
            .unwrap();
        assert_eq!(client.indexes("casbin", "casbin_rule").len(), 1);
    }

    #[tokio::test]
    async fn test_load_skips_documents_without_ptype() {
        let (client, adapter) = create_adapter().await;
        client
            .insert_document(
                CollectionScope::new("casbin", "casbin_rule"),
                serde_json::json!({ "v0": "orphan" }),
            )
            .await
            .unwrap();
        adapter
            .add_policy("p", "p", &rule(&["alice", "data1", "read"]))
            .await
            .unwrap();

        let mut model = MemoryModel::new();
        adapter.load_policy(&mut model).await.unwrap();
        assert_eq!(model.lines(), vec![rule(&["p", "alice", "data1", "read"])]);
    }

    #[tokio::test]
    async fn test_load_reports_unknown_sections() {
        let (_client, adapter) = create_adapter().await;
        adapter
            .add_policy("x", "x", &rule(&["alice"]))
            .await
            .unwrap();

        let mut model = MemoryModel::new();
        let err = adapter.load_policy(&mut model).await.unwrap_err();
        assert!(matches!(err, StorageError::Model(_)));
    }

    #[tokio::test]
    async fn test_zero_batch_size_is_clamped() {
        let (_client, adapter) = create_adapter().await;
        assert_eq!(adapter.with_batch_size(0).batch_size(), 1);
    }
}
