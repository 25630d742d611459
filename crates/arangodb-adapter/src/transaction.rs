//! Streaming transactions over the rule collection.
//!
//! Two styles are supported:
//!
//! - [`ArangoAdapter::begin_transaction`] hands out an
//!   [`ArangoTransactionContext`] whose [`adapter`](ArangoTransactionContext::adapter)
//!   routes every write through the transaction until the caller commits or
//!   rolls back.
//! - [`ArangoAdapter::transaction`] runs a closure inside a transaction,
//!   committing on success and rolling back and reloading the model on
//!   failure.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use casbin_arangodb_adapter::backends::memory::MemoryClient;
//! use casbin_arangodb_adapter::{ArangoAdapter, MemoryModel, PolicyAdapter, PolicyModel};
//!
//! # tokio_test_block(async {
//! let client = Arc::new(MemoryClient::new());
//! let adapter = ArangoAdapter::from_client(client, "casbin", "casbin_rule")
//!     .await
//!     .unwrap();
//! let mut model = MemoryModel::new();
//!
//! adapter
//!     .transaction(&mut model, |tx, model| {
//!         Box::pin(async move {
//!             let rule = vec!["alice".to_string(), "data1".to_string(), "read".to_string()];
//!             tx.add_policy("p", "p", &rule).await?;
//!             model.add_policy("p", "p", rule)?;
//!             Ok(())
//!         })
//!     })
//!     .await
//!     .unwrap();
//!
//! assert_eq!(model.len(), 1);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::adapter::ArangoAdapter;
use crate::core::{PolicyAdapter, TransactionId};
use crate::error::{StorageResult, TransactionError};
use crate::model::PolicyModel;

/// Lifecycle of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Open; operations through the scoped adapter join it.
    Active,
    /// Committed.
    Committed,
    /// Rolled back.
    RolledBack,
}

/// Transaction id and state shared by a context and its scoped adapters.
#[derive(Debug, Clone)]
pub(crate) struct TransactionHandle {
    id: TransactionId,
    state: Arc<Mutex<TransactionState>>,
}

impl TransactionHandle {
    fn new(id: TransactionId) -> Self {
        Self {
            id,
            state: Arc::new(Mutex::new(TransactionState::Active)),
        }
    }

    pub(crate) fn id(&self) -> &TransactionId {
        &self.id
    }

    pub(crate) fn is_active(&self) -> bool {
        *self.state.lock() == TransactionState::Active
    }
}

/// An open streaming transaction.
///
/// Writes made through [`adapter`](Self::adapter) become visible to others
/// only after [`commit`](Self::commit). Once the transaction is finished the
/// scoped adapter rejects further operations.
#[derive(Debug)]
pub struct ArangoTransactionContext {
    adapter: ArangoAdapter,
    handle: TransactionHandle,
}

impl ArangoTransactionContext {
    /// Returns the adapter whose operations run inside this transaction.
    pub fn adapter(&self) -> &ArangoAdapter {
        &self.adapter
    }

    /// Returns the store-issued transaction id.
    pub fn id(&self) -> &TransactionId {
        self.handle.id()
    }

    /// Returns the current state.
    pub fn state(&self) -> TransactionState {
        *self.handle.state.lock()
    }

    /// Returns true until the transaction is committed or rolled back.
    pub fn is_active(&self) -> bool {
        self.handle.is_active()
    }

    /// Commits the transaction.
    ///
    /// Fails with [`TransactionError::AlreadyFinished`] if the transaction
    /// was already committed or rolled back. A failed commit leaves the
    /// transaction active so it can still be rolled back.
    pub async fn commit(&mut self) -> StorageResult<()> {
        self.ensure_active()?;
        self.adapter
            .client()
            .commit_transaction(self.adapter.database_name(), self.handle.id())
            .await?;
        *self.handle.state.lock() = TransactionState::Committed;
        tracing::debug!(transaction = %self.handle.id(), "Committed transaction");
        Ok(())
    }

    /// Rolls the transaction back.
    ///
    /// Fails with [`TransactionError::AlreadyFinished`] if the transaction
    /// was already committed or rolled back.
    pub async fn rollback(&mut self) -> StorageResult<()> {
        self.ensure_active()?;
        self.adapter
            .client()
            .abort_transaction(self.adapter.database_name(), self.handle.id())
            .await?;
        *self.handle.state.lock() = TransactionState::RolledBack;
        tracing::debug!(transaction = %self.handle.id(), "Rolled back transaction");
        Ok(())
    }

    fn ensure_active(&self) -> StorageResult<()> {
        if self.handle.is_active() {
            Ok(())
        } else {
            Err(TransactionError::AlreadyFinished.into())
        }
    }
}

impl Drop for ArangoTransactionContext {
    fn drop(&mut self) {
        if self.handle.is_active() {
            tracing::warn!(
                transaction = %self.handle.id(),
                "Transaction dropped without commit or rollback; the server aborts it when it expires"
            );
            self.adapter.client().release_transaction(self.handle.id());
        }
    }
}

impl ArangoAdapter {
    /// Begins a streaming transaction with write access to the rule
    /// collection.
    pub async fn begin_transaction(&self) -> StorageResult<ArangoTransactionContext> {
        if self.transaction.is_some() {
            return Err(TransactionError::NestedNotSupported.into());
        }

        let id = self
            .client()
            .begin_transaction(self.database_name(), &[self.collection_name().to_string()])
            .await?;
        tracing::debug!(
            transaction = %id,
            collection = %self.collection_name(),
            "Began transaction"
        );

        let handle = TransactionHandle::new(id);
        Ok(ArangoTransactionContext {
            adapter: self.scoped(handle.clone()),
            handle,
        })
    }

    /// Runs `f` inside a transaction.
    ///
    /// `f` receives a transaction-scoped adapter and the model. If `f`
    /// succeeds the transaction is committed. If it fails the transaction is
    /// rolled back, the model is cleared and reloaded from storage so that
    /// in-memory changes made by `f` are discarded, and `f`'s error is
    /// returned.
    ///
    /// Transactions started through clones of the same adapter run one at
    /// a time.
    pub async fn transaction<F, T>(&self, model: &mut dyn PolicyModel, f: F) -> StorageResult<T>
    where
        F: for<'m> FnOnce(ArangoAdapter, &'m mut dyn PolicyModel) -> BoxFuture<'m, StorageResult<T>>
            + Send,
        T: Send,
    {
        if self.transaction.is_some() {
            return Err(TransactionError::NestedNotSupported.into());
        }

        let _guard = self.transaction_lock.lock().await;
        let mut context = self.begin_transaction().await?;

        let outcome = f(context.adapter().clone(), &mut *model).await;
        match outcome {
            Ok(value) => {
                context.commit().await?;
                Ok(value)
            }
            Err(err) => {
                tracing::warn!(
                    transaction = %context.id(),
                    error = %err,
                    "Transaction function failed; rolling back"
                );
                context.rollback().await?;
                model.clear_policy();
                self.load_policy(model).await?;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::MemoryClient;

    async fn create_adapter() -> (Arc<MemoryClient>, ArangoAdapter) {
        let client = Arc::new(MemoryClient::new());
        let adapter = ArangoAdapter::from_client(client.clone(), "casbin", "casbin_rule")
            .await
            .unwrap();
        (client, adapter)
    }

    #[tokio::test]
    async fn test_context_state_transitions() {
        let (client, adapter) = create_adapter().await;
        let mut context = adapter.begin_transaction().await.unwrap();
        assert!(context.is_active());
        assert!(context.adapter().in_transaction());
        assert_eq!(client.active_transactions(), 1);

        context.commit().await.unwrap();
        assert_eq!(context.state(), TransactionState::Committed);
        assert_eq!(client.active_transactions(), 0);
    }

    #[tokio::test]
    async fn test_scoped_adapter_rejects_nested_transactions() {
        let (_client, adapter) = create_adapter().await;
        let mut context = adapter.begin_transaction().await.unwrap();

        let err = context.adapter().begin_transaction().await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::StorageError::Transaction(TransactionError::NestedNotSupported)
        ));

        context.rollback().await.unwrap();
    }
}
