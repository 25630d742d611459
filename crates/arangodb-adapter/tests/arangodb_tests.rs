//! Integration tests against a real ArangoDB server.
//!
//! Run with `cargo test --features arangodb-integration` (requires Docker).

#![cfg(feature = "arangodb-integration")]

mod common;

use casbin_arangodb_adapter::error::{BackendError, TransactionError};
use casbin_arangodb_adapter::{
    ArangoAdapter, DocumentClient, Filter, MemoryModel, PolicyAdapter, PolicyModel, StorageError,
};

use common::arangodb::ArangoHarness;
use common::{rbac_model, rule, sorted_lines};

#[tokio::test]
async fn arango_integration_bootstrap_creates_database() {
    let harness = ArangoHarness::shared().await;
    let config = harness.config();
    let database = config.database_name.clone();

    let adapter = ArangoAdapter::new(config).await.unwrap();
    assert_eq!(adapter.database_name(), database);
    assert!(adapter.client().database_exists(&database).await.unwrap());
    assert!(adapter
        .client()
        .collection_exists(&database, adapter.collection_name())
        .await
        .unwrap());
}

#[tokio::test]
async fn arango_integration_save_and_load() {
    let adapter = ArangoHarness::shared().await.create_adapter().await;
    let model = rbac_model();

    adapter.save_policy(&model).await.unwrap();

    let mut loaded = MemoryModel::new();
    adapter.load_policy(&mut loaded).await.unwrap();
    assert_eq!(sorted_lines(&loaded), sorted_lines(&model));
}

#[tokio::test]
async fn arango_integration_save_spans_cursor_batches() {
    let adapter = ArangoHarness::shared()
        .await
        .create_adapter()
        .await
        .with_batch_size(250);

    let mut model = MemoryModel::new();
    for i in 0..2_500 {
        let user = format!("user{i}");
        model
            .add_policy("p", "p", rule(&[user.as_str(), "data", "read"]))
            .unwrap();
    }
    adapter.save_policy(&model).await.unwrap();

    let mut loaded = MemoryModel::new();
    adapter.load_policy(&mut loaded).await.unwrap();
    assert_eq!(loaded.len(), 2_500);
}

#[tokio::test]
async fn arango_integration_incremental_changes() {
    let adapter = ArangoHarness::shared().await.create_adapter().await;
    adapter
        .add_policies(
            "p",
            "p",
            &[
                rule(&["alice", "data1", "read"]),
                rule(&["alice", "data2", "write"]),
                rule(&["bob", "data1", "read"]),
            ],
        )
        .await
        .unwrap();

    adapter
        .update_policy(
            "p",
            "p",
            &rule(&["bob", "data1", "read"]),
            &rule(&["bob", "data1", "write"]),
        )
        .await
        .unwrap();
    adapter
        .remove_filtered_policy("p", "p", 0, &rule(&["alice"]))
        .await
        .unwrap();

    let mut model = MemoryModel::new();
    adapter.load_policy(&mut model).await.unwrap();
    assert_eq!(model.lines(), vec![rule(&["p", "bob", "data1", "write"])]);
}

#[tokio::test]
async fn arango_integration_filtered_load() {
    let adapter = ArangoHarness::shared().await.create_adapter().await;
    adapter.save_policy(&rbac_model()).await.unwrap();

    let mut model = MemoryModel::new();
    adapter
        .load_filtered_policy(
            &mut model,
            Filter::new().ptype(["p"]).value(0, ["data2_admin"]).into(),
        )
        .await
        .unwrap();

    assert_eq!(
        sorted_lines(&model),
        vec![
            rule(&["p", "data2_admin", "data2", "read"]),
            rule(&["p", "data2_admin", "data2", "write"]),
        ]
    );
    assert!(adapter.is_filtered());
}

#[tokio::test]
async fn arango_integration_values_are_not_interpreted() {
    let adapter = ArangoHarness::shared().await.create_adapter().await;
    let hostile = rule(&["\" OR true //", "data1", "read"]);
    adapter.add_policy("p", "p", &hostile).await.unwrap();
    adapter
        .add_policy("p", "p", &rule(&["bob", "data1", "read"]))
        .await
        .unwrap();

    adapter.remove_policy("p", "p", &hostile).await.unwrap();

    let mut model = MemoryModel::new();
    adapter.load_policy(&mut model).await.unwrap();
    assert_eq!(model.lines(), vec![rule(&["p", "bob", "data1", "read"])]);
}

#[tokio::test]
async fn arango_integration_transaction_commit_and_rollback() {
    let adapter = ArangoHarness::shared().await.create_adapter().await;

    let mut committed = adapter.begin_transaction().await.unwrap();
    committed
        .adapter()
        .add_policy("p", "p", &rule(&["alice", "data1", "read"]))
        .await
        .unwrap();
    committed.commit().await.unwrap();

    let mut rolled_back = adapter.begin_transaction().await.unwrap();
    rolled_back
        .adapter()
        .add_policy("p", "p", &rule(&["bob", "data1", "read"]))
        .await
        .unwrap();
    rolled_back.rollback().await.unwrap();

    let mut model = MemoryModel::new();
    adapter.load_policy(&mut model).await.unwrap();
    assert_eq!(model.lines(), vec![rule(&["p", "alice", "data1", "read"])]);

    let err = rolled_back.commit().await.unwrap_err();
    assert!(matches!(
        err,
        StorageError::Transaction(TransactionError::AlreadyFinished)
    ));
}

#[tokio::test]
async fn arango_integration_closure_transaction_reloads_on_failure() {
    let adapter = ArangoHarness::shared().await.create_adapter().await;
    adapter.save_policy(&rbac_model()).await.unwrap();
    let mut model = MemoryModel::new();
    adapter.load_policy(&mut model).await.unwrap();

    let result = adapter
        .transaction(&mut model, |tx, model| {
            Box::pin(async move {
                tx.clear_policy().await?;
                model.clear_policy();
                Err::<(), _>(StorageError::Transaction(TransactionError::InvalidTransaction))
            })
        })
        .await;

    assert!(result.is_err());
    assert_eq!(sorted_lines(&model), sorted_lines(&rbac_model()));
}

#[tokio::test]
async fn arango_integration_wrong_password_is_reported() {
    let harness = ArangoHarness::shared().await;
    let config = harness.config().with_authentication("root", "wrong");

    let err = ArangoAdapter::new(config).await.unwrap_err();
    assert!(matches!(
        err,
        StorageError::Backend(BackendError::Request { status: 401, .. })
    ));
}
