//! Shared fixtures for adapter integration tests.

#![allow(dead_code)]

#[cfg(feature = "arangodb-integration")]
pub mod arangodb;

use std::sync::Arc;

use casbin_arangodb_adapter::backends::memory::MemoryClient;
use casbin_arangodb_adapter::{ArangoAdapter, CasbinRule, MemoryModel, PolicyModel};

pub const DATABASE: &str = "casbin";
pub const COLLECTION: &str = "casbin_rule";

/// Builds a rule from string slices.
pub fn rule(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Creates an adapter over a fresh in-memory store.
pub async fn create_adapter() -> (Arc<MemoryClient>, ArangoAdapter) {
    let client = Arc::new(MemoryClient::new());
    let adapter = ArangoAdapter::from_client(client.clone(), DATABASE, COLLECTION)
        .await
        .expect("Failed to create adapter");
    (client, adapter)
}

/// Returns every stored rule as a sorted list of full lines.
pub fn stored_lines(client: &MemoryClient) -> Vec<Vec<String>> {
    let mut lines: Vec<Vec<String>> = client
        .documents(DATABASE, COLLECTION)
        .iter()
        .filter_map(CasbinRule::decode)
        .collect();
    lines.sort();
    lines
}

/// Returns the model's rules as a sorted list of full lines.
pub fn sorted_lines(model: &MemoryModel) -> Vec<Vec<String>> {
    let mut lines = model.lines();
    lines.sort();
    lines
}

/// The RBAC policy used across tests:
///
/// ```text
/// p, alice, data1, read
/// p, bob, data2, write
/// p, data2_admin, data2, read
/// p, data2_admin, data2, write
/// g, alice, data2_admin
/// ```
pub fn rbac_model() -> MemoryModel {
    let mut model = MemoryModel::new();
    for values in [
        ["alice", "data1", "read"],
        ["bob", "data2", "write"],
        ["data2_admin", "data2", "read"],
        ["data2_admin", "data2", "write"],
    ] {
        model
            .add_policy("p", "p", rule(&values))
            .expect("Failed to add policy");
    }
    model
        .add_policy("g", "g", rule(&["alice", "data2_admin"]))
        .expect("Failed to add grouping policy");
    model
}
