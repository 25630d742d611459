//! Loads, edits and saves a small RBAC policy.
//!
//! Connection settings come from `CASBIN_ARANGO_*` environment variables:
//!
//! ```text
//! CASBIN_ARANGO_ENDPOINTS=http://localhost:8529 CASBIN_ARANGO_PASSWORD=secret \
//!     cargo run --example basic
//! ```

use casbin_arangodb_adapter::{
    ArangoAdapter, Config, Filter, MemoryModel, PolicyAdapter, PolicyModel,
};
use tracing::info;

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("basic=info,casbin_arangodb_adapter=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn line(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = Config::from_env()?;
    let adapter = ArangoAdapter::new(config).await?;

    let mut model = MemoryModel::new();
    model.add_policy("p", "p", line(&["alice", "data1", "read"]))?;
    model.add_policy("p", "p", line(&["bob", "data2", "write"]))?;
    model.add_policy("p", "p", line(&["data2_admin", "data2", "read"]))?;
    model.add_policy("p", "p", line(&["data2_admin", "data2", "write"]))?;
    model.add_policy("g", "g", line(&["alice", "data2_admin"]))?;
    adapter.save_policy(&model).await?;

    adapter
        .add_policy("p", "p", &line(&["carol", "data3", "read"]))
        .await?;
    adapter
        .remove_filtered_policy("p", "p", 1, &line(&["data2"]))
        .await?;

    let mut loaded = MemoryModel::new();
    adapter.load_policy(&mut loaded).await?;
    for rule in loaded.lines() {
        info!(rule = %rule.join(", "), "Loaded rule");
    }

    let mut alice = MemoryModel::new();
    adapter
        .load_filtered_policy(&mut alice, Filter::new().value(0, ["alice"]).into())
        .await?;
    info!(
        count = alice.len(),
        filtered = adapter.is_filtered(),
        "Loaded rules for alice"
    );

    Ok(())
}
