//! Spreads requests over several coordinators and groups changes in a
//! transaction.
//!
//! ```text
//! cargo run --example cluster -- http://coord1:8529 http://coord2:8529
//! ```

use casbin_arangodb_adapter::{ArangoAdapter, Config, MemoryModel, PolicyAdapter, PolicyModel};
use tracing::{info, warn};

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cluster=info,casbin_arangodb_adapter=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let endpoints: Vec<String> = std::env::args().skip(1).collect();
    let mut config = Config::from_env()?;
    if !endpoints.is_empty() {
        config = config.with_endpoints(endpoints);
    }
    info!(endpoints = ?config.endpoints, "Connecting to cluster");

    let adapter = ArangoAdapter::new(config).await?;
    let mut model = MemoryModel::new();
    adapter.load_policy(&mut model).await?;
    info!(count = model.len(), "Loaded policy");

    // Rename a role atomically: add the new grants, then drop the old ones.
    let outcome = adapter
        .transaction(&mut model, |tx, model| {
            Box::pin(async move {
                let grants = vec![
                    vec!["editor".to_string(), "articles".to_string(), "write".to_string()],
                    vec!["editor".to_string(), "articles".to_string(), "read".to_string()],
                ];
                tx.add_policies("p", "p", &grants).await?;
                for grant in grants {
                    model.add_policy("p", "p", grant)?;
                }
                tx.remove_filtered_policy("p", "p", 0, &["writer".to_string()])
                    .await?;
                Ok(())
            })
        })
        .await;

    match outcome {
        Ok(()) => info!("Role renamed"),
        Err(err) => warn!(error = %err, "Role rename rolled back"),
    }

    let mut explicit = adapter.begin_transaction().await?;
    explicit
        .adapter()
        .add_policy("g", "g", &["alice".to_string(), "editor".to_string()])
        .await?;
    explicit.commit().await?;
    info!(transaction = %explicit.id(), "Assigned editor role");

    Ok(())
}
