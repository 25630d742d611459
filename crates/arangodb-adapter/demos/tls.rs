//! Connects over TLS with a custom CA and an optional client certificate.
//!
//! ```text
//! CASBIN_ARANGO_ENDPOINTS=https://arango.internal:8529 \
//!     cargo run --example tls -- ca.pem [client.pem client.key]
//! ```

use std::fs;

use anyhow::Context;
use casbin_arangodb_adapter::{
    ArangoAdapter, Config, MemoryModel, PolicyAdapter, TlsSettings, TlsVersion,
};
use tracing::info;

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tls=info,casbin_arangodb_adapter=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn read_pem(path: &str) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {path}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(ca_path) = args.first() else {
        anyhow::bail!("usage: tls <ca.pem> [client.pem client.key]");
    };

    let mut settings = TlsSettings {
        root_certificates_pem: vec![read_pem(ca_path)?],
        min_version: TlsVersion::Tls12,
        ..Default::default()
    };
    if let [_, cert, key] = args.as_slice() {
        settings.client_certificate_pem = Some(read_pem(cert)?);
        settings.client_key_pem = Some(read_pem(key)?);
    }

    let config = Config::from_env()?.with_tls_settings(settings);
    let adapter = ArangoAdapter::new(config).await?;

    let mut model = MemoryModel::new();
    adapter.load_policy(&mut model).await?;
    info!(count = model.len(), "Loaded policy over TLS");

    Ok(())
}
