//! Shared ArangoDB test harness.
//!
//! Starts a single ArangoDB container per test process. Every test gets its
//! own database so tests can run in parallel against the same server.

use std::time::{Duration, Instant};

use casbin_arangodb_adapter::{ArangoAdapter, Config};
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};
use tokio::sync::OnceCell;
use tokio::time::sleep;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const ARANGO_IMAGE: &str = "arangodb";
const ARANGO_TAG: &str = "3.11";
const ARANGO_ROOT_PASSWORD: &str = "casbin-test";

/// Shared ArangoDB container state.
pub struct ArangoHarness {
    endpoint: String,
    /// Kept alive for the full test process lifetime.
    _container: ContainerAsync<GenericImage>,
}

static SHARED_ARANGO: OnceCell<ArangoHarness> = OnceCell::const_new();

impl ArangoHarness {
    /// Returns the process-global harness, starting the container on first use.
    pub async fn shared() -> &'static ArangoHarness {
        SHARED_ARANGO
            .get_or_init(|| async {
                Self::start()
                    .await
                    .expect("failed to initialize shared ArangoDB harness")
            })
            .await
    }

    async fn start() -> Result<Self, BoxError> {
        let run_id = std::env::var("GITHUB_RUN_ID").unwrap_or_default();

        let container = GenericImage::new(ARANGO_IMAGE, ARANGO_TAG)
            .with_exposed_port(8529.tcp())
            .with_wait_for(WaitFor::seconds(1))
            .with_env_var("ARANGO_ROOT_PASSWORD", ARANGO_ROOT_PASSWORD)
            .with_label("github.run_id", &run_id)
            .with_startup_timeout(Duration::from_secs(180))
            .start()
            .await?;

        let port = container.get_host_port_ipv4(8529).await?;
        let endpoint = format!("http://127.0.0.1:{}", port);

        wait_for_server(&endpoint, Duration::from_secs(90)).await?;

        Ok(Self {
            endpoint,
            _container: container,
        })
    }

    /// Returns a configuration for a database unique to the caller.
    pub fn config(&self) -> Config {
        Config::default()
            .with_endpoints([self.endpoint.clone()])
            .with_authentication("root", ARANGO_ROOT_PASSWORD)
            .with_database(format!("casbin_{}", uuid::Uuid::new_v4().simple()))
    }

    /// Creates an adapter on a fresh database.
    pub async fn create_adapter(&self) -> ArangoAdapter {
        ArangoAdapter::new(self.config())
            .await
            .expect("Failed to create ArangoDB adapter")
    }
}

/// Polls `/_api/version` until the server accepts authenticated requests.
async fn wait_for_server(endpoint: &str, timeout: Duration) -> Result<(), BoxError> {
    let client = reqwest::Client::new();
    let url = format!("{}/_api/version", endpoint);
    let deadline = Instant::now() + timeout;
    loop {
        let ready = client
            .get(&url)
            .basic_auth("root", Some(ARANGO_ROOT_PASSWORD))
            .send()
            .await
            .is_ok_and(|response| response.status().is_success());
        if ready {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(format!("ArangoDB not ready at {} within {:?}", endpoint, timeout).into());
        }
        sleep(Duration::from_millis(500)).await;
    }
}
