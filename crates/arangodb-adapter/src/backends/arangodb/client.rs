//! HTTP client for ArangoDB.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use url::Url;

use crate::config::{Config, TlsConfig, TlsVersion};
use crate::core::{BackendKind, CollectionScope, DocumentClient, QueryCursor, TransactionId};
use crate::error::{BackendError, ConfigError, StorageError, StorageResult, TransactionError};
use crate::query::RuleQuery;

use super::cursor::{ArangoCursor, CursorResponse};

const BACKEND_NAME: &str = "arangodb";

const TRANSACTION_HEADER: &str = "x-arango-trx-id";

/// Documents fetched per cursor round trip.
const CURSOR_BATCH_SIZE: usize = 1000;

const ERROR_DATA_SOURCE_NOT_FOUND: i64 = 1203;
const ERROR_DATABASE_NOT_FOUND: i64 = 1228;
const ERROR_TRANSACTION_NOT_FOUND: i64 = 1655;

/// Error body returned by ArangoDB for failed requests.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(rename = "errorNum", default)]
    error_num: Option<i64>,
    #[serde(rename = "errorMessage", default)]
    error_message: String,
}

#[derive(Debug, Deserialize)]
struct TransactionResponse {
    result: TransactionStatus,
}

#[derive(Debug, Deserialize)]
struct TransactionStatus {
    id: String,
}

/// Endpoint list, credentials and HTTP client shared by a client and its
/// cursors.
pub(super) struct Connection {
    http: reqwest::Client,
    endpoints: Vec<Url>,
    next_endpoint: AtomicUsize,
    username: String,
    password: String,
    request_timeout_ms: u64,
    transaction_endpoints: Mutex<HashMap<TransactionId, usize>>,
}

impl Connection {
    /// Picks the next endpoint round-robin.
    pub(super) fn rotate(&self) -> usize {
        self.next_endpoint.fetch_add(1, Ordering::Relaxed) % self.endpoints.len()
    }

    /// Returns the endpoint a request should use, pinning transaction
    /// requests to the endpoint that began the transaction.
    pub(super) fn endpoint_for(&self, transaction: Option<&TransactionId>) -> usize {
        transaction
            .and_then(|id| self.transaction_endpoints.lock().get(id).copied())
            .unwrap_or_else(|| self.rotate())
    }

    fn url(&self, endpoint: usize, segments: &[&str]) -> Url {
        let mut url = self.endpoints[endpoint % self.endpoints.len()].clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Builds an authenticated request against `/_db/{database}/...`.
    pub(super) fn database_request(
        &self,
        method: Method,
        endpoint: usize,
        database: &str,
        segments: &[&str],
        transaction: Option<&TransactionId>,
    ) -> RequestBuilder {
        let mut path = vec!["_db", database];
        path.extend_from_slice(segments);
        let url = self.url(endpoint, &path);
        self.request(method, url, transaction)
    }

    fn request(
        &self,
        method: Method,
        url: Url,
        transaction: Option<&TransactionId>,
    ) -> RequestBuilder {
        tracing::trace!(method = method.as_str(), url = url.as_str(), "ArangoDB request");
        let mut builder = self
            .http
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password));
        if let Some(id) = transaction {
            builder = builder.header(TRANSACTION_HEADER, id.as_str());
        }
        builder
    }

    /// Sends a request and turns error statuses into [`StorageError`]s.
    pub(super) async fn send(&self, request: RequestBuilder) -> StorageResult<Response> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let error: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
        let message = if error.error_message.is_empty() {
            status.canonical_reason().unwrap_or("request failed").to_string()
        } else {
            error.error_message
        };
        Err(StorageError::Backend(BackendError::Request {
            backend_name: BACKEND_NAME.to_string(),
            status: status.as_u16(),
            error_num: error.error_num,
            message,
        }))
    }

    /// Sends a request and decodes the JSON response body.
    pub(super) async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> StorageResult<T> {
        let response = self.send(request).await?;
        response.json().await.map_err(|e| self.transport_error(e))
    }

    fn transport_error(&self, err: reqwest::Error) -> StorageError {
        if err.is_timeout() {
            return StorageError::Backend(BackendError::Timeout {
                backend_name: BACKEND_NAME.to_string(),
                timeout_ms: self.request_timeout_ms,
            });
        }
        err.into()
    }
}

/// A [`DocumentClient`] talking to ArangoDB over HTTP.
#[derive(Clone)]
pub struct ArangoClient {
    connection: Arc<Connection>,
}

impl Debug for ArangoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let endpoints: Vec<&str> = self
            .connection
            .endpoints
            .iter()
            .map(Url::as_str)
            .collect();
        f.debug_struct("ArangoClient")
            .field("endpoints", &endpoints)
            .field("username", &self.connection.username)
            .finish_non_exhaustive()
    }
}

impl ArangoClient {
    /// Creates a client from the connection settings in `config`.
    ///
    /// No request is made; connectivity problems surface on first use.
    pub fn new(config: &Config) -> StorageResult<Self> {
        config.validate()?;

        let endpoints = config
            .endpoints
            .iter()
            .map(|endpoint| {
                Url::parse(endpoint).map_err(|e| ConfigError::InvalidEndpoint {
                    endpoint: endpoint.clone(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let http = Self::build_http_client(config)?;

        tracing::debug!(
            endpoints = endpoints.len(),
            tls = config.tls.is_enabled(),
            "Created ArangoDB HTTP client"
        );

        Ok(Self {
            connection: Arc::new(Connection {
                http,
                endpoints,
                next_endpoint: AtomicUsize::new(0),
                username: config.username.clone(),
                password: config.password.clone(),
                request_timeout_ms: config.request_timeout_ms,
                transaction_endpoints: Mutex::new(HashMap::new()),
            }),
        })
    }

    fn build_http_client(config: &Config) -> StorageResult<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if config.request_timeout_ms > 0 {
            builder = builder.timeout(Duration::from_millis(config.request_timeout_ms));
        }

        if config.tls.is_enabled() {
            for pem in config.tls.root_certificates()? {
                let certificate =
                    reqwest::Certificate::from_pem(&pem).map_err(|e| tls_error(&config.tls, e))?;
                builder = builder.add_root_certificate(certificate);
            }
        }

        builder = match &config.tls {
            TlsConfig::Disabled => builder,
            TlsConfig::System | TlsConfig::CaCertificate { .. } => {
                builder.min_tls_version(reqwest::tls::Version::TLS_1_2)
            }
            TlsConfig::Custom(settings) => {
                if let (Some(cert), Some(key)) =
                    (&settings.client_certificate_pem, &settings.client_key_pem)
                {
                    let identity =
                        reqwest::Identity::from_pkcs8_pem(cert.as_bytes(), key.as_bytes())
                            .map_err(|e| tls_error(&config.tls, e))?;
                    builder = builder.identity(identity);
                }
                let min_version = match settings.min_version {
                    TlsVersion::Tls12 => reqwest::tls::Version::TLS_1_2,
                    TlsVersion::Tls13 => reqwest::tls::Version::TLS_1_3,
                };
                builder
                    .danger_accept_invalid_certs(settings.accept_invalid_certificates)
                    .min_tls_version(min_version)
            }
        };

        builder.build().map_err(|e| {
            StorageError::Backend(BackendError::Internal {
                backend_name: BACKEND_NAME.to_string(),
                message: format!("failed to create HTTP client: {}", e),
                source: Some(Box::new(e)),
            })
        })
    }

    fn endpoint(&self) -> usize {
        self.connection.rotate()
    }
}

fn tls_error(tls: &TlsConfig, err: reqwest::Error) -> StorageError {
    let path = match tls {
        TlsConfig::CaCertificate { path } => path.display().to_string(),
        _ => "inline TLS settings".to_string(),
    };
    ConfigError::TlsMaterial {
        path,
        message: err.to_string(),
    }
    .into()
}

fn has_error_num(err: &StorageError, expected: i64) -> bool {
    matches!(
        err,
        StorageError::Backend(BackendError::Request {
            error_num: Some(num),
            ..
        }) if *num == expected
    )
}

fn is_not_found(err: &StorageError) -> bool {
    matches!(
        err,
        StorageError::Backend(BackendError::Request { status: 404, .. })
    )
}

/// Returns the first per-document error of a bulk insert response.
fn first_document_error(results: &[Value]) -> Option<StorageError> {
    results
        .iter()
        .find(|result| result.get("error").and_then(Value::as_bool) == Some(true))
        .map(|result| {
            StorageError::Backend(BackendError::Request {
                backend_name: BACKEND_NAME.to_string(),
                status: result
                    .get("code")
                    .and_then(Value::as_u64)
                    .and_then(|code| u16::try_from(code).ok())
                    .unwrap_or(StatusCode::BAD_REQUEST.as_u16()),
                error_num: result.get("errorNum").and_then(Value::as_i64),
                message: result
                    .get("errorMessage")
                    .and_then(Value::as_str)
                    .unwrap_or("document insert failed")
                    .to_string(),
            })
        })
}

#[async_trait]
impl DocumentClient for ArangoClient {
    fn kind(&self) -> BackendKind {
        BackendKind::ArangoDB
    }

    async fn database_exists(&self, name: &str) -> StorageResult<bool> {
        let request = self.connection.database_request(
            Method::GET,
            self.endpoint(),
            name,
            &["_api", "database", "current"],
            None,
        );
        match self.connection.send(request).await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_database(&self, name: &str) -> StorageResult<()> {
        let url = self
            .connection
            .url(self.endpoint(), &["_api", "database"]);
        let request = self
            .connection
            .request(Method::POST, url, None)
            .json(&json!({ "name": name }));
        self.connection.send(request).await?;
        tracing::info!(database = %name, "Created ArangoDB database");
        Ok(())
    }

    async fn collection_exists(&self, database: &str, name: &str) -> StorageResult<bool> {
        let request = self.connection.database_request(
            Method::GET,
            self.endpoint(),
            database,
            &["_api", "collection", name],
            None,
        );
        match self.connection.send(request).await {
            Ok(_) => Ok(true),
            Err(e) if has_error_num(&e, ERROR_DATABASE_NOT_FOUND) => {
                Err(StorageError::Backend(BackendError::DatabaseNotFound {
                    name: database.to_string(),
                }))
            }
            Err(e) if has_error_num(&e, ERROR_DATA_SOURCE_NOT_FOUND) || is_not_found(&e) => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn create_collection(&self, database: &str, name: &str) -> StorageResult<()> {
        let request = self
            .connection
            .database_request(
                Method::POST,
                self.endpoint(),
                database,
                &["_api", "collection"],
                None,
            )
            .json(&json!({ "name": name, "type": 2 }));
        self.connection.send(request).await?;
        tracing::info!(database = %database, collection = %name, "Created ArangoDB collection");
        Ok(())
    }

    async fn ensure_index(&self, scope: CollectionScope<'_>, fields: &[&str]) -> StorageResult<()> {
        // Index creation is not part of streaming transactions.
        let request = self
            .connection
            .database_request(
                Method::POST,
                self.endpoint(),
                scope.database,
                &["_api", "index"],
                None,
            )
            .query(&[("collection", scope.collection)])
            .json(&json!({
                "type": "persistent",
                "fields": fields,
                "unique": false,
                "sparse": false,
            }));
        self.connection.send(request).await?;
        Ok(())
    }

    async fn truncate_collection(&self, scope: CollectionScope<'_>) -> StorageResult<()> {
        let request = self.connection.database_request(
            Method::PUT,
            self.connection.endpoint_for(scope.transaction),
            scope.database,
            &["_api", "collection", scope.collection, "truncate"],
            scope.transaction,
        );
        self.connection.send(request).await?;
        Ok(())
    }

    async fn insert_document(
        &self,
        scope: CollectionScope<'_>,
        document: Value,
    ) -> StorageResult<()> {
        let request = self
            .connection
            .database_request(
                Method::POST,
                self.connection.endpoint_for(scope.transaction),
                scope.database,
                &["_api", "document", scope.collection],
                scope.transaction,
            )
            .json(&document);
        self.connection.send(request).await?;
        Ok(())
    }

    async fn insert_documents(
        &self,
        scope: CollectionScope<'_>,
        documents: Vec<Value>,
    ) -> StorageResult<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let request = self
            .connection
            .database_request(
                Method::POST,
                self.connection.endpoint_for(scope.transaction),
                scope.database,
                &["_api", "document", scope.collection],
                scope.transaction,
            )
            .json(&documents);
        let results: Vec<Value> = self.connection.send_json(request).await?;
        match first_document_error(&results) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn query(
        &self,
        scope: CollectionScope<'_>,
        query: &RuleQuery,
    ) -> StorageResult<Box<dyn QueryCursor>> {
        let aql = query.to_aql(scope.collection);
        tracing::debug!(query = %aql.query, "Executing AQL");

        let endpoint = self.connection.endpoint_for(scope.transaction);
        let request = self
            .connection
            .database_request(
                Method::POST,
                endpoint,
                scope.database,
                &["_api", "cursor"],
                scope.transaction,
            )
            .json(&json!({
                "query": aql.query,
                "bindVars": aql.bind_vars,
                "batchSize": CURSOR_BATCH_SIZE,
            }));
        let response: CursorResponse = self.connection.send_json(request).await?;

        Ok(Box::new(ArangoCursor::new(
            self.connection.clone(),
            endpoint,
            scope.database.to_string(),
            scope.transaction.cloned(),
            response,
        )))
    }

    async fn begin_transaction(
        &self,
        database: &str,
        write_collections: &[String],
    ) -> StorageResult<TransactionId> {
        let endpoint = self.endpoint();
        let request = self
            .connection
            .database_request(
                Method::POST,
                endpoint,
                database,
                &["_api", "transaction", "begin"],
                None,
            )
            .json(&json!({ "collections": { "write": write_collections } }));
        let response: TransactionResponse = self.connection.send_json(request).await?;

        let id = TransactionId::new(response.result.id);
        self.connection
            .transaction_endpoints
            .lock()
            .insert(id.clone(), endpoint);
        Ok(id)
    }

    async fn commit_transaction(&self, database: &str, id: &TransactionId) -> StorageResult<()> {
        self.finish_transaction(Method::PUT, database, id).await
    }

    async fn abort_transaction(&self, database: &str, id: &TransactionId) -> StorageResult<()> {
        self.finish_transaction(Method::DELETE, database, id).await
    }

    fn release_transaction(&self, id: &TransactionId) {
        self.connection.transaction_endpoints.lock().remove(id);
    }
}

impl ArangoClient {
    async fn finish_transaction(
        &self,
        method: Method,
        database: &str,
        id: &TransactionId,
    ) -> StorageResult<()> {
        let request = self.connection.database_request(
            method,
            self.connection.endpoint_for(Some(id)),
            database,
            &["_api", "transaction", id.as_str()],
            None,
        );
        let result = self.connection.send(request).await;
        self.connection.transaction_endpoints.lock().remove(id);

        match result {
            Ok(_) => Ok(()),
            Err(e) if has_error_num(&e, ERROR_TRANSACTION_NOT_FOUND) => Err(
                StorageError::Transaction(TransactionError::NotFound { id: id.to_string() }),
            ),
            Err(e) => Err(e),
        }
    }
}
