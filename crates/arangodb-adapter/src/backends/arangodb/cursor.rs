//! Server-side AQL cursors.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;

use crate::core::{QueryCursor, TransactionId};
use crate::error::{BackendError, StorageError, StorageResult};

use super::client::Connection;

/// A cursor response batch.
#[derive(Debug, Default, Deserialize)]
pub(super) struct CursorResponse {
    #[serde(default)]
    result: Vec<Value>,
    #[serde(rename = "hasMore", default)]
    has_more: bool,
    #[serde(default)]
    id: Option<String>,
}

/// Walks an AQL cursor, fetching further batches from the endpoint that
/// created it.
pub(super) struct ArangoCursor {
    connection: Arc<Connection>,
    endpoint: usize,
    database: String,
    transaction: Option<TransactionId>,
    id: Option<String>,
    buffer: VecDeque<Value>,
    has_more: bool,
}

impl ArangoCursor {
    pub(super) fn new(
        connection: Arc<Connection>,
        endpoint: usize,
        database: String,
        transaction: Option<TransactionId>,
        first_batch: CursorResponse,
    ) -> Self {
        Self {
            connection,
            endpoint,
            database,
            transaction,
            id: first_batch.id,
            buffer: first_batch.result.into(),
            has_more: first_batch.has_more,
        }
    }

    async fn fetch_next_batch(&mut self) -> StorageResult<()> {
        let Some(id) = self.id.clone() else {
            self.has_more = false;
            return Ok(());
        };
        let request = self.connection.database_request(
            Method::PUT,
            self.endpoint,
            &self.database,
            &["_api", "cursor", &id],
            self.transaction.as_ref(),
        );
        let batch: CursorResponse = self.connection.send_json(request).await?;
        self.buffer.extend(batch.result);
        self.has_more = batch.has_more;
        Ok(())
    }
}

#[async_trait]
impl QueryCursor for ArangoCursor {
    async fn next_document(&mut self) -> StorageResult<Option<Value>> {
        loop {
            if let Some(document) = self.buffer.pop_front() {
                return Ok(Some(document));
            }
            if !self.has_more {
                return Ok(None);
            }
            self.fetch_next_batch().await?;
        }
    }

    async fn close(&mut self) -> StorageResult<()> {
        self.buffer.clear();
        if !std::mem::take(&mut self.has_more) {
            return Ok(());
        }
        let Some(id) = self.id.take() else {
            return Ok(());
        };

        let request = self.connection.database_request(
            Method::DELETE,
            self.endpoint,
            &self.database,
            &["_api", "cursor", &id],
            self.transaction.as_ref(),
        );
        match self.connection.send(request).await {
            Ok(_) => Ok(()),
            // Already exhausted or expired on the server.
            Err(StorageError::Backend(BackendError::Request { status: 404, .. })) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
