//! Cosmos DB storage context.
//!
//! One container per entity type; the entity's partition key maps to the
//! container's physical partition key. Point writes go 1:1 to the REST
//! document endpoints; queries are parameterized SQL scoped by the
//! partition-key header, with cross-partition fan-out only when a query
//! carries no partition. Paged queries forward the server's native
//! continuation token verbatim in both directions.
//!
//! All HTTP failures are translated into the `StorageError` taxonomy at
//! this boundary and never retried here; retry policy belongs to the
//! caller.

pub mod auth;
pub mod types;

use std::marker::PhantomData;

use reqwest::Method;
use secrecy::SecretString;
use tracing::warn;

use parley_core::storage::context::{StorageContext, ensure_entity_id};
use parley_core::storage::query::{ContinuationToken, Filter, OrderBy, Page, QuerySpec};
use parley_types::config::CosmosStoreConfig;
use parley_types::entity::StorageEntity;
use parley_types::error::StorageError;

use types::{DocumentPage, build_sql};

const API_VERSION: &str = "2018-12-31";
const HEADER_PARTITION_KEY: &str = "x-ms-documentdb-partitionkey";
const HEADER_IS_UPSERT: &str = "x-ms-documentdb-is-upsert";
const HEADER_IS_QUERY: &str = "x-ms-documentdb-isquery";
const HEADER_CROSS_PARTITION: &str = "x-ms-documentdb-query-enablecrosspartition";
const HEADER_MAX_ITEM_COUNT: &str = "x-ms-max-item-count";
const HEADER_CONTINUATION: &str = "x-ms-continuation";
const QUERY_CONTENT_TYPE: &str = "application/query+json";

/// Batch size used when draining an unpaged query or count.
const DRAIN_BATCH_SIZE: usize = 100;

/// A storage context backed by one Cosmos DB container.
///
/// The `reqwest::Client` is constructed by the caller and shared across
/// contexts; dropping the last handle tears the connection pool down
/// deterministically.
pub struct CosmosContext<E> {
    http: reqwest::Client,
    endpoint: String,
    key: SecretString,
    database: String,
    container: String,
    _entity: PhantomData<fn() -> E>,
}

impl<E: StorageEntity> CosmosContext<E> {
    pub fn new(
        http: reqwest::Client,
        config: &CosmosStoreConfig,
        container: impl Into<String>,
    ) -> Self {
        Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            key: config.key.clone(),
            database: config.database.clone(),
            container: container.into(),
            _entity: PhantomData,
        }
    }

    /// Resource link of this context's collection.
    fn collection_link(&self) -> String {
        format!("dbs/{}/colls/{}", self.database, self.container)
    }

    /// Resource link of one document.
    fn document_link(&self, id: &str) -> String {
        format!("{}/docs/{}", self.collection_link(), id)
    }

    /// A signed request builder. `resource_link` is what gets signed,
    /// `path` is the URL path (they differ for collection-level POSTs).
    fn request(
        &self,
        method: Method,
        resource_link: &str,
        path: &str,
    ) -> Result<reqwest::RequestBuilder, StorageError> {
        let date = auth::signing_date();
        let token =
            auth::master_key_token(&self.key, method.as_str(), "docs", resource_link, &date)?;
        Ok(self
            .http
            .request(method, format!("{}/{path}", self.endpoint))
            .header("authorization", token)
            .header("x-ms-date", date)
            .header("x-ms-version", API_VERSION))
    }

    async fn error_for_response(&self, response: reqwest::Response) -> StorageError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let err = classify_status(status, body);
        if !matches!(err, StorageError::NotFound) {
            warn!(container = %self.container, status, "cosmos request failed");
        }
        err
    }

    /// Issue one server round trip of a query: at most `max_items`
    /// results plus the server's continuation token, if any.
    async fn run_query_page(
        &self,
        filter: &Filter,
        order_by: Option<&OrderBy>,
        partition: Option<&str>,
        max_items: usize,
        continuation: Option<&ContinuationToken>,
    ) -> Result<Page<E>, StorageError> {
        self.run_projected_query("SELECT * FROM c", filter, order_by, partition, max_items, continuation)
            .await
    }

    async fn run_projected_query<T: serde::de::DeserializeOwned>(
        &self,
        projection: &str,
        filter: &Filter,
        order_by: Option<&OrderBy>,
        partition: Option<&str>,
        max_items: usize,
        continuation: Option<&ContinuationToken>,
    ) -> Result<Page<T>, StorageError> {
        let sql = build_sql(projection, filter, order_by)?;
        let body = serde_json::to_vec(&sql)
            .map_err(|e| StorageError::Backend(format!("failed to encode query: {e}")))?;

        let link = self.collection_link();
        let mut request = self
            .request(Method::POST, &link, &format!("{link}/docs"))?
            .header(HEADER_IS_QUERY, "true")
            .header(reqwest::header::CONTENT_TYPE, QUERY_CONTENT_TYPE)
            .header(HEADER_MAX_ITEM_COUNT, max_items.to_string())
            .body(body);

        request = match partition {
            Some(partition) => request.header(HEADER_PARTITION_KEY, partition_key_header(partition)?),
            // Cross-partition fan-out is strictly slower; only unscoped
            // (administrative) queries opt in.
            None => request.header(HEADER_CROSS_PARTITION, "true"),
        };
        if let Some(token) = continuation {
            request = request.header(HEADER_CONTINUATION, token.as_str());
        }

        let response = request.send().await.map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(self.error_for_response(response).await);
        }

        let next = response
            .headers()
            .get(HEADER_CONTINUATION)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(ContinuationToken::new);
        let page: DocumentPage<T> = response
            .json()
            .await
            .map_err(|e| StorageError::Backend(format!("failed to parse query response: {e}")))?;

        Ok(Page { items: page.documents, continuation: next })
    }
}

/// Map an HTTP status onto the storage error taxonomy.
fn classify_status(status: u16, body: String) -> StorageError {
    match status {
        404 => StorageError::NotFound,
        409 => StorageError::AlreadyExists,
        408 | 429 | 449 => StorageError::Transient(format!("HTTP {status}: {body}")),
        status if status >= 500 => StorageError::Transient(format!("HTTP {status}: {body}")),
        status => StorageError::Backend(format!("HTTP {status}: {body}")),
    }
}

fn transport_error(err: reqwest::Error) -> StorageError {
    StorageError::Transient(format!("cosmos request failed: {err}"))
}

/// The partition-key header is a JSON array holding the key value.
fn partition_key_header(partition: &str) -> Result<String, StorageError> {
    serde_json::to_string(&[partition])
        .map_err(|e| StorageError::Backend(format!("failed to encode partition key: {e}")))
}

impl<E: StorageEntity> StorageContext<E> for CosmosContext<E> {
    async fn create(&self, entity: &E) -> Result<(), StorageError> {
        ensure_entity_id(entity.id())?;
        let link = self.collection_link();
        let response = self
            .request(Method::POST, &link, &format!("{link}/docs"))?
            .header(HEADER_PARTITION_KEY, partition_key_header(entity.partition())?)
            .json(entity)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(self.error_for_response(response).await)
        }
    }

    async fn read(&self, id: &str, partition: &str) -> Result<E, StorageError> {
        ensure_entity_id(id)?;
        let link = self.document_link(id);
        let response = self
            .request(Method::GET, &link, &link)?
            .header(HEADER_PARTITION_KEY, partition_key_header(partition)?)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(self.error_for_response(response).await);
        }
        response
            .json()
            .await
            .map_err(|e| StorageError::Backend(format!("failed to parse document: {e}")))
    }

    async fn upsert(&self, entity: &E) -> Result<(), StorageError> {
        ensure_entity_id(entity.id())?;
        let link = self.collection_link();
        let response = self
            .request(Method::POST, &link, &format!("{link}/docs"))?
            .header(HEADER_IS_UPSERT, "true")
            .header(HEADER_PARTITION_KEY, partition_key_header(entity.partition())?)
            .json(entity)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(self.error_for_response(response).await)
        }
    }

    async fn delete(&self, entity: &E) -> Result<(), StorageError> {
        ensure_entity_id(entity.id())?;
        let link = self.document_link(entity.id());
        let response = self
            .request(Method::DELETE, &link, &link)?
            .header(HEADER_PARTITION_KEY, partition_key_header(entity.partition())?)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(self.error_for_response(response).await)
        }
    }

    async fn query(&self, spec: QuerySpec<E>) -> Result<Vec<E>, StorageError> {
        let mut results = Vec::new();
        let mut continuation = None;

        // Drain the server's own pagination to exhaustion.
        loop {
            let page = self
                .run_query_page(
                    &spec.filter,
                    spec.order_by.as_ref(),
                    spec.partition.as_deref(),
                    DRAIN_BATCH_SIZE,
                    continuation.as_ref(),
                )
                .await?;
            results.extend(page.items);
            continuation = page.continuation;
            if continuation.is_none() {
                break;
            }
        }

        // Opaque predicates cannot be pushed to the server; they run
        // client-side over the drained results.
        if let Some(predicate) = &spec.post_filter {
            results.retain(|entity| predicate(entity));
        }
        Ok(results)
    }

    async fn query_paged(
        &self,
        spec: QuerySpec<E>,
        page_size: usize,
        continuation: Option<ContinuationToken>,
    ) -> Result<Page<E>, StorageError> {
        if spec.post_filter.is_some() {
            return Err(StorageError::validation(
                "paged queries accept structured filters only",
            ));
        }
        if page_size == 0 {
            return Err(StorageError::validation("page size must be positive"));
        }

        // Exactly one server round trip; the native token goes back to
        // the caller verbatim.
        self.run_query_page(
            &spec.filter,
            spec.order_by.as_ref(),
            spec.partition.as_deref(),
            page_size,
            continuation.as_ref(),
        )
        .await
    }

    async fn count(&self, partition: &str, filter: Option<Filter>) -> Result<u64, StorageError> {
        let filter = filter.unwrap_or(Filter::All);
        let mut total = 0u64;
        let mut continuation = None;

        // Aggregates can still page across physical partitions; sum
        // until the feed is exhausted.
        loop {
            let page: Page<u64> = self
                .run_projected_query(
                    "SELECT VALUE COUNT(1) FROM c",
                    &filter,
                    None,
                    Some(partition),
                    DRAIN_BATCH_SIZE,
                    continuation.as_ref(),
                )
                .await?;
            total += page.items.iter().sum::<u64>();
            continuation = page.continuation;
            if continuation.is_none() {
                break;
            }
        }
        Ok(total)
    }
}
