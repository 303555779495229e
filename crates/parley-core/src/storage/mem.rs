//! In-memory query engine shared by the map-backed contexts.
//!
//! The volatile and filesystem backends both hold their entities in a
//! concurrent map and answer queries from a snapshot of its values. This
//! module implements the filter / sort / page pipeline once so the two
//! backends cannot drift apart on pagination semantics.

use serde_json::Value;

use parley_types::entity::StorageEntity;
use parley_types::error::StorageError;

use super::query::{ContinuationToken, Filter, Page, QuerySpec, compare_values};

/// Run an unpaged query over a snapshot of the collection.
pub fn run_query<E: StorageEntity>(
    items: Vec<E>,
    spec: &QuerySpec<E>,
) -> Result<Vec<E>, StorageError> {
    let mut matched = collect_matches(items, spec)?;
    if let Some(order) = &spec.order_by {
        sort_by_field(&mut matched, &order.field, order.descending);
    }
    Ok(matched.into_iter().map(|(entity, _)| entity).collect())
}

/// Run one page of a query over a snapshot of the collection.
///
/// The token is a decimal offset into the filtered-and-sorted result
/// set. When the spec carries no ordering the matches are sorted by id,
/// so the enumeration stays stable across the token chain.
pub fn run_query_paged<E: StorageEntity>(
    items: Vec<E>,
    spec: &QuerySpec<E>,
    page_size: usize,
    continuation: Option<&ContinuationToken>,
) -> Result<Page<E>, StorageError> {
    if spec.post_filter.is_some() {
        return Err(StorageError::validation(
            "paged queries accept structured filters only",
        ));
    }
    if page_size == 0 {
        return Err(StorageError::validation("page size must be positive"));
    }

    let mut matched = collect_matches(items, spec)?;
    match &spec.order_by {
        Some(order) => sort_by_field(&mut matched, &order.field, order.descending),
        None => matched.sort_by(|(a, _), (b, _)| a.id().cmp(b.id())),
    }

    let total = matched.len();
    let offset = match continuation {
        Some(token) => token.to_offset()?,
        None => 0,
    };
    if offset >= total {
        return Ok(Page::empty());
    }

    let items: Vec<E> = matched
        .into_iter()
        .skip(offset)
        .take(page_size)
        .map(|(entity, _)| entity)
        .collect();
    let next = if offset + page_size < total {
        Some(ContinuationToken::from_offset(offset + page_size))
    } else {
        None
    };

    Ok(Page { items, continuation: next })
}

/// Count entities in a partition, optionally narrowed by a structured
/// filter.
pub fn run_count<E: StorageEntity>(
    items: Vec<E>,
    partition: &str,
    filter: Option<&Filter>,
) -> Result<u64, StorageError> {
    let mut count = 0u64;
    for entity in items {
        if entity.partition() != partition {
            continue;
        }
        if let Some(filter) = filter {
            if !filter.matches(&project(&entity)?) {
                continue;
            }
        }
        count += 1;
    }
    Ok(count)
}

/// Project an entity into its wire-name JSON shape for filter
/// evaluation and sort-key extraction.
fn project<E: StorageEntity>(entity: &E) -> Result<Value, StorageError> {
    serde_json::to_value(entity)
        .map_err(|e| StorageError::Backend(format!("failed to project entity: {e}")))
}

fn collect_matches<E: StorageEntity>(
    items: Vec<E>,
    spec: &QuerySpec<E>,
) -> Result<Vec<(E, Value)>, StorageError> {
    let mut matched = Vec::new();
    for entity in items {
        if let Some(partition) = &spec.partition {
            if entity.partition() != partition {
                continue;
            }
        }
        let doc = project(&entity)?;
        if !spec.filter.matches(&doc) {
            continue;
        }
        if let Some(predicate) = &spec.post_filter {
            if !predicate(&entity) {
                continue;
            }
        }
        matched.push((entity, doc));
    }
    Ok(matched)
}

fn sort_by_field<E: StorageEntity>(matched: &mut [(E, Value)], field: &str, descending: bool) {
    matched.sort_by(|(a, doc_a), (b, doc_b)| {
        let key_a = doc_a.get(field).unwrap_or(&Value::Null);
        let key_b = doc_b.get(field).unwrap_or(&Value::Null);
        let ordering = compare_values(key_a, key_b);
        let ordering = if descending { ordering.reverse() } else { ordering };
        // Id tiebreak keeps enumeration stable across calls.
        ordering.then_with(|| a.id().cmp(b.id()))
    });
}
