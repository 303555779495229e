//! Query model shared by every storage backend.
//!
//! Filters are split in two: [`Filter`] is structured (field equality,
//! conjunction) and can be translated into a parameterized server-side
//! query by the cloud backend, while [`Predicate`] is an opaque boolean
//! test that can only run client-side. Paged queries and counts accept
//! structured filters only, so their semantics stay identical across
//! backends instead of silently degrading the cloud path to a full scan.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde_json::Value;

use parley_types::error::StorageError;

/// Opaque boolean test evaluated per candidate, client-side only.
pub type Predicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Structured filter over an entity's wire-name projection.
///
/// Field names are the serialized (camelCase) names, e.g. `chatId`.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches everything.
    All,
    /// Field equals value.
    Eq(String, Value),
    /// All sub-filters match.
    And(Vec<Filter>),
}

impl Filter {
    /// Equality filter on a wire field name.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    /// Conjunction of filters.
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(filters.into_iter().collect())
    }

    /// Evaluate this filter against the serde_json projection of an
    /// entity. Missing fields never match.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, expected) => doc.get(field) == Some(expected),
            Filter::And(filters) => filters.iter().all(|f| f.matches(doc)),
        }
    }

    /// Every field name referenced by this filter.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Filter::All => Vec::new(),
            Filter::Eq(field, _) => vec![field.as_str()],
            Filter::And(filters) => filters.iter().flat_map(|f| f.fields()).collect(),
        }
    }
}

/// Sort directive for a query. Ties are broken by entity id so the
/// enumeration order is stable across calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self { field: field.into(), descending: false }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self { field: field.into(), descending: true }
    }
}

/// Opaque cursor returned by a paged query.
///
/// Only valid for the same filter/partition/ordering/page-size
/// combination that produced it; presenting it elsewhere is undefined.
/// The map-backed contexts encode a decimal offset, the cloud context
/// round-trips the server-native token verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Encode an offset into the filtered-and-sorted result set.
    pub fn from_offset(offset: usize) -> Self {
        Self(offset.to_string())
    }

    /// Decode an offset token. Garbage (including a server-native token
    /// presented to a map-backed context) is a validation error.
    pub fn to_offset(&self) -> Result<usize, StorageError> {
        self.0
            .parse::<usize>()
            .map_err(|_| StorageError::validation(format!("invalid continuation token '{}'", self.0)))
    }
}

/// One page of results plus the cursor for the next page. A `None`
/// cursor means there are no further pages.
#[derive(Debug, Clone)]
pub struct Page<E> {
    pub items: Vec<E>,
    pub continuation: Option<ContinuationToken>,
}

impl<E> Page<E> {
    pub fn empty() -> Self {
        Self { items: Vec::new(), continuation: None }
    }
}

/// A complete query description: optional partition scope, structured
/// filter, optional opaque post-filter, optional ordering.
pub struct QuerySpec<E> {
    pub partition: Option<String>,
    pub filter: Filter,
    pub post_filter: Option<Predicate<E>>,
    pub order_by: Option<OrderBy>,
}

impl<E> QuerySpec<E> {
    /// Unscoped, match-everything query. On the cloud backend this fans
    /// out across partitions; reserve it for administrative listing.
    pub fn all() -> Self {
        Self::filtered(Filter::All)
    }

    pub fn filtered(filter: Filter) -> Self {
        Self { partition: None, filter, post_filter: None, order_by: None }
    }

    /// Scope the query to one partition.
    pub fn in_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }

    /// Attach an opaque client-side post-filter. Only valid for unpaged
    /// queries; paged queries and counts reject it.
    pub fn post_filter(mut self, predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.post_filter = Some(Arc::new(predicate));
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by = Some(order);
        self
    }
}

impl<E> Clone for QuerySpec<E> {
    fn clone(&self) -> Self {
        Self {
            partition: self.partition.clone(),
            filter: self.filter.clone(),
            post_filter: self.post_filter.clone(),
            order_by: self.order_by.clone(),
        }
    }
}

impl<E> std::fmt::Debug for QuerySpec<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuerySpec")
            .field("partition", &self.partition)
            .field("filter", &self.filter)
            .field("post_filter", &self.post_filter.as_ref().map(|_| "<fn>"))
            .field("order_by", &self.order_by)
            .finish()
    }
}

/// Total order over JSON projections used for client-side sorting:
/// null < bool < number < string < everything else. Two strings that
/// both parse as RFC 3339 timestamps compare chronologically, so
/// serialized `DateTime<Utc>` fields order correctly regardless of
/// fractional-second precision.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Bool(_), _) => Ordering::Less,
        (_, Value::Bool(_)) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::Number(_), _) => Ordering::Less,
        (_, Value::Number(_)) => Ordering::Greater,
        (Value::String(x), Value::String(y)) => {
            match (parse_timestamp(x), parse_timestamp(y)) {
                (Some(tx), Some(ty)) => tx.cmp(&ty),
                _ => x.cmp(y),
            }
        }
        // Arrays and objects are not meaningful sort keys.
        _ => Ordering::Equal,
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn eq_filter_matches_projection() {
        let doc = json!({ "chatId": "c1", "content": "hi" });
        assert!(Filter::eq("chatId", "c1").matches(&doc));
        assert!(!Filter::eq("chatId", "c2").matches(&doc));
        assert!(!Filter::eq("missing", "c1").matches(&doc));
        assert!(Filter::All.matches(&doc));
    }

    #[test]
    fn and_filter_requires_all() {
        let doc = json!({ "userId": "u1", "chatId": "c1" });
        let both = Filter::and([Filter::eq("userId", "u1"), Filter::eq("chatId", "c1")]);
        let one = Filter::and([Filter::eq("userId", "u1"), Filter::eq("chatId", "c2")]);
        assert!(both.matches(&doc));
        assert!(!one.matches(&doc));
        assert_eq!(both.fields(), vec!["userId", "chatId"]);
    }

    #[test]
    fn offset_token_roundtrip() {
        let token = ContinuationToken::from_offset(30);
        assert_eq!(token.as_str(), "30");
        assert_eq!(token.to_offset().unwrap(), 30);
    }

    #[test]
    fn garbage_token_is_validation_error() {
        let token = ContinuationToken::new("{\"range\":\"0-FF\"}");
        assert!(matches!(token.to_offset(), Err(StorageError::Validation(_))));
    }

    #[test]
    fn numbers_order_numerically() {
        assert_eq!(compare_values(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(compare_values(&json!(2.5), &json!(2)), Ordering::Greater);
    }

    #[test]
    fn rfc3339_strings_order_chronologically() {
        // Lexicographic comparison would put the fractional timestamp
        // first; chronological comparison must not.
        let earlier = json!("2024-05-01T00:00:00Z");
        let later = json!("2024-05-01T00:00:00.500Z");
        assert_eq!(compare_values(&earlier, &later), Ordering::Less);
        assert_eq!(compare_values(&later, &earlier), Ordering::Greater);
    }

    #[test]
    fn plain_strings_order_lexicographically() {
        assert_eq!(compare_values(&json!("abc"), &json!("abd")), Ordering::Less);
    }

    #[test]
    fn null_sorts_first() {
        assert_eq!(compare_values(&Value::Null, &json!(0)), Ordering::Less);
        assert_eq!(compare_values(&json!("x"), &Value::Null), Ordering::Greater);
    }
}
