//! Wire types and SQL translation for the Cosmos DB REST API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use parley_core::storage::query::{Filter, OrderBy};
use parley_types::error::StorageError;

/// A parameterized query document, POSTed with
/// `Content-Type: application/query+json`.
#[derive(Debug, Serialize, PartialEq)]
pub struct SqlQuery {
    pub query: String,
    pub parameters: Vec<SqlParameter>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct SqlParameter {
    pub name: String,
    pub value: Value,
}

/// One page of a query or feed response. Extra feed metadata (`_rid`,
/// `_count`) is ignored.
#[derive(Debug, Deserialize)]
pub struct DocumentPage<T> {
    // `default = "Vec::new"` keeps the derive from demanding `T: Default`.
    #[serde(rename = "Documents", default = "Vec::new")]
    pub documents: Vec<T>,
}

/// Translate a structured filter and optional ordering into a
/// parameterized SQL document. `projection` is the SELECT clause, e.g.
/// `SELECT * FROM c` or `SELECT VALUE COUNT(1) FROM c`.
///
/// Field names come from repository code, not end users, but they are
/// still interpolated into the query text, so anything that is not a
/// plain identifier is rejected.
pub fn build_sql(
    projection: &str,
    filter: &Filter,
    order_by: Option<&OrderBy>,
) -> Result<SqlQuery, StorageError> {
    let mut clauses = Vec::new();
    let mut parameters = Vec::new();
    collect_clauses(filter, &mut clauses, &mut parameters)?;

    let mut query = projection.to_string();
    if !clauses.is_empty() {
        query.push_str(" WHERE ");
        query.push_str(&clauses.join(" AND "));
    }
    if let Some(order) = order_by {
        ensure_field(&order.field)?;
        let direction = if order.descending { "DESC" } else { "ASC" };
        query.push_str(&format!(" ORDER BY c.{} {direction}", order.field));
    }

    Ok(SqlQuery { query, parameters })
}

fn collect_clauses(
    filter: &Filter,
    clauses: &mut Vec<String>,
    parameters: &mut Vec<SqlParameter>,
) -> Result<(), StorageError> {
    match filter {
        Filter::All => {}
        Filter::Eq(field, value) => {
            ensure_field(field)?;
            let name = format!("@p{}", parameters.len());
            clauses.push(format!("c.{field} = {name}"));
            parameters.push(SqlParameter { name, value: value.clone() });
        }
        Filter::And(filters) => {
            for filter in filters {
                collect_clauses(filter, clauses, parameters)?;
            }
        }
    }
    Ok(())
}

fn ensure_field(field: &str) -> Result<(), StorageError> {
    let valid = !field.is_empty()
        && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(StorageError::validation(format!(
            "'{field}' is not a valid filter field"
        )));
    }
    Ok(())
}
