//! Document-collection access over the relational tables.
//!
//! Call sites use `find` / `find_one` / `insert_one` / `update_one` /
//! `delete_one` with JSON filter and document maps; this module turns those
//! into parameterized SQL. Only identifiers are spliced into statement text,
//! and those are validated and quoted first. Every value is bound.

use crate::db::sqlite::SqlitePool;
use crate::error::StorageError;
use futures::TryStreamExt;
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Row, Sqlite, TypeInfo, ValueRef};
use tracing::{debug, error, warn};

/// Insertion-ordered column → value map.
pub type Document = Map<String, Value>;

const SET_OPERATOR: &str = "$set";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsertOneResult {
    pub inserted_id: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteResult {
    pub deleted_count: u64,
}

/// Quote a table or column name after checking it is a plain identifier.
pub fn quote_ident(name: &str) -> Result<String, StorageError> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric());
    if !valid {
        return Err(StorageError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{name}\""))
}

/// `"a" = ? AND "b" = ?` plus the values to bind, in filter order.
///
/// `null` filter values compare with `IS NULL` and bind nothing.
pub fn filter_to_where_clause(filter: &Document) -> Result<(String, Vec<Value>), StorageError> {
    if filter.is_empty() {
        return Err(StorageError::InvalidFilter("filter cannot be empty"));
    }
    let mut terms = Vec::with_capacity(filter.len());
    let mut params = Vec::with_capacity(filter.len());
    for (key, value) in filter {
        let col = quote_ident(key)?;
        if value.is_null() {
            terms.push(format!("{col} IS NULL"));
        } else {
            terms.push(format!("{col} = ?"));
            params.push(value.clone());
        }
    }
    Ok((terms.join(" AND "), params))
}

/// The field set an update applies: the `$set` object when present,
/// otherwise the update map itself.
pub fn extract_effective_update(update: &Document) -> Result<&Document, StorageError> {
    match update.get(SET_OPERATOR) {
        Some(Value::Object(fields)) => Ok(fields),
        Some(other) => Err(StorageError::InvalidUpdate(format!(
            "$set must be an object, got {other}"
        ))),
        None => Ok(update),
    }
}

/// `"a" = ?, "b" = ?` plus the values to bind.
pub fn update_to_set_clause(fields: &Document) -> Result<(String, Vec<Value>), StorageError> {
    if fields.is_empty() {
        return Err(StorageError::InvalidUpdate(
            "update must set at least one field".to_string(),
        ));
    }
    let mut assignments = Vec::with_capacity(fields.len());
    for key in fields.keys() {
        if key.starts_with('$') {
            return Err(StorageError::InvalidUpdate(format!(
                "unsupported update operator {key}"
            )));
        }
        assignments.push(format!("{} = ?", quote_ident(key)?));
    }
    Ok((assignments.join(", "), fields.values().cloned().collect()))
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s),
        // Nested values are stored as JSON text.
        nested => query.bind(nested.to_string()),
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: Vec<Value>,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for value in params {
        query = bind_value(query, value);
    }
    query
}

fn row_to_document(row: &SqliteRow) -> Result<Document, sqlx::Error> {
    let mut doc = Document::new();
    for column in row.columns() {
        let idx = column.ordinal();
        let raw = row.try_get_raw(idx)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let storage_class = raw.type_info().name().to_string();
            match storage_class.as_str() {
                "INTEGER" => Value::from(row.try_get_unchecked::<i64, _>(idx)?),
                "REAL" => Value::from(row.try_get_unchecked::<f64, _>(idx)?),
                _ => Value::String(row.try_get_unchecked::<String, _>(idx)?),
            }
        };
        doc.insert(column.name().to_string(), value);
    }
    Ok(doc)
}

/// Handle to the database, handed out once storage is initialized.
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn collection(&self, name: impl Into<String>) -> Collection {
        Collection {
            table: name.into(),
            pool: self.pool.clone(),
        }
    }
}

/// One table seen through the document interface.
#[derive(Clone)]
pub struct Collection {
    table: String,
    pool: SqlitePool,
}

/// Lazy result of [`Collection::find`]. Nothing runs until `to_array`, and
/// each call re-reads the table.
pub struct Cursor {
    table: String,
    pool: SqlitePool,
}

impl Cursor {
    /// Every row of the table. Read failures are logged and yield `[]`.
    pub async fn to_array(&self) -> Vec<Document> {
        match self.fetch_all().await {
            Ok(docs) => docs,
            Err(e) => {
                error!(table = %self.table, error = %e, "find failed; returning empty result");
                Vec::new()
            }
        }
    }

    async fn fetch_all(&self) -> Result<Vec<Document>, StorageError> {
        let sql = format!("SELECT * FROM {}", quote_ident(&self.table)?);
        let rows: Vec<SqliteRow> = sqlx::query(&sql)
            .fetch(&self.pool)
            .try_collect()
            .await
            .map_err(|e| self.query_error(e))?;
        rows.iter()
            .map(|row| row_to_document(row).map_err(|e| self.query_error(e)))
            .collect()
    }

    fn query_error(&self, source: sqlx::Error) -> StorageError {
        StorageError::Query {
            table: self.table.clone(),
            source,
        }
    }
}

impl Collection {
    pub fn name(&self) -> &str {
        &self.table
    }

    /// Whole-table read. Filtering, projection and paging are not supported;
    /// use [`Collection::find_one`] or filter the returned rows.
    pub fn find(&self) -> Cursor {
        Cursor {
            table: self.table.clone(),
            pool: self.pool.clone(),
        }
    }

    /// First row matching every filter field exactly.
    ///
    /// An empty filter never matches. Read failures are logged and yield `None`.
    pub async fn find_one(&self, filter: &Document) -> Option<Document> {
        if filter.is_empty() {
            warn!(table = %self.table, "find_one called with empty filter");
            return None;
        }
        match self.try_find_one(filter).await {
            Ok(doc) => doc,
            Err(e) => {
                error!(table = %self.table, error = %e, "find_one failed; returning None");
                None
            }
        }
    }

    async fn try_find_one(&self, filter: &Document) -> Result<Option<Document>, StorageError> {
        let table = quote_ident(&self.table)?;
        let (where_clause, params) = filter_to_where_clause(filter)?;
        let sql = format!("SELECT * FROM {table} WHERE {where_clause} LIMIT 1");
        let row = bind_all(sqlx::query(&sql), params)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| self.query_error(e))?;
        row.as_ref()
            .map(row_to_document)
            .transpose()
            .map_err(|e| self.query_error(e))
    }

    /// Insert one row; columns are the document's keys in order.
    ///
    /// Returns the document's `id`, or the identifier the engine assigned
    /// when the document has none.
    pub async fn insert_one(&self, doc: &Document) -> Result<InsertOneResult, StorageError> {
        let table = quote_ident(&self.table)?;
        let sql = if doc.is_empty() {
            format!("INSERT INTO {table} DEFAULT VALUES")
        } else {
            let columns = doc
                .keys()
                .map(|k| quote_ident(k))
                .collect::<Result<Vec<_>, _>>()?;
            let placeholders = vec!["?"; columns.len()].join(", ");
            format!(
                "INSERT INTO {table} ({}) VALUES ({placeholders})",
                columns.join(", ")
            )
        };

        let done = bind_all(sqlx::query(&sql), doc.values().cloned().collect())
            .execute(&self.pool)
            .await
            .map_err(|e| self.insert_error(e))?;

        let inserted_id = match doc.get("id") {
            Some(id) if !id.is_null() => id.clone(),
            _ => {
                let select = format!("SELECT \"id\" FROM {table} WHERE rowid = ?");
                let row = sqlx::query(&select)
                    .bind(done.last_insert_rowid())
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| self.insert_error(e))?;
                row_to_document(&row)
                    .map_err(|e| self.insert_error(e))?
                    .get("id")
                    .cloned()
                    .unwrap_or(Value::Null)
            }
        };
        debug!(table = %self.table, id = %inserted_id, "inserted document");
        Ok(InsertOneResult { inserted_id })
    }

    /// Update the first row matching `filter`. `update` is either a plain
    /// field map or `{"$set": {...}}`.
    pub async fn update_one(
        &self,
        filter: &Document,
        update: &Document,
    ) -> Result<UpdateResult, StorageError> {
        if filter.is_empty() {
            return Err(StorageError::InvalidFilter("update filter cannot be empty"));
        }
        let table = quote_ident(&self.table)?;
        let (set_clause, mut params) = update_to_set_clause(extract_effective_update(update)?)?;
        let (where_clause, where_params) = filter_to_where_clause(filter)?;
        params.extend(where_params);

        let sql = format!(
            "UPDATE {table} SET {set_clause} \
             WHERE rowid IN (SELECT rowid FROM {table} WHERE {where_clause} LIMIT 1)"
        );
        let done = bind_all(sqlx::query(&sql), params)
            .execute(&self.pool)
            .await
            .map_err(|source| StorageError::Update {
                table: self.table.clone(),
                source,
            })?;

        let changed = done.rows_affected();
        debug!(table = %self.table, changed, "updated document");
        Ok(UpdateResult {
            matched_count: changed,
            modified_count: changed,
        })
    }

    /// Delete at most one row matching `filter`.
    pub async fn delete_one(&self, filter: &Document) -> Result<DeleteResult, StorageError> {
        if filter.is_empty() {
            return Err(StorageError::InvalidFilter("delete filter cannot be empty"));
        }
        let table = quote_ident(&self.table)?;
        let (where_clause, params) = filter_to_where_clause(filter)?;

        // Stock SQLite builds lack DELETE ... LIMIT.
        let sql = format!(
            "DELETE FROM {table} \
             WHERE rowid IN (SELECT rowid FROM {table} WHERE {where_clause} LIMIT 1)"
        );
        let done = bind_all(sqlx::query(&sql), params)
            .execute(&self.pool)
            .await
            .map_err(|source| StorageError::Delete {
                table: self.table.clone(),
                source,
            })?;

        debug!(table = %self.table, deleted = done.rows_affected(), "deleted document");
        Ok(DeleteResult {
            deleted_count: done.rows_affected(),
        })
    }

    pub async fn count_documents(&self) -> Result<u64, StorageError> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(&self.table)?);
        let (count,): (i64,) = sqlx::query_as(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| self.query_error(e))?;
        Ok(count.max(0) as u64)
    }

    fn query_error(&self, source: sqlx::Error) -> StorageError {
        StorageError::Query {
            table: self.table.clone(),
            source,
        }
    }

    fn insert_error(&self, source: sqlx::Error) -> StorageError {
        StorageError::Insert {
            table: self.table.clone(),
            source,
        }
    }
}
