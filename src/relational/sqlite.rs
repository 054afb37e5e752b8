//! SQLite relational backend.

use super::{Assignments, ColumnInfo, Filter, Identifier, ReadOnlyStatement, Record, RelationalStore};
use crate::error::{BrokerError, Result};
use async_trait::async_trait;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection, Statement};
use serde_json::{Map, Number, Value};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

/// SQLite database exposed through [`RelationalStore`].
pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Open (or create) the database at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        info!("Opened SQLite database at {:?}", path);
        Ok(Self::from_connection(conn))
    }

    /// Wrap an existing connection (schema set up by the caller).
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| BrokerError::Backend(format!("Failed to acquire lock: {}", e)))
    }
}

/// Convert a JSON value into a bindable SQLite value. Nested arrays and
/// objects are stored as JSON text.
fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

/// Convert a column value into JSON. Blobs become lowercase hex strings.
fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(bytes.iter().map(|b| format!("{:02x}", b)).collect()),
    }
}

/// Render `"col" = ?n AND ...`, numbering placeholders after those already in `values`.
fn where_clause(filter: &Filter, values: &mut Vec<SqlValue>) -> String {
    let mut parts = Vec::with_capacity(filter.predicates().len());
    for (column, value) in filter.predicates() {
        if value.is_null() {
            parts.push(format!("{} IS NULL", column.quoted()));
        } else {
            values.push(to_sql(value));
            parts.push(format!("{} = ?{}", column.quoted(), values.len()));
        }
    }
    parts.join(" AND ")
}

fn collect_records(stmt: &mut Statement<'_>, values: Vec<SqlValue>) -> Result<Vec<Record>> {
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query(params_from_iter(values))?;

    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Map::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            record.insert(name.clone(), from_sql(row.get_ref(i)?));
        }
        records.push(record);
    }
    Ok(records)
}

#[async_trait]
impl RelationalStore for SqliteDatabase {
    #[instrument(skip(self, data), fields(table = %table))]
    async fn insert(&self, table: &Identifier, data: &Assignments) -> Result<i64> {
        let columns: Vec<String> = data.columns().iter().map(|(c, _)| c.quoted()).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table.quoted(),
            columns.join(", "),
            placeholders.join(", ")
        );

        let conn = self.lock()?;
        conn.execute(&sql, params_from_iter(data.columns().iter().map(|(_, v)| to_sql(v))))?;
        let id = conn.last_insert_rowid();

        debug!("Inserted row {} into {}", id, table);
        Ok(id)
    }

    #[instrument(skip(self, filter), fields(table = %table))]
    async fn select(
        &self,
        table: &Identifier,
        filter: Option<&Filter>,
        limit: u32,
    ) -> Result<Vec<Record>> {
        let mut values = Vec::new();
        let mut sql = format!("SELECT * FROM {}", table.quoted());
        if let Some(filter) = filter {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause(filter, &mut values));
        }
        values.push(SqlValue::Integer(i64::from(limit)));
        sql.push_str(&format!(" LIMIT ?{}", values.len()));

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let records = collect_records(&mut stmt, values)?;

        debug!("Read {} rows from {}", records.len(), table);
        Ok(records)
    }

    #[instrument(skip(self, filter, data), fields(table = %table))]
    async fn update(&self, table: &Identifier, filter: &Filter, data: &Assignments) -> Result<usize> {
        let mut values: Vec<SqlValue> = data.columns().iter().map(|(_, v)| to_sql(v)).collect();
        let set_clause = data
            .columns()
            .iter()
            .enumerate()
            .map(|(i, (column, _))| format!("{} = ?{}", column.quoted(), i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let where_sql = where_clause(filter, &mut values);
        let sql = format!("UPDATE {} SET {} WHERE {}", table.quoted(), set_clause, where_sql);

        let conn = self.lock()?;
        let affected = conn.execute(&sql, params_from_iter(values))?;

        info!("Updated {} rows in {}", affected, table);
        Ok(affected)
    }

    #[instrument(skip(self, statement))]
    async fn query(&self, statement: &ReadOnlyStatement) -> Result<Vec<Record>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(statement.as_str())?;

        if !stmt.readonly() {
            return Err(BrokerError::Forbidden(
                "statement would modify the database".to_string(),
            ));
        }

        collect_records(&mut stmt, Vec::new())
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let tables = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(tables)
    }

    #[instrument(skip(self), fields(table = %table))]
    async fn describe_table(&self, table: &Identifier) -> Result<Vec<ColumnInfo>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT cid, name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1)",
        )?;
        let columns = stmt
            .query_map(params![table.as_str()], |row| {
                Ok(ColumnInfo {
                    cid: row.get(0)?,
                    name: row.get(1)?,
                    data_type: row.get(2)?,
                    notnull: row.get::<_, i64>(3)? != 0,
                    default: row.get(4)?,
                    pk: row.get::<_, i64>(5)? != 0,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        if columns.is_empty() {
            return Err(BrokerError::NotFound(format!("table '{}'", table)));
        }
        Ok(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn database() -> SqliteDatabase {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT,
                age INTEGER DEFAULT 0
            );
            "#,
        )
        .unwrap();
        SqliteDatabase::from_connection(conn)
    }

    fn table() -> Identifier {
        Identifier::parse("users").unwrap()
    }

    fn data(value: Value) -> Assignments {
        Assignments::from_object(value.as_object().unwrap()).unwrap()
    }

    fn filter(value: Value) -> Filter {
        Filter::from_object(value.as_object().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_insert_then_select_by_filter() {
        let db = database();
        let id = db
            .insert(&table(), &data(json!({"name": "João Silva", "email": "joao@example.com", "age": 30})))
            .await
            .unwrap();
        db.insert(&table(), &data(json!({"name": "Maria"}))).await.unwrap();

        let rows = db
            .select(&table(), Some(&filter(json!({"id": id}))), 100)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], json!("João Silva"));
        assert_eq!(rows[0]["age"], json!(30));

        let all = db.select(&table(), None, 1).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_update_scoped_by_filter() {
        let db = database();
        db.insert(&table(), &data(json!({"name": "A", "age": 1}))).await.unwrap();
        db.insert(&table(), &data(json!({"name": "B", "age": 1}))).await.unwrap();

        let affected = db
            .update(&table(), &filter(json!({"name": "A"})), &data(json!({"age": 31})))
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let b = db.select(&table(), Some(&filter(json!({"name": "B"}))), 10).await.unwrap();
        assert_eq!(b[0]["age"], json!(1));
    }

    #[tokio::test]
    async fn test_null_filter_matches_null() {
        let db = database();
        db.insert(&table(), &data(json!({"name": "no-mail", "age": 5}))).await.unwrap();
        db.insert(&table(), &data(json!({"name": "mail", "email": "x@y.z", "age": 5}))).await.unwrap();

        let rows = db
            .select(&table(), Some(&filter(json!({"age": 5, "email": null}))), 10)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], json!("no-mail"));
    }

    #[tokio::test]
    async fn test_query_rejects_writes_behind_read_verb() {
        let db = database();
        let sneaky = ReadOnlyStatement::parse(
            "WITH x AS (SELECT 1) INSERT INTO users (name) SELECT 'evil' FROM x",
        )
        .unwrap();
        assert!(matches!(db.query(&sneaky).await, Err(BrokerError::Forbidden(_))));

        let rows = db.select(&table(), None, 10).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_query_returns_records() {
        let db = database();
        db.insert(&table(), &data(json!({"name": "A", "age": 40}))).await.unwrap();

        let stmt = ReadOnlyStatement::parse("SELECT name, age * 2 AS double_age FROM users").unwrap();
        let rows = db.query(&stmt).await.unwrap();
        assert_eq!(rows, vec![json!({"name": "A", "double_age": 80}).as_object().cloned().unwrap()]);
    }

    #[tokio::test]
    async fn test_schema_introspection() {
        let db = database();
        assert_eq!(db.list_tables().await.unwrap(), vec!["users".to_string()]);

        let columns = db.describe_table(&table()).await.unwrap();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "email", "age"]);
        assert!(columns[0].pk);
        assert!(columns[1].notnull);
        assert_eq!(columns[3].default.as_deref(), Some("0"));

        let missing = Identifier::parse("orders").unwrap();
        assert!(matches!(db.describe_table(&missing).await, Err(BrokerError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_backend_rejection_surfaces() {
        let db = database();
        let err = db.insert(&table(), &data(json!({"email": "no-name@x"}))).await.unwrap_err();
        assert_eq!(err.kind(), "backend_error");
    }
}
