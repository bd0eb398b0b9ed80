//! Embedded libSQL query engine hosting the merged dataset.
//!
//! The [`QueryEngine`] wraps a private in-memory libSQL database. A run loads
//! exactly one dataset into it, switches the connection to query-only mode,
//! and executes the generated SQL against that table. Nothing touches disk
//! and the database disappears with the engine.

mod result;
mod table;

use csvagent_dataset::Dataset;
use csvagent_shared::{CsvAgentError, Result};
use libsql::params::Params;
use libsql::{Connection, Database, Value};
use tracing::{debug, info, instrument};

pub use result::{CellValue, ResultTable};

const IN_MEMORY: &str = ":memory:";

/// In-memory SQL engine for a single dataset.
pub struct QueryEngine {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    loaded: Option<String>,
}

impl QueryEngine {
    /// Open a fresh in-memory database.
    pub async fn open_in_memory() -> Result<Self> {
        let db = libsql::Builder::new_local(IN_MEMORY)
            .build()
            .await
            .map_err(|e| CsvAgentError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| CsvAgentError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            loaded: None,
        })
    }

    /// Name of the loaded table, if any.
    pub fn table_name(&self) -> Option<&str> {
        self.loaded.as_deref()
    }

    /// Create `table` from the dataset's schema and insert every row.
    ///
    /// Rows go in within a single transaction. Afterwards the connection is
    /// switched to query-only, so generated SQL cannot modify the data.
    #[instrument(skip_all, fields(table = %table))]
    pub async fn load_dataset(&mut self, table: &str, dataset: &Dataset) -> Result<()> {
        if let Some(existing) = &self.loaded {
            return Err(CsvAgentError::Storage(format!(
                "engine already holds table '{existing}'"
            )));
        }
        if dataset.schema().is_empty() {
            return Err(CsvAgentError::Storage(
                "cannot load a dataset without columns".into(),
            ));
        }

        let ddl = table::create_table_sql(table, dataset);
        debug!(%ddl, "creating table");
        self.conn
            .execute(&ddl, ())
            .await
            .map_err(|e| CsvAgentError::Storage(format!("create table failed: {e}")))?;

        let insert = table::insert_sql(table, dataset);
        let types: Vec<_> = dataset.schema().iter().map(|c| c.column_type).collect();

        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| CsvAgentError::Storage(e.to_string()))?;

        for (i, row) in dataset.rows().iter().enumerate() {
            let values: Vec<Value> = row
                .iter()
                .zip(&types)
                .map(|(cell, ty)| table::to_value(cell.as_deref(), *ty))
                .collect();

            tx.execute(&insert, Params::Positional(values))
                .await
                .map_err(|e| CsvAgentError::Storage(format!("insert of row {} failed: {e}", i + 1)))?;
        }

        tx.commit()
            .await
            .map_err(|e| CsvAgentError::Storage(e.to_string()))?;

        self.conn
            .execute_batch("PRAGMA query_only = ON;")
            .await
            .map_err(|e| CsvAgentError::Storage(e.to_string()))?;

        let (rows, columns) = dataset.shape();
        info!(rows, columns, "dataset loaded into engine");
        self.loaded = Some(table.to_string());
        Ok(())
    }

    /// Execute one statement and collect its result.
    #[instrument(skip_all)]
    pub async fn query(&self, sql: &str) -> Result<ResultTable> {
        let mut rows = self
            .conn
            .query(sql, ())
            .await
            .map_err(|e| CsvAgentError::Query(e.to_string()))?;

        let width = rows.column_count();
        let columns: Vec<String> = (0..width)
            .map(|i| rows.column_name(i).unwrap_or("?").to_string())
            .collect();

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| CsvAgentError::Query(e.to_string()))?
        {
            let mut values = Vec::with_capacity(columns.len());
            for i in 0..width {
                let value = row
                    .get_value(i)
                    .map_err(|e| CsvAgentError::Query(e.to_string()))?;
                values.push(match value {
                    Value::Null => CellValue::Null,
                    Value::Integer(v) => CellValue::Integer(v),
                    Value::Real(v) => CellValue::Real(v),
                    Value::Text(s) => CellValue::Text(s),
                    Value::Blob(b) => CellValue::Blob(b.len()),
                });
            }
            out.push(values);
        }

        debug!(rows = out.len(), columns = columns.len(), "query executed");
        Ok(ResultTable { columns, rows: out })
    }
}
