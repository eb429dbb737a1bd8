//! Turso Embedded / libSQL tabular warehouse.
//!
//! A [`Warehouse`] is a directory. `catalog.db` holds schema migrations, the
//! dataset registry and the load audit log; every dataset is its own database
//! file (`<root>/<dataset>.db`) attached to the catalog connection under the
//! dataset name, so tables are addressed as `"dataset"."table"`.
//!
//! The pipeline talks to the warehouse through [`WarehouseClient`].

mod migrations;
mod query;
mod schema;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use enricher_shared::{EnricherError, Record, Result, RunId};
use libsql::{Connection, Database, params};
use serde::{Deserialize, Serialize};
use serde_json::Map;
use uuid::Uuid;

pub use query::{QueryParams, quote_identifier, render_query, validate_identifier};
pub use schema::{Column, ColumnType, TableSchema, infer_schema};

use schema::{from_sql_value, to_sql_value};

/// Catalog database file name inside the warehouse root.
const CATALOG_FILE: &str = "catalog.db";

/// Names a dataset may not take: SQLite schema names and the catalog file stem.
const RESERVED_DATASETS: [&str; 3] = ["main", "temp", "catalog"];

/// Warehouse operations the enrichment pipeline depends on.
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    /// Whether `dataset.table` exists. A missing dataset means a missing table.
    async fn table_exists(&self, dataset: &str, table: &str) -> Result<bool>;

    /// Create a dataset. No-op when it already exists.
    async fn create_dataset(&self, dataset: &str, location: Option<&str>) -> Result<()>;

    /// Create `dataset.table` with `schema`. No-op when the table exists.
    async fn create_table(&self, dataset: &str, table: &str, schema: &TableSchema)
    -> Result<()>;

    /// Append `rows`, returning the number written.
    ///
    /// With `allow_new_columns`, fields the table lacks are added as columns;
    /// otherwise they fail the write.
    async fn write_rows(
        &self,
        rows: &[Record],
        dataset: &str,
        table: &str,
        allow_new_columns: bool,
    ) -> Result<u64>;

    /// Render the template at `template_path` with identifier `params` and
    /// return the result rows in query order.
    async fn run_parametrized_query(
        &self,
        template_path: &Path,
        params: &QueryParams,
    ) -> Result<Vec<Record>>;

    /// Record a successful append in the load audit log.
    async fn record_load(
        &self,
        run_id: &RunId,
        dataset: &str,
        table: &str,
        row_count: u64,
    ) -> Result<()>;
}

/// One row of the load audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadJob {
    pub id: String,
    pub run_id: String,
    pub dataset: String,
    pub table_name: String,
    pub row_count: u64,
    pub loaded_at: DateTime<Utc>,
}

/// Warehouse handle wrapping the catalog connection.
pub struct Warehouse {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    root: PathBuf,
}

impl Warehouse {
    /// Open or create a warehouse rooted at `root`, attaching every registered dataset.
    pub async fn open(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root).map_err(|e| EnricherError::io(root, e))?;

        let db = libsql::Builder::new_local(root.join(CATALOG_FILE))
            .build()
            .await
            .map_err(|e| EnricherError::Warehouse(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| EnricherError::Warehouse(e.to_string()))?;

        let warehouse = Self {
            db,
            conn,
            root: root.to_path_buf(),
        };
        warehouse.run_migrations().await?;

        for dataset in warehouse.registered_datasets().await? {
            warehouse.attach(&dataset).await?;
        }

        Ok(warehouse)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run pending catalog migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying warehouse migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        EnricherError::Warehouse(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current catalog schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Datasets
    // -----------------------------------------------------------------------

    fn dataset_path(&self, dataset: &str) -> PathBuf {
        self.root.join(format!("{dataset}.db"))
    }

    fn validate_dataset(dataset: &str) -> Result<()> {
        validate_identifier(dataset)?;
        if RESERVED_DATASETS
            .iter()
            .any(|r| r.eq_ignore_ascii_case(dataset))
        {
            return Err(EnricherError::validation(format!(
                "dataset name `{dataset}` is reserved"
            )));
        }
        Ok(())
    }

    /// Dataset names recorded in the catalog.
    pub async fn registered_datasets(&self) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query("SELECT name FROM datasets ORDER BY name", params![])
            .await
            .map_err(|e| EnricherError::Warehouse(e.to_string()))?;

        let mut names = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| EnricherError::Warehouse(e.to_string()))?
        {
            names.push(
                row.get::<String>(0)
                    .map_err(|e| EnricherError::Warehouse(e.to_string()))?,
            );
        }
        Ok(names)
    }

    /// Schema names currently attached to the catalog connection.
    async fn attached_datasets(&self) -> Result<BTreeSet<String>> {
        let mut rows = self
            .conn
            .query("PRAGMA database_list", params![])
            .await
            .map_err(|e| EnricherError::Warehouse(e.to_string()))?;

        let mut names = BTreeSet::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| EnricherError::Warehouse(e.to_string()))?
        {
            let name = row
                .get::<String>(1)
                .map_err(|e| EnricherError::Warehouse(e.to_string()))?;
            if name != "main" && name != "temp" {
                names.insert(name);
            }
        }
        Ok(names)
    }

    async fn is_attached(&self, dataset: &str) -> Result<bool> {
        Ok(self.attached_datasets().await?.contains(dataset))
    }

    async fn attach(&self, dataset: &str) -> Result<()> {
        Self::validate_dataset(dataset)?;
        if self.is_attached(dataset).await? {
            return Ok(());
        }

        let path = self.dataset_path(dataset);
        let sql = format!("ATTACH DATABASE ?1 AS {}", quote_identifier(dataset)?);
        self.conn
            .execute(&sql, params![path.to_string_lossy().as_ref()])
            .await
            .map_err(|e| EnricherError::Warehouse(format!("attach {dataset}: {e}")))?;

        tracing::debug!(dataset, path = %path.display(), "attached dataset");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Tables
    // -----------------------------------------------------------------------

    /// Current column names of `dataset.table`, in declaration order.
    /// Empty when the table does not exist.
    pub async fn table_columns(&self, dataset: &str, table: &str) -> Result<Vec<String>> {
        let sql = format!(
            "PRAGMA {}.table_info({})",
            quote_identifier(dataset)?,
            quote_identifier(table)?
        );
        let mut rows = self
            .conn
            .query(&sql, params![])
            .await
            .map_err(|e| EnricherError::Warehouse(e.to_string()))?;

        let mut columns = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| EnricherError::Warehouse(e.to_string()))?
        {
            columns.push(
                row.get::<String>(1)
                    .map_err(|e| EnricherError::Warehouse(e.to_string()))?,
            );
        }
        Ok(columns)
    }

    /// Execute rendered SQL and collect the rows as records.
    async fn query_records(&self, sql: &str) -> Result<Vec<Record>> {
        let mut rows = self
            .conn
            .query(sql, params![])
            .await
            .map_err(|e| EnricherError::Warehouse(e.to_string()))?;

        let column_names: Vec<String> = (0..rows.column_count())
            .map(|i| rows.column_name(i).unwrap_or_default().to_string())
            .collect();

        let mut records = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| EnricherError::Warehouse(e.to_string()))?
        {
            let mut fields = Map::new();
            for (idx, name) in column_names.iter().enumerate() {
                let value = row
                    .get_value(idx as i32)
                    .map_err(|e| EnricherError::Warehouse(e.to_string()))?;
                fields.insert(name.clone(), from_sql_value(value));
            }
            records.push(Record::from(fields));
        }
        Ok(records)
    }

    /// Render `template` with `params` and run it.
    pub async fn run_query(&self, template: &str, params: &QueryParams) -> Result<Vec<Record>> {
        let sql = render_query(template, params)?;
        tracing::debug!(sql = %sql, "running warehouse query");
        self.query_records(&sql).await
    }

    // -----------------------------------------------------------------------
    // Load audit
    // -----------------------------------------------------------------------

    /// Load audit rows for `dataset.table`, oldest first.
    pub async fn load_history(&self, dataset: &str, table: &str) -> Result<Vec<LoadJob>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, run_id, dataset, table_name, row_count, loaded_at
                 FROM load_jobs WHERE dataset = ?1 AND table_name = ?2
                 ORDER BY loaded_at, id",
                params![dataset, table],
            )
            .await
            .map_err(|e| EnricherError::Warehouse(e.to_string()))?;

        let mut jobs = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| EnricherError::Warehouse(e.to_string()))?
        {
            jobs.push(row_to_load_job(&row)?);
        }
        Ok(jobs)
    }
}

#[async_trait]
impl WarehouseClient for Warehouse {
    async fn table_exists(&self, dataset: &str, table: &str) -> Result<bool> {
        validate_identifier(table)?;
        Self::validate_dataset(dataset)?;
        if !self.is_attached(dataset).await? {
            return Ok(false);
        }

        let sql = format!(
            "SELECT 1 FROM {}.sqlite_master WHERE type = 'table' AND name = ?1",
            quote_identifier(dataset)?
        );
        let mut rows = self
            .conn
            .query(&sql, params![table])
            .await
            .map_err(|e| EnricherError::Warehouse(e.to_string()))?;

        let found = rows
            .next()
            .await
            .map_err(|e| EnricherError::Warehouse(e.to_string()))?
            .is_some();
        Ok(found)
    }

    #[tracing::instrument(skip_all, fields(dataset = %dataset))]
    async fn create_dataset(&self, dataset: &str, location: Option<&str>) -> Result<()> {
        Self::validate_dataset(dataset)?;
        if self.is_attached(dataset).await? {
            tracing::debug!("dataset already exists");
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT OR IGNORE INTO datasets (name, location, created_at) VALUES (?1, ?2, ?3)",
                params![dataset, location, now.as_str()],
            )
            .await
            .map_err(|e| EnricherError::Load(format!("register dataset {dataset}: {e}")))?;

        self.attach(dataset)
            .await
            .map_err(|e| EnricherError::Load(e.to_string()))?;

        tracing::info!(location, "created dataset");
        Ok(())
    }

    #[tracing::instrument(
        skip_all,
        fields(dataset = %dataset, table = %table, columns = schema.len())
    )]
    async fn create_table(
        &self,
        dataset: &str,
        table: &str,
        schema: &TableSchema,
    ) -> Result<()> {
        if schema.is_empty() {
            return Err(EnricherError::validation(format!(
                "cannot create {dataset}.{table} without columns"
            )));
        }

        let columns = schema
            .columns
            .iter()
            .map(|c| Ok(format!("{} {}", quote_identifier(&c.name)?, c.column_type)))
            .collect::<Result<Vec<_>>>()?;

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {}.{} ({})",
            quote_identifier(dataset)?,
            quote_identifier(table)?,
            columns.join(", ")
        );
        self.conn
            .execute(&sql, params![])
            .await
            .map_err(|e| EnricherError::Load(format!("create table {dataset}.{table}: {e}")))?;

        tracing::info!("created table");
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(dataset = %dataset, table = %table, rows = rows.len()))]
    async fn write_rows(
        &self,
        rows: &[Record],
        dataset: &str,
        table: &str,
        allow_new_columns: bool,
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let target = format!("{}.{}", quote_identifier(dataset)?, quote_identifier(table)?);
        let mut known: BTreeSet<String> =
            self.table_columns(dataset, table).await?.into_iter().collect();
        if known.is_empty() {
            return Err(EnricherError::Load(format!(
                "table {dataset}.{table} does not exist"
            )));
        }

        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| EnricherError::Load(e.to_string()))?;

        for row in rows {
            for (name, value) in row.fields() {
                if known.contains(name) {
                    continue;
                }
                if !allow_new_columns {
                    return Err(EnricherError::Load(format!(
                        "column `{name}` does not exist in {dataset}.{table}"
                    )));
                }

                let column_type = rows
                    .iter()
                    .filter_map(|r| r.get(name))
                    .find(|v| !v.is_null())
                    .map_or(ColumnType::of(value), ColumnType::of);
                let sql = format!(
                    "ALTER TABLE {target} ADD COLUMN {} {column_type}",
                    quote_identifier(name)?
                );
                tx.execute(&sql, params![])
                    .await
                    .map_err(|e| EnricherError::Load(format!("add column {name}: {e}")))?;
                tracing::info!(column = %name, %column_type, "extended table schema");
                known.insert(name.clone());
            }

            let names = row
                .fields()
                .keys()
                .map(|k| quote_identifier(k))
                .collect::<Result<Vec<_>>>()?;
            let placeholders = (1..=names.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>();
            let sql = format!(
                "INSERT INTO {target} ({}) VALUES ({})",
                names.join(", "),
                placeholders.join(", ")
            );
            let values = row.fields().values().map(to_sql_value).collect::<Vec<_>>();

            tx.execute(&sql, libsql::params::Params::Positional(values))
                .await
                .map_err(|e| EnricherError::Load(format!("insert into {dataset}.{table}: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| EnricherError::Load(e.to_string()))?;

        tracing::info!("rows written");
        Ok(rows.len() as u64)
    }

    async fn run_parametrized_query(
        &self,
        template_path: &Path,
        params: &QueryParams,
    ) -> Result<Vec<Record>> {
        let template = tokio::fs::read_to_string(template_path)
            .await
            .map_err(|e| EnricherError::io(template_path, e))?;
        self.run_query(&template, params).await
    }

    async fn record_load(
        &self,
        run_id: &RunId,
        dataset: &str,
        table: &str,
        row_count: u64,
    ) -> Result<()> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO load_jobs (id, run_id, dataset, table_name, row_count, loaded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id.as_str(),
                    run_id.to_string(),
                    dataset,
                    table,
                    row_count as i64,
                    now.as_str()
                ],
            )
            .await
            .map_err(|e| EnricherError::Warehouse(e.to_string()))?;
        Ok(())
    }
}

/// Map a libSQL row to a [`LoadJob`].
fn row_to_load_job(row: &libsql::Row) -> Result<LoadJob> {
    Ok(LoadJob {
        id: row
            .get::<String>(0)
            .map_err(|e| EnricherError::Warehouse(e.to_string()))?,
        run_id: row
            .get::<String>(1)
            .map_err(|e| EnricherError::Warehouse(e.to_string()))?,
        dataset: row
            .get::<String>(2)
            .map_err(|e| EnricherError::Warehouse(e.to_string()))?,
        table_name: row
            .get::<String>(3)
            .map_err(|e| EnricherError::Warehouse(e.to_string()))?,
        row_count: row
            .get::<i64>(4)
            .map_err(|e| EnricherError::Warehouse(e.to_string()))? as u64,
        loaded_at: {
            let s: String = row
                .get(5)
                .map_err(|e| EnricherError::Warehouse(e.to_string()))?;
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| EnricherError::Warehouse(format!("invalid date: {e}")))?
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Create a warehouse in a fresh temp directory.
    async fn test_warehouse() -> Warehouse {
        let root = std::env::temp_dir().join(format!("enricher_wh_{}", Uuid::now_v7()));
        Warehouse::open(&root).await.expect("open test warehouse")
    }

    fn company(id: &str, name: &str) -> Record {
        Record::new()
            .with("company_id", id)
            .with("company_name", name)
            .with("domain", format!("{}.com", name.to_lowercase()))
    }

    async fn companies_table(wh: &Warehouse, dataset: &str) {
        wh.create_dataset(dataset, None).await.unwrap();
        let schema = infer_schema(&company("0", "Sample")).unwrap();
        wh.create_table(dataset, "companies", &schema).await.unwrap();
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let wh = test_warehouse().await;
        assert_eq!(wh.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let root = std::env::temp_dir().join(format!("enricher_wh_{}", Uuid::now_v7()));
        let first = Warehouse::open(&root).await.expect("first open");
        drop(first);
        let second = Warehouse::open(&root).await.expect("second open");
        assert_eq!(second.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn create_dataset_is_idempotent() {
        let wh = test_warehouse().await;
        wh.create_dataset("el", Some("EU")).await.unwrap();
        wh.create_dataset("el", Some("EU")).await.unwrap();
        assert_eq!(wh.registered_datasets().await.unwrap(), vec!["el".to_string()]);
        assert!(wh.root().join("el.db").exists());
    }

    #[tokio::test]
    async fn reserved_dataset_names_are_rejected() {
        let wh = test_warehouse().await;
        assert!(wh.create_dataset("main", None).await.is_err());
        assert!(wh.create_dataset("catalog", None).await.is_err());
        assert!(wh.create_dataset("bad-name", None).await.is_err());
    }

    #[tokio::test]
    async fn table_exists_tracks_creation() {
        let wh = test_warehouse().await;
        assert!(!wh.table_exists("el", "companies").await.unwrap());

        wh.create_dataset("el", None).await.unwrap();
        assert!(!wh.table_exists("el", "companies").await.unwrap());

        companies_table(&wh, "el").await;
        assert!(wh.table_exists("el", "companies").await.unwrap());
    }

    #[tokio::test]
    async fn write_and_query_rows() {
        let wh = test_warehouse().await;
        companies_table(&wh, "ol").await;

        let written = wh
            .write_rows(
                &[company("2", "Beta"), company("1", "Acme")],
                "ol",
                "companies",
                false,
            )
            .await
            .unwrap();
        assert_eq!(written, 2);

        let params = QueryParams::new()
            .identifier("dataset", "ol")
            .identifier("table", "companies")
            .identifier("id_column", "company_id");
        let rows = wh
            .run_query("SELECT * FROM @dataset.@table ORDER BY @id_column", &params)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get_str("company_id"), Some("1"));
        assert_eq!(rows[0].get_str("company_name"), Some("Acme"));
        assert_eq!(rows[1].get_str("domain"), Some("beta.com"));
    }

    #[tokio::test]
    async fn new_columns_extend_schema_when_allowed() {
        let wh = test_warehouse().await;
        companies_table(&wh, "el").await;

        let row = company("1", "Acme").with("formatted_address", "Main St 1");
        let err = wh
            .write_rows(std::slice::from_ref(&row), "el", "companies", false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("formatted_address"));

        wh.write_rows(&[row], "el", "companies", true).await.unwrap();
        let columns = wh.table_columns("el", "companies").await.unwrap();
        assert!(columns.contains(&"formatted_address".to_string()));
    }

    #[tokio::test]
    async fn write_to_missing_table_is_load_error() {
        let wh = test_warehouse().await;
        wh.create_dataset("el", None).await.unwrap();
        let err = wh
            .write_rows(&[company("1", "Acme")], "el", "companies", true)
            .await
            .unwrap_err();
        assert!(matches!(err, EnricherError::Load(_)));
    }

    #[tokio::test]
    async fn datasets_reattach_on_reopen() {
        let root = std::env::temp_dir().join(format!("enricher_wh_{}", Uuid::now_v7()));
        {
            let wh = Warehouse::open(&root).await.unwrap();
            companies_table(&wh, "el").await;
            wh.write_rows(&[company("1", "Acme")], "el", "companies", false)
                .await
                .unwrap();
        }

        let wh = Warehouse::open(&root).await.unwrap();
        assert!(wh.table_exists("el", "companies").await.unwrap());
        let rows = wh
            .run_query(
                "SELECT company_id FROM @d.@t",
                &QueryParams::new().identifier("d", "el").identifier("t", "companies"),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn json_values_round_trip_as_text() {
        let wh = test_warehouse().await;
        wh.create_dataset("el", None).await.unwrap();
        let row = Record::new()
            .with("company_id", 7)
            .with("tags", json!(["a"]))
            .with("active", true);
        wh.create_table("el", "t", &infer_schema(&row).unwrap())
            .await
            .unwrap();
        wh.write_rows(&[row], "el", "t", false).await.unwrap();

        let rows = wh
            .run_query(
                "SELECT * FROM @d.@t",
                &QueryParams::new().identifier("d", "el").identifier("t", "t"),
            )
            .await
            .unwrap();
        assert_eq!(rows[0].get("company_id"), Some(&json!(7)));
        assert_eq!(rows[0].get("tags"), Some(&json!("[\"a\"]")));
        assert_eq!(rows[0].get("active"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn load_history_records_appends() {
        let wh = test_warehouse().await;
        let run_id = RunId::new();
        wh.record_load(&run_id, "el", "companies", 25).await.unwrap();
        wh.record_load(&run_id, "el", "companies", 3).await.unwrap();
        wh.record_load(&run_id, "el", "other", 1).await.unwrap();

        let history = wh.load_history("el", "companies").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].row_count, 25);
        assert_eq!(history[1].run_id, run_id.to_string());
    }

    #[tokio::test]
    async fn parametrized_query_reads_template_file() {
        let wh = test_warehouse().await;
        companies_table(&wh, "ol").await;
        wh.write_rows(&[company("1", "Acme")], "ol", "companies", false)
            .await
            .unwrap();

        let path = wh.root().join("select.sql");
        std::fs::write(&path, "SELECT * FROM @dataset.@table").unwrap();
        let rows = wh
            .run_parametrized_query(
                &path,
                &QueryParams::new()
                    .identifier("dataset", "ol")
                    .identifier("table", "companies"),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);

        let missing = wh
            .run_parametrized_query(&wh.root().join("nope.sql"), &QueryParams::new())
            .await;
        assert!(matches!(missing, Err(EnricherError::Io { .. })));
    }
}
