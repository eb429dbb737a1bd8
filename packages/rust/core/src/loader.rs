//! Per-chunk load into the destination table.

use std::sync::Arc;

use enricher_shared::{Record, Result, RunId};
use enricher_warehouse::{WarehouseClient, infer_schema};
use tracing::{info, instrument, warn};

/// Destination of processed chunks.
#[derive(Debug, Clone)]
pub struct LoadTarget {
    pub dataset: String,
    pub table: String,
    pub location: Option<String>,
}

/// Appends processed chunks, creating the dataset and table on first use.
pub struct WarehouseLoader {
    warehouse: Arc<dyn WarehouseClient>,
    target: LoadTarget,
}

impl WarehouseLoader {
    pub fn new(warehouse: Arc<dyn WarehouseClient>, target: LoadTarget) -> Self {
        Self { warehouse, target }
    }

    pub fn target(&self) -> &LoadTarget {
        &self.target
    }

    /// Load one chunk. Once this returns the chunk is durable and will not be
    /// selected again. Failing to write the audit row is logged, not raised.
    #[instrument(skip_all, fields(
        dataset = %self.target.dataset,
        table = %self.target.table,
        rows = rows.len(),
    ))]
    pub async fn load_chunk(&self, run_id: &RunId, rows: &[Record]) -> Result<u64> {
        let Some(sample) = rows.first() else {
            return Ok(0);
        };
        let LoadTarget {
            dataset,
            table,
            location,
        } = &self.target;

        self.warehouse
            .create_dataset(dataset, location.as_deref())
            .await?;

        if !self.warehouse.table_exists(dataset, table).await? {
            let schema = infer_schema(sample)?;
            info!(columns = schema.len(), "creating destination table from sample record");
            self.warehouse.create_table(dataset, table, &schema).await?;
        }

        let written = self.warehouse.write_rows(rows, dataset, table, true).await?;
        // Rows are committed here; the audit row is best-effort.
        if let Err(e) = self
            .warehouse
            .record_load(run_id, dataset, table, written)
            .await
        {
            warn!(error = %e, written, "chunk loaded but load audit could not be recorded");
        }

        info!(written, "chunk loaded");
        Ok(written)
    }
}
