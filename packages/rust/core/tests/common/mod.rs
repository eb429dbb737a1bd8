//! Fake collaborators shared by the driver tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use enricher_core::PromptStore;
use enricher_core::prompts::{CREATE_DESCRIPTION, ENRICH_COMPANIES, RETRIEVE_ADDRESS};
use enricher_providers::{
    GenerativeService, ResponseSchema, RetryPolicy, SearchService, ServiceError,
};
use enricher_shared::{Record, Result, RunId};
use enricher_warehouse::{QueryParams, TableSchema, WarehouseClient};

/// Prompt templates whose rendered text is easy to inspect.
pub fn test_prompts() -> Arc<PromptStore> {
    let mut store = PromptStore::builtin();
    store.insert(RETRIEVE_ADDRESS, "address|{company_name}|{domain}|{country}");
    store.insert(CREATE_DESCRIPTION, "description|{company_name}|{domain}");
    store.insert(ENRICH_COMPANIES, "{companies}");
    Arc::new(store)
}

pub fn company(id: &str, name: &str) -> Record {
    Record::new()
        .with("company_id", id)
        .with("company_name", name)
        .with("domain", format!("https://www.{}.com", name.to_lowercase()))
        .with("country", "DE")
        .with("address", "")
        .with("description", "")
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Search fake answering by prompt kind and recording every call.
pub struct FakeSearch {
    policy: RetryPolicy,
    calls: Mutex<Vec<(String, Option<Vec<String>>)>>,
}

impl FakeSearch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            policy: RetryPolicy::none(),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<(String, Option<Vec<String>>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchService for FakeSearch {
    fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn try_response(
        &self,
        prompt: &str,
        domain_filter: Option<&[String]>,
    ) -> std::result::Result<String, ServiceError> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), domain_filter.map(<[String]>::to_vec)));
        let name = prompt.split('|').nth(1).unwrap_or_default();
        if prompt.starts_with("address|") {
            Ok(format!("  {name} Strasse 1, Berlin  "))
        } else {
            Ok(format!("{name} builds things.\n"))
        }
    }
}

// ---------------------------------------------------------------------------
// Generative
// ---------------------------------------------------------------------------

/// Generative fake that echoes every requested company back, enriched.
///
/// Ids listed in `blank_once` get an empty formatted name the first time they
/// appear, which triggers a repair request.
pub struct EchoModel {
    policy: RetryPolicy,
    blank_once: Mutex<HashSet<String>>,
    prompts: Mutex<Vec<String>>,
}

impl EchoModel {
    pub fn new() -> Arc<Self> {
        Self::with_blank_once(&[])
    }

    pub fn with_blank_once(ids: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            policy: RetryPolicy::none(),
            blank_once: Mutex::new(ids.iter().map(|id| id.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Company ids contained in one recorded prompt.
    pub fn requested_ids(prompt: &str) -> Vec<String> {
        let inputs: Vec<Value> = serde_json::from_str(prompt).unwrap();
        inputs
            .iter()
            .map(|input| input["company_id"].as_str().unwrap().to_string())
            .collect()
    }
}

#[async_trait]
impl GenerativeService for EchoModel {
    fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn try_structured(
        &self,
        prompt: &str,
        _schema: &ResponseSchema,
    ) -> std::result::Result<Value, ServiceError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let inputs: Vec<Value> = serde_json::from_str(prompt)
            .map_err(|e| ServiceError::terminal(format!("unexpected prompt: {e}")))?;

        let mut blank_once = self.blank_once.lock().unwrap();
        let companies: Vec<Value> = inputs
            .iter()
            .map(|input| {
                let id = input["company_id"].as_str().unwrap_or_default();
                let name = input["name"].as_str().unwrap_or_default();
                let formatted = if blank_once.remove(id) {
                    String::new()
                } else {
                    name.to_uppercase()
                };
                json!({
                    "company_id": id,
                    "formatted_company_name": formatted,
                    "formatted_address": input["address"],
                    "determined_company_type1": "seller",
                    "enriched_description": input["description"],
                })
            })
            .collect();
        Ok(json!({ "companies": companies }))
    }

    async fn try_plain(&self, _prompt: &str) -> std::result::Result<String, ServiceError> {
        Err(ServiceError::terminal("plain responses are not used"))
    }
}

// ---------------------------------------------------------------------------
// Warehouse
// ---------------------------------------------------------------------------

/// In-memory warehouse that serves a fixed selection and records every call.
#[derive(Default)]
pub struct RecordingWarehouse {
    selection: Vec<Record>,
    state: Mutex<WarehouseCalls>,
}

#[derive(Debug, Default, Clone)]
pub struct WarehouseCalls {
    pub queries: Vec<PathBuf>,
    pub datasets: Vec<(String, Option<String>)>,
    pub tables: Vec<(String, String, TableSchema)>,
    pub writes: Vec<Vec<Record>>,
    pub loads: Vec<u64>,
}

impl RecordingWarehouse {
    pub fn with_selection(selection: Vec<Record>) -> Arc<Self> {
        Arc::new(Self {
            selection,
            state: Mutex::default(),
        })
    }

    pub fn calls(&self) -> WarehouseCalls {
        self.state.lock().unwrap().clone()
    }
}

#[async_trait]
impl WarehouseClient for RecordingWarehouse {
    async fn table_exists(&self, dataset: &str, table: &str) -> Result<bool> {
        let state = self.state.lock().unwrap();
        Ok(state
            .tables
            .iter()
            .any(|(d, t, _)| d == dataset && t == table))
    }

    async fn create_dataset(&self, dataset: &str, location: Option<&str>) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .datasets
            .push((dataset.to_string(), location.map(str::to_string)));
        Ok(())
    }

    async fn create_table(&self, dataset: &str, table: &str, schema: &TableSchema) -> Result<()> {
        self.state.lock().unwrap().tables.push((
            dataset.to_string(),
            table.to_string(),
            schema.clone(),
        ));
        Ok(())
    }

    async fn write_rows(
        &self,
        rows: &[Record],
        _dataset: &str,
        _table: &str,
        _allow_new_columns: bool,
    ) -> Result<u64> {
        self.state.lock().unwrap().writes.push(rows.to_vec());
        Ok(rows.len() as u64)
    }

    async fn run_parametrized_query(
        &self,
        template_path: &Path,
        _params: &QueryParams,
    ) -> Result<Vec<Record>> {
        self.state
            .lock()
            .unwrap()
            .queries
            .push(template_path.to_path_buf());
        Ok(self.selection.clone())
    }

    async fn record_load(
        &self,
        _run_id: &RunId,
        _dataset: &str,
        _table: &str,
        row_count: u64,
    ) -> Result<()> {
        self.state.lock().unwrap().loads.push(row_count);
        Ok(())
    }
}
