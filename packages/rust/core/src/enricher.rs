//! Structured batch enrichment of a chunk through the generative service.
//!
//! One schema-constrained call covers the whole chunk. An item that comes back
//! with an empty formatted name is re-requested once on its own; whatever that
//! single-record request returns replaces the degenerate item.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use enricher_providers::{GenerativeService, ResponseSchema, get_structured_response};
use enricher_shared::{EnricherError, Record, RecordKey, Result, columns};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use crate::prompts::{ENRICH_COMPANIES, PromptStore};

/// Per-record input sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyInput {
    pub company_id: String,
    pub name: Value,
    pub address: Value,
    pub description: Value,
}

impl CompanyInput {
    fn from_record(key: &RecordKey, record: &Record) -> Self {
        let field = |name: &str| record.get(name).cloned().unwrap_or(Value::Null);
        Self {
            company_id: key.to_string(),
            name: field(columns::COMPANY_NAME),
            address: field(columns::ADDRESS),
            description: field(columns::DESCRIPTION),
        }
    }
}

/// Derived fields the model returns for one company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedCompany {
    pub company_id: String,
    pub formatted_company_name: String,
    pub formatted_address: String,
    pub determined_company_type1: String,
    pub enriched_description: String,
}

impl EnrichedCompany {
    /// Whether the model produced no usable name for this company.
    pub fn is_degenerate(&self) -> bool {
        self.formatted_company_name.trim().is_empty()
    }

    /// The fields the merge step may write onto the source record.
    pub fn derived_fields(&self) -> [(&'static str, &str); 4] {
        [
            (columns::FORMATTED_COMPANY_NAME, self.formatted_company_name.as_str()),
            (columns::FORMATTED_ADDRESS, self.formatted_address.as_str()),
            (columns::DETERMINED_COMPANY_TYPE, self.determined_company_type1.as_str()),
            (columns::ENRICHED_DESCRIPTION, self.enriched_description.as_str()),
        ]
    }
}

/// The structured response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct CompanyBatch {
    pub companies: Vec<EnrichedCompany>,
}

/// Strict JSON schema for [`CompanyBatch`].
pub fn company_batch_schema() -> ResponseSchema {
    let text = json!({"type": "string"});
    ResponseSchema::new(
        "CompanyArray",
        json!({
            "type": "object",
            "properties": {
                "companies": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "company_id": text,
                            "formatted_company_name": text,
                            "formatted_address": text,
                            "determined_company_type1": {
                                "type": "string",
                                "enum": ["seller", "buyer", ""]
                            },
                            "enriched_description": text
                        },
                        "required": [
                            "company_id",
                            "formatted_company_name",
                            "formatted_address",
                            "determined_company_type1",
                            "enriched_description"
                        ],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["companies"],
            "additionalProperties": false
        }),
    )
}

/// Enrichment output for one chunk.
#[derive(Debug, Default)]
pub struct EnrichmentOutcome {
    pub companies: BTreeMap<RecordKey, EnrichedCompany>,
    /// Single-record follow-up requests issued for degenerate items.
    pub repairs: usize,
}

/// Runs the batch enrichment call and the repair path.
pub struct StructuredEnricher {
    service: Arc<dyn GenerativeService>,
    prompts: Arc<PromptStore>,
    schema: ResponseSchema,
}

impl StructuredEnricher {
    pub fn new(service: Arc<dyn GenerativeService>, prompts: Arc<PromptStore>) -> Self {
        Self {
            service,
            prompts,
            schema: company_batch_schema(),
        }
    }

    async fn request(&self, inputs: &[CompanyInput]) -> Result<CompanyBatch> {
        let companies = serde_json::to_string_pretty(inputs)
            .map_err(|e| EnricherError::parse(format!("serialize enrichment input: {e}")))?;
        let prompt = self
            .prompts
            .render(ENRICH_COMPANIES, &[("companies", companies.as_str())])?;
        get_structured_response(self.service.as_ref(), &prompt, &self.schema).await
    }

    /// Enrich every record of `chunk`, keyed by the identity in `id_column`.
    #[instrument(skip_all, fields(records = chunk.len()))]
    pub async fn enrich(&self, chunk: &[Record], id_column: &str) -> Result<EnrichmentOutcome> {
        let mut inputs = Vec::with_capacity(chunk.len());
        for record in chunk {
            let key = record.key(id_column)?;
            inputs.push((key.clone(), CompanyInput::from_record(&key, record)));
        }
        let request: Vec<CompanyInput> = inputs.iter().map(|(_, input)| input.clone()).collect();

        let batch = self.request(&request).await?;
        let mut companies = index_response(&inputs, batch)?;
        let mut outcome = EnrichmentOutcome::default();

        for (key, input) in &inputs {
            let degenerate = companies.get(key).is_some_and(EnrichedCompany::is_degenerate);
            if !degenerate {
                continue;
            }

            info!(%key, "empty formatted name, requesting single-record repair");
            outcome.repairs += 1;
            let repair = self.request(std::slice::from_ref(input)).await?;

            match repair.companies.into_iter().next() {
                Some(mut replacement) => {
                    if replacement.company_id != key.as_str() {
                        warn!(
                            %key,
                            returned = %replacement.company_id,
                            "repair answered with a different id, keeping the requested one"
                        );
                        replacement.company_id = key.to_string();
                    }
                    if replacement.is_degenerate() {
                        warn!(%key, "repair is degenerate as well, accepting it");
                    }
                    companies.insert(key.clone(), replacement);
                }
                None => warn!(%key, "repair returned no items, keeping the degenerate result"),
            }
        }

        info!(
            enriched = companies.len(),
            repairs = outcome.repairs,
            "enrichment stage complete"
        );
        outcome.companies = companies;
        Ok(outcome)
    }
}

/// Key the response by identity, requiring a one-to-one match with the request.
fn index_response(
    inputs: &[(RecordKey, CompanyInput)],
    batch: CompanyBatch,
) -> Result<BTreeMap<RecordKey, EnrichedCompany>> {
    let requested: HashSet<&RecordKey> = inputs.iter().map(|(key, _)| key).collect();
    let mut companies = BTreeMap::new();

    for item in batch.companies {
        let key = RecordKey::from(item.company_id.as_str());
        if !requested.contains(&key) {
            return Err(EnricherError::Integrity(format!(
                "enrichment returned unexpected company_id `{key}`"
            )));
        }
        if companies.insert(key.clone(), item).is_some() {
            return Err(EnricherError::Integrity(format!(
                "enrichment returned company_id `{key}` more than once"
            )));
        }
    }

    if let Some((missing, _)) = inputs.iter().find(|(key, _)| !companies.contains_key(key)) {
        return Err(EnricherError::Integrity(format!(
            "enrichment response is missing company_id `{missing}`"
        )));
    }

    Ok(companies)
}
