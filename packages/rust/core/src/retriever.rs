//! Concurrent retrieval of missing address and description fields.
//!
//! Every record of a chunk becomes one [`RetrievalTask`] spawned onto the
//! runtime through a [`SubmissionThrottle`]. Results are collected in
//! completion order into [`RetrievedRecords`], keyed by identity. The first
//! failed task aborts the stage; tasks already spawned keep running detached.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use enricher_providers::{SearchService, get_response};
use enricher_shared::{EnricherError, Record, RecordKey, Result, columns};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument};
use url::Url;

use crate::prompts::{CREATE_DESCRIPTION, PromptStore, RETRIEVE_ADDRESS};
use crate::throttle::SubmissionThrottle;

/// Reduce a website or domain string to a bare lowercase host.
///
/// `https://www.Acme.com/about` becomes `acme.com`. Returns `None` for blank input.
pub fn normalize_domain(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let host = match Url::parse(&with_scheme) {
        Ok(url) => url.host_str().map(str::to_string),
        Err(_) => None,
    }
    .unwrap_or_else(|| {
        let rest = trimmed.split_once("://").map_or(trimmed, |(_, rest)| rest);
        rest.split(['/', '?', '#']).next().unwrap_or(rest).to_string()
    });

    let host = host.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    (!host.is_empty()).then(|| host.to_string())
}

// ---------------------------------------------------------------------------
// RetrievalTask
// ---------------------------------------------------------------------------

/// One record together with the lookups it still needs.
#[derive(Debug)]
pub struct RetrievalTask {
    key: RecordKey,
    record: Record,
    needs_address: bool,
    needs_description: bool,
}

/// A finished task: the updated record and the number of service calls made.
#[derive(Debug)]
pub struct TaskOutput {
    pub key: RecordKey,
    pub record: Record,
    pub calls: usize,
}

impl RetrievalTask {
    pub fn new(key: RecordKey, record: Record) -> Self {
        let needs_address = record.is_blank(columns::ADDRESS);
        let needs_description = record.is_blank(columns::DESCRIPTION);
        Self {
            key,
            record,
            needs_address,
            needs_description,
        }
    }

    /// Number of service calls this task will make.
    pub fn planned_calls(&self) -> usize {
        usize::from(self.needs_address) + usize::from(self.needs_description)
    }

    /// Fetch each missing field, writing trimmed results back into the record.
    pub async fn run(
        mut self,
        search: &dyn SearchService,
        prompts: &PromptStore,
    ) -> Result<TaskOutput> {
        let mut calls = 0;
        if self.planned_calls() == 0 {
            return Ok(TaskOutput {
                key: self.key,
                record: self.record,
                calls,
            });
        }

        let name = self.record.text(columns::COMPANY_NAME).unwrap_or_default().to_string();
        let raw_domain = self.record.text(columns::DOMAIN).unwrap_or_default().to_string();
        let domain = normalize_domain(&raw_domain);
        let domain_for_prompt = domain.clone().unwrap_or(raw_domain);
        let country = self.record.text(columns::COUNTRY).unwrap_or_default().to_string();
        let filter = domain.map(|d| vec![d]);

        if self.needs_address {
            debug!(key = %self.key, company = %name, "retrieving address");
            let prompt = prompts.render(
                RETRIEVE_ADDRESS,
                &[
                    ("company_name", name.as_str()),
                    ("domain", domain_for_prompt.as_str()),
                    ("country", country.as_str()),
                ],
            )?;
            let address = get_response(search, &prompt, filter.as_deref()).await?;
            self.record.set(columns::ADDRESS, address.trim());
            calls += 1;
        }

        if self.needs_description {
            debug!(key = %self.key, company = %name, "creating description");
            let prompt = prompts.render(
                CREATE_DESCRIPTION,
                &[
                    ("company_name", name.as_str()),
                    ("domain", domain_for_prompt.as_str()),
                ],
            )?;
            let description = get_response(search, &prompt, filter.as_deref()).await?;
            self.record.set(columns::DESCRIPTION, description.trim());
            calls += 1;
        }

        Ok(TaskOutput {
            key: self.key,
            record: self.record,
            calls,
        })
    }
}

// ---------------------------------------------------------------------------
// RetrievedRecords
// ---------------------------------------------------------------------------

/// Retrieval output for one chunk, keyed by identity.
#[derive(Debug, Default)]
pub struct RetrievedRecords {
    records: HashMap<RecordKey, Record>,
    calls: usize,
}

impl RetrievedRecords {
    pub fn get(&self, key: &RecordKey) -> Option<&Record> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total service calls made across the chunk.
    pub fn calls(&self) -> usize {
        self.calls
    }

    fn insert(&mut self, output: TaskOutput) {
        self.calls += output.calls;
        self.records.insert(output.key, output.record);
    }

    /// Reassemble the records in the given key order.
    pub fn into_ordered(mut self, order: &[RecordKey]) -> Result<Vec<Record>> {
        let ordered = order
            .iter()
            .map(|key| {
                self.records.remove(key).ok_or_else(|| {
                    EnricherError::Integrity(format!("retrieval lost record `{key}`"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(extra) = self.records.keys().next() {
            return Err(EnricherError::Integrity(format!(
                "retrieval produced unexpected record `{extra}`"
            )));
        }
        Ok(ordered)
    }
}

// ---------------------------------------------------------------------------
// FieldRetriever
// ---------------------------------------------------------------------------

/// Rate-limited fan-out of retrieval tasks over one chunk.
pub struct FieldRetriever {
    search: Arc<dyn SearchService>,
    prompts: Arc<PromptStore>,
    interval: Duration,
}

impl FieldRetriever {
    pub fn new(
        search: Arc<dyn SearchService>,
        prompts: Arc<PromptStore>,
        interval: Duration,
    ) -> Self {
        Self {
            search,
            prompts,
            interval,
        }
    }

    /// Fill missing fields for every record of `chunk`.
    #[instrument(skip_all, fields(records = chunk.len()))]
    pub async fn retrieve(&self, chunk: Vec<Record>, id_column: &str) -> Result<RetrievedRecords> {
        let mut tasks = Vec::with_capacity(chunk.len());
        let mut seen = HashSet::new();
        for record in chunk {
            let key = record.key(id_column)?;
            if !seen.insert(key.clone()) {
                return Err(EnricherError::Integrity(format!(
                    "duplicate identity key `{key}` in chunk"
                )));
            }
            tasks.push(RetrievalTask::new(key, record));
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<Result<TaskOutput>>();
        let mut throttle = SubmissionThrottle::new(self.interval);
        let mut retrieved = RetrievedRecords::default();
        let planned: usize = tasks.iter().map(RetrievalTask::planned_calls).sum();

        for task in tasks {
            // Stop submitting as soon as any finished task has failed.
            while let Ok(result) = rx.try_recv() {
                retrieved.insert(result?);
            }

            let search = Arc::clone(&self.search);
            let prompts = Arc::clone(&self.prompts);
            let tx = tx.clone();
            throttle
                .submit(async move {
                    let result = task.run(search.as_ref(), &prompts).await;
                    // The receiver is gone once the stage has aborted.
                    let _ = tx.send(result);
                })
                .await;
        }
        drop(tx);

        while let Some(result) = rx.recv().await {
            retrieved.insert(result?);
        }

        if retrieved.len() != throttle.submitted() {
            return Err(EnricherError::Integrity(format!(
                "{} of {} retrieval tasks ended without a result",
                throttle.submitted() - retrieved.len(),
                throttle.submitted()
            )));
        }

        info!(
            tasks = throttle.submitted(),
            calls = retrieved.calls(),
            planned,
            "retrieval stage complete"
        );
        Ok(retrieved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use enricher_providers::{RetryPolicy, ServiceError};
    use std::sync::Mutex;

    /// Answers every prompt with a canned reply and records what it was asked.
    struct ScriptedSearch {
        policy: RetryPolicy,
        reply: String,
        fail_on: Option<String>,
        calls: Mutex<Vec<(String, Option<Vec<String>>)>>,
    }

    impl ScriptedSearch {
        fn new(reply: &str) -> Self {
            Self {
                policy: RetryPolicy::none(),
                reply: reply.to_string(),
                fail_on: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, Option<Vec<String>>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchService for ScriptedSearch {
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
            match &self.fail_on {
                Some(needle) if prompt.contains(needle.as_str()) => {
                    Err(ServiceError::terminal("HTTP 401"))
                }
                _ => Ok(self.reply.clone()),
            }
        }
    }

    fn prompts() -> Arc<PromptStore> {
        let mut store = PromptStore::builtin();
        store.insert(RETRIEVE_ADDRESS, "address of {company_name} at {domain} in {country}");
        store.insert(CREATE_DESCRIPTION, "describe {company_name} at {domain}");
        Arc::new(store)
    }

    fn retriever(search: Arc<ScriptedSearch>) -> FieldRetriever {
        FieldRetriever::new(search, prompts(), Duration::from_millis(10))
    }

    #[test]
    fn domain_normalization() {
        assert_eq!(normalize_domain("https://www.Acme.com/about").as_deref(), Some("acme.com"));
        assert_eq!(normalize_domain("shop.example.org").as_deref(), Some("shop.example.org"));
        assert_eq!(normalize_domain("WWW.beta.de").as_deref(), Some("beta.de"));
        assert_eq!(normalize_domain("http://x.io:8080/p?q=1").as_deref(), Some("x.io"));
        assert_eq!(normalize_domain("   "), None);
    }

    #[tokio::test(start_paused = true)]
    async fn populated_record_makes_no_calls() {
        let search = Arc::new(ScriptedSearch::new("unused"));
        let record = Record::new()
            .with("company_id", "1")
            .with("company_name", "Acme")
            .with("address", "Main St 1")
            .with("description", "Makes anvils");

        let out = retriever(search.clone())
            .retrieve(vec![record.clone()], "company_id")
            .await
            .unwrap();

        assert!(search.calls().is_empty());
        assert_eq!(out.calls(), 0);
        assert_eq!(out.get(&"1".into()), Some(&record));
    }

    #[tokio::test(start_paused = true)]
    async fn fills_only_missing_fields_with_trimmed_text() {
        let search = Arc::new(ScriptedSearch::new("  Found It \n"));
        let chunk = vec![
            Record::new()
                .with("company_id", "1")
                .with("company_name", "Acme")
                .with("domain", "https://www.acme.com/")
                .with("country", "Germany")
                .with("address", "")
                .with("description", "Known"),
            Record::new()
                .with("company_id", "2")
                .with("company_name", "Beta")
                .with("address", "Known"),
        ];

        let out = retriever(search.clone())
            .retrieve(chunk, "company_id")
            .await
            .unwrap();

        assert_eq!(out.calls(), 2);
        let first = out.get(&"1".into()).unwrap();
        assert_eq!(first.get_str("address"), Some("Found It"));
        assert_eq!(first.get_str("description"), Some("Known"));
        let second = out.get(&"2".into()).unwrap();
        assert_eq!(second.get_str("address"), Some("Known"));
        assert_eq!(second.get_str("description"), Some("Found It"));

        let calls = search.calls();
        let acme = calls.iter().find(|(p, _)| p.contains("Acme")).unwrap();
        assert_eq!(acme.0, "address of Acme at acme.com in Germany");
        assert_eq!(acme.1, Some(vec!["acme.com".to_string()]));
        let beta = calls.iter().find(|(p, _)| p.contains("Beta")).unwrap();
        assert_eq!(beta.1, None);
    }

    #[tokio::test(start_paused = true)]
    async fn blank_answer_leaves_field_empty() {
        let search = Arc::new(ScriptedSearch::new("  \n"));
        let chunk = vec![
            Record::new()
                .with("company_id", "1")
                .with("company_name", "Unknown Co")
                .with("address", "")
                .with("description", "Known"),
            Record::new()
                .with("company_id", "2")
                .with("company_name", "Beta")
                .with("address", "Known")
                .with("description", "Known"),
        ];

        let out = retriever(search.clone())
            .retrieve(chunk, "company_id")
            .await
            .unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out.calls(), 1);
        let first = out.get(&"1".into()).unwrap();
        assert_eq!(first.get_str("address"), Some(""));
        assert_eq!(first.get_str("description"), Some("Known"));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_task_aborts_the_stage() {
        let mut search = ScriptedSearch::new("ok");
        search.fail_on = Some("Beta".into());
        let search = Arc::new(search);
        let chunk = vec![
            Record::new().with("company_id", "1").with("company_name", "Acme"),
            Record::new().with("company_id", "2").with("company_name", "Beta"),
        ];

        let err = retriever(search).retrieve(chunk, "company_id").await.unwrap_err();
        assert!(matches!(err, EnricherError::Service { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_keys_are_rejected() {
        let search = Arc::new(ScriptedSearch::new("ok"));
        let chunk = vec![
            Record::new().with("company_id", "1"),
            Record::new().with("company_id", "1"),
        ];
        let err = retriever(search.clone())
            .retrieve(chunk, "company_id")
            .await
            .unwrap_err();
        assert!(matches!(err, EnricherError::Integrity(_)));
        assert!(search.calls().is_empty());
    }

    #[test]
    fn reassembles_in_chunk_order() {
        let mut retrieved = RetrievedRecords::default();
        for id in ["3", "1", "2"] {
            retrieved.insert(TaskOutput {
                key: id.into(),
                record: Record::new().with("company_id", id),
                calls: 1,
            });
        }
        let order: Vec<RecordKey> = ["1", "2", "3"].into_iter().map(RecordKey::from).collect();
        let records = retrieved.into_ordered(&order).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.get_str("company_id").unwrap()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
    }
}
