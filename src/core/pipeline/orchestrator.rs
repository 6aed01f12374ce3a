//! Batch orchestrator - drives a batch through classification, transformation
//! and risk assessment
//!
//! Records are independent, so a batch fans out over a pool of tokio tasks that
//! pull record indices from a shared cursor. The correspondence store is the
//! only shared mutable state.

use super::plan::TransformPlan;
use super::state::BatchState;
use super::summary::{BatchIssue, BatchOutcome, BatchSummary, IssueSeverity};
use crate::config::{EngineConfig, OnError, VeilConfig};
use crate::deidentify::operator::perturb::record_rng;
use crate::deidentify::operator::{FieldOutcome, OperatorContext};
use crate::deidentify::{apply_chain, PolicyResolver, Pseudonymizer};
use crate::domain::errors::VeilError;
use crate::domain::record::{Dataset, Record};
use crate::domain::result::Result;
use crate::risk::{Recommendation, RiskEvaluator};
use crate::store::{CorrespondenceStore, ValueProtector};
use crate::{log_batch_complete, log_batch_start};
use chrono::NaiveDate;
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};

/// Risk stage settings
#[derive(Debug, Clone)]
struct RiskStage {
    evaluator: RiskEvaluator,
    apply_suppression: bool,
}

/// Batch orchestrator
///
/// # Examples
///
/// ```
/// use veil::config::parse_config;
/// use veil::core::pipeline::BatchOrchestrator;
/// use veil::domain::Dataset;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = parse_config(r#"
/// [[policies]]
/// matcher = { field = "zip" }
/// techniques = [{ technique = "generalize", kind = "postal_prefix", prefix_len = 3 }]
/// "#)?;
/// let orchestrator = BatchOrchestrator::from_config(&config).await?;
///
/// let dataset = Dataset::from_json_str(r#"{
///     "schema": [{"name": "zip", "type": "postal_code"}],
///     "records": [{"zip": "28045"}]
/// }"#)?;
/// let (_tx, shutdown) = tokio::sync::watch::channel(false);
/// let outcome = orchestrator.process(dataset, shutdown).await;
/// assert_eq!(outcome.records[0].get("zip").unwrap().as_text().unwrap(), "280**");
/// # Ok(())
/// # }
/// ```
pub struct BatchOrchestrator {
    engine: EngineConfig,
    resolver: Arc<PolicyResolver>,
    pseudonymizer: Arc<Pseudonymizer>,
    risk: Option<RiskStage>,
}

impl BatchOrchestrator {
    /// Create an orchestrator over an injected store
    ///
    /// `fallback` keys the locally derived pseudonyms used when the store is
    /// unavailable and `engine.store_failure = "one_way_fallback"`.
    ///
    /// # Errors
    ///
    /// `Configuration` when the policy set or risk settings are invalid.
    pub fn new(
        config: &VeilConfig,
        store: Arc<dyn CorrespondenceStore>,
        fallback: Arc<ValueProtector>,
    ) -> Result<Self> {
        let resolver = PolicyResolver::new(
            config.policies.clone(),
            config.engine.default_technique.clone(),
            config.engine.strict_mode,
        )?;

        let risk = if config.risk.enabled {
            Some(RiskStage {
                evaluator: config.risk.evaluator()?,
                apply_suppression: config.risk.apply_suppression,
            })
        } else {
            None
        };

        let pseudonymizer = Pseudonymizer::new(
            store,
            fallback,
            config.engine.store_timeout(),
            config.engine.store_failure,
            config.engine.reversible_by_default,
        );

        tracing::debug!(
            policies = config.policies.len(),
            strict = config.engine.strict_mode,
            workers = config.engine.workers,
            risk_enabled = config.risk.enabled,
            "Batch orchestrator created"
        );

        Ok(Self {
            engine: config.engine.clone(),
            resolver: Arc::new(resolver),
            pseudonymizer: Arc::new(pseudonymizer),
            risk,
        })
    }

    /// Create an orchestrator over the store described by `config.store`
    pub async fn from_config(config: &VeilConfig) -> Result<Self> {
        let table = config.store.open().await?;
        let fallback = table.protector();
        Self::new(config, Arc::new(table), fallback)
    }

    /// The correspondence store
    pub fn store(&self) -> &Arc<dyn CorrespondenceStore> {
        self.pseudonymizer.store()
    }

    /// The compiled policy set
    pub fn resolver(&self) -> &PolicyResolver {
        &self.resolver
    }

    /// Process one batch
    ///
    /// Never fails as a whole: every problem ends up in the summary. A shutdown
    /// signal stops dispatching new records; records already in flight finish.
    pub async fn process(&self, dataset: Dataset, shutdown: watch::Receiver<bool>) -> BatchOutcome {
        let started = Instant::now();
        let Dataset { schema, records } = dataset;
        let total = records.len();
        let mut summary = BatchSummary::new(total);
        log_batch_start!(summary.batch_id, total, self.engine.workers);

        let plan = match TransformPlan::classify(&schema, &records, &self.resolver) {
            Ok(plan) => plan,
            Err(issues) => {
                tracing::error!(
                    batch_id = %summary.batch_id,
                    unmatched_fields = issues.len(),
                    "Batch classification failed"
                );
                summary.issues.extend(issues);
                summary.abandoned = total;
                return self.abort(summary, Vec::new(), started);
            }
        };
        transition(&mut summary, BatchState::Classified);
        summary.passthrough_fields = plan.passthrough_count();

        let run = self.run_workers(plan, records, shutdown).await;
        summary.cancelled = run.cancelled;
        summary.abandoned = total - run.results.len();
        summary.issues.extend(run.worker_failures);

        let mut output = Vec::with_capacity(run.results.len());
        let mut failed = false;
        for result in run.results {
            summary.fallback_pseudonyms += result.fallback_pseudonyms;
            summary.issues.extend(result.warnings);
            match result.status {
                RecordStatus::Transformed(record) => output.push((result.index, record)),
                RecordStatus::Suppressed => {
                    summary.suppressed += 1;
                    summary.add_issue(BatchIssue::suppressed(
                        result.index,
                        "dropped by record-scope suppress",
                    ));
                }
                RecordStatus::Failed(issue) => {
                    summary.errored += 1;
                    summary.add_issue(issue);
                    failed = true;
                }
            }
        }

        if summary.cancelled {
            tracing::warn!(
                batch_id = %summary.batch_id,
                processed = total - summary.abandoned,
                abandoned = summary.abandoned,
                "Batch cancelled by shutdown signal"
            );
        }

        if failed {
            return self.abort(summary, output, started);
        }
        transition(&mut summary, BatchState::Transformed);

        let records = match &self.risk {
            Some(stage) => {
                let records = self.assess(stage, output, &mut summary);
                transition(&mut summary, BatchState::RiskAssessed);
                records
            }
            None => output.into_iter().map(|(_, record)| record).collect(),
        };

        transition(&mut summary, BatchState::Finalized);
        self.finish(summary, records, started)
    }

    /// Process one batch from synchronous code
    ///
    /// Builds a current-thread runtime for the duration of the call.
    ///
    /// # Errors
    ///
    /// `Validation` when called from inside a tokio runtime, `Io` when the
    /// runtime cannot be built.
    pub fn process_blocking(&self, dataset: Dataset) -> Result<BatchOutcome> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(VeilError::Validation(
                "process_blocking called inside an async runtime; use process".to_string(),
            ));
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(runtime.block_on(self.process(dataset, shutdown_rx)))
    }

    async fn run_workers(
        &self,
        plan: TransformPlan,
        records: Vec<Record>,
        shutdown: watch::Receiver<bool>,
    ) -> WorkerRun {
        let total = records.len();
        let shared = Arc::new(WorkerShared {
            records,
            plan,
            pseudonymizer: Arc::clone(&self.pseudonymizer),
            cursor: AtomicUsize::new(0),
            abort: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            seed: self.engine.perturbation_seed,
            reference_date: self.engine.reference_date(),
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let workers = self.engine.workers.clamp(1, total.max(1));
        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let shared = Arc::clone(&shared);
                let tx = tx.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(worker_loop(worker, shared, tx, shutdown))
            })
            .collect();
        drop(tx);

        let mut completed = Vec::with_capacity(total);
        while let Some(result) = rx.recv().await {
            completed.push(result);
        }

        let worker_failures: Vec<BatchIssue> = join_all(handles)
            .await
            .into_iter()
            .filter_map(|joined| joined.err())
            .map(|e| {
                tracing::error!(error = %e, "Worker task failed");
                BatchIssue::from_error(
                    &VeilError::Validation(format!("worker task failed: {e}")),
                    IssueSeverity::Error,
                )
            })
            .collect();

        let results = if self.engine.stable_ordering {
            let mut slots: Vec<Option<RecordResult>> = (0..total).map(|_| None).collect();
            for result in completed {
                let index = result.index;
                slots[index] = Some(result);
            }
            slots.into_iter().flatten().collect()
        } else {
            completed
        };

        WorkerRun {
            results,
            worker_failures,
            cancelled: shared.cancelled.load(Ordering::Acquire),
        }
    }

    fn assess(
        &self,
        stage: &RiskStage,
        output: Vec<(usize, Record)>,
        summary: &mut BatchSummary,
    ) -> Vec<Record> {
        let (indices, records): (Vec<usize>, Vec<Record>) = output.into_iter().unzip();
        let mut report = stage.evaluator.evaluate(&records);

        summary.generalize_further = report.count(Recommendation::GeneralizeFurther);
        if summary.generalize_further > 0 {
            tracing::warn!(
                batch_id = %summary.batch_id,
                records = summary.generalize_further,
                k_min = report.k_min,
                "Records below k_min need further generalization"
            );
        }

        let mut kept = Vec::with_capacity(records.len());
        for (record, risk) in records.into_iter().zip(&report.records) {
            let input_index = indices[risk.index];
            if stage.apply_suppression && risk.recommendation == Recommendation::Suppress {
                summary.risk_suppressed += 1;
                summary.add_issue(BatchIssue::suppressed(
                    input_index,
                    format!(
                        "equivalence class of {} is below k_min {}",
                        risk.class_size, report.k_min
                    ),
                ));
            } else {
                kept.push(record);
            }
        }

        // report positions refer to the input batch
        for risk in &mut report.records {
            risk.index = indices[risk.index];
        }
        summary.risk_report = Some(report);
        kept
    }

    fn abort(
        &self,
        mut summary: BatchSummary,
        output: Vec<(usize, Record)>,
        started: Instant,
    ) -> BatchOutcome {
        transition(&mut summary, BatchState::Errored);
        let records = match self.engine.on_error {
            OnError::Discard => {
                summary.discarded = output.len();
                Vec::new()
            }
            OnError::ReturnPartial => output.into_iter().map(|(_, record)| record).collect(),
        };
        self.finish(summary, records, started)
    }

    fn finish(&self, summary: BatchSummary, records: Vec<Record>, started: Instant) -> BatchOutcome {
        let mut summary = summary.with_duration(started.elapsed());
        summary.transformed = records.len();
        log_batch_complete!(
            summary.batch_id,
            summary.transformed,
            summary.total - summary.transformed,
            started.elapsed()
        );
        summary.log_summary();
        BatchOutcome { records, summary }
    }
}

/// Move the summary to `next`, falling back to `Errored` on an illegal transition
fn transition(summary: &mut BatchSummary, next: BatchState) {
    if let Err(err) = summary.state.advance(next) {
        tracing::error!(error = %err, "Batch state machine violated");
        summary.add_issue(BatchIssue::from_error(&err, IssueSeverity::Error));
        if !summary.state.is_terminal() {
            summary.state = BatchState::Errored;
        }
    }
}

struct WorkerShared {
    records: Vec<Record>,
    plan: TransformPlan,
    pseudonymizer: Arc<Pseudonymizer>,
    cursor: AtomicUsize,
    abort: AtomicBool,
    cancelled: AtomicBool,
    seed: Option<u64>,
    reference_date: NaiveDate,
}

struct WorkerRun {
    results: Vec<RecordResult>,
    worker_failures: Vec<BatchIssue>,
    cancelled: bool,
}

enum RecordStatus {
    Transformed(Record),
    Suppressed,
    Failed(BatchIssue),
}

struct RecordResult {
    index: usize,
    status: RecordStatus,
    warnings: Vec<BatchIssue>,
    fallback_pseudonyms: usize,
}

async fn worker_loop(
    worker: usize,
    shared: Arc<WorkerShared>,
    tx: mpsc::UnboundedSender<RecordResult>,
    shutdown: watch::Receiver<bool>,
) {
    let mut handled = 0usize;
    loop {
        if shared.abort.load(Ordering::Acquire) {
            break;
        }
        if *shutdown.borrow() {
            shared.cancelled.store(true, Ordering::Release);
            break;
        }

        let index = shared.cursor.fetch_add(1, Ordering::AcqRel);
        let Some(record) = shared.records.get(index) else {
            break;
        };

        let result = transform_record(index, record, &shared).await;
        if matches!(result.status, RecordStatus::Failed(_)) {
            shared.abort.store(true, Ordering::Release);
        }
        handled += 1;
        if tx.send(result).is_err() {
            break;
        }
    }
    tracing::trace!(worker, handled, "Worker finished");
}

async fn transform_record(index: usize, record: &Record, shared: &WorkerShared) -> RecordResult {
    let mut rng = record_rng(shared.seed, index);
    let mut output = Record::new();
    let mut warnings = Vec::new();
    let mut fallback_pseudonyms = 0;

    let finish = |status, warnings, fallback_pseudonyms| RecordResult {
        index,
        status,
        warnings,
        fallback_pseudonyms,
    };

    for (name, value) in record.iter() {
        let field = match shared.plan.require(name) {
            Ok(field) => field,
            Err(err) => {
                let issue = BatchIssue::from_error(&err, IssueSeverity::Error)
                    .at_record(index)
                    .on_field(name);
                return finish(RecordStatus::Failed(issue), warnings, fallback_pseudonyms);
            }
        };

        if field.policy.techniques.is_empty() {
            output.set(name, value.clone());
            continue;
        }

        let mut ctx = OperatorContext {
            field_type: field.field_type,
            reference_date: shared.reference_date,
            rng: &mut rng,
        };

        match apply_chain(&field.policy.techniques, value, &mut ctx, &shared.pseudonymizer).await {
            Ok(chain) => {
                fallback_pseudonyms += chain.fallback_pseudonyms;
                match chain.outcome {
                    FieldOutcome::Value(next) => output.set(name, next),
                    FieldOutcome::DropRecord => {
                        return finish(RecordStatus::Suppressed, warnings, fallback_pseudonyms)
                    }
                }
            }
            Err(err) if field.policy.strict => {
                tracing::error!(
                    record_index = index,
                    field = name,
                    kind = ?err.kind(),
                    error = %err,
                    "Field transformation failed under strict policy"
                );
                let issue = BatchIssue::from_error(&err, IssueSeverity::Error)
                    .at_record(index)
                    .on_field(name);
                return finish(RecordStatus::Failed(issue), warnings, fallback_pseudonyms);
            }
            Err(err) => {
                tracing::warn!(
                    record_index = index,
                    field = name,
                    kind = ?err.kind(),
                    error = %err,
                    "Field transformation failed, passing original through"
                );
                warnings.push(
                    BatchIssue::from_error(&err, IssueSeverity::Warning)
                        .at_record(index)
                        .on_field(name),
                );
                output.set(name, value.clone());
            }
        }
    }

    finish(
        RecordStatus::Transformed(output),
        warnings,
        fallback_pseudonyms,
    )
}
