//! Reconciliation engine
//!
//! One pass moves through `Idle -> Fetching -> Diffing -> Executing -> Done`
//! (or `Failed` when the fetch could not complete). Existing state is fetched
//! fresh on every pass; nothing is cached between passes.
//!
//! Operations on distinct top-level resources are dispatched together and
//! joined. Sub-steps inside one operation run in the order the adapter issues
//! them. A failing operation never cancels its siblings.

use crate::action::{ApplyResult, Identity, Operation, OperationKind, Plan, PlanSummary};
use crate::adapter::ResourceAdapter;
use crate::command::{DryRunCommand, Target};
use crate::error::{ReconcileError, Result};
use crate::mutator::Mutator;
use crate::remote::RemoteAccessor;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Whether mutating calls are performed or only described
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Live,
    DryRun,
}

/// Pass state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Fetching,
    Diffing,
    Executing,
    Done,
    Failed,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Fetching => "fetching",
            Phase::Diffing => "diffing",
            Phase::Executing => "executing",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What a finished pass hands back to the caller
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    /// `Done`, or `Failed` when existing state could not be fetched
    pub phase: Phase,

    pub summary: PlanSummary,

    /// Dry-run commands in plan order (empty in live mode)
    pub commands: Vec<DryRunCommand>,

    /// Per-operation outcomes
    pub result: ApplyResult,
}

impl PassReport {
    fn finished(phase: Phase) -> Self {
        Self {
            phase,
            summary: PlanSummary::default(),
            commands: Vec::new(),
            result: ApplyResult::new(),
        }
    }

    /// Any failed operation or error-severity command
    pub fn has_errors(&self) -> bool {
        !self.result.is_success()
            || self.phase == Phase::Failed
            || self.commands.iter().any(DryRunCommand::is_error)
    }
}

/// Strip null fields from each raw entry and normalize it with `adapter`.
///
/// Nulls usually come from overrides that unset a field; dropping them
/// keeps an omitted field from overwriting the remote default. Needs no
/// remote, so settings can be validated offline.
pub fn normalize_entries<A: ResourceAdapter>(
    adapter: &A,
    entries: Vec<Value>,
) -> Result<Vec<A::Desired>> {
    let mut desired: Vec<A::Desired> = Vec::with_capacity(entries.len());

    for (index, entry) in entries.into_iter().enumerate() {
        let Value::Object(mut fields) = entry else {
            return Err(ReconcileError::MalformedEntry(format!(
                "entry #{} is not a mapping",
                index + 1
            )));
        };
        fields.retain(|_, value| !value.is_null());

        let record = adapter.normalize(fields)?;
        if desired.iter().any(|d| d.identity() == record.identity()) {
            return Err(ReconcileError::MalformedEntry(format!(
                "duplicate entry: {}",
                record.identity()
            )));
        }
        desired.push(record);
    }

    Ok(desired)
}

struct OperationOutcome {
    resource: String,
    kind: OperationKind,
    commands: Vec<DryRunCommand>,
    error: Option<String>,
}

/// Drives reconciliation passes for one adapter against one target
pub struct Engine<A: ResourceAdapter> {
    adapter: A,
    remote: Arc<dyn RemoteAccessor>,
    target: Target,
    mode: Mode,
}

impl<A: ResourceAdapter> Engine<A> {
    pub fn new(adapter: A, remote: Arc<dyn RemoteAccessor>, target: Target) -> Self {
        Self {
            adapter,
            remote,
            target,
            mode: Mode::Live,
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    fn is_dry_run(&self) -> bool {
        self.mode == Mode::DryRun
    }

    /// Strip null fields from each raw entry and normalize it.
    pub fn normalize_entries(&self, entries: Vec<Value>) -> Result<Vec<A::Desired>> {
        normalize_entries(&self.adapter, entries)
    }

    pub async fn fetch(&self) -> Result<Vec<A::Existing>> {
        debug!(phase = %Phase::Fetching, component = self.adapter.name());
        self.adapter
            .fetch_existing(self.remote.as_ref(), &self.target)
            .await
    }

    /// Classify every desired entry and every existing record.
    pub fn diff(
        &self,
        existing: Vec<A::Existing>,
        desired: &[A::Desired],
    ) -> Plan<A::Desired, A::Existing> {
        debug!(
            phase = %Phase::Diffing,
            existing = existing.len(),
            desired = desired.len()
        );
        let mut operations = Vec::new();
        let mut unchanged = 0;

        for record in &existing {
            if !desired.iter().any(|d| self.adapter.matches(record, d)) {
                operations.push(Operation::Delete {
                    existing: record.clone(),
                });
            }
        }

        for entry in desired {
            match existing.iter().find(|record| self.adapter.matches(record, entry)) {
                None => operations.push(Operation::Create {
                    desired: entry.clone(),
                }),
                Some(record) => {
                    let changes = self.adapter.detect_changes(record, entry);
                    if changes.any() {
                        debug!(resource = entry.identity(), %changes, "Changes detected");
                        operations.push(Operation::Update {
                            existing: record.clone(),
                            desired: entry.clone(),
                            changes,
                        });
                    } else {
                        unchanged += 1;
                    }
                }
            }
        }

        Plan::new(operations, unchanged)
    }

    /// Fetch existing state and diff it against `desired`.
    pub async fn plan(&self, desired: &[A::Desired]) -> Result<Plan<A::Desired, A::Existing>> {
        let existing = self.fetch().await?;
        Ok(self.diff(existing, desired))
    }

    /// Dispatch every planned operation concurrently and join them.
    pub async fn execute(&self, plan: Plan<A::Desired, A::Existing>) -> PassReport {
        let start = Instant::now();
        let summary = plan.summary();
        debug!(phase = %Phase::Executing, %summary);

        let outcomes = join_all(
            plan.operations
                .into_iter()
                .map(|operation| self.run_operation(operation)),
        )
        .await;

        let mut report = PassReport::finished(Phase::Done);
        report.summary = summary;
        for outcome in outcomes {
            report.commands.extend(outcome.commands);
            match outcome.error {
                None => report.result.add_success(outcome.resource, outcome.kind),
                Some(err) => report
                    .result
                    .add_failure(outcome.resource, outcome.kind, err),
            }
        }
        report.result.duration_ms = start.elapsed().as_millis() as u64;

        report
    }

    /// Run one full pass.
    ///
    /// Only a malformed entry is returned as `Err`; remote failures are folded
    /// into the report (dry-run) or logged (live).
    #[instrument(skip_all, fields(component = self.adapter.name(), repo = %self.target, mode = ?self.mode))]
    pub async fn reconcile(&self, entries: Vec<Value>) -> Result<PassReport> {
        let desired = self.normalize_entries(entries)?;

        let existing = match self.fetch().await {
            Ok(existing) => existing,
            Err(err) => return Ok(self.fetch_failed(err, &desired)),
        };

        let plan = self.diff(existing, &desired);
        let report = self.execute(plan).await;
        info!(
            summary = %report.summary,
            succeeded = report.result.succeeded.len(),
            failed = report.result.failed.len(),
            "Reconciliation pass finished"
        );
        Ok(report)
    }

    fn fetch_failed(&self, err: ReconcileError, desired: &[A::Desired]) -> PassReport {
        // Live passes only skip a missing parent collection; a 404 from any
        // other read is a real failure.
        if self.is_dry_run() && err.is_not_found() {
            debug!("Ignoring 404 during dry-run: {}", err);
            return PassReport::finished(Phase::Done);
        }
        if let ReconcileError::NotProvisioned(_) = err {
            warn!(repo = %self.target, "Nothing to reconcile: {}", err);
            return PassReport::finished(Phase::Done);
        }

        let entries = serde_json::to_string(desired).unwrap_or_default();
        let message = self.failure_message(&err, &entries);
        let mut report = PassReport::finished(Phase::Failed);
        if self.is_dry_run() {
            report.commands.push(DryRunCommand::error(
                self.adapter.name(),
                self.target.clone(),
                message,
            ));
        } else {
            error!(entries = %entries, "{}", message);
        }
        report
    }

    fn failure_message(&self, err: &ReconcileError, entries: &str) -> String {
        let target = serde_json::to_string(&self.target).unwrap_or_else(|_| self.target.to_string());
        format!(
            "error {} in {} for repo: {} entries {}",
            err,
            self.adapter.name(),
            target,
            entries
        )
    }

    async fn run_operation(
        &self,
        operation: Operation<A::Desired, A::Existing>,
    ) -> OperationOutcome {
        let component = self.adapter.name();
        let mut mutator = Mutator::new(
            self.remote.as_ref(),
            component,
            &self.target,
            self.is_dry_run(),
        );

        let outcome = match &operation {
            Operation::Create { desired } => self.adapter.create(desired, &mut mutator).await,
            Operation::Update {
                existing,
                desired,
                changes,
            } => {
                self.adapter
                    .update(existing, desired, changes, &mut mutator)
                    .await
            }
            Operation::Delete { existing } => self.adapter.remove(existing, &mut mutator).await,
        };

        let mut commands = mutator.into_commands();
        let error = match outcome {
            Ok(()) => None,
            Err(err) => {
                let payload = match &operation {
                    Operation::Create { desired } | Operation::Update { desired, .. } => {
                        serde_json::to_string(desired)
                    }
                    Operation::Delete { existing } => serde_json::to_string(existing),
                }
                .unwrap_or_default();
                let message = self.failure_message(&err, &payload);

                if self.is_dry_run() {
                    commands.push(DryRunCommand::error(
                        component,
                        self.target.clone(),
                        message,
                    ));
                } else {
                    error!(
                        resource = operation.identity(),
                        kind = %operation.kind(),
                        "{}",
                        message
                    );
                }
                Some(err.to_string())
            }
        };

        OperationOutcome {
            resource: operation.identity().to_string(),
            kind: operation.kind(),
            commands,
            error,
        }
    }
}
