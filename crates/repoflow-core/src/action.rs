//! Operation and plan types for a reconciliation pass

use crate::changes::ChangeSet;
use serde::{Deserialize, Serialize};

/// A record with a case-normalized identity key
pub trait Identity {
    fn identity(&self) -> &str;
}

/// Represents one planned operation against a top-level resource
#[derive(Debug, Clone)]
pub enum Operation<D, E> {
    /// Desired entry with no existing counterpart
    Create { desired: D },
    /// Matched pair whose tracked fields differ
    Update {
        existing: E,
        desired: D,
        changes: ChangeSet,
    },
    /// Existing record nobody asked for anymore
    Delete { existing: E },
}

impl<D: Identity, E: Identity> Operation<D, E> {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Create { .. } => OperationKind::Create,
            Operation::Update { .. } => OperationKind::Update,
            Operation::Delete { .. } => OperationKind::Delete,
        }
    }

    /// Identity of the resource this operation touches
    pub fn identity(&self) -> &str {
        match self {
            Operation::Create { desired } | Operation::Update { desired, .. } => {
                desired.identity()
            }
            Operation::Delete { existing } => existing.identity(),
        }
    }
}

/// Type of operation to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Create => write!(f, "create"),
            OperationKind::Update => write!(f, "update"),
            OperationKind::Delete => write!(f, "delete"),
        }
    }
}

/// Result of executing a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyResult {
    /// Operations that settled successfully
    pub succeeded: Vec<ActionResult>,

    /// Operations that failed
    pub failed: Vec<ActionResult>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ApplyResult {
    pub fn new() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn add_success(&mut self, resource: String, kind: OperationKind) {
        self.succeeded.push(ActionResult {
            resource,
            kind,
            success: true,
            error: None,
        });
    }

    pub fn add_failure(&mut self, resource: String, kind: OperationKind, error: String) {
        self.failed.push(ActionResult {
            resource,
            kind,
            success: false,
            error: Some(error),
        });
    }
}

impl Default for ApplyResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a single operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    /// Identity of the resource
    pub resource: String,

    pub kind: OperationKind,

    pub success: bool,

    /// Error message if failed
    pub error: Option<String>,
}

/// Plan containing all operations for one pass
#[derive(Debug, Clone)]
pub struct Plan<D, E> {
    /// Deletes first (existing order), then creates/updates (desired order)
    pub operations: Vec<Operation<D, E>>,

    /// Desired entries that matched an existing record with no changes
    pub unchanged: usize,
}

impl<D: Identity, E: Identity> Plan<D, E> {
    pub fn new(operations: Vec<Operation<D, E>>, unchanged: usize) -> Self {
        Self {
            operations,
            unchanged,
        }
    }

    /// Get operations by kind
    pub fn operations_by_kind(&self, kind: OperationKind) -> Vec<&Operation<D, E>> {
        self.operations
            .iter()
            .filter(|op| op.kind() == kind)
            .collect()
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.operations_by_kind(OperationKind::Create).len(),
            update: self.operations_by_kind(OperationKind::Update).len(),
            delete: self.operations_by_kind(OperationKind::Delete).len(),
            no_change: self.unchanged,
        }
    }
}

/// Summary of planned operations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl PlanSummary {
    pub fn total_operations(&self) -> usize {
        self.create + self.update + self.delete
    }
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to delete, {} unchanged",
            self.create, self.update, self.delete, self.no_change
        )
    }
}
