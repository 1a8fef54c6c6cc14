//! repoflow reconciliation core
//!
//! This crate provides the resource-type-agnostic half of repoflow: given a
//! desired set of entries and the current state fetched from a remote, it
//! computes the create/update/delete operations that converge the two and
//! runs them, or describes them without side effects in dry-run mode.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  repoflow CLI                    │
//! │              (repoflow plan / sync)              │
//! └─────────────────┬───────────────────────────────┘
//!                   │ desired entries
//! ┌─────────────────▼───────────────────────────────┐
//! │                 repoflow-core                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │   Engine: fetch → diff → execute         │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────────────┐     │
//! │  │ ChangeSet    │  │ Mutator (dry-run)    │     │
//! │  └──────────────┘  └──────────────────────┘     │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │ Resource      │ │ Remote        │
//! │ Adapter       │ │ Accessor      │
//! └───────────────┘ └───────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use repoflow_core::{Engine, Mode, Target};
//!
//! let engine = Engine::new(adapter, remote, Target::new("octo", "site"))
//!     .with_mode(Mode::DryRun);
//! let report = engine.reconcile(entries).await?;
//! for command in &report.commands {
//!     println!("{}", command);
//! }
//! ```

pub mod action;
pub mod adapter;
pub mod changes;
pub mod command;
pub mod engine;
pub mod error;
pub mod mutator;
pub mod remote;

// Re-exports
pub use action::{
    ActionResult, ApplyResult, Identity, Operation, OperationKind, Plan, PlanSummary,
};
pub use adapter::ResourceAdapter;
pub use changes::{ChangeSet, ChildStep, diff_children, unordered_eq_by_key};
pub use command::{DryRunCommand, Severity, Target};
pub use engine::{Engine, Mode, PassReport, Phase, normalize_entries};
pub use error::{ReconcileError, Result};
pub use mutator::Mutator;
pub use remote::{
    Method, PAGE_SIZE, Params, RemoteAccessor, RequestDescriptor, Route, paginate, params,
};
