//! Resource adapter trait definition

use crate::action::Identity;
use crate::changes::ChangeSet;
use crate::command::Target;
use crate::error::Result;
use crate::mutator::Mutator;
use crate::remote::{Params, RemoteAccessor};
use async_trait::async_trait;
use serde::Serialize;

/// Resource adapter abstraction trait
///
/// One implementation per resource type (environments, labels, ...). The
/// engine owns matching, classification and concurrency; the adapter owns
/// the resource's shape and the remote calls that change it.
#[async_trait]
pub trait ResourceAdapter: Send + Sync {
    /// Normalized desired entry
    type Desired: Identity + Clone + Serialize + Send + Sync;

    /// Normalized existing record, including remote-assigned ids
    type Existing: Identity + Clone + Serialize + Send + Sync;

    /// Component name reported in dry-run commands (e.g. "Environments")
    fn name(&self) -> &str;

    /// Turn one raw entry (nulls already stripped) into a fully populated
    /// record, lowercasing identities and filling documented defaults.
    ///
    /// Fails with `MalformedEntry` when the identity is missing.
    fn normalize(&self, entry: Params) -> Result<Self::Desired>;

    /// Fetch and normalize the current state.
    ///
    /// A 404 on the parent collection should surface as `NotProvisioned`.
    async fn fetch_existing(
        &self,
        remote: &dyn RemoteAccessor,
        target: &Target,
    ) -> Result<Vec<Self::Existing>>;

    /// Comparator over identity keys only
    fn matches(&self, existing: &Self::Existing, desired: &Self::Desired) -> bool {
        existing.identity() == desired.identity()
    }

    fn detect_changes(&self, existing: &Self::Existing, desired: &Self::Desired) -> ChangeSet;

    async fn create(&self, desired: &Self::Desired, mutator: &mut Mutator<'_>) -> Result<()>;

    async fn update(
        &self,
        existing: &Self::Existing,
        desired: &Self::Desired,
        changes: &ChangeSet,
        mutator: &mut Mutator<'_>,
    ) -> Result<()>;

    async fn remove(&self, existing: &Self::Existing, mutator: &mut Mutator<'_>) -> Result<()>;
}
