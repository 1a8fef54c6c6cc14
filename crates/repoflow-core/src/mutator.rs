//! The dry-run choke point
//!
//! Adapters issue every mutating call through [`Mutator::request`]. In a
//! live pass the call goes to the remote; in a dry run nothing is sent and
//! exactly one [`DryRunCommand`] is recorded instead.

use crate::command::{DryRunCommand, Target};
use crate::error::Result;
use crate::remote::{Params, RemoteAccessor, Route};
use tracing::debug;

pub struct Mutator<'a> {
    remote: &'a dyn RemoteAccessor,
    component: &'a str,
    target: &'a Target,
    dry_run: bool,
    commands: Vec<DryRunCommand>,
}

impl<'a> Mutator<'a> {
    pub fn new(
        remote: &'a dyn RemoteAccessor,
        component: &'a str,
        target: &'a Target,
        dry_run: bool,
    ) -> Self {
        Self {
            remote,
            component,
            target,
            dry_run,
            commands: Vec::new(),
        }
    }

    pub fn target(&self) -> &Target {
        self.target
    }

    /// Issue a mutating call, or record it when dry-run is active.
    pub async fn request(&mut self, route: &str, params: Params, description: &str) -> Result<()> {
        let request = Route::parse(route)?.expand(&params)?;

        if self.dry_run {
            debug!(component = self.component, %request, "{} (dry-run)", description);
            self.commands.push(DryRunCommand::new(
                self.component,
                self.target.clone(),
                request,
                description,
            ));
            return Ok(());
        }

        debug!(component = self.component, %request, "{}", description);
        self.remote.request(route, &params).await?;
        Ok(())
    }

    pub fn into_commands(self) -> Vec<DryRunCommand> {
        self.commands
    }
}
