//! Deployment environments
//!
//! Reconciles a repository's environments together with their three child
//! collections: custom deployment branch policies (ordered, replaced
//! wholesale), variables (keyed by lowercased name) and custom deployment
//! protection rules (keyed by app id).

mod model;

pub use model::{
    BranchPolicy, CustomBranchPolicies, DeploymentBranchPolicy, Environment, ProtectionRule,
    Reviewer, Variable,
};

use async_trait::async_trait;
use futures_util::future::try_join_all;
use model::{ApiBranchPolicy, ApiDeploymentProtectionRule, ApiEnvironment, ApiVariable};
use repoflow_core::{
    ChangeSet, ChildStep, Mutator, Params, ReconcileError, RemoteAccessor, ResourceAdapter,
    Result, Target, diff_children, paginate, params, unordered_eq_by_key,
};
use serde_json::{Value, json};

const LIST_ENVIRONMENTS: &str = "GET /repos/:org/:repo/environments";
const ENVIRONMENT: &str = "/repos/:org/:repo/environments/:environment_name";
const BRANCH_POLICIES: &str =
    "/repos/:org/:repo/environments/:environment_name/deployment-branch-policies";
const VARIABLES: &str = "/repos/:org/:repo/environments/:environment_name/variables";
const PROTECTION_RULES: &str =
    "/repos/:org/:repo/environments/:environment_name/deployment_protection_rules";

/// Fields whose change requires re-sending the environment settings
const SETTINGS_FIELDS: [&str; 4] = [
    "wait_timer",
    "prevent_self_review",
    "reviewers",
    "deployment_branch_policy",
];

/// Adapter for `GET/PUT/DELETE /repos/{owner}/{repo}/environments`
#[derive(Debug, Clone, Copy, Default)]
pub struct Environments;

fn route(method: &str, path: &str) -> String {
    format!("{} {}", method, path)
}

/// Route parameters for one environment, merged with `extra` fields.
fn env_params(target: &Target, environment: &str, extra: Value) -> Params {
    let mut fields = params(json!({
        "org": target.owner,
        "repo": target.repo,
        "environment_name": environment,
    }));
    if let Value::Object(extra) = extra {
        fields.extend(extra);
    }
    fields
}

fn decode<T: serde::de::DeserializeOwned>(values: Vec<Value>) -> Result<Vec<T>> {
    values
        .into_iter()
        .map(|value| serde_json::from_value(value).map_err(ReconcileError::from))
        .collect()
}

/// Three-way comparison of the deployment branch policy.
///
/// Both absent is equal; exactly one absent is a change; otherwise the
/// protected-branches flag and the ordered custom policy names must match.
fn branch_policy_differs(
    existing: Option<&DeploymentBranchPolicy>,
    desired: Option<&DeploymentBranchPolicy>,
) -> bool {
    match (existing, desired) {
        (None, None) => false,
        (Some(_), None) | (None, Some(_)) => true,
        (Some(current), Some(wanted)) => {
            current.protected_branches != wanted.protected_branches
                || current.custom_branch_policies.names() != wanted.custom_branch_policies.names()
        }
    }
}

fn settings_body(environment: &Environment) -> Value {
    let deployment_branch_policy = match &environment.deployment_branch_policy {
        None => Value::Null,
        Some(policy) => json!({
            "protected_branches": policy.protected_branches,
            "custom_branch_policies": policy.custom_branch_policies.is_enabled(),
        }),
    };

    json!({
        "wait_timer": environment.wait_timer,
        "prevent_self_review": environment.prevent_self_review,
        "reviewers": environment.reviewers,
        "deployment_branch_policy": deployment_branch_policy,
    })
}

fn custom_policies(environment: &Environment) -> &[BranchPolicy] {
    environment
        .deployment_branch_policy
        .as_ref()
        .map(|policy| policy.custom_branch_policies.policies())
        .unwrap_or(&[])
}

impl Environments {
    async fn fetch_details(
        &self,
        remote: &dyn RemoteAccessor,
        target: &Target,
        environment: ApiEnvironment,
    ) -> Result<Environment> {
        let name = environment.name.clone();
        let custom_enabled = environment
            .deployment_branch_policy
            .as_ref()
            .is_some_and(|policy| policy.custom_branch_policies);
        let fields = env_params(target, &name, Value::Null);

        let (branch_policies, variables, rules) = futures_util::try_join!(
            self.fetch_branch_policies(remote, &fields, custom_enabled),
            self.fetch_variables(remote, &fields),
            self.fetch_protection_rules(remote, &fields),
        )?;

        Ok(Environment::from_api(
            environment,
            branch_policies,
            variables,
            rules,
        ))
    }

    async fn fetch_branch_policies(
        &self,
        remote: &dyn RemoteAccessor,
        fields: &Params,
        custom_enabled: bool,
    ) -> Result<Option<Vec<ApiBranchPolicy>>> {
        if !custom_enabled {
            return Ok(None);
        }
        let values = paginate(remote, &route("GET", BRANCH_POLICIES), fields, "branch_policies").await?;
        decode(values).map(Some)
    }

    async fn fetch_variables(
        &self,
        remote: &dyn RemoteAccessor,
        fields: &Params,
    ) -> Result<Vec<ApiVariable>> {
        let values = paginate(remote, &route("GET", VARIABLES), fields, "variables").await?;
        decode(values)
    }

    async fn fetch_protection_rules(
        &self,
        remote: &dyn RemoteAccessor,
        fields: &Params,
    ) -> Result<Vec<ApiDeploymentProtectionRule>> {
        let data = remote.request(&route("GET", PROTECTION_RULES), fields).await?;
        match data.get("custom_deployment_protection_rules") {
            Some(Value::Array(values)) => decode(values.clone()),
            _ => Ok(Vec::new()),
        }
    }

    async fn put_settings(&self, environment: &Environment, mutator: &mut Mutator<'_>) -> Result<()> {
        let target = mutator.target().clone();
        mutator
            .request(
                &route("PUT", ENVIRONMENT),
                env_params(&target, &environment.name, settings_body(environment)),
                "Update environment settings",
            )
            .await
    }

    async fn create_branch_policy(
        &self,
        environment: &str,
        policy: &BranchPolicy,
        mutator: &mut Mutator<'_>,
    ) -> Result<()> {
        let target = mutator.target().clone();
        mutator
            .request(
                &route("POST", BRANCH_POLICIES),
                env_params(&target, environment, json!({ "name": policy.name })),
                "Create deployment branch policy",
            )
            .await
    }

    async fn create_variable(
        &self,
        environment: &str,
        variable: &Variable,
        mutator: &mut Mutator<'_>,
    ) -> Result<()> {
        let target = mutator.target().clone();
        mutator
            .request(
                &route("POST", VARIABLES),
                env_params(
                    &target,
                    environment,
                    json!({ "name": variable.name, "value": variable.value }),
                ),
                "Create environment variable",
            )
            .await
    }

    async fn create_protection_rule(
        &self,
        environment: &str,
        rule: &ProtectionRule,
        mutator: &mut Mutator<'_>,
    ) -> Result<()> {
        let target = mutator.target().clone();
        mutator
            .request(
                &route("POST", PROTECTION_RULES),
                env_params(&target, environment, json!({ "integration_id": rule.app_id })),
                "Create deployment protection rule",
            )
            .await
    }

    /// Delete every existing custom policy, then recreate the desired list in order.
    async fn replace_branch_policies(
        &self,
        existing: &Environment,
        desired: &Environment,
        mutator: &mut Mutator<'_>,
    ) -> Result<()> {
        let target = mutator.target().clone();
        for policy in custom_policies(existing) {
            let Some(id) = policy.id else {
                continue;
            };
            mutator
                .request(
                    &route("DELETE", &format!("{}/:branch_policy_id", BRANCH_POLICIES)),
                    env_params(&target, &desired.name, json!({ "branch_policy_id": id })),
                    "Delete deployment branch policy",
                )
                .await?;
        }

        for policy in custom_policies(desired) {
            self.create_branch_policy(&desired.name, policy, mutator).await?;
        }
        Ok(())
    }

    async fn sync_variables(
        &self,
        existing: &Environment,
        desired: &Environment,
        mutator: &mut Mutator<'_>,
    ) -> Result<()> {
        let target = mutator.target().clone();
        let steps = diff_children(
            existing.variables.as_slice(),
            desired.variables.as_slice(),
            |variable| variable.name.clone(),
            |variable| variable.name.clone(),
            |current, wanted| current.value == wanted.value,
        );

        for step in steps {
            match step {
                ChildStep::Create(variable) => {
                    self.create_variable(&desired.name, variable, mutator).await?;
                }
                ChildStep::Update(_, variable) => {
                    mutator
                        .request(
                            &route("PATCH", &format!("{}/:variable_name", VARIABLES)),
                            env_params(
                                &target,
                                &desired.name,
                                json!({
                                    "variable_name": variable.name,
                                    "name": variable.name,
                                    "value": variable.value,
                                }),
                            ),
                            "Update environment variable",
                        )
                        .await?;
                }
                ChildStep::Delete(variable) => {
                    mutator
                        .request(
                            &route("DELETE", &format!("{}/:variable_name", VARIABLES)),
                            env_params(
                                &target,
                                &desired.name,
                                json!({ "variable_name": variable.name }),
                            ),
                            "Delete environment variable",
                        )
                        .await?;
                }
            }
        }
        Ok(())
    }

    async fn sync_protection_rules(
        &self,
        existing: &Environment,
        desired: &Environment,
        mutator: &mut Mutator<'_>,
    ) -> Result<()> {
        let target = mutator.target().clone();
        let steps = diff_children(
            existing.deployment_protection_rules.as_slice(),
            desired.deployment_protection_rules.as_slice(),
            |rule| rule.app_id,
            |rule| rule.app_id,
            |_, _| true,
        );

        for step in steps {
            match step {
                ChildStep::Create(rule) => {
                    self.create_protection_rule(&desired.name, rule, mutator).await?;
                }
                ChildStep::Update(..) => {}
                ChildStep::Delete(rule) => {
                    let Some(id) = rule.id else {
                        continue;
                    };
                    mutator
                        .request(
                            &route("DELETE", &format!("{}/:protection_rule_id", PROTECTION_RULES)),
                            env_params(
                                &target,
                                &desired.name,
                                json!({ "protection_rule_id": id }),
                            ),
                            "Delete deployment protection rule",
                        )
                        .await?;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceAdapter for Environments {
    type Desired = Environment;
    type Existing = Environment;

    fn name(&self) -> &str {
        "Environments"
    }

    fn normalize(&self, entry: Params) -> Result<Environment> {
        Environment::from_entry(entry)
    }

    async fn fetch_existing(
        &self,
        remote: &dyn RemoteAccessor,
        target: &Target,
    ) -> Result<Vec<Environment>> {
        let listed = paginate(
            remote,
            LIST_ENVIRONMENTS,
            &params(json!({ "org": target.owner, "repo": target.repo })),
            "environments",
        )
        .await
        .map_err(|err| {
            if err.is_not_found() {
                ReconcileError::NotProvisioned(format!("environments for {}", target))
            } else {
                err
            }
        })?;

        let environments = decode::<ApiEnvironment>(listed)?;
        tracing::debug!(repo = %target, count = environments.len(), "Fetched environments");

        try_join_all(
            environments
                .into_iter()
                .map(|environment| self.fetch_details(remote, target, environment)),
        )
        .await
    }

    fn detect_changes(&self, existing: &Environment, desired: &Environment) -> ChangeSet {
        let existing_rules: Vec<u64> = existing
            .deployment_protection_rules
            .iter()
            .map(|rule| rule.app_id)
            .collect();
        let desired_rules: Vec<u64> = desired
            .deployment_protection_rules
            .iter()
            .map(|rule| rule.app_id)
            .collect();

        ChangeSet::new()
            .with("wait_timer", existing.wait_timer != desired.wait_timer)
            .with(
                "prevent_self_review",
                existing.prevent_self_review != desired.prevent_self_review,
            )
            .with(
                "reviewers",
                !unordered_eq_by_key(&existing.reviewers, &desired.reviewers, |reviewer| {
                    (reviewer.id, reviewer.kind.clone())
                }),
            )
            .with(
                "deployment_branch_policy",
                branch_policy_differs(
                    existing.deployment_branch_policy.as_ref(),
                    desired.deployment_branch_policy.as_ref(),
                ),
            )
            .with(
                "variables",
                !unordered_eq_by_key(&existing.variables, &desired.variables, |variable| {
                    variable.name.clone()
                }),
            )
            .with(
                "deployment_protection_rules",
                !unordered_eq_by_key(&existing_rules, &desired_rules, |app_id| *app_id),
            )
    }

    async fn create(&self, desired: &Environment, mutator: &mut Mutator<'_>) -> Result<()> {
        tracing::info!("Creating environment: {}", desired.name);
        self.put_settings(desired, mutator).await?;

        for policy in custom_policies(desired) {
            self.create_branch_policy(&desired.name, policy, mutator).await?;
        }
        for variable in &desired.variables {
            self.create_variable(&desired.name, variable, mutator).await?;
        }
        for rule in &desired.deployment_protection_rules {
            self.create_protection_rule(&desired.name, rule, mutator).await?;
        }
        Ok(())
    }

    async fn update(
        &self,
        existing: &Environment,
        desired: &Environment,
        changes: &ChangeSet,
        mutator: &mut Mutator<'_>,
    ) -> Result<()> {
        tracing::info!("Updating environment: {} ({})", desired.name, changes);

        if SETTINGS_FIELDS.iter().any(|field| changes.changed(field)) {
            self.put_settings(desired, mutator).await?;
        }

        let custom_enabled = desired
            .deployment_branch_policy
            .as_ref()
            .is_some_and(|policy| policy.custom_branch_policies.is_enabled());
        if changes.changed("deployment_branch_policy") && custom_enabled {
            self.replace_branch_policies(existing, desired, mutator).await?;
        }

        if changes.changed("variables") {
            self.sync_variables(existing, desired, mutator).await?;
        }
        if changes.changed("deployment_protection_rules") {
            self.sync_protection_rules(existing, desired, mutator).await?;
        }
        Ok(())
    }

    async fn remove(&self, existing: &Environment, mutator: &mut Mutator<'_>) -> Result<()> {
        tracing::info!("Deleting environment: {}", existing.name);
        let target = mutator.target().clone();
        mutator
            .request(
                &route("DELETE", ENVIRONMENT),
                env_params(&target, &existing.name, Value::Null),
                "Delete environment",
            )
            .await
    }
}
