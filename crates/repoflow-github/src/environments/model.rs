//! Environment records
//!
//! Desired entries and existing environments are normalized into the same
//! [`Environment`] shape. Every optional field is filled with its default
//! here, so change detection never sees a half-populated record.

use repoflow_core::{Identity, Params, ReconcileError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A deployment reviewer (user or team)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reviewer {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: String,
}

/// An environment variable; names are lowercased
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(deserialize_with = "scalar_string")]
    pub value: String,
}

/// A custom deployment protection rule, keyed by the app that provides it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionRule {
    pub app_id: u64,
    /// Assigned by GitHub once the rule exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

/// A custom deployment branch policy (a branch name pattern)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchPolicy {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

impl BranchPolicy {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
        }
    }
}

/// `custom_branch_policies` is either a flag or a list of patterns.
///
/// `false` disables custom policies; `true` or a list enables them. An
/// enabled list is ordered and is replaced wholesale when it differs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "RawCustomPolicies", into = "RawCustomPolicies")]
pub enum CustomBranchPolicies {
    #[default]
    Disabled,
    Enabled(Vec<BranchPolicy>),
}

impl CustomBranchPolicies {
    pub fn is_enabled(&self) -> bool {
        matches!(self, CustomBranchPolicies::Enabled(_))
    }

    pub fn policies(&self) -> &[BranchPolicy] {
        match self {
            CustomBranchPolicies::Disabled => &[],
            CustomBranchPolicies::Enabled(policies) => policies,
        }
    }

    /// Pattern names in order, or `None` when disabled
    pub fn names(&self) -> Option<Vec<&str>> {
        match self {
            CustomBranchPolicies::Disabled => None,
            CustomBranchPolicies::Enabled(policies) => {
                Some(policies.iter().map(|p| p.name.as_str()).collect())
            }
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawCustomPolicies {
    Flag(bool),
    List(Vec<RawBranchPolicy>),
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawBranchPolicy {
    Name(String),
    Named {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
    },
}

impl From<RawCustomPolicies> for CustomBranchPolicies {
    fn from(raw: RawCustomPolicies) -> Self {
        match raw {
            RawCustomPolicies::Flag(false) => CustomBranchPolicies::Disabled,
            RawCustomPolicies::Flag(true) => CustomBranchPolicies::Enabled(Vec::new()),
            RawCustomPolicies::List(list) => CustomBranchPolicies::Enabled(
                list.into_iter()
                    .map(|policy| match policy {
                        RawBranchPolicy::Name(name) => BranchPolicy::named(name),
                        RawBranchPolicy::Named { name, id } => BranchPolicy { name, id },
                    })
                    .collect(),
            ),
        }
    }
}

impl From<CustomBranchPolicies> for RawCustomPolicies {
    fn from(policies: CustomBranchPolicies) -> Self {
        match policies {
            CustomBranchPolicies::Disabled => RawCustomPolicies::Flag(false),
            CustomBranchPolicies::Enabled(list) => RawCustomPolicies::List(
                list.into_iter()
                    .map(|policy| match policy.id {
                        None => RawBranchPolicy::Name(policy.name),
                        Some(id) => RawBranchPolicy::Named {
                            name: policy.name,
                            id: Some(id),
                        },
                    })
                    .collect(),
            ),
        }
    }
}

/// Which branches may deploy to the environment
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeploymentBranchPolicy {
    #[serde(default)]
    pub protected_branches: bool,
    #[serde(default)]
    pub custom_branch_policies: CustomBranchPolicies,
}

/// Normalized deployment environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Environment {
    pub name: String,
    pub wait_timer: u64,
    pub prevent_self_review: bool,
    pub reviewers: Vec<Reviewer>,
    /// `None` means any branch may deploy
    pub deployment_branch_policy: Option<DeploymentBranchPolicy>,
    pub variables: Vec<Variable>,
    pub deployment_protection_rules: Vec<ProtectionRule>,
}

impl Identity for Environment {
    fn identity(&self) -> &str {
        &self.name
    }
}

/// Raw desired entry as written in the settings file
#[derive(Debug, Deserialize)]
struct EnvironmentEntry {
    name: Option<String>,
    wait_timer: Option<u64>,
    prevent_self_review: Option<bool>,
    reviewers: Option<Vec<Reviewer>>,
    deployment_branch_policy: Option<DeploymentBranchPolicy>,
    variables: Option<Vec<Variable>>,
    deployment_protection_rules: Option<Vec<ProtectionRule>>,
}

impl Environment {
    /// Build a fully populated record from a raw settings entry.
    pub fn from_entry(entry: Params) -> Result<Self> {
        let raw: EnvironmentEntry = serde_json::from_value(Value::Object(entry))
            .map_err(|e| ReconcileError::MalformedEntry(format!("environment: {}", e)))?;

        let name = raw
            .name
            .map(|name| name.trim().to_lowercase())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                ReconcileError::MalformedEntry("environment entry without a name".to_string())
            })?;

        let variables = raw
            .variables
            .unwrap_or_default()
            .into_iter()
            .map(|variable| Variable {
                name: variable.name.to_lowercase(),
                value: variable.value,
            })
            .collect();

        Ok(Self {
            name,
            wait_timer: raw.wait_timer.unwrap_or(0),
            prevent_self_review: raw.prevent_self_review.unwrap_or(false),
            reviewers: raw.reviewers.unwrap_or_default(),
            deployment_branch_policy: raw.deployment_branch_policy,
            variables,
            deployment_protection_rules: raw.deployment_protection_rules.unwrap_or_default(),
        })
    }

    pub(crate) fn from_api(
        environment: ApiEnvironment,
        branch_policies: Option<Vec<ApiBranchPolicy>>,
        variables: Vec<ApiVariable>,
        rules: Vec<ApiDeploymentProtectionRule>,
    ) -> Self {
        let wait_timer = environment
            .protection_rules
            .iter()
            .find(|rule| rule.kind == "wait_timer")
            .and_then(|rule| rule.wait_timer)
            .unwrap_or(0);

        let required_reviewers = environment
            .protection_rules
            .iter()
            .find(|rule| rule.kind == "required_reviewers");
        let prevent_self_review = required_reviewers
            .and_then(|rule| rule.prevent_self_review)
            .unwrap_or(false);
        let reviewers = required_reviewers
            .map(|rule| {
                rule.reviewers
                    .iter()
                    .map(|reviewer| Reviewer {
                        id: reviewer.reviewer.id,
                        kind: reviewer.kind.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let deployment_branch_policy =
            environment
                .deployment_branch_policy
                .map(|settings| DeploymentBranchPolicy {
                    protected_branches: settings.protected_branches,
                    custom_branch_policies: if settings.custom_branch_policies {
                        CustomBranchPolicies::Enabled(
                            branch_policies
                                .unwrap_or_default()
                                .into_iter()
                                .map(|policy| BranchPolicy {
                                    name: policy.name,
                                    id: Some(policy.id),
                                })
                                .collect(),
                        )
                    } else {
                        CustomBranchPolicies::Disabled
                    },
                });

        Self {
            name: environment.name.to_lowercase(),
            wait_timer,
            prevent_self_review,
            reviewers,
            deployment_branch_policy,
            variables: variables
                .into_iter()
                .map(|variable| Variable {
                    name: variable.name.to_lowercase(),
                    value: variable.value,
                })
                .collect(),
            deployment_protection_rules: rules
                .into_iter()
                .map(|rule| ProtectionRule {
                    app_id: rule.app.id,
                    id: Some(rule.id),
                })
                .collect(),
        }
    }
}

/// Accept any YAML scalar for variable values; GitHub stores them as text.
fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a scalar value, got {}",
            other
        ))),
    }
}

// ============ API Types ============

#[derive(Debug, Deserialize)]
pub(crate) struct ApiEnvironment {
    pub name: String,
    #[serde(default)]
    pub protection_rules: Vec<ApiProtectionRule>,
    #[serde(default)]
    pub deployment_branch_policy: Option<ApiBranchPolicySettings>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiProtectionRule {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub wait_timer: Option<u64>,
    #[serde(default)]
    pub prevent_self_review: Option<bool>,
    #[serde(default)]
    pub reviewers: Vec<ApiReviewer>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiReviewer {
    #[serde(rename = "type")]
    pub kind: String,
    pub reviewer: ApiAccount,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiAccount {
    pub id: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiBranchPolicySettings {
    #[serde(default)]
    pub protected_branches: bool,
    #[serde(default)]
    pub custom_branch_policies: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiBranchPolicy {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiVariable {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiDeploymentProtectionRule {
    pub id: u64,
    pub app: ApiAccount,
}
