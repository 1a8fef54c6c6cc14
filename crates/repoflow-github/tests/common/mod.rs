//! In-memory GitHub environments API used by the integration tests.
//!
//! Dispatches on the route template the adapter sends, keeps per-environment
//! state the way the REST API reports it and records every mutating call.

#![allow(dead_code)]

use async_trait::async_trait;
use repoflow_core::{
    Method, Params, ReconcileError, RemoteAccessor, RequestDescriptor, Result, Route,
};
use serde_json::{Value, json};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// One environment as the fake stores it
#[derive(Debug, Clone, Default)]
pub struct FakeEnvironment {
    pub name: String,
    pub wait_timer: u64,
    pub prevent_self_review: bool,
    /// `(type, id)` pairs
    pub reviewers: Vec<(String, u64)>,
    /// `(protected_branches, custom_branch_policies)`
    pub branch_policy: Option<(bool, bool)>,
    /// `(id, name)` in creation order
    pub branch_policies: Vec<(u64, String)>,
    /// Stored upper-cased, as GitHub does
    pub variables: Vec<(String, String)>,
    /// `(id, app_id)`
    pub rules: Vec<(u64, u64)>,
}

impl FakeEnvironment {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn variable(mut self, name: &str, value: &str) -> Self {
        self.variables.push((name.to_uppercase(), value.to_string()));
        self
    }

    pub fn custom_policies(mut self, policies: &[(u64, &str)]) -> Self {
        self.branch_policy = Some((false, true));
        self.branch_policies = policies
            .iter()
            .map(|(id, name)| (*id, name.to_string()))
            .collect();
        self
    }

    pub fn rule(mut self, id: u64, app_id: u64) -> Self {
        self.rules.push((id, app_id));
        self
    }

    fn to_api(&self) -> Value {
        let mut protection_rules = Vec::new();
        if self.wait_timer > 0 {
            protection_rules.push(json!({
                "id": 1,
                "type": "wait_timer",
                "wait_timer": self.wait_timer,
            }));
        }
        if !self.reviewers.is_empty() || self.prevent_self_review {
            let reviewers: Vec<Value> = self
                .reviewers
                .iter()
                .map(|(kind, id)| json!({ "type": kind, "reviewer": { "id": id } }))
                .collect();
            protection_rules.push(json!({
                "id": 2,
                "type": "required_reviewers",
                "prevent_self_review": self.prevent_self_review,
                "reviewers": reviewers,
            }));
        }

        let deployment_branch_policy = match self.branch_policy {
            None => Value::Null,
            Some((protected, custom)) => json!({
                "protected_branches": protected,
                "custom_branch_policies": custom,
            }),
        };

        json!({
            "name": self.name,
            "protection_rules": protection_rules,
            "deployment_branch_policy": deployment_branch_policy,
        })
    }
}

#[derive(Default)]
pub struct FakeGitHub {
    environments: Mutex<Vec<FakeEnvironment>>,
    calls: Mutex<Vec<RequestDescriptor>>,
    reads: Mutex<Vec<RequestDescriptor>>,
    next_id: AtomicU64,
    list_status: Option<u16>,
    read_failure: Option<(String, u16)>,
    reject_path: Option<String>,
}

impl FakeGitHub {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1000),
            ..Default::default()
        }
    }

    pub fn with(environments: Vec<FakeEnvironment>) -> Self {
        let fake = Self::new();
        *fake.environments.lock().unwrap() = environments;
        fake
    }

    /// Answer the environment list endpoint with `status`
    pub fn with_list_status(mut self, status: u16) -> Self {
        self.list_status = Some(status);
        self
    }

    /// Answer reads whose path ends with `suffix` with `status`
    pub fn failing_read(mut self, suffix: &str, status: u16) -> Self {
        self.read_failure = Some((suffix.to_string(), status));
        self
    }

    /// Reject mutating calls whose path contains `fragment`
    pub fn rejecting(mut self, fragment: &str) -> Self {
        self.reject_path = Some(fragment.to_string());
        self
    }

    /// Mutating calls received so far
    pub fn calls(&self) -> Vec<RequestDescriptor> {
        self.calls.lock().unwrap().clone()
    }

    /// Mutating calls rendered as `"METHOD path"`
    pub fn call_lines(&self) -> Vec<String> {
        self.calls().iter().map(ToString::to_string).collect()
    }

    pub fn reads(&self) -> Vec<RequestDescriptor> {
        self.reads.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
        self.reads.lock().unwrap().clear();
    }

    pub fn environment(&self, name: &str) -> Option<FakeEnvironment> {
        self.environments
            .lock()
            .unwrap()
            .iter()
            .find(|env| env.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn with_env<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut FakeEnvironment) -> T,
    ) -> Result<T> {
        let mut environments = self.environments.lock().unwrap();
        let env = environments
            .iter_mut()
            .find(|env| env.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| ReconcileError::remote(Some(404), "Not Found"))?;
        Ok(f(env))
    }

    fn read(&self, route: &str, params: &Params) -> Result<Value> {
        let name = str_param(params, "environment_name");
        let listed: (&str, Vec<Value>) = match route {
            "GET /repos/:org/:repo/environments" => {
                if let Some(status) = self.list_status {
                    return Err(ReconcileError::remote(Some(status), "list failed"));
                }
                let environments: Vec<Value> = self
                    .environments
                    .lock()
                    .unwrap()
                    .iter()
                    .map(FakeEnvironment::to_api)
                    .collect();
                ("environments", environments)
            }
            "GET /repos/:org/:repo/environments/:environment_name/deployment-branch-policies" => (
                "branch_policies",
                self.with_env(&name, |env| {
                    env.branch_policies
                        .iter()
                        .map(|(id, name)| json!({ "id": id, "name": name }))
                        .collect()
                })?,
            ),
            "GET /repos/:org/:repo/environments/:environment_name/variables" => (
                "variables",
                self.with_env(&name, |env| {
                    env.variables
                        .iter()
                        .map(|(name, value)| json!({ "name": name, "value": value }))
                        .collect()
                })?,
            ),
            "GET /repos/:org/:repo/environments/:environment_name/deployment_protection_rules" => {
                let rules: Vec<Value> = self.with_env(&name, |env| {
                    env.rules
                        .iter()
                        .map(|(id, app_id)| json!({ "id": id, "enabled": true, "app": { "id": app_id } }))
                        .collect()
                })?;
                return Ok(json!({
                    "total_count": rules.len(),
                    "custom_deployment_protection_rules": rules,
                }));
            }
            other => return Err(ReconcileError::InvalidRoute(other.to_string())),
        };

        let (key, items) = listed;
        let per_page = params.get("per_page").and_then(Value::as_u64).unwrap_or(30) as usize;
        let page = params.get("page").and_then(Value::as_u64).unwrap_or(1) as usize;
        let slice: Vec<Value> = items
            .iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .cloned()
            .collect();

        let mut body = Params::new();
        body.insert("total_count".to_string(), json!(items.len()));
        body.insert(key.to_string(), Value::Array(slice));
        Ok(Value::Object(body))
    }

    fn write(&self, route: &str, params: &Params) -> Result<Value> {
        let name = str_param(params, "environment_name");
        match route {
            "PUT /repos/:org/:repo/environments/:environment_name" => {
                let mut environments = self.environments.lock().unwrap();
                let position = environments
                    .iter()
                    .position(|env| env.name.eq_ignore_ascii_case(&name));
                let env = match position {
                    Some(idx) => &mut environments[idx],
                    None => {
                        environments.push(FakeEnvironment::new(&name));
                        environments.last_mut().unwrap()
                    }
                };

                env.wait_timer = params["wait_timer"].as_u64().unwrap_or(0);
                env.prevent_self_review = params["prevent_self_review"].as_bool().unwrap_or(false);
                env.reviewers = params["reviewers"]
                    .as_array()
                    .map(|reviewers| {
                        reviewers
                            .iter()
                            .map(|r| (r["type"].as_str().unwrap().to_string(), r["id"].as_u64().unwrap()))
                            .collect()
                    })
                    .unwrap_or_default();
                env.branch_policy = params["deployment_branch_policy"].as_object().map(|policy| {
                    (
                        policy["protected_branches"].as_bool().unwrap(),
                        policy["custom_branch_policies"].as_bool().unwrap(),
                    )
                });
                if !matches!(env.branch_policy, Some((_, true))) {
                    env.branch_policies.clear();
                }
                Ok(env.to_api())
            }
            "DELETE /repos/:org/:repo/environments/:environment_name" => {
                let mut environments = self.environments.lock().unwrap();
                let before = environments.len();
                environments.retain(|env| !env.name.eq_ignore_ascii_case(&name));
                if environments.len() == before {
                    return Err(ReconcileError::remote(Some(404), "Not Found"));
                }
                Ok(Value::Null)
            }
            "POST /repos/:org/:repo/environments/:environment_name/deployment-branch-policies" => {
                let id = self.next_id();
                let policy = str_param(params, "name");
                self.with_env(&name, |env| env.branch_policies.push((id, policy.clone())))?;
                Ok(json!({ "id": id, "name": policy }))
            }
            "DELETE /repos/:org/:repo/environments/:environment_name/deployment-branch-policies/:branch_policy_id" => {
                let id = params["branch_policy_id"].as_u64().unwrap();
                self.with_env(&name, |env| env.branch_policies.retain(|(existing, _)| *existing != id))?;
                Ok(Value::Null)
            }
            "POST /repos/:org/:repo/environments/:environment_name/variables" => {
                let variable = str_param(params, "name").to_uppercase();
                let value = str_param(params, "value");
                self.with_env(&name, |env| env.variables.push((variable, value)))?;
                Ok(json!({}))
            }
            "PATCH /repos/:org/:repo/environments/:environment_name/variables/:variable_name" => {
                let variable = str_param(params, "variable_name");
                let value = str_param(params, "value");
                self.with_env(&name, |env| {
                    for (existing, current) in env.variables.iter_mut() {
                        if existing.eq_ignore_ascii_case(&variable) {
                            *current = value.clone();
                        }
                    }
                })?;
                Ok(Value::Null)
            }
            "DELETE /repos/:org/:repo/environments/:environment_name/variables/:variable_name" => {
                let variable = str_param(params, "variable_name");
                self.with_env(&name, |env| {
                    env.variables
                        .retain(|(existing, _)| !existing.eq_ignore_ascii_case(&variable))
                })?;
                Ok(Value::Null)
            }
            "POST /repos/:org/:repo/environments/:environment_name/deployment_protection_rules" => {
                let id = self.next_id();
                let app_id = params["integration_id"].as_u64().unwrap();
                self.with_env(&name, |env| env.rules.push((id, app_id)))?;
                Ok(json!({ "id": id, "app": { "id": app_id } }))
            }
            "DELETE /repos/:org/:repo/environments/:environment_name/deployment_protection_rules/:protection_rule_id" => {
                let id = params["protection_rule_id"].as_u64().unwrap();
                self.with_env(&name, |env| env.rules.retain(|(existing, _)| *existing != id))?;
                Ok(Value::Null)
            }
            other => Err(ReconcileError::InvalidRoute(other.to_string())),
        }
    }
}

#[async_trait]
impl RemoteAccessor for FakeGitHub {
    async fn request(&self, route: &str, params: &Params) -> Result<Value> {
        let request = Route::parse(route)?.expand(params)?;

        if request.method == Method::Get {
            if let Some((suffix, status)) = &self.read_failure {
                if request.path.ends_with(suffix.as_str()) {
                    return Err(ReconcileError::remote(Some(*status), "Not Found"));
                }
            }
            self.reads.lock().unwrap().push(request);
            return self.read(route, params);
        }

        self.calls.lock().unwrap().push(request.clone());
        if let Some(fragment) = &self.reject_path {
            if request.path.contains(fragment.as_str()) {
                return Err(ReconcileError::remote(Some(422), "Validation Failed"));
            }
        }
        self.write(route, params)
    }
}

fn str_param(params: &Params, key: &str) -> String {
    match params.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}
