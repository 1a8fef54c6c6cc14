//! Dry-run command model
//!
//! A [`DryRunCommand`] describes one mutating call that a live pass would
//! have made. Creates, updates and deletes all produce the same shape so a
//! caller can render, diff or approve them before anything is touched.

use crate::remote::RequestDescriptor;
use serde::{Deserialize, Serialize};

/// The repository a pass reconciles against
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub owner: String,
    pub repo: String,
}

impl Target {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Severity of a dry-run command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    Info,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// An operation that would be performed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DryRunCommand {
    /// Adapter that produced the command (e.g. "Environments")
    pub component: String,

    pub target: Target,

    /// Request that would be sent; `None` for error reports
    pub request: Option<RequestDescriptor>,

    pub description: String,

    #[serde(default)]
    pub severity: Severity,
}

impl DryRunCommand {
    pub fn new(
        component: impl Into<String>,
        target: Target,
        request: RequestDescriptor,
        description: impl Into<String>,
    ) -> Self {
        Self {
            component: component.into(),
            target,
            request: Some(request),
            description: description.into(),
            severity: Severity::Info,
        }
    }

    pub fn error(component: impl Into<String>, target: Target, description: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            target,
            request: None,
            description: description.into(),
            severity: Severity::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for DryRunCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {} ", self.component, self.target)?;
        if let Some(request) = &self.request {
            write!(f, "{} ", request)?;
        }
        write!(f, "- {}", self.description)
    }
}
