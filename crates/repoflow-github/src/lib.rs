//! GitHub accessor and adapters for repoflow
//!
//! This crate provides the reqwest-backed [`GitHubClient`] (a
//! [`RemoteAccessor`](repoflow_core::RemoteAccessor)) and the resource
//! adapters that reconcile repository settings through it.
//!
//! # Adapters
//!
//! - [`Environments`] - deployment environments with their branch policies,
//!   variables and custom protection rules
//!
//! # Requirements
//!
//! - `GITHUB_TOKEN` env var with repository administration permission
//! - `GITHUB_API_URL` for GitHub Enterprise Server (optional)
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use repoflow_core::{Engine, Mode, Target};
//! use repoflow_github::{Environments, GitHubClient, GitHubConfig};
//!
//! let client = GitHubClient::new(GitHubConfig::from_env()?)?;
//! let engine = Engine::new(Environments, Arc::new(client), Target::new("octo", "site"))
//!     .with_mode(Mode::DryRun);
//!
//! let report = engine.reconcile(entries).await?;
//! for command in &report.commands {
//!     println!("{}", command);
//! }
//! ```

pub mod client;
pub mod environments;
pub mod error;

pub use client::{DEFAULT_API_URL, GitHubClient, GitHubConfig};
pub use environments::Environments;
pub use error::{GitHubError, Result};
