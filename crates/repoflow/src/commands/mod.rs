pub mod plan;
pub mod sync;
pub mod validate;

use anyhow::Context;
use colored::Colorize;
use repoflow_config::Settings;
use repoflow_core::{DryRunCommand, Engine, Method, Mode, PlanSummary, Severity, Target};
use repoflow_github::{Environments, GitHubClient, GitHubConfig};
use std::path::PathBuf;
use std::sync::Arc;

/// Global flags shared by every command
pub struct ProjectArgs {
    pub config: Option<PathBuf>,
    pub owner: Option<String>,
    pub repo: Option<String>,
}

pub struct Project {
    pub settings_path: PathBuf,
    pub settings: Settings,
}

/// 設定ファイルを探して読み込む
pub fn load_project(args: &ProjectArgs) -> anyhow::Result<Project> {
    let settings_path = match &args.config {
        Some(path) => path.clone(),
        None => repoflow_config::find_settings_file()?,
    };
    tracing::debug!(path = %settings_path.display(), "Loading settings");

    let settings = repoflow_config::load_settings(&settings_path)
        .with_context(|| format!("設定ファイルを読み込めません: {}", settings_path.display()))?;

    Ok(Project {
        settings_path,
        settings,
    })
}

/// 対象リポジトリを決定 (フラグ > 設定ファイル)
pub fn resolve_target(args: &ProjectArgs, settings: &Settings) -> anyhow::Result<Target> {
    let repository = settings.repository.clone().unwrap_or_default();
    let owner = args.owner.clone().or(repository.owner);
    let repo = args.repo.clone().or(repository.name);

    match (owner, repo) {
        (Some(owner), Some(repo)) => Ok(Target::new(owner, repo)),
        _ => anyhow::bail!(
            "対象リポジトリが指定されていません。--owner/--repo か設定ファイルの repository: を指定してください"
        ),
    }
}

/// GitHub に接続するエンジンを作成
pub fn build_engine(target: Target, mode: Mode) -> anyhow::Result<Engine<Environments>> {
    let client = GitHubClient::new(GitHubConfig::from_env()?)?;
    tracing::debug!(api_url = client.api_url(), repo = %target, ?mode, "GitHub client ready");
    Ok(Engine::new(Environments, Arc::new(client), target).with_mode(mode))
}

pub fn print_command(command: &DryRunCommand) {
    let component = format!("[{}]", command.component).dimmed();

    if command.severity == Severity::Error {
        println!("  {} {} {}", "✗".red().bold(), component, command.description.red());
        return;
    }

    match &command.request {
        Some(request) => {
            let method = match request.method {
                Method::Post => request.method.as_str().green(),
                Method::Delete => request.method.as_str().red(),
                Method::Put | Method::Patch => request.method.as_str().yellow(),
                Method::Get => request.method.as_str().normal(),
            };
            println!(
                "  {} {} {} {}",
                component,
                method.bold(),
                request.path.cyan(),
                format!("- {}", command.description).dimmed()
            );
        }
        None => println!("  {} {}", component, command.description),
    }
}

pub fn print_summary(summary: &PlanSummary) {
    println!(
        "{}: {} 作成, {} 更新, {} 削除, {} 変更なし",
        "サマリー".bold(),
        summary.create.to_string().green(),
        summary.update.to_string().yellow(),
        summary.delete.to_string().red(),
        summary.no_change
    );
}
