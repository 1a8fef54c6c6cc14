use super::{ProjectArgs, load_project};
use colored::Colorize;
use repoflow_github::Environments;

pub fn handle(args: &ProjectArgs) -> anyhow::Result<()> {
    println!("{}", "設定を検証中...".blue());

    let project = load_project(args)?;
    println!(
        "設定ファイル: {}",
        project.settings_path.display().to_string().cyan()
    );

    match repoflow_core::normalize_entries(&Environments, project.settings.environments) {
        Ok(environments) => {
            println!("{}", "✓ 設定ファイルは正常です！".green().bold());
            println!();
            println!("サマリー:");
            if let Some(repository) = &project.settings.repository {
                println!(
                    "  リポジトリ: {}/{}",
                    repository.owner.as_deref().unwrap_or("(未設定)"),
                    repository.name.as_deref().unwrap_or("(未設定)")
                );
            }
            println!("  環境: {}個", environments.len());
            for environment in &environments {
                let branches = match &environment.deployment_branch_policy {
                    None => "全ブランチ".to_string(),
                    Some(policy) if policy.protected_branches => "保護ブランチ".to_string(),
                    Some(policy) => format!(
                        "{}個のブランチポリシー",
                        policy.custom_branch_policies.policies().len()
                    ),
                };
                println!(
                    "    - {} ({}, {}個の変数, {}人のレビュアー)",
                    environment.name.cyan(),
                    branches,
                    environment.variables.len(),
                    environment.reviewers.len()
                );
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", "✗ 設定ファイルにエラーがあります".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
