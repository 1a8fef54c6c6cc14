use super::{ProjectArgs, build_engine, load_project, print_command, print_summary, resolve_target};
use colored::Colorize;
use repoflow_core::Mode;

pub async fn handle(args: &ProjectArgs, json: bool) -> anyhow::Result<()> {
    let project = load_project(args)?;
    let target = resolve_target(args, &project.settings)?;
    let engine = build_engine(target.clone(), Mode::DryRun)?;

    if !json {
        println!("{}", format!("{} の変更内容を確認中...", target).blue());
    }

    let report = engine.reconcile(project.settings.environments).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report.commands)?);
    } else {
        println!();
        if report.commands.is_empty() {
            println!("{}", "✓ 変更はありません".green().bold());
        } else {
            for command in &report.commands {
                print_command(command);
            }
        }
        println!();
        print_summary(&report.summary);
    }

    if report.has_errors() {
        anyhow::bail!("変更内容の取得中にエラーが発生しました");
    }
    Ok(())
}
