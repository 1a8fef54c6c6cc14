use super::{ProjectArgs, build_engine, load_project, print_command, print_summary, resolve_target};
use colored::Colorize;
use repoflow_core::{Mode, Phase};

pub async fn handle(args: &ProjectArgs, dry_run: bool, json: bool) -> anyhow::Result<()> {
    let project = load_project(args)?;
    let target = resolve_target(args, &project.settings)?;
    let mode = if dry_run { Mode::DryRun } else { Mode::Live };
    let engine = build_engine(target.clone(), mode)?;

    if !json {
        let label = if dry_run { " (dry-run)" } else { "" };
        println!("{}", format!("{} に設定を適用中{}...", target, label).blue());
    }

    let report = engine.reconcile(project.settings.environments).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!();
        for command in &report.commands {
            print_command(command);
        }
        for action in &report.result.succeeded {
            println!("  {} {} {}", "✓".green(), action.kind, action.resource.cyan());
        }
        for action in &report.result.failed {
            println!(
                "  {} {} {}: {}",
                "✗".red().bold(),
                action.kind,
                action.resource.cyan(),
                action.error.as_deref().unwrap_or("unknown error").red()
            );
        }
        println!();
        print_summary(&report.summary);

        if report.phase == Phase::Failed {
            println!("{}", "✗ 既存の設定を取得できませんでした".red().bold());
        } else if report.result.is_success() {
            println!(
                "{} ({} 件成功, {}ms)",
                "✓ 適用が完了しました".green().bold(),
                report.result.succeeded.len(),
                report.result.duration_ms
            );
        } else {
            println!(
                "{}",
                format!(
                    "✗ {} 件成功, {} 件失敗",
                    report.result.succeeded.len(),
                    report.result.failed.len()
                )
                .red()
                .bold()
            );
        }
    }

    if report.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}
