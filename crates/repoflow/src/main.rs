mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "repoflow")]
#[command(about = "リポジトリ設定を、宣言どおりに。", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 設定ファイルのパス (省略時は自動検出)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// リポジトリのオーナー (設定ファイルの repository.owner より優先)
    #[arg(long, global = true, env = "REPOFLOW_OWNER")]
    owner: Option<String>,

    /// リポジトリ名 (設定ファイルの repository.name より優先)
    #[arg(long, global = true, env = "REPOFLOW_REPO")]
    repo: Option<String>,

    /// デバッグログを表示
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// 変更内容を表示 (リモートは変更しない)
    Plan {
        /// コマンド一覧を JSON で出力
        #[arg(long)]
        json: bool,
    },
    /// 設定をリポジトリに適用
    Sync {
        /// 実際には変更せず、実行される操作のみ表示
        #[arg(long)]
        dry_run: bool,
        /// 結果を JSON で出力
        #[arg(long)]
        json: bool,
    },
    /// 設定ファイルを検証 (ネットワーク不要)
    Validate,
    /// バージョン情報を表示
    Version,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let args = commands::ProjectArgs {
        config: cli.config,
        owner: cli.owner,
        repo: cli.repo,
    };

    match cli.command {
        Commands::Version => {
            println!("repoflow {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Validate => commands::validate::handle(&args),
        Commands::Plan { json } => commands::plan::handle(&args, json).await,
        Commands::Sync { dry_run, json } => commands::sync::handle(&args, dry_run, json).await,
    }
}
