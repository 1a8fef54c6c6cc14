pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// 設定ファイル名 (優先順)
const SETTINGS_FILES: [&str; 3] = ["repoflow.local.yml", "repoflow.yml", ".repoflow.yml"];

/// 対象リポジトリ
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub owner: Option<String>,
    pub name: Option<String>,
}

/// 設定ファイルの内容
///
/// `environments` の各エントリは生の JSON マップのまま保持する。
/// null の除去と正規化はエンジン側で行う。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub repository: Option<RepositoryRef>,

    #[serde(default)]
    pub environments: Vec<Value>,
}

/// repoflowの設定ディレクトリを取得 (存在確認・作成はしない)
pub fn get_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("repoflow"))
        .ok_or(ConfigError::ConfigDirNotFound)
}

/// 設定ファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 REPOFLOW_CONFIG_PATH (直接パス指定)
/// 2. カレントディレクトリ: repoflow.local.yml, repoflow.yml, .repoflow.yml
/// 3. ./.github/ ディレクトリ内: 同様の順序
/// 4. ~/.config/repoflow/repoflow.yml (グローバル設定)
pub fn find_settings_file() -> Result<PathBuf> {
    // 1. 環境変数で直接指定
    if let Ok(config_path) = std::env::var("REPOFLOW_CONFIG_PATH") {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;

    // 2. カレントディレクトリ
    if let Some(path) = find_in(&current_dir) {
        return Ok(path);
    }

    // 3. ./.github/
    let github_dir = current_dir.join(".github");
    if github_dir.is_dir() {
        if let Some(path) = find_in(&github_dir) {
            return Ok(path);
        }
    }

    // 4. グローバル設定
    if let Ok(config_dir) = get_config_dir() {
        let global_config = config_dir.join("repoflow.yml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::SettingsFileNotFound)
}

fn find_in(dir: &Path) -> Option<PathBuf> {
    SETTINGS_FILES
        .iter()
        .map(|filename| dir.join(filename))
        .find(|path| path.exists())
}

/// 設定ファイルを読み込む
pub fn load_settings(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)?;
    parse_settings(&content).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

/// YAML 文字列から設定を読み込む (空のドキュメントは空の設定)
pub fn parse_settings(content: &str) -> std::result::Result<Settings, serde_yaml::Error> {
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(content)
}
