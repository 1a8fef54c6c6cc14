#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! へ移行

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SETTINGS: &str = r#"
repository:
  owner: octo
  name: site

environments:
  - name: Production
    wait_timer: 30
    variables:
      - name: REGION
        value: eu-west-1
"#;

fn write_settings(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("repoflow.yml");
    fs::write(&path, content).unwrap();
    (temp_dir, path)
}

fn repoflow() -> Command {
    let mut cmd = Command::cargo_bin("repoflow").unwrap();
    cmd.env("NO_COLOR", "1")
        .env_remove("REPOFLOW_OWNER")
        .env_remove("REPOFLOW_REPO")
        .env_remove("REPOFLOW_CONFIG_PATH");
    cmd
}

/// 既存環境 staging のみを返す GitHub
async fn github_with_staging() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/site/environments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 1,
            "environments": [{ "name": "staging", "protection_rules": [] }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/site/environments/staging/variables"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "total_count": 0, "variables": [] })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/site/environments/staging/deployment_protection_rules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 0,
            "custom_deployment_protection_rules": []
        })))
        .mount(&server)
        .await;

    server
}

/// CLIヘルプが正しく表示されることを確認
#[test]
fn test_cli_help() {
    repoflow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("sync"))
        .stdout(predicate::str::contains("validate"));
}

/// バージョン表示が正しく動作することを確認
#[test]
fn test_cli_version() {
    repoflow()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("repoflow"));
}

/// 不正なコマンドでエラーになることを確認
#[test]
fn test_invalid_command() {
    repoflow().arg("invalid-command").assert().failure();
}

#[test]
fn test_sync_help_lists_flags() {
    repoflow()
        .args(["sync", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--json"));
}

#[test]
fn test_validate_settings() {
    let (_dir, settings) = write_settings(SETTINGS);

    repoflow()
        .arg("validate")
        .arg("--config")
        .arg(&settings)
        .assert()
        .success()
        .stdout(predicate::str::contains("設定ファイルは正常です"))
        .stdout(predicate::str::contains("production"))
        .stdout(predicate::str::contains("環境: 1個"));
}

#[test]
fn test_validate_rejects_entry_without_name() {
    let (_dir, settings) = write_settings("environments:\n  - wait_timer: 5\n");

    repoflow()
        .arg("validate")
        .arg("--config")
        .arg(&settings)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Malformed entry"));
}

#[test]
fn test_validate_rejects_duplicate_environments() {
    let (_dir, settings) =
        write_settings("environments:\n  - name: prod\n  - name: PROD\n");

    repoflow()
        .arg("validate")
        .arg("--config")
        .arg(&settings)
        .assert()
        .failure()
        .stderr(predicate::str::contains("duplicate entry: prod"));
}

/// プロジェクトディレクトリ外で実行するとエラーになることを確認
#[test]
fn test_validate_without_settings() {
    let temp_dir = tempfile::tempdir().unwrap();

    repoflow()
        .current_dir(temp_dir.path())
        .arg("validate")
        .assert()
        .failure();
}

#[test]
fn test_plan_requires_token() {
    let (_dir, settings) = write_settings(SETTINGS);

    repoflow()
        .env_remove("GITHUB_TOKEN")
        .arg("plan")
        .arg("--config")
        .arg(&settings)
        .assert()
        .failure()
        .stderr(predicate::str::contains("GITHUB_TOKEN"));
}

#[test]
fn test_plan_requires_target() {
    let (_dir, settings) = write_settings("environments: []\n");

    repoflow()
        .env("GITHUB_TOKEN", "test-token")
        .arg("plan")
        .arg("--config")
        .arg(&settings)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--owner/--repo"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_plan_prints_commands_without_mutating() {
    let server = github_with_staging().await;
    let (_dir, settings) = write_settings(SETTINGS);

    repoflow()
        .env("GITHUB_TOKEN", "test-token")
        .env("GITHUB_API_URL", server.uri())
        .arg("plan")
        .arg("--config")
        .arg(&settings)
        .assert()
        .success()
        .stdout(predicate::str::contains("/repos/octo/site/environments/production"))
        .stdout(predicate::str::contains("Update environment settings"))
        .stdout(predicate::str::contains("Create environment variable"))
        .stdout(predicate::str::contains("/repos/octo/site/environments/staging"))
        .stdout(predicate::str::contains("Delete environment"));

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|request| request.method.as_str() == "GET"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_plan_json_output() {
    let server = github_with_staging().await;
    let (_dir, settings) = write_settings(SETTINGS);

    let output = repoflow()
        .env("GITHUB_TOKEN", "test-token")
        .env("GITHUB_API_URL", server.uri())
        .args(["plan", "--json", "--config"])
        .arg(&settings)
        .output()
        .unwrap();
    assert!(output.status.success());

    let commands: Vec<Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(commands.len(), 3);
    assert_eq!(commands[0]["description"], json!("Delete environment"));
    assert_eq!(commands[0]["request"]["method"], json!("DELETE"));
    assert_eq!(commands[1]["request"]["body"]["wait_timer"], json!(30));
    assert!(commands.iter().all(|c| c["severity"] == json!("INFO")));
    assert!(commands.iter().all(|c| c["component"] == json!("Environments")));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_flags_override_repository() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/docs/environments"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })))
        .expect(1)
        .mount(&server)
        .await;
    let (_dir, settings) = write_settings(SETTINGS);

    // 404 はまだ何もない状態として扱われる
    repoflow()
        .env("GITHUB_TOKEN", "test-token")
        .env("GITHUB_API_URL", server.uri())
        .args(["plan", "--owner", "acme", "--repo", "docs", "--config"])
        .arg(&settings)
        .assert()
        .success()
        .stdout(predicate::str::contains("変更はありません"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sync_exits_nonzero_on_failed_operation() {
    let server = github_with_staging().await;
    Mock::given(method("PUT"))
        .and(path("/repos/octo/site/environments/production"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "production" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/octo/site/environments/production/variables"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/repos/octo/site/environments/staging"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "boom" })))
        .mount(&server)
        .await;
    let (_dir, settings) = write_settings(SETTINGS);

    repoflow()
        .env("GITHUB_TOKEN", "test-token")
        .env("GITHUB_API_URL", server.uri())
        .arg("sync")
        .arg("--config")
        .arg(&settings)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("1 件成功, 1 件失敗"))
        .stdout(predicate::str::contains("boom"));
}
