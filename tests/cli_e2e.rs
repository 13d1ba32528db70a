//! End-to-end CLI tests for the offline-library binary.

#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::resource_page;
use support::socket_guard::start_mock_server_or_skip;

/// Command isolated from the user's config file and cache.
fn isolated_cmd(tempdir: &TempDir) -> Command {
    let config_home = tempdir.path().join("xdg-config");
    std::fs::create_dir_all(&config_home).unwrap();
    let mut cmd = Command::cargo_bin("offline-library").unwrap();
    cmd.env("XDG_CONFIG_HOME", &config_home)
        .env_remove("RUST_LOG")
        .arg("--cache-dir")
        .arg(tempdir.path().join("cache"));
    cmd
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    let mut cmd = Command::cargo_bin("offline-library").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("download"))
        .stdout(predicate::str::contains("browse"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    let mut cmd = Command::cargo_bin("offline-library").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("offline-library"));
}

/// Test that a subcommand is required.
#[test]
fn test_binary_without_subcommand_fails() {
    let mut cmd = Command::cargo_bin("offline-library").unwrap();
    cmd.assert().failure();
}

#[test]
fn test_list_on_empty_cache_prints_nothing() {
    let tempdir = TempDir::new().unwrap();
    isolated_cmd(&tempdir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_list_json_on_empty_cache_prints_empty_array() {
    let tempdir = TempDir::new().unwrap();
    isolated_cmd(&tempdir)
        .args(["list", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::diff("[]\n"));
}

#[test]
fn test_list_shows_payload_without_metadata() {
    let tempdir = TempDir::new().unwrap();
    let downloads = tempdir.path().join("cache").join("downloads");
    std::fs::create_dir_all(&downloads).unwrap();
    std::fs::write(downloads.join("31.pdf"), b"%PDF").unwrap();

    isolated_cmd(&tempdir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("31.pdf\t4\t"))
        .stdout(predicate::str::contains("(no metadata)"));
}

#[test]
fn test_browse_rejects_two_categories() {
    let tempdir = TempDir::new().unwrap();
    isolated_cmd(&tempdir)
        .args(["browse", "--subject", "1", "--level", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_download_rejects_path_like_id() {
    let tempdir = TempDir::new().unwrap();
    isolated_cmd(&tempdir)
        .args(["download", "../x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid download identifier"));
}

#[test]
fn test_invalid_api_url_is_reported() {
    let tempdir = TempDir::new().unwrap();
    isolated_cmd(&tempdir)
        .args(["--api-url", "ftp://example.org", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ftp://example.org"));
}

#[test]
fn test_delete_missing_file_succeeds() {
    let tempdir = TempDir::new().unwrap();
    isolated_cmd(&tempdir)
        .args(["-q", "delete", "991.pdf"])
        .assert()
        .success();
}

#[tokio::test]
async fn test_browse_prints_ids_and_titles() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/api/resources/en/0"))
        .and(query_param("search", "math"))
        .respond_with(ResponseTemplate::new(200).set_body_json(resource_page(1, 2)))
        .mount(&mock_server)
        .await;

    let tempdir = TempDir::new().unwrap();
    isolated_cmd(&tempdir)
        .args(["-q", "--api-url", &mock_server.uri(), "browse", "-s", "math"])
        .assert()
        .success()
        .stdout(predicate::str::diff("1\tResource 1\n2\tResource 2\n"));
}

#[tokio::test]
async fn test_download_then_list_json() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/api/resource/getFile/991"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Disposition", r#"attachment; filename="notes.pdf""#)
                .set_body_bytes(b"%PDF-1.4".to_vec()),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let tempdir = TempDir::new().unwrap();
    isolated_cmd(&tempdir)
        .args(["-q", "--api-url", &mock_server.uri()])
        .args(["download", "991", "--title", "Notes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("991.pdf"));

    let output = isolated_cmd(&tempdir)
        .args(["list", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let files: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(files[0]["file_name"], "991.pdf");
    assert_eq!(files[0]["title"], "Notes");
    assert_eq!(files[0]["original_name"], "notes.pdf");
    assert_eq!(files[0]["metadata_missing"], false);
}
