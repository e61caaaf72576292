mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use tempfile::TempDir;
use tokio::runtime::Runtime;

use common::{
    find_free_port, gazette_binary, irrelevant_pdf, relevant_pdf, rss_listing,
    spawn_fixture_server_with, wait_for_server, Fixture,
};

/// Fixture server publishing one BOJA bulletin day with two PDFs, one of
/// them relevant. The runtime must outlive every request to the server.
fn spawn_bulletin_server() -> (Runtime, String) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();
    let base = rt.block_on(spawn_fixture_server_with(|base| {
        let urls = vec![format!("{}/boja/1.pdf", base), format!("{}/boja/2.pdf", base)];
        vec![
            (
                "/boja/sumario/20240110.xml".to_string(),
                Fixture::ok("application/rss+xml", rss_listing(&urls)),
            ),
            ("/boja/1.pdf".to_string(), Fixture::pdf(relevant_pdf())),
            ("/boja/2.pdf".to_string(), Fixture::pdf(irrelevant_pdf())),
        ]
    }));
    (rt, base)
}

fn setup_test_env(listing_base: Option<&str>) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let mut config_content = format!(
        r#"[db]
path = "{}/data/gazette.sqlite"

[fetch]
timeout_secs = 5

[server]
bind = "127.0.0.1:7341"
"#,
        root.display()
    );

    if let Some(base) = listing_base {
        config_content.push_str(&format!(
            r#"
[sources.boja]
listing_url = "{}/boja/sumario/{{date}}.xml"

[sources.doe]
listing_url = "{}/doe/{{date}}.xml"
enabled = false
"#,
            base, base
        ));
    }

    let config_path = config_dir.join("gazette.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_gazette(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = gazette_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run gazette binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env(None);

    let (stdout, stderr, success) = run_gazette(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/gazette.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env(None);

    let (_, _, success1) = run_gazette(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_gazette(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_sources() {
    let (_tmp, config_path) = setup_test_env(Some("http://127.0.0.1:9"));

    let (stdout, stderr, success) = run_gazette(&config_path, &["sources"]);
    assert!(success, "sources failed: {}", stderr);

    let line = |tag: &str| {
        stdout
            .lines()
            .find(|l| l.starts_with(tag))
            .unwrap_or_else(|| panic!("no line for {} in:\n{}", tag, stdout))
            .to_string()
    };
    assert!(line("boe ").contains("NOT CONFIGURED"));
    assert!(line("boja ").contains("OK"));
    assert!(line("doe ").contains("DISABLED"));
    assert!(line("boe ").contains("structured"));
}

#[test]
fn test_unknown_source() {
    let (_tmp, config_path) = setup_test_env(None);

    let (_, stderr, success) = run_gazette(&config_path, &["ingest", "dogc", "--date", "20240110"]);
    assert!(!success, "Should fail for unknown source");
    assert!(stderr.contains("unknown source"), "stderr={}", stderr);
}

#[test]
fn test_ingest_without_listing_url_is_config_error() {
    let (_tmp, config_path) = setup_test_env(None);

    let (_, stderr, success) = run_gazette(&config_path, &["ingest", "bocyl", "--date", "20240110"]);
    assert!(!success);
    assert!(stderr.contains("GAZETTE_BOCYL_LISTING_URL"), "stderr={}", stderr);
}

#[test]
fn test_ingest_all_without_sources_fails() {
    let (_tmp, config_path) = setup_test_env(None);

    let (_, stderr, success) = run_gazette(&config_path, &["ingest", "all"]);
    assert!(!success);
    assert!(stderr.contains("No sources configured"), "stderr={}", stderr);
}

#[test]
fn test_ingest_disabled_source_fails() {
    let (_tmp, config_path) = setup_test_env(Some("http://127.0.0.1:9"));

    let (_, stderr, success) = run_gazette(&config_path, &["ingest", "doe", "--date", "20240110"]);
    assert!(!success);
    assert!(stderr.contains("disabled"), "stderr={}", stderr);
}

#[test]
fn test_ingest_invalid_date() {
    let (_tmp, config_path) = setup_test_env(None);

    let (_, stderr, success) = run_gazette(&config_path, &["ingest", "boja", "--date", "2024-13-45"]);
    assert!(!success);
    assert!(stderr.contains("invalid date"), "stderr={}", stderr);
}

#[test]
fn test_ingest_then_duplicate() {
    let (_rt, base) = spawn_bulletin_server();
    let (_tmp, config_path) = setup_test_env(Some(&base));

    run_gazette(&config_path, &["init"]);

    let (stdout, stderr, success) = run_gazette(&config_path, &["ingest", "boja", "--date", "20240110"]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("ingest boja 2024-01-10"));
    assert!(stdout.contains("documents found: 2"));
    assert!(stdout.contains("inserted new: 1"));
    assert!(stdout.contains("skipped by filter: 1"));
    assert!(stdout.contains("errors: 0"));
    assert!(stdout.contains("ok"));

    // Same day again: nothing new
    let (stdout2, _, success2) = run_gazette(&config_path, &["ingest", "boja", "--date", "2024-01-10"]);
    assert!(success2);
    assert!(stdout2.contains("inserted new: 0"));
    assert!(stdout2.contains("duplicates: 1"));
}

#[test]
fn test_ingest_json_summary() {
    let (_rt, base) = spawn_bulletin_server();
    let (_tmp, config_path) = setup_test_env(Some(&base));

    let (stdout, stderr, success) =
        run_gazette(&config_path, &["ingest", "boja", "--date", "20240110", "--json"]);
    assert!(success, "ingest failed: {}", stderr);

    let summary: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(summary["source"], "boja");
    assert_eq!(summary["date"], "2024-01-10");
    assert_eq!(summary["documentsFound"], 2);
    assert_eq!(summary["insertedNew"], 1);
    assert_eq!(summary["skippedByFilter"], 1);
    assert_eq!(summary["totalCandidates"], 2);
}

#[test]
fn test_ingest_all_runs_enabled_sources() {
    let (_rt, base) = spawn_bulletin_server();
    let (_tmp, config_path) = setup_test_env(Some(&base));

    let (stdout, stderr, success) =
        run_gazette(&config_path, &["ingest", "all", "--date", "20240110", "--json"]);
    assert!(success, "ingest all failed: {}", stderr);

    // doe is disabled, so only boja runs
    let summaries: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let summaries = summaries.as_array().unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0]["source"], "boja");
}

#[test]
fn test_missing_bulletin_day_is_empty_run() {
    let (_rt, base) = spawn_bulletin_server();
    let (_tmp, config_path) = setup_test_env(Some(&base));

    let (stdout, stderr, success) = run_gazette(&config_path, &["ingest", "boja", "--date", "20240111"]);
    assert!(success, "ingest failed: {}", stderr);
    assert!(stdout.contains("documents found: 0"));
    assert!(stdout.contains("candidates: 0"));
}

#[test]
fn test_alerts_pending() {
    let (_rt, base) = spawn_bulletin_server();
    let (_tmp, config_path) = setup_test_env(Some(&base));

    let (stdout, _, _) = run_gazette(&config_path, &["alerts", "pending"]);
    assert!(stdout.contains("No pending alerts."));

    run_gazette(&config_path, &["ingest", "boja", "--date", "20240110"]);

    let (stdout, stderr, success) = run_gazette(&config_path, &["alerts", "pending"]);
    assert!(success, "alerts failed: {}", stderr);
    assert!(stdout.contains("source: boja (Andalucía)"));
    assert!(stdout.contains("title: ORDEN de 10 de enero de 2024"));
    assert!(stdout.contains("1 pending alert(s)"));

    let (json_out, _, _) = run_gazette(&config_path, &["alerts", "pending", "--json"]);
    let records: serde_json::Value = serde_json::from_str(&json_out).unwrap();
    assert_eq!(records[0]["summary"], "PENDING_SUMMARY");
    assert_eq!(records[0]["summary_state"], "pending");
}

#[test]
fn test_alerts_pending_limit_out_of_range() {
    let (_tmp, config_path) = setup_test_env(None);

    let (_, stderr, success) = run_gazette(&config_path, &["alerts", "pending", "--limit", "0"]);
    assert!(!success);
    assert!(stderr.contains("limit must be between"));
}

#[test]
fn test_stats() {
    let (_rt, base) = spawn_bulletin_server();
    let (_tmp, config_path) = setup_test_env(Some(&base));

    run_gazette(&config_path, &["ingest", "boja", "--date", "20240110"]);

    let (stdout, stderr, success) = run_gazette(&config_path, &["stats"]);
    assert!(success, "stats failed: {}", stderr);
    assert!(stdout.contains("Alerts:      1"));
    assert!(stdout.contains("Pending:     1"));
    assert!(stdout.contains("By source:"));
    assert!(stdout.contains("2024-01-10 (+1, 0 errors"));
}

// ============ HTTP trigger ============

struct ServerGuard(Child);

impl Drop for ServerGuard {
    fn drop(&mut self) {
        self.0.kill().ok();
        self.0.wait().ok();
    }
}

fn start_server(config_path: &Path, port: u16) -> ServerGuard {
    let content = fs::read_to_string(config_path).unwrap();
    let content = content.replace(
        "bind = \"127.0.0.1:7341\"",
        &format!("bind = \"127.0.0.1:{}\"", port),
    );
    fs::write(config_path, content).unwrap();

    let child = Command::new(gazette_binary())
        .arg("--config")
        .arg(config_path)
        .arg("serve")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    ServerGuard(child)
}

#[test]
fn test_serve_health_and_ingest() {
    let (rt, base) = spawn_bulletin_server();
    let (_tmp, config_path) = setup_test_env(Some(&base));
    let port = find_free_port();
    let _server = start_server(&config_path, port);

    rt.block_on(async {
        wait_for_server(port).await;
        let client = reqwest::Client::new();
        let server = format!("http://127.0.0.1:{}", port);

        let health: serde_json::Value = client
            .get(format!("{}/health", server))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");

        let resp = client
            .post(format!("{}/ingest/boja?date=20240110", server))
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_success());
        let summary: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(summary["insertedNew"], 1);
        assert_eq!(summary["skippedByFilter"], 1);

        let pending: serde_json::Value = client
            .get(format!("{}/alerts/pending?limit=5", server))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(pending["alerts"].as_array().unwrap().len(), 1);

        let unknown = client
            .post(format!("{}/ingest/dogc", server))
            .send()
            .await
            .unwrap();
        assert_eq!(unknown.status().as_u16(), 404);
        let body: serde_json::Value = unknown.json().await.unwrap();
        assert_eq!(body["error"]["code"], "not_found");

        let unconfigured = client
            .post(format!("{}/ingest/bocyl?date=20240110", server))
            .send()
            .await
            .unwrap();
        assert_eq!(unconfigured.status().as_u16(), 400);
        let body: serde_json::Value = unconfigured.json().await.unwrap();
        assert_eq!(body["error"]["code"], "configuration_error");

        let bad_date = client
            .post(format!("{}/ingest/boja?date=tomorrow", server))
            .send()
            .await
            .unwrap();
        assert_eq!(bad_date.status().as_u16(), 400);
    });
}
