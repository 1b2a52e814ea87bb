// File: protocol_integration_tests.rs
// SPDX-License-Identifier: MIT OR Apache-2.0

use cpdos_probe::attacks::AttackKind;
use cpdos_probe::config::ScanConfig;
use cpdos_probe::driver;
use cpdos_probe::protocol::{self, Verdict};
use cpdos_probe::wire::WireClient;
use serial_test::serial;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config() -> ScanConfig {
    ScanConfig {
        rate_limit: 500,
        connect_timeout: Duration::from_millis(1000),
        read_timeout: Duration::from_millis(2000),
        ..Default::default()
    }
}

#[tokio::test]
#[serial]
async fn test_wire_client_parses_first_chunk() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("hello world")
                .append_header("X-Cache", "MISS from test")
                .append_header("Age", "0")
                .append_header("Cache-Control", "max-age=60"),
        )
        .mount(&mock_server)
        .await;

    let client = WireClient::new(test_config());
    let outcome = client
        .send(&format!("{}/page", mock_server.uri()), &[])
        .await;

    assert_eq!(outcome.status, Some(200));
    assert_eq!(outcome.body_len, Some(11));
    assert_eq!(
        outcome.body_hash.as_deref(),
        Some(format!("{:x}", md5::compute(b"hello world")).as_str())
    );
    assert_eq!(outcome.x_cache.as_deref(), Some("MISS from test"));
    assert_eq!(outcome.age.as_deref(), Some("0"));
    assert_eq!(outcome.cache_control.as_deref(), Some("max-age=60"));
    assert!(!outcome.raw.is_empty());
}

#[tokio::test]
#[serial]
async fn test_wire_failure_is_all_absent() {
    // Port 9 (discard) is not listening; connect is refused immediately.
    let config = ScanConfig {
        connect_timeout: Duration::from_millis(500),
        ..test_config()
    };
    let client = WireClient::new(config);
    let outcome = client.send("http://127.0.0.1:9/", &[]).await;

    assert!(outcome.is_failure());
    assert!(outcome.status.is_none());
    assert!(outcome.body_len.is_none());
    assert!(outcome.body_hash.is_none());
    assert!(outcome.raw.is_empty());
    assert!(outcome.x_cache.is_none());
}

#[tokio::test]
#[serial]
async fn test_validation_unchanged_and_nothing_persisted() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("steady state"))
        .mount(&mock_server)
        .await;

    let output_dir = TempDir::new().unwrap();
    let config = ScanConfig {
        validate: true,
        output_dir: Some(output_dir.path().to_path_buf()),
        ..test_config()
    };

    let client = WireClient::new(config.clone());
    let result = protocol::run_attack(
        &client,
        &format!("{}/res", mock_server.uri()),
        AttackKind::Hmo,
        &config,
    )
    .await
    .unwrap();

    assert_eq!(result.verdict, Verdict::Unchanged);
    assert!(!result.changed());

    // baseline, attack, post
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
    assert!(requests[0].url.query().unwrap().contains("cb="));
    // post-attack must hit the exact cache key the attack used
    assert_eq!(requests[1].url.query(), requests[2].url.query());

    // no success, no files
    assert_eq!(std::fs::read_dir(output_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
#[serial]
async fn test_poisoning_detected_and_persisted() {
    let mock_server = MockServer::start().await;
    // First request sees the healthy origin; everything after is poisoned.
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("legit content"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .with_priority(5)
        .mount(&mock_server)
        .await;

    let output_dir = TempDir::new().unwrap();
    let config = ScanConfig {
        validate: true,
        output_dir: Some(output_dir.path().to_path_buf()),
        ..test_config()
    };

    let client = WireClient::new(config.clone());
    let result = protocol::run_attack(
        &client,
        &format!("{}/res", mock_server.uri()),
        AttackKind::Hmo,
        &config,
    )
    .await
    .unwrap();

    assert_eq!(result.verdict, Verdict::Changed);
    assert_eq!(result.baseline.as_ref().unwrap().status, Some(200));
    assert_eq!(result.attack_outcome.status, Some(500));
    assert_eq!(result.post.as_ref().unwrap().status, Some(500));

    let mut phases: Vec<String> = std::fs::read_dir(output_dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    phases.sort();
    assert_eq!(phases.len(), 3);
    assert!(phases[0].ends_with(".attack.txt"));
    assert!(phases[1].ends_with(".baseline.txt"));
    assert!(phases[2].ends_with(".post.txt"));

    // saved attack bytes are the raw first chunk, status line included
    let attack_file = std::fs::read(output_dir.path().join(&phases[0])).unwrap();
    assert!(attack_file.starts_with(b"HTTP/1.1 500"));
}

#[tokio::test]
#[serial]
async fn test_driver_runs_every_url_attack_pair() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    let urls = vec![
        format!("{}/a", mock_server.uri()),
        format!("{}/b", mock_server.uri()),
    ];
    let attack_ids: Vec<String> = AttackKind::ALL.iter().map(|k| k.id().to_string()).collect();

    let config = ScanConfig {
        workers: 2,
        ..test_config()
    };
    let results = driver::run_scan(urls, attack_ids, config).await.unwrap();

    // 2 URLs x 3 catalog entries
    assert_eq!(results.len(), 6);
}

#[tokio::test]
#[serial]
async fn test_driver_skips_unknown_attack_id_but_continues() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    let urls = vec![
        format!("{}/a", mock_server.uri()),
        format!("{}/b", mock_server.uri()),
    ];
    let attack_ids = vec!["XYZ".to_string(), "HMO".to_string()];

    let results = driver::run_scan(urls, attack_ids, test_config())
        .await
        .unwrap();

    // XYZ is rejected per invocation; HMO still runs for both URLs.
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.attack == AttackKind::Hmo));
}

#[tokio::test]
#[serial]
async fn test_attack_phase_failure_still_attempts_post() {
    // Origin that never listens: every phase fails on the wire, but the
    // protocol still runs baseline, attack and post without erroring out.
    let config = ScanConfig {
        validate: true,
        connect_timeout: Duration::from_millis(300),
        ..test_config()
    };
    let client = WireClient::new(config.clone());
    let result = protocol::run_attack(&client, "http://127.0.0.1:9/x", AttackKind::Hho, &config)
        .await
        .unwrap();

    assert!(result.baseline.as_ref().unwrap().is_failure());
    assert!(result.attack_outcome.is_failure());
    assert!(result.post.as_ref().unwrap().is_failure());
    assert_eq!(result.verdict, Verdict::Indeterminate);
}

#[tokio::test]
#[serial]
async fn test_extension_rewrite_applies_to_phases() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    let config = ScanConfig {
        validate: true,
        baseline_ext: Some("css".to_string()),
        ..test_config()
    };
    let client = WireClient::new(config.clone());
    protocol::run_attack(
        &client,
        &format!("{}/api/data.json", mock_server.uri()),
        AttackKind::Hmo,
        &config,
    )
    .await
    .unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
    for request in &requests {
        assert_eq!(request.url.path(), "/api/data.css");
    }
}
