#![cfg(test)]
use edgerank_common::config::{Config, TestMode};
use edgerank_common::network::result::ResultSet;
use edgerank_core::hosts::HostsFile;
use edgerank_core::progress::{Phase, Progress, ProgressEvent};
use edgerank_core::runner;
use edgerank_core::store::ClassificationStore;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use crate::stub::{StubResponse, StubServer};

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// A config that keeps every file inside `dir` and probes `127.0.0.0/30` on the stub's
/// port. Only 127.0.0.1 answers.
fn config(dir: &TempDir, server: &StubServer) -> Config {
    let mut cfg = Config::default();
    cfg.output_file = dir.path().join("results.csv");
    cfg.cidr_ipv4_file = dir.path().join("ip.txt");
    cfg.allow_ipv4_file = dir.path().join("allow.rb");
    cfg.deny_ipv4_file = dir.path().join("deny.rb");
    cfg.test_ip_num = 10;
    cfg.enable_download_test = false;

    cfg.tcp.port = server.port();
    cfg.tcp.connect_times = 2;
    cfg.tcp.connect_timeout = Duration::from_millis(300);
    cfg.tcp.routines = 4;

    cfg.http.url = server.url("/");
    cfg.http.port = server.port();
    cfg.http.connect_times = 2;
    cfg.http.connect_timeout = Duration::from_millis(500);

    cfg.download.url = server.url("/file");
    cfg.download.port = server.port();
    cfg.download.test_ip_num = 2;
    cfg.download.timeout = Duration::from_secs(5);

    fs::write(&cfg.cidr_ipv4_file, "# loopback\n127.0.0.0/30\n").unwrap();
    cfg
}

fn seeded() -> StdRng {
    StdRng::seed_from_u64(42)
}

/*************************************************************
                         TCP mode
**************************************************************/

#[tokio::test]
async fn tcp_run_ranks_the_live_address_first() {
    let dir = TempDir::new().unwrap();
    let server = StubServer::start(StubResponse::ok()).await;
    let cfg = config(&dir, &server);

    let results = runner::run(&cfg, seeded(), None).await.unwrap();

    assert_eq!(results.len(), 4);
    assert_eq!(results[0].addr, LOCALHOST);
    assert_eq!(results[0].received, 2);
    assert!(results[1..].iter().all(|r| !r.is_reachable()));

    let saved = ResultSet::load(&cfg.output_file).unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].addr, LOCALHOST);
}

#[tokio::test]
async fn classification_steers_the_next_run() {
    let dir = TempDir::new().unwrap();
    let server = StubServer::start(StubResponse::ok()).await;
    let cfg = config(&dir, &server);

    runner::run(&cfg, seeded(), None).await.unwrap();

    let store = ClassificationStore::load(&cfg.allow_ipv4_file, &cfg.deny_ipv4_file);
    assert!(store.allow.contains_addr(Ipv4Addr::LOCALHOST));
    assert_eq!(store.allow.len(), 1);
    assert_eq!(store.deny.len(), 3);

    // Denied addresses drop out; the allowed one is walked, re-sampled and already
    // covers the carried-over prior result.
    let second = runner::run(&cfg, seeded(), None).await.unwrap();
    assert_eq!(second.len(), 2);
    assert!(second.iter().all(|r| r.addr == LOCALHOST));
}

#[tokio::test]
async fn progress_reports_every_candidate() {
    let dir = TempDir::new().unwrap();
    let server = StubServer::start(StubResponse::ok()).await;
    let cfg = config(&dir, &server);

    let events: Arc<Mutex<Vec<ProgressEvent>>> = Arc::default();
    let progress: Progress = {
        let events = events.clone();
        Arc::new(move |event: ProgressEvent| events.lock().unwrap().push(event))
    };

    runner::run(&cfg, seeded(), Some(progress)).await.unwrap();

    let events = events.lock().unwrap();
    assert_eq!(
        events.first(),
        Some(&ProgressEvent::Started {
            phase: Phase::Latency,
            total: 4
        })
    );
    let advanced = events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::Advanced { .. }))
        .count();
    assert_eq!(advanced, 4);
    assert_eq!(
        events.last(),
        Some(&ProgressEvent::Finished {
            phase: Phase::Latency
        })
    );
}

/*************************************************************
                    HTTP mode + download
**************************************************************/

#[tokio::test]
async fn http_run_with_download_fills_throughput_and_colo() {
    let dir = TempDir::new().unwrap();
    let server = StubServer::start(StubResponse::ok().cloudflare_sjc().body(vec![3u8; 128 * 1024])).await;
    let mut cfg = config(&dir, &server);
    cfg.test_mode = TestMode::Http;
    cfg.enable_download_test = true;

    let results = runner::run(&cfg, seeded(), None).await.unwrap();

    assert_eq!(results[0].addr, LOCALHOST);
    assert!(results[0].throughput > 0.0);
    assert_eq!(results[0].colo.as_deref(), Some("SJC"));

    let saved = ResultSet::load(&cfg.output_file).unwrap();
    assert_eq!(saved.len(), 1);
    assert!(saved[0].throughput > 0.0);
    assert_eq!(saved[0].colo.as_deref(), Some("SJC"));
}

#[tokio::test]
async fn prior_throughput_carries_into_a_run_without_download() {
    let dir = TempDir::new().unwrap();
    let server = StubServer::start(StubResponse::ok().body(vec![3u8; 128 * 1024])).await;
    let mut cfg = config(&dir, &server);
    cfg.enable_download_test = true;

    runner::run(&cfg, seeded(), None).await.unwrap();
    let first = ResultSet::load(&cfg.output_file).unwrap();
    assert!(first[0].throughput > 0.0);

    cfg.enable_download_test = false;
    let second = runner::run(&cfg, seeded(), None).await.unwrap();

    assert_eq!(second[0].addr, LOCALHOST);
    assert_eq!(second[0].throughput, first[0].throughput);
}

#[tokio::test]
async fn download_without_url_is_skipped() {
    let dir = TempDir::new().unwrap();
    let server = StubServer::start(StubResponse::ok().body(vec![3u8; 1024])).await;
    let mut cfg = config(&dir, &server);
    cfg.enable_download_test = true;
    cfg.download.url.clear();

    let results = runner::run(&cfg, seeded(), None).await.unwrap();

    assert!(results.iter().all(|r| r.throughput == 0.0));
}

/*************************************************************
                      Hosts rewrite
**************************************************************/

#[tokio::test]
async fn best_address_is_pinned_in_hosts_file() {
    let dir = TempDir::new().unwrap();
    let server = StubServer::start(StubResponse::ok()).await;
    let mut cfg = config(&dir, &server);
    cfg.web_hosts = vec!["CDN.Example".to_string()];

    let hosts_path = dir.path().join("hosts");
    fs::write(&hosts_path, "# static\n203.0.113.9 cdn.example\n198.51.100.1 other.example\n").unwrap();

    let results = runner::run(&cfg, seeded(), None).await.unwrap();
    runner::pin_best(&results, &cfg.web_hosts, &HostsFile::new(&hosts_path)).unwrap();

    let text = fs::read_to_string(&hosts_path).unwrap();
    assert_eq!(text, "# static\n127.0.0.1 cdn.example\n198.51.100.1 other.example\n");
}
