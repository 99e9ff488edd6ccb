#![cfg(test)]
use edgerank_common::config::{ColoSet, DownloadConfig};
use edgerank_common::network::result::MAX_DELAY;
use edgerank_core::probe::download::download_probe;
use edgerank_core::probe::{HttpProber, Prober};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crate::stub::{StubResponse, StubServer};

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn http_prober(server: &StubServer) -> HttpProber {
    HttpProber {
        url: server.url("/"),
        port: server.port(),
        attempts: 3,
        timeout: Duration::from_secs(2),
        status_code: 200,
        colo_filter: ColoSet::new(),
    }
}

fn download_config(server: &StubServer, times: u32) -> DownloadConfig {
    DownloadConfig {
        test_ip_num: 1,
        test_times: times,
        timeout: Duration::from_secs(5),
        url: server.url("/file"),
        port: server.port(),
    }
}

/*************************************************************
                        HTTP probe
**************************************************************/

#[tokio::test]
async fn http_probe_times_every_attempt_after_qualifying() {
    let server = StubServer::start(StubResponse::ok().cloudflare_sjc()).await;

    let result = http_prober(&server).probe(LOCALHOST).await;

    assert_eq!(result.sent, 3);
    assert_eq!(result.received, 3);
    assert!(result.delay < MAX_DELAY);
    assert_eq!(result.colo.as_deref(), Some("SJC"));
    assert_eq!(server.hits(), 4, "one qualifying HEAD plus three timed ones");
}

#[tokio::test]
async fn http_probe_aborts_on_unexpected_status() {
    let server = StubServer::start(StubResponse::ok().status(404)).await;

    let result = http_prober(&server).probe(LOCALHOST).await;

    assert_eq!(result.received, 0);
    assert_eq!(result.delay, MAX_DELAY);
    assert_eq!(result.loss_rate(), 1.0);
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn http_probe_accepts_redirect_by_default_and_does_not_follow() {
    let server = StubServer::start(
        StubResponse::ok()
            .status(301)
            .header("location", "http://elsewhere.test/"),
    )
    .await;
    let mut prober = http_prober(&server);
    prober.status_code = 0;

    let result = prober.probe(LOCALHOST).await;

    assert_eq!(result.received, 3);
    assert_eq!(server.hits(), 4);
}

#[tokio::test]
async fn http_probe_honours_configured_status() {
    let server = StubServer::start(StubResponse::ok().status(204)).await;
    let mut prober = http_prober(&server);

    assert_eq!(prober.probe(LOCALHOST).await.received, 0);

    prober.status_code = 204;
    assert_eq!(prober.probe(LOCALHOST).await.received, 3);
}

#[tokio::test]
async fn http_probe_colo_filter() {
    let server = StubServer::start(StubResponse::ok().cloudflare_sjc()).await;
    let mut prober = http_prober(&server);

    prober.colo_filter = "LAX,NRT".parse().unwrap();
    let rejected = prober.probe(LOCALHOST).await;
    assert_eq!(rejected.received, 0);
    assert_eq!(rejected.colo, None);

    prober.colo_filter = "lax,sjc".parse().unwrap();
    let accepted = prober.probe(LOCALHOST).await;
    assert_eq!(accepted.received, 3);
    assert_eq!(accepted.colo.as_deref(), Some("SJC"));
}

#[tokio::test]
async fn http_probe_colo_filter_rejects_unknown_colo() {
    let server = StubServer::start(StubResponse::ok()).await;
    let mut prober = http_prober(&server);
    prober.colo_filter = "SJC".parse().unwrap();

    assert_eq!(prober.probe(LOCALHOST).await.received, 0);
}

/*************************************************************
                       Download probe
**************************************************************/

#[tokio::test]
async fn download_measures_throughput_and_colo() {
    let body = vec![7u8; 256 * 1024];
    let server = StubServer::start(StubResponse::ok().cloudflare_sjc().body(body)).await;

    let outcome = download_probe(LOCALHOST, &download_config(&server, 2)).await;

    assert!(outcome.throughput > 0.0);
    assert_eq!(outcome.colo.as_deref(), Some("SJC"));
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn download_length_mismatch_scores_zero() {
    let body = vec![7u8; 4096];
    let server = StubServer::start(
        StubResponse::ok()
            .cloudflare_sjc()
            .body(body)
            .declared_len(4096 + 100),
    )
    .await;

    let outcome = download_probe(LOCALHOST, &download_config(&server, 1)).await;

    assert_eq!(outcome.throughput, 0.0);
    assert_eq!(outcome.colo, None, "a failed attempt reports no colo");
}

#[tokio::test]
async fn download_requires_200() {
    let server = StubServer::start(StubResponse::ok().status(503).body(vec![1; 512])).await;

    let outcome = download_probe(LOCALHOST, &download_config(&server, 1)).await;

    assert_eq!(outcome.throughput, 0.0);
    assert_eq!(outcome.colo, None);
}

#[tokio::test]
async fn download_gives_up_on_redirect_loops() {
    let server = StubServer::start(
        StubResponse::ok()
            .status(302)
            .header("location", "/file"),
    )
    .await;

    let outcome = download_probe(LOCALHOST, &download_config(&server, 1)).await;

    assert_eq!(outcome.throughput, 0.0);
    assert!(
        (11..=12).contains(&server.hits()),
        "expected the chain to stop after ten redirects, saw {} requests",
        server.hits()
    );
}
