//! The HTTP service over a real socket, with a stub engine.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crawl_gateway::config::ConfigManager;
use crawl_gateway::engine::{CrawlEngine, CrawlJob, CrawlResult, EngineFuture, MarkdownResult};
use crawl_gateway::service::{CrawlResponse, CrawlService, Metrics, Server};
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio_test::assert_ok;

/// Echoes the job back as page content.
#[derive(Default)]
struct EchoEngine {
    calls: AtomicUsize,
}

impl CrawlEngine for EchoEngine {
    fn crawl(&self, job: CrawlJob) -> EngineFuture {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            Ok(CrawlResult {
                success: true,
                url: job.url.clone(),
                status_code: Some(200),
                html: Some(format!("<p>{}</p>", job.url)),
                cleaned_html: Some(format!("<p>{}</p>", job.run.cache_mode.as_str())),
                markdown: Some(MarkdownResult {
                    raw_markdown: job.url.clone(),
                    ..MarkdownResult::default()
                }),
                error_message: None,
            })
        })
    }
}

struct Running {
    base: String,
    engine: Arc<EchoEngine>,
    shutdown: oneshot::Sender<()>,
    task: tokio::task::JoinHandle<Result<(), crawl_gateway::error::ServerError>>,
    _dir: TempDir,
}

async fn start(config: &str) -> Running {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, config).unwrap();

    let engine = Arc::new(EchoEngine::default());
    let service = Arc::new(CrawlService::new(
        Arc::new(ConfigManager::new(&path)),
        engine.clone(),
        Arc::new(Metrics::new().unwrap()),
    ));

    let server = Server::bind("127.0.0.1:0", service).await.unwrap();
    let addr = server.local_addr().unwrap();
    let (shutdown, rx) = oneshot::channel();
    let task = tokio::spawn(server.run(async {
        let _ = rx.await;
    }));

    Running {
        base: format!("http://{}", addr),
        engine,
        shutdown,
        task,
        _dir: dir,
    }
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

#[tokio::test]
async fn crawl_round_trip_uses_the_configured_format() {
    let running = start(r#"{"output_format": "cleared_html", "crawler_run_config": {"cache_mode": "BYPASS"}}"#).await;

    let response = client()
        .get(format!("{}/api/crawl", running.base))
        .query(&[("url", "https://example.com/page#frag")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    assert!(response.headers().contains_key("x-request-id"));

    let body: CrawlResponse = response.json().await.unwrap();
    assert!(body.success);
    assert_eq!(body.content.as_deref(), Some("<p>BYPASS</p>"));
    assert_eq!(running.engine.calls.load(Ordering::SeqCst), 1);

    running.shutdown.send(()).unwrap();
    assert_ok!(running.task.await.unwrap());
}

#[tokio::test]
async fn post_normalizes_the_url_before_crawling() {
    let running = start(r#"{"output_format": "markdown"}"#).await;

    let body: CrawlResponse = client()
        .post(format!("{}/api/crawl", running.base))
        .query(&[("url", "https://example.com/a?b=1#c")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body.content.as_deref(), Some("https://example.com/a?b=1"));

    running.shutdown.send(()).unwrap();
    assert_ok!(running.task.await.unwrap());
}

#[tokio::test]
async fn rejected_urls_never_reach_the_engine() {
    let running = start("{}").await;

    let response = client()
        .get(format!("{}/api/crawl", running.base))
        .query(&[("url", "javascript:alert(1)")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Invalid URL format");
    assert_eq!(running.engine.calls.load(Ordering::SeqCst), 0);

    let metrics = client()
        .get(format!("{}/metrics", running.base))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("crawl_requests_total{outcome=\"rejected\"} 1"));

    running.shutdown.send(()).unwrap();
    assert_ok!(running.task.await.unwrap());
}

#[tokio::test]
async fn root_greets_and_preflight_succeeds() {
    let running = start("{}").await;

    let greeting: Value = client()
        .get(format!("{}/", running.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(greeting["message"], "Hello, this is the crawler API!");

    let preflight = client()
        .request(reqwest::Method::OPTIONS, format!("{}/api/crawl", running.base))
        .send()
        .await
        .unwrap();
    assert_eq!(preflight.status(), 204);
    assert_eq!(preflight.headers()["access-control-allow-origin"], "*");

    running.shutdown.send(()).unwrap();
    assert_ok!(running.task.await.unwrap());
}
