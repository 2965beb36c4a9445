/// HTTP tests against a live listener on an ephemeral port.
///
/// The dashboard is backed by the in-memory store, seeded relative to the
/// current time so the default lookback windows include the samples.
use std::sync::Arc;
use std::thread;

use chrono::{Duration, Utc};
use chrono_tz::America::New_York;

use sys_monitor::config::MonitorConfig;
use sys_monitor::dashboard::Dashboard;
use sys_monitor::facts::{FactError, FactSample, QueryWindow};
use sys_monitor::store::{FactStore, MemoryStore};
use sys_monitor::web;

struct DownStore;

impl FactStore for DownStore {
    fn fetch(&self, _window: &QueryWindow) -> Result<Vec<FactSample>, FactError> {
        Err(FactError::StoreUnavailable("connection refused".into()))
    }
}

struct BrokenStore;

impl FactStore for BrokenStore {
    fn fetch(&self, _window: &QueryWindow) -> Result<Vec<FactSample>, FactError> {
        panic!("row decoder bug")
    }
}

/// Start a server on `127.0.0.1:0` and return its base URL. The worker
/// threads are left running for the life of the test process.
fn start(store: impl FactStore + 'static) -> String {
    let dashboard = Dashboard::new(store, &MonitorConfig::default()).unwrap();
    let server = web::bind("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    thread::spawn(move || web::run(server, Arc::new(dashboard), 2));
    format!("http://{addr}")
}

fn seeded() -> MemoryStore {
    let now = Utc::now();
    MemoryStore::new(New_York)
        .with_fact(now - Duration::minutes(90), "cpu_temp_f", 118.0)
        .with_fact(now - Duration::minutes(3), "cpu_temp_f", 121.5)
        .with_fact(now - Duration::minutes(8), "memory_use_pct", 0.42)
        .with_fact(now - Duration::hours(2), "moomoo_queue_new", 7.0)
}

#[test]
fn latest_json_reports_recent_facts() {
    let base = start(seeded());
    let response = ureq::get(&format!("{base}/latest.json")).call().unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.content_type().starts_with("application/json"));

    let body: serde_json::Value = response.into_json().unwrap();
    assert_eq!(body["cpu_temp_f"]["fact_value"], 121.5);
    assert!(body["cpu_temp_f"]["ts"].is_string());
    assert_eq!(body["memory_use_pct"]["fact_value"], 0.42);
    // two hours old, outside the 60 minute window
    assert!(body.get("moomoo_queue_new").is_none());
}

#[test]
fn index_serves_charts() {
    let base = start(seeded());
    let response = ureq::get(&format!("{base}/")).call().unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.content_type().starts_with("text/html"));

    let html = response.into_string().unwrap();
    assert_eq!(html.matches("<svg").count(), 3);
    assert!(html.contains("cpu_temp_f"));
    assert!(html.contains("moomoo_queue_new"));
}

#[test]
fn store_outage_is_503_for_json_but_page_stays_up() {
    let base = start(DownStore);

    match ureq::get(&format!("{base}/latest.json")).call() {
        Err(ureq::Error::Status(code, response)) => {
            assert_eq!(code, 503);
            let body: serde_json::Value = response.into_json().unwrap();
            assert!(body["error"].as_str().unwrap().contains("unavailable"));
        }
        other => panic!("expected 503, got {other:?}"),
    }

    let page = ureq::get(&format!("{base}/")).call().unwrap();
    assert_eq!(page.status(), 200);
    assert!(page.into_string().unwrap().contains(r#"class="error""#));
}

#[test]
fn health_and_not_found() {
    let base = start(MemoryStore::new(New_York));

    let health: serde_json::Value = ureq::get(&format!("{base}/health"))
        .call()
        .unwrap()
        .into_json()
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["panels"], 3);

    match ureq::get(&format!("{base}/metrics")).call() {
        Err(ureq::Error::Status(code, _)) => assert_eq!(code, 404),
        other => panic!("expected 404, got {other:?}"),
    }
}

#[test]
fn handler_panics_do_not_exhaust_workers() {
    let base = start(BrokenStore);

    // more panicking requests than there are workers
    for _ in 0..5 {
        match ureq::get(&format!("{base}/latest.json")).call() {
            Err(ureq::Error::Status(code, _)) => assert_eq!(code, 500),
            other => panic!("expected 500, got {other:?}"),
        }
    }

    let health = ureq::get(&format!("{base}/health")).call().unwrap();
    assert_eq!(health.status(), 200);
}

#[test]
fn concurrent_requests_are_served() {
    let base = Arc::new(start(seeded()));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let base = Arc::clone(&base);
            thread::spawn(move || {
                ureq::get(&format!("{base}/latest.json"))
                    .call()
                    .map(|r| r.status())
                    .map_err(|e| e.to_string())
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), 200);
    }
}
