use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing_error_hook::dsn::TransportConfig;
use tracing_error_hook::hook::Hook;
use tracing_error_hook::server::{Lifecycle, ServerConfig};
use tracing_error_hook::severity::Severity;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

#[derive(Clone, Default)]
struct Received {
    events: Arc<Mutex<Vec<(String, HashMap<String, String>, Value)>>>,
}

async fn store(
    State(received): State<Received>,
    Path(project): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> StatusCode {
    received.events.lock().unwrap().push((project, query, body));
    StatusCode::OK
}

async fn collector() -> (Arc<Lifecycle>, SocketAddr, Received) {
    let received = Received::default();
    let router = Router::new()
        .route("/api/:project/store/", post(store))
        .with_state(received.clone());
    let lifecycle = Arc::new(Lifecycle::new(
        router,
        ServerConfig::new(SocketAddr::from(([127, 0, 0, 1], 0))),
    ));
    lifecycle.start();
    let addr = lifecycle.ready().await.expect("collector should bind");
    (lifecycle, addr, received)
}

#[tokio::test]
async fn error_logs_reach_the_store_endpoint() {
    let (collector, addr, received) = collector().await;

    let config = TransportConfig {
        environment: Some("staging".to_string()),
        ..TransportConfig::new(format!("http://public@{}/42", addr))
    };
    let hook = Hook::new(&config, &[Severity::Panic, Severity::Fatal, Severity::Error]).unwrap();
    hook.set_prefix("orders: ");
    hook.add_tag("region", "eu");

    let subscriber = Registry::default().with(hook.clone());
    tracing::subscriber::with_default(subscriber, || {
        tracing::info!("not forwarded");
        tracing::error!(order_id = 7, error = %"connection refused", "db timeout");
    });
    assert!(hook.flush(Duration::from_secs(5)).await);

    let events = received.events.lock().unwrap().clone();
    assert_eq!(events.len(), 1);

    let (project, query, body) = &events[0];
    assert_eq!(project, "42");
    assert_eq!(query.get("sentry_key").map(String::as_str), Some("public"));
    assert_eq!(body["level"], json!("error"));
    assert_eq!(body["message"], json!("orders: db timeout"));
    assert_eq!(body["environment"], json!("staging"));
    assert_eq!(body["tags"], json!({"region": "eu"}));
    assert_eq!(body["extra"]["order_id"], json!(7));
    assert_eq!(body["exception"]["values"][0]["type"], json!("db timeout"));
    assert_eq!(body["exception"]["values"][0]["value"], json!("connection refused"));
    assert_eq!(hook.stats().delivered, 1);

    collector.shutdown_timeout(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn rejected_events_are_counted_as_failed() {
    let (collector, addr, _received) = collector().await;

    // Unknown path on the collector answers 404.
    let hook = Hook::new(&TransportConfig::new(format!("http://public@{}/nested/1", addr)), &[]).unwrap();
    let subscriber = Registry::default().with(hook.clone());
    tracing::subscriber::with_default(subscriber, || {
        tracing::error!("lost");
    });
    assert!(hook.flush(Duration::from_secs(5)).await);

    assert_eq!(hook.stats().failed, 1);
    collector.shutdown_timeout(Duration::from_secs(5)).await.unwrap();
}
