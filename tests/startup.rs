//! Startup failures are fatal.

mod common;

use common::*;
use edge_router::config::{EntryPointConfig, PingConfig};
use edge_router::lifecycle::StartupError;
use edge_router::LifecycleManager;

#[tokio::test]
async fn port_in_use_aborts_startup() {
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = taken.local_addr().unwrap().to_string();

    let mut config = static_config();
    config
        .entry_points
        .insert("websecure".into(), EntryPointConfig::new(address));

    match LifecycleManager::new(config).start().await {
        Err(StartupError::Bind { entry_point, .. }) => assert_eq!(entry_point, "websecure"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("startup should fail"),
    }
}

#[tokio::test]
async fn unknown_ping_entry_point_is_rejected() {
    let mut config = static_config();
    config.ping = Some(PingConfig {
        entry_point: "missing".into(),
    });
    let result = LifecycleManager::new(config).start().await;
    assert!(matches!(result, Err(StartupError::InvalidConfig(_))));
}

#[tokio::test]
async fn every_entry_point_serves_after_startup() {
    let mut config = static_config();
    config
        .entry_points
        .insert("admin".into(), EntryPointConfig::new("127.0.0.1:0"));
    let proxy = start(config).await;

    for name in ["web", "admin"] {
        let addr = proxy.local_addr(name).unwrap();
        let res = client().get(format!("http://{addr}/")).send().await.unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::NOT_FOUND);
    }

    proxy.shutdown_handle().trigger();
    proxy.stopped().await;
}
