//! File and inline providers driving a running proxy.

mod common;

use std::time::Duration;

use common::*;
use edge_router::config::FileProviderConfig;
use edge_router::RunningProxy;
use reqwest::StatusCode;

async fn wait_for_version(proxy: &RunningProxy, version: u64) {
    let table = proxy.router_table();
    tokio::time::timeout(Duration::from_secs(5), async {
        while table.current().version() < version {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("configuration applied in time");
}

fn file_routes(backend: std::net::SocketAddr, path: &str) -> String {
    format!(
        r#"
        [routers.app]
        path = "{path}"
        service = "backend"

        [services.backend.load_balancer]
        servers = [{{ url = "http://{backend}" }}]
        "#
    )
}

#[tokio::test]
async fn reload_rereads_the_file() {
    let backend = start_mock_backend("from file").await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dynamic.toml");
    std::fs::write(&path, file_routes(backend, "/one")).unwrap();

    let mut config = static_config();
    config.providers.file = Some(FileProviderConfig {
        path: path.clone(),
        watch: false,
    });
    let proxy = start(config).await;
    wait_for_version(&proxy, 1).await;

    let res = client().get(url(&proxy, "/one")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "from file");

    std::fs::write(&path, file_routes(backend, "/two")).unwrap();
    proxy.reload();
    wait_for_version(&proxy, 2).await;

    let res = client().get(url(&proxy, "/one")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let res = client().get(url(&proxy, "/two")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // A broken file keeps the current routes.
    std::fs::write(&path, "[routers.app\n").unwrap();
    proxy.reload();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let res = client().get(url(&proxy, "/two")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(proxy.router_table().current().version(), 2);

    proxy.shutdown_handle().trigger();
    proxy.stopped().await;
}

#[tokio::test]
async fn inline_routes_are_served() {
    let backend = start_mock_backend("inline").await;
    let mut config = static_config();
    config.providers.inline = Some(route_to(backend, "", ""));
    let proxy = start(config).await;
    wait_for_version(&proxy, 1).await;

    let res = client().get(url(&proxy, "/anything")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "inline");

    proxy.shutdown_handle().trigger();
    proxy.stopped().await;
}
