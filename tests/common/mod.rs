//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use edge_router::config::{DynamicConfig, EntryPointConfig, PingConfig, StaticConfig};
use edge_router::{LifecycleManager, RunningProxy};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Start a mock backend on an ephemeral port. The handler receives the raw
/// request head and returns status and body.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(head) = read_head(&mut socket).await else {
                            return;
                        };
                        let (status, body) = f(head).await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
    addr
}

/// A backend answering 200 with a fixed body.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    start_programmable_backend(move |_| async move { (200, response.to_string()) }).await
}

/// A backend echoing the request head it received.
pub async fn start_echo_backend() -> SocketAddr {
    start_programmable_backend(|head| async move { (200, head) }).await
}

/// A backend answering 200 "slow" after `delay`.
pub async fn start_slow_backend(delay: Duration) -> SocketAddr {
    start_programmable_backend(move |_| async move {
        tokio::time::sleep(delay).await;
        (200, "slow".to_string())
    })
    .await
}

async fn read_head(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Some(String::from_utf8_lossy(&buf).into_owned())
}

/// One entry point `web` on an ephemeral port, with `/ping`.
pub fn static_config() -> StaticConfig {
    let mut config = StaticConfig::default();
    config.entry_points.clear();
    config
        .entry_points
        .insert("web".into(), EntryPointConfig::new("127.0.0.1:0"));
    config.ping = Some(PingConfig {
        entry_point: "web".into(),
    });
    config.lifecycle.grace_timeout_ms = 2_000;
    config.forwarding.response_timeout_ms = 10_000;
    config
}

pub fn dynamic(toml: &str) -> DynamicConfig {
    toml::from_str(toml).unwrap()
}

/// Router `app` sending every path to `backend`. `router` adds keys to the
/// router table, `tables` adds further TOML tables (middlewares).
pub fn route_to(backend: SocketAddr, router: &str, tables: &str) -> DynamicConfig {
    dynamic(&format!(
        r#"
        [routers.app]
        path_prefix = "/"
        service = "backend"
        {router}

        [services.backend.load_balancer]
        servers = [{{ url = "http://{backend}" }}]

        {tables}
        "#
    ))
}

pub async fn start(config: StaticConfig) -> RunningProxy {
    LifecycleManager::new(config).start().await.unwrap()
}

/// No proxy from the environment, no redirect following.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

pub fn url(proxy: &RunningProxy, path: &str) -> String {
    format!("http://{}{}", proxy.local_addr("web").unwrap(), path)
}
