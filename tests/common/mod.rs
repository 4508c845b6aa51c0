//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sws::bridge::Broker;
use sws::config::ServerConfig;
use sws::lifecycle::{start_server, start_worker, RunningServer, RunningWorker, Shutdown};
use sws::plugins::Catalog;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Server content root and plugin directory, removed on drop.
pub struct Sandbox {
    pub root: TempDir,
    pub plugins: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
            plugins: tempfile::tempdir().unwrap(),
        }
    }

    /// Drop a package manifest for `kind` into the plugin directory.
    pub fn install(&self, file: &str, kind: &str) {
        std::fs::write(self.plugins.path().join(file), format!("kind = \"{kind}\"\n")).unwrap();
    }

    pub fn config(&self) -> ServerConfig {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "127.0.0.1:0".to_string();
        config.routing.root_directory = self.root.path().to_path_buf();
        config.routing.plugin_directory = self.plugins.path().to_path_buf();
        config
    }
}

pub async fn spawn_server(
    config: ServerConfig,
    broker: Option<Broker>,
    shutdown: &Shutdown,
) -> RunningServer {
    start_server(config, Arc::new(Catalog::builtin()), broker, shutdown.clone())
        .await
        .unwrap()
}

pub async fn spawn_worker(config: ServerConfig, broker: Broker, shutdown: &Shutdown) -> RunningWorker {
    start_worker(config, Arc::new(Catalog::builtin()), Some(broker), shutdown.clone())
        .await
        .unwrap()
}

/// A parsed raw HTTP response.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Send raw bytes on a fresh connection and read until the server closes it.
/// Returns the bytes received; empty means the server closed without replying.
pub async fn exchange(addr: SocketAddr, request: &str) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    // A dropped connection may already be closed by the time we write.
    let _ = stream.write_all(request.as_bytes()).await;
    let mut buf = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf))
        .await
        .expect("server did not close the connection");
    match read {
        Ok(_) => buf,
        // Reset by peer counts as a silent drop.
        Err(_) => Vec::new(),
    }
}

pub fn parse_response(raw: &[u8]) -> RawResponse {
    let text = String::from_utf8_lossy(raw);
    let (head, body) = text.split_once("\r\n\r\n").expect("incomplete response");
    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap();
    let status = status_line.split(' ').nth(1).unwrap().parse().unwrap();
    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    RawResponse {
        status,
        headers,
        body: body.to_string(),
    }
}

/// Send one request with an optional body and parse the reply.
pub async fn request(addr: SocketAddr, method: &str, path: &str, body: &str) -> RawResponse {
    let raw = format!(
        "{method} {path} HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    parse_response(&exchange(addr, &raw).await)
}

pub async fn get(addr: SocketAddr, path: &str) -> RawResponse {
    request(addr, "GET", path, "").await
}

/// Poll `check` until it holds or the deadline passes.
pub async fn eventually<F>(mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    check()
}

pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}
