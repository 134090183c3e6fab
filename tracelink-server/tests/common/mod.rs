//! Shared test utilities for tracelink-server integration tests

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracelink_server::{AccessConfig, AppState, ServerConfig, TracelinkServer};

/// Creates a test server with auth disabled, returns state and address
#[allow(dead_code)]
pub async fn create_test_server() -> (Arc<AppState>, SocketAddr) {
    create_test_server_with_access(AccessConfig::default()).await
}

/// Creates a test server with the given auth config
#[allow(dead_code)]
pub async fn create_test_server_with_access(access: AccessConfig) -> (Arc<AppState>, SocketAddr) {
    let state = Arc::new(AppState::with_access(access));
    let server = TracelinkServer::new(ServerConfig::default(), Arc::clone(&state));
    let addr = spawn_server(server).await;

    (state, addr)
}

/// Spawns server in background task, returns bound address
async fn spawn_server(server: TracelinkServer) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = server.run_with_listener(listener).await;
    });

    // Brief delay to ensure server is accepting connections
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    addr
}
