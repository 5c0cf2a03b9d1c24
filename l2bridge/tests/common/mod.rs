//! Shared test utilities for l2bridge integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use l2bridge::endpoint::{InterfaceInfo, InterfaceName, JoinInfo};
use l2bridge::error::Result;
use l2bridge::ipam::IpamPool;
use l2bridge::protocol::Options;
use l2bridge::{AppState, BridgeEngine, Driver, DriverError, ErrorKind, create_router};
use reqwest::{Client, Response as ReqwestResponse};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::subscriber::DefaultGuard;

/// A call received by the recording engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateNetwork {
        network_id: String,
        options: Options,
        ipv4: Vec<IpamPool>,
        ipv6: Vec<IpamPool>,
    },
    DeleteNetwork {
        network_id: String,
    },
    CreateEndpoint {
        network_id: String,
        endpoint_id: String,
        iface: InterfaceInfo,
    },
    DeleteEndpoint {
        network_id: String,
        endpoint_id: String,
    },
    EndpointInfo {
        network_id: String,
        endpoint_id: String,
    },
    Join {
        network_id: String,
        endpoint_id: String,
        sandbox_key: String,
    },
    Leave {
        network_id: String,
        endpoint_id: String,
    },
}

/// Stand-in engine that records every call and can be told to fail.
#[derive(Default)]
pub struct RecordingEngine {
    calls: Mutex<Vec<Call>>,
    failure: Mutex<Option<ErrorKind>>,
    unclassified_failure: Mutex<bool>,
    endpoint_reply: Mutex<Option<InterfaceInfo>>,
}

impl RecordingEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Make every following call fail with an error of `kind`.
    pub fn fail_with(&self, kind: ErrorKind) {
        *self.failure.lock().unwrap() = Some(kind);
    }

    /// Make every following call fail with an unclassified error.
    pub fn fail_unclassified(&self) {
        *self.unclassified_failure.lock().unwrap() = true;
    }

    /// Interface returned by `create_endpoint` instead of echoing the input.
    pub fn reply_with_interface(&self, iface: InterfaceInfo) {
        *self.endpoint_reply.lock().unwrap() = Some(iface);
    }

    fn record(&self, call: Call) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if *self.unclassified_failure.lock().unwrap() {
            return Err(DriverError::unknown(std::io::Error::other(
                "engine exploded",
            )));
        }
        match *self.failure.lock().unwrap() {
            Some(kind) => Err(DriverError::with_kind(kind, format!("engine says {}", kind))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BridgeEngine for RecordingEngine {
    async fn create_network(
        &self,
        network_id: &str,
        options: &Options,
        ipv4: Vec<IpamPool>,
        ipv6: Vec<IpamPool>,
    ) -> Result<()> {
        self.record(Call::CreateNetwork {
            network_id: network_id.to_string(),
            options: options.clone(),
            ipv4,
            ipv6,
        })
    }

    async fn delete_network(&self, network_id: &str) -> Result<()> {
        self.record(Call::DeleteNetwork {
            network_id: network_id.to_string(),
        })
    }

    async fn create_endpoint(
        &self,
        network_id: &str,
        endpoint_id: &str,
        iface: InterfaceInfo,
        _options: &Options,
    ) -> Result<InterfaceInfo> {
        self.record(Call::CreateEndpoint {
            network_id: network_id.to_string(),
            endpoint_id: endpoint_id.to_string(),
            iface: iface.clone(),
        })?;
        Ok(self.endpoint_reply.lock().unwrap().clone().unwrap_or(iface))
    }

    async fn delete_endpoint(&self, network_id: &str, endpoint_id: &str) -> Result<()> {
        self.record(Call::DeleteEndpoint {
            network_id: network_id.to_string(),
            endpoint_id: endpoint_id.to_string(),
        })
    }

    async fn endpoint_info(
        &self,
        network_id: &str,
        endpoint_id: &str,
    ) -> Result<BTreeMap<String, String>> {
        self.record(Call::EndpointInfo {
            network_id: network_id.to_string(),
            endpoint_id: endpoint_id.to_string(),
        })?;
        let mut info = BTreeMap::new();
        info.insert("id".to_string(), endpoint_id.to_string());
        Ok(info)
    }

    async fn join(
        &self,
        network_id: &str,
        endpoint_id: &str,
        sandbox_key: &str,
        _options: &Options,
    ) -> Result<JoinInfo> {
        self.record(Call::Join {
            network_id: network_id.to_string(),
            endpoint_id: endpoint_id.to_string(),
            sandbox_key: sandbox_key.to_string(),
        })?;
        Ok(JoinInfo {
            interface_name: InterfaceName {
                src_name: "veth0".to_string(),
                dst_prefix: "eth".to_string(),
            },
            gateway: Some("10.0.0.1".parse().unwrap()),
            ..Default::default()
        })
    }

    async fn leave(&self, network_id: &str, endpoint_id: &str) -> Result<()> {
        self.record(Call::Leave {
            network_id: network_id.to_string(),
            endpoint_id: endpoint_id.to_string(),
        })
    }
}

/// Driver wired to a fresh recording engine.
pub fn recording_driver() -> (Driver, Arc<RecordingEngine>) {
    let engine = RecordingEngine::new();
    let driver = Driver::new(engine.clone());
    (driver, engine)
}

/// Formatted log output written on the current thread while the guard lives.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LogCapture {
    /// Install a capturing subscriber as the thread default.
    pub fn install() -> (Self, DefaultGuard) {
        let capture = Self::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_target(false)
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || writer.clone())
            .finish();
        (capture, tracing::subscriber::set_default(subscriber))
    }

    /// Lines written since the last call.
    pub fn take(&self) -> Vec<String> {
        let bytes = std::mem::take(&mut *self.0.lock().unwrap());
        String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_string)
            .collect()
    }
}

/// Level token at the start of a formatted line.
pub fn level_of(line: &str) -> &str {
    line.split_whitespace().next().unwrap_or_default()
}

/// Test server wrapper serving the plugin API on a local TCP port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl TestServer {
    /// Spawn a server backed by the given engine.
    pub async fn spawn(engine: Arc<dyn BridgeEngine>) -> Self {
        let router = create_router(Arc::new(AppState {
            driver: Driver::new(engine),
        }));

        // Use port 0 to let OS choose available port
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let listener = TcpListener::bind(&addr).await.expect("Failed to bind");
        let actual_addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .unwrap();
        });

        Self {
            addr: actual_addr,
            client: Client::new(),
            shutdown_tx,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// POST a JSON body to a plugin endpoint.
    pub async fn call<T: Serialize>(&self, path: &str, body: &T) -> ReqwestResponse {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to send request")
    }

    /// POST with an empty body.
    pub async fn call_empty(&self, path: &str) -> ReqwestResponse {
        self.client
            .post(self.url(path))
            .send()
            .await
            .expect("Failed to send request")
    }

    /// POST raw bytes.
    pub async fn call_raw(&self, path: &str, body: &'static str) -> ReqwestResponse {
        self.client
            .post(self.url(path))
            .body(body)
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}
