//! Node supervisor
//!
//! Keeps the local engine and the remote node fleet running the current
//! configuration. Per-node state machine:
//! `disconnected -> connecting -> connected -> (broken -> connecting) -> disconnected`.
//!
//! The node table follows mutate-then-publish: sweeps build a replacement
//! map and swap it in, readers never lock.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use log::{error, info, warn};
use tokio::sync::Notify;

use crate::core::CoreRegistry;
use crate::error::NodeError;
use crate::settings::Settings;

const HEALTH_RPC_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Disconnected,
    Connecting,
    Connected,
    Broken,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: u64,
    pub name: String,
    pub enabled: bool,
    pub status: NodeStatus,
}

impl Node {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Node {
            id,
            name: name.into(),
            enabled: true,
            status: NodeStatus::Disconnected,
        }
    }
}

/// Transport to a remote node. The gRPC/REST client of the control plane
/// implements this; tests use an in-memory double.
pub trait NodeRpc: Send + Sync {
    fn connect(&self, id: u64, config: &str) -> impl Future<Output = Result<(), NodeError>> + Send;
    fn restart(&self, id: u64, config: &str) -> impl Future<Output = Result<(), NodeError>> + Send;
    fn disconnect(&self, id: u64) -> impl Future<Output = Result<(), NodeError>> + Send;
    /// Lightweight health probe.
    fn get_sys_stats(&self, id: u64) -> impl Future<Output = Result<(), NodeError>> + Send;
}

/// The engine process running next to the control plane.
pub trait LocalEngine: Send + Sync {
    fn started(&self) -> impl Future<Output = bool> + Send;
    fn restart(&self, config: &str) -> impl Future<Output = Result<(), NodeError>> + Send;
    fn stop(&self) -> impl Future<Output = ()> + Send;
}

pub struct NodeSupervisor<R, E> {
    rpc: R,
    engine: E,
    registry: Arc<CoreRegistry>,
    core_name: String,
    nodes: ArcSwap<HashMap<u64, Node>>,
    shutdown: Notify,
}

impl<R: NodeRpc, E: LocalEngine> NodeSupervisor<R, E> {
    pub fn new(rpc: R, engine: E, registry: Arc<CoreRegistry>, core_name: &str) -> Self {
        NodeSupervisor {
            rpc,
            engine,
            registry,
            core_name: core_name.to_string(),
            nodes: ArcSwap::new(Arc::new(HashMap::new())),
            shutdown: Notify::new(),
        }
    }

    pub fn nodes(&self) -> Arc<HashMap<u64, Node>> {
        self.nodes.load_full()
    }

    fn publish(&self, nodes: HashMap<u64, Node>) {
        self.nodes.store(Arc::new(nodes));
    }

    fn set_status(&self, id: u64, status: NodeStatus) {
        let mut nodes = (*self.nodes.load_full()).clone();
        if let Some(node) = nodes.get_mut(&id) {
            node.status = status;
        }
        self.publish(nodes);
    }

    fn render_config(&self) -> Option<String> {
        self.registry
            .snapshot()
            .get(&self.core_name)
            .map(|c| c.render_json())
    }

    /// Load the enabled node set and dispatch initial connects. Failures are
    /// logged; the health loop retries them.
    pub async fn startup(&self, nodes: Vec<Node>) {
        let table: HashMap<u64, Node> = nodes
            .into_iter()
            .filter(|n| n.enabled)
            .map(|mut n| {
                n.status = NodeStatus::Connecting;
                (n.id, n)
            })
            .collect();
        let ids: Vec<u64> = table.keys().copied().collect();
        self.publish(table);

        let Some(config) = self.render_config() else {
            warn!("no core '{}' registered yet, nodes stay pending", self.core_name);
            return;
        };
        for id in ids {
            match self.rpc.connect(id, &config).await {
                Ok(()) => self.set_status(id, NodeStatus::Connected),
                Err(err) => {
                    error!("node {} initial connect failed: {}", id, err);
                    self.set_status(id, NodeStatus::Broken);
                }
            }
        }
    }

    /// One health pass over the local engine and every node. The config is
    /// rendered at most once, by the first node that needs it.
    pub async fn health_sweep(&self) {
        let mut config: Option<String> = None;
        let mut render = |this: &Self| -> Option<String> {
            if config.is_none() {
                config = this.render_config();
            }
            config.clone()
        };

        if !self.engine.started().await {
            if let Some(config) = render(self) {
                warn!("local engine is down, restarting");
                if let Err(err) = self.engine.restart(&config).await {
                    error!("local engine restart failed: {}", err);
                }
            }
        }

        let snapshot = self.nodes.load_full();
        for node in snapshot.values() {
            match node.status {
                NodeStatus::Connected => {
                    let probe =
                        tokio::time::timeout(HEALTH_RPC_TIMEOUT, self.rpc.get_sys_stats(node.id))
                            .await;
                    let failure = match probe {
                        Ok(Ok(())) => None,
                        Ok(Err(err)) => Some(err),
                        Err(_) => Some(NodeError::Timeout(HEALTH_RPC_TIMEOUT)),
                    };
                    if let Some(err) = failure {
                        warn!("node {} unhealthy ({}), restarting", node.id, err);
                        self.set_status(node.id, NodeStatus::Connecting);
                        match render(self) {
                            Some(config) => match self.rpc.restart(node.id, &config).await {
                                Ok(()) => self.set_status(node.id, NodeStatus::Connected),
                                Err(err) => {
                                    error!("node {} restart failed: {}", node.id, err);
                                    self.set_status(node.id, NodeStatus::Broken);
                                }
                            },
                            None => self.set_status(node.id, NodeStatus::Broken),
                        }
                    }
                }
                NodeStatus::Disconnected | NodeStatus::Broken | NodeStatus::Connecting => {
                    self.set_status(node.id, NodeStatus::Connecting);
                    match render(self) {
                        Some(config) => match self.rpc.connect(node.id, &config).await {
                            Ok(()) => self.set_status(node.id, NodeStatus::Connected),
                            Err(err) => {
                                error!("node {} reconnect failed: {}", node.id, err);
                                self.set_status(node.id, NodeStatus::Broken);
                            }
                        },
                        None => self.set_status(node.id, NodeStatus::Broken),
                    }
                }
            }
        }
    }

    /// Sweep at the configured `node_health_check_interval` until `shutdown`
    /// is called. Missed ticks coalesce into one.
    pub async fn run_health_loop(&self) {
        let interval = Duration::from_secs(Settings::current().node_health_check_interval);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.health_sweep().await,
                _ = self.shutdown.notified() => break,
            }
        }
        info!("node health loop stopped");
    }

    /// Stop the local engine, then disconnect every node. Disconnect errors
    /// are swallowed.
    pub async fn shutdown(&self) {
        self.shutdown.notify_waiters();
        self.engine.stop().await;
        let snapshot = self.nodes.load_full();
        for node in snapshot.values() {
            if let Err(err) = self.rpc.disconnect(node.id).await {
                warn!("node {} disconnect failed (ignored): {}", node.id, err);
            }
            self.set_status(node.id, NodeStatus::Disconnected);
        }
    }
}
