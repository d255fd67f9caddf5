//! Startup orchestration.
//!
//! # Responsibilities
//! - Create the transport and one node per configured identity
//! - Install the configured approval policies
//! - Request the configured links once every node is up

use std::collections::BTreeMap;

use serde_json::Value;

use crate::config::GraphConfig;
use crate::graph::GraphNode;
use crate::peer::PeerId;
use crate::policy;
use crate::transport::MemoryNetwork;

/// Outcome of the startup link pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LinkReport {
    pub established: usize,
    pub denied: usize,
}

/// Every node of one deployment sharing a transport.
pub struct Cluster {
    network: MemoryNetwork,
    nodes: BTreeMap<PeerId, GraphNode>,
    links: Vec<(PeerId, PeerId)>,
}

impl Cluster {
    /// Create every node. No links are requested yet.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: &GraphConfig) -> Self {
        let network = MemoryNetwork::new(config.transport.clone());
        let mut nodes = BTreeMap::new();
        let mut links = Vec::new();

        for node_config in &config.nodes {
            let id = PeerId::new(&node_config.id);
            let node = GraphNode::new(network.endpoint(id.clone()), config.liveness.clone());
            policy::install(&node, &config.policy);

            links.extend(
                node_config
                    .links
                    .iter()
                    .map(|target| (id.clone(), PeerId::new(target))),
            );
            nodes.insert(id, node);
        }

        tracing::info!(nodes = nodes.len(), links = links.len(), "Cluster created");
        Self { network, nodes, links }
    }

    /// Request every configured link, in declaration order.
    pub async fn link(&self) -> LinkReport {
        let mut report = LinkReport::default();
        for (from, to) in &self.links {
            let Some(node) = self.nodes.get(from) else {
                continue;
            };
            if node.connect(to, Value::Null).await {
                report.established += 1;
            } else {
                tracing::warn!(node = %from, remote = %to, "Configured link was not established");
                report.denied += 1;
            }
        }
        report
    }

    pub fn node(&self, id: &PeerId) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn network(&self) -> &MemoryNetwork {
        &self.network
    }

    /// Close every node. Returns how many connections were severed.
    pub fn close(&self) -> usize {
        self.nodes.values().map(GraphNode::close).sum()
    }
}

/// Create the cluster and establish its configured links.
pub async fn start_cluster(config: &GraphConfig) -> (Cluster, LinkReport) {
    let cluster = Cluster::new(config);
    let report = cluster.link().await;
    tracing::info!(
        established = report.established,
        denied = report.denied,
        "Startup links requested"
    );
    (cluster, report)
}
