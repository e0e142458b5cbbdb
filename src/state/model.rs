//! Persistent data model (spec §3): Cluster, ClusterNode, Route.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `role` of a [`ClusterNode`] — exactly one node per cluster may be
/// `Active` at a time (spec §3 invariant 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Active,
    Standby,
}

/// Lifecycle status of a [`ClusterNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Provisioning,
    Active,
    Failed,
    Inactive,
}

/// A declared HA cluster: one or more VMs in a region behind a single
/// Reserved IP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    /// Unique, lowercase DNS label; primary key.
    pub name: String,
    pub base_domain: String,
    pub region: String,
    pub size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserved_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserved_ip_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_node_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A VM participating in a cluster, keyed by `(cluster_id, two_word_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNode {
    pub cluster_id: String,
    pub two_word_id: String,
    /// Opaque provider handle (compute API's VM id).
    pub droplet_id: String,
    pub hostname: String,
    pub public_ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_ip: Option<String>,
    pub role: NodeRole,
    /// 1-255; strictly decreasing across a cluster's nodes from the active
    /// node down through standbys (spec §3 invariant 2).
    pub priority: u8,
    pub status: NodeStatus,
    pub created_at: DateTime<Utc>,
}

impl ClusterNode {
    pub fn hostname_for(cluster_id: &str, two_word_id: &str) -> String {
        format!("{cluster_id}-{two_word_id}")
    }

    pub fn backend_address(&self) -> &str {
        self.private_ip.as_deref().unwrap_or(&self.public_ip)
    }
}

/// A reverse-proxied host served identically by every node in a cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub cluster_id: String,
    /// Fully qualified domain name; primary key together with `cluster_id`.
    pub host: String,
    /// Must start with `/`, <= 255 chars.
    pub health_path: String,
    pub proxied: bool,
    pub tls_enabled: bool,
    pub is_placeholder: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compose_path: Option<String>,
    /// `${service}:${port}` resolved from the compose document at deploy
    /// time (spec §4.4 entry-service selection); `None` for placeholder
    /// routes, which always back onto `placeholder:8080`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_backend: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
