//! On-disk state document and the store that loads/saves it atomically
//! (spec §4.1, §6.3).

use super::model::{Cluster, ClusterNode, NodeRole, Route};
use super::validate::{check_invariants, reject_secrets};
use crate::error::{DyniaError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Current on-disk schema version. Bumped whenever the document shape
/// changes in a way that requires a migration.
const SCHEMA_VERSION: u32 = 1;

/// The full persisted document (spec §6.3). `nodes` and `deployments` are
/// carried over verbatim from whatever predates this schema so a state file
/// written by an older or unrelated tool round-trips without data loss;
/// nothing in this crate reads or writes them directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDocument {
    pub schema_version: u32,
    #[serde(default)]
    pub nodes: Vec<Value>,
    #[serde(default)]
    pub deployments: Vec<Value>,
    #[serde(default)]
    pub clusters: Vec<Cluster>,
    #[serde(default, rename = "clusterNodes")]
    pub cluster_nodes: Vec<ClusterNode>,
    #[serde(default)]
    pub routes: Vec<Route>,
}

impl Default for StateDocument {
    fn default() -> Self {
        StateDocument {
            schema_version: SCHEMA_VERSION,
            nodes: Vec::new(),
            deployments: Vec::new(),
            clusters: Vec::new(),
            cluster_nodes: Vec::new(),
            routes: Vec::new(),
        }
    }
}

/// Owns the on-disk state file and serializes every read-modify-write
/// cycle through invariant and secret-leak checks before committing.
pub struct StateStore {
    path: PathBuf,
    document: StateDocument,
}

impl StateStore {
    /// Load the document at `path`, or start from an empty one if the file
    /// does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let document = if path.exists() {
            let bytes = std::fs::read(&path).map_err(DyniaError::from)?;
            serde_json::from_slice(&bytes).map_err(|e| DyniaError::Schema(e.to_string()))?
        } else {
            StateDocument::default()
        };
        check_invariants(&document)?;
        Ok(StateStore { path, document })
    }

    pub fn document(&self) -> &StateDocument {
        &self.document
    }

    /// Validate and atomically persist the current document: write to a
    /// sibling temp file, fsync it, then rename over the real path so a
    /// crash never leaves a half-written state file (spec §4.1).
    pub fn save(&self) -> Result<()> {
        check_invariants(&self.document)?;
        let serialized = serde_json::to_value(&self.document)?;
        reject_secrets(&serialized)?;

        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(DyniaError::from)?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(DyniaError::from)?;
        let pretty = serde_json::to_vec_pretty(&serialized)?;
        std::io::Write::write_all(&mut tmp, &pretty).map_err(DyniaError::from)?;
        tmp.as_file().sync_all().map_err(DyniaError::from)?;
        tmp.persist(&self.path)
            .map_err(|e| DyniaError::Io(e.to_string()))?;
        Ok(())
    }

    // --- clusters -------------------------------------------------------

    pub fn get_cluster(&self, name: &str) -> Option<&Cluster> {
        self.document.clusters.iter().find(|c| c.name == name)
    }

    pub fn list_clusters(&self) -> &[Cluster] {
        &self.document.clusters
    }

    pub fn upsert_cluster(&mut self, cluster: Cluster) {
        match self
            .document
            .clusters
            .iter_mut()
            .find(|c| c.name == cluster.name)
        {
            Some(slot) => *slot = cluster,
            None => self.document.clusters.push(cluster),
        }
    }

    /// Remove a cluster and cascade-delete its nodes and routes
    /// (spec §3 invariant 4).
    pub fn remove_cluster(&mut self, name: &str) -> Result<()> {
        let existed = self.document.clusters.iter().any(|c| c.name == name);
        if !existed {
            return Err(DyniaError::not_found(format!("cluster '{name}' not found")));
        }
        self.document.clusters.retain(|c| c.name != name);
        self.document.cluster_nodes.retain(|n| n.cluster_id != name);
        self.document.routes.retain(|r| r.cluster_id != name);
        Ok(())
    }

    // --- cluster nodes ----------------------------------------------------

    pub fn get_cluster_node(&self, cluster_id: &str, two_word_id: &str) -> Option<&ClusterNode> {
        self.document
            .cluster_nodes
            .iter()
            .find(|n| n.cluster_id == cluster_id && n.two_word_id == two_word_id)
    }

    pub fn get_cluster_nodes(&self, cluster_id: &str) -> Vec<&ClusterNode> {
        self.document
            .cluster_nodes
            .iter()
            .filter(|n| n.cluster_id == cluster_id)
            .collect()
    }

    pub fn get_active_cluster_node(&self, cluster_id: &str) -> Option<&ClusterNode> {
        self.document
            .cluster_nodes
            .iter()
            .find(|n| n.cluster_id == cluster_id && n.role == NodeRole::Active)
    }

    pub fn upsert_cluster_node(&mut self, node: ClusterNode) {
        match self.document.cluster_nodes.iter_mut().find(|n| {
            n.cluster_id == node.cluster_id && n.two_word_id == node.two_word_id
        }) {
            Some(slot) => *slot = node,
            None => self.document.cluster_nodes.push(node),
        }
    }

    pub fn remove_cluster_node(&mut self, cluster_id: &str, two_word_id: &str) -> Result<()> {
        let existed = self
            .document
            .cluster_nodes
            .iter()
            .any(|n| n.cluster_id == cluster_id && n.two_word_id == two_word_id);
        if !existed {
            return Err(DyniaError::not_found(format!(
                "node '{two_word_id}' not found in cluster '{cluster_id}'"
            )));
        }
        self.document
            .cluster_nodes
            .retain(|n| !(n.cluster_id == cluster_id && n.two_word_id == two_word_id));
        Ok(())
    }

    // --- routes -------------------------------------------------------

    pub fn get_route(&self, cluster_id: &str, host: &str) -> Option<&Route> {
        self.document
            .routes
            .iter()
            .find(|r| r.cluster_id == cluster_id && r.host == host)
    }

    pub fn get_cluster_routes(&self, cluster_id: &str) -> Vec<&Route> {
        self.document
            .routes
            .iter()
            .filter(|r| r.cluster_id == cluster_id)
            .collect()
    }

    pub fn upsert_route(&mut self, route: Route) {
        match self
            .document
            .routes
            .iter_mut()
            .find(|r| r.cluster_id == route.cluster_id && r.host == route.host)
        {
            Some(slot) => *slot = route,
            None => self.document.routes.push(route),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::model::NodeStatus;
    use chrono::Utc;
    use tempfile::tempdir;

    fn sample_cluster() -> Cluster {
        Cluster {
            name: "myapp".into(),
            base_domain: "example.com".into(),
            region: "nyc3".into(),
            size: "s-1vcpu-1gb".into(),
            reserved_ip: None,
            reserved_ip_id: None,
            vpc_id: None,
            active_node_id: None,
            created_at: Utc::now(),
        }
    }

    fn sample_node(cluster_id: &str, id: &str, role: NodeRole, priority: u8) -> ClusterNode {
        ClusterNode {
            cluster_id: cluster_id.into(),
            two_word_id: id.into(),
            droplet_id: "123".into(),
            hostname: ClusterNode::hostname_for(cluster_id, id),
            public_ip: "10.0.0.1".into(),
            private_ip: None,
            role,
            priority,
            status: NodeStatus::Active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn round_trips_through_atomic_save_and_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut store = StateStore::open(&path).unwrap();
        store.upsert_cluster(sample_cluster());
        store.upsert_cluster_node(sample_node("myapp", "brave-otter", NodeRole::Active, 200));
        store.save().unwrap();

        let reopened = StateStore::open(&path).unwrap();
        assert!(reopened.get_cluster("myapp").is_some());
        assert_eq!(reopened.get_cluster_nodes("myapp").len(), 1);
    }

    #[test]
    fn cascade_deletes_nodes_and_routes_on_cluster_removal() {
        let dir = tempdir().unwrap();
        let mut store = StateStore::open(dir.path().join("state.json")).unwrap();
        store.upsert_cluster(sample_cluster());
        store.upsert_cluster_node(sample_node("myapp", "brave-otter", NodeRole::Active, 200));
        store.remove_cluster("myapp").unwrap();
        assert!(store.get_cluster("myapp").is_none());
        assert!(store.get_cluster_nodes("myapp").is_empty());
    }

    #[test]
    fn save_rejects_secret_shaped_field_by_construction() {
        // Cluster/ClusterNode/Route carry no secret-shaped fields, so a
        // clean document always saves; this just pins that contract.
        let dir = tempdir().unwrap();
        let mut store = StateStore::open(dir.path().join("state.json")).unwrap();
        store.upsert_cluster(sample_cluster());
        assert!(store.save().is_ok());
    }
}
