//! `prepare`/`repair` and `inspect-config` (spec §4.6, §6.4, SPEC_FULL.md
//! "Supplemented features"). Both read cluster state and the preparation
//! engine's rendering step; neither mutates a node unless asked to.

use super::Orchestrator;
use crate::error::{DyniaError, Result};
use crate::health;
use crate::prepare::render::{render_lb_config, render_reverse_proxy_config, render_vrrp_config};
use crate::prepare::{self, PrepareInput, PROXY_INTERNAL_PORT};
use crate::state::{ClusterNode, StateStore};

/// Options for `prepare(cluster, {force, parallel, targetNodes?})` (spec
/// §4.6). Without `force`, nodes whose internal readiness check already
/// passes are skipped; with `force`, every (or every targeted) node is
/// reconverged regardless of current health.
#[derive(Debug, Clone, Default)]
pub struct PrepareOptions {
    pub force: bool,
    pub parallel: bool,
    pub target_nodes: Option<Vec<String>>,
}

/// The rendered artifacts for one node, as `inspect-config` would show them
/// without writing anything (spec §6.4, SPEC_FULL.md).
#[derive(Debug, Clone)]
pub struct NodeInspection {
    pub two_word_id: String,
    pub reverse_proxy_config: String,
    pub lb_config: String,
    pub vrrp_config: String,
}

/// The rendered artifacts for every node in a cluster, as they would be
/// converged on the next `prepare`.
#[derive(Debug, Clone)]
pub struct ClusterInspection {
    pub nodes: Vec<NodeInspection>,
}

impl<'a> Orchestrator<'a> {
    /// `prepare(cluster, {force, parallel, targetNodes?})`: without
    /// `force`, skip nodes whose internal readiness already passes; with
    /// `force`, converge all (or targeted) nodes. The full node list is
    /// always passed into the preparation engine so load-balancer and VRRP
    /// config reflect cluster-wide membership, even when only a subset of
    /// nodes is actually re-converged (spec §4.6 `prepare`).
    pub async fn prepare(
        &self,
        store: &mut StateStore,
        cluster_name: &str,
        options: PrepareOptions,
    ) -> Result<()> {
        let cluster = store
            .get_cluster(cluster_name)
            .cloned()
            .ok_or_else(|| DyniaError::not_found(format!("cluster '{cluster_name}' not found")))?;
        let all_nodes: Vec<ClusterNode> = store
            .get_cluster_nodes(cluster_name)
            .into_iter()
            .cloned()
            .collect();
        if all_nodes.is_empty() {
            return Err(DyniaError::State(format!(
                "cluster '{cluster_name}' has no nodes to prepare"
            )));
        }
        let routes = store
            .get_cluster_routes(cluster_name)
            .into_iter()
            .cloned()
            .collect::<Vec<_>>();

        if self.dry_run {
            self.dry_run_log(&format!("prepare cluster '{cluster_name}' (force={})", options.force));
            return Ok(());
        }

        let candidates: Vec<&ClusterNode> = match &options.target_nodes {
            Some(ids) => all_nodes
                .iter()
                .filter(|n| ids.contains(&n.two_word_id))
                .collect(),
            None => all_nodes.iter().collect(),
        };

        let mut targets: Vec<&ClusterNode> = Vec::new();
        for node in candidates {
            if options.force {
                targets.push(node);
                continue;
            }
            let ready = health::check_internal_readiness(self.executor, &node.public_ip, PROXY_INTERNAL_PORT)
                .await
                .is_ok();
            if !ready {
                targets.push(node);
            }
        }

        if targets.is_empty() {
            return Ok(());
        }

        let all_node_refs: Vec<&ClusterNode> = all_nodes.iter().collect();
        prepare::prepare_cluster_nodes(
            self.executor,
            &cluster,
            &all_node_refs,
            &routes,
            &[80, 443],
            Some(&targets),
            options.parallel,
        )
        .await?;

        for node in &all_nodes {
            if targets.iter().any(|n| n.two_word_id == node.two_word_id) {
                let mut converged = node.clone();
                converged.status = crate::state::model::NodeStatus::Active;
                store.upsert_cluster_node(converged);
            }
        }
        store.save()?;
        Ok(())
    }

    /// `inspect-config`: render every artifact the preparation engine would
    /// write for each node, without touching the node (spec §6.4,
    /// SPEC_FULL.md "Supplemented features"). Grounded in the same render
    /// functions [`crate::prepare::prepare_node`] uses, with the executor
    /// write/restart step suppressed.
    pub fn inspect_config(&self, store: &StateStore, cluster_name: &str) -> Result<ClusterInspection> {
        let cluster = store
            .get_cluster(cluster_name)
            .ok_or_else(|| DyniaError::not_found(format!("cluster '{cluster_name}' not found")))?;
        let all_nodes: Vec<&ClusterNode> = store.get_cluster_nodes(cluster_name);
        if all_nodes.is_empty() {
            return Err(DyniaError::State(format!(
                "cluster '{cluster_name}' has no nodes to inspect"
            )));
        }
        let routes = store.get_cluster_routes(cluster_name);
        let resolved_routes: Vec<(&crate::state::Route, String)> = routes
            .iter()
            .map(|route| (*route, crate::prepare::render::route_backend(route)))
            .collect();

        let reverse_proxy_config = render_reverse_proxy_config(&resolved_routes, PROXY_INTERNAL_PORT);
        let lb_config = render_lb_config(&all_nodes, PROXY_INTERNAL_PORT, &[80, 443]);

        let nodes = all_nodes
            .iter()
            .map(|node| NodeInspection {
                two_word_id: node.two_word_id.clone(),
                reverse_proxy_config: reverse_proxy_config.clone(),
                lb_config: lb_config.clone(),
                vrrp_config: render_vrrp_config(cluster, node, all_nodes.len()),
            })
            .collect();

        Ok(ClusterInspection { nodes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DyniaConfig;
    use crate::executor::testing::RecordingExecutor;
    use crate::providers::testing::{FakeComputeProvider, FakeDnsProvider, FakeOriginCaProvider};
    use crate::state::model::{NodeRole, NodeStatus};
    use chrono::Utc;
    use tempfile::tempdir;

    fn config() -> DyniaConfig {
        DyniaConfig {
            compute_token: "tok".into(),
            dns_token: "tok".into(),
            dns_zone_id: "zone".into(),
            origin_ca_user_key: "key".into(),
            ssh_identity_name: "id".into(),
            default_region: "nyc3".into(),
            default_vm_size: "s-1vcpu-1gb".into(),
            default_base_domain: "example.com".into(),
        }
    }

    fn node(id: &str, priority: u8, role: NodeRole) -> ClusterNode {
        ClusterNode {
            cluster_id: "myapp".into(),
            two_word_id: id.into(),
            droplet_id: "vm-1".into(),
            hostname: ClusterNode::hostname_for("myapp", id),
            public_ip: "203.0.113.1".into(),
            private_ip: None,
            role,
            priority,
            status: NodeStatus::Active,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn prepare_skips_nodes_that_are_already_healthy_without_force() {
        let dir = tempdir().unwrap();
        let mut store = StateStore::open(dir.path().join("state.json")).unwrap();
        store.upsert_cluster(crate::state::Cluster {
            name: "myapp".into(),
            base_domain: "example.com".into(),
            region: "nyc3".into(),
            size: "s-1vcpu-1gb".into(),
            reserved_ip: Some("198.51.100.9".into()),
            reserved_ip_id: Some("reserved-ip-1".into()),
            vpc_id: None,
            active_node_id: Some("brave-otter".into()),
            created_at: Utc::now(),
        });
        store.upsert_cluster_node(node("brave-otter", 200, NodeRole::Active));

        let compute = FakeComputeProvider::new();
        let dns = FakeDnsProvider::new();
        let origin_ca = FakeOriginCaProvider::new();
        let executor = RecordingExecutor::new();
        executor.stub(
            "docker inspect -f '{{.State.Status}} {{.State.Health.Status}}' dynia-proxy",
            "running healthy\n",
        );
        executor.stub(
            "curl -s -o /dev/null -w '%{http_code}' http://127.0.0.1:8443/",
            "200",
        );
        let cfg = config();
        let orchestrator = Orchestrator::new(&compute, &dns, &origin_ca, &executor, &cfg, false);

        orchestrator
            .prepare(&mut store, "myapp", PrepareOptions::default())
            .await
            .unwrap();

        assert!(executor.uploads.lock().unwrap().is_empty());
    }

    #[test]
    fn inspect_config_renders_without_touching_the_executor() {
        let dir = tempdir().unwrap();
        let mut store = StateStore::open(dir.path().join("state.json")).unwrap();
        store.upsert_cluster(crate::state::Cluster {
            name: "myapp".into(),
            base_domain: "example.com".into(),
            region: "nyc3".into(),
            size: "s-1vcpu-1gb".into(),
            reserved_ip: Some("198.51.100.9".into()),
            reserved_ip_id: Some("reserved-ip-1".into()),
            vpc_id: None,
            active_node_id: Some("brave-otter".into()),
            created_at: Utc::now(),
        });
        store.upsert_cluster_node(node("brave-otter", 200, NodeRole::Active));

        let compute = FakeComputeProvider::new();
        let dns = FakeDnsProvider::new();
        let origin_ca = FakeOriginCaProvider::new();
        let executor = RecordingExecutor::new();
        let cfg = config();
        let orchestrator = Orchestrator::new(&compute, &dns, &origin_ca, &executor, &cfg, false);

        let inspection = orchestrator.inspect_config(&store, "myapp").unwrap();
        assert_eq!(inspection.nodes.len(), 1);
        assert!(inspection.nodes[0].vrrp_config.contains("state MASTER"));
    }
}
