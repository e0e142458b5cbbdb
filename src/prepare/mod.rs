//! Node Preparation Engine (C7): render and converge the per-node stack
//! (spec §4.4). The hardest component in the system — declarative inputs
//! in, a fully converged node out, idempotent on every call.

pub mod compose;
pub mod render;

use crate::error::{DyniaError, Result};
use crate::executor::Executor;
use crate::health;
use crate::state::{Cluster, ClusterNode, Route};
use futures::future::join_all;
use render::{canonical_order, content_hash, render_lb_config, render_reverse_proxy_config, render_vrrp_config};
use tracing::{info, warn};

/// Reverse-proxy port every node listens on internally; backend addressing
/// in the load-balancer config targets this port (spec §4.4).
pub const PROXY_INTERNAL_PORT: u16 = 8443;
const REVERSE_PROXY_CONFIG_PATH: &str = "/etc/dynia/proxy.conf";
const LB_CONFIG_PATH: &str = "/etc/dynia/lb.conf";
const VRRP_CONFIG_PATH: &str = "/etc/keepalived/keepalived.conf";

/// Everything the engine needs to converge one node, independent of how
/// the caller assembled it (spec §4.4 "Inputs").
pub struct PrepareInput<'a> {
    pub cluster: &'a Cluster,
    pub all_nodes: &'a [&'a ClusterNode],
    pub local_node: &'a ClusterNode,
    pub routes: &'a [Route],
    pub listen_ports: &'a [u16],
}

async fn write_if_changed(
    executor: &dyn Executor,
    host: &str,
    remote_path: &str,
    rendered: &str,
    artifact: &str,
) -> Result<bool> {
    let existing = executor
        .exec(host, &format!("cat {remote_path} 2>/dev/null || true"))
        .await
        .unwrap_or_default();

    if content_hash(&existing) == content_hash(rendered) {
        return Ok(false);
    }

    executor
        .upload_content(host, remote_path, rendered.as_bytes())
        .await
        .map_err(|e| DyniaError::Convergence {
            artifact: artifact.to_string(),
            message: e.to_string(),
        })?;
    Ok(true)
}

async fn ensure_container_runtime(executor: &dyn Executor, host: &str) -> Result<()> {
    let check = executor
        .exec(host, "command -v dockerd >/dev/null 2>&1 && echo yes || echo no")
        .await?;
    if check.trim() == "yes" {
        return Ok(());
    }
    executor
        .exec(host, "curl -fsSL https://get.docker.com | sh && systemctl enable --now docker")
        .await
        .map_err(|e| DyniaError::Convergence {
            artifact: "container runtime".to_string(),
            message: e.to_string(),
        })?;
    executor
        .exec(host, "docker network inspect edge >/dev/null 2>&1 || docker network create edge")
        .await
        .map_err(|e| DyniaError::Convergence {
            artifact: "edge network".to_string(),
            message: e.to_string(),
        })?;
    Ok(())
}

/// Converge a single node to the declarative state described in spec §4.4.
/// Safe to call repeatedly: every artifact write is gated on a content
/// hash comparison against what is already on the node.
pub async fn prepare_node(executor: &dyn Executor, input: &PrepareInput<'_>) -> Result<()> {
    let host = &input.local_node.public_ip;

    executor
        .wait_for_ready(host, std::time::Duration::from_secs(300))
        .await
        .map_err(|_| DyniaError::Transport(format!("node {host} unreachable")))?;

    ensure_container_runtime(executor, host).await?;

    let resolved_routes: Vec<(&Route, String)> = input
        .routes
        .iter()
        .map(|route| (route, render::route_backend(route)))
        .collect();

    let reverse_proxy_rendered = render_reverse_proxy_config(&resolved_routes, PROXY_INTERNAL_PORT);
    let lb_rendered = render_lb_config(input.all_nodes, PROXY_INTERNAL_PORT, input.listen_ports);
    let vrrp_rendered = render_vrrp_config(input.cluster, input.local_node, input.all_nodes.len());

    let proxy_changed = write_if_changed(
        executor,
        host,
        REVERSE_PROXY_CONFIG_PATH,
        &reverse_proxy_rendered,
        "reverse-proxy config",
    )
    .await?;
    let lb_changed = write_if_changed(executor, host, LB_CONFIG_PATH, &lb_rendered, "load balancer config").await?;
    let vrrp_changed = write_if_changed(executor, host, VRRP_CONFIG_PATH, &vrrp_rendered, "vrrp config").await?;

    if proxy_changed {
        executor
            .exec(host, "systemctl reload dynia-proxy || systemctl restart dynia-proxy")
            .await
            .map_err(|e| DyniaError::Convergence {
                artifact: "reverse-proxy config".into(),
                message: e.to_string(),
            })?;
    }
    if lb_changed {
        executor
            .exec(host, "systemctl reload dynia-lb || systemctl restart dynia-lb")
            .await
            .map_err(|e| DyniaError::Convergence {
                artifact: "load balancer config".into(),
                message: e.to_string(),
            })?;
    }
    if vrrp_changed {
        executor
            .exec(host, "systemctl reload keepalived || systemctl restart keepalived")
            .await
            .map_err(|e| DyniaError::Convergence {
                artifact: "vrrp config".into(),
                message: e.to_string(),
            })?;
    }

    info!(
        node = input.local_node.two_word_id,
        proxy_changed, lb_changed, vrrp_changed, "node converged"
    );

    health::check_internal_readiness(executor, host, PROXY_INTERNAL_PORT).await
}

/// `prepareClusterNodes`: converge `target_nodes` (or every node when none
/// are given), always passing the full node list so load-balancer and VRRP
/// config reflect cluster-wide membership (spec §4.4 "Parallel preparation
/// of a cluster").
pub async fn prepare_cluster_nodes(
    executor: &dyn Executor,
    cluster: &Cluster,
    all_nodes: &[&ClusterNode],
    routes: &[Route],
    listen_ports: &[u16],
    target_nodes: Option<&[&ClusterNode]>,
    parallel: bool,
) -> Result<()> {
    let targets: Vec<&ClusterNode> = match target_nodes {
        Some(nodes) => nodes.to_vec(),
        None => canonical_order(all_nodes),
    };

    if parallel {
        let futures = targets.iter().map(|node| {
            let input = PrepareInput {
                cluster,
                all_nodes,
                local_node: node,
                routes,
                listen_ports,
            };
            async move { (node.two_word_id.clone(), prepare_node(executor, &input).await) }
        });
        let results = join_all(futures).await;
        let failures: Vec<String> = results
            .into_iter()
            .filter_map(|(id, result)| result.err().map(|e| format!("{id}: {e}")))
            .collect();
        if !failures.is_empty() {
            return Err(DyniaError::Convergence {
                artifact: "cluster preparation".into(),
                message: failures.join("; "),
            });
        }
    } else {
        for node in canonical_order(&targets) {
            let input = PrepareInput {
                cluster,
                all_nodes,
                local_node: node,
                routes,
                listen_ports,
            };
            if let Err(err) = prepare_node(executor, &input).await {
                warn!(node = node.two_word_id, error = %err, "node preparation failed");
                return Err(err);
            }
        }
    }

    Ok(())
}
