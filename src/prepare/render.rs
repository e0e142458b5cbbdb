//! Declarative config rendering for the three per-node daemons, plus the
//! content-hash comparison that gates writes (spec §4.4 rendering rules).

use crate::state::{Cluster, ClusterNode, NodeRole, Route};
use sha2::{Digest, Sha256};

/// Order nodes by descending priority, ties broken by lexicographic
/// `twoWordId` (spec §4.4 "Canonical node ordering").
pub fn canonical_order<'a>(nodes: &'a [&'a ClusterNode]) -> Vec<&'a ClusterNode> {
    let mut ordered: Vec<&ClusterNode> = nodes.to_vec();
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.two_word_id.cmp(&b.two_word_id)));
    ordered
}

/// sha256 hex digest used to decide whether a rendered artifact actually
/// changed before writing it and restarting the dependent daemon.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn backend_address(node: &ClusterNode) -> &str {
    node.backend_address()
}

/// The internal backend a route proxies to: `placeholder:8080` for
/// placeholder routes, else the `${service}:${port}` resolved from the
/// route's compose file at deploy time (spec §4.4 "Per-route reverse-proxy
/// block").
pub fn route_backend(route: &Route) -> String {
    if route.is_placeholder {
        "placeholder:8080".to_string()
    } else {
        route
            .resolved_backend
            .clone()
            .unwrap_or_else(|| "placeholder:8080".to_string())
    }
}

/// One reverse-proxy config covering every route, regenerated in full on
/// every deploy (never incrementally patched, per spec §4.6 `deployRoute`).
pub fn render_reverse_proxy_config(
    routes: &[(&Route, String)],
    proxy_internal_port: u16,
) -> String {
    let mut out = String::new();
    out.push_str("# managed by dynia - do not edit by hand\n");
    out.push_str("admin:\n  bind: 127.0.0.1:8443\n\n");
    out.push_str(&format!("listen internal:\n  bind: 127.0.0.1:{proxy_internal_port}\n\n"));

    for (route, backend) in routes {
        out.push_str(&format!("block host={}\n", route.host));
        out.push_str(&format!("  proxy_pass {backend} over edge\n"));
        out.push_str("  health_check:\n    path: /dynia-health\n    expect_status: 200\n");
        out.push_str("  security_headers: true\n  compression: gzip\n");
        out.push_str(&format!(
            "  access_log: json /var/log/dynia-proxy/{}.log\n",
            route.host
        ));
        out.push_str("end\n\n");
    }
    out
}

/// The L7 load-balancer config: one backend pool with one server per node
/// in the cluster, plus a frontend selecting it by default
/// (spec §4.4 "L7 load balancer config").
pub fn render_lb_config(nodes: &[&ClusterNode], proxy_port: u16, listen_ports: &[u16]) -> String {
    let ordered = canonical_order(nodes);
    let mut out = String::new();
    out.push_str("# managed by dynia - do not edit by hand\n");
    out.push_str("backend cluster_backends\n");
    out.push_str("  health_check: interval=5s fall=3 rise=2\n");
    for (index, node) in ordered.iter().enumerate() {
        out.push_str(&format!(
            "  server node{} {}:{proxy_port}\n",
            index + 1,
            backend_address(node)
        ));
    }
    out.push_str("end\n\n");

    out.push_str("frontend main\n");
    for port in listen_ports {
        out.push_str(&format!("  bind *:{port}\n"));
    }
    out.push_str("  default_backend cluster_backends\n");
    out.push_str("end\n");
    out
}

const VRRP_VIRTUAL_ROUTER_ID: u8 = 51;

/// One VRRP instance for the local node (spec §4.4 "VRRP daemon config").
/// Single-node clusters skip notification scripts (spec §4.4
/// "Single-node mode").
pub fn render_vrrp_config(
    cluster: &Cluster,
    local_node: &ClusterNode,
    cluster_node_count: usize,
) -> String {
    let auth_pass = &cluster.name[..cluster.name.len().min(8)];
    let state = if local_node.role == NodeRole::Active { "MASTER" } else { "BACKUP" };
    let reserved_ip = cluster.reserved_ip.as_deref().unwrap_or("0.0.0.0");

    let mut out = String::new();
    out.push_str("# managed by dynia - do not edit by hand\n");
    out.push_str("vrrp_instance DYNIA_CLUSTER {\n");
    out.push_str(&format!("  state {state}\n"));
    out.push_str("  interface eth0\n");
    out.push_str(&format!("  virtual_router_id {VRRP_VIRTUAL_ROUTER_ID}\n"));
    out.push_str(&format!("  priority {}\n", local_node.priority));
    out.push_str(&format!("  auth_pass {auth_pass}\n"));
    out.push_str(&format!("  virtual_ipaddress {{\n    {reserved_ip}\n  }}\n"));

    if cluster_node_count > 1 {
        out.push_str("  track_script {\n    chk_reverse_proxy\n  }\n");
    }
    out.push_str("}\n");

    if cluster_node_count > 1 {
        out.push_str(
            "\nvrrp_script chk_reverse_proxy {\n  script \"/usr/bin/pgrep dynia-proxy\"\n  interval 2\n  weight -2\n}\n",
        );
    }
    out
}
