//! `deployRoute` (spec §4.6): never incremental, always regenerates the
//! complete reverse-proxy config from the full route set.

use super::Orchestrator;
use crate::error::{DyniaError, Result};
use crate::prepare::{self, compose, PrepareInput};
use crate::state::{Route, StateStore};
use chrono::Utc;
use std::time::Duration;
use tracing::warn;

/// Fixed DNS-propagation wait after the A-record upsert (spec §4.6
/// `deployRoute`). Distinct from [`crate::providers::DnsProvider::
/// wait_propagation`]'s resolver-agreement check — this is the
/// caller-side settle, matching §5's ordering guarantee that DNS never
/// points at a node that doesn't yet serve the route.
const DNS_SETTLE: Duration = Duration::from_secs(30);

/// Either a placeholder route (no workload, just a marker backend) or a
/// route backed by a user-supplied compose document.
pub enum DeployRouteRequest {
    Placeholder {
        health_path: String,
        proxied: bool,
    },
    Compose {
        domain: String,
        health_path: String,
        proxied: bool,
        compose_path: String,
        compose_yaml: String,
    },
}

impl<'a> Orchestrator<'a> {
    pub async fn deploy_route(
        &self,
        store: &mut StateStore,
        cluster_name: &str,
        request: DeployRouteRequest,
    ) -> Result<()> {
        let cluster = store
            .get_cluster(cluster_name)
            .cloned()
            .ok_or_else(|| DyniaError::not_found(format!("cluster '{cluster_name}' not found")))?;
        let active = store
            .get_active_cluster_node(cluster_name)
            .cloned()
            .ok_or_else(|| DyniaError::State(format!("cluster '{cluster_name}' has no active node")))?;

        let (domain, health_path, proxied, is_placeholder, compose_path, resolved_backend) = match &request {
            DeployRouteRequest::Placeholder { health_path, proxied } => (
                format!("dynia-placeholder-{cluster_name}.{}", cluster.base_domain),
                health_path.clone(),
                *proxied,
                true,
                None,
                None,
            ),
            DeployRouteRequest::Compose {
                domain,
                health_path,
                proxied,
                compose_path,
                compose_yaml,
            } => {
                let target = compose::select_entry_target(compose_yaml)?;
                (
                    domain.clone(),
                    health_path.clone(),
                    *proxied,
                    false,
                    Some(compose_path.clone()),
                    Some(format!("{}:{}", target.service, target.port)),
                )
            }
        };

        crate::state::validate::validate_health_path(&health_path)?;

        if self.dry_run {
            self.dry_run_log(&format!("deploy route '{domain}' on cluster '{cluster_name}'"));
            return Ok(());
        }

        if let DeployRouteRequest::Compose { compose_yaml, .. } = &request {
            self.executor
                .upload_content(&active.public_ip, "/srv/dynia/compose.yaml", compose_yaml.as_bytes())
                .await?;
            self.executor
                .exec(&active.public_ip, "docker compose -f /srv/dynia/compose.yaml up -d")
                .await?;
        }

        let now = Utc::now();
        let mut routes: Vec<Route> = store.get_cluster_routes(cluster_name).into_iter().cloned().collect();
        let new_route = Route {
            cluster_id: cluster_name.to_string(),
            host: domain.clone(),
            health_path,
            proxied,
            tls_enabled: true,
            is_placeholder,
            compose_path,
            resolved_backend,
            created_at: now,
            updated_at: now,
        };
        routes.retain(|r| r.host != new_route.host);
        let previous_routes = routes.clone();
        routes.push(new_route.clone());

        let all_nodes: Vec<_> = store.get_cluster_nodes(cluster_name).into_iter().cloned().collect();
        let all_node_refs: Vec<_> = all_nodes.iter().collect();
        let input = PrepareInput {
            cluster: &cluster,
            all_nodes: &all_node_refs,
            local_node: &active,
            routes: &routes,
            listen_ports: &[80, 443],
        };
        if let Err(err) = prepare::prepare_node(self.executor, &input).await {
            if matches!(err, DyniaError::Health(_)) {
                warn!(
                    node = active.two_word_id,
                    domain, error = %err, "deployRoute health check failed, rolling back reverse-proxy to placeholder"
                );
                let rollback_input = PrepareInput {
                    cluster: &cluster,
                    all_nodes: &all_node_refs,
                    local_node: &active,
                    routes: &previous_routes,
                    listen_ports: &[80, 443],
                };
                let _ = prepare::prepare_node(self.executor, &rollback_input).await;
            }
            return Err(err);
        }

        let reserved_ip = cluster
            .reserved_ip
            .as_ref()
            .ok_or_else(|| DyniaError::State(format!("cluster '{cluster_name}' has no reserved IP")))?;
        self.dns.upsert_a(&domain, reserved_ip, 300, proxied).await?;
        crate::retry::settle(DNS_SETTLE, false, "DNS propagation").await;

        store.upsert_route(new_route);
        store.save()?;
        Ok(())
    }
}
