//! `removeNode` and `activateNode` (spec §4.6).

use super::Orchestrator;
use crate::error::{DyniaError, Result};
use crate::health;
use crate::prepare;
use crate::reserved_ip;
use crate::state::{NodeRole, StateStore};
use std::time::Duration;

/// Fixed propagation wait after a Reserved IP reassignment, before roles
/// flip in state (spec §4.6 `activateNode`).
const REASSIGN_SETTLE: Duration = Duration::from_secs(10);

impl<'a> Orchestrator<'a> {
    /// `removeNode`: reject if it is the only node. If active, promote the
    /// highest-priority standby first (reassign Reserved IP, mark active),
    /// then destroy the target. If standby, destroy directly.
    pub async fn remove_node(&self, store: &mut StateStore, cluster_name: &str, node_id: &str) -> Result<()> {
        let cluster = store
            .get_cluster(cluster_name)
            .cloned()
            .ok_or_else(|| DyniaError::not_found(format!("cluster '{cluster_name}' not found")))?;
        let target = store
            .get_cluster_node(cluster_name, node_id)
            .cloned()
            .ok_or_else(|| DyniaError::not_found(format!("node '{node_id}' not found")))?;

        let remaining: Vec<_> = store
            .get_cluster_nodes(cluster_name)
            .into_iter()
            .filter(|n| n.two_word_id != node_id)
            .cloned()
            .collect();
        if remaining.is_empty() {
            return Err(DyniaError::validation(format!(
                "cannot remove '{node_id}': it is the only node in cluster '{cluster_name}'"
            )));
        }

        if self.dry_run {
            self.dry_run_log(&format!("remove node '{node_id}' from cluster '{cluster_name}'"));
            return Ok(());
        }

        if target.role == NodeRole::Active {
            let mut promoted = remaining
                .iter()
                .max_by_key(|n| n.priority)
                .expect("remaining is non-empty")
                .clone();

            if let Some(ip_id) = &cluster.reserved_ip_id {
                reserved_ip::reassign(self.compute, ip_id, &promoted.droplet_id).await?;
            }
            // The target is about to be removed from state entirely, so its
            // priority goes with it; take the vacated maximum so the
            // promoted node is the unique maximum-priority (invariant 2)
            // in the same save that removes the old active (invariant 1).
            promoted.role = NodeRole::Active;
            promoted.priority = target.priority;
            store.upsert_cluster_node(promoted.clone());
            store.remove_cluster_node(cluster_name, node_id)?;

            let mut updated_cluster = cluster.clone();
            updated_cluster.active_node_id = Some(promoted.two_word_id.clone());
            store.upsert_cluster(updated_cluster);
            store.save()?;

            self.compute.delete_vm(&target.droplet_id).await?;
            return Ok(());
        }

        self.compute.delete_vm(&target.droplet_id).await?;
        store.remove_cluster_node(cluster_name, node_id)?;
        store.save()?;
        Ok(())
    }

    /// `activateNode`: idempotent when already active. Else health-check
    /// the target, reassign the Reserved IP, wait for propagation, then
    /// flip roles in state (spec §4.6 `activateNode`).
    pub async fn activate_node(&self, store: &mut StateStore, cluster_name: &str, node_id: &str) -> Result<()> {
        let cluster = store
            .get_cluster(cluster_name)
            .cloned()
            .ok_or_else(|| DyniaError::not_found(format!("cluster '{cluster_name}' not found")))?;
        let target = store
            .get_cluster_node(cluster_name, node_id)
            .cloned()
            .ok_or_else(|| DyniaError::not_found(format!("node '{node_id}' not found")))?;

        if target.role == NodeRole::Active {
            return Ok(());
        }

        if self.dry_run {
            self.dry_run_log(&format!("activate node '{node_id}' in cluster '{cluster_name}'"));
            return Ok(());
        }

        health::check_internal_readiness(self.executor, &target.public_ip, prepare::PROXY_INTERNAL_PORT).await?;

        if let Some(ip_id) = &cluster.reserved_ip_id {
            self.compute.assign_reserved_ip(ip_id, &target.droplet_id).await?;
        }
        crate::retry::settle(REASSIGN_SETTLE, false, "Reserved IP reassignment propagation").await;

        let mut promoted = target;
        promoted.role = NodeRole::Active;

        if let Some(previous_active) = store.get_active_cluster_node(cluster_name).cloned() {
            if previous_active.two_word_id != node_id {
                // Swap priorities so the newly-active node holds the unique
                // maximum (invariant 2) rather than keeping its lower
                // standby priority while the demoted node keeps the max.
                let mut demoted = previous_active;
                let previous_priority = demoted.priority;
                demoted.priority = promoted.priority;
                demoted.role = NodeRole::Standby;
                promoted.priority = previous_priority;
                store.upsert_cluster_node(demoted);
            }
        }
        store.upsert_cluster_node(promoted);

        let mut updated_cluster = cluster;
        updated_cluster.active_node_id = Some(node_id.to_string());
        store.upsert_cluster(updated_cluster);
        store.save()?;
        Ok(())
    }
}
