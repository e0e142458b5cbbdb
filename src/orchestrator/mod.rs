//! Cluster Orchestrator (C8): sequences the multi-step operations in spec
//! §4.6, each respecting a global dry-run flag.

mod inspect;
mod node_ops;
mod route_ops;

pub use inspect::{ClusterInspection, NodeInspection, PrepareOptions};
pub use route_ops::DeployRouteRequest;

use crate::certificate;
use crate::config::DyniaConfig;
use crate::error::{DyniaError, Result};
use crate::executor::Executor;
use crate::names;
use crate::prepare::{self, PrepareInput};
use crate::providers::{ComputeProvider, CreateVmRequest, DnsProvider, OriginCaProvider};
use crate::reserved_ip;
use crate::state::{Cluster, ClusterNode, NodeRole, NodeStatus, StateStore};
use chrono::Utc;
use std::collections::HashSet;
use tracing::info;

/// Priority assigned to the first (and, transiently, only) active node in
/// a new cluster (spec §4.6 `createCluster`).
pub const INITIAL_ACTIVE_PRIORITY: u8 = 200;
/// Step by which each subsequently added standby's priority decreases
/// (spec §4.6 `addNode`).
const PRIORITY_STEP: u8 = 10;

/// Everything the orchestrator calls out to: providers, the executor, and
/// static configuration. Holds no state of its own — the caller always
/// passes a [`StateStore`] explicitly, since the state document is the
/// single source of truth the orchestrator reads once and writes once per
/// operation (spec §5 "Ordering guarantees").
pub struct Orchestrator<'a> {
    pub compute: &'a dyn ComputeProvider,
    pub dns: &'a dyn DnsProvider,
    pub origin_ca: &'a dyn OriginCaProvider,
    pub executor: &'a dyn Executor,
    pub config: &'a DyniaConfig,
    pub dry_run: bool,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        compute: &'a dyn ComputeProvider,
        dns: &'a dyn DnsProvider,
        origin_ca: &'a dyn OriginCaProvider,
        executor: &'a dyn Executor,
        config: &'a DyniaConfig,
        dry_run: bool,
    ) -> Self {
        Self {
            compute,
            dns,
            origin_ca,
            executor,
            config,
            dry_run,
        }
    }

    fn dry_run_log(&self, action: &str) {
        info!(dry_run = true, "[DRY RUN] would {action}");
    }

    /// `createCluster`: VPC → first node id → first VM → Reserved IP
    /// find-or-create-and-bind → prepare the first node with single-node
    /// VRRP → persist `Cluster` and its first `ClusterNode`.
    pub async fn create_cluster(
        &self,
        store: &mut StateStore,
        name: &str,
        base_domain: &str,
        region: &str,
        size: &str,
    ) -> Result<()> {
        crate::state::validate::validate_cluster_name(name)?;
        crate::state::validate::validate_base_domain(base_domain)?;
        if store.get_cluster(name).is_some() {
            return Err(DyniaError::State(format!("cluster '{name}' already exists")));
        }

        if self.dry_run {
            self.dry_run_log(&format!(
                "create cluster '{name}' ({base_domain}) in {region}/{size}"
            ));
            return Ok(());
        }

        let vpc = self
            .compute
            .create_vpc(&format!("{name}-vpc"), region, "10.10.0.0/16")
            .await?;

        let node_id = names::generate_unique(1, &HashSet::new())
            .into_iter()
            .next()
            .expect("generate_unique(1, ..) always returns exactly one id");

        let vm = self
            .compute
            .create_vm(CreateVmRequest {
                name: ClusterNode::hostname_for(name, &node_id),
                region: region.to_string(),
                size: size.to_string(),
                image: "ubuntu-22-04-x64".to_string(),
                ssh_keys: vec![self.config.ssh_identity_name.clone()],
            })
            .await?;
        let vm = crate::retry::retry(crate::retry::RetryPolicy::vm_active(), "wait for VM active", || {
            self.compute.wait_vm_active(&vm.id, std::time::Duration::from_secs(300))
        })
        .await?;

        let reserved_ip = reserved_ip::assign_reserved_ip_to_vm(self.compute, &vm.id, region).await?;

        let cluster = Cluster {
            name: name.to_string(),
            base_domain: base_domain.to_string(),
            region: region.to_string(),
            size: size.to_string(),
            reserved_ip: Some(reserved_ip.ip.clone()),
            reserved_ip_id: Some(reserved_ip.id.clone()),
            vpc_id: Some(vpc.id),
            active_node_id: Some(node_id.clone()),
            created_at: Utc::now(),
        };

        let node = ClusterNode {
            cluster_id: name.to_string(),
            two_word_id: node_id.clone(),
            droplet_id: vm.id.clone(),
            hostname: ClusterNode::hostname_for(name, &node_id),
            public_ip: vm.public_ip.clone().ok_or_else(|| {
                DyniaError::State(format!("VM '{}' has no public IP after activation", vm.id))
            })?,
            private_ip: vm.private_ip.clone(),
            role: NodeRole::Active,
            priority: INITIAL_ACTIVE_PRIORITY,
            status: NodeStatus::Provisioning,
            created_at: Utc::now(),
        };

        let node_ref = node.clone();
        let input = PrepareInput {
            cluster: &cluster,
            all_nodes: &[&node_ref],
            local_node: &node_ref,
            routes: &[],
            listen_ports: &[80, 443],
        };
        prepare::prepare_node(self.executor, &input).await?;
        certificate::acquire(self.executor, self.origin_ca, &node.public_ip, base_domain).await?;

        let mut node = node;
        node.status = NodeStatus::Active;
        store.upsert_cluster(cluster);
        store.upsert_cluster_node(node);
        store.save()?;
        Ok(())
    }

    /// `addNode`: compute unique two-word ids, decreasing priorities from
    /// the cluster's current lowest, and create/prepare each sequentially.
    /// On a node's failure, remaining nodes are skipped and already-created
    /// ones remain `standby` in state (spec §4.6 `addNode`).
    pub async fn add_node(&self, store: &mut StateStore, cluster_name: &str, count: usize) -> Result<()> {
        if !(1..=10).contains(&count) {
            return Err(DyniaError::validation("addNode count must be between 1 and 10"));
        }
        let cluster = store
            .get_cluster(cluster_name)
            .cloned()
            .ok_or_else(|| DyniaError::not_found(format!("cluster '{cluster_name}' not found")))?;

        if self.dry_run {
            self.dry_run_log(&format!("add {count} node(s) to cluster '{cluster_name}'"));
            return Ok(());
        }

        let existing_ids: HashSet<String> = store
            .get_cluster_nodes(cluster_name)
            .iter()
            .map(|n| n.two_word_id.clone())
            .collect();
        let lowest_priority = store
            .get_cluster_nodes(cluster_name)
            .iter()
            .map(|n| n.priority)
            .min()
            .unwrap_or(INITIAL_ACTIVE_PRIORITY);

        let new_ids = names::generate_unique(count, &existing_ids);

        for (index, node_id) in new_ids.iter().enumerate() {
            let priority = lowest_priority.saturating_sub(PRIORITY_STEP * (index as u8 + 1));

            let vm = self
                .compute
                .create_vm(CreateVmRequest {
                    name: ClusterNode::hostname_for(cluster_name, node_id),
                    region: cluster.region.clone(),
                    size: cluster.size.clone(),
                    image: "ubuntu-22-04-x64".to_string(),
                    ssh_keys: vec![self.config.ssh_identity_name.clone()],
                })
                .await;

            let vm = match vm {
                Ok(vm) => vm,
                Err(err) => {
                    tracing::warn!(node = node_id, error = %err, "addNode: VM creation failed, skipping remaining nodes");
                    break;
                }
            };

            let node = ClusterNode {
                cluster_id: cluster_name.to_string(),
                two_word_id: node_id.clone(),
                droplet_id: vm.id.clone(),
                hostname: ClusterNode::hostname_for(cluster_name, node_id),
                public_ip: vm.public_ip.clone().unwrap_or_default(),
                private_ip: vm.private_ip.clone(),
                role: NodeRole::Standby,
                priority,
                status: NodeStatus::Provisioning,
                created_at: Utc::now(),
            };

            store.upsert_cluster_node(node.clone());
            store.save()?;

            let all_nodes: Vec<ClusterNode> = store
                .get_cluster_nodes(cluster_name)
                .into_iter()
                .cloned()
                .collect();
            let all_node_refs: Vec<&ClusterNode> = all_nodes.iter().collect();
            let routes: Vec<_> = store.get_cluster_routes(cluster_name).into_iter().cloned().collect();

            let input = PrepareInput {
                cluster: &cluster,
                all_nodes: &all_node_refs,
                local_node: &node,
                routes: &routes,
                listen_ports: &[80, 443],
            };

            match prepare::prepare_node(self.executor, &input).await {
                Ok(()) => {
                    let mut activated = node.clone();
                    activated.status = NodeStatus::Active;
                    store.upsert_cluster_node(activated);
                    store.save()?;
                }
                Err(err) => {
                    tracing::warn!(node = node_id, error = %err, "addNode: node preparation failed, skipping remaining nodes");
                    break;
                }
            }
        }

        Ok(())
    }
}
