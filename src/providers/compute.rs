//! Compute provider gateway: VMs, Reserved IPs, VPCs, and SSH keys
//! (spec §4.2, §6.1 `compute:` block).

use super::ReservedIpInfo;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Parameters for creating a VM. Mirrors the `{name,region,size,image,
/// sshKeys?}` request shape in spec §6.1.
#[derive(Debug, Clone)]
pub struct CreateVmRequest {
    pub name: String,
    pub region: String,
    pub size: String,
    pub image: String,
    pub ssh_keys: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmStatus {
    New,
    Active,
    Off,
    Errored,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VmInfo {
    pub id: String,
    pub name: String,
    pub status: VmStatus,
    pub public_ip: Option<String>,
    pub private_ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VpcInfo {
    pub id: String,
    pub name: String,
    pub region: String,
    pub cidr: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SshKeyInfo {
    pub id: String,
    pub name: String,
    pub fingerprint: String,
}

/// The compute capability the orchestrator depends on (spec §4.2). The
/// core never talks to a cloud API directly; it only ever sees this trait,
/// so a test double can stand in for a real account.
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    async fn create_vm(&self, request: CreateVmRequest) -> Result<VmInfo>;
    async fn get_vm(&self, id: &str) -> Result<VmInfo>;
    async fn delete_vm(&self, id: &str) -> Result<()>;

    /// Poll until the VM reports active and has at least a public address,
    /// per the 5 minute default ceiling in spec §4.7. Callers drive the
    /// poll loop themselves via [`crate::retry`] rather than this method
    /// blocking internally, so the timeout here bounds a single provider
    /// round trip, not the whole wait.
    async fn wait_vm_active(&self, id: &str, timeout: Duration) -> Result<VmInfo>;

    async fn create_reserved_ip(&self, region: &str) -> Result<ReservedIpInfo>;
    async fn list_reserved_ips(&self) -> Result<Vec<ReservedIpInfo>>;
    async fn get_reserved_ip(&self, id: &str) -> Result<ReservedIpInfo>;

    /// Atomic at the provider: binding to a new VM implicitly unassigns
    /// the previous holder (spec §4.2).
    async fn assign_reserved_ip(&self, id: &str, vm_id: &str) -> Result<()>;
    async fn unassign_reserved_ip(&self, id: &str) -> Result<()>;
    async fn delete_reserved_ip(&self, id: &str) -> Result<()>;

    async fn create_vpc(&self, name: &str, region: &str, cidr: &str) -> Result<VpcInfo>;
    async fn list_ssh_keys(&self) -> Result<Vec<SshKeyInfo>>;
    async fn create_ssh_key(&self, name: &str, public_key: &str) -> Result<SshKeyInfo>;
    async fn get_ssh_key(&self, id: &str) -> Result<SshKeyInfo>;
    async fn delete_ssh_key(&self, id: &str) -> Result<()>;
}
