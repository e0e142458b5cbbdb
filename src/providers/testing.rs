//! In-memory provider fakes, the Dynia analogue of the teacher's
//! wiremock-backed `MockEnterpriseServer`: instead of a mock HTTP server,
//! the provider traits let tests swap in a plain in-process double.

use super::compute::{ComputeProvider, CreateVmRequest, SshKeyInfo, VmInfo, VmStatus, VpcInfo};
use super::dns::{DnsProvider, DnsRecord};
use super::origin_ca::{CertificateRequest, OriginCaProvider};
use super::ReservedIpInfo;
use crate::error::{DyniaError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// A scripted compute backend: every VM is immediately active, every
/// Reserved IP assignment is recorded for assertions.
#[derive(Default)]
pub struct FakeComputeProvider {
    vms: Mutex<HashMap<String, VmInfo>>,
    reserved_ips: Mutex<HashMap<String, ReservedIpInfo>>,
    next_id: Mutex<u64>,
}

impl FakeComputeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut counter = self.next_id.lock().unwrap();
        *counter += 1;
        format!("{prefix}-{counter}")
    }

    pub fn seed_reserved_ip(&self, info: ReservedIpInfo) {
        self.reserved_ips.lock().unwrap().insert(info.id.clone(), info);
    }
}

#[async_trait]
impl ComputeProvider for FakeComputeProvider {
    async fn create_vm(&self, request: CreateVmRequest) -> Result<VmInfo> {
        let id = self.next_id("vm");
        let info = VmInfo {
            id: id.clone(),
            name: request.name,
            status: VmStatus::Active,
            public_ip: Some(format!("203.0.113.{}", self.vms.lock().unwrap().len() + 1)),
            private_ip: Some(format!("10.0.0.{}", self.vms.lock().unwrap().len() + 1)),
        };
        self.vms.lock().unwrap().insert(id, info.clone());
        Ok(info)
    }

    async fn get_vm(&self, id: &str) -> Result<VmInfo> {
        self.vms
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| DyniaError::not_found(format!("vm '{id}' not found")))
    }

    async fn delete_vm(&self, id: &str) -> Result<()> {
        self.vms.lock().unwrap().remove(id);
        Ok(())
    }

    async fn wait_vm_active(&self, id: &str, _timeout: Duration) -> Result<VmInfo> {
        self.get_vm(id).await
    }

    async fn create_reserved_ip(&self, region: &str) -> Result<ReservedIpInfo> {
        let id = self.next_id("reserved-ip");
        let info = ReservedIpInfo {
            id: id.clone(),
            ip: format!("198.51.100.{}", self.reserved_ips.lock().unwrap().len() + 1),
            region: region.to_string(),
            vm_id: None,
        };
        self.reserved_ips.lock().unwrap().insert(id, info.clone());
        Ok(info)
    }

    async fn list_reserved_ips(&self) -> Result<Vec<ReservedIpInfo>> {
        Ok(self.reserved_ips.lock().unwrap().values().cloned().collect())
    }

    async fn get_reserved_ip(&self, id: &str) -> Result<ReservedIpInfo> {
        self.reserved_ips
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| DyniaError::not_found(format!("reserved ip '{id}' not found")))
    }

    async fn assign_reserved_ip(&self, id: &str, vm_id: &str) -> Result<()> {
        let mut ips = self.reserved_ips.lock().unwrap();
        for other in ips.values_mut() {
            if other.vm_id.as_deref() == Some(vm_id) {
                other.vm_id = None;
            }
        }
        let entry = ips
            .get_mut(id)
            .ok_or_else(|| DyniaError::not_found(format!("reserved ip '{id}' not found")))?;
        entry.vm_id = Some(vm_id.to_string());
        Ok(())
    }

    async fn unassign_reserved_ip(&self, id: &str) -> Result<()> {
        let mut ips = self.reserved_ips.lock().unwrap();
        let entry = ips
            .get_mut(id)
            .ok_or_else(|| DyniaError::not_found(format!("reserved ip '{id}' not found")))?;
        entry.vm_id = None;
        Ok(())
    }

    async fn delete_reserved_ip(&self, id: &str) -> Result<()> {
        self.reserved_ips.lock().unwrap().remove(id);
        Ok(())
    }

    async fn create_vpc(&self, name: &str, region: &str, cidr: &str) -> Result<VpcInfo> {
        Ok(VpcInfo {
            id: self.next_id("vpc"),
            name: name.to_string(),
            region: region.to_string(),
            cidr: cidr.to_string(),
        })
    }

    async fn list_ssh_keys(&self) -> Result<Vec<SshKeyInfo>> {
        Ok(Vec::new())
    }

    async fn create_ssh_key(&self, name: &str, _public_key: &str) -> Result<SshKeyInfo> {
        Ok(SshKeyInfo {
            id: self.next_id("ssh-key"),
            name: name.to_string(),
            fingerprint: "00:11:22:33".to_string(),
        })
    }

    async fn get_ssh_key(&self, id: &str) -> Result<SshKeyInfo> {
        Ok(SshKeyInfo {
            id: id.to_string(),
            name: "fake".to_string(),
            fingerprint: "00:11:22:33".to_string(),
        })
    }

    async fn delete_ssh_key(&self, _id: &str) -> Result<()> {
        Ok(())
    }
}

/// A DNS backend that answers `wait_propagation` immediately once the
/// record has been upserted, and fails it otherwise.
#[derive(Default)]
pub struct FakeDnsProvider {
    records: Mutex<HashMap<String, DnsRecord>>,
    next_id: Mutex<u64>,
}

impl FakeDnsProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DnsProvider for FakeDnsProvider {
    async fn upsert_a(&self, name: &str, ip: &str, ttl: u32, proxied: bool) -> Result<DnsRecord> {
        let mut counter = self.next_id.lock().unwrap();
        *counter += 1;
        let record = DnsRecord {
            id: format!("dns-{counter}"),
            name: name.to_string(),
            ip: ip.to_string(),
            ttl,
            proxied,
        };
        self.records.lock().unwrap().insert(name.to_string(), record.clone());
        Ok(record)
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<DnsRecord>> {
        Ok(self.records.lock().unwrap().get(name).cloned())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.records.lock().unwrap().retain(|_, r| r.id != id);
        Ok(())
    }

    async fn wait_propagation(&self, fqdn: &str, expected_ip: &str, _timeout: Duration) -> Result<()> {
        match self.records.lock().unwrap().get(fqdn) {
            Some(record) if record.ip == expected_ip => Ok(()),
            Some(record) => Err(DyniaError::Health(format!(
                "fake resolver has {} for {fqdn}, expected {expected_ip}",
                record.ip
            ))),
            None => Err(DyniaError::Health(format!("no record for {fqdn}"))),
        }
    }
}

/// Returns a fixed PEM-shaped string, never calls out over the network.
pub struct FakeOriginCaProvider {
    pub fail: bool,
}

impl FakeOriginCaProvider {
    pub fn new() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

impl Default for FakeOriginCaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OriginCaProvider for FakeOriginCaProvider {
    async fn issue(&self, request: CertificateRequest) -> Result<String> {
        if self.fail {
            return Err(DyniaError::Provider(crate::error::ProviderError::permanent(
                "fake origin CA refused the request",
            )));
        }
        Ok(format!(
            "-----BEGIN CERTIFICATE-----\nfake-cert-for-{}\n-----END CERTIFICATE-----\n",
            request.hostnames.join(",")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_compute_provider_creates_and_reassigns_reserved_ip() {
        let provider = FakeComputeProvider::new();
        let vm_a = provider
            .create_vm(CreateVmRequest {
                name: "node-a".into(),
                region: "nyc3".into(),
                size: "s-1vcpu-1gb".into(),
                image: "ubuntu-22-04".into(),
                ssh_keys: vec![],
            })
            .await
            .unwrap();
        let vm_b = provider
            .create_vm(CreateVmRequest {
                name: "node-b".into(),
                region: "nyc3".into(),
                size: "s-1vcpu-1gb".into(),
                image: "ubuntu-22-04".into(),
                ssh_keys: vec![],
            })
            .await
            .unwrap();
        let ip = provider.create_reserved_ip("nyc3").await.unwrap();
        provider.assign_reserved_ip(&ip.id, &vm_a.id).await.unwrap();
        provider.assign_reserved_ip(&ip.id, &vm_b.id).await.unwrap();
        let reloaded = provider.get_reserved_ip(&ip.id).await.unwrap();
        assert_eq!(reloaded.vm_id, Some(vm_b.id));
    }

    #[tokio::test]
    async fn fake_dns_provider_waits_only_for_matching_record() {
        let provider = FakeDnsProvider::new();
        provider.upsert_a("app.example.com", "198.51.100.9", 60, false).await.unwrap();
        assert!(provider
            .wait_propagation("app.example.com", "198.51.100.9", Duration::from_secs(1))
            .await
            .is_ok());
        assert!(provider
            .wait_propagation("app.example.com", "198.51.100.1", Duration::from_secs(1))
            .await
            .is_err());
    }
}
