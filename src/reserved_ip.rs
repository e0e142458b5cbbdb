//! Reserved-IP Service (C5): find-or-create-then-bind allocation policy
//! (spec §4.3).

use crate::error::Result;
use crate::providers::{ComputeProvider, ReservedIpInfo};

/// `assignReservedIpToVm`: list Reserved IPs, filter to the region with no
/// bound VM, pick the first; if none exists, create one; then bind it to
/// `vm_id`. No state is written here — the caller records the result.
pub async fn assign_reserved_ip_to_vm(
    provider: &dyn ComputeProvider,
    vm_id: &str,
    region: &str,
) -> Result<ReservedIpInfo> {
    let existing = provider
        .list_reserved_ips()
        .await?
        .into_iter()
        .find(|ip| ip.region == region && ip.vm_id.is_none());

    let target = match existing {
        Some(ip) => ip,
        None => provider.create_reserved_ip(region).await?,
    };

    provider.assign_reserved_ip(&target.id, vm_id).await?;
    provider.get_reserved_ip(&target.id).await
}

/// `reassign`: bind an existing Reserved IP to a new VM. The provider's
/// atomic assign implicitly releases the previous holder.
pub async fn reassign(
    provider: &dyn ComputeProvider,
    ip_id: &str,
    new_vm_id: &str,
) -> Result<ReservedIpInfo> {
    provider.assign_reserved_ip(ip_id, new_vm_id).await?;
    provider.get_reserved_ip(ip_id).await
}

/// Supplemented read-only surface: every Reserved IP currently allocated
/// in a region, for `dynia reserved-ip list`.
pub async fn list_in_region(
    provider: &dyn ComputeProvider,
    region: &str,
) -> Result<Vec<ReservedIpInfo>> {
    Ok(provider
        .list_reserved_ips()
        .await?
        .into_iter()
        .filter(|ip| ip.region == region)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testing::FakeComputeProvider;

    #[tokio::test]
    async fn reuses_an_unbound_ip_in_region_before_creating_one() {
        let provider = FakeComputeProvider::new();
        let seeded = ReservedIpInfo {
            id: "reserved-ip-1".into(),
            ip: "198.51.100.5".into(),
            region: "nyc3".into(),
            vm_id: None,
        };
        provider.seed_reserved_ip(seeded.clone());

        let result = assign_reserved_ip_to_vm(&provider, "vm-1", "nyc3").await.unwrap();
        assert_eq!(result.id, seeded.id);
        assert_eq!(result.vm_id, Some("vm-1".to_string()));
        assert_eq!(provider.list_reserved_ips().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn creates_a_new_ip_when_none_are_free_in_region() {
        let provider = FakeComputeProvider::new();
        let result = assign_reserved_ip_to_vm(&provider, "vm-1", "sfo3").await.unwrap();
        assert_eq!(result.region, "sfo3");
        assert_eq!(result.vm_id, Some("vm-1".to_string()));
    }

    #[tokio::test]
    async fn reassign_moves_the_ip_to_the_new_vm() {
        let provider = FakeComputeProvider::new();
        let ip = assign_reserved_ip_to_vm(&provider, "vm-1", "nyc3").await.unwrap();
        let moved = reassign(&provider, &ip.id, "vm-2").await.unwrap();
        assert_eq!(moved.vm_id, Some("vm-2".to_string()));
    }
}
