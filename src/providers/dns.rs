//! DNS provider gateway (spec §4.2, §6.1 `dns:` block).

use crate::error::{DyniaError, Result};
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct DnsRecord {
    pub id: String,
    pub name: String,
    pub ip: String,
    pub ttl: u32,
    pub proxied: bool,
}

/// The DNS capability the orchestrator depends on. `wait_propagation`
/// resolves through at least two independent public resolvers and only
/// returns once *all* of them agree with `expected_ip` (spec §4.2).
#[async_trait]
pub trait DnsProvider: Send + Sync {
    async fn upsert_a(&self, name: &str, ip: &str, ttl: u32, proxied: bool) -> Result<DnsRecord>;
    async fn get_by_name(&self, name: &str) -> Result<Option<DnsRecord>>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn wait_propagation(&self, fqdn: &str, expected_ip: &str, timeout: Duration) -> Result<()>;
}

/// Resolve `fqdn` through every configured resolver and succeed only when
/// all agree with `expected_ip`. Callers in production inject resolvers
/// backed by independent public DNS services; this helper is shared by
/// concrete [`DnsProvider`] implementations so the agreement rule lives in
/// one place.
pub async fn all_resolvers_agree<F, Fut>(
    fqdn: &str,
    expected_ip: &str,
    resolvers: &[F],
) -> Result<()>
where
    F: Fn(String) -> Fut,
    Fut: std::future::Future<Output = Result<String>>,
{
    for resolver in resolvers {
        let resolved = resolver(fqdn.to_string()).await?;
        if resolved != expected_ip {
            return Err(DyniaError::Health(format!(
                "resolver returned {resolved} for {fqdn}, expected {expected_ip}"
            )));
        }
    }
    Ok(())
}
