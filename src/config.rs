//! Environment-derived configuration (spec §6.5)
//!
//! The control plane refuses to start an operation rather than run with
//! partial secrets; every missing variable is named in one error, not just
//! the first encountered, so a misconfigured deployment can be fixed in one
//! pass.

use crate::error::{DyniaError, Result};
use std::env;

/// Operational configuration loaded from the environment. Never printed or
/// logged in full (see [`DyniaConfig::redacted`]) since several fields are
/// secrets per the §3 forbidden-key-name rule.
#[derive(Clone)]
pub struct DyniaConfig {
    pub compute_token: String,
    pub dns_token: String,
    pub dns_zone_id: String,
    pub origin_ca_user_key: String,
    pub ssh_identity_name: String,
    pub default_region: String,
    pub default_vm_size: String,
    pub default_base_domain: String,
}

struct Required {
    env_var: &'static str,
    value: Option<String>,
}

impl DyniaConfig {
    pub fn from_env() -> Result<Self> {
        let mut missing = Vec::new();
        let mut take = |name: &'static str| -> Required {
            let value = env::var(name).ok().filter(|v| !v.is_empty());
            if value.is_none() {
                missing.push(name);
            }
            Required { env_var: name, value }
        };

        let compute_token = take("DYNIA_COMPUTE_TOKEN");
        let dns_token = take("DYNIA_DNS_TOKEN");
        let dns_zone_id = take("DYNIA_DNS_ZONE_ID");
        let origin_ca_user_key = take("DYNIA_ORIGIN_CA_USER_KEY");
        let ssh_identity_name = take("DYNIA_SSH_IDENTITY_NAME");
        let default_region = take("DYNIA_DEFAULT_REGION");
        let default_vm_size = take("DYNIA_DEFAULT_VM_SIZE");
        let default_base_domain = take("DYNIA_DEFAULT_BASE_DOMAIN");

        if !missing.is_empty() {
            return Err(DyniaError::validation(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        Ok(DyniaConfig {
            compute_token: compute_token.value.unwrap(),
            dns_token: dns_token.value.unwrap(),
            dns_zone_id: dns_zone_id.value.unwrap(),
            origin_ca_user_key: origin_ca_user_key.value.unwrap(),
            ssh_identity_name: ssh_identity_name.value.unwrap(),
            default_region: default_region.value.unwrap(),
            default_vm_size: default_vm_size.value.unwrap(),
            default_base_domain: default_base_domain.value.unwrap(),
        })
    }

    /// A Debug-safe view with every secret field masked, for logging.
    pub fn redacted(&self) -> String {
        format!(
            "DyniaConfig {{ region: {}, vm_size: {}, base_domain: {}, ssh_identity: {}, compute_token: \"***\", dns_token: \"***\", origin_ca_user_key: \"***\" }}",
            self.default_region, self.default_vm_size, self.default_base_domain, self.ssh_identity_name
        )
    }
}

impl std::fmt::Debug for DyniaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.redacted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_all() {
        for var in [
            "DYNIA_COMPUTE_TOKEN",
            "DYNIA_DNS_TOKEN",
            "DYNIA_DNS_ZONE_ID",
            "DYNIA_ORIGIN_CA_USER_KEY",
            "DYNIA_SSH_IDENTITY_NAME",
            "DYNIA_DEFAULT_REGION",
            "DYNIA_DEFAULT_VM_SIZE",
            "DYNIA_DEFAULT_BASE_DOMAIN",
        ] {
            unsafe { env::remove_var(var) };
        }
    }

    #[test]
    #[serial]
    fn reports_every_missing_variable_at_once() {
        clear_all();
        unsafe { env::set_var("DYNIA_COMPUTE_TOKEN", "tok") };
        let err = DyniaConfig::from_env().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("DYNIA_DNS_TOKEN"));
        assert!(message.contains("DYNIA_DEFAULT_BASE_DOMAIN"));
        assert!(!message.contains("DYNIA_COMPUTE_TOKEN"));
        clear_all();
    }

    #[test]
    #[serial]
    fn builds_when_all_present() {
        clear_all();
        unsafe {
            env::set_var("DYNIA_COMPUTE_TOKEN", "tok");
            env::set_var("DYNIA_DNS_TOKEN", "dtok");
            env::set_var("DYNIA_DNS_ZONE_ID", "zone");
            env::set_var("DYNIA_ORIGIN_CA_USER_KEY", "cakey");
            env::set_var("DYNIA_SSH_IDENTITY_NAME", "id");
            env::set_var("DYNIA_DEFAULT_REGION", "nyc3");
            env::set_var("DYNIA_DEFAULT_VM_SIZE", "s-1vcpu-1gb");
            env::set_var("DYNIA_DEFAULT_BASE_DOMAIN", "example.com");
        }
        let cfg = DyniaConfig::from_env().unwrap();
        assert_eq!(cfg.default_region, "nyc3");
        assert!(!cfg.redacted().contains("tok"));
        clear_all();
    }
}
