//! Naming rules, secret-leak scanning, and cross-entity invariants (spec §3).

use super::document::StateDocument;
use crate::error::{DyniaError, Result};
use crate::names::is_valid_two_word_id;
use std::collections::HashSet;

/// Substrings that must never appear in a key anywhere in the state
/// document (spec §3 invariant 6). Matching is case-insensitive.
const FORBIDDEN_KEY_SUBSTRINGS: &[&str] =
    &["token", "key", "secret", "password", "auth", "credential"];

/// Recursively scan a serialized value for any object key containing a
/// forbidden substring. Returns the first offending key path found.
pub fn scan_for_secrets(value: &serde_json::Value) -> Option<String> {
    scan_at(value, "$")
}

fn scan_at(value: &serde_json::Value, path: &str) -> Option<String> {
    match value {
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                let lower = key.to_ascii_lowercase();
                if FORBIDDEN_KEY_SUBSTRINGS.iter().any(|f| lower.contains(f)) {
                    return Some(format!("{path}.{key}"));
                }
                if let Some(found) = scan_at(child, &format!("{path}.{key}")) {
                    return Some(found);
                }
            }
            None
        }
        serde_json::Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                if let Some(found) = scan_at(item, &format!("{path}[{i}]")) {
                    return Some(found);
                }
            }
            None
        }
        _ => None,
    }
}

/// Reject writes that would persist a secret-shaped field.
pub fn reject_secrets(value: &serde_json::Value) -> Result<()> {
    if let Some(path) = scan_for_secrets(value) {
        return Err(DyniaError::SecretLeak(path));
    }
    Ok(())
}

/// Cluster name must be a lowercase DNS label: `^[a-z][a-z0-9-]*[a-z0-9]$`.
pub fn validate_cluster_name(name: &str) -> Result<()> {
    let bytes = name.as_bytes();
    let ok = !name.is_empty()
        && bytes[0].is_ascii_lowercase()
        && bytes[bytes.len() - 1] != b'-'
        && (bytes.len() == 1 || bytes[bytes.len() - 1].is_ascii_lowercase() || bytes[bytes.len() - 1].is_ascii_digit())
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-');
    if ok {
        Ok(())
    } else {
        Err(DyniaError::validation(format!(
            "cluster name '{name}' must match ^[a-z][a-z0-9-]*[a-z0-9]$"
        )))
    }
}

/// `baseDomain` must be a syntactically valid DNS name: dot-separated
/// labels of lowercase alphanumerics and hyphens, no empty labels.
pub fn validate_base_domain(domain: &str) -> Result<()> {
    let labels: Vec<&str> = domain.split('.').collect();
    let ok = labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-')
        });
    if ok {
        Ok(())
    } else {
        Err(DyniaError::validation(format!(
            "base domain '{domain}' is not a valid DNS name"
        )))
    }
}

/// `twoWordId` must match the curated vocabulary shape (spec §3 invariant 5).
pub fn validate_two_word_id(id: &str) -> Result<()> {
    if is_valid_two_word_id(id) {
        Ok(())
    } else {
        Err(DyniaError::validation(format!(
            "node id '{id}' must match ^[a-z]+-[a-z]+$"
        )))
    }
}

/// `healthPath` must start with `/` and be at most 255 characters.
pub fn validate_health_path(path: &str) -> Result<()> {
    if path.starts_with('/') && path.len() <= 255 {
        Ok(())
    } else {
        Err(DyniaError::validation(format!(
            "health path '{path}' must start with '/' and be at most 255 characters"
        )))
    }
}

/// Check every cross-entity invariant in spec §3/§8 against the whole
/// document. Run before every persisted save.
pub fn check_invariants(doc: &StateDocument) -> Result<()> {
    for cluster in &doc.clusters {
        let nodes: Vec<_> = doc
            .cluster_nodes
            .iter()
            .filter(|n| n.cluster_id == cluster.name)
            .collect();

        // Invariant 1: at most one active node; activeNodeId consistency.
        let active_nodes: Vec<_> = nodes
            .iter()
            .filter(|n| n.role == super::model::NodeRole::Active)
            .collect();
        if active_nodes.len() > 1 {
            return Err(DyniaError::state(format!(
                "cluster '{}' has {} active nodes, expected at most 1",
                cluster.name,
                active_nodes.len()
            )));
        }
        match (&cluster.active_node_id, active_nodes.first()) {
            (Some(id), Some(node)) if *id != node.two_word_id => {
                return Err(DyniaError::state(format!(
                    "cluster '{}' activeNodeId '{}' does not match the active node '{}'",
                    cluster.name, id, node.two_word_id
                )));
            }
            (Some(id), None) => {
                return Err(DyniaError::state(format!(
                    "cluster '{}' activeNodeId '{}' names no active node",
                    cluster.name, id
                )));
            }
            (None, Some(node)) => {
                return Err(DyniaError::state(format!(
                    "cluster '{}' has active node '{}' but activeNodeId is unset",
                    cluster.name, node.two_word_id
                )));
            }
            _ => {}
        }

        // Invariant 2: priorities strictly distinct; active node is the max.
        let mut priorities: Vec<u8> = nodes.iter().map(|n| n.priority).collect();
        priorities.sort_unstable();
        for window in priorities.windows(2) {
            if window[0] == window[1] {
                return Err(DyniaError::state(format!(
                    "cluster '{}' has duplicate node priority {}",
                    cluster.name, window[0]
                )));
            }
        }
        if let (Some(max_priority), Some(active)) = (priorities.last(), active_nodes.first()) {
            if active.priority != *max_priority {
                return Err(DyniaError::state(format!(
                    "cluster '{}' active node priority {} is not the maximum ({})",
                    cluster.name, active.priority, max_priority
                )));
            }
        }

        // Invariant 3: reservedIp <=> reservedIpId.
        if cluster.reserved_ip.is_some() != cluster.reserved_ip_id.is_some() {
            return Err(DyniaError::state(format!(
                "cluster '{}' has mismatched reservedIp/reservedIpId nullability",
                cluster.name
            )));
        }

        // Invariant 5: twoWordId shape.
        for node in &nodes {
            validate_two_word_id(&node.two_word_id)?;
        }
    }

    // Invariant 4: routes/nodes cannot outlive their cluster.
    let cluster_names: HashSet<&str> = doc.clusters.iter().map(|c| c.name.as_str()).collect();
    for node in &doc.cluster_nodes {
        if !cluster_names.contains(node.cluster_id.as_str()) {
            return Err(DyniaError::state(format!(
                "node '{}' references missing cluster '{}'",
                node.two_word_id, node.cluster_id
            )));
        }
    }
    for route in &doc.routes {
        if !cluster_names.contains(route.cluster_id.as_str()) {
            return Err(DyniaError::state(format!(
                "route '{}' references missing cluster '{}'",
                route.host, route.cluster_id
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_nested_secret_key() {
        let value = json!({"clusters": [{"name": "x", "apiToken": "abc"}]});
        assert_eq!(scan_for_secrets(&value), Some("$.clusters[0].apiToken".to_string()));
    }

    #[test]
    fn allows_clean_document() {
        let value = json!({"clusters": [{"name": "x", "region": "nyc3"}]});
        assert!(scan_for_secrets(&value).is_none());
    }

    #[test]
    fn cluster_name_rules() {
        assert!(validate_cluster_name("myapp").is_ok());
        assert!(validate_cluster_name("my-app-2").is_ok());
        assert!(validate_cluster_name("-leading").is_err());
        assert!(validate_cluster_name("trailing-").is_err());
        assert!(validate_cluster_name("Upper").is_err());
        assert!(validate_cluster_name("").is_err());
    }

    #[test]
    fn health_path_rules() {
        assert!(validate_health_path("/healthz").is_ok());
        assert!(validate_health_path("healthz").is_err());
        assert!(validate_health_path(&"/".repeat(256)).is_err());
    }
}
