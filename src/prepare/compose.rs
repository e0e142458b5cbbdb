//! Entry-service and entry-port selection from a user-supplied compose
//! document (spec §4.4 "Entry-service selection for a compose file").

use crate::error::{DyniaError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

/// `services:` parsed into a `serde_yaml::Mapping` rather than a `HashMap`
/// because step 3 of the selection rule needs document order, which a
/// `Mapping` preserves and a hash-based map does not.
#[derive(Debug, Deserialize)]
struct ComposeDocument {
    services: serde_yaml::Mapping,
}

#[derive(Debug, Deserialize)]
struct ComposeService {
    #[serde(default)]
    labels: Labels,
    #[serde(default)]
    ports: Vec<PortMapping>,
}

/// Compose allows `labels` as either a map or a `KEY=VALUE` list; both
/// shapes are accepted here since real compose files use both.
#[derive(Debug, Default, Deserialize)]
#[serde(untagged)]
enum Labels {
    #[default]
    None,
    Map(BTreeMap<String, String>),
    List(Vec<String>),
}

impl Labels {
    fn get(&self, key: &str) -> Option<String> {
        match self {
            Labels::None => None,
            Labels::Map(map) => map.get(key).cloned(),
            Labels::List(list) => list.iter().find_map(|entry| {
                entry
                    .split_once('=')
                    .filter(|(k, _)| *k == key)
                    .map(|(_, v)| v.to_string())
            }),
        }
    }
}

/// A compose `ports:` entry, accepting both the short `"8080:80"` form and
/// the long mapping form; only the container-side port matters here.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortMapping {
    Short(String),
    Long { target: u16 },
}

impl PortMapping {
    fn container_port(&self) -> Option<u16> {
        match self {
            PortMapping::Long { target } => Some(*target),
            PortMapping::Short(spec) => spec
                .rsplit(':')
                .next()
                .and_then(|p| p.split('/').next())
                .and_then(|p| p.parse().ok()),
        }
    }
}

/// Resolved deployment target: which compose service backs a route, and
/// on which container port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryTarget {
    pub service: String,
    pub port: u16,
}

/// Select the entry service and port per the three-step precedence in
/// spec §4.4.
pub fn select_entry_target(compose_yaml: &str) -> Result<EntryTarget> {
    let doc: ComposeDocument = serde_yaml::from_str(compose_yaml)
        .map_err(|e| DyniaError::Schema(format!("invalid compose document: {e}")))?;
    if doc.services.is_empty() {
        return Err(DyniaError::validation(
            "compose document declares no services",
        ));
    }

    let services: Vec<(String, ComposeService)> = doc
        .services
        .iter()
        .map(|(key, value)| {
            let name = key
                .as_str()
                .ok_or_else(|| DyniaError::Schema("service name must be a string".into()))?
                .to_string();
            let service: ComposeService = serde_yaml::from_value(value.clone())
                .map_err(|e| DyniaError::Schema(format!("service '{name}': {e}")))?;
            Ok((name, service))
        })
        .collect::<Result<_>>()?;

    let service_name = services
        .iter()
        .find(|(_, svc)| svc.labels.get("dynia.entry").as_deref() == Some("true"))
        .map(|(name, _)| name.clone())
        .or_else(|| services.iter().find(|(name, _)| name == "web").map(|(name, _)| name.clone()))
        .or_else(|| services.first().map(|(name, _)| name.clone()))
        .expect("non-empty services checked above");

    let service = &services
        .iter()
        .find(|(name, _)| *name == service_name)
        .expect("service_name was derived from services")
        .1;

    let port = match service.labels.get("dynia.port") {
        Some(raw) => raw.parse::<u16>().ok().filter(|p| *p >= 1).ok_or_else(|| {
            DyniaError::validation(format!(
                "service '{service_name}' dynia.port label '{raw}' must parse as 1-65535"
            ))
        })?,
        None => service
            .ports
            .first()
            .and_then(PortMapping::container_port)
            .ok_or_else(|| {
                DyniaError::validation(format!(
                    "MissingEntryPort: service '{service_name}' exposes no ports and has no dynia.port label"
                ))
            })?,
    };

    Ok(EntryTarget {
        service: service_name,
        port,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_the_entry_labeled_service() {
        let yaml = r#"
services:
  web:
    ports: ["8080:80"]
  api:
    labels:
      dynia.entry: "true"
    ports: ["9000:9000"]
"#;
        let target = select_entry_target(yaml).unwrap();
        assert_eq!(target.service, "api");
        assert_eq!(target.port, 9000);
    }

    #[test]
    fn falls_back_to_service_named_web() {
        let yaml = r#"
services:
  worker:
    ports: ["7000:7000"]
  web:
    ports: ["3000:3000"]
"#;
        let target = select_entry_target(yaml).unwrap();
        assert_eq!(target.service, "web");
        assert_eq!(target.port, 3000);
    }

    #[test]
    fn falls_back_to_the_first_service_in_document_order() {
        let yaml = r#"
services:
  app:
    ports: ["4000:4000"]
  other:
    ports: ["5000:5000"]
"#;
        let target = select_entry_target(yaml).unwrap();
        assert_eq!(target.service, "app");
    }

    #[test]
    fn dynia_port_label_overrides_exposed_ports() {
        let yaml = r#"
services:
  web:
    labels:
      dynia.port: "6000"
    ports: ["3000:3000"]
"#;
        let target = select_entry_target(yaml).unwrap();
        assert_eq!(target.port, 6000);
    }

    #[test]
    fn fails_with_missing_entry_port_when_nothing_is_exposed() {
        let yaml = r#"
services:
  web: {}
"#;
        let err = select_entry_target(yaml).unwrap_err();
        assert!(err.to_string().contains("MissingEntryPort"));
    }
}
