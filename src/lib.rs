//! Dynia control plane
//!
//! Dynia provisions and operates small high-availability clusters of cloud
//! virtual machines that terminate HTTPS for user services. A cluster is
//! one or more VMs in a single region behind a single floating public IP
//! (the "Reserved IP"); exactly one VM (the *active* node) holds it at any
//! instant, the others stand by fully prepared to take over.
//!
//! This crate is the cluster control plane: the persistent state model,
//! the orchestration algorithms (create/add/remove/activate a node, deploy
//! a route, prepare/repair a cluster), and the convergent node-preparation
//! engine that renders and applies per-node configuration over a remote
//! shell transport. The command-line front end, concrete cloud provider
//! SDKs, and the transport itself are external collaborators; this crate
//! exposes the trait seams (`providers`, `executor`) an embedding binary
//! plugs concrete implementations into.
//!
//! # Module organization
//!
//! - **State**: [`state`] — the `Cluster`/`ClusterNode`/`Route` data model,
//!   its invariants, and the atomic-write JSON store.
//! - **Providers**: [`providers`], [`reserved_ip`] — typed capability
//!   interfaces for compute/DNS/origin-CA, plus the Reserved-IP
//!   find-or-create-then-bind policy.
//! - **Node convergence**: [`prepare`], [`certificate`], [`executor`] —
//!   renders and converges the per-node proxy/load-balancer/VRRP stack and
//!   acquires TLS certificates over the remote executor.
//! - **Orchestration**: [`orchestrator`] — sequences the multi-step
//!   cluster operations with dry-run support.
//! - **Health**: [`health`] — internal and public readiness checks.
//! - **Ambient**: [`error`], [`config`], [`retry`], [`names`] — the error
//!   taxonomy, environment-derived configuration, the shared retry
//!   primitive, and the two-word node-id generator.
//!
//! # Example
//!
//! ```no_run
//! use dynia::config::DyniaConfig;
//! use dynia::orchestrator::Orchestrator;
//! use dynia::providers::HttpOriginCaProvider;
//! use dynia::state::StateStore;
//!
//! # async fn example(
//! #     compute: &dyn dynia::providers::ComputeProvider,
//! #     dns: &dyn dynia::providers::DnsProvider,
//! #     executor: &dyn dynia::executor::Executor,
//! # ) -> dynia::error::Result<()> {
//! let config = DyniaConfig::from_env()?;
//! let origin_ca = HttpOriginCaProvider::builder(&config.origin_ca_user_key).build()?;
//! let mut store = StateStore::open(".dynia/state.json")?;
//!
//! let orchestrator = Orchestrator::new(compute, dns, &origin_ca, executor, &config, false);
//! orchestrator
//!     .create_cluster(&mut store, "myapp", "example.com", "nyc3", "s-1vcpu-1gb")
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod certificate;
pub mod config;
pub mod error;
pub mod executor;
pub mod health;
pub mod names;
pub mod orchestrator;
pub mod prepare;
pub mod providers;
pub mod reserved_ip;
pub mod retry;
pub mod state;

pub use config::DyniaConfig;
pub use error::{DyniaError, Result};
pub use orchestrator::Orchestrator;
pub use state::{Cluster, ClusterNode, NodeRole, NodeStatus, Route, StateStore};
