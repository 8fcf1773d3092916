//! VPC topology synthesis and resource graph construction.
//!
//! A run reads a [`StackConfig`], asks [`cloud`] for the usable zones,
//! partitions the VPC block with [`compute_subnet_plan`], wires every
//! resource with [`build_graph`] and hands the result to a
//! [`ProvisioningEngine`].

pub mod cloud;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod models;
pub mod output;
pub mod topology;

pub use config::{load_config, DeploymentProfile, StackConfig};
pub use engine::{ManifestEngine, ProvisioningEngine, SubmitReport};
pub use error::{EngineError, TopologyError, TopologyResult};
pub use graph::{build_graph, ResourceGraph, StackFacts};
pub use topology::{compute_subnet_plan, compute_subnet_plan_for_block};
