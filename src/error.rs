//! Error types surfaced by the topology core and the provisioning seam.

use thiserror::Error;

/// Result type alias for synthesizer and graph builder operations.
pub type TopologyResult<T> = Result<T, TopologyError>;

/// Errors raised while computing a subnet plan or wiring the resource graph.
///
/// All variants are deterministic: retrying with the same input yields the
/// same error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    /// Malformed VPC CIDR, empty zone list, zero desired zone count or any
    /// other configuration value rejected before synthesis.
    #[error("Invalid topology config: {0}")]
    InvalidTopologyConfig(String),

    /// The VPC block cannot be split into the required number of subnets.
    #[error("Address space exhausted: {vpc_block} cannot hold {required_subnets} subnets")]
    AddressSpaceExhausted {
        vpc_block: String,
        required_subnets: u64,
    },

    /// Internal contract breach in the graph builder.
    #[error("Graph wiring violation: {0}")]
    GraphWiringViolation(String),
}

/// Faults reported by a provisioning engine; passed through untouched.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
