//! Hand-off to the provisioning engine.
//!
//! The engine receives one complete descriptor set per run. Diffing against
//! realised state and dependency-ordered apply are its business; faults it
//! reports are passed back untouched.

use crate::error::EngineError;
use crate::graph::ResourceGraph;
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;

/// Summary of one accepted submission.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SubmitReport {
    pub resources: usize,
    /// Descriptors with at least one deferred reference.
    pub deferred: usize,
    pub location: String,
}

/// External collaborator that reconciles a descriptor set with live state.
#[async_trait]
pub trait ProvisioningEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Submit the whole graph at once. Never called with a partial set.
    async fn submit(&self, graph: &ResourceGraph) -> Result<SubmitReport, EngineError>;
}

/// Engine that writes the descriptor set as a pretty JSON manifest.
///
/// Deferred references stay encoded as `{"$ref": ..}` objects for a
/// downstream applier to resolve.
#[derive(Debug, Clone)]
pub struct ManifestEngine {
    pub path: PathBuf,
}

impl ManifestEngine {
    pub fn new(path: impl Into<PathBuf>) -> ManifestEngine {
        ManifestEngine { path: path.into() }
    }
}

#[async_trait]
impl ProvisioningEngine for ManifestEngine {
    fn name(&self) -> &str {
        "manifest"
    }

    async fn submit(&self, graph: &ResourceGraph) -> Result<SubmitReport, EngineError> {
        let json = serde_json::to_string_pretty(graph)?;
        tokio::fs::write(&self.path, json).await?;

        let report = SubmitReport {
            resources: graph.len(),
            deferred: graph.iter().filter(|d| !d.references().is_empty()).count(),
            location: self.path.display().to_string(),
        };
        log::info!(
            "Manifest written: {} resources ({} with deferred references) to {}",
            report.resources,
            report.deferred,
            report.location
        );
        Ok(report)
    }
}
