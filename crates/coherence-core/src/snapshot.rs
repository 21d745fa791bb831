//! JSON persistence of a diagnostic run.
//!
//! A snapshot carries everything needed to rebuild a [`ResidueStore`] (and,
//! optionally, the engine history) in another process. On reload the stored
//! tensor shape is authoritative: the dimensions declared in the saved config
//! are overwritten by it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::DiagnosticsConfig;
use crate::engine::{CoherenceEngine, RunHistory};
use crate::error::{CoherenceError, Result};
use crate::residue::{ResidueAnalysis, ResidueEvent, ResidueStore, ResidueTensor};

/// Current on-disk format.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticSnapshot {
    pub format_version: u32,
    pub config: DiagnosticsConfig,
    pub tensor: ResidueTensor,
    #[serde(default)]
    pub attribution_voids: Vec<ResidueEvent>,
    #[serde(default)]
    pub token_hesitations: Vec<ResidueEvent>,
    #[serde(default)]
    pub recursive_collapses: Vec<ResidueEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<RunHistory>,
    /// Analysis at capture time, if the tensor held any residue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<ResidueAnalysis>,
}

impl DiagnosticSnapshot {
    /// Capture the store's state and, if given, the engine's run history.
    pub fn capture(store: &ResidueStore, engine: Option<&CoherenceEngine>) -> Self {
        let analysis = match store.analyze_residue_pattern() {
            Ok(analysis) if analysis.is_finite() => Some(analysis),
            Ok(_) => {
                log::warn!("snapshot taken without analysis: non-finite statistics");
                None
            }
            Err(CoherenceError::NoResidueData) => None,
            Err(e) => {
                log::warn!("snapshot taken without analysis: {e}");
                None
            }
        };

        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            config: store.config().clone(),
            tensor: store.tensor().clone(),
            attribution_voids: store.attribution_voids().to_vec(),
            token_hesitations: store.token_hesitations().to_vec(),
            recursive_collapses: store.recursive_collapses().to_vec(),
            history: engine.map(|e| e.history().clone()),
            analysis,
        }
    }

    pub fn write_to_path(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        log::info!(
            "saved diagnostic snapshot to {} ({} events)",
            path.display(),
            self.event_count()
        );
        Ok(())
    }

    pub fn read_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let snapshot: Self = serde_json::from_str(&contents)?;
        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            log::warn!(
                "snapshot {} has format version {}, newer than supported {}",
                path.display(),
                snapshot.format_version,
                SNAPSHOT_FORMAT_VERSION
            );
        }
        log::info!(
            "loaded diagnostic snapshot from {} (shape {:?}, {} events)",
            path.display(),
            snapshot.tensor.shape(),
            snapshot.event_count()
        );
        Ok(snapshot)
    }

    pub fn event_count(&self) -> usize {
        self.attribution_voids.len() + self.token_hesitations.len() + self.recursive_collapses.len()
    }

    /// Rebuild the residue store; dimensions come from the stored tensor.
    pub fn into_store(self) -> Result<ResidueStore> {
        ResidueStore::from_parts(
            self.config,
            self.tensor,
            self.attribution_voids,
            self.token_hesitations,
            self.recursive_collapses,
        )
    }

    /// Rebuild an engine carrying the saved history (empty if none was saved).
    pub fn restore_engine(&self) -> Result<CoherenceEngine> {
        CoherenceEngine::with_history(
            self.config.clone(),
            self.history.clone().unwrap_or_default(),
        )
    }
}
