//! Construction-time options for the coherence engine and the residue store.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CoherenceError, Result};

/// Tunable options shared by [`crate::CoherenceEngine`] and
/// [`crate::ResidueStore`].
///
/// Missing fields in a JSON config fall back to [`Default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Maximum allowable divergence between unit phase and motion vectors.
    pub s_max: f64,
    /// Weight of internal feedback against external feedback, in [0,1].
    pub alpha: f64,
    /// Per-layer weights used by the residue-tensor reduction when the caller
    /// supplies none.
    pub layer_weights: Option<Vec<f64>>,
    /// Number of model layers tracked by the residue tensor.
    pub layers: usize,
    /// Maximum token sequence length tracked by the residue tensor.
    pub tokens: usize,
    /// Maximum recursion depth tracked by the residue tensor.
    pub depths: usize,
    /// Logical timestamp stamped on every residue event.
    pub current_step: u64,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            s_max: 1.0,
            alpha: 0.6,
            layer_weights: None,
            layers: 12,
            tokens: 100,
            depths: 5,
            current_step: 0,
        }
    }
}

impl DiagnosticsConfig {
    /// Check every field once so the hot path never has to.
    pub fn validate(&self) -> Result<()> {
        if !self.s_max.is_finite() || self.s_max <= 0.0 {
            return Err(CoherenceError::InvalidConfig(format!(
                "s_max must be finite and positive, got {}",
                self.s_max
            )));
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(CoherenceError::InvalidConfig(format!(
                "alpha must lie in [0, 1], got {}",
                self.alpha
            )));
        }
        for (name, dim) in [
            ("layers", self.layers),
            ("tokens", self.tokens),
            ("depths", self.depths),
        ] {
            if dim == 0 {
                return Err(CoherenceError::InvalidConfig(format!(
                    "{name} must be at least 1"
                )));
            }
        }
        let bad_weight = self
            .layer_weights
            .as_deref()
            .and_then(|weights| weights.iter().position(|w| !w.is_finite()));
        if let Some(bad) = bad_weight {
            return Err(CoherenceError::InvalidConfig(format!(
                "layer_weights[{bad}] is not finite"
            )));
        }
        Ok(())
    }

    /// Tensor shape `[classes, layers, tokens, depths]` implied by this config.
    pub fn tensor_shape(&self) -> [usize; 4] {
        [
            crate::residue::RESIDUE_CLASSES,
            self.layers,
            self.tokens,
            self.depths,
        ]
    }
}

/// Load and validate a JSON config from disk.
pub fn load_config_from_path(path: &Path) -> Result<DiagnosticsConfig> {
    let raw = std::fs::read_to_string(path)?;
    let config: DiagnosticsConfig = serde_json::from_str(&raw)?;
    config.validate()?;
    Ok(config)
}
