//! Stability metrics derived from coherence measurements.
//!
//! These consume engine outputs plus auxiliary parameters (operation counts,
//! bandwidth, resilience, depth) and never touch engine state.

use serde::{Deserialize, Serialize};

use crate::components::{NEAR_ZERO, clamp01};
use crate::error::{CoherenceError, Result};

/// Default coherence floor used by depth scans.
pub const DEFAULT_SAFE_THRESHOLD: f64 = 0.7;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Recursive compression coefficient `γ = ln(N/w + 1)`.
///
/// Zero bandwidth has no finite compression; it is carried as
/// [`CompressionCoefficient::Unbounded`] so no consumer can mistake it for a
/// number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CompressionCoefficient {
    Finite(f64),
    Unbounded,
}

impl CompressionCoefficient {
    pub fn is_unbounded(self) -> bool {
        matches!(self, Self::Unbounded)
    }

    /// Finite value, if any.
    pub fn finite(self) -> Option<f64> {
        match self {
            Self::Finite(v) => Some(v),
            Self::Unbounded => None,
        }
    }

    /// IEEE view for display and plotting: `Unbounded` becomes `+inf`.
    pub fn as_f64(self) -> f64 {
        self.finite().unwrap_or(f64::INFINITY)
    }
}

impl std::fmt::Display for CompressionCoefficient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Finite(v) => write!(f, "{v:.4}"),
            Self::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// Outcome of comparing a coherence value against a collapse threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollapseVerdict {
    pub collapsed: bool,
    /// 0 when not collapsed, otherwise `(threshold - coherence) / threshold`
    /// capped at 1.
    pub severity: f64,
}

/// First collapse found while scanning a per-depth coherence series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecursiveCollapse {
    pub collapsed: bool,
    /// Depth of the first failing value, or the series length if none failed.
    pub depth: usize,
    pub severity: f64,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// `ln(operations / bandwidth + 1)`, unbounded when bandwidth is at or below
/// [`NEAR_ZERO`].
pub fn recursive_compression_coefficient(operations: u64, bandwidth: f64) -> CompressionCoefficient {
    if bandwidth <= NEAR_ZERO {
        return CompressionCoefficient::Unbounded;
    }
    CompressionCoefficient::Finite((operations as f64 / bandwidth + 1.0).ln())
}

/// Attractor activation strength `1 - γ/N`, clamped to [0,1].
///
/// No operations means no attractor, and unbounded compression drives the
/// strength to zero.
pub fn attractor_strength(operations: u64, gamma: CompressionCoefficient) -> f64 {
    if operations < 1 {
        return 0.0;
    }
    match gamma {
        CompressionCoefficient::Finite(g) => clamp01(1.0 - g / operations as f64),
        CompressionCoefficient::Unbounded => 0.0,
    }
}

/// Width of the safe operating zone, `√(λ · r · B · C)`.
pub fn calculate_beverly_band(
    elastic_tolerance: f64,
    resilience: f64,
    bounded_integrity: f64,
    recursive_energy: f64,
) -> f64 {
    if elastic_tolerance < 0.0
        || resilience < 0.0
        || bounded_integrity < 0.0
        || recursive_energy < 0.0
    {
        return 0.0;
    }
    (elastic_tolerance * resilience * bounded_integrity * recursive_energy).sqrt()
}

/// Coherence level below which collapse becomes likely.
///
/// Rises 0.1 per recursion level, falls 0.4 per unit of elastic tolerance,
/// clamped to [0.1, 0.9].
pub fn collapse_threshold(elastic_tolerance: f64, recursive_depth: u32) -> f64 {
    let threshold = 0.3 + 0.1 * f64::from(recursive_depth) - 0.4 * elastic_tolerance;
    threshold.clamp(0.1, 0.9)
}

/// Compare a coherence value against a collapse threshold.
///
/// Severity always lies in [0,1], even for a non-positive threshold.
pub fn detect_collapse(coherence: f64, threshold: f64) -> CollapseVerdict {
    let collapsed = coherence < threshold;
    let severity = if collapsed {
        clamp01((threshold - coherence) / threshold)
    } else {
        0.0
    };
    CollapseVerdict {
        collapsed,
        severity,
    }
}

/// Number of leading depths whose coherence stays at or above `threshold`.
pub fn safe_recursive_depth(coherence_history: &[f64], threshold: f64) -> usize {
    coherence_history
        .iter()
        .position(|&c| c < threshold)
        .unwrap_or(coherence_history.len())
}

/// Locate the first depth whose coherence drops below `threshold` and grade
/// how far below it fell.
pub fn detect_recursive_collapse(coherence_values: &[f64], threshold: f64) -> RecursiveCollapse {
    for (depth, &coherence) in coherence_values.iter().enumerate() {
        let verdict = detect_collapse(coherence, threshold);
        if verdict.collapsed {
            return RecursiveCollapse {
                collapsed: true,
                depth,
                severity: verdict.severity,
            };
        }
    }
    RecursiveCollapse {
        collapsed: false,
        depth: coherence_values.len(),
        severity: 0.0,
    }
}

/// Per-layer residue `Δp_i · (1 - τ_i) · ω_i`.
///
/// `weights` defaults to all ones. Lengths must agree.
pub fn symbolic_residue_tensor(
    coherence_deviations: &[f64],
    phase_alignments: &[f64],
    weights: Option<&[f64]>,
) -> Result<Vec<f64>> {
    let n = coherence_deviations.len();
    if phase_alignments.len() != n {
        return Err(CoherenceError::LengthMismatch {
            what: "phase_alignments",
            expected: n,
            got: phase_alignments.len(),
        });
    }
    if let Some(w) = weights {
        if w.len() != n {
            return Err(CoherenceError::LengthMismatch {
                what: "layer_weights",
                expected: n,
                got: w.len(),
            });
        }
    }

    Ok(coherence_deviations
        .iter()
        .zip(phase_alignments)
        .enumerate()
        .map(|(i, (dev, tau))| {
            let w = weights.map_or(1.0, |w| w[i]);
            dev * (1.0 - tau) * w
        })
        .collect())
}
