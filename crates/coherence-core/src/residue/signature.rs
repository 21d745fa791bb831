//! Nearest-signature classification of residue patterns.
//!
//! A tensor is summarized as a feature vector
//! `[class ratios (3), per-layer shares (L), depth slope (1)]` and compared by
//! cosine distance against a fixed catalog of reference signatures. The
//! catalog values are calibration constants and are never fitted to data.

use serde::{Deserialize, Serialize};

use super::{ResidueClass, ResidueTensor};

const EPSILON: f64 = 1e-10;

/// Named reference pattern of residue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidueSignature {
    AttributionGap,
    PhaseMisalignment,
    BoundaryErosion,
    TemporalInstability,
    AttractorDissolution,
}

impl ResidueSignature {
    /// Catalog order; ties resolve to the earlier entry.
    pub const ALL: [ResidueSignature; 5] = [
        ResidueSignature::AttributionGap,
        ResidueSignature::PhaseMisalignment,
        ResidueSignature::BoundaryErosion,
        ResidueSignature::TemporalInstability,
        ResidueSignature::AttractorDissolution,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResidueSignature::AttributionGap => "attribution_gap",
            ResidueSignature::PhaseMisalignment => "phase_misalignment",
            ResidueSignature::BoundaryErosion => "boundary_erosion",
            ResidueSignature::TemporalInstability => "temporal_instability",
            ResidueSignature::AttractorDissolution => "attractor_dissolution",
        }
    }

    /// Reference feature vector.
    pub fn reference(self) -> &'static [f64] {
        match self {
            ResidueSignature::AttributionGap => &[0.7, 0.2, 0.1, 0.6, 0.3, 0.1, 0.2],
            ResidueSignature::PhaseMisalignment => &[0.2, 0.3, 0.5, 0.2, 0.2, 0.6, 0.8],
            ResidueSignature::BoundaryErosion => &[0.4, 0.4, 0.2, 0.2, 0.6, 0.2, 0.1],
            ResidueSignature::TemporalInstability => &[0.3, 0.6, 0.1, 0.4, 0.4, 0.2, -0.5],
            ResidueSignature::AttractorDissolution => &[0.2, 0.3, 0.5, 0.3, 0.3, 0.4, 0.3],
        }
    }
}

impl std::fmt::Display for ResidueSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignatureDistance {
    pub signature: ResidueSignature,
    pub distance: f64,
}

/// Classification result with full distance table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureClassification {
    pub primary_signature: ResidueSignature,
    /// `1 / (1 + distance)` to the primary signature.
    pub confidence: f64,
    /// Distance to every catalog entry, in catalog order.
    pub distances: Vec<SignatureDistance>,
    pub feature_vector: Vec<f64>,
}

/// Build the classification feature vector of a tensor.
pub fn feature_vector(tensor: &ResidueTensor) -> Vec<f64> {
    let total = tensor.total() + EPSILON;
    let mut features: Vec<f64> = ResidueClass::ALL
        .iter()
        .map(|&c| tensor.class_total(c) / total)
        .collect();

    let layer_totals = tensor.layer_totals();
    let layer_sum = layer_totals.iter().sum::<f64>() + EPSILON;
    features.extend(layer_totals.iter().map(|v| v / layer_sum));

    features.push(linear_slope(&tensor.depth_totals()));
    features
}

/// Classify a feature vector against the catalog.
pub fn classify_features(features: &[f64]) -> SignatureClassification {
    let distances: Vec<SignatureDistance> = ResidueSignature::ALL
        .iter()
        .map(|&signature| SignatureDistance {
            signature,
            distance: cosine_distance(features, signature.reference()),
        })
        .collect();

    let best = distances
        .iter()
        .copied()
        .reduce(|best, d| if d.distance < best.distance { d } else { best })
        .unwrap_or(SignatureDistance {
            signature: ResidueSignature::AttributionGap,
            distance: 1.0,
        });

    SignatureClassification {
        primary_signature: best.signature,
        confidence: 1.0 / (1.0 + best.distance),
        distances,
        feature_vector: features.to_vec(),
    }
}

/// Classify the pattern held in a tensor.
pub fn classify_tensor(tensor: &ResidueTensor) -> SignatureClassification {
    classify_features(&feature_vector(tensor))
}

/// Cosine distance with the shorter vector zero-padded.
///
/// Zero padding adds nothing to the dot product or the norms, so the padded
/// comparison reduces to sums over the shared prefix and each full vector.
/// A near-zero vector is maximally uninformative: distance 1.
fn cosine_distance(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = crate::components::l2_norm(a);
    let norm_b = crate::components::l2_norm(b);
    if norm_a < EPSILON || norm_b < EPSILON {
        return 1.0;
    }
    (1.0 - dot / (norm_a * norm_b)).clamp(0.0, 2.0)
}

/// Least-squares slope of `values` against their index; 0 for fewer than two
/// points.
fn linear_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean_x = (n - 1) as f64 / 2.0;
    let mean_y = values.iter().sum::<f64>() / n as f64;
    let mut cov = 0.0;
    let mut var = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        cov += dx * (y - mean_y);
        var += dx * dx;
    }
    cov / var
}
