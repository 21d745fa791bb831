//! Residue pattern analysis.
//!
//! Reduces a tensor snapshot into spatial, temporal, magnitude and cross-class
//! statistics, then attaches the nearest catalog signature. Every ratio is
//! epsilon-guarded so a report is produced for any non-empty tensor.

use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics, Statistics};

use super::signature::{ResidueSignature, SignatureClassification, classify_tensor};
use super::{ResidueClass, ResidueTensor};
use crate::error::{CoherenceError, Result};

const EPSILON: f64 = 1e-10;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Pairwise Pearson correlation between the flattened class blocks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassCorrelations {
    pub attr_hesitation: f64,
    pub attr_collapse: f64,
    pub hesitation_collapse: f64,
}

/// Full residue pattern report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidueAnalysis {
    /// Peak over mean of the layer × token projection.
    pub spatial_concentration: f64,
    /// Shannon entropy (bits) of the layer × token projection.
    pub spatial_entropy: f64,
    /// Mean finite-difference slope of residue totals across depth.
    pub temporal_gradient: f64,
    pub magnitude_median: f64,
    /// Population variance over every tensor cell.
    pub magnitude_variance: f64,
    pub correlations: ClassCorrelations,
    pub signature: SignatureClassification,
}

impl ResidueAnalysis {
    pub fn primary_signature(&self) -> ResidueSignature {
        self.signature.primary_signature
    }

    pub fn signature_confidence(&self) -> f64 {
        self.signature.confidence
    }

    /// True when every statistic is a finite number (JSON cannot carry NaN).
    pub fn is_finite(&self) -> bool {
        let c = &self.correlations;
        [
            self.spatial_concentration,
            self.spatial_entropy,
            self.temporal_gradient,
            self.magnitude_median,
            self.magnitude_variance,
            c.attr_hesitation,
            c.attr_collapse,
            c.hesitation_collapse,
            self.signature.confidence,
        ]
        .iter()
        .chain(self.signature.feature_vector.iter())
        .chain(self.signature.distances.iter().map(|d| &d.distance))
        .all(|v| v.is_finite())
    }
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Analyze a tensor; `Err(NoResidueData)` if nothing was ever recorded.
pub fn analyze_tensor(tensor: &ResidueTensor) -> Result<ResidueAnalysis> {
    if tensor.is_all_zero() {
        return Err(CoherenceError::NoResidueData);
    }

    // 1. Spatial distribution over (layer, token).
    let spatial: Vec<f64> = tensor.layer_token_projection().concat();
    let spatial_max = spatial.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let spatial_mean = spatial.iter().mean();
    let spatial_concentration = spatial_max / (spatial_mean + EPSILON);
    let spatial_total = spatial.iter().sum::<f64>() + EPSILON;
    // Only positive shares contribute; signed cells may cancel the total.
    let spatial_entropy = -spatial
        .iter()
        .map(|&v| v / spatial_total)
        .filter(|&p| p > 0.0)
        .map(|p| p * (p + EPSILON).log2())
        .sum::<f64>();

    // 2. Evolution across depth.
    let temporal_gradient = gradient(&tensor.depth_totals()).iter().mean();
    let temporal_gradient = if temporal_gradient.is_nan() {
        0.0
    } else {
        temporal_gradient
    };

    // 3. Magnitude spectrum.
    let magnitude_variance = tensor.data().iter().population_variance();
    let magnitude_median = Data::new(tensor.data().to_vec()).median();

    // 4. Cross-class relationships.
    let attr = tensor.class_slice(ResidueClass::AttributionVoid);
    let hesit = tensor.class_slice(ResidueClass::TokenHesitation);
    let collapse = tensor.class_slice(ResidueClass::RecursiveCollapse);
    let correlations = ClassCorrelations {
        attr_hesitation: pearson_correlation(attr, hesit),
        attr_collapse: pearson_correlation(attr, collapse),
        hesitation_collapse: pearson_correlation(hesit, collapse),
    };

    // 5. Signature.
    let signature = classify_tensor(tensor);

    log::debug!(
        "residue pattern: concentration={spatial_concentration:.3} entropy={spatial_entropy:.3} signature={} ({:.3})",
        signature.primary_signature,
        signature.confidence
    );

    Ok(ResidueAnalysis {
        spatial_concentration,
        spatial_entropy,
        temporal_gradient,
        magnitude_median,
        magnitude_variance,
        correlations,
        signature,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Finite-difference gradient: central in the interior, one-sided at the ends.
fn gradient(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n < 2 {
        return vec![0.0; n];
    }
    (0..n)
        .map(|i| match i {
            0 => values[1] - values[0],
            i if i == n - 1 => values[n - 1] - values[n - 2],
            i => (values[i + 1] - values[i - 1]) / 2.0,
        })
        .collect()
}

/// Pearson correlation coefficient; 0 when either side has no variance.
fn pearson_correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let mean_a = a[..n].iter().sum::<f64>() / n as f64;
    let mean_b = b[..n].iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    let denom = (var_a * var_b).sqrt();
    if denom < EPSILON { 0.0 } else { cov / denom }
}
