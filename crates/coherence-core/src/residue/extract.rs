//! Residue signal extractors.
//!
//! Turn raw attribution matrices and token distributions into the entropy,
//! oscillation and splitting measurements the store records.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Added to sums and log arguments so empty rows and zero probabilities stay
/// finite.
const EPSILON: f64 = 1e-10;

/// Top-k window used for hesitation measurements.
const TOP_K: usize = 10;

/// Per-layer attribution entropy with void candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionEntropy {
    /// Mean entropy across layers, in bits.
    pub mean_entropy: f64,
    /// Entropy of each layer's normalized attribution row.
    pub layer_entropies: Vec<f64>,
    /// Layers whose entropy exceeds `mean + 2·stddev`.
    pub void_layers: Vec<usize>,
}

/// Hesitation metrics of one token distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenHesitation {
    /// Shannon entropy in bits (flatness).
    pub entropy: f64,
    /// Gap between the two most likely candidates.
    pub oscillation: f64,
    /// Largest consecutive gap among the top candidates relative to the mean
    /// gap; 1.0 with fewer than three candidates.
    pub splitting: f64,
}

/// Shannon entropy (bits) of `values` after normalizing them to sum to one.
fn normalized_entropy(values: &[f64]) -> f64 {
    let total = values.iter().sum::<f64>() + EPSILON;
    -values
        .iter()
        .map(|&v| {
            let p = v / total;
            p * (p + EPSILON).log2()
        })
        .sum::<f64>()
}

/// Measure attribution entropy for each layer of a `[layer][token]` matrix and
/// flag abnormally diffuse layers as void candidates.
pub fn measure_attribution_entropy(attribution_matrix: &[Vec<f64>]) -> AttributionEntropy {
    if attribution_matrix.is_empty() {
        return AttributionEntropy {
            mean_entropy: 0.0,
            layer_entropies: Vec::new(),
            void_layers: Vec::new(),
        };
    }

    let layer_entropies: Vec<f64> = attribution_matrix
        .iter()
        .map(|row| normalized_entropy(row))
        .collect();

    let mean = layer_entropies.iter().mean();
    let std_dev = layer_entropies.iter().population_std_dev();
    let threshold = mean + 2.0 * std_dev;

    let void_layers = layer_entropies
        .iter()
        .enumerate()
        .filter(|&(_, &h)| h > threshold)
        .map(|(i, _)| i)
        .collect();

    AttributionEntropy {
        mean_entropy: mean,
        layer_entropies,
        void_layers,
    }
}

/// Measure hesitation in a probability distribution over the vocabulary.
pub fn measure_token_hesitation(token_probabilities: &[f64]) -> TokenHesitation {
    let total = token_probabilities.iter().sum::<f64>() + EPSILON;
    let probs: Vec<f64> = token_probabilities.iter().map(|&p| p / total).collect();

    let entropy = -probs
        .iter()
        .map(|&p| p * (p + EPSILON).log2())
        .sum::<f64>();

    let mut top = probs;
    top.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    top.truncate(TOP_K);

    let oscillation = if top.len() >= 2 { top[0] - top[1] } else { 0.0 };

    let splitting = if top.len() >= 3 {
        let gaps: Vec<f64> = top.windows(2).map(|w| w[0] - w[1]).collect();
        let max_gap = gaps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean_gap = gaps.iter().mean();
        max_gap / (mean_gap + EPSILON)
    } else {
        1.0
    };

    TokenHesitation {
        entropy,
        oscillation,
        splitting,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribution_entropy_flags_diffuse_layer() {
        let mut matrix = vec![vec![1.0, 0.0, 0.0, 0.0]; 7];
        matrix.push(vec![1.0, 1.0, 1.0, 1.0]);
        let r = measure_attribution_entropy(&matrix);
        assert_eq!(r.layer_entropies.len(), 8);
        assert!((r.layer_entropies[7] - 2.0).abs() < 1e-6);
        assert!(r.layer_entropies[0].abs() < 1e-6);
        assert!((r.mean_entropy - 0.25).abs() < 1e-6);
        assert_eq!(r.void_layers, vec![7]);
    }

    #[test]
    fn test_attribution_entropy_uniform_layers_flag_nothing() {
        let matrix = vec![vec![0.5, 0.5]; 6];
        let r = measure_attribution_entropy(&matrix);
        assert!((r.mean_entropy - 1.0).abs() < 1e-6);
        assert!(r.void_layers.is_empty());
    }

    #[test]
    fn test_attribution_entropy_degenerate_inputs() {
        let r = measure_attribution_entropy(&[]);
        assert_eq!(r.mean_entropy, 0.0);
        assert!(r.void_layers.is_empty());

        let r = measure_attribution_entropy(&[vec![0.0, 0.0], vec![]]);
        assert_eq!(r.mean_entropy, 0.0);
        assert!(r.mean_entropy.is_finite());
    }

    #[test]
    fn test_token_hesitation_peaked() {
        let h = measure_token_hesitation(&[0.97, 0.01, 0.01, 0.01]);
        assert!(h.entropy < 0.3);
        assert!((h.oscillation - 0.96).abs() < 1e-6);
        // Gaps 0.96, 0, 0 -> max/mean = 3.
        assert!((h.splitting - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_token_hesitation_flat() {
        let h = measure_token_hesitation(&[1.0; 16]);
        assert!((h.entropy - 4.0).abs() < 1e-6);
        assert!(h.oscillation.abs() < 1e-12);
        // No gaps at all: 0 / epsilon.
        assert_eq!(h.splitting, 0.0);
    }

    #[test]
    fn test_token_hesitation_unnormalized_input() {
        let a = measure_token_hesitation(&[6.0, 3.0, 1.0]);
        let b = measure_token_hesitation(&[0.6, 0.3, 0.1]);
        assert!((a.entropy - b.entropy).abs() < 1e-6);
        assert!((a.oscillation - 0.3).abs() < 1e-6);
        // Gaps 0.3, 0.2 -> 0.3 / 0.25.
        assert!((a.splitting - 1.2).abs() < 1e-6);
    }

    #[test]
    fn test_token_hesitation_few_candidates() {
        let h = measure_token_hesitation(&[0.7, 0.3]);
        assert_eq!(h.splitting, 1.0);
        assert!((h.oscillation - 0.4).abs() < 1e-6);

        let h = measure_token_hesitation(&[1.0]);
        assert_eq!(h.oscillation, 0.0);
        assert_eq!(h.splitting, 1.0);

        let h = measure_token_hesitation(&[]);
        assert_eq!(h.entropy, 0.0);
        assert_eq!(h.splitting, 1.0);
    }
}
