//! Plot-ready projections of the residue tensor.
//!
//! Rendering lives outside this crate; these are the six reductions a
//! renderer needs, serializable as plain nested arrays.

use serde::{Deserialize, Serialize};

use super::{RESIDUE_CLASSES, ResidueClass, ResidueTensor};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidueViews {
    /// Attribution voids, `[layer][token]`, summed over depth.
    pub attribution_heatmap: Vec<Vec<f64>>,
    /// Token hesitations, `[depth][token]`, summed over layers.
    pub hesitation_heatmap: Vec<Vec<f64>>,
    /// Recursive collapses, `[layer][depth]`, summed over tokens.
    pub collapse_heatmap: Vec<Vec<f64>>,
    /// `[class][depth]`, summed over layers and tokens.
    pub depth_trends: Vec<Vec<f64>>,
    /// `[class][layer]`, summed over tokens and depths (stacked bars).
    pub layer_totals: Vec<Vec<f64>>,
    /// Grand total per class (pie shares).
    pub class_totals: Vec<f64>,
}

impl ResidueViews {
    pub fn from_tensor(tensor: &ResidueTensor) -> Self {
        let [_, layers, tokens, depths] = tensor.shape();

        let mut attribution_heatmap = vec![vec![0.0; tokens]; layers];
        let mut hesitation_heatmap = vec![vec![0.0; tokens]; depths];
        let mut collapse_heatmap = vec![vec![0.0; depths]; layers];
        let mut depth_trends = vec![vec![0.0; depths]; RESIDUE_CLASSES];
        let mut layer_totals = vec![vec![0.0; layers]; RESIDUE_CLASSES];

        tensor.for_each_cell(|c, l, t, d, v| {
            match c {
                0 => attribution_heatmap[l][t] += v,
                1 => hesitation_heatmap[d][t] += v,
                _ => collapse_heatmap[l][d] += v,
            }
            depth_trends[c][d] += v;
            layer_totals[c][l] += v;
        });

        let class_totals = ResidueClass::ALL
            .iter()
            .map(|&c| tensor.class_total(c))
            .collect();

        Self {
            attribution_heatmap,
            hesitation_heatmap,
            collapse_heatmap,
            depth_trends,
            layer_totals,
            class_totals,
        }
    }

    /// Share of each class in the total residue; zeros when nothing recorded.
    pub fn class_shares(&self) -> Vec<f64> {
        let total: f64 = self.class_totals.iter().sum();
        if total == 0.0 {
            return vec![0.0; self.class_totals.len()];
        }
        self.class_totals.iter().map(|v| v / total).collect()
    }
}
