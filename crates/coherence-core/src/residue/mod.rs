//! Symbolic residue tensor (RΣ).
//!
//! A dense `[class, layer, token, depth]` array of breakdown evidence, sized
//! once at construction. Three residue classes are tracked:
//!
//! - **R_A** attribution voids: attribution gaps at a single layer/token.
//! - **R_T** token hesitations: flattened or oscillating token distributions,
//!   spread evenly across layers.
//! - **R_R** recursive collapses: coherence falling through its threshold,
//!   marked across every token of the affected circuits.
//!
//! [`ResidueStore`] owns the tensor plus one event log per class; the
//! [`analysis`] and [`signature`] modules reduce a tensor snapshot to a
//! diagnostic report, and [`views`] produces the plot-ready projections.

pub mod analysis;
pub mod events;
pub mod extract;
pub mod signature;
pub mod store;
pub mod views;

use serde::{Deserialize, Serialize};

use crate::error::CoherenceError;

pub use analysis::{ClassCorrelations, ResidueAnalysis, analyze_tensor};
pub use events::{Metadata, ResidueEvent, ResidueRecord};
pub use extract::{
    AttributionEntropy, TokenHesitation, measure_attribution_entropy, measure_token_hesitation,
};
pub use signature::{
    ResidueSignature, SignatureClassification, SignatureDistance, classify_features,
    classify_tensor, feature_vector,
};
pub use store::ResidueStore;
pub use views::ResidueViews;

/// Number of residue classes (fixed).
pub const RESIDUE_CLASSES: usize = 3;

// ---------------------------------------------------------------------------
// Residue classes
// ---------------------------------------------------------------------------

/// Residue class; its discriminant is the tensor's first index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidueClass {
    AttributionVoid = 0,
    TokenHesitation = 1,
    RecursiveCollapse = 2,
}

impl ResidueClass {
    pub const ALL: [ResidueClass; RESIDUE_CLASSES] = [
        ResidueClass::AttributionVoid,
        ResidueClass::TokenHesitation,
        ResidueClass::RecursiveCollapse,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResidueClass::AttributionVoid => "attribution_void",
            ResidueClass::TokenHesitation => "token_hesitation",
            ResidueClass::RecursiveCollapse => "recursive_collapse",
        }
    }
}

impl std::fmt::Display for ResidueClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tensor
// ---------------------------------------------------------------------------

/// Serialized form of [`ResidueTensor`]; validated on the way back in.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawTensor {
    shape: [usize; 4],
    data: Vec<f64>,
}

/// Dense row-major `[class, layer, token, depth]` buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTensor", into = "RawTensor")]
pub struct ResidueTensor {
    layers: usize,
    tokens: usize,
    depths: usize,
    data: Vec<f64>,
}

impl TryFrom<RawTensor> for ResidueTensor {
    type Error = CoherenceError;

    fn try_from(raw: RawTensor) -> Result<Self, Self::Error> {
        Self::from_parts(raw.shape, raw.data)
    }
}

impl From<ResidueTensor> for RawTensor {
    fn from(t: ResidueTensor) -> Self {
        RawTensor {
            shape: t.shape(),
            data: t.data,
        }
    }
}

impl ResidueTensor {
    /// All-zero tensor. Every dimension is raised to at least 1.
    pub fn zeros(layers: usize, tokens: usize, depths: usize) -> Self {
        let (layers, tokens, depths) = (layers.max(1), tokens.max(1), depths.max(1));
        Self {
            layers,
            tokens,
            depths,
            data: vec![0.0; RESIDUE_CLASSES * layers * tokens * depths],
        }
    }

    /// Rebuild a tensor from a shape and flat buffer, checking that they agree.
    pub fn from_parts(shape: [usize; 4], data: Vec<f64>) -> Result<Self, CoherenceError> {
        let [classes, layers, tokens, depths] = shape;
        if classes != RESIDUE_CLASSES {
            return Err(CoherenceError::MalformedTensor(format!(
                "expected {RESIDUE_CLASSES} residue classes, found {classes}"
            )));
        }
        if layers == 0 || tokens == 0 || depths == 0 {
            return Err(CoherenceError::MalformedTensor(format!(
                "zero-sized dimension in shape {shape:?}"
            )));
        }
        let expected = classes * layers * tokens * depths;
        if data.len() != expected {
            return Err(CoherenceError::MalformedTensor(format!(
                "shape {shape:?} needs {expected} values, found {}",
                data.len()
            )));
        }
        Ok(Self {
            layers,
            tokens,
            depths,
            data,
        })
    }

    pub fn shape(&self) -> [usize; 4] {
        [RESIDUE_CLASSES, self.layers, self.tokens, self.depths]
    }

    pub fn layers(&self) -> usize {
        self.layers
    }

    pub fn tokens(&self) -> usize {
        self.tokens
    }

    pub fn depths(&self) -> usize {
        self.depths
    }

    /// Flat buffer in row-major order.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    fn offset(&self, class: ResidueClass, layer: usize, token: usize, depth: usize) -> usize {
        debug_assert!(layer < self.layers && token < self.tokens && depth < self.depths);
        ((class.index() * self.layers + layer) * self.tokens + token) * self.depths + depth
    }

    /// Cell value; indices must already be in range.
    pub fn get(&self, class: ResidueClass, layer: usize, token: usize, depth: usize) -> f64 {
        self.data[self.offset(class, layer, token, depth)]
    }

    pub(crate) fn set(
        &mut self,
        class: ResidueClass,
        layer: usize,
        token: usize,
        depth: usize,
        value: f64,
    ) {
        let i = self.offset(class, layer, token, depth);
        self.data[i] = value;
    }

    /// Contiguous `[layer, token, depth]` block of one class.
    pub fn class_slice(&self, class: ResidueClass) -> &[f64] {
        let block = self.layers * self.tokens * self.depths;
        let start = class.index() * block;
        &self.data[start..start + block]
    }

    pub(crate) fn clear(&mut self) {
        self.data.iter_mut().for_each(|v| *v = 0.0);
    }

    pub fn is_all_zero(&self) -> bool {
        self.data.iter().all(|&v| v == 0.0)
    }

    pub fn total(&self) -> f64 {
        self.data.iter().sum()
    }

    pub fn class_total(&self, class: ResidueClass) -> f64 {
        self.class_slice(class).iter().sum()
    }

    /// Visit every cell with its `(class, layer, token, depth)` index.
    pub fn for_each_cell(&self, mut f: impl FnMut(usize, usize, usize, usize, f64)) {
        let mut i = 0;
        for c in 0..RESIDUE_CLASSES {
            for l in 0..self.layers {
                for t in 0..self.tokens {
                    for d in 0..self.depths {
                        f(c, l, t, d, self.data[i]);
                        i += 1;
                    }
                }
            }
        }
    }

    /// Totals per layer, summed over class, token and depth.
    pub fn layer_totals(&self) -> Vec<f64> {
        let mut out = vec![0.0; self.layers];
        self.for_each_cell(|_, l, _, _, v| out[l] += v);
        out
    }

    /// Totals per depth, summed over class, layer and token.
    pub fn depth_totals(&self) -> Vec<f64> {
        let mut out = vec![0.0; self.depths];
        self.for_each_cell(|_, _, _, d, v| out[d] += v);
        out
    }

    /// `[layer][token]` projection, summed over class and depth.
    pub fn layer_token_projection(&self) -> Vec<Vec<f64>> {
        let mut out = vec![vec![0.0; self.tokens]; self.layers];
        self.for_each_cell(|_, l, t, _, v| out[l][t] += v);
        out
    }
}

/// Clamp a possibly out-of-range index into `[0, dim - 1]`.
pub(crate) fn clamp_index(index: i64, dim: usize) -> usize {
    let max = dim.saturating_sub(1) as i64;
    index.clamp(0, max) as usize
}
