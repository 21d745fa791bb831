//! Structured residue events.
//!
//! Each recorded residue appends one [`ResidueEvent`]: a typed record with the
//! fixed fields of its class, the logical timestamp, and an open side table of
//! caller-supplied provenance.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ResidueClass;

/// Free-form provenance attached by the caller (source, trigger, ...).
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Class-specific payload. Indices are the clamped values actually written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResidueRecord {
    AttributionVoid {
        layer: usize,
        token_position: usize,
        depth: usize,
        magnitude: f64,
    },
    TokenHesitation {
        token_position: usize,
        depth: usize,
        entropy: f64,
        oscillation: f64,
        splitting: f64,
    },
    RecursiveCollapse {
        depth: usize,
        coherence: f64,
        collapse_threshold: f64,
        severity: f64,
        /// Circuits as reported by the caller, including any outside the
        /// tensor's layer range.
        affected_circuits: Vec<i64>,
    },
}

/// One entry in a residue class log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidueEvent {
    #[serde(flatten)]
    pub record: ResidueRecord,
    /// `current_step` at the time of recording.
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

impl ResidueEvent {
    pub fn class(&self) -> ResidueClass {
        match self.record {
            ResidueRecord::AttributionVoid { .. } => ResidueClass::AttributionVoid,
            ResidueRecord::TokenHesitation { .. } => ResidueClass::TokenHesitation,
            ResidueRecord::RecursiveCollapse { .. } => ResidueClass::RecursiveCollapse,
        }
    }

    pub fn name(&self) -> &'static str {
        self.class().as_str()
    }

    pub fn depth(&self) -> usize {
        match self.record {
            ResidueRecord::AttributionVoid { depth, .. }
            | ResidueRecord::TokenHesitation { depth, .. }
            | ResidueRecord::RecursiveCollapse { depth, .. } => depth,
        }
    }

    /// Numeric payload: `[magnitude]`, `[entropy, oscillation, splitting]`, or
    /// `[coherence, threshold, severity]`.
    pub fn payload(&self) -> Vec<f64> {
        match &self.record {
            ResidueRecord::AttributionVoid { magnitude, .. } => vec![*magnitude],
            ResidueRecord::TokenHesitation {
                entropy,
                oscillation,
                splitting,
                ..
            } => vec![*entropy, *oscillation, *splitting],
            ResidueRecord::RecursiveCollapse {
                coherence,
                collapse_threshold,
                severity,
                ..
            } => vec![*coherence, *collapse_threshold, *severity],
        }
    }

    /// Euclidean norm of the payload.
    pub fn magnitude(&self) -> f64 {
        crate::components::l2_norm(&self.payload())
    }
}
