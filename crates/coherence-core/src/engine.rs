//! Recursive coherence engine (Δ−p).
//!
//! Combines the four bounded components multiplicatively and keeps an
//! append-only history of every measurement taken during a run:
//!
//! ```text
//! Δ−p = S(p) · F(p) · B(p) · λ(p)
//! ```
//!
//! Any single component at zero collapses the product to zero.

use serde::{Deserialize, Serialize};

use crate::components::{
    bounded_integrity, clamp01, elastic_tolerance, feedback_responsiveness, signal_alignment,
};
use crate::config::DiagnosticsConfig;
use crate::error::Result;
use crate::stability;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Raw signals for one recursion layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoherenceInputs {
    /// Phase vector at recursion layer p.
    pub phase_vector: Vec<f64>,
    /// Change in recursive coherence over time; same length as `phase_vector`.
    pub coherence_motion: Vec<f64>,
    pub internal_feedback: f64,
    pub external_feedback: f64,
    pub internal_integrity: f64,
    /// Phase alignment between layer p and target t, already in [0,1].
    pub phase_alignment: f64,
    pub total_capacity: f64,
    pub used_capacity: f64,
}

/// One coherence measurement: the product and its four factors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoherenceMeasurement {
    pub coherence: f64,
    pub signal_alignment: f64,
    pub feedback_responsiveness: f64,
    pub bounded_integrity: f64,
    pub elastic_tolerance: f64,
}

/// Named coherence component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    SignalAlignment,
    FeedbackResponsiveness,
    BoundedIntegrity,
    ElasticTolerance,
}

impl Component {
    pub const ALL: [Component; 4] = [
        Component::SignalAlignment,
        Component::FeedbackResponsiveness,
        Component::BoundedIntegrity,
        Component::ElasticTolerance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Component::SignalAlignment => "signal_alignment",
            Component::FeedbackResponsiveness => "feedback_responsiveness",
            Component::BoundedIntegrity => "bounded_integrity",
            Component::ElasticTolerance => "elastic_tolerance",
        }
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered per-component histories, index-aligned with the coherence history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentHistory {
    pub signal_alignment: Vec<f64>,
    pub feedback_responsiveness: Vec<f64>,
    pub bounded_integrity: Vec<f64>,
    pub elastic_tolerance: Vec<f64>,
}

impl ComponentHistory {
    pub fn get(&self, component: Component) -> &[f64] {
        match component {
            Component::SignalAlignment => &self.signal_alignment,
            Component::FeedbackResponsiveness => &self.feedback_responsiveness,
            Component::BoundedIntegrity => &self.bounded_integrity,
            Component::ElasticTolerance => &self.elastic_tolerance,
        }
    }

    fn push(&mut self, m: &CoherenceMeasurement) {
        self.signal_alignment.push(m.signal_alignment);
        self.feedback_responsiveness.push(m.feedback_responsiveness);
        self.bounded_integrity.push(m.bounded_integrity);
        self.elastic_tolerance.push(m.elastic_tolerance);
    }
}

/// Everything the engine remembers about a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunHistory {
    pub coherence: Vec<f64>,
    pub components: ComponentHistory,
}

impl RunHistory {
    pub fn len(&self) -> usize {
        self.coherence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coherence.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Coherence measurement engine. One instance per logical run.
#[derive(Debug, Clone)]
pub struct CoherenceEngine {
    config: DiagnosticsConfig,
    history: RunHistory,
}

impl CoherenceEngine {
    /// Build an engine from a validated config.
    pub fn new(config: DiagnosticsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            history: RunHistory::default(),
        })
    }

    /// Rebuild an engine around a previously recorded history.
    pub fn with_history(config: DiagnosticsConfig, history: RunHistory) -> Result<Self> {
        let mut engine = Self::new(config)?;
        engine.history = history;
        Ok(engine)
    }

    pub fn config(&self) -> &DiagnosticsConfig {
        &self.config
    }

    /// Compute all four components from raw signals, combine them, and record
    /// the result.
    pub fn measure(&mut self, inputs: &CoherenceInputs) -> Result<CoherenceMeasurement> {
        let s = signal_alignment(
            &inputs.phase_vector,
            &inputs.coherence_motion,
            self.config.s_max,
        )?;
        let f = feedback_responsiveness(
            inputs.internal_feedback,
            inputs.external_feedback,
            self.config.alpha,
        );
        let b = bounded_integrity(inputs.internal_integrity, inputs.phase_alignment);
        let l = elastic_tolerance(inputs.total_capacity, inputs.used_capacity);
        Ok(self.coherence(s, f, b, l))
    }

    /// Multiply four component values into overall coherence and record all
    /// five. Components are clamped to [0,1] first.
    pub fn coherence(
        &mut self,
        signal_alignment: f64,
        feedback_responsiveness: f64,
        bounded_integrity: f64,
        elastic_tolerance: f64,
    ) -> CoherenceMeasurement {
        let s = clamp01(signal_alignment);
        let f = clamp01(feedback_responsiveness);
        let b = clamp01(bounded_integrity);
        let l = clamp01(elastic_tolerance);

        let measurement = CoherenceMeasurement {
            coherence: s * f * b * l,
            signal_alignment: s,
            feedback_responsiveness: f,
            bounded_integrity: b,
            elastic_tolerance: l,
        };

        self.history.coherence.push(measurement.coherence);
        self.history.components.push(&measurement);
        log::debug!(
            "coherence[{}] = {:.4} (S={s:.4} F={f:.4} B={b:.4} λ={l:.4})",
            self.history.len() - 1,
            measurement.coherence
        );
        measurement
    }

    /// Overall coherence values in measurement order.
    pub fn coherence_history(&self) -> &[f64] {
        &self.history.coherence
    }

    pub fn component_history(&self) -> &ComponentHistory {
        &self.history.components
    }

    pub fn history(&self) -> &RunHistory {
        &self.history
    }

    /// Clear every history; the only way history ever shrinks.
    pub fn reset_history(&mut self) {
        log::info!(
            "resetting coherence history ({} measurements)",
            self.history.len()
        );
        self.history = RunHistory::default();
    }

    /// Deepest safe layer count of this run's history.
    pub fn safe_recursive_depth(&self, threshold: f64) -> usize {
        stability::safe_recursive_depth(&self.history.coherence, threshold)
    }

    /// Per-layer residue, falling back to configured layer weights (then all
    /// ones) when `weights` is `None`.
    pub fn symbolic_residue_tensor(
        &self,
        coherence_deviations: &[f64],
        phase_alignments: &[f64],
        weights: Option<&[f64]>,
    ) -> Result<Vec<f64>> {
        let weights = weights.or(self.config.layer_weights.as_deref());
        stability::symbolic_residue_tensor(coherence_deviations, phase_alignments, weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoherenceError;

    const EPS: f64 = 1e-12;

    fn engine() -> CoherenceEngine {
        CoherenceEngine::new(DiagnosticsConfig::default()).unwrap()
    }

    fn healthy_inputs() -> CoherenceInputs {
        CoherenceInputs {
            phase_vector: vec![1.0, 0.0, 0.0],
            coherence_motion: vec![1.0, 0.0, 0.0],
            internal_feedback: 0.9,
            external_feedback: 0.85,
            internal_integrity: 0.95,
            phase_alignment: 0.1,
            total_capacity: 1.0,
            used_capacity: 0.2,
        }
    }

    #[test]
    fn test_measure_is_product_of_components() {
        let mut e = engine();
        let m = e.measure(&healthy_inputs()).unwrap();
        assert!((m.signal_alignment - 1.0).abs() < EPS);
        assert!((m.feedback_responsiveness - (0.6 * 0.9 + 0.4 * 0.85)).abs() < EPS);
        assert!((m.bounded_integrity - 0.95 * 0.9).abs() < EPS);
        assert!((m.elastic_tolerance - 0.8).abs() < EPS);
        let product = m.signal_alignment
            * m.feedback_responsiveness
            * m.bounded_integrity
            * m.elastic_tolerance;
        assert!((m.coherence - product).abs() < EPS);
    }

    #[test]
    fn test_history_grows_one_per_measure() {
        let mut e = engine();
        for _ in 0..3 {
            e.measure(&healthy_inputs()).unwrap();
        }
        assert_eq!(e.coherence_history().len(), 3);
        for c in Component::ALL {
            assert_eq!(e.component_history().get(c).len(), 3);
        }
        e.reset_history();
        assert!(e.history().is_empty());
        assert!(e.component_history().get(Component::ElasticTolerance).is_empty());
    }

    #[test]
    fn test_multiplicative_collapse() {
        let mut e = engine();
        for zeroed in 0..4 {
            let mut parts = [0.9, 0.8, 0.7, 0.95];
            parts[zeroed] = 0.0;
            let m = e.coherence(parts[0], parts[1], parts[2], parts[3]);
            assert_eq!(m.coherence, 0.0);
        }

        // Exhausted capacity alone zeroes coherence.
        let mut inputs = healthy_inputs();
        inputs.used_capacity = 1.0;
        assert_eq!(e.measure(&inputs).unwrap().coherence, 0.0);
    }

    #[test]
    fn test_coherence_clamps_components() {
        let mut e = engine();
        let m = e.coherence(1.5, -0.2, 0.5, 2.0);
        assert_eq!(m.signal_alignment, 1.0);
        assert_eq!(m.feedback_responsiveness, 0.0);
        assert_eq!(m.coherence, 0.0);
        assert_eq!(e.component_history().signal_alignment, vec![1.0]);
    }

    #[test]
    fn test_measure_bounded_for_adversarial_inputs() {
        let mut e = engine();
        let inputs = CoherenceInputs {
            phase_vector: vec![1e-9, 0.0],
            coherence_motion: vec![0.0, -1e-9],
            internal_feedback: 1e6,
            external_feedback: -1e6,
            internal_integrity: -3.0,
            phase_alignment: 7.0,
            total_capacity: -1.0,
            used_capacity: -5.0,
        };
        let m = e.measure(&inputs).unwrap();
        for v in [
            m.coherence,
            m.signal_alignment,
            m.feedback_responsiveness,
            m.bounded_integrity,
            m.elastic_tolerance,
        ] {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_measure_rejects_mismatched_vectors() {
        let mut e = engine();
        let mut inputs = healthy_inputs();
        inputs.coherence_motion = vec![1.0];
        assert!(matches!(
            e.measure(&inputs),
            Err(CoherenceError::LengthMismatch { .. })
        ));
        assert!(e.history().is_empty());
    }

    #[test]
    fn test_safe_recursive_depth_from_history() {
        let mut e = engine();
        e.coherence(1.0, 1.0, 1.0, 0.9);
        e.coherence(1.0, 1.0, 1.0, 0.8);
        e.coherence(1.0, 1.0, 1.0, 0.3);
        assert_eq!(e.safe_recursive_depth(0.7), 2);
        assert_eq!(e.safe_recursive_depth(0.2), 3);
    }

    #[test]
    fn test_configured_layer_weights_are_default() {
        let cfg = DiagnosticsConfig {
            layer_weights: Some(vec![2.0, 0.5]),
            ..DiagnosticsConfig::default()
        };
        let e = CoherenceEngine::new(cfg).unwrap();
        let r = e
            .symbolic_residue_tensor(&[1.0, 1.0], &[0.5, 0.0], None)
            .unwrap();
        assert_eq!(r, vec![1.0, 0.5]);
        let r = e
            .symbolic_residue_tensor(&[1.0, 1.0], &[0.5, 0.0], Some(&[1.0, 1.0]))
            .unwrap();
        assert_eq!(r, vec![0.5, 1.0]);
        assert!(e.symbolic_residue_tensor(&[1.0], &[0.5], None).is_err());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let cfg = DiagnosticsConfig {
            s_max: -1.0,
            ..DiagnosticsConfig::default()
        };
        assert!(CoherenceEngine::new(cfg).is_err());
    }
}
