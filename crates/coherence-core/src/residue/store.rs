//! Residue tensor store: bounds-clamped recording plus per-class event logs.

use super::analysis::{ResidueAnalysis, analyze_tensor};
use super::events::{Metadata, ResidueEvent, ResidueRecord};
use super::signature::{SignatureClassification, classify_tensor};
use super::views::ResidueViews;
use super::{ResidueClass, ResidueTensor, clamp_index};
use crate::config::DiagnosticsConfig;
use crate::error::Result;

/// Owns one run's residue tensor and its three event logs.
///
/// Recording never fails on indices: layer, token and depth are clamped into
/// the tensor's shape. Cells are overwritten, not accumulated; the logs keep
/// every call.
#[derive(Debug, Clone)]
pub struct ResidueStore {
    config: DiagnosticsConfig,
    tensor: ResidueTensor,
    attribution_voids: Vec<ResidueEvent>,
    token_hesitations: Vec<ResidueEvent>,
    recursive_collapses: Vec<ResidueEvent>,
}

impl ResidueStore {
    /// Allocate a zeroed tensor shaped by `config`.
    pub fn new(config: DiagnosticsConfig) -> Result<Self> {
        config.validate()?;
        let tensor = ResidueTensor::zeros(config.layers, config.tokens, config.depths);
        Ok(Self {
            config,
            tensor,
            attribution_voids: Vec::new(),
            token_hesitations: Vec::new(),
            recursive_collapses: Vec::new(),
        })
    }

    /// Reassemble a store from persisted parts.
    ///
    /// The tensor's shape wins over whatever dimensions `config` declares.
    pub fn from_parts(
        mut config: DiagnosticsConfig,
        tensor: ResidueTensor,
        attribution_voids: Vec<ResidueEvent>,
        token_hesitations: Vec<ResidueEvent>,
        recursive_collapses: Vec<ResidueEvent>,
    ) -> Result<Self> {
        config.layers = tensor.layers();
        config.tokens = tensor.tokens();
        config.depths = tensor.depths();
        config.validate()?;
        Ok(Self {
            config,
            tensor,
            attribution_voids,
            token_hesitations,
            recursive_collapses,
        })
    }

    pub fn config(&self) -> &DiagnosticsConfig {
        &self.config
    }

    pub fn tensor(&self) -> &ResidueTensor {
        &self.tensor
    }

    pub fn layers(&self) -> usize {
        self.tensor.layers()
    }

    pub fn tokens(&self) -> usize {
        self.tensor.tokens()
    }

    pub fn depths(&self) -> usize {
        self.tensor.depths()
    }

    pub fn current_step(&self) -> u64 {
        self.config.current_step
    }

    /// Set the logical timestamp stamped on subsequent events.
    pub fn set_current_step(&mut self, step: u64) {
        self.config.current_step = step;
    }

    pub fn attribution_voids(&self) -> &[ResidueEvent] {
        &self.attribution_voids
    }

    pub fn token_hesitations(&self) -> &[ResidueEvent] {
        &self.token_hesitations
    }

    pub fn recursive_collapses(&self) -> &[ResidueEvent] {
        &self.recursive_collapses
    }

    /// Event log of one class.
    pub fn events(&self, class: ResidueClass) -> &[ResidueEvent] {
        match class {
            ResidueClass::AttributionVoid => &self.attribution_voids,
            ResidueClass::TokenHesitation => &self.token_hesitations,
            ResidueClass::RecursiveCollapse => &self.recursive_collapses,
        }
    }

    fn clamp(&self, what: &str, index: i64, dim: usize) -> usize {
        let clamped = clamp_index(index, dim);
        if clamped as i64 != index {
            log::warn!("{what} index {index} outside [0, {dim}), clamped to {clamped}");
        }
        clamped
    }

    /// Non-finite values cannot be persisted; they are recorded as 0.
    fn finite(what: &str, value: f64) -> f64 {
        if value.is_finite() {
            value
        } else {
            log::warn!("non-finite {what} {value} recorded as 0");
            0.0
        }
    }

    fn event(&self, record: ResidueRecord, metadata: Metadata) -> ResidueEvent {
        ResidueEvent {
            record,
            timestamp: self.config.current_step,
            metadata,
        }
    }

    // -----------------------------------------------------------------------
    // Recording
    // -----------------------------------------------------------------------

    /// Record an attribution void (R_A) at a single cell.
    pub fn record_attribution_void(
        &mut self,
        layer: i64,
        token_position: i64,
        depth: i64,
        magnitude: f64,
        metadata: Metadata,
    ) {
        let layer = self.clamp("layer", layer, self.layers());
        let token_position = self.clamp("token", token_position, self.tokens());
        let depth = self.clamp("depth", depth, self.depths());
        let magnitude = Self::finite("magnitude", magnitude);

        self.tensor.set(
            ResidueClass::AttributionVoid,
            layer,
            token_position,
            depth,
            magnitude,
        );

        log::debug!(
            "attribution void at layer={layer} token={token_position} depth={depth}: {magnitude:.4}"
        );
        let event = self.event(
            ResidueRecord::AttributionVoid {
                layer,
                token_position,
                depth,
                magnitude,
            },
            metadata,
        );
        self.attribution_voids.push(event);
    }

    /// Record a token hesitation (R_T).
    ///
    /// The combined magnitude `√(e² + o² + s²)` is spread evenly across every
    /// layer at `(token_position, depth)`.
    pub fn record_token_hesitation(
        &mut self,
        token_position: i64,
        entropy: f64,
        oscillation: f64,
        splitting: f64,
        depth: i64,
        metadata: Metadata,
    ) {
        let token_position = self.clamp("token", token_position, self.tokens());
        let depth = self.clamp("depth", depth, self.depths());
        let entropy = Self::finite("entropy", entropy);
        let oscillation = Self::finite("oscillation", oscillation);
        let splitting = Self::finite("splitting", splitting);

        let magnitude =
            (entropy * entropy + oscillation * oscillation + splitting * splitting).sqrt();
        let per_layer = magnitude / self.layers() as f64;
        for layer in 0..self.layers() {
            self.tensor.set(
                ResidueClass::TokenHesitation,
                layer,
                token_position,
                depth,
                per_layer,
            );
        }

        log::debug!("token hesitation at token={token_position} depth={depth}: {magnitude:.4}");
        let event = self.event(
            ResidueRecord::TokenHesitation {
                token_position,
                depth,
                entropy,
                oscillation,
                splitting,
            },
            metadata,
        );
        self.token_hesitations.push(event);
    }

    /// Record a recursive collapse (R_R).
    ///
    /// `severity` is written across all tokens at `depth` for each affected
    /// circuit inside the layer range; circuits outside it are logged but not
    /// written.
    pub fn record_recursive_collapse(
        &mut self,
        depth: i64,
        coherence: f64,
        collapse_threshold: f64,
        severity: f64,
        affected_circuits: &[i64],
        metadata: Metadata,
    ) {
        let depth = self.clamp("depth", depth, self.depths());
        let coherence = Self::finite("coherence", coherence);
        let collapse_threshold = Self::finite("collapse threshold", collapse_threshold);
        let severity = Self::finite("severity", severity);
        let layers = self.layers();

        for &circuit in affected_circuits {
            if circuit < 0 || circuit as usize >= layers {
                log::warn!("collapse circuit {circuit} outside [0, {layers}), skipped");
                continue;
            }
            for token in 0..self.tokens() {
                self.tensor.set(
                    ResidueClass::RecursiveCollapse,
                    circuit as usize,
                    token,
                    depth,
                    severity,
                );
            }
        }

        log::debug!(
            "recursive collapse at depth={depth}: coherence={coherence:.4} threshold={collapse_threshold:.4} severity={severity:.4}"
        );
        let event = self.event(
            ResidueRecord::RecursiveCollapse {
                depth,
                coherence,
                collapse_threshold,
                severity,
                affected_circuits: affected_circuits.to_vec(),
            },
            metadata,
        );
        self.recursive_collapses.push(event);
    }

    /// Zero the tensor and clear every log.
    pub fn reset(&mut self) {
        log::info!(
            "resetting residue store ({} events)",
            self.attribution_voids.len()
                + self.token_hesitations.len()
                + self.recursive_collapses.len()
        );
        self.tensor.clear();
        self.attribution_voids.clear();
        self.token_hesitations.clear();
        self.recursive_collapses.clear();
    }

    // -----------------------------------------------------------------------
    // Analysis
    // -----------------------------------------------------------------------

    /// Pattern statistics and signature classification of the current tensor.
    pub fn analyze_residue_pattern(&self) -> Result<ResidueAnalysis> {
        analyze_tensor(&self.tensor)
    }

    pub fn classify_residue_signature(&self) -> SignatureClassification {
        classify_tensor(&self.tensor)
    }

    /// Plot-ready reductions for an external renderer.
    pub fn views(&self) -> ResidueViews {
        ResidueViews::from_tensor(&self.tensor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ResidueStore {
        ResidueStore::new(DiagnosticsConfig {
            layers: 8,
            tokens: 50,
            depths: 5,
            ..DiagnosticsConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_attribution_void_clamps_indices() {
        let mut s = store();
        s.record_attribution_void(-5, 9999, 100, 0.5, Metadata::new());
        assert_eq!(s.tensor().get(ResidueClass::AttributionVoid, 0, 49, 4), 0.5);
        assert_eq!(s.tensor().total(), 0.5);
        match s.attribution_voids()[0].record {
            ResidueRecord::AttributionVoid {
                layer,
                token_position,
                depth,
                ..
            } => assert_eq!((layer, token_position, depth), (0, 49, 4)),
            _ => panic!("wrong record kind"),
        }
    }

    #[test]
    fn test_attribution_void_overwrites() {
        let mut s = store();
        s.record_attribution_void(2, 10, 1, 0.7, Metadata::new());
        let before = s.tensor().clone();
        s.record_attribution_void(2, 10, 1, 0.7, Metadata::new());
        assert_eq!(s.tensor(), &before);
        assert_eq!(s.attribution_voids().len(), 2);

        s.record_attribution_void(2, 10, 1, 0.2, Metadata::new());
        assert_eq!(s.tensor().get(ResidueClass::AttributionVoid, 2, 10, 1), 0.2);
    }

    #[test]
    fn test_token_hesitation_spreads_across_layers() {
        let mut s = store();
        s.record_token_hesitation(12, 3.0, 4.0, 0.0, 2, Metadata::new());
        for layer in 0..8 {
            let v = s.tensor().get(ResidueClass::TokenHesitation, layer, 12, 2);
            assert!((v - 5.0 / 8.0).abs() < 1e-12);
        }
        assert!((s.tensor().class_total(ResidueClass::TokenHesitation) - 5.0).abs() < 1e-12);
        assert_eq!(s.token_hesitations()[0].payload(), vec![3.0, 4.0, 0.0]);
    }

    #[test]
    fn test_recursive_collapse_writes_affected_circuits() {
        let mut s = store();
        s.record_recursive_collapse(4, 0.3, 0.7, 0.8, &[3, 5, -1, 8, 42], Metadata::new());
        for token in 0..50 {
            assert_eq!(s.tensor().get(ResidueClass::RecursiveCollapse, 3, token, 4), 0.8);
            assert_eq!(s.tensor().get(ResidueClass::RecursiveCollapse, 5, token, 4), 0.8);
            assert_eq!(s.tensor().get(ResidueClass::RecursiveCollapse, 4, token, 4), 0.0);
        }
        assert!((s.tensor().class_total(ResidueClass::RecursiveCollapse) - 80.0).abs() < 1e-9);
        match &s.recursive_collapses()[0].record {
            ResidueRecord::RecursiveCollapse {
                affected_circuits, ..
            } => assert_eq!(affected_circuits, &vec![3, 5, -1, 8, 42]),
            _ => panic!("wrong record kind"),
        }
    }

    #[test]
    fn test_events_carry_timestamp_and_metadata() {
        let mut s = store();
        s.set_current_step(11);
        let mut meta = Metadata::new();
        meta.insert("source".into(), serde_json::json!("unit"));
        s.record_token_hesitation(0, 0.1, 0.1, 0.1, 0, meta);
        let e = &s.events(ResidueClass::TokenHesitation)[0];
        assert_eq!(e.timestamp, 11);
        assert_eq!(e.metadata["source"], "unit");
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut s = store();
        s.record_attribution_void(1, 1, 1, 0.4, Metadata::new());
        s.record_token_hesitation(1, 0.1, 0.2, 0.3, 1, Metadata::new());
        s.record_recursive_collapse(1, 0.2, 0.5, 0.6, &[1], Metadata::new());
        s.reset();
        assert!(s.tensor().is_all_zero());
        for class in ResidueClass::ALL {
            assert!(s.events(class).is_empty());
        }
        assert_eq!(s.tensor().shape(), [3, 8, 50, 5]);
    }

    #[test]
    fn test_from_parts_takes_shape_from_tensor() {
        let tensor = ResidueTensor::zeros(4, 6, 2);
        let s = ResidueStore::from_parts(
            DiagnosticsConfig::default(),
            tensor,
            Vec::new(),
            Vec::new(),
            Vec::new(),
        )
        .unwrap();
        assert_eq!((s.layers(), s.tokens(), s.depths()), (4, 6, 2));
        assert_eq!(s.config().layers, 4);
    }

    #[test]
    fn test_non_finite_values_recorded_as_zero() {
        let mut s = store();
        s.record_attribution_void(1, 1, 1, f64::NAN, Metadata::new());
        s.record_token_hesitation(2, f64::INFINITY, 0.3, 0.4, 0, Metadata::new());
        s.record_recursive_collapse(3, f64::NAN, 0.5, f64::NEG_INFINITY, &[0], Metadata::new());

        assert_eq!(s.tensor().get(ResidueClass::AttributionVoid, 1, 1, 1), 0.0);
        assert!(s.tensor().data().iter().all(|v| v.is_finite()));
        assert_eq!(s.token_hesitations()[0].payload(), vec![0.0, 0.3, 0.4]);
        assert_eq!(s.recursive_collapses()[0].payload(), vec![0.0, 0.5, 0.0]);
    }

    #[test]
    fn test_analyze_empty_store_reports_no_data() {
        let s = store();
        assert!(matches!(
            s.analyze_residue_pattern(),
            Err(crate::error::CoherenceError::NoResidueData)
        ));
    }
}
