//! `coherence measure`: per-depth coherence, stability metrics and collapse
//! verdicts for a recorded run.

use std::path::Path;

use coherence_core::residue::Metadata;
use coherence_core::{
    CoherenceEngine, CoherenceInputs, CoherenceMeasurement, CompressionCoefficient,
    DiagnosticSnapshot, DiagnosticsConfig, ResidueStore, attractor_strength, calculate_beverly_band,
    coherence_motion, collapse_threshold, detect_collapse, detect_recursive_collapse,
    recursive_compression_coefficient,
};
use serde::{Deserialize, Serialize};

pub struct MeasureCommandConfig<'a> {
    pub input_path: &'a str,
    pub config_path: Option<&'a str>,
    pub threshold: f64,
    pub output_path: Option<&'a str>,
    pub snapshot_path: Option<&'a str>,
}

fn one() -> f64 {
    1.0
}

/// Input file layout.
#[derive(Debug, Deserialize)]
struct MeasureInput {
    /// Recursive operations performed over the run.
    #[serde(default)]
    operations: u64,
    #[serde(default = "one")]
    bandwidth: f64,
    #[serde(default = "one")]
    resilience: f64,
    #[serde(default = "one")]
    recursive_energy: f64,
    depths: Vec<DepthSignals>,
}

#[derive(Debug, Deserialize)]
struct DepthSignals {
    #[serde(flatten)]
    inputs: CoherenceInputs,
    /// Layers marked when this depth collapses; every layer if empty.
    #[serde(default)]
    affected_circuits: Vec<i64>,
}

#[derive(Debug, Serialize)]
struct DepthReport {
    depth: usize,
    #[serde(flatten)]
    measurement: CoherenceMeasurement,
    coherence_motion: f64,
    beverly_band: f64,
    collapse_threshold: f64,
    collapsed: bool,
    severity: f64,
}

#[derive(Debug, Serialize)]
struct MeasureReport {
    depths: Vec<DepthReport>,
    compression: CompressionCoefficient,
    attractor_strength: f64,
    safe_threshold: f64,
    safe_depth: usize,
    first_collapse: Option<usize>,
}

/// Outcome of evaluating one input file.
struct MeasureRun {
    report: MeasureReport,
    engine: CoherenceEngine,
    store: Option<ResidueStore>,
}

/// Measure every depth in order, grading each against its collapse threshold.
///
/// With `record_residue`, collapsed depths are recorded into a residue store;
/// empty `affected_circuits` mark every layer.
fn evaluate(
    input: &MeasureInput,
    config: &DiagnosticsConfig,
    safe_threshold: f64,
    record_residue: bool,
) -> coherence_core::Result<MeasureRun> {
    let mut engine = CoherenceEngine::new(config.clone())?;
    let mut store = if record_residue {
        Some(ResidueStore::new(config.clone())?)
    } else {
        None
    };

    let mut reports = Vec::with_capacity(input.depths.len());
    let mut previous: Option<f64> = None;

    for (depth, signals) in input.depths.iter().enumerate() {
        let m = engine.measure(&signals.inputs)?;

        let threshold = collapse_threshold(m.elastic_tolerance, depth as u32);
        let verdict = detect_collapse(m.coherence, threshold);

        if verdict.collapsed {
            if let Some(store) = store.as_mut() {
                let circuits: Vec<i64> = if signals.affected_circuits.is_empty() {
                    (0..store.layers() as i64).collect()
                } else {
                    signals.affected_circuits.clone()
                };
                store.set_current_step(depth as u64);
                store.record_recursive_collapse(
                    depth as i64,
                    m.coherence,
                    threshold,
                    verdict.severity,
                    &circuits,
                    Metadata::new(),
                );
            }
        }

        reports.push(DepthReport {
            depth,
            measurement: m,
            coherence_motion: previous.map_or(0.0, |p| coherence_motion(m.coherence, p)),
            beverly_band: calculate_beverly_band(
                m.elastic_tolerance,
                input.resilience,
                m.bounded_integrity,
                input.recursive_energy,
            ),
            collapse_threshold: threshold,
            collapsed: verdict.collapsed,
            severity: verdict.severity,
        });
        previous = Some(m.coherence);
    }

    let compression = recursive_compression_coefficient(input.operations, input.bandwidth);
    let collapse = detect_recursive_collapse(engine.coherence_history(), safe_threshold);
    let report = MeasureReport {
        depths: reports,
        compression,
        attractor_strength: attractor_strength(input.operations, compression),
        safe_threshold,
        safe_depth: engine.safe_recursive_depth(safe_threshold),
        first_collapse: collapse.collapsed.then_some(collapse.depth),
    };

    Ok(MeasureRun {
        report,
        engine,
        store,
    })
}

/// Run the measure command.
pub fn run(cfg: MeasureCommandConfig<'_>) {
    let config = super::load_config(cfg.config_path);

    let input: MeasureInput = match std::fs::read_to_string(cfg.input_path)
        .map_err(|e| e.to_string())
        .and_then(|s| serde_json::from_str(&s).map_err(|e| e.to_string()))
    {
        Ok(i) => i,
        Err(e) => {
            eprintln!("Failed to read {}: {e}", cfg.input_path);
            std::process::exit(1);
        }
    };

    log::debug!("loaded {} depths from {}", input.depths.len(), cfg.input_path);

    if input.depths.is_empty() {
        println!("No depths in {}", cfg.input_path);
        return;
    }

    let run = match evaluate(&input, &config, cfg.threshold, cfg.snapshot_path.is_some()) {
        Ok(run) => run,
        Err(e) => {
            eprintln!("Measurement failed: {e}");
            std::process::exit(1);
        }
    };

    print_report(&run.report);

    if let Some(path) = cfg.output_path {
        super::write_json(path, &run.report);
    }

    if let (Some(path), Some(store)) = (cfg.snapshot_path, run.store.as_ref()) {
        let snapshot = DiagnosticSnapshot::capture(store, Some(&run.engine));
        match snapshot.write_to_path(Path::new(path)) {
            Ok(()) => println!("Snapshot written to {path}"),
            Err(e) => {
                eprintln!("Failed to write snapshot {path}: {e}");
                std::process::exit(1);
            }
        }
    }
}

fn print_report(report: &MeasureReport) {
    println!(
        "{:<6} {:>9} {:>7} {:>7} {:>7} {:>7} {:>8} {:>8} {:>9}  Verdict",
        "Depth", "Coherence", "S", "F", "B", "λ", "Δ", "Band", "Threshold"
    );
    println!("{}", "─".repeat(86));
    for d in &report.depths {
        let m = &d.measurement;
        let verdict = if d.collapsed {
            format!("COLLAPSE ({:.2})", d.severity)
        } else {
            "ok".to_string()
        };
        println!(
            "{:<6} {:>9.4} {:>7.3} {:>7.3} {:>7.3} {:>7.3} {:>+8.4} {:>8.4} {:>9.3}  {verdict}",
            d.depth,
            m.coherence,
            m.signal_alignment,
            m.feedback_responsiveness,
            m.bounded_integrity,
            m.elastic_tolerance,
            d.coherence_motion,
            d.beverly_band,
            d.collapse_threshold,
        );
    }

    println!();
    println!("  Compression γ:      {}", report.compression);
    println!("  Attractor strength: {:.4}", report.attractor_strength);
    println!(
        "  Safe depth:         {} (coherence ≥ {:.2})",
        report.safe_depth, report.safe_threshold
    );
    match report.first_collapse {
        Some(depth) => println!("  First collapse:     depth {depth}"),
        None => println!("  First collapse:     none"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coherence_core::ResidueClass;

    const EPS: f64 = 1e-9;

    /// Fully aligned signals whose only varying factor is capacity use.
    fn depth_json(used_capacity: f64, circuits: &str) -> String {
        format!(
            r#"{{"phase_vector": [1.0, 0.0], "coherence_motion": [1.0, 0.0],
                "internal_feedback": 1.0, "external_feedback": 1.0,
                "internal_integrity": 1.0, "phase_alignment": 0.0,
                "total_capacity": 1.0, "used_capacity": {used_capacity}{circuits}}}"#
        )
    }

    fn degrading_input(circuits: &str) -> MeasureInput {
        let depths = [0.1, 0.5, 0.95]
            .iter()
            .map(|&u| depth_json(u, circuits))
            .collect::<Vec<_>>()
            .join(",");
        serde_json::from_str(&format!(r#"{{"depths": [{depths}]}}"#)).unwrap()
    }

    fn small_config() -> DiagnosticsConfig {
        DiagnosticsConfig {
            layers: 3,
            tokens: 2,
            depths: 3,
            ..DiagnosticsConfig::default()
        }
    }

    #[test]
    fn test_input_defaults_and_flattened_signals() {
        let input = degrading_input(r#", "affected_circuits": [2, 0]"#);
        assert_eq!(input.operations, 0);
        assert_eq!(input.bandwidth, 1.0);
        assert_eq!(input.resilience, 1.0);
        assert_eq!(input.recursive_energy, 1.0);

        assert_eq!(input.depths.len(), 3);
        let first = &input.depths[0];
        assert_eq!(first.inputs.phase_vector, vec![1.0, 0.0]);
        assert!((first.inputs.used_capacity - 0.1).abs() < EPS);
        assert_eq!(first.affected_circuits, vec![2, 0]);

        let bare = degrading_input("");
        assert!(bare.depths.iter().all(|d| d.affected_circuits.is_empty()));
    }

    #[test]
    fn test_evaluate_degrading_run() {
        let run = evaluate(&degrading_input(""), &small_config(), 0.7, true).unwrap();
        let depths = &run.report.depths;
        assert_eq!(depths.len(), 3);

        let coherence: Vec<f64> = depths.iter().map(|d| d.measurement.coherence).collect();
        for (got, want) in coherence.iter().zip([0.9, 0.5, 0.05]) {
            assert!((got - want).abs() < EPS, "coherence {got} != {want}");
        }
        assert_eq!(run.engine.coherence_history().len(), 3);

        // First depth has nothing to move from.
        assert_eq!(depths[0].coherence_motion, 0.0);
        assert!((depths[1].coherence_motion + 0.4).abs() < EPS);
        assert!((depths[0].beverly_band - 0.9f64.sqrt()).abs() < EPS);

        for (d, want) in depths.iter().zip([0.1, 0.2, 0.48]) {
            assert!((d.collapse_threshold - want).abs() < EPS);
        }
        assert!(!depths[0].collapsed && !depths[1].collapsed);
        assert!(depths[2].collapsed);
        assert!((depths[2].severity - (0.48 - 0.05) / 0.48).abs() < EPS);

        assert_eq!(run.report.compression, CompressionCoefficient::Finite(0.0));
        assert_eq!(run.report.attractor_strength, 0.0);
        assert_eq!(run.report.safe_depth, 1);
        assert_eq!(run.report.first_collapse, Some(1));
    }

    #[test]
    fn test_empty_circuits_mark_every_layer() {
        let run = evaluate(&degrading_input(""), &small_config(), 0.7, true).unwrap();
        let store = run.store.unwrap();
        let events = store.events(ResidueClass::RecursiveCollapse);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp, 2);

        let severity = run.report.depths[2].severity;
        for layer in 0..3 {
            for token in 0..2 {
                let v = store.tensor().get(ResidueClass::RecursiveCollapse, layer, token, 2);
                assert!((v - severity).abs() < EPS);
            }
        }
    }

    #[test]
    fn test_explicit_circuits_mark_only_those_layers() {
        let input = degrading_input(r#", "affected_circuits": [0]"#);
        let run = evaluate(&input, &small_config(), 0.7, true).unwrap();
        let store = run.store.unwrap();
        let tensor = store.tensor();
        assert!(tensor.get(ResidueClass::RecursiveCollapse, 0, 1, 2) > 0.0);
        assert_eq!(tensor.get(ResidueClass::RecursiveCollapse, 1, 0, 2), 0.0);
        assert_eq!(tensor.get(ResidueClass::RecursiveCollapse, 2, 1, 2), 0.0);
    }

    #[test]
    fn test_no_store_without_residue_recording() {
        let run = evaluate(&degrading_input(""), &small_config(), 0.7, false).unwrap();
        assert!(run.store.is_none());
        assert!(run.report.depths[2].collapsed);
    }

    #[test]
    fn test_mismatched_signal_lengths_rejected() {
        let input: MeasureInput = serde_json::from_str(
            r#"{"depths": [{"phase_vector": [1.0, 0.0], "coherence_motion": [1.0],
                "internal_feedback": 1.0, "external_feedback": 1.0,
                "internal_integrity": 1.0, "phase_alignment": 0.0,
                "total_capacity": 1.0, "used_capacity": 0.0}]}"#,
        )
        .unwrap();
        assert!(evaluate(&input, &small_config(), 0.7, false).is_err());
    }
}
