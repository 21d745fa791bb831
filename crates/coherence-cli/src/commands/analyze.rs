//! `coherence analyze`: residue pattern report for a saved snapshot.

use coherence_core::{CoherenceError, ResidueClass};

/// Run the analyze command.
pub fn run(snapshot_path: &str, output_path: Option<&str>) {
    let snapshot = super::load_snapshot(snapshot_path);
    let store = match snapshot.into_store() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Snapshot {snapshot_path} is not usable: {e}");
            std::process::exit(1);
        }
    };

    let [_, layers, tokens, depths] = store.tensor().shape();
    println!("Residue tensor: {layers} layers × {tokens} tokens × {depths} depths");
    for class in ResidueClass::ALL {
        println!(
            "  {:<20} {:>5} events   total {:>10.4}",
            class.as_str(),
            store.events(class).len(),
            store.tensor().class_total(class)
        );
    }

    let analysis = match store.analyze_residue_pattern() {
        Ok(a) => a,
        Err(CoherenceError::NoResidueData) => {
            println!("\nNo residue recorded; nothing to analyze.");
            return;
        }
        Err(e) => {
            eprintln!("Analysis failed: {e}");
            std::process::exit(1);
        }
    };

    println!();
    println!("  Spatial concentration: {:.4}", analysis.spatial_concentration);
    println!("  Spatial entropy:       {:.4} bits", analysis.spatial_entropy);
    println!("  Temporal gradient:     {:+.4}", analysis.temporal_gradient);
    println!("  Magnitude median:      {:.4}", analysis.magnitude_median);
    println!("  Magnitude variance:    {:.6}", analysis.magnitude_variance);
    println!();
    println!("  Correlations");
    let c = &analysis.correlations;
    println!("    attribution ↔ hesitation: {:+.3}", c.attr_hesitation);
    println!("    attribution ↔ collapse:   {:+.3}", c.attr_collapse);
    println!("    hesitation ↔ collapse:    {:+.3}", c.hesitation_collapse);
    println!();
    println!(
        "  Signature: {} (confidence {:.3})",
        analysis.primary_signature(),
        analysis.signature_confidence()
    );
    for d in &analysis.signature.distances {
        let marker = if d.signature == analysis.primary_signature() {
            "*"
        } else {
            " "
        };
        println!("   {marker} {:<22} {:.4}", d.signature.as_str(), d.distance);
    }

    if let Some(path) = output_path {
        super::write_json(path, &analysis);
    }
}
