//! `coherence views`: plot-ready residue reductions of a saved snapshot.

pub fn run(snapshot_path: &str, output_path: Option<&str>) {
    let snapshot = super::load_snapshot(snapshot_path);
    let views = coherence_core::ResidueViews::from_tensor(&snapshot.tensor);

    match output_path {
        Some(path) => super::write_json(path, &views),
        None => match serde_json::to_string_pretty(&views) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Failed to serialize views: {e}");
                std::process::exit(1);
            }
        },
    }
}
