pub mod analyze;
pub mod measure;
pub mod views;

use std::path::Path;

use coherence_core::{DiagnosticSnapshot, DiagnosticsConfig};
use serde::Serialize;

/// Load a config file, or defaults when no path is given. Exits on failure.
pub fn load_config(path: Option<&str>) -> DiagnosticsConfig {
    match path {
        None => DiagnosticsConfig::default(),
        Some(p) => match coherence_core::load_config_from_path(Path::new(p)) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load config {p}: {e}");
                std::process::exit(1);
            }
        },
    }
}

/// Load a diagnostic snapshot. Exits on failure.
pub fn load_snapshot(path: &str) -> DiagnosticSnapshot {
    match DiagnosticSnapshot::read_from_path(Path::new(path)) {
        Ok(snap) => snap,
        Err(e) => {
            eprintln!("Failed to load snapshot {path}: {e}");
            std::process::exit(1);
        }
    }
}

/// Pretty-print `value` as JSON to `path`.
pub fn write_json_file<T: Serialize>(path: &str, value: &T) -> coherence_core::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Write `value` as JSON, reporting the outcome on the console. Exits on failure.
pub fn write_json<T: Serialize>(path: &str, value: &T) {
    match write_json_file(path, value) {
        Ok(()) => println!("\nResults written to {path}"),
        Err(e) => {
            eprintln!("\nFailed to write {path}: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_json_file_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-dir").join("out.json");
        let err = write_json_file(missing.to_str().unwrap(), &vec![1.0, 2.0]);
        assert!(matches!(err, Err(coherence_core::CoherenceError::Io(_))));
    }

    #[test]
    fn test_write_json_file_writes_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let path = path.to_str().unwrap();
        write_json_file(path, &vec![0.5]).unwrap();
        let back: Vec<f64> = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(back, vec![0.5]);
    }
}
