//! # coherence-core
//!
//! **Does a layered recursive computation hold together under strain?**
//!
//! `coherence-core` reduces raw per-layer signals into a single bounded
//! coherence score, derives stability metrics from it, and accumulates
//! localized breakdown evidence ("symbolic residue") into a 4-D tensor that
//! can be analyzed and classified against a catalog of known failure
//! signatures.
//!
//! ## Quick Start
//!
//! ```no_run
//! use coherence_core::{CoherenceEngine, CoherenceInputs, DiagnosticsConfig, ResidueStore};
//! use coherence_core::residue::Metadata;
//!
//! let config = DiagnosticsConfig::default();
//! let mut engine = CoherenceEngine::new(config.clone()).unwrap();
//! let m = engine
//!     .measure(&CoherenceInputs {
//!         phase_vector: vec![1.0, 0.0],
//!         coherence_motion: vec![0.9, 0.1],
//!         internal_feedback: 0.8,
//!         external_feedback: 0.7,
//!         internal_integrity: 0.9,
//!         phase_alignment: 0.1,
//!         total_capacity: 1.0,
//!         used_capacity: 0.3,
//!     })
//!     .unwrap();
//! println!("coherence = {:.3}", m.coherence);
//!
//! let mut store = ResidueStore::new(config).unwrap();
//! store.record_attribution_void(3, 17, 1, 0.8, Metadata::new());
//! let report = store.analyze_residue_pattern().unwrap();
//! println!("{} ({:.2})", report.primary_signature(), report.signature_confidence());
//! ```
//!
//! ## Architecture
//!
//! Raw signals → components → engine (Δ−p + history) → stability metrics
//!
//! Raw attributions / token distributions → extractors → residue store →
//! analysis + signature → snapshot / views
//!
//! The engine and the residue store are independent; each owns its own state
//! and one instance serves one logical run.

pub mod components;
pub mod config;
pub mod engine;
pub mod error;
pub mod residue;
pub mod snapshot;
pub mod stability;

pub use components::{
    bounded_integrity, clamp01, coherence_motion, elastic_tolerance, feedback_responsiveness,
    love_equation, phase_alignment, signal_alignment,
};
pub use config::{DiagnosticsConfig, load_config_from_path};
pub use engine::{
    CoherenceEngine, CoherenceInputs, CoherenceMeasurement, Component, ComponentHistory,
    RunHistory,
};
pub use error::{CoherenceError, Result};
pub use residue::{
    ResidueAnalysis, ResidueClass, ResidueEvent, ResidueSignature, ResidueStore, ResidueTensor,
    ResidueViews, SignatureClassification,
};
pub use snapshot::{DiagnosticSnapshot, SNAPSHOT_FORMAT_VERSION};
pub use stability::{
    CollapseVerdict, CompressionCoefficient, DEFAULT_SAFE_THRESHOLD, RecursiveCollapse,
    attractor_strength, calculate_beverly_band, collapse_threshold, detect_collapse,
    detect_recursive_collapse, recursive_compression_coefficient, safe_recursive_depth,
    symbolic_residue_tensor,
};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
