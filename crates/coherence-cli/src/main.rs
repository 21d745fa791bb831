//! CLI for coherence: structural-integrity diagnostics for recursive computation.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "coherence")]
#[command(about = "coherence — measure recursive coherence and analyze symbolic residue")]
#[command(version = coherence_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the coherence engine over per-depth signals and print stability
    /// metrics with collapse verdicts.
    Measure {
        /// JSON file with per-depth signals
        input: String,

        /// JSON config (s_max, alpha, layer_weights, layers, tokens, depths)
        #[arg(long)]
        config: Option<String>,

        /// Coherence floor for the safe-depth scan
        #[arg(long, default_value_t = coherence_core::DEFAULT_SAFE_THRESHOLD)]
        threshold: f64,

        /// Write per-depth results as JSON
        #[arg(long)]
        output: Option<String>,

        /// Record detected collapses as residue and save a diagnostic snapshot
        #[arg(long)]
        snapshot: Option<String>,
    },

    /// Residue pattern report for a saved snapshot: spatial, temporal,
    /// magnitude and cross-class statistics plus the nearest signature.
    Analyze {
        /// Snapshot JSON written by `coherence measure --snapshot`
        snapshot: String,

        /// Write the full report as JSON
        #[arg(long)]
        output: Option<String>,
    },

    /// Write the six plot-ready residue reductions of a snapshot as JSON.
    Views {
        /// Snapshot JSON written by `coherence measure --snapshot`
        snapshot: String,

        /// Destination (stdout if omitted)
        #[arg(long)]
        output: Option<String>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Measure {
            input,
            config,
            threshold,
            output,
            snapshot,
        } => commands::measure::run(commands::measure::MeasureCommandConfig {
            input_path: &input,
            config_path: config.as_deref(),
            threshold,
            output_path: output.as_deref(),
            snapshot_path: snapshot.as_deref(),
        }),
        Commands::Analyze { snapshot, output } => {
            commands::analyze::run(&snapshot, output.as_deref())
        }
        Commands::Views { snapshot, output } => commands::views::run(&snapshot, output.as_deref()),
    }
}
