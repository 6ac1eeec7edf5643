//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `cellops_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

fn main() {
    println!("cellops_core version={}", cellops_core::core_version());
    println!(
        "cellops_core default_weights={:?}",
        cellops_core::ScoreWeights::default()
    );
}
