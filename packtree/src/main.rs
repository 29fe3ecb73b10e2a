// Test code is allowed to use unwrap() for convenience.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
use packtree::config::RunConfig;
use packtree::simulation::{Simulator, SimulatorConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "packtree=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let run = match RunConfig::from_env() {
        Ok(run) => run,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Loaded configuration: seed={}, operations={}, block_size={}, merge_threshold={}%",
        run.seed,
        run.operations,
        run.tree.block_size,
        run.tree.merge_threshold_percent
    );

    let config = SimulatorConfig::new(run.seed).with_tree_config(run.tree);
    let result = Simulator::new(config).run(run.operations);

    if let Some(error) = &result.error {
        tracing::error!("Simulation aborted: {error}");
    }
    for violation in &result.invariant_violations {
        tracing::error!("{violation}");
    }
    if let Some(stats) = &result.stats {
        tracing::info!(
            "Tree: height={}, nodes={}, leaves={}, entries={}, fill={:.2}",
            stats.height,
            stats.node_count(),
            stats.leaf_count(),
            stats.entries,
            stats.fill_ratio()
        );
    }
    tracing::info!(
        "Ran {} operations ({} applied, {} rejected), {} violations",
        result.operations_run,
        result.successful_operations,
        result.rejected_operations,
        result.invariant_violations.len()
    );

    if !result.passed() {
        std::process::exit(1);
    }
}
