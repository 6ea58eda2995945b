//! Example: plot a small square and dump the resulting step trace.
//!
//! Run with `cargo run -p sim --example run_sim --features trace`.

use motion::PlannerConfig;
use sim::{PlotterHarness, ScriptedMove};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut harness = PlotterHarness::new(PlannerConfig::plotter_default());
    let script = [
        ScriptedMove::new([20.0, 0.0], 150.0, 1200.0),
        ScriptedMove::new([20.0, 20.0], 150.0, 1200.0),
        ScriptedMove::new([0.0, 20.0], 150.0, 1200.0),
        ScriptedMove::new([0.0, 0.0], 150.0, 1200.0),
    ];

    harness.run(&script);
    tracing::info!(
        final_position = ?harness.final_step_position(),
        steps = harness.step_trace().len(),
        "square plotted"
    );

    #[cfg(feature = "trace")]
    harness.dump_trace_json(std::path::Path::new("/tmp/sim_trace.json"))?;

    Ok(())
}
