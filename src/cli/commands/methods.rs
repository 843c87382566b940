//! Methods command: list the available allocation methods.

use anyhow::Result;

pub async fn run() -> Result<()> {
    println!("Available allocation methods:\n");
    for (name, description) in [
        (
            "hrp",
            "Hierarchical risk allocation — correlation clustering with inverse-variance splits (default, and the fallback for the others)",
        ),
        (
            "mean_variance",
            "Mean-variance — composite scores as expected returns against the sample covariance",
        ),
        (
            "risk_parity",
            "Risk parity — equal risk contribution via damped fixed-point iteration",
        ),
    ] {
        println!("  {name:<14} {description}");
    }
    println!("\nSelect with `allocation.method` in the config file or --method on the backtest command.");
    Ok(())
}
