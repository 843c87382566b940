//! Compare command: all allocation methods over the same data.

use anyhow::{bail, Context, Result};
use quant_allocate::AllocationMethod;
use quant_backtest::{run_many, CancelToken};
use quant_config::load_config_or_default;
use std::path::Path;

use crate::cli::CompareArgs;

pub async fn run(args: CompareArgs, config_path: &Path) -> Result<()> {
    let config = load_config_or_default(config_path).context("loading configuration")?;
    if args.symbols.is_empty() {
        bail!("provide at least one symbol with --symbols (e.g. -S AAPL,MSFT)");
    }

    let table = quant_data::load_table(&args.data, &args.symbols)
        .with_context(|| format!("loading price data from {}", args.data.display()))?;

    // Independent runs, one per method; each worker owns its copy of the
    // table and the results merge back in input order.
    let mut jobs = Vec::new();
    for method in [
        AllocationMethod::Hrp,
        AllocationMethod::MeanVariance,
        AllocationMethod::RiskParity,
    ] {
        let mut run_config = config.clone();
        run_config.allocation.method = method;
        let engine = super::build_engine(&run_config)?;
        jobs.push((method.as_str().to_string(), engine, table.clone()));
    }

    let results = run_many(jobs, CancelToken::new()).await;

    println!(
        "{:<14} {:>10} {:>8} {:>9} {:>9} {:>7} {:>11}",
        "method", "final", "cagr", "sharpe", "max dd", "trades", "suppressed"
    );
    for (name, outcome) in results {
        match outcome {
            Ok(result) => {
                let executed = result
                    .trade_log
                    .iter()
                    .filter(|r| r.outcome.is_executed())
                    .count();
                let suppressed = result.trade_log.len() - executed;
                println!(
                    "{:<14} {:>10.0} {:>7.2}% {:>9.2} {:>8.2}% {:>7} {:>11}",
                    name,
                    result.final_value,
                    result.metrics.cagr * 100.0,
                    result.metrics.sharpe,
                    result.metrics.max_drawdown * 100.0,
                    executed,
                    suppressed,
                );
            }
            Err(error) => println!("{name:<14} failed: {error}"),
        }
    }

    Ok(())
}
