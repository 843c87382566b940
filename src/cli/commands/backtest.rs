//! Backtest command implementation.

use anyhow::{bail, Context, Result};
use quant_allocate::AllocationMethod;
use quant_backtest::{report, validate_backtest, CancelToken};
use quant_config::load_config_or_default;
use std::path::Path;
use tracing::info;

use crate::cli::BacktestArgs;

pub async fn run(args: BacktestArgs, config_path: &Path) -> Result<()> {
    let mut config = load_config_or_default(config_path).context("loading configuration")?;

    if let Some(method) = &args.method {
        config.allocation.method = parse_method(method)?;
    }
    if args.symbols.is_empty() {
        bail!("provide at least one symbol with --symbols (e.g. -S AAPL,MSFT)");
    }

    let table = quant_data::load_table(&args.data, &args.symbols)
        .with_context(|| format!("loading price data from {}", args.data.display()))?;

    let engine = super::build_engine(&config)?;
    info!(method = config.allocation.method.as_str(), "running backtest");

    // Ctrl-C cancels at the next rebalance boundary; the result comes back
    // marked partial instead of being thrown away.
    let cancel = CancelToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });

    let result = tokio::task::spawn_blocking(move || engine.run(&table, &cancel))
        .await
        .context("backtest worker failed")??;

    let tdpy = config.backtest.trading_days_per_year;
    let returns: Vec<f64> = daily_returns(&result);
    let validation = validate_backtest(&returns, args.trials.max(1), 0.0, tdpy);

    match args.output.as_str() {
        "json" => println!("{}", report::to_json(&result)?),
        _ => println!("{}", report::summary(&result, Some(&validation))),
    }

    if let Some(save_path) = &args.save {
        std::fs::write(save_path, report::to_json(&result)?)?;
        info!("results saved to {}", save_path.display());
    }

    Ok(())
}

fn daily_returns(result: &quant_backtest::BacktestResult) -> Vec<f64> {
    use rust_decimal::prelude::ToPrimitive;
    result
        .equity_curve
        .windows(2)
        .filter_map(|pair| {
            let prev = pair[0].value.to_f64()?;
            let next = pair[1].value.to_f64()?;
            (prev > 0.0).then(|| next / prev - 1.0)
        })
        .collect()
}

fn parse_method(raw: &str) -> Result<AllocationMethod> {
    match raw {
        "hrp" => Ok(AllocationMethod::Hrp),
        "mean_variance" => Ok(AllocationMethod::MeanVariance),
        "risk_parity" => Ok(AllocationMethod::RiskParity),
        other => bail!("unknown allocation method '{other}' (expected hrp, mean_variance or risk_parity)"),
    }
}
