//! Signals command: score the latest available session.

use anyhow::{bail, Context, Result};
use quant_config::load_config_or_default;
use quant_core::SignalKind;
use quant_signals::SignalGenerator;
use std::path::Path;

use crate::cli::SignalsArgs;

pub async fn run(args: SignalsArgs, config_path: &Path) -> Result<()> {
    let config = load_config_or_default(config_path).context("loading configuration")?;
    if args.symbols.is_empty() {
        bail!("provide at least one symbol with --symbols (e.g. -S AAPL,MSFT)");
    }

    let table = quant_data::load_table(&args.data, &args.symbols)
        .with_context(|| format!("loading price data from {}", args.data.display()))?;
    let Some(&latest) = table.session_dates().last() else {
        bail!("price table has no sessions");
    };

    let generator =
        SignalGenerator::new(config.signals.clone()).context("invalid signal configuration")?;
    let signals = generator.generate(&table.visible_through(latest))?;

    if args.output == "json" {
        println!("{}", serde_json::to_string_pretty(signals.rows())?);
        return Ok(());
    }

    println!("signals for {latest}");
    println!(
        "{:<10} {:>10} {:>10} {:>10} {:>10}",
        "asset", "abs mom", "rel mom", "technical", "composite"
    );
    for asset_id in signals.asset_ids() {
        let value = |kind: SignalKind| {
            signals
                .value(asset_id, kind)
                .map(|v| format!("{v:.4}"))
                .unwrap_or_else(|| "-".to_string())
        };
        println!(
            "{:<10} {:>10} {:>10} {:>10} {:>10}",
            asset_id,
            value(SignalKind::AbsoluteMomentum),
            value(SignalKind::RelativeMomentum),
            value(SignalKind::TechnicalComposite),
            value(SignalKind::Composite),
        );
    }

    let excluded: Vec<&String> = args
        .symbols
        .iter()
        .filter(|s| !signals.asset_ids().contains(&s.as_str()))
        .collect();
    if !excluded.is_empty() {
        println!("\nexcluded (insufficient history): {excluded:?}");
    }

    Ok(())
}
