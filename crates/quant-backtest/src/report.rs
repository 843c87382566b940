//! Report rendering for backtest results.

use quant_core::TradeOutcome;

use crate::statistics::{BacktestResult, BacktestStatus};
use crate::validation::BacktestValidation;

/// Render a text summary of a backtest result.
pub fn summary(result: &BacktestResult, validation: Option<&BacktestValidation>) -> String {
    let mut s = String::new();

    let status = match result.status {
        BacktestStatus::Complete => "COMPLETE",
        BacktestStatus::Partial => "PARTIAL (cancelled)",
    };
    let executed = result
        .trade_log
        .iter()
        .filter(|r| r.outcome.is_executed())
        .count();
    let suppressed = result
        .trade_log
        .iter()
        .filter(|r| matches!(r.outcome, TradeOutcome::Suppressed { .. }))
        .count();

    s.push_str("═══════════════════════════════════════════════════════════\n");
    s.push_str("                     BACKTEST REPORT                        \n");
    s.push_str("═══════════════════════════════════════════════════════════\n\n");

    s.push_str(&format!("  Run:                 {}\n", result.run_id));
    s.push_str(&format!("  Status:              {status}\n"));
    s.push_str(&format!("  Method:              {}\n", result.method));
    s.push('\n');

    s.push_str("PERFORMANCE\n");
    s.push_str("───────────────────────────────────────────────────────────\n");
    s.push_str(&format!(
        "  Initial Capital:     ${:.2}\n",
        result.initial_capital
    ));
    s.push_str(&format!("  Final Value:         ${:.2}\n", result.final_value));
    s.push_str(&format!(
        "  CAGR:                {:.2}%\n",
        result.metrics.cagr * 100.0
    ));
    s.push_str(&format!(
        "  Volatility:          {:.2}%\n",
        result.metrics.volatility * 100.0
    ));
    s.push_str(&format!(
        "  Max Drawdown:        {:.2}%\n",
        result.metrics.max_drawdown * 100.0
    ));
    s.push('\n');

    s.push_str("RISK METRICS\n");
    s.push_str("───────────────────────────────────────────────────────────\n");
    s.push_str(&format!("  Sharpe Ratio:        {:.2}\n", result.metrics.sharpe));
    s.push_str(&format!(
        "  Sortino Ratio:       {:.2}\n",
        result.metrics.sortino
    ));
    s.push_str(&format!(
        "  Win Rate:            {:.2}%\n",
        result.metrics.win_rate * 100.0
    ));
    s.push('\n');

    s.push_str("TRADES\n");
    s.push_str("───────────────────────────────────────────────────────────\n");
    s.push_str(&format!("  Executed:            {executed}\n"));
    s.push_str(&format!("  Suppressed:          {suppressed}\n"));
    s.push_str(&format!(
        "  Degradations:        {}\n",
        result.degradations.len()
    ));
    s.push('\n');

    if let Some(validation) = validation {
        s.push_str("VALIDATION\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!(
            "  Probabilistic SR:    {:.4}\n",
            validation.probabilistic_sr
        ));
        s.push_str(&format!(
            "  Deflated SR:         {:.4} ({} trials)\n",
            validation.deflated_sr, validation.n_trials
        ));
        s.push_str(&format!(
            "  Significant:         {}\n",
            if validation.is_significant { "yes" } else { "no" }
        ));
        s.push('\n');
    }

    s.push_str("═══════════════════════════════════════════════════════════\n");
    s
}

/// Export a result to pretty JSON.
pub fn to_json(result: &BacktestResult) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(result)
}

/// Export the equity curve as CSV.
pub fn equity_to_csv(result: &BacktestResult) -> String {
    let mut csv = String::from("date,value\n");
    for point in &result.equity_curve {
        csv.push_str(&format!("{},{}\n", point.date, point.value));
    }
    csv
}
