// Console report for one canonical view.

use pricing_panel::chart::{self, PlotFrame};
use pricing_panel::CanonicalView;

const BAR_WIDTH: f64 = 40.0;

pub fn print(view: &CanonicalView) {
    let m = chart::summary_metrics(&view.result);

    println!("\n  Pricing {} result", view.mode.as_str());
    if let Some(p) = &view.result.package {
        println!(
            "  Package: {} | {} GB | {} min | {} days | {:.2}",
            p.label, p.data_gb, p.voice_min, p.validity_days, p.price
        );
    }
    println!("  {}", "-".repeat(60));
    println!("  Expected profit:       {:>14.2}", m.expected_profit);
    println!("  95% CI:                {:>14.2} .. {:.2}", m.ci_lower, m.ci_upper);
    println!("  Std deviation:         {:>14.2}", m.std);
    match m.coefficient_of_variation {
        Some(cv) => println!("  Coeff. of variation:   {:>14.4}", cv),
        None => println!("  Coeff. of variation:   {:>14}", "n/a"),
    }
    println!("  Risk-adjusted profit:  {:>14.2}", m.risk_adjusted_profit);
    println!("  Risk penalty:          {:>14.2}", m.risk_penalty);
    if let Some(p) = m.probability_of_loss {
        println!("  P(loss):               {:>13.1}%", p * 100.0);
    }
    println!("  Simulations: {} | Seed: {}", m.n_simulations_run, m.seed_used);

    let bars = chart::histogram_layout(
        &view.result.profit_hist_bins,
        &view.result.profit_hist_counts,
        PlotFrame::new(1.0, BAR_WIDTH),
    );
    if !bars.is_empty() {
        println!("\n  Profit distribution");
        for bar in &bars {
            let lower = bar.lower.map_or_else(|| "?".to_string(), |l| format!("{:.0}", l));
            println!("  {:>12} {:<40} {}", lower, "#".repeat(bar.height.round() as usize), bar.count);
        }
    }

    let sens = chart::sensitivity_bars(&view.result.sensitivity);
    if !sens.is_empty() {
        println!("\n  Sensitivity");
        for s in &sens {
            let sign = if s.positive { '+' } else { '-' };
            println!(
                "  {:<16} {} {:<40} {:.4}",
                s.parameter,
                sign,
                "=".repeat((s.pct * BAR_WIDTH).round() as usize),
                s.gradient
            );
        }
    }

    let periods = chart::period_breakdown(&view.result.period_profits, PlotFrame::UNIT);
    if !periods.bars.is_empty() {
        println!("\n  {:>6} {:>14} {:>14}", "Period", "Profit", "Cumulative");
        for (bar, row) in periods.bars.iter().zip(&view.result.period_profits) {
            println!("  {:>6} {:>14.2} {:>14.2}", bar.period, bar.profit, row.cumulative_profit);
        }
    }

    let offers = chart::offer_ranking(&view.result.offers);
    if !offers.is_empty() {
        println!("\n  Offers");
        for o in &offers {
            println!(
                "  {:>2}. {:<16} {:>14.2} {:>14.2} {:>5.0}%",
                o.rank,
                o.label,
                o.expected_profit,
                o.risk_adjusted_profit,
                o.pct * 100.0
            );
        }
    }

    if let Some(trace) = &view.trace {
        let frame = PlotFrame::new(100.0, 100.0);
        let curve = chart::convergence_curve(&trace.convergence, frame);
        println!("\n  Search: {} evaluations", trace.evaluations.len());
        if let Some(best) = trace.convergence.last() {
            println!("  Best expected profit:  {:>14.2}", best);
        }
        let plot = chart::scatter_points(trace, Some(view.result.expected_profit));
        if let (Some(x), Some(y)) = (&plot.x_axis, &plot.y_axis) {
            println!("  Scatter axes: {} x {} ({} points)", x, y, plot.points.len());
        }
        if !curve.is_empty() {
            println!("  Convergence path: {}", chart::curve_path(&curve, frame));
        }
    }
    println!();
}
