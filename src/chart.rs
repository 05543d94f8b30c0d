// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Pricing Simulation Panel - Chart Data Derivers
//
// Pure functions from canonical result fields to renderer-ready geometry.
// Every function is total: empty or degenerate input yields an empty or
// flat layout, never a NaN and never a panic. Denominators are floored so a
// zero range or zero count cannot divide by zero.

use serde::Serialize;

use crate::types::{OfferResult, OptimizationTrace, PeriodProfit, SensitivityItem, SimulationResult};

/// Coordinates of the drawing area. Geometry is reported with y growing
/// upward from zero; `curve_path` flips it for screen space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlotFrame {
    pub width: f64,
    pub height: f64,
}

impl PlotFrame {
    pub const UNIT: PlotFrame = PlotFrame { width: 1.0, height: 1.0 };

    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width: finite_or(width, 0.0).max(0.0),
            height: finite_or(height, 0.0).max(0.0),
        }
    }
}

impl Default for PlotFrame {
    fn default() -> Self {
        Self::UNIT
    }
}

fn finite_or(v: f64, fallback: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        fallback
    }
}

/// Min and max over the finite values, if there are any.
fn finite_extent(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Min-max scale into [0, 1]. A zero range maps everything to 0.
fn unit_scale(v: f64, (lo, hi): (f64, f64)) -> f64 {
    let range = hi - lo;
    if range > 0.0 && v.is_finite() {
        ((v - lo) / range).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

// ─── Histogram ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBar {
    pub x: f64,
    pub width: f64,
    pub height: f64,
    pub count: u64,
    /// Profit interval of the bin, when the edges are usable.
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

/// One bar per count. Bars are placed from the bin edges when there are
/// exactly `counts + 1` of them spanning a positive width, otherwise evenly.
pub fn histogram_layout(bins: &[f64], counts: &[u64], frame: PlotFrame) -> Vec<HistogramBar> {
    let k = counts.len();
    if k == 0 {
        return Vec::new();
    }
    let max_count = counts.iter().copied().max().unwrap_or(0).max(1) as f64;

    let edges = (bins.len() == k + 1 && bins.iter().all(|b| b.is_finite()))
        .then(|| (bins[0], bins[k] - bins[0]))
        .filter(|(_, span)| *span > 0.0);

    counts
        .iter()
        .enumerate()
        .map(|(i, &count)| {
            let (x, width, lower, upper) = match edges {
                Some((origin, span)) => {
                    let x = unit_scale(bins[i], (origin, origin + span)) * frame.width;
                    let right = unit_scale(bins[i + 1], (origin, origin + span)) * frame.width;
                    (x, (right - x).max(0.0), Some(bins[i]), Some(bins[i + 1]))
                }
                None => {
                    let slot = frame.width / k as f64;
                    (i as f64 * slot, slot, None, None)
                }
            };
            HistogramBar {
                x,
                width,
                height: count as f64 / max_count * frame.height,
                count,
                lower,
                upper,
            }
        })
        .collect()
}

// ─── Curves ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurvePoint {
    pub x: f64,
    pub y: f64,
}

/// Evenly spaced points in index order, y min-max scaled into the frame.
/// A single sample sits at x = 0.
pub fn convergence_curve(samples: &[f64], frame: PlotFrame) -> Vec<CurvePoint> {
    let n = samples.len();
    if n == 0 {
        return Vec::new();
    }
    let extent = finite_extent(samples.iter().copied()).unwrap_or((0.0, 0.0));
    let step = frame.width / (n - 1).max(1) as f64;
    samples
        .iter()
        .enumerate()
        .map(|(i, &v)| CurvePoint {
            x: i as f64 * step,
            y: unit_scale(v, extent) * frame.height,
        })
        .collect()
}

/// SVG path for a curve, y flipped so larger values draw higher.
pub fn curve_path(points: &[CurvePoint], frame: PlotFrame) -> String {
    let mut path = String::new();
    for (i, p) in points.iter().enumerate() {
        if i > 0 {
            path.push(' ');
        }
        let cmd = if i == 0 { 'M' } else { 'L' };
        path.push_str(&format!("{} {:.2} {:.2}", cmd, p.x, frame.height - p.y));
    }
    path
}

// ─── Sensitivity ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensitivityBar {
    pub parameter: String,
    pub gradient: f64,
    pub abs_gradient: f64,
    /// Magnitude relative to the largest one, floored at 1.
    pub pct: f64,
    pub positive: bool,
}

/// Bars ranked by magnitude, largest first; ties keep input order.
pub fn sensitivity_bars(items: &[SensitivityItem]) -> Vec<SensitivityBar> {
    let magnitude = |item: &SensitivityItem| {
        let abs = if item.abs_gradient.is_finite() {
            item.abs_gradient.abs()
        } else {
            finite_or(item.gradient, 0.0).abs()
        };
        finite_or(abs, 0.0)
    };
    let max_abs = items.iter().map(magnitude).fold(0.0_f64, f64::max).max(1.0);

    let mut bars: Vec<SensitivityBar> = items
        .iter()
        .map(|item| {
            let abs = magnitude(item);
            let gradient = finite_or(item.gradient, 0.0);
            SensitivityBar {
                parameter: item.parameter.clone(),
                gradient,
                abs_gradient: abs,
                pct: abs / max_abs,
                positive: gradient >= 0.0,
            }
        })
        .collect();
    bars.sort_by(|a, b| b.abs_gradient.total_cmp(&a.abs_gradient));
    bars
}

// ─── Scatter ────────────────────────────────────────────────────────────────

/// Axis names tried in order when picking the two free coordinates.
pub const SCATTER_AXES: [&str; 5] = ["price", "data_gb", "data_cap", "voice_min", "validity_days"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub x: f64,
    pub y: f64,
    pub intensity: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct ScatterPlot {
    pub x_axis: Option<String>,
    pub y_axis: Option<String>,
    pub points: Vec<ScatterPoint>,
    pub optimum: Option<ScatterPoint>,
}

/// Scatter of the search trace on the first two axes present in it.
/// `reported_profit` is the result's own expected profit, used for the
/// optimum when no evaluation sits on it.
pub fn scatter_points(trace: &OptimizationTrace, reported_profit: Option<f64>) -> ScatterPlot {
    let mut axes = SCATTER_AXES
        .iter()
        .filter(|name| trace.evaluations.iter().any(|e| e.coordinate(name).is_some()));
    match (axes.next(), axes.next()) {
        (Some(x), Some(y)) => scatter_on(trace, x, y, reported_profit),
        _ => ScatterPlot::default(),
    }
}

/// Scatter of the search trace on explicit axes. Evaluations missing either
/// coordinate are skipped. The optimum is scaled like every other point,
/// using the profit of the evaluation at its coordinates, else
/// `reported_profit`; with neither it is omitted.
pub fn scatter_on(
    trace: &OptimizationTrace,
    x_axis: &str,
    y_axis: &str,
    reported_profit: Option<f64>,
) -> ScatterPlot {
    let samples: Vec<(f64, f64, f64)> = trace
        .evaluations
        .iter()
        .filter_map(|e| {
            let x = e.coordinate(x_axis)?;
            let y = e.coordinate(y_axis)?;
            e.expected_profit.is_finite().then_some((x, y, e.expected_profit))
        })
        .collect();

    let x_extent = finite_extent(samples.iter().map(|s| s.0)).unwrap_or((0.0, 0.0));
    let y_extent = finite_extent(samples.iter().map(|s| s.1)).unwrap_or((0.0, 0.0));
    let p_extent = finite_extent(samples.iter().map(|s| s.2)).unwrap_or((0.0, 0.0));

    let points = samples
        .iter()
        .map(|&(x, y, profit)| ScatterPoint {
            x: unit_scale(x, x_extent),
            y: unit_scale(y, y_extent),
            intensity: unit_scale(profit, p_extent),
            profit,
        })
        .collect();

    let optimum = trace.optimum.as_ref().and_then(|opt| {
        let x = opt.coordinate(x_axis)?;
        let y = opt.coordinate(y_axis)?;
        let profit = samples
            .iter()
            .find(|s| same_coordinate(s.0, x) && same_coordinate(s.1, y))
            .map(|s| s.2)
            .or(reported_profit.filter(|p| p.is_finite()))?;
        Some(ScatterPoint {
            x: unit_scale(x, x_extent),
            y: unit_scale(y, y_extent),
            intensity: unit_scale(profit, p_extent),
            profit,
        })
    });

    ScatterPlot {
        x_axis: Some(x_axis.to_string()),
        y_axis: Some(y_axis.to_string()),
        points,
        optimum,
    }
}

fn same_coordinate(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

// ─── Period breakdown ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodBar {
    pub period: u32,
    pub profit: f64,
    pub x: f64,
    pub width: f64,
    /// Bottom edge of the bar.
    pub y: f64,
    pub height: f64,
    pub positive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct PeriodChart {
    pub bars: Vec<PeriodBar>,
    /// y of the zero line.
    pub baseline: f64,
    pub cumulative: Vec<CurvePoint>,
}

/// Per-period profit bars around a zero baseline plus the cumulative curve,
/// on one shared vertical scale.
pub fn period_breakdown(periods: &[PeriodProfit], frame: PlotFrame) -> PeriodChart {
    let n = periods.len();
    if n == 0 {
        return PeriodChart::default();
    }
    let values = periods
        .iter()
        .flat_map(|p| [p.profit, p.cumulative_profit])
        .chain(std::iter::once(0.0));
    let extent = finite_extent(values).unwrap_or((0.0, 0.0));
    let scale = |v: f64| unit_scale(v, extent) * frame.height;
    let baseline = scale(0.0);
    let slot = frame.width / n as f64;

    let mut bars = Vec::with_capacity(n);
    let mut cumulative = Vec::with_capacity(n);
    for (i, p) in periods.iter().enumerate() {
        let top = scale(p.profit);
        bars.push(PeriodBar {
            period: p.period,
            profit: p.profit,
            x: i as f64 * slot + slot * 0.1,
            width: slot * 0.8,
            y: top.min(baseline),
            height: (top - baseline).abs(),
            positive: p.profit >= 0.0,
        });
        cumulative.push(CurvePoint {
            x: i as f64 * slot + slot * 0.5,
            y: scale(p.cumulative_profit),
        });
    }
    PeriodChart { bars, baseline, cumulative }
}

// ─── Summary metrics ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryMetrics {
    pub expected_profit: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub ci_width: f64,
    pub std: f64,
    /// `std / |expected_profit|`; absent when expected profit is zero.
    pub coefficient_of_variation: Option<f64>,
    pub risk_adjusted_profit: f64,
    pub risk_penalty: f64,
    pub probability_of_loss: Option<f64>,
    pub n_simulations_run: u64,
    pub seed_used: i64,
}

pub fn summary_metrics(result: &SimulationResult) -> SummaryMetrics {
    let std = result
        .std
        .filter(|s| s.is_finite())
        .unwrap_or_else(|| result.variance.max(0.0).sqrt());
    let ci = result.confidence_interval;
    SummaryMetrics {
        expected_profit: result.expected_profit,
        ci_lower: ci.lower,
        ci_upper: ci.upper,
        ci_width: ci.upper - ci.lower,
        std,
        coefficient_of_variation: (result.expected_profit.abs() > f64::EPSILON)
            .then(|| std / result.expected_profit.abs()),
        risk_adjusted_profit: result.risk_adjusted_profit,
        risk_penalty: result.expected_profit - result.risk_adjusted_profit,
        probability_of_loss: probability_of_loss(result),
        n_simulations_run: result.n_simulations_run,
        seed_used: result.seed_used,
    }
}

/// Share of outcomes below zero. Uses the histogram, interpolating inside
/// the bin that straddles zero; falls back to raw samples without one.
pub fn probability_of_loss(result: &SimulationResult) -> Option<f64> {
    let bins = &result.profit_hist_bins;
    let counts = &result.profit_hist_counts;
    // Summed as f64; engine counts may be large enough to overflow u64.
    let total: f64 = counts.iter().map(|&c| c as f64).sum();

    if total > 0.0 && bins.len() == counts.len() + 1 {
        let mut below = 0.0;
        for (i, &count) in counts.iter().enumerate() {
            let (lo, hi) = (bins[i], bins[i + 1]);
            if hi <= 0.0 {
                below += count as f64;
            } else if lo < 0.0 && hi > lo {
                below += count as f64 * (-lo / (hi - lo));
            }
        }
        return Some((below / total).clamp(0.0, 1.0));
    }

    let samples: Vec<f64> = result.profit_samples.iter().copied().filter(|v| v.is_finite()).collect();
    if samples.is_empty() {
        return None;
    }
    let losses = samples.iter().filter(|v| **v < 0.0).count();
    Some(losses as f64 / samples.len() as f64)
}

// ─── Offers ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfferBar {
    pub rank: usize,
    pub label: String,
    pub expected_profit: f64,
    pub risk_adjusted_profit: f64,
    /// |profit| relative to the best |profit|, floored at 1.
    pub pct: f64,
}

pub fn offer_ranking(offers: &[OfferResult]) -> Vec<OfferBar> {
    let mut ranked: Vec<&OfferResult> = offers.iter().collect();
    ranked.sort_by(|a, b| b.expected_profit.total_cmp(&a.expected_profit));
    let best = ranked
        .iter()
        .map(|o| finite_or(o.expected_profit, 0.0).abs())
        .fold(0.0_f64, f64::max)
        .max(1.0);
    ranked
        .into_iter()
        .enumerate()
        .map(|(i, o)| OfferBar {
            rank: i + 1,
            label: o.label.clone(),
            expected_profit: o.expected_profit,
            risk_adjusted_profit: o.risk_adjusted_profit,
            pct: finite_or(o.expected_profit, 0.0).abs() / best,
        })
        .collect()
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoEvaluation, ConfidenceInterval, OptimalPoint};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::collections::BTreeMap;

    fn eval(price: f64, data_gb: f64, profit: f64) -> BoEvaluation {
        let mut params = BTreeMap::new();
        params.insert("price".to_string(), serde_json::json!(price));
        params.insert("data_gb".to_string(), serde_json::json!(data_gb));
        BoEvaluation { expected_profit: profit, params }
    }

    fn result_with_hist(bins: Vec<f64>, counts: Vec<u64>) -> SimulationResult {
        SimulationResult {
            package: None,
            expected_profit: 100.0,
            variance: 25.0,
            std: None,
            confidence_interval: ConfidenceInterval { lower: 90.0, upper: 110.0 },
            risk_adjusted_profit: 97.5,
            n_simulations_run: 1000,
            seed_used: 42,
            profit_samples: Vec::new(),
            profit_hist_bins: bins,
            profit_hist_counts: counts,
            convergence_data: Vec::new(),
            sensitivity: Vec::new(),
            period_profits: Vec::new(),
            offers: Vec::new(),
            total_periods: None,
            short_term_profit: None,
            long_term_profit: None,
        }
    }

    #[test]
    fn test_histogram_all_zero_counts() {
        let bars = histogram_layout(&[0.0, 1.0, 2.0, 3.0, 4.0], &[0, 0, 0, 0], PlotFrame::new(400.0, 100.0));
        assert_eq!(bars.len(), 4);
        for bar in &bars {
            assert_eq!(bar.height, 0.0);
            assert!(bar.x.is_finite() && bar.width.is_finite());
        }
        assert_eq!(bars[1].x, 100.0);
        assert_eq!(bars[1].width, 100.0);
    }

    #[test]
    fn test_histogram_heights_scale_to_max() {
        let bars = histogram_layout(&[-10.0, 0.0, 10.0], &[5, 10], PlotFrame::new(200.0, 50.0));
        assert_eq!(bars[0].height, 25.0);
        assert_eq!(bars[1].height, 50.0);
        assert_eq!(bars[0].lower, Some(-10.0));
        assert_eq!(bars[1].x, 100.0);
    }

    #[test]
    fn test_histogram_degenerate_edges_fall_back_to_index() {
        let flat = histogram_layout(&[5.0, 5.0], &[3], PlotFrame::UNIT);
        assert_eq!(flat.len(), 1);
        assert_eq!((flat[0].x, flat[0].width, flat[0].height), (0.0, 1.0, 1.0));
        assert!(flat[0].lower.is_none());

        let mismatched = histogram_layout(&[], &[1, 2], PlotFrame::UNIT);
        assert_eq!(mismatched[1].x, 0.5);
        assert!(histogram_layout(&[0.0], &[], PlotFrame::UNIT).is_empty());
    }

    #[test]
    fn test_histogram_random_invariants() {
        let mut rng = ChaCha8Rng::seed_from_u64(0x5EED);
        for _ in 0..200 {
            let k = rng.gen_range(0..40);
            let counts: Vec<u64> = (0..k).map(|_| rng.gen_range(0..1000)).collect();
            let mut edge = rng.gen_range(-1000.0..1000.0);
            let bins: Vec<f64> = (0..=k)
                .map(|_| {
                    edge += rng.gen_range(0.0..50.0);
                    edge
                })
                .collect();
            let frame = PlotFrame::new(rng.gen_range(1.0..800.0), rng.gen_range(1.0..400.0));
            let bars = histogram_layout(&bins, &counts, frame);
            assert_eq!(bars.len(), counts.len());
            for bar in bars {
                assert!(bar.height >= 0.0 && bar.height <= frame.height);
                assert!(bar.x >= 0.0 && bar.x + bar.width <= frame.width + 1e-9);
            }
        }
    }

    #[test]
    fn test_convergence_curve_shapes() {
        assert!(convergence_curve(&[], PlotFrame::UNIT).is_empty());

        let single = convergence_curve(&[7.0], PlotFrame::new(100.0, 10.0));
        assert_eq!(single, vec![CurvePoint { x: 0.0, y: 0.0 }]);

        let pts = convergence_curve(&[1.0, 2.0, 3.0], PlotFrame::new(100.0, 10.0));
        assert_eq!(pts.len(), 3);
        assert_eq!(pts[1], CurvePoint { x: 50.0, y: 5.0 });
        assert_eq!(pts[2].y, 10.0);
        assert!(pts.windows(2).all(|w| w[0].x < w[1].x));
    }

    #[test]
    fn test_curve_path_flips_y() {
        let frame = PlotFrame::new(100.0, 10.0);
        let path = curve_path(&convergence_curve(&[0.0, 1.0], frame), frame);
        assert_eq!(path, "M 0.00 10.00 L 100.00 0.00");
        assert_eq!(curve_path(&[], frame), "");
    }

    #[test]
    fn test_sensitivity_ranking_stable_with_floor() {
        let item = |name: &str, g: f64| SensitivityItem {
            parameter: name.to_string(),
            gradient: g,
            abs_gradient: g.abs(),
        };
        let bars = sensitivity_bars(&[item("a", 0.2), item("b", -0.5), item("c", 0.5), item("d", f64::NAN)]);
        let order: Vec<&str> = bars.iter().map(|b| b.parameter.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a", "d"]);
        assert_eq!(bars[0].pct, 0.5);
        assert!(!bars[0].positive);
        assert_eq!(bars[3].pct, 0.0);

        let big = sensitivity_bars(&[item("x", 40.0), item("y", -10.0)]);
        assert_eq!(big[0].pct, 1.0);
        assert_eq!(big[1].pct, 0.25);
        assert!(sensitivity_bars(&[]).is_empty());
    }

    #[test]
    fn test_scatter_normalization_and_optimum() {
        let trace = OptimizationTrace {
            evaluations: vec![eval(10.0, 0.0, 100.0), eval(30.0, 4.0, 300.0), eval(20.0, 2.0, 200.0)],
            convergence: vec![100.0, 300.0, 300.0],
            optimum: Some(OptimalPoint::PriceCap { price: 20.0, data_cap: 9.0 }),
        };
        let plot = scatter_on(&trace, "price", "data_gb", Some(250.0));
        assert_eq!(plot.points.len(), 3);
        assert_eq!(plot.points[2].x, 0.5);
        assert_eq!(plot.points[1].y, 1.0);
        assert_eq!(plot.points[0].intensity, 0.0);
        // data_gb is not a coordinate of the price/cap optimum.
        assert!(plot.optimum.is_none());

        let auto = scatter_points(&trace, None);
        assert_eq!(auto.x_axis.as_deref(), Some("price"));
        assert_eq!(auto.y_axis.as_deref(), Some("data_gb"));
    }

    #[test]
    fn test_scatter_optimum_shares_population_scale() {
        let trace = OptimizationTrace {
            evaluations: vec![eval(10.0, 1.0, 5.0), eval(50.0, 1.0, 9.0)],
            convergence: vec![],
            optimum: Some(OptimalPoint::Package(crate::types::PackageDefinition {
                price: 30.0,
                data_gb: 1.0,
                ..Default::default()
            })),
        };
        assert!(scatter_on(&trace, "price", "data_gb", None).optimum.is_none());

        let plot = scatter_on(&trace, "price", "data_gb", Some(7.0));
        let opt = plot.optimum.unwrap();
        assert_eq!(opt.x, 0.5);
        assert_eq!(opt.profit, 7.0);
        assert_eq!(opt.intensity, 0.5);
        // Zero range on y maps everything to the origin.
        assert_eq!(opt.y, 0.0);
        assert!(plot.points.iter().all(|p| p.y == 0.0));
    }

    #[test]
    fn test_scatter_optimum_takes_its_own_profit() {
        let trace = OptimizationTrace {
            evaluations: vec![eval(10.0, 0.0, 100.0), eval(20.0, 1.0, 500.0), eval(30.0, 2.0, 900.0)],
            convergence: vec![100.0, 500.0, 900.0],
            optimum: Some(OptimalPoint::Package(crate::types::PackageDefinition {
                price: 20.0,
                data_gb: 1.0,
                ..Default::default()
            })),
        };
        // The matching evaluation wins over the reported profit.
        let opt = scatter_on(&trace, "price", "data_gb", Some(900.0)).optimum.unwrap();
        assert_eq!((opt.x, opt.y), (0.5, 0.5));
        assert_eq!(opt.profit, 500.0);
        assert_eq!(opt.intensity, 0.5);
    }

    #[test]
    fn test_scatter_degenerate_inputs() {
        assert_eq!(scatter_points(&OptimizationTrace::default(), None), ScatterPlot::default());
        let one_axis = OptimizationTrace {
            evaluations: vec![BoEvaluation {
                expected_profit: 1.0,
                params: [("price".to_string(), serde_json::json!(5.0))].into_iter().collect(),
            }],
            ..Default::default()
        };
        assert!(scatter_points(&one_axis, Some(1.0)).points.is_empty());
    }

    #[test]
    fn test_scatter_random_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        for _ in 0..100 {
            let n = rng.gen_range(0..30);
            let evaluations = (0..n)
                .map(|_| eval(rng.gen_range(10.0..500.0), rng.gen_range(0.0..20.0), rng.gen_range(-1e4..1e4)))
                .collect();
            let plot = scatter_points(&OptimizationTrace { evaluations, ..Default::default() }, None);
            for p in plot.points {
                for v in [p.x, p.y, p.intensity] {
                    assert!((0.0..=1.0).contains(&v));
                }
            }
        }
    }

    #[test]
    fn test_period_breakdown_baseline() {
        let period = |n: u32, profit: f64, cumulative: f64| PeriodProfit {
            period: n,
            profit,
            cumulative_profit: cumulative,
            active_users: None,
            revenue: None,
            cost: None,
        };
        let chart = period_breakdown(
            &[period(1, -50.0, -50.0), period(2, 150.0, 100.0)],
            PlotFrame::new(200.0, 200.0),
        );
        assert_eq!(chart.baseline, 50.0);
        assert_eq!(chart.bars[0].y, 0.0);
        assert_eq!(chart.bars[0].height, 50.0);
        assert!(!chart.bars[0].positive);
        assert_eq!(chart.bars[1].height, 150.0);
        assert_eq!(chart.cumulative[1], CurvePoint { x: 150.0, y: 150.0 });

        let flat = period_breakdown(&[period(1, 0.0, 0.0)], PlotFrame::UNIT);
        assert_eq!(flat.bars[0].height, 0.0);
        assert!(period_breakdown(&[], PlotFrame::UNIT).bars.is_empty());
    }

    #[test]
    fn test_probability_of_loss_interpolates() {
        let result = result_with_hist(vec![-20.0, -10.0, 10.0, 20.0], vec![10, 20, 10]);
        // 10 fully below, half of the straddling 20.
        assert_eq!(probability_of_loss(&result), Some(0.5));

        let empty = result_with_hist(vec![0.0, 1.0], vec![0]);
        assert_eq!(probability_of_loss(&empty), None);

        let mut sampled = result_with_hist(Vec::new(), Vec::new());
        sampled.profit_samples = vec![-1.0, 2.0, 3.0, -4.0];
        assert_eq!(probability_of_loss(&sampled), Some(0.5));
    }

    #[test]
    fn test_probability_of_loss_with_huge_counts() {
        let result = result_with_hist(vec![-1.0, 0.0, 1.0], vec![u64::MAX, 1]);
        let p = summary_metrics(&result).probability_of_loss.unwrap();
        assert!(p > 0.999_999 && p <= 1.0, "{}", p);

        let split = result_with_hist(vec![-1.0, 0.0, 1.0], vec![u64::MAX, u64::MAX]);
        assert_eq!(probability_of_loss(&split), Some(0.5));
    }

    #[test]
    fn test_summary_metrics() {
        let m = summary_metrics(&result_with_hist(Vec::new(), Vec::new()));
        assert_eq!(m.std, 5.0);
        assert_eq!(m.ci_width, 20.0);
        assert_eq!(m.coefficient_of_variation, Some(0.05));
        assert_eq!(m.risk_penalty, 2.5);
        assert_eq!(m.probability_of_loss, None);

        let mut zero = result_with_hist(Vec::new(), Vec::new());
        zero.expected_profit = 0.0;
        assert_eq!(summary_metrics(&zero).coefficient_of_variation, None);
    }

    #[test]
    fn test_offer_ranking() {
        let offer = |label: &str, profit: f64| OfferResult {
            label: label.to_string(),
            data_gb: 1.0,
            voice_min: 0.0,
            validity_days: 7,
            price: 100.0,
            expected_profit: profit,
            risk_adjusted_profit: profit * 0.9,
            ci_lower: profit,
            ci_upper: profit,
            variance: 0.0,
            std: 0.0,
        };
        let ranked = offer_ranking(&[offer("lite", 200.0), offer("max", 800.0), offer("mid", 200.0)]);
        let labels: Vec<&str> = ranked.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec!["max", "lite", "mid"]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].pct, 0.25);

        let tiny = offer_ranking(&[offer("a", 0.5)]);
        assert_eq!(tiny[0].pct, 0.5);
    }
}
