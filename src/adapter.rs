//! Result adapter: resolves the engine's two payload shapes into the one
//! canonical view every chart deriver consumes.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::types::{
    CanonicalView, Mode, OptimalPoint, OptimizationResponse, OptimizationTrace, SimulationResult,
};

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("response has no `{0}` object")]
    MissingSection(&'static str),
}

/// Decode and normalize a raw response body.
pub fn normalize(mode: Mode, raw: &[u8]) -> Result<CanonicalView, AdapterError> {
    let value: Value = serde_json::from_slice(raw)?;
    normalize_value(mode, value)
}

/// Normalize an already-parsed response.
pub fn normalize_value(mode: Mode, value: Value) -> Result<CanonicalView, AdapterError> {
    match mode {
        Mode::Simulate => {
            let mut result = SimulationResult::deserialize(value)?;
            repair_result(&mut result);
            Ok(CanonicalView { mode, result, trace: None })
        }
        Mode::Optimize => {
            if value.get("simulation_result").is_none() {
                return Err(AdapterError::MissingSection("simulation_result"));
            }
            let response = OptimizationResponse::deserialize(value)?;
            let (mut result, trace) = split_optimization(response);
            repair_result(&mut result);
            Ok(CanonicalView { mode, result, trace: Some(trace) })
        }
    }
}

fn split_optimization(response: OptimizationResponse) -> (SimulationResult, OptimizationTrace) {
    let optimum = match (response.optimal_package, response.optimal_price, response.optimal_data_cap) {
        (Some(package), _, _) => Some(OptimalPoint::Package(package)),
        (None, Some(price), Some(data_cap)) => Some(OptimalPoint::PriceCap { price, data_cap }),
        _ => None,
    };
    let mut convergence = response.bo_convergence;
    if repair_convergence(&mut convergence) {
        warn!(len = convergence.len(), "bo_convergence regressed; repaired to running best");
    }
    let trace = OptimizationTrace {
        evaluations: response.bo_evaluations,
        convergence,
        optimum,
    };
    (response.simulation_result, trace)
}

fn repair_result(result: &mut SimulationResult) {
    if result.std.is_none() {
        result.std = Some(result.variance.max(0.0).sqrt());
    }

    if truncate_histogram(&mut result.profit_hist_bins, &mut result.profit_hist_counts) {
        warn!(
            bins = result.profit_hist_bins.len(),
            counts = result.profit_hist_counts.len(),
            "histogram arrays inconsistent; truncated"
        );
    }

    // Stable, so equal profits keep the engine's order.
    result
        .offers
        .sort_by(|a, b| b.expected_profit.total_cmp(&a.expected_profit));
}

/// Replace the series with its running maximum. Returns true when any value
/// had to change. Non-finite samples carry the previous best forward.
pub fn repair_convergence(series: &mut [f64]) -> bool {
    let mut best = f64::NEG_INFINITY;
    let mut changed = false;
    for v in series.iter_mut() {
        if v.is_finite() && *v >= best {
            best = *v;
        } else if best.is_finite() {
            *v = best;
            changed = true;
        }
    }
    changed
}

/// Cut bins/counts back to the longest prefix with `bins == counts + 1`.
/// Missing bins altogether is left alone; charts fall back to index spacing.
fn truncate_histogram(bins: &mut Vec<f64>, counts: &mut Vec<u64>) -> bool {
    if bins.is_empty() || bins.len() == counts.len() + 1 {
        return false;
    }
    if bins.len() > counts.len() + 1 {
        bins.truncate(counts.len() + 1);
    } else {
        counts.truncate(bins.len() - 1);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_result() -> Value {
        json!({
            "expected_profit": 1200.0,
            "variance": 400.0,
            "confidence_interval": { "lower": 1100.0, "upper": 1300.0 },
            "risk_adjusted_profit": 1190.0
        })
    }

    #[test]
    fn test_simulate_passthrough_with_defaults() {
        let view = normalize_value(Mode::Simulate, base_result()).unwrap();
        assert_eq!(view.mode, Mode::Simulate);
        assert!(view.trace.is_none());
        assert_eq!(view.result.expected_profit, 1200.0);
        assert_eq!(view.result.std, Some(20.0));
        assert!(view.result.sensitivity.is_empty());
        assert!(view.result.offers.is_empty());
        assert!(view.result.period_profits.is_empty());
    }

    #[test]
    fn test_reported_std_is_kept() {
        let mut raw = base_result();
        raw["std"] = json!(19.5);
        let view = normalize_value(Mode::Simulate, raw).unwrap();
        assert_eq!(view.result.std, Some(19.5));
    }

    #[test]
    fn test_negative_variance_gives_zero_std() {
        let mut raw = base_result();
        raw["variance"] = json!(-1e-9);
        let view = normalize_value(Mode::Simulate, raw).unwrap();
        assert_eq!(view.result.std, Some(0.0));
    }

    #[test]
    fn test_optimize_with_package_optimum() {
        let raw = json!({
            "simulation_result": base_result(),
            "bo_evaluations": [
                { "price": 80.0, "data_gb": 2.0, "voice_min": 100.0, "validity_days": 7, "expected_profit": 900.0 },
                { "price": 120.0, "data_gb": 5.0, "voice_min": 50.0, "validity_days": 30, "expected_profit": 1200.0 }
            ],
            "bo_convergence": [900.0, 1200.0],
            "optimal_package": { "data_gb": 5.0, "voice_min": 50.0, "validity_days": 30, "price": 120.0, "label": "Optimal" }
        });
        let view = normalize(Mode::Optimize, raw.to_string().as_bytes()).unwrap();
        let trace = view.trace.unwrap();
        assert_eq!(trace.evaluations.len(), 2);
        assert_eq!(trace.evaluations[1].coordinate("validity_days"), Some(30.0));
        match trace.optimum {
            Some(OptimalPoint::Package(p)) => assert_eq!(p.price, 120.0),
            other => panic!("unexpected optimum {:?}", other),
        }
    }

    #[test]
    fn test_optimize_early_price_cap_shape() {
        let mut sim = base_result();
        sim["monthly_profits"] = json!([
            { "month": 1, "mean_profit": 400.0, "cumulative_profit": 400.0 },
            { "month": 2, "mean_profit": 350.0, "cumulative_profit": 750.0 }
        ]);
        sim["short_term_profit"] = json!(400.0);
        sim["long_term_profit"] = json!(750.0);
        let raw = json!({
            "simulation_result": sim,
            "bo_evaluations": [{ "price": 90.0, "data_cap": 3.0, "expected_profit": 500.0 }],
            "bo_convergence": [500.0],
            "optimal_price": 90.0,
            "optimal_data_cap": 3.0
        });
        let view = normalize_value(Mode::Optimize, raw).unwrap();
        assert_eq!(view.result.period_profits.len(), 2);
        assert_eq!(view.result.period_profits[1].period, 2);
        assert_eq!(view.result.period_profits[1].profit, 350.0);
        assert_eq!(view.result.long_term_profit, Some(750.0));
        let optimum = view.trace.unwrap().optimum.unwrap();
        assert_eq!(optimum, OptimalPoint::PriceCap { price: 90.0, data_cap: 3.0 });
        assert_eq!(optimum.coordinate("data_cap"), Some(3.0));
    }

    #[test]
    fn test_optimize_without_trace_arrays() {
        let raw = json!({ "simulation_result": base_result() });
        let trace = normalize_value(Mode::Optimize, raw).unwrap().trace.unwrap();
        assert!(trace.evaluations.is_empty());
        assert!(trace.convergence.is_empty());
        assert!(trace.optimum.is_none());
    }

    #[test]
    fn test_null_arrays_read_as_empty() {
        let mut raw = base_result();
        raw["sensitivity"] = Value::Null;
        raw["offers"] = Value::Null;
        raw["profit_hist_counts"] = Value::Null;
        raw["monthly_profits"] = Value::Null;
        let view = normalize_value(Mode::Simulate, raw.clone()).unwrap();
        assert!(view.result.sensitivity.is_empty());
        assert!(view.result.offers.is_empty());
        assert!(view.result.period_profits.is_empty());

        let wrapped = json!({
            "simulation_result": raw,
            "bo_evaluations": null,
            "bo_convergence": null
        });
        let trace = normalize_value(Mode::Optimize, wrapped).unwrap().trace.unwrap();
        assert!(trace.evaluations.is_empty());
        assert!(trace.convergence.is_empty());
    }

    #[test]
    fn test_optimize_requires_wrapped_result() {
        let err = normalize_value(Mode::Optimize, base_result()).unwrap_err();
        assert!(matches!(err, AdapterError::MissingSection("simulation_result")));
    }

    #[test]
    fn test_convergence_regression_repaired() {
        let mut series = vec![1.0, 3.0, 2.0, f64::NAN, 5.0, 4.0];
        assert!(repair_convergence(&mut series));
        assert_eq!(series, vec![1.0, 3.0, 3.0, 3.0, 5.0, 5.0]);

        let mut clean = vec![1.0, 1.0, 2.0];
        assert!(!repair_convergence(&mut clean));
    }

    #[test]
    fn test_histogram_truncated_to_consistent_prefix() {
        let mut raw = base_result();
        raw["profit_hist_bins"] = json!([0.0, 1.0, 2.0]);
        raw["profit_hist_counts"] = json!([4, 5, 6, 7]);
        let view = normalize_value(Mode::Simulate, raw).unwrap();
        assert_eq!(view.result.profit_hist_bins.len(), 3);
        assert_eq!(view.result.profit_hist_counts, vec![4, 5]);

        let mut raw = base_result();
        raw["profit_hist_bins"] = json!([0.0, 1.0, 2.0, 3.0, 4.0]);
        raw["profit_hist_counts"] = json!([1, 2]);
        let view = normalize_value(Mode::Simulate, raw).unwrap();
        assert_eq!(view.result.profit_hist_bins, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_offers_sorted_by_profit_stable() {
        let offer = |label: &str, profit: f64| {
            json!({
                "label": label, "data_gb": 1.0, "voice_min": 0.0, "validity_days": 7,
                "price": 100.0, "expected_profit": profit, "risk_adjusted_profit": profit,
                "ci_lower": profit, "ci_upper": profit, "variance": 0.0, "std": 0.0
            })
        };
        let mut raw = base_result();
        raw["offers"] = json!([offer("a", 10.0), offer("b", 30.0), offer("c", 10.0), offer("d", 20.0)]);
        let view = normalize_value(Mode::Simulate, raw).unwrap();
        let labels: Vec<&str> = view.result.offers.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_malformed_body_is_error() {
        assert!(matches!(normalize(Mode::Simulate, b"<html>"), Err(AdapterError::Json(_))));
        let missing = json!({ "expected_profit": 1.0 });
        assert!(normalize_value(Mode::Simulate, missing).is_err());
    }
}
