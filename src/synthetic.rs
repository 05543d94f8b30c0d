// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Pricing Simulation Panel - Synthetic Engine (native only)
//
// Offline stand-in for the remote engine. It answers both operations with
// payloads of the real shape built from seeded noise around a placeholder
// profit level, so the same request always yields the same body. None of
// the numbers mean anything economically.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::client::{EngineReply, Transport, TransportError};
use crate::types::*;

const MAX_SAMPLES: usize = 2000;
const HIST_BINS: usize = 20;
const CHECKPOINTS: usize = 20;
const MAX_CYCLES: u32 = 24;

/// Transport that never leaves the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticEngine;

impl Transport for SyntheticEngine {
    async fn post(&self, operation: Mode, body: Vec<u8>) -> Result<EngineReply, TransportError> {
        Ok(respond(operation, &body))
    }
}

/// Answer one request body. Bodies that do not decode get a 422 with a
/// `detail`, the way the engine rejects them.
pub fn respond(operation: Mode, body: &[u8]) -> EngineReply {
    let payload = match operation {
        Mode::Simulate => serde_json::from_slice::<SimulateRequest>(body)
            .and_then(|req| serde_json::to_vec(&simulate(&req))),
        Mode::Optimize => serde_json::from_slice::<OptimizeRequest>(body)
            .and_then(|req| serde_json::to_vec(&optimize(&req))),
    };
    match payload {
        Ok(bytes) => EngineReply::ok(bytes),
        Err(e) => {
            debug!(error = %e, "synthetic engine rejected body");
            EngineReply {
                status: 422,
                body: serde_json::json!({ "detail": e.to_string() }).to_string().into_bytes(),
            }
        }
    }
}

pub fn simulate(req: &SimulateRequest) -> SimulationResult {
    let mut rng = rng_for(req.model.risk.seed);
    evaluate(&req.package, &req.model, &mut rng)
}

pub fn optimize(req: &OptimizeRequest) -> OptimizationResponse {
    let mut rng = rng_for(req.model.risk.seed);
    let anchor = req.packages.first().cloned().unwrap_or_default();

    let mut evaluations = Vec::with_capacity(req.expected_evaluations());
    let mut convergence = Vec::with_capacity(req.expected_evaluations());
    let mut best: Option<(f64, PackageDefinition)> = None;

    for _ in 0..req.expected_evaluations() {
        let candidate = PackageDefinition {
            price: draw(&mut rng, req.bounds.range(SearchField::Price)),
            data_gb: draw(&mut rng, req.bounds.range(SearchField::DataGb)),
            voice_min: draw(&mut rng, req.bounds.range(SearchField::VoiceMin)),
            validity_days: draw(&mut rng, req.bounds.range(SearchField::ValidityDays)).round().max(1.0)
                as u32,
            label: anchor.label.clone(),
        };
        let noise = spread(profit_scale(&req.model.market)) * standard_normal(&mut rng);
        let profit = level(&candidate, &req.model.market) + noise;
        if best.as_ref().map_or(true, |(b, _)| profit > *b) {
            best = Some((profit, candidate.clone()));
        }
        convergence.push(best.as_ref().map_or(profit, |(b, _)| *b));

        let params = [
            ("price", serde_json::json!(candidate.price)),
            ("data_gb", serde_json::json!(candidate.data_gb)),
            ("voice_min", serde_json::json!(candidate.voice_min)),
            ("validity_days", serde_json::json!(candidate.validity_days)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        evaluations.push(BoEvaluation { expected_profit: profit, params });
    }

    let optimal = best.map_or(anchor, |(_, p)| PackageDefinition {
        label: "Optimal".to_string(),
        ..p
    });
    let mut result = evaluate(&optimal, &req.model, &mut rng);
    result.offers = req
        .packages
        .iter()
        .map(|p| offer(p, &evaluate(p, &req.model, &mut rng)))
        .collect();

    OptimizationResponse {
        simulation_result: result,
        bo_evaluations: evaluations,
        bo_convergence: convergence,
        optimal_package: Some(optimal),
        optimal_price: None,
        optimal_data_cap: None,
    }
}

fn rng_for(seed: i64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed as u64)
}

fn draw(rng: &mut ChaCha8Rng, range: SearchRange) -> f64 {
    if range.max > range.min {
        rng.gen_range(range.min..=range.max)
    } else {
        range.min
    }
}

fn standard_normal(rng: &mut ChaCha8Rng) -> f64 {
    // Box-Muller; u1 kept away from zero.
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

// ─── Payload assembly ───────────────────────────────────────────────────────

fn profit_scale(market: &MarketParameters) -> f64 {
    market.n0 as f64 * 0.01
}

/// Placeholder profit level: linear in the package dimensions, scaled by
/// market size.
fn level(package: &PackageDefinition, market: &MarketParameters) -> f64 {
    profit_scale(market) * (package.price - 4.0 * package.data_gb - 0.05 * package.voice_min)
}

fn spread(scale: f64) -> f64 {
    scale * 5.0 + 1.0
}

fn evaluate(package: &PackageDefinition, model: &ModelParameters, rng: &mut ChaCha8Rng) -> SimulationResult {
    let scale = profit_scale(&model.market);
    let center = level(package, &model.market);
    let n = (model.risk.n_simulations as usize).clamp(1, MAX_SAMPLES);
    let samples: Vec<f64> = (0..n)
        .map(|_| center + spread(scale) * standard_normal(rng))
        .collect();

    let mean = samples.iter().sum::<f64>() / n as f64;
    let variance = if n > 1 {
        samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1) as f64
    } else {
        0.0
    };
    let std = variance.sqrt();
    let half_width = 1.96 * std / (n as f64).sqrt();
    let (bins, counts) = histogram(&samples);

    let step = (n / CHECKPOINTS).max(1);
    let mut running = 0.0;
    let mut convergence_data = Vec::new();
    for (i, s) in samples.iter().enumerate() {
        running += s;
        if (i + 1) % step == 0 || i + 1 == n {
            convergence_data.push(running / (i + 1) as f64);
        }
    }

    // Equal share of the mean per validity cycle.
    let periods = (model.market.t_days / package.validity_days.max(1)).clamp(1, MAX_CYCLES);
    let per_period = mean / periods as f64;
    let period_profits: Vec<PeriodProfit> = (1..=periods)
        .map(|k| PeriodProfit {
            period: k,
            profit: per_period,
            cumulative_profit: per_period * k as f64,
            active_users: None,
            revenue: None,
            cost: None,
        })
        .collect();

    let sensitivity = [
        ("price", scale),
        ("data_gb", -4.0 * scale),
        ("voice_min", -0.05 * scale),
        ("validity_days", 0.0),
    ]
    .into_iter()
    .map(|(name, gradient)| SensitivityItem {
        parameter: name.to_string(),
        gradient,
        abs_gradient: gradient.abs(),
    })
    .collect();

    SimulationResult {
        package: Some(package.clone()),
        expected_profit: mean,
        variance,
        std: Some(std),
        confidence_interval: ConfidenceInterval {
            lower: mean - half_width,
            upper: mean + half_width,
        },
        risk_adjusted_profit: mean - model.risk.risk_lambda * std,
        n_simulations_run: n as u64,
        seed_used: model.risk.seed,
        profit_samples: samples,
        profit_hist_bins: bins,
        profit_hist_counts: counts,
        convergence_data,
        sensitivity,
        total_periods: Some(periods),
        period_profits,
        offers: Vec::new(),
        short_term_profit: None,
        long_term_profit: None,
    }
}

fn histogram(samples: &[f64]) -> (Vec<f64>, Vec<u64>) {
    let lo = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !lo.is_finite() || !hi.is_finite() {
        return (Vec::new(), Vec::new());
    }
    let (lo, hi) = if hi > lo { (lo, hi) } else { (lo - 0.5, hi + 0.5) };
    let width = (hi - lo) / HIST_BINS as f64;
    let bins = (0..=HIST_BINS).map(|i| lo + width * i as f64).collect();
    let mut counts = vec![0u64; HIST_BINS];
    for s in samples {
        let idx = (((s - lo) / width) as usize).min(HIST_BINS - 1);
        counts[idx] += 1;
    }
    (bins, counts)
}

fn offer(package: &PackageDefinition, result: &SimulationResult) -> OfferResult {
    OfferResult {
        label: package.label.clone(),
        data_gb: package.data_gb,
        voice_min: package.voice_min,
        validity_days: package.validity_days,
        price: package.price,
        expected_profit: result.expected_profit,
        risk_adjusted_profit: result.risk_adjusted_profit,
        ci_lower: result.confidence_interval.lower,
        ci_upper: result.confidence_interval.upper,
        variance: result.variance,
        std: result.std.unwrap_or(0.0),
    }
}
