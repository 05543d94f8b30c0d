// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Pricing Simulation Panel - Request Builder
//
// Turns the editable configuration into a fully numeric request for the
// selected operation. Every problem is collected before returning so a form
// can flag all of them at once.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::config::{Draft, PackageDraft, PanelConfig, ScalarField};
use crate::shares;
use crate::types::*;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum ValidationReason {
    #[error("required")]
    Required,
    #[error("must be a whole number")]
    NotAnInteger,
    #[error("{0}")]
    OutOfRange(String),
    #[error("min must not exceed max")]
    InvertedRange,
    #[error("must sum to 1")]
    MustSumToOne,
}

/// One field-level problem that blocks submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: ValidationReason,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: ValidationReason) -> Self {
        Self { field: field.into(), reason }
    }
}

/// Field key of the cross-field technology share check.
pub const NETWORK_SHARES: &str = "network_shares";

// ---------------------------------------------------------------------------
// Coercion
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Rule {
    Any,
    NonNegative,
    Positive,
    Between(f64, f64),
}

impl Rule {
    fn check(&self, v: f64) -> Option<String> {
        match *self {
            Rule::Any => None,
            Rule::NonNegative if v < 0.0 => Some("must be >= 0".to_string()),
            Rule::Positive if v <= 0.0 => Some("must be > 0".to_string()),
            Rule::Between(lo, hi) if v < lo || v > hi => {
                Some(format!("must be between {} and {}", lo, hi))
            }
            _ => None,
        }
    }
}

/// Accumulates errors while coercing drafts. Failed leaves yield a zero
/// placeholder; the request is discarded whenever any error was recorded.
#[derive(Default)]
struct Coercer {
    errors: Vec<ValidationError>,
}

impl Coercer {
    fn fail(&mut self, field: &str, reason: ValidationReason) {
        self.errors.push(ValidationError::new(field, reason));
    }

    fn parse(&mut self, field: &str, draft: &Draft) -> Option<f64> {
        match draft.as_str().trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Some(v),
            _ => {
                self.fail(field, ValidationReason::Required);
                None
            }
        }
    }

    fn real(&mut self, field: &str, draft: &Draft, rule: Rule) -> f64 {
        let Some(v) = self.parse(field, draft) else {
            return 0.0;
        };
        if let Some(msg) = rule.check(v) {
            self.fail(field, ValidationReason::OutOfRange(msg));
        }
        v
    }

    fn integer(&mut self, field: &str, draft: &Draft, min: i64, max: i64) -> i64 {
        let Some(v) = self.parse(field, draft) else {
            return 0;
        };
        if v.fract() != 0.0 {
            self.fail(field, ValidationReason::NotAnInteger);
            return 0;
        }
        if v < min as f64 || v > max as f64 {
            let unbounded = max == i64::MAX || max == u32::MAX as i64;
            let msg = match (unbounded, v > max as f64) {
                (true, true) => format!("is too large (max {})", max),
                (true, false) => format!("must be >= {}", min),
                (false, _) => format!("must be between {} and {}", min, max),
            };
            self.fail(field, ValidationReason::OutOfRange(msg));
            return 0;
        }
        v as i64
    }

    fn count(&mut self, field: &str, draft: &Draft, min: u32) -> u32 {
        self.integer(field, draft, min as i64, u32::MAX as i64) as u32
    }

    fn scalar(&mut self, cfg: &PanelConfig, field: ScalarField, rule: Rule) -> f64 {
        self.real(field.key(), cfg.scalar(field), rule)
    }

    fn scalar_count(&mut self, cfg: &PanelConfig, field: ScalarField, min: u32) -> u32 {
        self.count(field.key(), cfg.scalar(field), min)
    }

    /// Parse an optional weight; blank is `None`, garbage is an error.
    fn weight(&mut self, field: &str, draft: &Draft) -> Result<Option<Decimal>, ()> {
        if draft.is_blank() {
            return Ok(None);
        }
        match shares::parse_decimal(draft.as_str()) {
            Some(w) if w >= Decimal::ZERO && w <= Decimal::ONE => Ok(Some(w)),
            Some(_) => {
                self.fail(field, ValidationReason::OutOfRange("must be between 0 and 1".into()));
                Err(())
            }
            None => {
                self.fail(field, ValidationReason::Required);
                Err(())
            }
        }
    }

    fn package(&mut self, prefix: &str, draft: &PackageDraft) -> PackageDefinition {
        let key = |leaf: &str| format!("{}.{}", prefix, leaf);
        let label = draft.label.trim();
        if label.is_empty() {
            self.fail(&key("label"), ValidationReason::Required);
        }
        PackageDefinition {
            data_gb: self.real(&key("data_gb"), &draft.data_gb, Rule::NonNegative),
            voice_min: self.real(&key("voice_min"), &draft.voice_min, Rule::NonNegative),
            validity_days: self.count(&key("validity_days"), &draft.validity_days, 1),
            price: self.real(&key("price"), &draft.price, Rule::Positive),
            label: label.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sub-model builders
// ---------------------------------------------------------------------------

fn build_usage(c: &mut Coercer, cfg: &PanelConfig) -> UsageMixtureModel {
    use ScalarField::*;
    let usage = cfg.usage();

    let light = c.weight(PiLight.key(), &usage.pi_light);
    let medium = c.weight(PiMedium.key(), &usage.pi_medium);
    let (pi_light, pi_medium) = match (light, medium) {
        (Ok(Some(l)), Ok(Some(m))) => {
            let w = shares::complete_mixture(l, m);
            (shares::weight_to_f64(w.light), shares::weight_to_f64(w.medium))
        }
        (l, m) => {
            if matches!(l, Ok(None)) {
                c.fail(PiLight.key(), ValidationReason::Required);
            }
            if matches!(m, Ok(None)) {
                c.fail(PiMedium.key(), ValidationReason::Required);
            }
            (0.0, 0.0)
        }
    };

    UsageMixtureModel {
        use_mixture: usage.use_mixture,
        mu_light: c.scalar(cfg, MuLight, Rule::Any),
        sigma_light: c.scalar(cfg, SigmaLight, Rule::Positive),
        pi_light,
        mu_medium: c.scalar(cfg, MuMedium, Rule::Any),
        sigma_medium: c.scalar(cfg, SigmaMedium, Rule::Positive),
        pi_medium,
        mu_heavy: c.scalar(cfg, MuHeavy, Rule::Any),
        sigma_heavy: c.scalar(cfg, SigmaHeavy, Rule::Positive),
        mu_voice: c.scalar(cfg, MuVoice, Rule::Any),
        sigma_voice: c.scalar(cfg, SigmaVoice, Rule::Positive),
    }
}

/// Technology shares: all three must sum to one, or exactly one may be left
/// blank and is derived from the other two.
fn build_shares(c: &mut Coercer, cfg: &PanelConfig) -> [f64; 3] {
    use ScalarField::*;
    let fields = [Pct3g, Pct4g, Pct5g];
    let parsed: Vec<Result<Option<Decimal>, ()>> = fields
        .iter()
        .map(|f| c.weight(f.key(), cfg.scalar(*f)))
        .collect();
    if parsed.iter().any(|p| p.is_err()) {
        return [0.0; 3];
    }
    let values: Vec<Option<Decimal>> = parsed.into_iter().map(|p| p.unwrap_or(None)).collect();
    let present: Vec<Decimal> = values.iter().flatten().copied().collect();

    let complete = match present.len() {
        3 if shares::sums_to_one(&present) => Some([present[0], present[1], present[2]]),
        2 => shares::remainder(&present).map(|rest| {
            let mut it = present.iter().copied();
            let mut out = [Decimal::ZERO; 3];
            for (slot, v) in out.iter_mut().zip(values.iter()) {
                *slot = match v {
                    Some(_) => it.next().unwrap_or(Decimal::ZERO),
                    None => rest,
                };
            }
            out
        }),
        _ => None,
    };

    match complete {
        Some(w) => w.map(shares::weight_to_f64),
        None => {
            c.fail(NETWORK_SHARES, ValidationReason::MustSumToOne);
            [0.0; 3]
        }
    }
}

fn build_model(c: &mut Coercer, cfg: &PanelConfig) -> ModelParameters {
    use ScalarField::*;

    let market = MarketParameters {
        n0: c.integer(N0.key(), cfg.scalar(N0), 1, i64::MAX) as u64,
        t_days: c.scalar_count(cfg, TDays, 1),
        discount_rate: c.scalar(cfg, DiscountRate, Rule::Between(0.0, 0.5)),
    };
    let utility = UtilityModel {
        beta_data: c.scalar(cfg, BetaData, Rule::Any),
        beta_voice: c.scalar(cfg, BetaVoice, Rule::Any),
        beta_price: c.scalar(cfg, BetaPrice, Rule::Any),
        beta_validity: c.scalar(cfg, BetaValidity, Rule::Any),
        sigma: c.scalar(cfg, Sigma, Rule::Positive),
    };
    let usage = build_usage(c, cfg);
    let [pct_3g, pct_4g, pct_5g] = build_shares(c, cfg);
    let network = NetworkCostModel {
        c_gb_3g: c.scalar(cfg, CGb3g, Rule::NonNegative),
        c_gb_4g: c.scalar(cfg, CGb4g, Rule::NonNegative),
        c_gb_5g: c.scalar(cfg, CGb5g, Rule::NonNegative),
        pct_3g,
        pct_4g,
        pct_5g,
        c_min: c.scalar(cfg, CMin, Rule::NonNegative),
    };
    let overage = OverageCharges {
        p_over_data: c.scalar(cfg, POverData, Rule::NonNegative),
        p_over_voice: c.scalar(cfg, POverVoice, Rule::NonNegative),
    };
    let renewal = RenewalModel {
        enable_renewal: cfg.renewal().enable_renewal,
        base_renewal_rate: c.scalar(cfg, BaseRenewalRate, Rule::Between(0.0, 1.0)),
        renewal_decay: c.scalar(cfg, RenewalDecay, Rule::NonNegative),
    };
    let risk = RiskParameters {
        n_simulations: c.scalar_count(cfg, NSimulations, 1),
        seed: c.integer(Seed.key(), cfg.scalar(Seed), i64::MIN, i64::MAX),
        risk_lambda: c.scalar(cfg, RiskLambda, Rule::NonNegative),
    };

    ModelParameters { market, utility, usage, network, overage, renewal, risk }
}

fn build_bounds(c: &mut Coercer, cfg: &PanelConfig) -> SearchBounds {
    let search = cfg.search();
    let mut resolved = Vec::with_capacity(SearchField::ALL.len());

    for field in SearchField::ALL {
        let drafts = search.range(field);
        let fallback = field.fallback_range();
        let (lo_key, hi_key) = field.bound_keys();

        let mut bound = |key: &str, draft: &Draft, default: f64| -> Option<f64> {
            if draft.is_blank() {
                return Some(default);
            }
            let errors_before = c.errors.len();
            let v = if field.is_integral() {
                c.count(key, draft, 1) as f64
            } else {
                c.real(key, draft, Rule::NonNegative)
            };
            (c.errors.len() == errors_before).then_some(v)
        };
        let min = bound(lo_key, &drafts.min, fallback.min);
        let max = bound(hi_key, &drafts.max, fallback.max);

        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                c.fail(&format!("{}_range", field.as_str()), ValidationReason::InvertedRange);
            }
        }
        resolved.push((min.unwrap_or(fallback.min), max.unwrap_or(fallback.max)));
    }

    SearchBounds {
        price_min: resolved[0].0,
        price_max: resolved[0].1,
        data_gb_min: resolved[1].0,
        data_gb_max: resolved[1].1,
        voice_min_min: resolved[2].0,
        voice_min_max: resolved[2].1,
        validity_min: resolved[3].0 as u32,
        validity_max: resolved[3].1 as u32,
    }
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Build a request for the configuration's current mode.
pub fn build(config: &PanelConfig) -> Result<SimulationRequest, Vec<ValidationError>> {
    build_for(config, config.mode())
}

/// Build a request for an explicit mode.
///
/// Simulate serializes only the anchor package; later portfolio entries are
/// ignored, not validated. Optimize serializes the whole portfolio and fills
/// blank search bounds from [`SearchField::fallback_range`].
pub fn build_for(
    config: &PanelConfig,
    mode: Mode,
) -> Result<SimulationRequest, Vec<ValidationError>> {
    let mut c = Coercer::default();

    let request = match mode {
        Mode::Simulate => {
            let package = match config.anchor() {
                Some(anchor) => c.package("package", anchor),
                None => {
                    c.fail("package", ValidationReason::Required);
                    PackageDefinition::default()
                }
            };
            let model = build_model(&mut c, config);
            SimulationRequest::Simulate(SimulateRequest { package, model })
        }
        Mode::Optimize => {
            let packages = config
                .packages()
                .iter()
                .map(|p| c.package(&format!("packages[{}]", p.id), p))
                .collect();
            let bounds = build_bounds(&mut c, config);
            let t_months = c.scalar_count(config, ScalarField::TMonths, 1);
            let model = build_model(&mut c, config);
            let n_bo_iterations = c.scalar_count(config, ScalarField::NBoIterations, 1);
            let n_bo_init = c.scalar_count(config, ScalarField::NBoInit, 3);
            SimulationRequest::Optimize(OptimizeRequest {
                packages,
                bounds,
                t_months,
                model,
                n_bo_iterations,
                n_bo_init,
            })
        }
    };

    if c.errors.is_empty() {
        debug!(mode = mode.as_str(), "request built");
        Ok(request)
    } else {
        debug!(mode = mode.as_str(), errors = c.errors.len(), "request rejected");
        Err(c.errors)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
