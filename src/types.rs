// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Pricing Simulation Panel - Type Definitions

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

// ─── Mode / Operation ───────────────────────────────────────────────────────

/// Which engine operation a configuration is aimed at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Simulate,
    Optimize,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simulate => "simulate",
            Self::Optimize => "optimize",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simulate" => Some(Self::Simulate),
            "optimize" => Some(Self::Optimize),
            _ => None,
        }
    }

    /// Engine route for this mode, relative to the base address.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Simulate => "/simulate",
            Self::Optimize => "/optimize",
        }
    }
}

// ─── PackageDefinition ──────────────────────────────────────────────────────

/// One purchasable offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDefinition {
    pub data_gb: f64,
    pub voice_min: f64,
    pub validity_days: u32,
    pub price: f64,
    pub label: String,
}

impl Default for PackageDefinition {
    fn default() -> Self {
        Self {
            data_gb: 1.0,
            voice_min: 0.0,
            validity_days: 7,
            price: 100.0,
            label: "Standard".to_string(),
        }
    }
}

// ─── Search space (optimize only) ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SearchField {
    Price,
    DataGb,
    VoiceMin,
    ValidityDays,
}

impl SearchField {
    pub const ALL: [SearchField; 4] = [
        SearchField::Price,
        SearchField::DataGb,
        SearchField::VoiceMin,
        SearchField::ValidityDays,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::DataGb => "data_gb",
            Self::VoiceMin => "voice_min",
            Self::ValidityDays => "validity_days",
        }
    }

    /// Wire keys of the lower/upper bound.
    pub fn bound_keys(&self) -> (&'static str, &'static str) {
        match self {
            Self::Price => ("price_min", "price_max"),
            Self::DataGb => ("data_gb_min", "data_gb_max"),
            Self::VoiceMin => ("voice_min_min", "voice_min_max"),
            Self::ValidityDays => ("validity_min", "validity_max"),
        }
    }

    /// Bounds used when the operator leaves a range blank.
    pub fn fallback_range(&self) -> SearchRange {
        let (min, max) = match self {
            Self::Price => (10.0, 500.0),
            Self::DataGb => (0.0, 20.0),
            Self::VoiceMin => (0.0, 500.0),
            Self::ValidityDays => (1.0, 30.0),
        };
        SearchRange { field: *self, min, max }
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, Self::ValidityDays)
    }
}

/// Inclusive search interval for one package dimension. `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchRange {
    pub field: SearchField,
    pub min: f64,
    pub max: f64,
}

/// All four search intervals, serialized flat as `price_min`, `price_max`, ...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchBounds {
    pub price_min: f64,
    pub price_max: f64,
    pub data_gb_min: f64,
    pub data_gb_max: f64,
    pub voice_min_min: f64,
    pub voice_min_max: f64,
    pub validity_min: u32,
    pub validity_max: u32,
}

impl SearchBounds {
    pub fn range(&self, field: SearchField) -> SearchRange {
        let (min, max) = match field {
            SearchField::Price => (self.price_min, self.price_max),
            SearchField::DataGb => (self.data_gb_min, self.data_gb_max),
            SearchField::VoiceMin => (self.voice_min_min, self.voice_min_max),
            SearchField::ValidityDays => (self.validity_min as f64, self.validity_max as f64),
        };
        SearchRange { field, min, max }
    }
}

// ─── Sub-models ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketParameters {
    #[serde(rename = "N0")]
    pub n0: u64,
    #[serde(rename = "T_days")]
    pub t_days: u32,
    pub discount_rate: f64,
}

/// Acquisition utility coefficients. `sigma > 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilityModel {
    pub beta_data: f64,
    pub beta_voice: f64,
    pub beta_price: f64,
    pub beta_validity: f64,
    pub sigma: f64,
}

/// Data and voice usage. When `use_mixture` is false the engine samples data
/// usage from the medium segment alone. `pi_heavy` never crosses the wire;
/// it is the remainder `1 - pi_light - pi_medium`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageMixtureModel {
    pub use_mixture: bool,
    pub mu_light: f64,
    pub sigma_light: f64,
    pub pi_light: f64,
    pub mu_medium: f64,
    pub sigma_medium: f64,
    pub pi_medium: f64,
    pub mu_heavy: f64,
    pub sigma_heavy: f64,
    pub mu_voice: f64,
    pub sigma_voice: f64,
}

impl UsageMixtureModel {
    pub fn pi_heavy(&self) -> f64 {
        (1.0 - self.pi_light - self.pi_medium).max(0.0)
    }
}

/// Per-technology unit costs and technology shares (`pct_* ` sum to 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkCostModel {
    pub c_gb_3g: f64,
    pub c_gb_4g: f64,
    pub c_gb_5g: f64,
    pub pct_3g: f64,
    pub pct_4g: f64,
    pub pct_5g: f64,
    pub c_min: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverageCharges {
    pub p_over_data: f64,
    pub p_over_voice: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenewalModel {
    pub enable_renewal: bool,
    pub base_renewal_rate: f64,
    pub renewal_decay: f64,
}

/// Risk aversion and Monte Carlo controls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskParameters {
    pub n_simulations: u32,
    pub seed: i64,
    pub risk_lambda: f64,
}

/// Every sub-model shared by both operations, flattened on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    #[serde(flatten)]
    pub market: MarketParameters,
    #[serde(flatten)]
    pub utility: UtilityModel,
    #[serde(flatten)]
    pub usage: UsageMixtureModel,
    #[serde(flatten)]
    pub network: NetworkCostModel,
    #[serde(flatten)]
    pub overage: OverageCharges,
    #[serde(flatten)]
    pub renewal: RenewalModel,
    #[serde(flatten)]
    pub risk: RiskParameters,
}

// ─── Requests ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulateRequest {
    pub package: PackageDefinition,
    #[serde(flatten)]
    pub model: ModelParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeRequest {
    pub packages: Vec<PackageDefinition>,
    #[serde(flatten)]
    pub bounds: SearchBounds,
    #[serde(rename = "T_months")]
    pub t_months: u32,
    #[serde(flatten)]
    pub model: ModelParameters,
    pub n_bo_iterations: u32,
    pub n_bo_init: u32,
}

impl OptimizeRequest {
    /// Number of objective evaluations the search will report.
    pub fn expected_evaluations(&self) -> usize {
        (self.n_bo_init + self.n_bo_iterations) as usize
    }
}

/// A fully numeric, submittable request for one of the two operations.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationRequest {
    Simulate(SimulateRequest),
    Optimize(OptimizeRequest),
}

impl SimulationRequest {
    pub fn mode(&self) -> Mode {
        match self {
            Self::Simulate(_) => Mode::Simulate,
            Self::Optimize(_) => Mode::Optimize,
        }
    }

    pub fn model(&self) -> &ModelParameters {
        match self {
            Self::Simulate(r) => &r.model,
            Self::Optimize(r) => &r.model,
        }
    }

    /// The anchor package: the simulated package, or the optimize seed.
    pub fn anchor(&self) -> Option<&PackageDefinition> {
        match self {
            Self::Simulate(r) => Some(&r.package),
            Self::Optimize(r) => r.packages.first(),
        }
    }

    /// Serialize the request body exactly as it goes over the wire.
    pub fn to_body(&self) -> serde_json::Result<Vec<u8>> {
        match self {
            Self::Simulate(r) => serde_json::to_vec(r),
            Self::Optimize(r) => serde_json::to_vec(r),
        }
    }
}

// ─── Results ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityItem {
    pub parameter: String,
    pub gradient: f64,
    pub abs_gradient: f64,
}

/// One row of the per-period (renewal cycle) or per-month breakdown.
/// Accepts both historical spellings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodProfit {
    #[serde(alias = "month")]
    pub period: u32,
    #[serde(alias = "mean_profit")]
    pub profit: f64,
    #[serde(default)]
    pub cumulative_profit: f64,
    #[serde(default)]
    pub active_users: Option<u64>,
    #[serde(default)]
    pub revenue: Option<f64>,
    #[serde(default)]
    pub cost: Option<f64>,
}

/// Result for one offer tier of a multi-offer comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferResult {
    pub label: String,
    pub data_gb: f64,
    pub voice_min: f64,
    pub validity_days: u32,
    pub price: f64,
    pub expected_profit: f64,
    pub risk_adjusted_profit: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub variance: f64,
    pub std: f64,
}

/// Reads an optional array, treating `null` like a missing key.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Canonical simulation result. `profit_hist_bins.len() == profit_hist_counts.len() + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    #[serde(default)]
    pub package: Option<PackageDefinition>,
    pub expected_profit: f64,
    pub variance: f64,
    #[serde(default)]
    pub std: Option<f64>,
    pub confidence_interval: ConfidenceInterval,
    pub risk_adjusted_profit: f64,
    #[serde(default)]
    pub n_simulations_run: u64,
    #[serde(default)]
    pub seed_used: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub profit_samples: Vec<f64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub profit_hist_bins: Vec<f64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub profit_hist_counts: Vec<u64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub convergence_data: Vec<f64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sensitivity: Vec<SensitivityItem>,
    #[serde(default, alias = "monthly_profits", deserialize_with = "null_as_empty")]
    pub period_profits: Vec<PeriodProfit>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub offers: Vec<OfferResult>,
    #[serde(default)]
    pub total_periods: Option<u32>,
    #[serde(default)]
    pub short_term_profit: Option<f64>,
    #[serde(default)]
    pub long_term_profit: Option<f64>,
}

/// One point visited by the external search. Free coordinates are kept by
/// name because the two historical search spaces differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoEvaluation {
    pub expected_profit: f64,
    #[serde(flatten)]
    pub params: BTreeMap<String, serde_json::Value>,
}

impl BoEvaluation {
    pub fn coordinate(&self, name: &str) -> Option<f64> {
        self.params.get(name).and_then(|v| v.as_f64()).filter(|v| v.is_finite())
    }
}

/// Raw optimize payload as returned by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResponse {
    pub simulation_result: SimulationResult,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub bo_evaluations: Vec<BoEvaluation>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub bo_convergence: Vec<f64>,
    #[serde(default)]
    pub optimal_package: Option<PackageDefinition>,
    #[serde(default)]
    pub optimal_price: Option<f64>,
    #[serde(default)]
    pub optimal_data_cap: Option<f64>,
}

/// Optimum reported by the search, in whichever shape the engine used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimalPoint {
    Package(PackageDefinition),
    PriceCap { price: f64, data_cap: f64 },
}

impl OptimalPoint {
    /// Coordinate of the optimum along a named search dimension.
    pub fn coordinate(&self, name: &str) -> Option<f64> {
        match self {
            Self::Package(p) => match name {
                "price" => Some(p.price),
                "data_gb" => Some(p.data_gb),
                "voice_min" => Some(p.voice_min),
                "validity_days" => Some(p.validity_days as f64),
                _ => None,
            },
            Self::PriceCap { price, data_cap } => match name {
                "price" => Some(*price),
                "data_cap" => Some(*data_cap),
                _ => None,
            },
        }
    }
}

/// Search trace attached to an optimize result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OptimizationTrace {
    pub evaluations: Vec<BoEvaluation>,
    pub convergence: Vec<f64>,
    pub optimum: Option<OptimalPoint>,
}

/// What every chart deriver consumes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalView {
    pub mode: Mode,
    pub result: SimulationResult,
    pub trace: Option<OptimizationTrace>,
}
