// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Pricing Simulation Panel - Configuration Model
//
// Editable panel state. Numeric leaves are kept as the text the operator
// typed (possibly blank); the request builder is the only place that turns
// them into numbers. Every sub-model sits behind an Arc and mutators are
// copy-on-write, so an edit to one group leaves every other group's pointer
// untouched.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{Mode, PackageDefinition, SearchField};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),
    #[error("unknown field `{0}`")]
    UnknownField(String),
    #[error("no package with id {0}")]
    UnknownPackage(u32),
    #[error("invalid value `{value}` for `{field}`")]
    InvalidValue { field: String, value: String },
}

// ---------------------------------------------------------------------------
// Draft values
// ---------------------------------------------------------------------------

/// Editable text of one numeric leaf.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Draft(String);

impl Draft {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn number(v: impl fmt::Display) -> Self {
        Self(v.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for Draft {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for Draft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identity of a package slot. Never reused within one configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageId(pub u32);

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDraft {
    pub id: PackageId,
    pub label: String,
    pub data_gb: Draft,
    pub voice_min: Draft,
    pub validity_days: Draft,
    pub price: Draft,
}

impl PackageDraft {
    fn from_definition(id: PackageId, def: &PackageDefinition) -> Self {
        Self {
            id,
            label: def.label.clone(),
            data_gb: Draft::number(def.data_gb),
            voice_min: Draft::number(def.voice_min),
            validity_days: Draft::number(def.validity_days),
            price: Draft::number(def.price),
        }
    }

    fn field_mut(&mut self, field: PackageField) -> Option<&mut Draft> {
        match field {
            PackageField::Label => None,
            PackageField::DataGb => Some(&mut self.data_gb),
            PackageField::VoiceMin => Some(&mut self.voice_min),
            PackageField::ValidityDays => Some(&mut self.validity_days),
            PackageField::Price => Some(&mut self.price),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeDraft {
    pub min: Draft,
    pub max: Draft,
}

impl RangeDraft {
    fn fallback(field: SearchField) -> Self {
        let r = field.fallback_range();
        Self {
            min: Draft::number(r.min),
            max: Draft::number(r.max),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDraft {
    pub price: RangeDraft,
    pub data_gb: RangeDraft,
    pub voice_min: RangeDraft,
    pub validity_days: RangeDraft,
    pub t_months: Draft,
    pub n_bo_iterations: Draft,
    pub n_bo_init: Draft,
}

impl SearchDraft {
    pub fn range(&self, field: SearchField) -> &RangeDraft {
        match field {
            SearchField::Price => &self.price,
            SearchField::DataGb => &self.data_gb,
            SearchField::VoiceMin => &self.voice_min,
            SearchField::ValidityDays => &self.validity_days,
        }
    }

    fn range_mut(&mut self, field: SearchField) -> &mut RangeDraft {
        match field {
            SearchField::Price => &mut self.price,
            SearchField::DataGb => &mut self.data_gb,
            SearchField::VoiceMin => &mut self.voice_min,
            SearchField::ValidityDays => &mut self.validity_days,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDraft {
    pub n0: Draft,
    pub t_days: Draft,
    pub discount_rate: Draft,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilityDraft {
    pub beta_data: Draft,
    pub beta_voice: Draft,
    pub beta_price: Draft,
    pub beta_validity: Draft,
    pub sigma: Draft,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageDraft {
    pub use_mixture: bool,
    pub mu_light: Draft,
    pub sigma_light: Draft,
    pub pi_light: Draft,
    pub mu_medium: Draft,
    pub sigma_medium: Draft,
    pub pi_medium: Draft,
    pub mu_heavy: Draft,
    pub sigma_heavy: Draft,
    pub mu_voice: Draft,
    pub sigma_voice: Draft,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkDraft {
    pub c_gb_3g: Draft,
    pub c_gb_4g: Draft,
    pub c_gb_5g: Draft,
    pub pct_3g: Draft,
    pub pct_4g: Draft,
    pub pct_5g: Draft,
    pub c_min: Draft,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverageDraft {
    pub p_over_data: Draft,
    pub p_over_voice: Draft,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenewalDraft {
    pub enable_renewal: bool,
    pub base_renewal_rate: Draft,
    pub renewal_decay: Draft,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskDraft {
    pub n_simulations: Draft,
    pub seed: Draft,
    pub risk_lambda: Draft,
}

// ---------------------------------------------------------------------------
// Field paths
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageField {
    Label,
    DataGb,
    VoiceMin,
    ValidityDays,
    Price,
}

impl PackageField {
    pub const ALL: [PackageField; 5] = [
        PackageField::Label,
        PackageField::DataGb,
        PackageField::VoiceMin,
        PackageField::ValidityDays,
        PackageField::Price,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Label => "label",
            Self::DataGb => "data_gb",
            Self::VoiceMin => "voice_min",
            Self::ValidityDays => "validity_days",
            Self::Price => "price",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageRef {
    /// Whichever package currently sits first in the portfolio.
    Anchor,
    Id(PackageId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bound {
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToggleField {
    UseMixture,
    EnableRenewal,
}

impl ToggleField {
    pub fn key(&self) -> &'static str {
        match self {
            Self::UseMixture => "use_mixture",
            Self::EnableRenewal => "enable_renewal",
        }
    }
}

/// Every scalar numeric leaf, named by its wire key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarField {
    N0,
    TDays,
    DiscountRate,
    BetaData,
    BetaVoice,
    BetaPrice,
    BetaValidity,
    Sigma,
    MuLight,
    SigmaLight,
    PiLight,
    MuMedium,
    SigmaMedium,
    PiMedium,
    MuHeavy,
    SigmaHeavy,
    MuVoice,
    SigmaVoice,
    CGb3g,
    CGb4g,
    CGb5g,
    Pct3g,
    Pct4g,
    Pct5g,
    CMin,
    POverData,
    POverVoice,
    BaseRenewalRate,
    RenewalDecay,
    NSimulations,
    Seed,
    RiskLambda,
    TMonths,
    NBoIterations,
    NBoInit,
}

impl ScalarField {
    pub const ALL: [ScalarField; 35] = [
        Self::N0,
        Self::TDays,
        Self::DiscountRate,
        Self::BetaData,
        Self::BetaVoice,
        Self::BetaPrice,
        Self::BetaValidity,
        Self::Sigma,
        Self::MuLight,
        Self::SigmaLight,
        Self::PiLight,
        Self::MuMedium,
        Self::SigmaMedium,
        Self::PiMedium,
        Self::MuHeavy,
        Self::SigmaHeavy,
        Self::MuVoice,
        Self::SigmaVoice,
        Self::CGb3g,
        Self::CGb4g,
        Self::CGb5g,
        Self::Pct3g,
        Self::Pct4g,
        Self::Pct5g,
        Self::CMin,
        Self::POverData,
        Self::POverVoice,
        Self::BaseRenewalRate,
        Self::RenewalDecay,
        Self::NSimulations,
        Self::Seed,
        Self::RiskLambda,
        Self::TMonths,
        Self::NBoIterations,
        Self::NBoInit,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::N0 => "N0",
            Self::TDays => "T_days",
            Self::DiscountRate => "discount_rate",
            Self::BetaData => "beta_data",
            Self::BetaVoice => "beta_voice",
            Self::BetaPrice => "beta_price",
            Self::BetaValidity => "beta_validity",
            Self::Sigma => "sigma",
            Self::MuLight => "mu_light",
            Self::SigmaLight => "sigma_light",
            Self::PiLight => "pi_light",
            Self::MuMedium => "mu_medium",
            Self::SigmaMedium => "sigma_medium",
            Self::PiMedium => "pi_medium",
            Self::MuHeavy => "mu_heavy",
            Self::SigmaHeavy => "sigma_heavy",
            Self::MuVoice => "mu_voice",
            Self::SigmaVoice => "sigma_voice",
            Self::CGb3g => "c_gb_3g",
            Self::CGb4g => "c_gb_4g",
            Self::CGb5g => "c_gb_5g",
            Self::Pct3g => "pct_3g",
            Self::Pct4g => "pct_4g",
            Self::Pct5g => "pct_5g",
            Self::CMin => "c_min",
            Self::POverData => "p_over_data",
            Self::POverVoice => "p_over_voice",
            Self::BaseRenewalRate => "base_renewal_rate",
            Self::RenewalDecay => "renewal_decay",
            Self::NSimulations => "n_simulations",
            Self::Seed => "seed",
            Self::RiskLambda => "risk_lambda",
            Self::TMonths => "T_months",
            Self::NBoIterations => "n_bo_iterations",
            Self::NBoInit => "n_bo_init",
        }
    }
}

/// Address of one editable leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldPath {
    Mode,
    Package { package: PackageRef, field: PackageField },
    Range { field: SearchField, bound: Bound },
    Scalar(ScalarField),
    Toggle(ToggleField),
}

impl FieldPath {
    /// Parse the key the UI uses: `N0`, `price_min`, `use_mixture`,
    /// `package.price` (anchor) or `packages[<id>].price`.
    pub fn parse(key: &str) -> Result<Self, ConfigError> {
        let key = key.trim();
        let unknown = || ConfigError::UnknownField(key.to_string());

        if key == "mode" {
            return Ok(Self::Mode);
        }
        for toggle in [ToggleField::UseMixture, ToggleField::EnableRenewal] {
            if key == toggle.key() {
                return Ok(Self::Toggle(toggle));
            }
        }
        if let Some(field) = ScalarField::ALL.iter().find(|f| f.key() == key) {
            return Ok(Self::Scalar(*field));
        }
        for field in SearchField::ALL {
            let (lo, hi) = field.bound_keys();
            if key == lo {
                return Ok(Self::Range { field, bound: Bound::Min });
            }
            if key == hi {
                return Ok(Self::Range { field, bound: Bound::Max });
            }
        }

        let (package, rest) = if let Some(rest) = key.strip_prefix("package.") {
            (PackageRef::Anchor, rest)
        } else if let Some(rest) = key.strip_prefix("packages[") {
            let (id, tail) = rest.split_once("].").ok_or_else(unknown)?;
            let id: u32 = id.parse().map_err(|_| unknown())?;
            (PackageRef::Id(PackageId(id)), tail)
        } else {
            return Err(unknown());
        };
        let field = PackageField::ALL
            .iter()
            .find(|f| f.key() == rest)
            .copied()
            .ok_or_else(unknown)?;
        Ok(Self::Package { package, field })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mode => f.write_str("mode"),
            Self::Package { package: PackageRef::Anchor, field } => {
                write!(f, "package.{}", field.key())
            }
            Self::Package { package: PackageRef::Id(id), field } => {
                write!(f, "packages[{}].{}", id, field.key())
            }
            Self::Range { field, bound } => {
                let (lo, hi) = field.bound_keys();
                f.write_str(if *bound == Bound::Min { lo } else { hi })
            }
            Self::Scalar(s) => f.write_str(s.key()),
            Self::Toggle(t) => f.write_str(t.key()),
        }
    }
}

fn parse_toggle(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// PanelConfig
// ---------------------------------------------------------------------------

/// The whole editable configuration of one panel.
///
/// Mutators take `&self` and return the next configuration; the receiver is
/// never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PanelRecord")]
pub struct PanelConfig {
    mode: Mode,
    packages: Vec<Arc<PackageDraft>>,
    next_package_id: u32,
    search: Arc<SearchDraft>,
    market: Arc<MarketDraft>,
    utility: Arc<UtilityDraft>,
    usage: Arc<UsageDraft>,
    network: Arc<NetworkDraft>,
    overage: Arc<OverageDraft>,
    renewal: Arc<RenewalDraft>,
    risk: Arc<RiskDraft>,
}

/// Serialized form of [`PanelConfig`], checked before it becomes one.
#[derive(Deserialize)]
struct PanelRecord {
    mode: Mode,
    packages: Vec<Arc<PackageDraft>>,
    next_package_id: u32,
    search: Arc<SearchDraft>,
    market: Arc<MarketDraft>,
    utility: Arc<UtilityDraft>,
    usage: Arc<UsageDraft>,
    network: Arc<NetworkDraft>,
    overage: Arc<OverageDraft>,
    renewal: Arc<RenewalDraft>,
    risk: Arc<RiskDraft>,
}

impl TryFrom<PanelRecord> for PanelConfig {
    type Error = ConfigError;

    fn try_from(r: PanelRecord) -> Result<Self, ConfigError> {
        let mut ids: Vec<u32> = r.packages.iter().map(|p| p.id.0).collect();
        ids.sort_unstable();
        let Some(&highest) = ids.last() else {
            return Err(ConfigError::InvalidOperation("portfolio has no packages"));
        };
        if ids.windows(2).any(|w| w[0] == w[1]) {
            return Err(ConfigError::InvalidOperation("package ids repeat"));
        }
        if highest >= r.next_package_id {
            return Err(ConfigError::InvalidOperation("next_package_id already in use"));
        }
        Ok(Self {
            mode: r.mode,
            packages: r.packages,
            next_package_id: r.next_package_id,
            search: r.search,
            market: r.market,
            utility: r.utility,
            usage: r.usage,
            network: r.network,
            overage: r.overage,
            renewal: r.renewal,
            risk: r.risk,
        })
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self::defaults()
    }
}

impl PanelConfig {
    /// Fresh default configuration. Every call builds new values; nothing is
    /// shared with earlier configurations.
    pub fn defaults() -> Self {
        fn d(v: f64) -> Draft {
            Draft::number(v)
        }
        Self {
            mode: Mode::Simulate,
            packages: vec![Arc::new(PackageDraft::from_definition(
                PackageId(0),
                &PackageDefinition::default(),
            ))],
            next_package_id: 1,
            search: Arc::new(SearchDraft {
                price: RangeDraft::fallback(SearchField::Price),
                data_gb: RangeDraft::fallback(SearchField::DataGb),
                voice_min: RangeDraft::fallback(SearchField::VoiceMin),
                validity_days: RangeDraft::fallback(SearchField::ValidityDays),
                t_months: d(3.0),
                n_bo_iterations: d(30.0),
                n_bo_init: d(10.0),
            }),
            market: Arc::new(MarketDraft {
                n0: d(10000.0),
                t_days: d(90.0),
                discount_rate: d(0.01),
            }),
            utility: Arc::new(UtilityDraft {
                beta_data: d(0.5),
                beta_voice: d(0.3),
                beta_price: d(0.05),
                beta_validity: d(0.2),
                sigma: d(1.0),
            }),
            usage: Arc::new(UsageDraft {
                use_mixture: true,
                mu_light: d(-0.5),
                sigma_light: d(0.5),
                pi_light: d(0.4),
                mu_medium: d(0.5),
                sigma_medium: d(0.6),
                pi_medium: d(0.4),
                mu_heavy: d(1.5),
                sigma_heavy: d(0.7),
                mu_voice: d(3.0),
                sigma_voice: d(0.8),
            }),
            network: Arc::new(NetworkDraft {
                c_gb_3g: d(2.0),
                c_gb_4g: d(5.0),
                c_gb_5g: d(10.0),
                pct_3g: d(0.3),
                pct_4g: d(0.5),
                pct_5g: d(0.2),
                c_min: d(0.5),
            }),
            overage: Arc::new(OverageDraft {
                p_over_data: d(15.0),
                p_over_voice: d(1.5),
            }),
            renewal: Arc::new(RenewalDraft {
                enable_renewal: true,
                base_renewal_rate: d(0.6),
                renewal_decay: d(0.05),
            }),
            risk: Arc::new(RiskDraft {
                n_simulations: d(1000.0),
                seed: d(42.0),
                risk_lambda: d(0.5),
            }),
        }
    }

    // ── Read access ────────────────────────────────────────────────────────

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn packages(&self) -> &[Arc<PackageDraft>] {
        &self.packages
    }

    /// First package of the portfolio; the one simulate mode submits.
    pub fn anchor(&self) -> Option<&PackageDraft> {
        self.packages.first().map(|p| p.as_ref())
    }

    pub fn package(&self, id: PackageId) -> Option<&PackageDraft> {
        self.packages.iter().find(|p| p.id == id).map(|p| p.as_ref())
    }

    pub fn package_index(&self, id: PackageId) -> Option<usize> {
        self.packages.iter().position(|p| p.id == id)
    }

    pub fn search(&self) -> &Arc<SearchDraft> {
        &self.search
    }

    pub fn market(&self) -> &Arc<MarketDraft> {
        &self.market
    }

    pub fn utility(&self) -> &Arc<UtilityDraft> {
        &self.utility
    }

    pub fn usage(&self) -> &Arc<UsageDraft> {
        &self.usage
    }

    pub fn network(&self) -> &Arc<NetworkDraft> {
        &self.network
    }

    pub fn overage(&self) -> &Arc<OverageDraft> {
        &self.overage
    }

    pub fn renewal(&self) -> &Arc<RenewalDraft> {
        &self.renewal
    }

    pub fn risk(&self) -> &Arc<RiskDraft> {
        &self.risk
    }

    pub fn toggle(&self, field: ToggleField) -> bool {
        match field {
            ToggleField::UseMixture => self.usage.use_mixture,
            ToggleField::EnableRenewal => self.renewal.enable_renewal,
        }
    }

    pub fn scalar(&self, field: ScalarField) -> &Draft {
        use ScalarField::*;
        match field {
            N0 => &self.market.n0,
            TDays => &self.market.t_days,
            DiscountRate => &self.market.discount_rate,
            BetaData => &self.utility.beta_data,
            BetaVoice => &self.utility.beta_voice,
            BetaPrice => &self.utility.beta_price,
            BetaValidity => &self.utility.beta_validity,
            Sigma => &self.utility.sigma,
            MuLight => &self.usage.mu_light,
            SigmaLight => &self.usage.sigma_light,
            PiLight => &self.usage.pi_light,
            MuMedium => &self.usage.mu_medium,
            SigmaMedium => &self.usage.sigma_medium,
            PiMedium => &self.usage.pi_medium,
            MuHeavy => &self.usage.mu_heavy,
            SigmaHeavy => &self.usage.sigma_heavy,
            MuVoice => &self.usage.mu_voice,
            SigmaVoice => &self.usage.sigma_voice,
            CGb3g => &self.network.c_gb_3g,
            CGb4g => &self.network.c_gb_4g,
            CGb5g => &self.network.c_gb_5g,
            Pct3g => &self.network.pct_3g,
            Pct4g => &self.network.pct_4g,
            Pct5g => &self.network.pct_5g,
            CMin => &self.network.c_min,
            POverData => &self.overage.p_over_data,
            POverVoice => &self.overage.p_over_voice,
            BaseRenewalRate => &self.renewal.base_renewal_rate,
            RenewalDecay => &self.renewal.renewal_decay,
            NSimulations => &self.risk.n_simulations,
            Seed => &self.risk.seed,
            RiskLambda => &self.risk.risk_lambda,
            TMonths => &self.search.t_months,
            NBoIterations => &self.search.n_bo_iterations,
            NBoInit => &self.search.n_bo_init,
        }
    }

    // ── Mutators ───────────────────────────────────────────────────────────

    /// Switch operation mode. No entered value is touched, so switching back
    /// restores the previous configuration exactly.
    pub fn set_mode(&self, mode: Mode) -> Self {
        let mut next = self.clone();
        next.mode = mode;
        next
    }

    /// Replace one leaf with new editable text.
    pub fn set_field(&self, path: &FieldPath, value: &str) -> Result<Self, ConfigError> {
        let mut next = self.clone();
        match *path {
            FieldPath::Mode => {
                next.mode = Mode::parse(value).ok_or_else(|| ConfigError::InvalidValue {
                    field: "mode".to_string(),
                    value: value.to_string(),
                })?;
            }
            FieldPath::Toggle(toggle) => {
                let on = parse_toggle(toggle.key(), value)?;
                match toggle {
                    ToggleField::UseMixture => Arc::make_mut(&mut next.usage).use_mixture = on,
                    ToggleField::EnableRenewal => {
                        Arc::make_mut(&mut next.renewal).enable_renewal = on
                    }
                }
            }
            FieldPath::Scalar(field) => *next.scalar_mut(field) = Draft::new(value),
            FieldPath::Range { field, bound } => {
                let range = Arc::make_mut(&mut next.search).range_mut(field);
                match bound {
                    Bound::Min => range.min = Draft::new(value),
                    Bound::Max => range.max = Draft::new(value),
                }
            }
            FieldPath::Package { package, field } => {
                let index = match package {
                    PackageRef::Anchor => 0,
                    PackageRef::Id(id) => next
                        .package_index(id)
                        .ok_or(ConfigError::UnknownPackage(id.0))?,
                };
                let slot = Arc::make_mut(&mut next.packages[index]);
                if field == PackageField::Label {
                    slot.label = value.to_string();
                } else if let Some(draft) = slot.field_mut(field) {
                    *draft = Draft::new(value);
                }
            }
        }
        Ok(next)
    }

    /// Append a package with default values and a fresh `Package N` label.
    pub fn add_package(&self) -> Self {
        let mut next = self.clone();
        let id = PackageId(next.next_package_id);
        next.next_package_id += 1;

        let mut n = next.packages.len() + 1;
        let label = loop {
            let candidate = format!("Package {}", n);
            if !next.packages.iter().any(|p| p.label == candidate) {
                break candidate;
            }
            n += 1;
        };
        let def = PackageDefinition {
            label,
            ..PackageDefinition::default()
        };
        next.packages.push(Arc::new(PackageDraft::from_definition(id, &def)));
        next
    }

    /// Remove the package at `index`. Refuses to empty the portfolio.
    pub fn remove_package(&self, index: usize) -> Result<Self, ConfigError> {
        if self.packages.len() <= 1 {
            return Err(ConfigError::InvalidOperation(
                "the portfolio must keep at least one package",
            ));
        }
        if index >= self.packages.len() {
            return Err(ConfigError::InvalidOperation("package index out of range"));
        }
        let mut next = self.clone();
        next.packages.remove(index);
        Ok(next)
    }

    pub fn remove_package_by_id(&self, id: PackageId) -> Result<Self, ConfigError> {
        let index = self.package_index(id).ok_or(ConfigError::UnknownPackage(id.0))?;
        self.remove_package(index)
    }

    fn scalar_mut(&mut self, field: ScalarField) -> &mut Draft {
        use ScalarField::*;
        match field {
            N0 => &mut Arc::make_mut(&mut self.market).n0,
            TDays => &mut Arc::make_mut(&mut self.market).t_days,
            DiscountRate => &mut Arc::make_mut(&mut self.market).discount_rate,
            BetaData => &mut Arc::make_mut(&mut self.utility).beta_data,
            BetaVoice => &mut Arc::make_mut(&mut self.utility).beta_voice,
            BetaPrice => &mut Arc::make_mut(&mut self.utility).beta_price,
            BetaValidity => &mut Arc::make_mut(&mut self.utility).beta_validity,
            Sigma => &mut Arc::make_mut(&mut self.utility).sigma,
            MuLight => &mut Arc::make_mut(&mut self.usage).mu_light,
            SigmaLight => &mut Arc::make_mut(&mut self.usage).sigma_light,
            PiLight => &mut Arc::make_mut(&mut self.usage).pi_light,
            MuMedium => &mut Arc::make_mut(&mut self.usage).mu_medium,
            SigmaMedium => &mut Arc::make_mut(&mut self.usage).sigma_medium,
            PiMedium => &mut Arc::make_mut(&mut self.usage).pi_medium,
            MuHeavy => &mut Arc::make_mut(&mut self.usage).mu_heavy,
            SigmaHeavy => &mut Arc::make_mut(&mut self.usage).sigma_heavy,
            MuVoice => &mut Arc::make_mut(&mut self.usage).mu_voice,
            SigmaVoice => &mut Arc::make_mut(&mut self.usage).sigma_voice,
            CGb3g => &mut Arc::make_mut(&mut self.network).c_gb_3g,
            CGb4g => &mut Arc::make_mut(&mut self.network).c_gb_4g,
            CGb5g => &mut Arc::make_mut(&mut self.network).c_gb_5g,
            Pct3g => &mut Arc::make_mut(&mut self.network).pct_3g,
            Pct4g => &mut Arc::make_mut(&mut self.network).pct_4g,
            Pct5g => &mut Arc::make_mut(&mut self.network).pct_5g,
            CMin => &mut Arc::make_mut(&mut self.network).c_min,
            POverData => &mut Arc::make_mut(&mut self.overage).p_over_data,
            POverVoice => &mut Arc::make_mut(&mut self.overage).p_over_voice,
            BaseRenewalRate => &mut Arc::make_mut(&mut self.renewal).base_renewal_rate,
            RenewalDecay => &mut Arc::make_mut(&mut self.renewal).renewal_decay,
            NSimulations => &mut Arc::make_mut(&mut self.risk).n_simulations,
            Seed => &mut Arc::make_mut(&mut self.risk).seed,
            RiskLambda => &mut Arc::make_mut(&mut self.risk).risk_lambda,
            TMonths => &mut Arc::make_mut(&mut self.search).t_months,
            NBoIterations => &mut Arc::make_mut(&mut self.search).n_bo_iterations,
            NBoInit => &mut Arc::make_mut(&mut self.search).n_bo_init,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
