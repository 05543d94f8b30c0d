// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Pricing Simulation Panel - Share Arithmetic
//
// Weights that must sum to one (usage segments, technology shares) are
// entered as decimal text. Summing and taking remainders in f64 turns
// 1 - 0.4 - 0.4 into 0.19999999999999996; doing it in Decimal keeps the
// wire values exactly what the operator typed.

use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::str::FromStr;

/// Absolute tolerance for "sums to one".
pub const SUM_TOLERANCE: Decimal = dec!(0.000001);

/// Parse operator text into an exact decimal, accepting scientific notation.
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }
    Decimal::from_str(t).ok().or_else(|| Decimal::from_scientific(t).ok())
}

/// A weight as it goes on the wire. Weights lie in [0, 1], so the 0.0
/// returned for an unrepresentable value never appears in practice.
pub fn weight_to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

pub fn sums_to_one(parts: &[Decimal]) -> bool {
    let total: Decimal = parts.iter().copied().sum();
    (total - Decimal::ONE).abs() <= SUM_TOLERANCE
}

/// Remainder that completes `parts` to one, if it is a valid weight.
pub fn remainder(parts: &[Decimal]) -> Option<Decimal> {
    let rest = Decimal::ONE - parts.iter().copied().sum::<Decimal>();
    if rest < -SUM_TOLERANCE || rest > Decimal::ONE + SUM_TOLERANCE {
        return None;
    }
    Some(rest.max(Decimal::ZERO).min(Decimal::ONE))
}

/// Mixture weights with the heavy share derived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixtureWeights {
    pub light: Decimal,
    pub medium: Decimal,
    pub heavy: Decimal,
}

/// Complete the light/medium weights with a derived heavy share.
///
/// When `light + medium` overshoots one the two entered weights are scaled
/// back proportionally and heavy becomes zero; the heavy share is never
/// entered, so this is normalization, not an operator error.
pub fn complete_mixture(light: Decimal, medium: Decimal) -> MixtureWeights {
    let entered = light + medium;
    if entered <= Decimal::ONE {
        return MixtureWeights {
            light,
            medium,
            heavy: Decimal::ONE - entered,
        };
    }
    let light = light / entered;
    MixtureWeights {
        light,
        medium: Decimal::ONE - light,
        heavy: Decimal::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimal_plain_and_scientific() {
        assert_eq!(parse_decimal(" 0.4 "), Some(dec!(0.4)));
        assert_eq!(parse_decimal("1e-1"), Some(dec!(0.1)));
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("abc"), None);
        assert_eq!(parse_decimal("NaN"), None);
    }

    #[test]
    fn test_heavy_share_is_exact_remainder() {
        let w = complete_mixture(dec!(0.4), dec!(0.4));
        assert_eq!(w.heavy, dec!(0.2));
        assert_eq!(weight_to_f64(w.heavy), 0.2);
    }

    #[test]
    fn test_overshooting_mixture_is_rescaled() {
        let w = complete_mixture(dec!(0.9), dec!(0.6));
        assert_eq!(w.heavy, Decimal::ZERO);
        assert!(sums_to_one(&[w.light, w.medium, w.heavy]));
        assert!((weight_to_f64(w.light) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_sums_to_one_tolerance() {
        assert!(sums_to_one(&[dec!(0.3), dec!(0.5), dec!(0.2)]));
        assert!(sums_to_one(&[dec!(0.3333333), dec!(0.3333333), dec!(0.3333334)]));
        assert!(!sums_to_one(&[dec!(0.3), dec!(0.5), dec!(0.3)]));
    }

    #[test]
    fn test_remainder_rejects_overshoot() {
        assert_eq!(remainder(&[dec!(0.3), dec!(0.5)]), Some(dec!(0.2)));
        assert_eq!(remainder(&[dec!(0.7), dec!(0.5)]), None);
    }
}
