//! Significance & Winner Selection
//!
//! One-degree-of-freedom chi-squared test over the two arms' event counts,
//! with the p-value read off a normal approximation:
//! `p = 1 - [Phi(sqrt(chi2)) - Phi(-sqrt(chi2))]`.
//!
//! Phi uses the Abramowitz & Stegun 7.1.26 erf approximation (|error| < 1.5e-7).
//! Good enough for tuning thresholds, not for publication.

use super::types::{Experiment, Metric, Significance, Verdict, WinnerRecommendation};
use crate::constants::{BLOCK_RATE_GUARD, MAX_WINNER_CONFIDENCE, SIGNIFICANCE_LEVEL};

// ============================================================================
// NORMAL APPROXIMATION
// ============================================================================

const ERF_A1: f64 = 0.254829592;
const ERF_A2: f64 = -0.284496736;
const ERF_A3: f64 = 1.421413741;
const ERF_A4: f64 = -1.453152027;
const ERF_A5: f64 = 1.061405429;
const ERF_P: f64 = 0.3275911;

fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + ERF_P * x);
    let poly = ((((ERF_A5 * t + ERF_A4) * t + ERF_A3) * t + ERF_A2) * t + ERF_A1) * t;
    sign * (1.0 - poly * (-x * x).exp())
}

/// Standard normal CDF
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

// ============================================================================
// CHI-SQUARED
// ============================================================================

/// Compare `control_count / control_n` against `variant_count / variant_n`
pub fn chi_squared_test(control_count: u64, control_n: u64, variant_count: u64, variant_n: u64) -> Significance {
    let total_n = control_n + variant_n;
    if total_n == 0 {
        return Significance::not_significant();
    }

    let pooled = (control_count + variant_count) as f64 / total_n as f64;
    let expected_control = control_n as f64 * pooled;
    let expected_variant = variant_n as f64 * pooled;

    // No events in either arm: nothing to compare
    if expected_control <= 0.0 || expected_variant <= 0.0 {
        return Significance::not_significant();
    }

    let chi_squared = (control_count as f64 - expected_control).powi(2) / expected_control
        + (variant_count as f64 - expected_variant).powi(2) / expected_variant;

    let z = chi_squared.sqrt();
    let p_value = (1.0 - (normal_cdf(z) - normal_cdf(-z))).clamp(0.0, 1.0);

    Significance {
        p_value,
        chi_squared,
        significant: p_value < SIGNIFICANCE_LEVEL,
        stars: stars_for(p_value),
    }
}

fn stars_for(p_value: f64) -> u8 {
    if p_value < 0.01 {
        3
    } else if p_value < 0.05 {
        2
    } else if p_value < 0.10 {
        1
    } else {
        0
    }
}

/// Test `metric` between the arms. Not significant until both arms reach
/// the minimum sample size.
pub fn significance(experiment: &Experiment, metric: Metric) -> Significance {
    if !experiment.has_enough_samples() {
        return Significance::not_significant();
    }

    let control = &experiment.results.control;
    let variant = &experiment.results.variant;
    chi_squared_test(
        control.count(metric),
        control.attempts,
        variant.count(metric),
        variant.attempts,
    )
}

// ============================================================================
// WINNER
// ============================================================================

/// Pick a winner on false-positive rate. The variant must also keep at
/// least 80% of control's block rate so it cannot win by blocking less.
pub fn recommend_winner(experiment: &Experiment) -> WinnerRecommendation {
    let control = &experiment.results.control;
    let variant = &experiment.results.variant;
    let control_fp_rate = control.rate(Metric::FalsePositives);
    let variant_fp_rate = variant.rate(Metric::FalsePositives);

    if !experiment.has_enough_samples() {
        return WinnerRecommendation {
            winner: None,
            verdict: Verdict::Inconclusive,
            confidence: 0.0,
            reason: format!(
                "Need at least {} attempts per arm (control: {}, variant: {})",
                experiment.min_sample_size, control.attempts, variant.attempts
            ),
            control_fp_rate,
            variant_fp_rate,
            p_value: 1.0,
        };
    }

    let sig = significance(experiment, Metric::FalsePositives);
    let confidence = ((1.0 - sig.p_value) * 100.0).min(MAX_WINNER_CONFIDENCE);
    let control_block_rate = control.rate(Metric::Blocked);
    let variant_block_rate = variant.rate(Metric::Blocked);
    let keeps_blocking = variant_block_rate >= BLOCK_RATE_GUARD * control_block_rate;

    let (verdict, reason) = if variant_fp_rate < control_fp_rate && sig.significant && keeps_blocking {
        (
            Verdict::Variant,
            format!(
                "Variant reduces false positives from {:.1}% to {:.1}% (p={:.4}) while blocking {:.1}% vs {:.1}%",
                control_fp_rate, variant_fp_rate, sig.p_value, variant_block_rate, control_block_rate
            ),
        )
    } else if variant_fp_rate > control_fp_rate && sig.significant {
        (
            Verdict::Control,
            format!(
                "Variant increases false positives from {:.1}% to {:.1}% (p={:.4})",
                control_fp_rate, variant_fp_rate, sig.p_value
            ),
        )
    } else if variant_fp_rate < control_fp_rate && sig.significant {
        (
            Verdict::Inconclusive,
            format!(
                "Variant lowers false positives but blocks only {:.1}% vs control {:.1}%",
                variant_block_rate, control_block_rate
            ),
        )
    } else {
        (
            Verdict::Inconclusive,
            format!(
                "No significant difference in false positives ({:.1}% vs {:.1}%, p={:.4})",
                control_fp_rate, variant_fp_rate, sig.p_value
            ),
        )
    };

    WinnerRecommendation {
        winner: verdict.winner(),
        verdict,
        confidence,
        reason,
        control_fp_rate,
        variant_fp_rate,
        p_value: sig.p_value,
    }
}
