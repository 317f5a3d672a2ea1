//! Lognormal demand fitting
//!
//! Closed-form maximum-likelihood fit of a two-parameter lognormal to the
//! positive raw-demand values of closed sections. Parameters are recorded in
//! the shape/loc/scale convention: shape = σ of the underlying normal,
//! scale = e^μ, loc fixed at 0.
//!
//! For x > 0 the density is
//!   pdf(x) = 1 / (x σ √(2π)) · exp(-(ln x − μ)² / (2σ²))
//! and the MLE is μ = mean(ln x), σ² = mean((ln x − μ)²).

use std::f64::consts::PI;

/// Result of a lognormal fit over positive demand values
#[derive(Debug, Clone, PartialEq)]
pub struct LognormalFit {
    pub shape: f64,
    pub loc: f64,
    pub scale: f64,
    /// Mean log-likelihood of the fitted density over the input values;
    /// `None` for a degenerate fit (σ = 0), which downstream consumers must
    /// treat as untrustworthy.
    pub mean_log_likelihood: Option<f64>,
}

/// Fit a lognormal to strictly positive values; `None` when the input is
/// empty. Values must all be > 0 (the caller filters zeros out).
pub fn fit_lognormal(values: &[f64]) -> Option<LognormalFit> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let logs: Vec<f64> = values.iter().map(|v| v.ln()).collect();
    let mu = logs.iter().sum::<f64>() / n;
    let variance = logs.iter().map(|l| (l - mu).powi(2)).sum::<f64>() / n;
    let sigma = variance.sqrt();

    let mean_log_likelihood = if sigma > 0.0 {
        let total: f64 = values
            .iter()
            .zip(&logs)
            .map(|(v, l)| {
                -v.ln() - sigma.ln() - 0.5 * (2.0 * PI).ln() - (l - mu).powi(2) / (2.0 * variance)
            })
            .sum();
        Some(total / n)
    } else {
        None
    };

    Some(LognormalFit {
        shape: sigma,
        loc: 0.0,
        scale: mu.exp(),
        mean_log_likelihood,
    })
}
