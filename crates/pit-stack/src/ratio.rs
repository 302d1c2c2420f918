//! Observed over expected ratio points.

use pit_core::{Error, Result};
use pit_hist::Distribution;
use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// How the observed errors were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorModel {
    /// Central 68% Poisson interval; every observed count is a non-negative integer.
    GarwoodPoisson68,
    /// `sqrt(variance)`, used for weighted observed contents.
    SqrtVariance,
}

/// Ratio per visible bin with asymmetric errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatioPoints {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub err_lo: Vec<f64>,
    pub err_hi: Vec<f64>,
    pub error_model: ErrorModel,
}

/// `observed / expected` with both uncertainties propagated.
///
/// Bins with zero expected content give `(1, 1, 1)`.
pub fn ratio(observed: &Distribution, expected: &Distribution) -> Result<RatioPoints> {
    observed.check_compatible(expected, "ratio")?;
    let obs = observed.visible_contents();
    let exp = expected.visible_contents();
    let (obs_lo, obs_hi, error_model) = observed_errors(observed)?;

    let n = obs.len();
    let mut y = Vec::with_capacity(n);
    let mut err_lo = Vec::with_capacity(n);
    let mut err_hi = Vec::with_capacity(n);
    for i in 0..n {
        let (o, e) = (obs[i], exp[i]);
        if e == 0.0 {
            y.push(1.0);
            err_lo.push(1.0);
            err_hi.push(1.0);
            continue;
        }
        let e_exp2 = expected.visible_variance()[i];
        let propagate = |e_obs: f64| (e_obs * e_obs * e * e + e_exp2 * o * o).sqrt() / (e * e);
        y.push(o / e);
        err_lo.push(propagate(obs_lo[i]));
        err_hi.push(propagate(obs_hi[i]));
    }
    Ok(RatioPoints { x: observed.bin_centers(), y, err_lo, err_hi, error_model })
}

fn observed_errors(observed: &Distribution) -> Result<(Vec<f64>, Vec<f64>, ErrorModel)> {
    let counts: Option<Vec<u64>> =
        observed.visible_contents().iter().map(|v| near_integer_nonneg(*v)).collect();
    match counts {
        Some(counts) => {
            let mut lo = Vec::with_capacity(counts.len());
            let mut hi = Vec::with_capacity(counts.len());
            for n in counts {
                let (l, h) = garwood_68_interval(n)?;
                lo.push(l);
                hi.push(h);
            }
            Ok((lo, hi, ErrorModel::GarwoodPoisson68))
        }
        None => {
            let e: Vec<f64> = observed.visible_variance().iter().map(|v| v.max(0.0).sqrt()).collect();
            Ok((e.clone(), e, ErrorModel::SqrtVariance))
        }
    }
}

fn near_integer_nonneg(x: f64) -> Option<u64> {
    if !(x.is_finite() && x >= 0.0) {
        return None;
    }
    let r = x.round();
    if (x - r).abs() <= 1e-9 { Some(r as u64) } else { None }
}

/// Distances from `n` to the bounds of its central 68.27% Poisson interval.
pub fn garwood_68_interval(n: u64) -> Result<(f64, f64)> {
    let alpha = 0.31731_f64;
    let chi2 = |dof: f64| {
        ChiSquared::new(dof).map_err(|e| Error::Validation(format!("chi-square({}): {}", dof, e)))
    };
    let lo = if n == 0 {
        0.0
    } else {
        n as f64 - 0.5 * chi2(2.0 * n as f64)?.inverse_cdf(alpha / 2.0)
    };
    let hi = 0.5 * chi2(2.0 * (n + 1) as f64)?.inverse_cdf(1.0 - alpha / 2.0) - n as f64;
    Ok((lo, hi))
}
