//! Uncertainty bands handed to renderers.

use pit_core::{Error, Result};
use pit_hist::Distribution;
use serde::Serialize;

/// Central values with symmetric errors over the visible bins.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UncertaintyBand {
    pub bin_edges: Vec<f64>,
    pub values: Vec<f64>,
    pub errors: Vec<f64>,
}

impl UncertaintyBand {
    /// `total` with `syst` as the error.
    pub fn systematic(total: &Distribution, syst: &[f64]) -> Result<Self> {
        check_len(total, syst)?;
        Ok(Self {
            bin_edges: total.bin_edges().to_vec(),
            values: total.visible_contents().to_vec(),
            errors: syst.to_vec(),
        })
    }

    /// `total` with `sqrt(variance + syst^2)` as the error.
    pub fn stat_syst(total: &Distribution, syst: &[f64]) -> Result<Self> {
        check_len(total, syst)?;
        let errors = total
            .visible_variance()
            .iter()
            .zip(syst)
            .map(|(v, s)| (v + s * s).sqrt())
            .collect();
        Ok(Self {
            bin_edges: total.bin_edges().to_vec(),
            values: total.visible_contents().to_vec(),
            errors,
        })
    }

    /// Divide errors by values and set values to 1.
    ///
    /// Bins with zero content get value 1 and error 1.
    pub fn relative(&self) -> Self {
        let errors = self
            .values
            .iter()
            .zip(&self.errors)
            .map(|(v, e)| if *v == 0.0 { 1.0 } else { e / v })
            .collect();
        Self { bin_edges: self.bin_edges.clone(), values: vec![1.0; self.values.len()], errors }
    }

    pub fn n_bins(&self) -> usize {
        self.values.len()
    }

    pub fn lower(&self) -> Vec<f64> {
        self.values.iter().zip(&self.errors).map(|(v, e)| v - e).collect()
    }

    pub fn upper(&self) -> Vec<f64> {
        self.values.iter().zip(&self.errors).map(|(v, e)| v + e).collect()
    }
}

fn check_len(total: &Distribution, syst: &[f64]) -> Result<()> {
    if syst.len() != total.n_bins() {
        return Err(Error::shape_mismatch(
            format!("uncertainty band of '{}'", total.name()),
            total.n_bins(),
            syst.len(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn stat_syst_adds_in_quadrature() {
        let total = Distribution::uniform("t", 0.0, 2.0, &[9.0, 16.0]).unwrap();
        let band = UncertaintyBand::stat_syst(&total, &[4.0, 3.0]).unwrap();
        assert_relative_eq!(band.errors[0], 5.0);
        assert_relative_eq!(band.errors[1], 5.0);
        assert_eq!(band.lower(), vec![4.0, 11.0]);
        assert_eq!(band.upper(), vec![14.0, 21.0]);
    }

    #[test]
    fn relative_band_zero_policy() {
        let total = Distribution::uniform("t", 0.0, 3.0, &[0.0, 10.0, 0.0]).unwrap();
        let rel = UncertaintyBand::systematic(&total, &[7.0, 2.0, 0.0]).unwrap().relative();
        assert_eq!(rel.values, vec![1.0; 3]);
        assert_eq!(rel.errors, vec![1.0, 0.2, 1.0]);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let total = Distribution::uniform("t", 0.0, 2.0, &[1.0, 1.0]).unwrap();
        assert!(matches!(
            UncertaintyBand::systematic(&total, &[0.0; 4]),
            Err(Error::IncompatibleShapes { expected: 2, found: 4, .. })
        ));
    }
}
