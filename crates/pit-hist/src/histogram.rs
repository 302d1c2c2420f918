//! One-dimensional binned distribution with sentinel flow bins.

use pit_core::{Error, Result};

/// Relative tolerance used when comparing bin edges of two distributions.
const EDGE_RTOL: f64 = 1e-9;

/// A 1D binned distribution.
///
/// `contents` and `variance` cover the full cell range: index `0` is the
/// underflow, `1..=n_bins` are the visible bins and `n_bins + 1` is the
/// overflow. The variance is the sum of squared weights per cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    name: String,
    bin_edges: Vec<f64>,
    contents: Vec<f64>,
    variance: Vec<f64>,
}

impl Distribution {
    /// Build a distribution from full (flow-inclusive) arrays.
    ///
    /// Requires `contents.len() == variance.len() == bin_edges.len() + 1`,
    /// at least one visible bin and strictly increasing edges.
    pub fn new(
        name: impl Into<String>,
        bin_edges: Vec<f64>,
        contents: Vec<f64>,
        variance: Vec<f64>,
    ) -> Result<Self> {
        let name = name.into();
        if contents.len() < 3 {
            return Err(Error::Validation(format!(
                "distribution '{}' needs at least one visible bin (got {} cells)",
                name,
                contents.len()
            )));
        }
        if variance.len() != contents.len() {
            return Err(Error::shape_mismatch(
                format!("variance of '{}'", name),
                contents.len(),
                variance.len(),
            ));
        }
        if bin_edges.len() + 1 != contents.len() {
            return Err(Error::shape_mismatch(
                format!("bin edges of '{}'", name),
                contents.len() - 1,
                bin_edges.len(),
            ));
        }
        if bin_edges.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(Error::Validation(format!(
                "bin edges of '{}' must be strictly increasing",
                name
            )));
        }
        Ok(Self { name, bin_edges, contents, variance })
    }

    /// Build a distribution from visible-bin counts with empty flow bins.
    ///
    /// The variance of each bin equals its count (unweighted entries).
    pub fn from_counts(name: impl Into<String>, bin_edges: Vec<f64>, counts: &[f64]) -> Result<Self> {
        let mut contents = Vec::with_capacity(counts.len() + 2);
        contents.push(0.0);
        contents.extend_from_slice(counts);
        contents.push(0.0);
        let variance = contents.iter().map(|c| c.abs()).collect();
        Self::new(name, bin_edges, contents, variance)
    }

    /// Like [`Distribution::from_counts`] with `n` equal-width bins on `[lo, hi)`.
    pub fn uniform(name: impl Into<String>, lo: f64, hi: f64, counts: &[f64]) -> Result<Self> {
        Self::from_counts(name, uniform_edges(counts.len(), lo, hi), counts)
    }

    /// An all-zero distribution with the binning of `self`.
    pub fn zeros_like(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bin_edges: self.bin_edges.clone(),
            contents: vec![0.0; self.contents.len()],
            variance: vec![0.0; self.variance.len()],
        }
    }

    /// Histogram name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename (consuming).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of visible bins.
    pub fn n_bins(&self) -> usize {
        self.contents.len() - 2
    }

    /// Number of cells including both flow bins.
    pub fn n_cells(&self) -> usize {
        self.contents.len()
    }

    /// Bin edges (length `n_bins + 1`).
    pub fn bin_edges(&self) -> &[f64] {
        &self.bin_edges
    }

    /// Contents over the full cell range.
    pub fn contents(&self) -> &[f64] {
        &self.contents
    }

    /// Variances over the full cell range.
    pub fn variance(&self) -> &[f64] {
        &self.variance
    }

    /// Contents of the visible bins only.
    pub fn visible_contents(&self) -> &[f64] {
        &self.contents[1..=self.n_bins()]
    }

    /// Variances of the visible bins only.
    pub fn visible_variance(&self) -> &[f64] {
        &self.variance[1..=self.n_bins()]
    }

    /// Content of cell `i` (0 = underflow).
    pub fn bin_content(&self, i: usize) -> f64 {
        self.contents[i]
    }

    /// `sqrt(variance)` of cell `i`.
    pub fn bin_error(&self, i: usize) -> f64 {
        self.variance[i].max(0.0).sqrt()
    }

    /// Centers of the visible bins.
    pub fn bin_centers(&self) -> Vec<f64> {
        self.bin_edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }

    /// Sum of the visible bin contents.
    pub fn integral(&self) -> f64 {
        self.visible_contents().iter().sum()
    }

    pub(crate) fn from_parts_unchecked(
        name: String,
        bin_edges: Vec<f64>,
        contents: Vec<f64>,
        variance: Vec<f64>,
    ) -> Self {
        debug_assert_eq!(contents.len(), variance.len());
        debug_assert_eq!(bin_edges.len() + 1, contents.len());
        Self { name, bin_edges, contents, variance }
    }

    /// Check that `other` has the same binning as `self`.
    pub fn check_compatible(&self, other: &Distribution, context: &str) -> Result<()> {
        if other.contents.len() != self.contents.len() {
            return Err(Error::shape_mismatch(
                format!("{} ('{}' + '{}')", context, self.name, other.name),
                self.n_bins(),
                other.n_bins(),
            ));
        }
        let same_edges = self.bin_edges.iter().zip(&other.bin_edges).all(|(a, b)| {
            let scale = a.abs().max(b.abs()).max(1.0);
            (a - b).abs() <= EDGE_RTOL * scale
        });
        if !same_edges {
            return Err(Error::shape_mismatch(
                format!("{} ('{}' + '{}', bin edges differ)", context, self.name, other.name),
                self.n_bins(),
                other.n_bins(),
            ));
        }
        Ok(())
    }

    /// Add `other` cell by cell (contents and variances).
    pub fn add(&mut self, other: &Distribution) -> Result<()> {
        self.check_compatible(other, "histogram sum")?;
        for (a, b) in self.contents.iter_mut().zip(&other.contents) {
            *a += b;
        }
        for (a, b) in self.variance.iter_mut().zip(&other.variance) {
            *a += b;
        }
        Ok(())
    }

    /// Sum a non-empty sequence of distributions into a new one named `name`.
    ///
    /// Returns `Ok(None)` for an empty sequence.
    pub fn sum<'a, I>(name: impl Into<String>, items: I) -> Result<Option<Distribution>>
    where
        I: IntoIterator<Item = &'a Distribution>,
    {
        let mut it = items.into_iter();
        let Some(first) = it.next() else {
            return Ok(None);
        };
        let mut total = first.clone().with_name(name);
        for d in it {
            total.add(d)?;
        }
        Ok(Some(total))
    }
}

/// `n` equal-width bin edges on `[lo, hi]`.
pub fn uniform_edges(n: usize, lo: f64, hi: f64) -> Vec<f64> {
    let width = (hi - lo) / n.max(1) as f64;
    (0..=n).map(|i| if i == n { hi } else { lo + width * i as f64 }).collect()
}
