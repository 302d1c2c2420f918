//! Pure derived-distribution transforms: scaling, rebinning, flow folding.
//!
//! Every transform returns a new [`Distribution`]; the input is never mutated.

use pit_core::{Error, Result};

use crate::histogram::Distribution;

/// Transformations applied when a histogram is materialized.
///
/// Order of application: overflow folding into `x_range`, then scaling,
/// then rebinning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Multiplicative normalization (variance scales with its square).
    pub scale: f64,
    /// Number of consecutive bins to merge.
    pub rebin: usize,
    /// Visible x range; cells outside are folded into the edge bins.
    pub x_range: Option<(f64, f64)>,
}

impl Default for Transform {
    fn default() -> Self {
        Self { scale: 1.0, rebin: 1, x_range: None }
    }
}

impl Transform {
    /// Whether applying this transform leaves a distribution unchanged.
    pub fn is_identity(&self) -> bool {
        self.scale == 1.0 && self.rebin == 1 && self.x_range.is_none()
    }

    /// Apply the transform.
    pub fn apply(&self, dist: Distribution) -> Result<Distribution> {
        if self.is_identity() {
            return Ok(dist);
        }
        let mut out = dist;
        if let Some((lo, hi)) = self.x_range {
            out = out.restricted(lo, hi)?;
        }
        if self.scale != 1.0 {
            out = out.scaled(self.scale);
        }
        if self.rebin != 1 {
            out = out.rebinned(self.rebin)?;
        }
        Ok(out)
    }
}

impl Distribution {
    /// Multiply contents by `factor` and variances by `factor²`.
    pub fn scaled(&self, factor: f64) -> Distribution {
        let f2 = factor * factor;
        Distribution::from_parts_unchecked(
            self.name().to_string(),
            self.bin_edges().to_vec(),
            self.contents().iter().map(|c| c * factor).collect(),
            self.variance().iter().map(|v| v * f2).collect(),
        )
    }

    /// Merge groups of `k` consecutive visible bins.
    ///
    /// Contents and variances are summed (bins are independent). When `k`
    /// does not divide the number of bins, the trailing partial group is
    /// added to the overflow cell.
    pub fn rebinned(&self, k: usize) -> Result<Distribution> {
        if k == 0 {
            return Err(Error::Validation(format!("rebin factor for '{}' must be >= 1", self.name())));
        }
        let n = self.n_bins();
        if k == 1 {
            return Ok(self.clone());
        }
        if k > n {
            return Err(Error::Validation(format!(
                "rebin factor {} exceeds the {} bins of '{}'",
                k,
                n,
                self.name()
            )));
        }
        let new_n = n / k;
        if n % k != 0 {
            log::warn!(
                "rebinning '{}' ({} bins) by {}: last {} bins added to the overflow",
                self.name(),
                n,
                k,
                n % k
            );
        }

        let (c, v) = (self.contents(), self.variance());
        let mut contents = Vec::with_capacity(new_n + 2);
        let mut variance = Vec::with_capacity(new_n + 2);
        contents.push(c[0]);
        variance.push(v[0]);
        for g in 0..new_n {
            let cells = 1 + g * k..1 + (g + 1) * k;
            contents.push(c[cells.clone()].iter().sum());
            variance.push(v[cells].iter().sum());
        }
        let tail = 1 + new_n * k..=n + 1;
        contents.push(c[tail.clone()].iter().sum());
        variance.push(v[tail].iter().sum());

        let edges = self.bin_edges();
        let bin_edges = (0..=new_n).map(|g| edges[g * k]).collect();
        Ok(Distribution::from_parts_unchecked(self.name().to_string(), bin_edges, contents, variance))
    }

    /// Cell index containing `x`: `0` below the axis, `n_bins + 1` at or above
    /// the upper edge.
    pub fn find_bin(&self, x: f64) -> usize {
        let edges = self.bin_edges();
        if x < edges[0] {
            return 0;
        }
        if x >= edges[edges.len() - 1] {
            return self.n_bins() + 1;
        }
        // first edge strictly greater than x
        edges.partition_point(|&e| e <= x)
    }

    /// Visible bins `[first, last]` covered by the user range `[lo, hi]`.
    ///
    /// An upper limit falling exactly on a bin's lower edge excludes that bin.
    pub fn bin_range(&self, lo: f64, hi: f64) -> Result<(usize, usize)> {
        if !(lo < hi) {
            return Err(Error::Validation(format!(
                "invalid x range [{}, {}] for '{}'",
                lo,
                hi,
                self.name()
            )));
        }
        let n = self.n_bins();
        let edges = self.bin_edges();
        let first = self.find_bin(lo).clamp(1, n);
        let mut last = self.find_bin(hi);
        if (1..=n + 1).contains(&last) && edges[last - 1] >= hi {
            last -= 1;
        }
        let last = last.clamp(1, n);
        if first > last {
            return Err(Error::Validation(format!(
                "x range [{}, {}] selects no bins of '{}'",
                lo,
                hi,
                self.name()
            )));
        }
        Ok((first, last))
    }

    /// Fold every cell below `first` into `first` and every cell above
    /// `last` into `last`; folded cells are zeroed. Variances are summed.
    pub fn folded(&self, first: usize, last: usize) -> Result<Distribution> {
        let n = self.n_bins();
        if first < 1 || last > n || first > last {
            return Err(Error::Validation(format!(
                "invalid fold range [{}, {}] for '{}' with {} bins",
                first,
                last,
                self.name(),
                n
            )));
        }
        let mut contents = self.contents().to_vec();
        let mut variance = self.variance().to_vec();
        fold_into(&mut contents, first, 0..first);
        fold_into(&mut variance, first, 0..first);
        fold_into(&mut contents, last, last + 1..n + 2);
        fold_into(&mut variance, last, last + 1..n + 2);
        Ok(Distribution::from_parts_unchecked(
            self.name().to_string(),
            self.bin_edges().to_vec(),
            contents,
            variance,
        ))
    }

    /// Restrict to the visible x range `[lo, hi]`, folding everything outside
    /// (including the flow cells) into the edge bins.
    pub fn restricted(&self, lo: f64, hi: f64) -> Result<Distribution> {
        let (first, last) = self.bin_range(lo, hi)?;
        self.folded(first, last)
    }
}

fn fold_into(values: &mut [f64], edge: usize, outside: std::ops::Range<usize>) {
    let mut acc = 0.0;
    for i in outside {
        acc += values[i];
        values[i] = 0.0;
    }
    values[edge] += acc;
}
