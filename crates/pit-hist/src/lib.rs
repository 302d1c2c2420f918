//! # pit-hist
//!
//! Binned distributions for plotit.
//!
//! A [`Distribution`] carries per-cell contents and variances, including the
//! underflow (index `0`) and overflow (index `n_bins + 1`) cells. Derived
//! distributions (scaled, rebinned, restricted to a visible range) are built
//! by pure transforms. Distributions are read from a [`DataSource`] through a
//! lazily loading [`HistKey`].
//!
//! ## Example
//!
//! ```
//! use std::rc::Rc;
//! use pit_hist::{Distribution, HistKey, MemorySource, Transform};
//!
//! let src = MemorySource::new("tt.json")
//!     .with(Distribution::uniform("mjj", 0.0, 3.0, &[10.0, 20.0, 10.0]).unwrap());
//! let key = HistKey::new(Rc::new(src), "mjj", Transform { scale: 0.5, ..Default::default() });
//! assert_eq!(key.load().unwrap().visible_contents(), &[5.0, 10.0, 5.0]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod histogram;
pub mod key;
pub mod source;
pub mod transform;

pub use histogram::{Distribution, uniform_edges};
pub use key::HistKey;
pub use source::{
    DataSource, DistributionRecord, HistogramFile, JsonFileSource, MemorySource, sibling_id,
};
pub use transform::Transform;
