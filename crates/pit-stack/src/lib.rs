//! # pit-stack
//!
//! Stack-and-systematics aggregation for data/simulation comparison plots.
//!
//! Samples are resolved from a plotIt-style configuration ([`config`],
//! [`samples`]). For every plot they become [`Contribution`]s (a single
//! sample) or [`Group`]s (several samples under one legend entry), which are
//! stacked into an observed and an expected [`Stack`]. A stack sums its
//! entries and combines the systematics of its leaves: linearly within one
//! systematic, in quadrature across systematics. [`UncertaintyBand`]s and
//! [`RatioPoints`] are what a rendering backend draws.
//!
//! Everything is single-threaded. Distributions are loaded lazily and
//! released explicitly; [`make_stack_plots`] does so per chunk of plots.

#![warn(clippy::all)]

pub mod aggregate;
pub mod band;
pub mod config;
pub mod contribution;
pub mod entry;
pub mod group;
pub mod ratio;
pub mod samples;
pub mod stack;
pub mod style;
pub mod systematics;

pub use aggregate::{
    BatchReport, ClearStats, DEFAULT_CHUNK_SIZE, LoadStats, PlotStacks, Renderer, clear_histograms,
    load_histograms, make_stack_plots, make_stack_ratio_plots, release_sources,
};
pub use band::UncertaintyBand;
pub use config::{
    FileConfig, GlobalConfig, GroupConfig, Luminosity, PlotConfig, PlotItConfig, SampleType,
    SystematicConfig,
};
pub use contribution::Contribution;
pub use entry::{MergedEntry, StackComponent, StackEntry};
pub use group::Group;
pub use ratio::{ErrorModel, RatioPoints, garwood_68_interval, ratio};
pub use samples::{
    Sample, SampleEntry, SampleGroup, load_samples, resolve_histo_path, resolve_scale,
    samples_for_eras, samples_from_files_and_groups,
};
pub use stack::{CombinedSystematics, MergePolicy, Stack, StackState};
pub use style::{Color, PlotStyle};
pub use systematics::{BindOptions, Direction, SampleSelector, SystKind, SystVar, Variation};
