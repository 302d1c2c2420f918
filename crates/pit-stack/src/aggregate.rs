//! Batch driver: build the stacks of every plot, then load, draw and release
//! them chunk by chunk so memory stays proportional to the chunk size.
//!
//! Releasing covers both the materialized distributions and whatever their
//! sources keep open. Binding the systematics at build time opens the
//! sources too, so [`PlotStacks::build`] releases them before returning.

use std::collections::BTreeMap;
use std::rc::Rc;

use pit_core::{Error, Result};
use pit_hist::DataSource;

use crate::config::{PlotConfig, SampleType};
use crate::contribution::Contribution;
use crate::entry::{StackComponent, StackEntry};
use crate::ratio::{RatioPoints, ratio};
use crate::samples::SampleEntry;
use crate::stack::Stack;
use crate::systematics::BindOptions;

/// Default number of plots loaded at once.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Everything a renderer needs for one plot.
#[derive(Debug)]
pub struct PlotStacks {
    pub plot: PlotConfig,
    /// Data samples.
    pub observed: Stack,
    /// Stacked simulation.
    pub expected: Stack,
    /// Unstacked overlays.
    pub signals: Vec<StackEntry>,
}

impl PlotStacks {
    /// Partition `samples` by type into the stacks of `plot`.
    ///
    /// Sources opened while looking up shape alternates are released again.
    pub fn build(plot: &PlotConfig, samples: &[SampleEntry], opts: BindOptions) -> Result<Self> {
        let mut observed = Stack::new();
        let mut expected = Stack::new();
        let mut signals = Vec::new();
        for sample in samples {
            let entry = sample.stack_entry(plot, opts)?;
            match sample.sample_type() {
                SampleType::Data => observed.add(entry)?,
                SampleType::Mc => expected.add(entry)?,
                SampleType::Signal => signals.push(entry),
            }
        }
        let stacks = Self { plot: plot.clone(), observed, expected, signals };
        release_sources(stacks.leaves());
        Ok(stacks)
    }

    /// Every leaf of the observed, expected and signal entries.
    pub fn leaves(&self) -> impl Iterator<Item = &Contribution> {
        self.observed
            .contributions()
            .chain(self.expected.contributions())
            .chain(self.signals.iter().flat_map(|s| s.contributions()))
    }

    /// Systematics selected by the plot, `None` for all.
    pub fn systematic_names(&self) -> Option<&[String]> {
        self.plot.systematics.as_deref()
    }

    /// Observed over expected totals.
    pub fn ratio(&self) -> Result<RatioPoints> {
        ratio(&*self.observed.total()?, &*self.expected.total()?)
    }

    /// Release leaf caches, their sources and every derived sum.
    pub fn release(&self) -> ClearStats {
        let stats = clear_histograms(self.leaves());
        self.observed.invalidate();
        self.expected.invalidate();
        for s in &self.signals {
            s.invalidate();
        }
        stats
    }
}

/// Receives the stacks of each plot.
pub trait Renderer {
    fn draw(&mut self, plot: &PlotStacks) -> Result<()>;
}

impl<F> Renderer for F
where
    F: FnMut(&PlotStacks) -> Result<()>,
{
    fn draw(&mut self, plot: &PlotStacks) -> Result<()> {
        self(plot)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub loaded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearStats {
    pub cleared: usize,
    pub empty: usize,
    /// Sources that were holding data.
    pub sources: usize,
}

/// Outcome of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub loaded: usize,
    pub failed: usize,
    pub cleared: usize,
    pub drawn: usize,
    /// `(plot name, error message)` of every failed render.
    pub render_failures: Vec<(String, String)>,
}

/// Materialize the nominal and shape alternates of every leaf.
///
/// Failures are counted, never propagated. Alternates that fell back to the
/// nominal are counted once.
pub fn load_histograms<'a, I>(leaves: I) -> LoadStats
where
    I: IntoIterator<Item = &'a Contribution>,
{
    let mut per_source: BTreeMap<String, LoadStats> = BTreeMap::new();
    for leaf in leaves {
        let stats = per_source.entry(leaf.key().source().id().to_string()).or_default();
        for key in leaf.keys() {
            match key.load() {
                Ok(_) => stats.loaded += 1,
                Err(e) => {
                    log::debug!("{}", e);
                    stats.failed += 1;
                }
            }
        }
    }
    let mut total = LoadStats::default();
    for (source, stats) in &per_source {
        log::debug!("loaded {} histograms from {} ({} failed)", stats.loaded, source, stats.failed);
        total.loaded += stats.loaded;
        total.failed += stats.failed;
    }
    log::debug!(
        "loaded {} histograms from {} sources ({} failed)",
        total.loaded,
        per_source.len(),
        total.failed
    );
    total
}

/// Release the cached nominal and shape alternates of every leaf, then the
/// sources they were read from.
pub fn clear_histograms<'a, I>(leaves: I) -> ClearStats
where
    I: IntoIterator<Item = &'a Contribution>,
{
    let mut stats = ClearStats::default();
    let mut sources = SourceSet::default();
    for leaf in leaves {
        for key in leaf.keys() {
            if key.clear() {
                stats.cleared += 1;
            } else {
                stats.empty += 1;
            }
            sources.insert(key.source());
        }
    }
    stats.sources = sources.release();
    log::debug!(
        "cleared {} histograms from memory ({} were not loaded), released {} sources",
        stats.cleared,
        stats.empty,
        stats.sources
    );
    stats
}

/// Release every source the leaves read from. Returns how many held data.
pub fn release_sources<'a, I>(leaves: I) -> usize
where
    I: IntoIterator<Item = &'a Contribution>,
{
    let mut sources = SourceSet::default();
    for leaf in leaves {
        for key in leaf.keys() {
            sources.insert(key.source());
        }
    }
    sources.release()
}

/// Distinct sources by identifier.
#[derive(Default)]
struct SourceSet(BTreeMap<String, Rc<dyn DataSource>>);

impl SourceSet {
    fn insert(&mut self, source: &Rc<dyn DataSource>) {
        self.0.entry(source.id().to_string()).or_insert_with(|| Rc::clone(source));
    }

    fn release(&self) -> usize {
        let released = self.0.values().filter(|s| s.release()).count();
        log::debug!("released {} of {} sources", released, self.0.len());
        released
    }
}

/// Draw every plot, `chunk_size` plots at a time.
///
/// A render failure is logged and recorded; the remaining plots are still drawn.
pub fn make_stack_plots<R>(plots: &[PlotStacks], renderer: &mut R, chunk_size: usize) -> Result<BatchReport>
where
    R: Renderer + ?Sized,
{
    if chunk_size == 0 {
        return Err(Error::Validation("chunk size must be at least 1".into()));
    }
    log::debug!("drawing {} plots, splitting in chunks of {}", plots.len(), chunk_size);
    let mut report = BatchReport::default();
    for chunk in plots.chunks(chunk_size) {
        let loaded = load_histograms(chunk.iter().flat_map(|p| p.leaves()));
        report.loaded += loaded.loaded;
        report.failed += loaded.failed;

        for plot in chunk {
            log::debug!("drawing plot {}", plot.plot.name);
            match renderer.draw(plot) {
                Ok(()) => report.drawn += 1,
                Err(e) => {
                    log::warn!("failed to draw plot '{}': {}", plot.plot.name, e);
                    report.render_failures.push((plot.plot.name.clone(), e.to_string()));
                }
            }
        }

        for plot in chunk {
            report.cleared += plot.release().cleared;
        }
    }
    log::info!(
        "drew {} of {} plots ({} histograms loaded, {} failed)",
        report.drawn,
        plots.len(),
        report.loaded,
        report.failed
    );
    Ok(report)
}

/// Build the stacks of `plots` from `samples` and draw them in chunks.
pub fn make_stack_ratio_plots<R>(
    plots: &[PlotConfig],
    samples: &[SampleEntry],
    opts: BindOptions,
    renderer: &mut R,
    chunk_size: usize,
) -> Result<BatchReport>
where
    R: Renderer + ?Sized,
{
    let stacks = plots
        .iter()
        .map(|p| PlotStacks::build(p, samples, opts))
        .collect::<Result<Vec<_>>>()?;
    make_stack_plots(&stacks, renderer, chunk_size)
}
