//! Samples resolved from configuration: scales, systematics, groups and eras.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use pit_core::{Error, Result};
use pit_hist::{DataSource, HistKey, JsonFileSource, Transform};

use crate::config::{FileConfig, GlobalConfig, GroupConfig, PlotConfig, PlotItConfig, SampleType};
use crate::contribution::Contribution;
use crate::entry::StackEntry;
use crate::group::Group;
use crate::style::PlotStyle;
use crate::systematics::{BindOptions, SystVar};

/// Normalization of a sample's histograms.
///
/// Data is never scaled. Simulation is scaled to the luminosity of its era
/// (or the total), then by the global and per-file scales unless
/// `ignore-scales` is set.
pub fn resolve_scale(cfg: &FileConfig, global: &GlobalConfig) -> Result<f64> {
    if cfg.sample_type == SampleType::Data {
        return Ok(1.0);
    }
    let lumi = global.luminosity.for_era(cfg.era.as_deref())?;
    let xs = cfg
        .cross_section
        .ok_or_else(|| Error::Config("simulated sample without cross-section".into()))?;
    let generated = cfg
        .generated_events
        .filter(|n| *n != 0.0)
        .ok_or_else(|| Error::Config("simulated sample without generated-events".into()))?;
    let mc_scale = lumi * xs * cfg.branching_ratio / generated;
    if global.ignore_scales {
        Ok(mc_scale)
    } else {
        Ok(mc_scale * global.scale * cfg.scale)
    }
}

/// One input file and the systematics that apply to it.
#[derive(Clone)]
pub struct Sample {
    name: String,
    cfg: FileConfig,
    source: Rc<dyn DataSource>,
    style: Rc<PlotStyle>,
    scale: f64,
    systematics: Vec<Rc<SystVar>>,
}

impl Sample {
    pub fn new(
        name: impl Into<String>,
        cfg: FileConfig,
        source: Rc<dyn DataSource>,
        global: &GlobalConfig,
        systematics: &[Rc<SystVar>],
    ) -> Result<Self> {
        let name = name.into();
        let scale = resolve_scale(&cfg, global)
            .map_err(|e| Error::Config(format!("sample '{}': {}", name, e)))?;
        let systematics: Vec<_> = if cfg.sample_type == SampleType::Data {
            Vec::new()
        } else {
            systematics.iter().filter(|s| s.applies_to(&name, &cfg)).cloned().collect()
        };
        log::debug!(
            "scale for sample '{}': {}; systematics: {:?}",
            name,
            scale,
            systematics.iter().map(|s| s.name()).collect::<Vec<_>>()
        );
        let style = Rc::new(cfg.style.clone().with_type_defaults(cfg.sample_type));
        Ok(Self { name, cfg, source, style, scale, systematics })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cfg(&self) -> &FileConfig {
        &self.cfg
    }

    pub fn source(&self) -> &Rc<dyn DataSource> {
        &self.source
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn systematics(&self) -> &[Rc<SystVar>] {
        &self.systematics
    }

    pub fn sample_type(&self) -> SampleType {
        self.cfg.sample_type
    }

    pub fn era(&self) -> Option<&str> {
        self.cfg.era.as_deref()
    }

    /// Transform applied to this sample's histogram of `plot`.
    pub fn transform(&self, plot: &PlotConfig) -> Transform {
        Transform {
            scale: self.scale,
            rebin: plot.rebin,
            x_range: plot.x_axis_range.map(|[lo, hi]| (lo, hi)),
        }
    }

    /// The contribution of this sample to `plot`, with systematics bound.
    pub fn contribution(&self, plot: &PlotConfig, opts: BindOptions) -> Result<Contribution> {
        let key = HistKey::new(Rc::clone(&self.source), plot.name.clone(), self.transform(plot));
        Contribution::new(self.name.clone(), self.cfg.sample_type, Rc::new(key))
            .with_style(Rc::clone(&self.style))
            .with_systematics(&self.systematics, opts)
    }
}

impl fmt::Debug for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sample")
            .field("name", &self.name)
            .field("source", &self.source.id())
            .field("scale", &self.scale)
            .field("systematics", &self.systematics.iter().map(|s| s.name()).collect::<Vec<_>>())
            .finish()
    }
}

/// Samples drawn together under one legend entry.
#[derive(Debug, Clone)]
pub struct SampleGroup {
    name: String,
    cfg: GroupConfig,
    files: Vec<Sample>,
}

impl SampleGroup {
    pub fn new(name: impl Into<String>, cfg: GroupConfig, files: Vec<Sample>) -> Self {
        Self { name: name.into(), cfg, files }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn files(&self) -> &[Sample] {
        &self.files
    }

    /// Type of the first member.
    pub fn sample_type(&self) -> SampleType {
        self.files.first().map(Sample::sample_type).unwrap_or_default()
    }

    pub fn group(&self, plot: &PlotConfig, opts: BindOptions) -> Result<Group> {
        let style = Rc::new(self.cfg.style.clone().with_type_defaults(self.sample_type()));
        let mut group = Group::new(self.name.clone(), self.sample_type(), style);
        for file in &self.files {
            group.add(file.contribution(plot, opts)?)?;
        }
        Ok(group)
    }
}

/// A top-level sample: a single file or a group of files.
#[derive(Debug, Clone)]
pub enum SampleEntry {
    File(Sample),
    Group(SampleGroup),
}

impl SampleEntry {
    pub fn name(&self) -> &str {
        match self {
            SampleEntry::File(s) => s.name(),
            SampleEntry::Group(g) => g.name(),
        }
    }

    pub fn sample_type(&self) -> SampleType {
        match self {
            SampleEntry::File(s) => s.sample_type(),
            SampleEntry::Group(g) => g.sample_type(),
        }
    }

    /// Sort key; higher orders come first, a missing order is 0.
    pub fn order(&self) -> i64 {
        let order = match self {
            SampleEntry::File(s) => s.cfg.order,
            SampleEntry::Group(g) => g.cfg.order,
        };
        order.unwrap_or(0)
    }

    pub fn stack_entry(&self, plot: &PlotConfig, opts: BindOptions) -> Result<StackEntry> {
        Ok(match self {
            SampleEntry::File(s) => s.contribution(plot, opts)?.into(),
            SampleEntry::Group(g) => g.group(plot, opts)?.into(),
        })
    }
}

fn in_eras(era: Option<&str>, eras: Option<&[String]>) -> bool {
    match (era, eras) {
        (Some(era), Some(eras)) => eras.iter().any(|e| e == era),
        _ => true,
    }
}

/// Collect files into their configured groups and sort by order, descending.
///
/// Files outside the selected eras are dropped. Files naming an unknown
/// group are kept ungrouped.
pub fn samples_from_files_and_groups(
    files: Vec<Sample>,
    groups: &BTreeMap<String, GroupConfig>,
    eras: Option<&[String]>,
) -> Vec<SampleEntry> {
    let mut by_group: BTreeMap<String, Vec<Sample>> = BTreeMap::new();
    let mut out = Vec::new();
    for file in files.into_iter().filter(|f| in_eras(f.era(), eras)) {
        match file.cfg.group.clone() {
            Some(group) if groups.contains_key(&group) => {
                by_group.entry(group).or_default().push(file);
            }
            Some(group) => {
                log::warn!("group '{}' of sample '{}' not found, adding ungrouped", group, file.name);
                out.push(SampleEntry::File(file));
            }
            None => out.push(SampleEntry::File(file)),
        }
    }
    for (name, cfg) in groups {
        if let Some(files) = by_group.remove(name) {
            out.push(SampleEntry::Group(SampleGroup::new(name.clone(), cfg.clone(), files)));
        }
    }
    out.sort_by_key(|s| Reverse(s.order()));
    out
}

/// Restrict samples (and group members) to the given eras.
///
/// Groups left without members are dropped.
pub fn samples_for_eras(samples: &[SampleEntry], eras: Option<&[String]>) -> Vec<SampleEntry> {
    samples
        .iter()
        .filter_map(|s| match s {
            SampleEntry::File(f) => in_eras(f.era(), eras).then(|| s.clone()),
            SampleEntry::Group(g) => {
                let files: Vec<_> =
                    g.files.iter().filter(|f| in_eras(f.era(), eras)).cloned().collect();
                (!files.is_empty())
                    .then(|| SampleEntry::Group(SampleGroup::new(g.name.clone(), g.cfg.clone(), files)))
            }
        })
        .collect()
}

/// Absolute paths are kept; relative ones are joined onto `cfg_root`, and
/// onto `base_dir` as well when `cfg_root` is relative.
pub fn resolve_histo_path(path: &str, cfg_root: &str, base_dir: &Path) -> PathBuf {
    let path = Path::new(path);
    let root = Path::new(cfg_root);
    if path.is_absolute() {
        path.to_path_buf()
    } else if root.is_absolute() {
        root.join(path)
    } else {
        base_dir.join(root).join(path)
    }
}

/// Build every sample of `config`, reading histograms from JSON files under `histodir`.
///
/// `eras` overrides the configured era selection.
pub fn load_samples(
    config: &PlotItConfig,
    histodir: &Path,
    eras: Option<&[String]>,
) -> Result<Vec<SampleEntry>> {
    let global = &config.configuration;
    let systematics = config.build_systematics()?;
    let mut files = Vec::with_capacity(config.files.len());
    for (name, cfg) in &config.files {
        let path = resolve_histo_path(name, &global.root, histodir);
        let source: Rc<dyn DataSource> = Rc::new(JsonFileSource::new(path));
        files.push(Sample::new(name.clone(), cfg.clone(), source, global, &systematics)?);
    }
    let eras = eras.or(global.eras.as_deref());
    Ok(samples_from_files_and_groups(files, &config.groups, eras))
}
