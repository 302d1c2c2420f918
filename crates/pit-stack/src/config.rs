//! plotIt-style YAML configuration.
//!
//! Only the sections the aggregation engine consumes are modelled; unknown
//! keys (canvas sizes, label layout, ...) are ignored. Maps are keyed by name
//! and iterate in name order.

use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use pit_core::{Error, Result};
use serde::Deserialize;

use crate::style::PlotStyle;
use crate::systematics::{BindOptions, SampleSelector, SystKind, SystVar};

/// Role of a sample in a plot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Deserialize)]
pub enum SampleType {
    /// Observed data.
    #[serde(rename = "DATA", alias = "data")]
    Data,
    /// Stacked simulation.
    #[default]
    #[serde(rename = "MC", alias = "mc")]
    Mc,
    /// Unstacked overlay.
    #[serde(rename = "SIGNAL", alias = "signal")]
    Signal,
}

/// Integrated luminosity: a single number or one value per era.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Luminosity {
    Total(f64),
    PerEra(BTreeMap<String, f64>),
}

impl Luminosity {
    /// Luminosity for a sample of the given era.
    ///
    /// Era-less samples (or a scalar luminosity) see the total.
    pub fn for_era(&self, era: Option<&str>) -> Result<f64> {
        match (self, era) {
            (Luminosity::Total(l), _) => Ok(*l),
            (Luminosity::PerEra(m), Some(era)) => m
                .get(era)
                .copied()
                .ok_or_else(|| Error::Config(format!("no luminosity given for era '{}'", era))),
            (Luminosity::PerEra(m), None) => Ok(m.values().sum()),
        }
    }
}

fn one() -> f64 {
    1.0
}

fn dot() -> String {
    ".".to_string()
}

/// `configuration` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GlobalConfig {
    pub luminosity: Luminosity,
    #[serde(default)]
    pub luminosity_error: f64,
    #[serde(default = "one")]
    pub scale: f64,
    #[serde(default)]
    pub ignore_scales: bool,
    #[serde(default)]
    pub eras: Option<Vec<String>>,
    #[serde(default = "dot")]
    pub root: String,
    #[serde(default)]
    pub strict_shape_systematics: bool,
}

impl From<&GlobalConfig> for BindOptions {
    fn from(cfg: &GlobalConfig) -> Self {
        Self { strict_shapes: cfg.strict_shape_systematics }
    }
}

impl GlobalConfig {
    pub fn with_luminosity(luminosity: f64) -> Self {
        Self {
            luminosity: Luminosity::Total(luminosity),
            luminosity_error: 0.0,
            scale: 1.0,
            ignore_scales: false,
            eras: None,
            root: dot(),
            strict_shape_systematics: false,
        }
    }
}

/// One entry of the `files` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FileConfig {
    #[serde(rename = "type", default)]
    pub sample_type: SampleType,
    #[serde(default = "one")]
    pub scale: f64,
    #[serde(default)]
    pub cross_section: Option<f64>,
    #[serde(default = "one")]
    pub branching_ratio: f64,
    #[serde(default)]
    pub generated_events: Option<f64>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub era: Option<String>,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub pretty_name: Option<String>,
    #[serde(flatten)]
    pub style: PlotStyle,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            sample_type: SampleType::Mc,
            scale: 1.0,
            cross_section: None,
            branching_ratio: 1.0,
            generated_events: None,
            group: None,
            era: None,
            order: None,
            pretty_name: None,
            style: PlotStyle::default(),
        }
    }
}

impl FileConfig {
    pub fn data() -> Self {
        Self { sample_type: SampleType::Data, ..Default::default() }
    }

    pub fn mc(cross_section: f64, generated_events: f64) -> Self {
        Self {
            cross_section: Some(cross_section),
            generated_events: Some(generated_events),
            ..Default::default()
        }
    }
}

/// One entry of the `groups` section.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GroupConfig {
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(flatten)]
    pub style: PlotStyle,
}

/// One entry of the `plots` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PlotConfig {
    /// Histogram name; filled from the map key.
    #[serde(skip)]
    pub name: String,
    #[serde(default = "rebin_default")]
    pub rebin: usize,
    #[serde(default)]
    pub x_axis_range: Option<[f64; 2]>,
    /// Restricts the systematics considered for the bands; all when absent.
    #[serde(default)]
    pub systematics: Option<Vec<String>>,
}

fn rebin_default() -> usize {
    1
}

impl PlotConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), rebin: 1, x_axis_range: None, systematics: None }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.rebin == 0 {
            return Err(Error::Config(format!("plot '{}': rebin must be at least 1", self.name)));
        }
        if let Some([lo, hi]) = self.x_axis_range
            && !(lo < hi)
        {
            return Err(Error::Config(format!(
                "plot '{}': x-axis-range [{}, {}] is empty",
                self.name, lo, hi
            )));
        }
        Ok(())
    }
}

/// Type of a detailed systematic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystematicType {
    Shape,
    #[serde(alias = "constant")]
    Const,
    #[serde(alias = "ln", alias = "log-normal")]
    Lognormal,
}

/// Detailed form `{name: {type: ..., ...}}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SystematicDetail {
    #[serde(rename = "type")]
    pub kind: SystematicType,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub prior: Option<f64>,
    #[serde(default)]
    pub postfit: Option<f64>,
    #[serde(default)]
    pub postfit_error: Option<f64>,
    #[serde(default)]
    pub postfit_error_up: Option<f64>,
    #[serde(default)]
    pub postfit_error_down: Option<f64>,
    #[serde(default)]
    pub pretty_name: Option<String>,
    /// Regular expression matched at the start of the sample name.
    #[serde(default)]
    pub on: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SystematicValue {
    Constant(f64),
    Detailed(SystematicDetail),
}

/// One item of the `systematics` list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SystematicConfig {
    /// A bare name declares a shape systematic.
    Shape(String),
    Named(BTreeMap<String, SystematicValue>),
}

impl SystematicConfig {
    /// Build the systematic this entry declares.
    pub fn build(&self) -> Result<SystVar> {
        let (name, value) = match self {
            SystematicConfig::Shape(name) => return Ok(SystVar::new(name, SystKind::Shape)),
            SystematicConfig::Named(map) => {
                let mut it = map.iter();
                match (it.next(), it.next()) {
                    (Some(entry), None) => entry,
                    _ => {
                        return Err(Error::Config(format!(
                            "a systematics entry must have exactly one key, found {}",
                            map.len()
                        )));
                    }
                }
            }
        };
        let detail = match value {
            SystematicValue::Constant(value) => {
                return Ok(SystVar::new(name, SystKind::constant(*value)?));
            }
            SystematicValue::Detailed(d) => d,
        };
        let kind = match detail.kind {
            SystematicType::Shape => SystKind::Shape,
            SystematicType::Const => {
                let value = detail.value.ok_or_else(|| {
                    Error::Config(format!("constant systematic '{}' needs a value", name))
                })?;
                SystKind::constant(value)?
            }
            SystematicType::Lognormal => {
                let prior = detail.prior.ok_or_else(|| {
                    Error::Config(format!("log-normal systematic '{}' needs a prior", name))
                })?;
                let err = detail.postfit_error.unwrap_or(1.0);
                SystKind::log_normal(
                    prior,
                    detail.postfit.unwrap_or(0.0),
                    detail.postfit_error_up.unwrap_or(err),
                    detail.postfit_error_down.unwrap_or(err),
                )?
            }
        };
        let mut syst = SystVar::new(name, kind);
        if let Some(pretty) = &detail.pretty_name {
            syst = syst.with_pretty_name(pretty);
        }
        if let Some(pattern) = &detail.on {
            syst = syst.with_selector(SampleSelector::pattern(pattern)?);
        }
        Ok(syst)
    }
}

/// A whole configuration document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PlotItConfig {
    pub configuration: GlobalConfig,
    #[serde(default)]
    pub files: BTreeMap<String, FileConfig>,
    #[serde(default)]
    pub groups: BTreeMap<String, GroupConfig>,
    #[serde(default)]
    pub plots: BTreeMap<String, PlotConfig>,
    #[serde(default)]
    pub systematics: Vec<SystematicConfig>,
}

impl PlotItConfig {
    /// Parse a YAML document.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let mut config: PlotItConfig = serde_yaml_ng::from_str(text)?;
        for (name, plot) in config.plots.iter_mut() {
            plot.name = name.clone();
            plot.validate()?;
        }
        if let Some(eras) = &config.configuration.eras
            && let Luminosity::PerEra(lumis) = &config.configuration.luminosity
            && let Some(missing) = eras.iter().find(|e| !lumis.contains_key(*e))
        {
            return Err(Error::Config(format!("no luminosity given for era '{}'", missing)));
        }
        Ok(config)
    }

    /// Read and parse a YAML file.
    pub fn from_path(path: &Path) -> Result<Self> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }

    /// Plots in name order.
    pub fn plot_list(&self) -> Vec<PlotConfig> {
        self.plots.values().cloned().collect()
    }

    /// Configured systematics, plus the luminosity uncertainty when set.
    pub fn build_systematics(&self) -> Result<Vec<Rc<SystVar>>> {
        let mut out = Vec::with_capacity(self.systematics.len() + 1);
        for entry in &self.systematics {
            out.push(Rc::new(entry.build()?));
        }
        let lumi_err = self.configuration.luminosity_error;
        if lumi_err > 0.0 {
            out.push(Rc::new(
                SystVar::new("lumi", SystKind::constant(1.0 + lumi_err)?)
                    .with_pretty_name("Luminosity"),
            ));
        }
        Ok(out)
    }
}
