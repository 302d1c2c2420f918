//! Systematic variations.
//!
//! A [`SystVar`] is the configured description of one uncertainty source. It
//! is bound to a nominal [`HistKey`] to give a [`Variation`], which yields
//! the per-cell up and down alternatives and the deviation envelope.

use std::fmt;
use std::rc::Rc;

use pit_core::{Error, Result};
use pit_hist::{Distribution, HistKey};
use regex::Regex;

use crate::config::FileConfig;

/// Direction of a variation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the up and down alternatives are obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum SystKind {
    /// `up = nom * value`, `down = nom * (2 - value)`.
    Constant { value: f64 },
    /// Multipliers derived from a log-normal prior and post-fit pull.
    LogNormal { value: f64, value_up: f64, value_down: f64 },
    /// Alternate distributions looked up by name.
    Shape,
}

impl SystKind {
    pub fn constant(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(Error::Config(format!("constant systematic value must be finite, got {}", value)));
        }
        Ok(SystKind::Constant { value })
    }

    /// `value = prior^postfit`, `up = prior^(postfit + err_up)`, `down = prior^(postfit - err_down)`.
    pub fn log_normal(prior: f64, postfit: f64, err_up: f64, err_down: f64) -> Result<Self> {
        if !(prior > 0.0) || !prior.is_finite() {
            return Err(Error::Config(format!("log-normal prior must be positive, got {}", prior)));
        }
        Ok(SystKind::LogNormal {
            value: prior.powf(postfit),
            value_up: prior.powf(postfit + err_up),
            value_down: prior.powf(postfit - err_down),
        })
    }

    /// Multiplier applied to the nominal contents, `None` for shapes.
    pub fn factor(&self, dir: Direction) -> Option<f64> {
        match (self, dir) {
            (SystKind::Constant { value }, Direction::Up) => Some(*value),
            (SystKind::Constant { value }, Direction::Down) => Some(2.0 - value),
            (SystKind::LogNormal { value_up, .. }, Direction::Up) => Some(*value_up),
            (SystKind::LogNormal { value_down, .. }, Direction::Down) => Some(*value_down),
            (SystKind::Shape, _) => None,
        }
    }

    pub fn is_shape(&self) -> bool {
        matches!(self, SystKind::Shape)
    }
}

/// Which samples a systematic applies to.
#[derive(Clone, Default)]
pub enum SampleSelector {
    #[default]
    All,
    /// Regular expression anchored at the start of the sample name.
    Pattern(Regex),
    Custom(Rc<dyn Fn(&str, &FileConfig) -> bool>),
}

impl SampleSelector {
    pub fn pattern(pattern: &str) -> Result<Self> {
        Regex::new(&format!("^(?:{})", pattern))
            .map(SampleSelector::Pattern)
            .map_err(|e| Error::Config(format!("invalid sample pattern '{}': {}", pattern, e)))
    }

    pub fn accepts(&self, sample: &str, cfg: &FileConfig) -> bool {
        match self {
            SampleSelector::All => true,
            SampleSelector::Pattern(re) => re.is_match(sample),
            SampleSelector::Custom(f) => f(sample, cfg),
        }
    }
}

impl fmt::Debug for SampleSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleSelector::All => f.write_str("All"),
            SampleSelector::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            SampleSelector::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A named source of systematic uncertainty.
#[derive(Debug, Clone)]
pub struct SystVar {
    name: String,
    pretty_name: Option<String>,
    kind: SystKind,
    selector: SampleSelector,
}

impl SystVar {
    pub fn new(name: impl Into<String>, kind: SystKind) -> Self {
        Self { name: name.into(), pretty_name: None, kind, selector: SampleSelector::All }
    }

    pub fn with_pretty_name(mut self, pretty: impl Into<String>) -> Self {
        self.pretty_name = Some(pretty.into());
        self
    }

    pub fn with_selector(mut self, selector: SampleSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display name, defaulting to the name.
    pub fn pretty_name(&self) -> &str {
        self.pretty_name.as_deref().unwrap_or(&self.name)
    }

    pub fn kind(&self) -> &SystKind {
        &self.kind
    }

    /// Selection predicate.
    pub fn applies_to(&self, sample: &str, cfg: &FileConfig) -> bool {
        self.selector.accepts(sample, cfg)
    }
}

/// Options for binding systematics to a nominal distribution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BindOptions {
    /// Raise [`Error::ShapeVariationMissing`] instead of falling back to nominal.
    pub strict_shapes: bool,
}

/// A systematic bound to one nominal distribution.
#[derive(Debug, Clone)]
pub struct Variation {
    syst: Rc<SystVar>,
    nominal: Rc<HistKey>,
    /// Up and down keys for shapes. A missing alternate is the nominal key itself.
    shapes: Option<(Rc<HistKey>, Rc<HistKey>)>,
}

impl Variation {
    /// Bind `syst` to `nominal`, resolving shape alternates.
    ///
    /// Shape alternates are searched as `{name}__{syst}{up,down}` in the same
    /// source, then as `{name}` in the sibling source `{stem}__{syst}{up,down}.{ext}`.
    pub fn bind(syst: &Rc<SystVar>, nominal: &Rc<HistKey>, opts: BindOptions) -> Result<Self> {
        let shapes = if syst.kind.is_shape() {
            Some((
                find_alternate(&syst.name, nominal, Direction::Up, opts)?,
                find_alternate(&syst.name, nominal, Direction::Down, opts)?,
            ))
        } else {
            None
        };
        Ok(Self { syst: Rc::clone(syst), nominal: Rc::clone(nominal), shapes })
    }

    pub fn name(&self) -> &str {
        self.syst.name()
    }

    pub fn syst(&self) -> &Rc<SystVar> {
        &self.syst
    }

    pub fn nominal(&self) -> &Rc<HistKey> {
        &self.nominal
    }

    /// Up and down keys of a shape variation.
    pub fn shape_keys(&self) -> Option<(&Rc<HistKey>, &Rc<HistKey>)> {
        self.shapes.as_ref().map(|(u, d)| (u, d))
    }

    /// Whether a shape variation fell back to nominal in both directions.
    pub fn is_fallback(&self) -> bool {
        self.shapes
            .as_ref()
            .is_some_and(|(u, d)| Rc::ptr_eq(u, &self.nominal) && Rc::ptr_eq(d, &self.nominal))
    }

    pub fn nom(&self) -> Result<Rc<Distribution>> {
        self.nominal.load()
    }

    pub fn up(&self) -> Result<Vec<f64>> {
        self.varied(Direction::Up)
    }

    pub fn down(&self) -> Result<Vec<f64>> {
        self.varied(Direction::Down)
    }

    /// Alternative contents in `dir`, over every cell of the nominal.
    pub fn varied(&self, dir: Direction) -> Result<Vec<f64>> {
        let nom = self.nominal.load()?;
        match (&self.shapes, self.syst.kind.factor(dir)) {
            (_, Some(f)) => Ok(nom.contents().iter().map(|c| c * f).collect()),
            (Some((up, down)), None) => {
                let key = if dir == Direction::Up { up } else { down };
                let alt = key.load()?;
                if alt.n_cells() != nom.n_cells() {
                    return Err(Error::shape_mismatch(
                        format!("{} variation of '{}' ({})", dir, nom.name(), self.name()),
                        nom.n_cells(),
                        alt.n_cells(),
                    ));
                }
                Ok(alt.contents().to_vec())
            }
            (None, None) => Ok(nom.contents().to_vec()),
        }
    }

    /// `max(|up - nom|, |down - nom|)` per cell.
    pub fn deviation(&self) -> Result<Vec<f64>> {
        let nom = self.nominal.load()?;
        let up = self.up()?;
        let down = self.down()?;
        Ok(nom
            .contents()
            .iter()
            .zip(up.iter().zip(&down))
            .map(|(n, (u, d))| (u - n).abs().max((d - n).abs()))
            .collect())
    }
}

fn find_alternate(
    syst: &str,
    nominal: &Rc<HistKey>,
    dir: Direction,
    opts: BindOptions,
) -> Result<Rc<HistKey>> {
    let suffix = format!("__{}{}", syst, dir);
    let source = nominal.source();

    let same_file = format!("{}{}", nominal.name(), suffix);
    if source.contains(&same_file).unwrap_or(false) {
        return Ok(Rc::new(nominal.with_name(same_file)));
    }

    match source.sibling(&suffix) {
        Ok(Some(sibling)) if sibling.contains(nominal.name()).unwrap_or(false) => {
            return Ok(Rc::new(nominal.with_source(sibling)));
        }
        Ok(Some(sibling)) => {
            log::debug!("'{}' has no histogram '{}'", sibling.id(), nominal.name());
        }
        Ok(None) => {}
        Err(e) => log::debug!("sibling lookup for '{}' failed: {}", source.id(), e),
    }

    if opts.strict_shapes {
        return Err(Error::ShapeVariationMissing {
            histogram: nominal.name().to_string(),
            systematic: syst.to_string(),
            direction: dir.to_string(),
        });
    }
    log::debug!(
        "no {} variation '{}' for '{}' in '{}', using nominal",
        dir,
        syst,
        nominal.name(),
        source.id()
    );
    Ok(Rc::clone(nominal))
}
