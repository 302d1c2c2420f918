//! A single sample's distribution with its bound systematics.

use std::collections::BTreeMap;
use std::rc::Rc;

use pit_core::Result;
use pit_hist::{Distribution, HistKey};

use crate::config::SampleType;
use crate::entry::StackComponent;
use crate::style::PlotStyle;
use crate::systematics::{BindOptions, SystVar, Variation};

/// One sample in a stack.
#[derive(Debug, Clone)]
pub struct Contribution {
    name: String,
    sample_type: SampleType,
    style: Rc<PlotStyle>,
    key: Rc<HistKey>,
    systematics: BTreeMap<String, Variation>,
}

impl Contribution {
    /// A contribution without systematics and with the default style for its type.
    pub fn new(name: impl Into<String>, sample_type: SampleType, key: Rc<HistKey>) -> Self {
        Self {
            name: name.into(),
            sample_type,
            style: Rc::new(PlotStyle::default().with_type_defaults(sample_type)),
            key,
            systematics: BTreeMap::new(),
        }
    }

    pub fn with_style(mut self, style: Rc<PlotStyle>) -> Self {
        self.style = style;
        self
    }

    /// Bind every systematic of `systs` to this contribution's distribution.
    pub fn with_systematics<'a, I>(mut self, systs: I, opts: BindOptions) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Rc<SystVar>>,
    {
        for syst in systs {
            let var = Variation::bind(syst, &self.key, opts)?;
            self.systematics.insert(syst.name().to_string(), var);
        }
        Ok(self)
    }

    pub fn key(&self) -> &Rc<HistKey> {
        &self.key
    }

    pub fn systematics(&self) -> &BTreeMap<String, Variation> {
        &self.systematics
    }

    /// The nominal key followed by every distinct shape alternate.
    pub fn keys(&self) -> Vec<&Rc<HistKey>> {
        let mut keys = vec![&self.key];
        for (up, down) in self.systematics.values().filter_map(Variation::shape_keys) {
            for k in [up, down] {
                if !keys.iter().any(|seen| Rc::ptr_eq(seen, k)) {
                    keys.push(k);
                }
            }
        }
        keys
    }
}

impl StackComponent for Contribution {
    fn name(&self) -> &str {
        &self.name
    }

    fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    fn style(&self) -> &PlotStyle {
        &self.style
    }

    fn distribution(&self) -> Result<Rc<Distribution>> {
        self.key.load()
    }

    fn contributions(&self) -> &[Contribution] {
        std::slice::from_ref(self)
    }
}
