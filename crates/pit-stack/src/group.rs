//! Several contributions drawn as one stack entry.

use std::cell::Cell;
use std::rc::Rc;

use pit_core::{Error, Memo, Result};
use pit_hist::Distribution;

use crate::config::SampleType;
use crate::contribution::Contribution;
use crate::entry::StackComponent;
use crate::style::PlotStyle;

/// Elementwise sum of member contributions.
///
/// Systematics stay on the members and are combined when the stack evaluates
/// them. The group is frozen once its total has been computed.
#[derive(Debug)]
pub struct Group {
    name: String,
    sample_type: SampleType,
    style: Rc<PlotStyle>,
    members: Vec<Contribution>,
    total: Memo<Distribution>,
    frozen: Cell<bool>,
}

impl Group {
    pub fn new(name: impl Into<String>, sample_type: SampleType, style: Rc<PlotStyle>) -> Self {
        Self {
            name: name.into(),
            sample_type,
            style,
            members: Vec::new(),
            total: Memo::new(),
            frozen: Cell::new(false),
        }
    }

    pub fn add(&mut self, member: Contribution) -> Result<()> {
        if self.frozen.get() {
            return Err(Error::IllegalMutation(format!(
                "cannot add '{}' to group '{}' after its total was computed",
                member.name(),
                self.name
            )));
        }
        self.members.push(member);
        Ok(())
    }

    pub fn with(mut self, member: Contribution) -> Result<Self> {
        self.add(member)?;
        Ok(self)
    }

    pub fn members(&self) -> &[Contribution] {
        &self.members
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.get()
    }
}

impl StackComponent for Group {
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
        self.frozen.set(true);
        self.total.get_or_try_init(|| {
            let dists = self
                .members
                .iter()
                .map(|m| m.distribution())
                .collect::<Result<Vec<_>>>()?;
            Distribution::sum(self.name.clone(), dists.iter().map(|d| &**d))?
                .ok_or_else(|| Error::Validation(format!("group '{}' has no members", self.name)))
        })
    }

    fn contributions(&self) -> &[Contribution] {
        &self.members
    }

    fn invalidate(&self) {
        self.total.clear();
    }
}
