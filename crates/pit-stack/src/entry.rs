//! The read interface shared by everything that can sit in a stack.

use std::rc::Rc;

use pit_core::Result;
use pit_hist::Distribution;

use crate::config::SampleType;
use crate::contribution::Contribution;
use crate::group::Group;
use crate::style::PlotStyle;

/// Common read interface of contributions, groups and merged entries.
pub trait StackComponent {
    fn name(&self) -> &str;

    fn sample_type(&self) -> SampleType;

    fn style(&self) -> &PlotStyle;

    /// Contents and variance over every cell, sentinels included.
    fn distribution(&self) -> Result<Rc<Distribution>>;

    fn contents(&self) -> Result<Vec<f64>> {
        Ok(self.distribution()?.contents().to_vec())
    }

    fn variance(&self) -> Result<Vec<f64>> {
        Ok(self.distribution()?.variance().to_vec())
    }

    /// Flattened leaf contributions, used for systematics.
    fn contributions(&self) -> &[Contribution];

    /// Drop cached sums derived from the leaves.
    fn invalidate(&self) {}
}

/// Pre-summed entry produced by merging stacks.
#[derive(Debug, Clone)]
pub struct MergedEntry {
    pub(crate) name: String,
    pub(crate) sample_type: SampleType,
    pub(crate) style: Rc<PlotStyle>,
    pub(crate) total: Rc<Distribution>,
    pub(crate) leaves: Vec<Contribution>,
}

impl StackComponent for MergedEntry {
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
        Ok(Rc::clone(&self.total))
    }

    fn contributions(&self) -> &[Contribution] {
        &self.leaves
    }
}

/// One entry of a [`Stack`](crate::Stack).
#[derive(Debug)]
pub enum StackEntry {
    Single(Contribution),
    Group(Group),
    Merged(MergedEntry),
}

impl StackEntry {
    fn component(&self) -> &dyn StackComponent {
        match self {
            StackEntry::Single(c) => c,
            StackEntry::Group(g) => g,
            StackEntry::Merged(m) => m,
        }
    }
}

impl StackComponent for StackEntry {
    fn name(&self) -> &str {
        self.component().name()
    }

    fn sample_type(&self) -> SampleType {
        self.component().sample_type()
    }

    fn style(&self) -> &PlotStyle {
        self.component().style()
    }

    fn distribution(&self) -> Result<Rc<Distribution>> {
        self.component().distribution()
    }

    fn contributions(&self) -> &[Contribution] {
        self.component().contributions()
    }

    fn invalidate(&self) {
        self.component().invalidate()
    }
}

impl From<Contribution> for StackEntry {
    fn from(c: Contribution) -> Self {
        StackEntry::Single(c)
    }
}

impl From<Group> for StackEntry {
    fn from(g: Group) -> Self {
        StackEntry::Group(g)
    }
}

impl From<MergedEntry> for StackEntry {
    fn from(m: MergedEntry) -> Self {
        StackEntry::Merged(m)
    }
}
