//! Stacks of contributions and the combination of their systematics.

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use pit_core::{Error, Memo, Result};
use pit_hist::Distribution;

use crate::band::UncertaintyBand;
use crate::contribution::Contribution;
use crate::entry::{MergedEntry, StackComponent, StackEntry};

/// Lifecycle of a [`Stack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackState {
    /// Entries may be appended.
    Open,
    /// The total or the systematics were requested.
    Frozen,
}

/// How [`Stack::merge`] treats the systematics of merged entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergePolicy {
    /// Keep the leaves (and thus the systematics) of the first stack's entry.
    #[default]
    CarryFirst,
    /// Keep the leaves of every merged stack.
    Rederive,
}

/// Per-systematic and combined uncertainty over the visible bins.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedSystematics {
    /// Linear sum over leaves of each systematic's deviation.
    pub per_systematic: BTreeMap<String, Vec<f64>>,
    /// Quadrature sum over systematics.
    pub total: Vec<f64>,
    /// Sum of every leaf deviation in every bin.
    pub integral: f64,
}

/// Ordered collection of entries with a cached total.
///
/// Leaves are combined linearly within one systematic (fully correlated)
/// and systematics are combined in quadrature (independent).
#[derive(Debug, Default)]
pub struct Stack {
    entries: Vec<StackEntry>,
    frozen: Cell<bool>,
    total: Memo<Distribution>,
    systematics: Memo<CombinedSystematics>,
}

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I, E>(entries: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<StackEntry>,
    {
        Self { entries: entries.into_iter().map(Into::into).collect(), ..Self::default() }
    }

    /// Append an entry; fails once the stack is frozen.
    pub fn add(&mut self, entry: impl Into<StackEntry>) -> Result<()> {
        let entry = entry.into();
        if self.frozen.get() {
            return Err(Error::IllegalMutation(format!(
                "cannot add '{}' to a stack whose total was already built",
                entry.name()
            )));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn entries(&self) -> &[StackEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn state(&self) -> StackState {
        if self.frozen.get() { StackState::Frozen } else { StackState::Open }
    }

    /// Leaves of every entry, in order.
    pub fn contributions(&self) -> impl Iterator<Item = &Contribution> {
        self.entries.iter().flat_map(|e| e.contributions())
    }

    /// Sum of the direct entries (groups contribute their own total).
    pub fn total(&self) -> Result<Rc<Distribution>> {
        self.frozen.set(true);
        self.total.get_or_try_init(|| {
            let (first, rest) = self.entries.split_first().ok_or(Error::EmptyStack)?;
            let mut total = (*first.distribution()?).clone().with_name("total");
            for entry in rest {
                total.add(&*entry.distribution()?)?;
            }
            Ok(total)
        })
    }

    /// Names of the systematics present on any leaf.
    pub fn all_systematic_names(&self) -> BTreeSet<String> {
        self.contributions().flat_map(|c| c.systematics().keys().cloned()).collect()
    }

    /// Combined systematics over `names`, or over every present one.
    ///
    /// The all-names result is cached alongside the total.
    pub fn combined_systematics(&self, names: Option<&[String]>) -> Result<Rc<CombinedSystematics>> {
        match names {
            None => self
                .systematics
                .get_or_try_init(|| self.compute_systematics(&self.all_systematic_names())),
            Some(names) => {
                let names: BTreeSet<String> = names.iter().cloned().collect();
                self.compute_systematics(&names).map(Rc::new)
            }
        }
    }

    fn compute_systematics(&self, names: &BTreeSet<String>) -> Result<CombinedSystematics> {
        let n = self.total()?.n_bins();
        let mut per_systematic = BTreeMap::new();
        let mut integral = 0.0;
        for name in names {
            let mut in_bins = vec![0.0; n];
            for leaf in self.contributions() {
                let Some(var) = leaf.systematics().get(name) else {
                    continue;
                };
                let dev = var.deviation()?;
                if dev.len() != n + 2 {
                    return Err(Error::shape_mismatch(
                        format!("systematic '{}' of '{}'", name, leaf.name()),
                        n,
                        dev.len().saturating_sub(2),
                    ));
                }
                for (acc, d) in in_bins.iter_mut().zip(&dev[1..=n]) {
                    *acc += d;
                }
                integral += dev[1..=n].iter().sum::<f64>();
            }
            per_systematic.insert(name.clone(), in_bins);
        }
        let total = (0..n)
            .map(|i| per_systematic.values().map(|s: &Vec<f64>| s[i] * s[i]).sum::<f64>().sqrt())
            .collect();
        Ok(CombinedSystematics { per_systematic, total, integral })
    }

    /// Total with the systematic uncertainty as error.
    pub fn systematic_band(&self, names: Option<&[String]>) -> Result<UncertaintyBand> {
        let syst = self.combined_systematics(names)?;
        UncertaintyBand::systematic(&*self.total()?, &syst.total)
    }

    /// Total with statistical and systematic uncertainties added in quadrature.
    pub fn stat_syst_band(&self, names: Option<&[String]>) -> Result<UncertaintyBand> {
        let syst = self.combined_systematics(names)?;
        UncertaintyBand::stat_syst(&*self.total()?, &syst.total)
    }

    /// Relative systematic uncertainty around 1.
    pub fn rel_systematic_band(&self, names: Option<&[String]>) -> Result<UncertaintyBand> {
        Ok(self.systematic_band(names)?.relative())
    }

    /// Drop the cached total and systematics, and the cached group totals.
    ///
    /// The stack stays frozen.
    pub fn invalidate(&self) {
        self.total.clear();
        self.systematics.clear();
        for entry in &self.entries {
            entry.invalidate();
        }
    }

    /// Sum stacks with the same entry layout, entry by entry.
    ///
    /// Every entry total is materialized.
    pub fn merge(stacks: &[&Stack], policy: MergePolicy) -> Result<Stack> {
        let (first, rest) = stacks.split_first().ok_or(Error::EmptyStack)?;
        if let Some(other) = rest.iter().find(|s| s.len() != first.len()) {
            return Err(Error::shape_mismatch("stack merge (entry count)", first.len(), other.len()));
        }
        let mut entries = Vec::with_capacity(first.len());
        for (i, entry) in first.entries.iter().enumerate() {
            let mut total = (*entry.distribution()?).clone();
            for other in rest {
                total.add(&*other.entries[i].distribution()?)?;
            }
            let leaves = match policy {
                MergePolicy::CarryFirst => entry.contributions().to_vec(),
                MergePolicy::Rederive => stacks
                    .iter()
                    .flat_map(|s| s.entries[i].contributions().iter().cloned())
                    .collect(),
            };
            entries.push(StackEntry::Merged(MergedEntry {
                name: entry.name().to_string(),
                sample_type: entry.sample_type(),
                style: Rc::new(entry.style().clone()),
                total: Rc::new(total),
                leaves,
            }));
        }
        log::debug!("merged {} stacks of {} entries", stacks.len(), first.len());
        Ok(Stack::from_entries(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SampleType;
    use crate::group::Group;
    use crate::systematics::{BindOptions, SystKind, SystVar};
    use approx::assert_relative_eq;
    use pit_hist::{HistKey, MemorySource, Transform};

    fn contribution(name: &str, counts: &[f64], systs: &[Rc<SystVar>]) -> Contribution {
        let d = Distribution::uniform(name, 0.0, counts.len() as f64, counts).unwrap();
        let key = HistKey::new(Rc::new(MemorySource::new(name).with(d)), name, Transform::default());
        Contribution::new(name, SampleType::Mc, Rc::new(key))
            .with_systematics(systs, BindOptions::default())
            .unwrap()
    }

    fn constant(name: &str, value: f64) -> Rc<SystVar> {
        Rc::new(SystVar::new(name, SystKind::constant(value).unwrap()))
    }

    #[test]
    fn total_sums_entries_including_flows() {
        let stack =
            Stack::from_entries([contribution("a", &[10.0, 20.0, 10.0], &[]), contribution("b", &[5.0, 5.0, 5.0], &[])]);
        let total = stack.total().unwrap();
        assert_eq!(total.contents(), &[0.0, 15.0, 25.0, 15.0, 0.0]);
        assert_eq!(stack.systematic_band(None).unwrap().errors, vec![0.0; 3]);
    }

    #[test]
    fn frozen_after_total() {
        let mut stack = Stack::new();
        stack.add(contribution("a", &[1.0], &[])).unwrap();
        assert_eq!(stack.state(), StackState::Open);
        stack.total().unwrap();
        assert_eq!(stack.state(), StackState::Frozen);
        let err = stack.add(contribution("b", &[1.0], &[])).unwrap_err();
        assert!(matches!(err, Error::IllegalMutation(_)));
    }

    #[test]
    fn empty_stack_has_no_total() {
        assert!(matches!(Stack::new().total(), Err(Error::EmptyStack)));
    }

    #[test]
    fn single_constant_systematic() {
        let stack = Stack::from_entries([contribution("a", &[100.0], &[constant("norm", 1.1)])]);
        let syst = stack.combined_systematics(None).unwrap();
        assert_relative_eq!(syst.total[0], 10.0, epsilon = 1e-9);
        assert_relative_eq!(syst.per_systematic["norm"][0], 10.0, epsilon = 1e-9);

        let band = stack.stat_syst_band(None).unwrap();
        assert_relative_eq!(band.errors[0], (100.0f64 + 100.0).sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn linear_within_quadrature_across() {
        let a = constant("a", 1.1);
        let b = constant("b", 1.2);
        let stack = Stack::from_entries([
            contribution("x", &[100.0, 50.0], &[a.clone(), b.clone()]),
            contribution("y", &[10.0, 0.0], &[a.clone()]),
        ]);
        let syst = stack.combined_systematics(None).unwrap();
        // a: 10 + 1, 5 + 0; b: 20, 10
        assert_relative_eq!(syst.per_systematic["a"][0], 11.0, epsilon = 1e-9);
        assert_relative_eq!(syst.per_systematic["b"][1], 10.0, epsilon = 1e-9);
        assert_relative_eq!(syst.total[0], (121.0f64 + 400.0).sqrt(), epsilon = 1e-9);
        assert_relative_eq!(syst.total[1], (25.0f64 + 100.0).sqrt(), epsilon = 1e-9);
        assert_relative_eq!(syst.integral, 11.0 + 5.0 + 30.0, epsilon = 1e-9);

        let only_b = stack.combined_systematics(Some(&["b".to_string()])).unwrap();
        assert_relative_eq!(only_b.total[0], 20.0, epsilon = 1e-9);

        let none = stack.combined_systematics(Some(&[])).unwrap();
        assert_eq!(none.total, vec![0.0, 0.0]);
    }

    #[test]
    fn groups_contribute_totals_and_leaves() {
        let norm = constant("norm", 1.5);
        let group = Group::new("g", SampleType::Mc, Rc::default())
            .with(contribution("a", &[2.0, 4.0], &[norm.clone()]))
            .unwrap()
            .with(contribution("b", &[2.0, 0.0], &[]))
            .unwrap();
        let stack = Stack::from_entries([StackEntry::from(group), contribution("c", &[1.0, 1.0], &[]).into()]);
        assert_eq!(stack.contributions().count(), 3);
        assert_eq!(stack.all_systematic_names().into_iter().collect::<Vec<_>>(), ["norm"]);
        assert_eq!(stack.total().unwrap().visible_contents(), &[5.0, 5.0]);
        let band = stack.rel_systematic_band(None).unwrap();
        assert_relative_eq!(band.errors[0], 1.0 / 5.0, epsilon = 1e-9);
        assert_relative_eq!(band.errors[1], 2.0 / 5.0, epsilon = 1e-9);
    }

    #[test]
    fn invalidate_clears_total_and_systematics_together() {
        let stack = Stack::from_entries([contribution("a", &[100.0], &[constant("n", 1.1)])]);
        let t1 = stack.total().unwrap();
        let s1 = stack.combined_systematics(None).unwrap();
        stack.invalidate();
        assert!(!Rc::ptr_eq(&t1, &stack.total().unwrap()));
        assert!(!Rc::ptr_eq(&s1, &stack.combined_systematics(None).unwrap()));
        assert_eq!(stack.state(), StackState::Frozen);
    }

    #[test]
    fn merge_policies() {
        let n = constant("n", 1.1);
        let era1 = Stack::from_entries([contribution("a", &[100.0], &[n.clone()])]);
        let era2 = Stack::from_entries([contribution("a", &[50.0], &[n.clone()])]);

        let carried = Stack::merge(&[&era1, &era2], MergePolicy::CarryFirst).unwrap();
        assert_eq!(carried.total().unwrap().visible_contents(), &[150.0]);
        assert_eq!(carried.contributions().count(), 1);
        assert_relative_eq!(carried.combined_systematics(None).unwrap().total[0], 10.0, epsilon = 1e-9);

        let rederived = Stack::merge(&[&era1, &era2], MergePolicy::Rederive).unwrap();
        assert_eq!(rederived.contributions().count(), 2);
        assert_relative_eq!(rederived.combined_systematics(None).unwrap().total[0], 15.0, epsilon = 1e-9);

        let single = Stack::merge(&[&era1], MergePolicy::default()).unwrap();
        assert_eq!(single.total().unwrap().contents(), era1.total().unwrap().contents());

        let short = Stack::new();
        assert!(matches!(
            Stack::merge(&[&era1, &short], MergePolicy::CarryFirst),
            Err(Error::IncompatibleShapes { .. })
        ));
    }
}
