//! The priority queue of projects still awaiting a decision.
//!
//! Ordering is part of the solver's determinism contract: projects with
//! fewer required packages are decided first (they constrain the search
//! least), ties broken by root and then by the package list itself. Pushes
//! de-duplicate on identical `(identifier, required-package)` pairs; the
//! same project may legitimately appear twice with different package sets
//! and each occurrence is visited separately.

use std::collections::BTreeSet;

use crate::core::project::BimodalIdentifier;

#[derive(Clone, Debug, PartialEq, Eq)]
struct Prioritized(BimodalIdentifier);

impl Ord for Prioritized {
    fn cmp(&self, other: &Prioritized) -> std::cmp::Ordering {
        self.0
            .required_packages
            .len()
            .cmp(&other.0.required_packages.len())
            .then_with(|| self.0.id.root.cmp(&other.0.id.root))
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Prioritized {
    fn partial_cmp(&self, other: &Prioritized) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
pub struct Unselected {
    items: BTreeSet<Prioritized>,
}

impl Unselected {
    pub fn new() -> Unselected {
        Unselected::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Enqueues an item unless an identical one is already present.
    pub fn push(&mut self, bmi: BimodalIdentifier) {
        self.items.insert(Prioritized(bmi));
    }

    /// Removes the highest-priority item.
    pub fn pop(&mut self) -> Option<BimodalIdentifier> {
        let first = self.items.first()?.clone();
        self.items.remove(&first);
        Some(first.0)
    }

    /// Removes every entry equal to `bmi`.
    pub fn remove(&mut self, bmi: &BimodalIdentifier) {
        self.items.remove(&Prioritized(bmi.clone()));
    }
}
