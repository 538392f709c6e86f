// src/job/constraint.rs

//! Runtime constraints a job declares before it may run.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    OnAnyNetwork,
    OnUnmeteredNetwork,
    DeviceCharging,
    DeviceIdle,
}

impl Constraint {
    pub const ALL: [Constraint; 4] = [
        Constraint::OnAnyNetwork,
        Constraint::OnUnmeteredNetwork,
        Constraint::DeviceCharging,
        Constraint::DeviceIdle,
    ];

    pub fn bit(self) -> u32 {
        match self {
            Constraint::OnAnyNetwork => 1,
            Constraint::OnUnmeteredNetwork => 1 << 1,
            Constraint::DeviceCharging => 1 << 2,
            Constraint::DeviceIdle => 1 << 3,
        }
    }
}

/// Set of [`Constraint`]s stored as a bit mask.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintSet(u32);

impl ConstraintSet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn with(mut self, constraint: Constraint) -> Self {
        self.insert(constraint);
        self
    }

    pub fn insert(&mut self, constraint: Constraint) {
        self.0 |= constraint.bit();
    }

    pub fn contains(&self, constraint: Constraint) -> bool {
        self.0 & constraint.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Bit mask form used on the wire.
    pub fn compact(&self) -> u32 {
        self.0
    }

    /// Rebuild a set from its wire form. Unknown bits are dropped.
    pub fn uncompact(mask: u32) -> Self {
        let known = Constraint::ALL.iter().fold(0, |acc, c| acc | c.bit());
        Self(mask & known)
    }

    pub fn iter(&self) -> impl Iterator<Item = Constraint> + '_ {
        Constraint::ALL.into_iter().filter(|c| self.contains(*c))
    }
}

impl FromIterator<Constraint> for ConstraintSet {
    fn from_iter<I: IntoIterator<Item = Constraint>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), ConstraintSet::with)
    }
}

impl fmt::Debug for ConstraintSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
