//! Per-device wavelength spectrum.
//!
//! Tracks which grid wavelengths are held by which grant and which have been
//! lost. A wavelength is held by at most one grant at a time, so corridors
//! sharing a device always hold disjoint sets.

use corridor_core::GrantId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Wavelength occupancy of one device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spectrum {
    grid: BTreeSet<u32>,
    held: BTreeMap<u32, GrantId>,
    lost: BTreeSet<u32>,
}

impl Spectrum {
    /// Spectrum over a wavelength grid
    #[must_use]
    pub fn new(grid: impl IntoIterator<Item = u32>) -> Self {
        Self {
            grid: grid.into_iter().collect(),
            held: BTreeMap::new(),
            lost: BTreeSet::new(),
        }
    }

    /// Wavelengths neither held nor lost, ascending
    pub fn available(&self) -> impl Iterator<Item = u32> + '_ {
        self.grid
            .iter()
            .copied()
            .filter(|w| !self.held.contains_key(w) && !self.lost.contains(w))
    }

    /// Grid size minus lost wavelengths
    #[must_use]
    pub fn usable(&self) -> u64 {
        (self.grid.len() - self.lost.len()) as u64
    }

    /// Whether the wavelength is on the grid
    #[must_use]
    pub fn on_grid(&self, nm: u32) -> bool {
        self.grid.contains(&nm)
    }

    /// Whether the wavelength has been lost
    #[must_use]
    pub fn is_lost(&self, nm: u32) -> bool {
        self.lost.contains(&nm)
    }

    /// Holder of a wavelength
    #[must_use]
    pub fn holder(&self, nm: u32) -> Option<&GrantId> {
        self.held.get(&nm)
    }

    /// Wavelengths held by a grant, ascending
    #[must_use]
    pub fn held_by(&self, grant: &GrantId) -> Vec<u32> {
        self.held
            .iter()
            .filter(|(_, g)| *g == grant)
            .map(|(w, _)| *w)
            .collect()
    }

    /// Assign up to `count` wavelengths, preferred ones first, then the
    /// lowest available. Returns what was assigned.
    pub fn assign(&mut self, grant: &GrantId, preferred: &[u32], count: usize) -> Vec<u32> {
        let mut picked: Vec<u32> = preferred
            .iter()
            .copied()
            .filter(|w| self.on_grid(*w) && !self.held.contains_key(w) && !self.lost.contains(w))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .take(count)
            .collect();
        if picked.len() < count {
            let extra: Vec<u32> = self
                .available()
                .filter(|w| !picked.contains(w))
                .take(count - picked.len())
                .collect();
            picked.extend(extra);
        }
        for w in &picked {
            self.held.insert(*w, grant.clone());
        }
        picked.sort_unstable();
        picked
    }

    /// Release one wavelength held by a grant
    pub fn unassign(&mut self, grant: &GrantId, nm: u32) -> bool {
        if self.held.get(&nm) == Some(grant) {
            self.held.remove(&nm);
            true
        } else {
            false
        }
    }

    /// Release everything a grant holds
    pub fn release(&mut self, grant: &GrantId) -> usize {
        let before = self.held.len();
        self.held.retain(|_, g| g != grant);
        before - self.held.len()
    }

    /// Mark a wavelength lost; returns its former holder
    pub fn lose(&mut self, nm: u32) -> Option<GrantId> {
        self.lost.insert(nm);
        self.held.remove(&nm)
    }

    /// Hand the lowest available spare to `grant`
    pub fn take_spare(&mut self, grant: &GrantId) -> Option<u32> {
        let spare = self.available().next()?;
        self.held.insert(spare, grant.clone());
        Some(spare)
    }

    /// Lost wavelengths, ascending
    #[must_use]
    pub fn lost(&self) -> Vec<u32> {
        self.lost.iter().copied().collect()
    }
}
