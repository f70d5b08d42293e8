// SPDX-License-Identifier: GPL-3.0-only
//! Per-output CRTC state shared by both setter backends

use std::collections::BTreeMap;

use crate::gamma::GammaRamp;

/// Opaque backend handle for the CRTC currently driving an output.
pub type CrtcId = u32;

/// What the backend knows about one configured output.
#[derive(Debug, Default)]
pub struct CrtcState {
    /// CRTC currently driving the output. `None` until discovery matches the
    /// configured name, and cleared again whenever the topology changes.
    pub id: Option<CrtcId>,
    /// Ramp that was active when the output was first discovered. Captured
    /// once per output and never refreshed: after the first apply the live
    /// ramp is already scaled, so a later capture would corrupt the restore
    /// baseline.
    pub original_gamma: Option<GammaRamp>,
}

/// Configured outputs in a stable order, keyed by exact connector name.
///
/// A name the backend never reports keeps both fields unset for the process
/// lifetime; that output is skipped on every apply and is not an error.
#[derive(Debug)]
pub struct CrtcMap {
    inner: BTreeMap<String, CrtcState>,
}

impl CrtcMap {
    /// Create one empty state record per configured output name.
    pub fn new(names: &[String]) -> Self {
        let inner = names
            .iter()
            .map(|name| (name.clone(), CrtcState::default()))
            .collect();
        Self { inner }
    }

    /// Forget every CRTC handle ahead of a re-enumeration. Captured gamma
    /// ramps are kept.
    pub fn clear_ids(&mut self) {
        for state in self.inner.values_mut() {
            state.id = None;
        }
    }

    /// State for a configured output name, or `None` if the name was not
    /// configured at all.
    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut CrtcState> {
        self.inner.get_mut(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CrtcState)> {
        self.inner.iter()
    }
}
