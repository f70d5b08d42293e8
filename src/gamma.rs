// SPDX-License-Identifier: GPL-3.0-only
//! Gamma ramp model and derivation cache
//!
//! A gamma ramp is the per-channel lookup table a CRTC applies to outgoing
//! pixel values. Software brightness works by scaling every entry of the
//! original ramp by the current brightness factor; the original ramp is the
//! restore baseline and is never modified here.

use std::collections::{HashMap, VecDeque};

/// Maximum number of derived ramps kept per backend. The factor changes
/// rarely relative to the polling interval, so a small bound is enough to
/// make most ticks allocation-free.
const CACHE_CAPACITY: usize = 10;

/// One lookup table per color channel, equal length across channels.
/// The length is the ramp size reported by the display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GammaRamp {
    pub red: Vec<u16>,
    pub green: Vec<u16>,
    pub blue: Vec<u16>,
}

impl GammaRamp {
    /// Derive a new ramp with every entry multiplied by `factor` and
    /// truncated toward zero.
    ///
    /// `factor` must be in `(0, 1]`; values above 1 are not meaningful for a
    /// brightness effect and are not defended against beyond cast saturation.
    pub fn scaled(&self, factor: f64) -> GammaRamp {
        GammaRamp {
            red: scale_channel(&self.red, factor),
            green: scale_channel(&self.green, factor),
            blue: scale_channel(&self.blue, factor),
        }
    }
}

fn scale_channel(channel: &[u16], factor: f64) -> Vec<u16> {
    channel
        .iter()
        .map(|&value| (f64::from(value) * factor) as u16)
        .collect()
}

/// Key for a derived ramp: output name plus the exact bit pattern of the
/// factor it was derived for.
type CacheKey = (String, u64);

/// Bounded memoization of derived gamma ramps, keyed by `(output, factor)`
/// with least-recently-used eviction.
///
/// Owned by the single control-loop thread, so no synchronization. The
/// restore (`None` factor) path never goes through the cache; callers hand
/// the original ramp to the display directly.
#[derive(Debug, Default)]
pub struct GammaCache {
    entries: HashMap<CacheKey, GammaRamp>,
    /// Recency order, most recently used at the front.
    order: VecDeque<CacheKey>,
    /// Number of fresh derivations performed (cache misses).
    derivations: u64,
}

impl GammaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the ramp for `output` at `factor`, deriving it from `original`
    /// only when no cached copy exists.
    pub fn scaled<'a>(
        &'a mut self,
        output: &str,
        factor: f64,
        original: &'a GammaRamp,
    ) -> &'a GammaRamp {
        let key = (output.to_owned(), factor.to_bits());
        if self.entries.contains_key(&key) {
            self.promote(&key);
        } else {
            self.derivations += 1;
            tracing::debug!(
                output = %output,
                factor = %factor,
                derivation = self.derivations,
                "Deriving gamma table"
            );
            self.insert(key.clone(), original.scaled(factor));
        }
        match self.entries.get(&key) {
            Some(ramp) => ramp,
            None => original,
        }
    }

    /// Move an existing key to the front of the recency order.
    fn promote(&mut self, key: &CacheKey) {
        if let Some(position) = self.order.iter().position(|k| k == key) {
            if let Some(key) = self.order.remove(position) {
                self.order.push_front(key);
            }
        }
    }

    /// Insert a fresh entry, evicting the least recently used one when full.
    fn insert(&mut self, key: CacheKey, ramp: GammaRamp) {
        if self.entries.len() >= CACHE_CAPACITY {
            if let Some(oldest) = self.order.pop_back() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_front(key.clone());
        self.entries.insert(key, ramp);
    }
}
