// SPDX-License-Identifier: GPL-3.0-only
//! The backlight translation loop
//!
//! Reads the hardware backlight on a fixed interval and mirrors it onto the
//! configured outputs as a gamma scale. Applications occasionally clobber
//! the gamma ramp (the first Chromium start is a known offender), so the
//! current table is re-applied every tick instead of only on change.
//!
//! Whatever ends the loop, the original ramps are restored before control
//! returns: a failed tick, a termination signal, or a clean stop all funnel
//! through the same single reset call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::backlight::BacklightSource;
use crate::protocols::BrightnessSetter;

/// Upper bound on one uninterrupted sleep, so a termination signal is honored
/// promptly even with long tick intervals.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Run the translation loop until `term` is raised or a tick fails, then
/// restore the original gamma.
pub fn translate(
    setter: &mut dyn BrightnessSetter,
    backlight: &BacklightSource,
    interval: Duration,
    term: &AtomicBool,
) -> Result<()> {
    let outcome = run_ticks(setter, backlight, interval, term);

    info!("Restoring original gamma");
    match (outcome, setter.reset()) {
        (Ok(()), reset) => reset.context("Failed to restore original gamma"),
        (Err(tick), Ok(())) => Err(tick),
        (Err(tick), Err(reset)) => {
            // The tick failure is the root cause; don't let it be masked.
            error!("Failed to restore original gamma: {reset:#}");
            Err(tick)
        }
    }
}

fn run_ticks(
    setter: &mut dyn BrightnessSetter,
    backlight: &BacklightSource,
    interval: Duration,
    term: &AtomicBool,
) -> Result<()> {
    while !term.load(Ordering::Relaxed) {
        let reading = backlight.read()?;
        let factor = reading.factor();
        debug!(
            "Backlight {}/{} -> factor {:.4}",
            reading.actual, reading.max, factor
        );
        setter.set_brightness(Some(factor))?;
        sleep(interval, term);
    }
    Ok(())
}

/// Sleep in slices, returning early once `term` is raised.
fn sleep(interval: Duration, term: &AtomicBool) {
    let mut remaining = interval;
    while !remaining.is_zero() && !term.load(Ordering::Relaxed) {
        let slice = remaining.min(SLEEP_SLICE);
        thread::sleep(slice);
        remaining = remaining.saturating_sub(slice);
    }
}
