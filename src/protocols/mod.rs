// SPDX-License-Identifier: GPL-3.0-only
//! Gamma-based brightness setters
//!
//! This module contains the two protocols that can rewrite a display's gamma
//! ramps: plain XRandR against the X server, and the GNOME display
//! configuration service for Wayland GNOME sessions. Both expose the same
//! capability and are chosen once at startup.

pub mod gnome;
pub mod xrandr;

use anyhow::Result;
use clap::ValueEnum;

use crate::protocols::gnome::{GnomeSetter, MutterConfig};
use crate::protocols::xrandr::{X11Screen, XrandrSetter};

/// Common trait for the gamma control protocols
pub trait BrightnessSetter {
    /// Apply a brightness factor in `(0, 1]` to every configured output, or
    /// put the original ramps back when `factor` is `None`.
    ///
    /// Discovery runs implicitly inside each call, so hotplugged or renumbered
    /// outputs are picked up without outside help. Outputs whose configured
    /// name was never reported by the display are skipped silently.
    fn set_brightness(&mut self, factor: Option<f64>) -> Result<()>;

    /// Restore every known output to the ramp captured at discovery.
    fn reset(&mut self) -> Result<()> {
        self.set_brightness(None)
    }
}

/// Which display protocol carries the gamma updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SetterMethod {
    /// Talk RandR to the X server directly
    Xrandr,
    /// Go through the GNOME display configuration service
    Gnome,
}

/// Connect the chosen protocol and wire it to the configured output names.
///
/// `display` and `screen` only apply to the xrandr method; the GNOME service
/// is always reached through the session bus.
pub fn connect(
    method: SetterMethod,
    outputs: &[String],
    display: Option<&str>,
    screen: Option<usize>,
) -> Result<Box<dyn BrightnessSetter>> {
    Ok(match method {
        SetterMethod::Xrandr => {
            let transport = X11Screen::connect(display, screen)?;
            Box::new(XrandrSetter::new(transport, outputs))
        }
        SetterMethod::Gnome => {
            let transport = MutterConfig::connect()?;
            Box::new(GnomeSetter::new(transport, outputs))
        }
    })
}
