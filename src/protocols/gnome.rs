// SPDX-License-Identifier: GPL-3.0-only
//! GNOME display configuration gamma control
//!
//! Wayland GNOME sessions expose no RandR, so gamma updates go through
//! Mutter's `org.gnome.Mutter.DisplayConfig` service on the session bus.
//! Every call into the service is tagged with the topology serial from its
//! resource snapshot; a stale serial is rejected by the compositor, which is
//! why discovery runs before each apply.

use std::collections::HashMap;

use anyhow::{Context, Result};
use zbus::proxy;
use zbus::zvariant::OwnedValue;

use crate::crtc::{CrtcId, CrtcMap};
use crate::gamma::{GammaCache, GammaRamp};
use crate::protocols::BrightnessSetter;

/// Property map attached to Mutter resource entries.
pub type PropMap = HashMap<String, OwnedValue>;

/// CRTC entry:
/// `(id, winsys_id, x, y, width, height, current_mode, transform, transforms, properties)`.
pub type CrtcEntry = (u32, i64, i32, i32, i32, i32, i32, u32, Vec<u32>, PropMap);

/// Output entry:
/// `(id, winsys_id, current_crtc, possible_crtcs, name, modes, clones, properties)`.
/// Only `current_crtc` (negative when the output is not driven) and `name`
/// are consumed here, by position.
pub type OutputEntry = (u32, i64, i32, Vec<u32>, String, Vec<u32>, Vec<u32>, PropMap);

/// Mode entry: `(id, winsys_id, width, height, frequency, flags)`.
pub type ModeEntry = (u32, i64, u32, u32, f64, u32);

/// One snapshot of the session display configuration.
pub type Resources = (u32, Vec<CrtcEntry>, Vec<OutputEntry>, Vec<ModeEntry>);

/// Mutter display configuration D-Bus proxy
#[proxy(
    interface = "org.gnome.Mutter.DisplayConfig",
    default_service = "org.gnome.Mutter.DisplayConfig",
    default_path = "/org/gnome/Mutter/DisplayConfig",
    gen_async = false
)]
trait MutterDisplayConfig {
    fn get_resources(
        &self,
    ) -> zbus::Result<(u32, Vec<CrtcEntry>, Vec<OutputEntry>, Vec<ModeEntry>, i32, i32)>;

    fn get_crtc_gamma(
        &self,
        serial: u32,
        crtc: u32,
    ) -> zbus::Result<(Vec<u16>, Vec<u16>, Vec<u16>)>;

    fn set_crtc_gamma(
        &self,
        serial: u32,
        crtc: u32,
        red: &[u16],
        green: &[u16],
        blue: &[u16],
    ) -> zbus::Result<()>;
}

/// What the GNOME setter needs from the display configuration service.
pub trait DisplayConfig {
    /// Current topology serial plus the crtc, output and mode lists.
    fn resources(&mut self) -> Result<Resources>;

    /// Gamma ramp currently applied by a CRTC.
    fn crtc_gamma(&mut self, serial: u32, crtc: CrtcId) -> Result<GammaRamp>;

    /// Replace the gamma ramp of a CRTC.
    fn set_crtc_gamma(&mut self, serial: u32, crtc: CrtcId, ramp: &GammaRamp) -> Result<()>;
}

/// Live session-bus client for the Mutter service.
pub struct MutterConfig {
    proxy: MutterDisplayConfigProxy<'static>,
}

impl MutterConfig {
    pub fn connect() -> Result<Self> {
        let connection = zbus::blocking::Connection::session()
            .context("Failed to connect to the D-Bus session bus")?;
        let proxy = MutterDisplayConfigProxy::new(&connection)
            .context("Failed to create display configuration proxy")?;
        Ok(Self { proxy })
    }
}

impl DisplayConfig for MutterConfig {
    fn resources(&mut self) -> Result<Resources> {
        let (serial, crtcs, outputs, modes, _max_width, _max_height) = self
            .proxy
            .get_resources()
            .context("Failed to query display resources")?;
        Ok((serial, crtcs, outputs, modes))
    }

    fn crtc_gamma(&mut self, serial: u32, crtc: CrtcId) -> Result<GammaRamp> {
        let (red, green, blue) = self.proxy.get_crtc_gamma(serial, crtc)?;
        Ok(GammaRamp { red, green, blue })
    }

    fn set_crtc_gamma(&mut self, serial: u32, crtc: CrtcId, ramp: &GammaRamp) -> Result<()> {
        self.proxy
            .set_crtc_gamma(serial, crtc, &ramp.red, &ramp.green, &ramp.blue)?;
        Ok(())
    }
}

/// Applies brightness through the session display configuration service.
pub struct GnomeSetter<C> {
    config: C,
    serial: Option<u32>,
    crtcs: CrtcMap,
    cache: GammaCache,
}

impl<C: DisplayConfig> GnomeSetter<C> {
    pub fn new(config: C, outputs: &[String]) -> Self {
        Self {
            config,
            serial: None,
            crtcs: CrtcMap::new(outputs),
            cache: GammaCache::new(),
        }
    }

    /// Re-read the CRTC mapping when the topology serial moved. Returns the
    /// serial that subsequent calls must be tagged with.
    ///
    /// Fetching resources is the only way to learn the serial, so the
    /// short-circuit saves the per-output work, not the snapshot itself.
    fn refresh(&mut self) -> Result<u32> {
        let (serial, _crtcs, outputs, _modes) = self.config.resources()?;
        if self.serial == Some(serial) {
            debug!("Serial {serial} unchanged, keeping crtc mapping");
            return Ok(serial);
        }
        match self.serial {
            None => info!("Reading display configuration (serial {serial})"),
            Some(previous) => info!("Display topology changed (serial {previous} -> {serial})"),
        }

        self.crtcs.clear_ids();
        for (_, _, current_crtc, _, name, _, _, _) in outputs {
            let Ok(crtc) = CrtcId::try_from(current_crtc) else {
                debug!("Output {name} is not driven by any crtc");
                continue;
            };
            debug!("Met output {name} on crtc {crtc}");
            let Some(state) = self.crtcs.lookup_mut(&name) else {
                continue;
            };
            state.id = Some(crtc);
            if state.original_gamma.is_none() {
                info!("Capturing original gamma of {name}");
                state.original_gamma = Some(self.config.crtc_gamma(serial, crtc)?);
            }
        }
        self.serial = Some(serial);
        Ok(serial)
    }
}

impl<C: DisplayConfig> BrightnessSetter for GnomeSetter<C> {
    fn set_brightness(&mut self, factor: Option<f64>) -> Result<()> {
        let serial = self.refresh()?;

        let Self {
            config,
            crtcs,
            cache,
            ..
        } = self;
        for (name, state) in crtcs.iter() {
            let Some(id) = state.id else { continue };
            let Some(original) = state.original_gamma.as_ref() else {
                continue;
            };
            let ramp = match factor {
                Some(factor) => cache.scaled(name, factor, original),
                None => original,
            };
            config.set_crtc_gamma(serial, id, ramp)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[derive(Default)]
    struct FakeState {
        serial: u32,
        /// (current_crtc, name) per output entry
        outputs: Vec<(i32, String)>,
        gamma: HashMap<CrtcId, GammaRamp>,
        sets: Vec<(u32, CrtcId, GammaRamp)>,
        resources_calls: usize,
        gamma_fetches: usize,
    }

    #[derive(Default, Clone)]
    struct FakeConfig(Rc<RefCell<FakeState>>);

    impl FakeConfig {
        fn set_topology(&self, serial: u32, outputs: &[(i32, &str)]) {
            let mut state = self.0.borrow_mut();
            state.serial = serial;
            state.outputs = outputs
                .iter()
                .map(|(crtc, name)| (*crtc, name.to_string()))
                .collect();
        }

        fn set_gamma(&self, crtc: CrtcId, ramp: GammaRamp) {
            self.0.borrow_mut().gamma.insert(crtc, ramp);
        }

        fn sets(&self) -> Vec<(u32, CrtcId, GammaRamp)> {
            self.0.borrow().sets.clone()
        }
    }

    impl DisplayConfig for FakeConfig {
        fn resources(&mut self) -> Result<Resources> {
            let mut state = self.0.borrow_mut();
            state.resources_calls += 1;
            let outputs = state
                .outputs
                .iter()
                .map(|(crtc, name)| {
                    (
                        0,
                        0,
                        *crtc,
                        Vec::new(),
                        name.clone(),
                        Vec::new(),
                        Vec::new(),
                        PropMap::new(),
                    )
                })
                .collect();
            Ok((state.serial, Vec::new(), outputs, Vec::new()))
        }

        fn crtc_gamma(&mut self, _serial: u32, crtc: CrtcId) -> Result<GammaRamp> {
            let mut state = self.0.borrow_mut();
            state.gamma_fetches += 1;
            state
                .gamma
                .get(&crtc)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no gamma for crtc {crtc}"))
        }

        fn set_crtc_gamma(&mut self, serial: u32, crtc: CrtcId, ramp: &GammaRamp) -> Result<()> {
            self.0.borrow_mut().sets.push((serial, crtc, ramp.clone()));
            Ok(())
        }
    }

    fn base_ramp() -> GammaRamp {
        GammaRamp {
            red: vec![0, 4000, 8000],
            green: vec![0, 4000, 8000],
            blue: vec![0, 4000, 8000],
        }
    }

    fn outputs(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_unchanged_serial_skips_enumeration() {
        let config = FakeConfig::default();
        config.set_topology(7, &[(3, "eDP-1")]);
        config.set_gamma(3, base_ramp());
        let mut setter = GnomeSetter::new(config.clone(), &outputs(&["eDP-1"]));

        setter.set_brightness(Some(0.5)).unwrap();
        setter.set_brightness(Some(0.5)).unwrap();

        let state = config.0.borrow();
        // The serial is only learnable from the snapshot itself.
        assert_eq!(state.resources_calls, 2);
        // No per-output work happened the second time.
        assert_eq!(state.gamma_fetches, 1);
        assert!(state.sets.iter().all(|(serial, _, _)| *serial == 7));
    }

    #[test]
    fn test_serial_change_remaps_without_recapture() {
        let config = FakeConfig::default();
        config.set_topology(7, &[(3, "eDP-1")]);
        config.set_gamma(3, base_ramp());
        let mut setter = GnomeSetter::new(config.clone(), &outputs(&["eDP-1"]));

        setter.set_brightness(Some(0.25)).unwrap();

        // The output is moved to another CRTC whose live ramp is already
        // scaled; a re-capture would adopt it as the new baseline.
        config.set_topology(8, &[(5, "eDP-1")]);
        config.set_gamma(5, base_ramp().scaled(0.25));
        setter.reset().unwrap();

        let sets = config.sets();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[1].0, 8);
        assert_eq!(sets[1].1, 5);
        assert_eq!(sets[1].2, base_ramp());
        assert_eq!(config.0.borrow().gamma_fetches, 1);
    }

    #[test]
    fn test_undriven_output_is_skipped() {
        let config = FakeConfig::default();
        config.set_topology(7, &[(-1, "eDP-1")]);
        let mut setter = GnomeSetter::new(config.clone(), &outputs(&["eDP-1"]));

        setter.set_brightness(Some(0.5)).unwrap();

        let state = config.0.borrow();
        assert_eq!(state.gamma_fetches, 0);
        assert!(state.sets.is_empty());
    }

    #[test]
    fn test_new_output_is_captured_on_serial_change() {
        let config = FakeConfig::default();
        config.set_topology(7, &[(3, "eDP-1")]);
        config.set_gamma(3, base_ramp());
        let mut setter = GnomeSetter::new(config.clone(), &outputs(&["eDP-1", "HDMI-1"]));

        setter.set_brightness(Some(0.5)).unwrap();
        assert_eq!(config.0.borrow().gamma_fetches, 1);

        config.set_topology(8, &[(3, "eDP-1"), (4, "HDMI-1")]);
        config.set_gamma(4, base_ramp());
        setter.set_brightness(Some(0.5)).unwrap();

        let state = config.0.borrow();
        // Only the newly met output was captured.
        assert_eq!(state.gamma_fetches, 2);
        let last_serial_sets: Vec<_> = state.sets.iter().filter(|(s, _, _)| *s == 8).collect();
        assert_eq!(last_serial_sets.len(), 2);
    }
}
