// SPDX-License-Identifier: GPL-3.0-only
//! XRandR gamma control
//!
//! Talks the RandR extension directly over an X connection. CRTC assignments
//! are re-enumerated on every apply; that is noticeably chatty on the wire,
//! but it means hotplugged or renumbered outputs are handled without a
//! separate event channel.

use anyhow::{Context, Result};
use x11rb::connection::Connection;
use x11rb::protocol::randr::ConnectionExt as RandrConnectionExt;
use x11rb::protocol::xproto::{Timestamp, Window};
use x11rb::rust_connection::RustConnection;

use crate::crtc::{CrtcId, CrtcMap};
use crate::gamma::{GammaCache, GammaRamp};
use crate::protocols::BrightnessSetter;

/// Identifier of a physical connector as reported by RandR.
pub type OutputId = u32;

/// What the XRandR setter needs from a connected screen.
///
/// Ramp-set calls may be buffered until `flush`; queries return immediately.
pub trait RandrScreen {
    /// All CRTCs the screen currently knows about.
    fn crtcs(&mut self) -> Result<Vec<CrtcId>>;

    /// Outputs actively driven by a CRTC.
    fn crtc_outputs(&mut self, crtc: CrtcId) -> Result<Vec<OutputId>>;

    /// Connector name of an output.
    fn output_name(&mut self, output: OutputId) -> Result<String>;

    /// Gamma ramp currently applied by a CRTC.
    fn crtc_gamma(&mut self, crtc: CrtcId) -> Result<GammaRamp>;

    /// Queue a gamma ramp update for a CRTC.
    fn set_crtc_gamma(&mut self, crtc: CrtcId, ramp: &GammaRamp) -> Result<()>;

    /// Push all queued updates out to the server.
    fn flush(&mut self) -> Result<()>;
}

/// RandR over a live X connection.
pub struct X11Screen {
    conn: RustConnection,
    root: Window,
    config_timestamp: Timestamp,
}

impl X11Screen {
    /// Connect to `display` (default `$DISPLAY`) and select `screen` (default:
    /// the server's preferred screen for the connection).
    pub fn connect(display: Option<&str>, screen: Option<usize>) -> Result<Self> {
        let (conn, preferred) =
            RustConnection::connect(display).context("Failed to connect to the X server")?;
        let screen_num = screen.unwrap_or(preferred);
        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .with_context(|| format!("Screen {screen_num} does not exist on this display"))?
            .root;
        let version = conn
            .randr_query_version(1, 5)?
            .reply()
            .context("RandR extension not available")?;
        debug!(
            "Connected to X server, screen {screen_num}, RandR {}.{}",
            version.major_version, version.minor_version
        );
        Ok(Self {
            conn,
            root,
            config_timestamp: 0,
        })
    }
}

impl RandrScreen for X11Screen {
    fn crtcs(&mut self) -> Result<Vec<CrtcId>> {
        let resources = self
            .conn
            .randr_get_screen_resources_current(self.root)?
            .reply()
            .context("Failed to enumerate screen resources")?;
        self.config_timestamp = resources.config_timestamp;
        Ok(resources.crtcs)
    }

    fn crtc_outputs(&mut self, crtc: CrtcId) -> Result<Vec<OutputId>> {
        let info = self
            .conn
            .randr_get_crtc_info(crtc, self.config_timestamp)?
            .reply()?;
        Ok(info.outputs)
    }

    fn output_name(&mut self, output: OutputId) -> Result<String> {
        let info = self
            .conn
            .randr_get_output_info(output, self.config_timestamp)?
            .reply()?;
        Ok(String::from_utf8_lossy(&info.name).to_string())
    }

    fn crtc_gamma(&mut self, crtc: CrtcId) -> Result<GammaRamp> {
        let reply = self.conn.randr_get_crtc_gamma(crtc)?.reply()?;
        Ok(GammaRamp {
            red: reply.red,
            green: reply.green,
            blue: reply.blue,
        })
    }

    fn set_crtc_gamma(&mut self, crtc: CrtcId, ramp: &GammaRamp) -> Result<()> {
        self.conn
            .randr_set_crtc_gamma(crtc, &ramp.red, &ramp.green, &ramp.blue)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.conn.flush()?;
        Ok(())
    }
}

/// Applies brightness by rewriting CRTC gamma ramps over RandR.
pub struct XrandrSetter<S> {
    screen: S,
    crtcs: CrtcMap,
    cache: GammaCache,
}

impl<S: RandrScreen> XrandrSetter<S> {
    pub fn new(screen: S, outputs: &[String]) -> Self {
        Self {
            screen,
            crtcs: CrtcMap::new(outputs),
            cache: GammaCache::new(),
        }
    }

    /// Walk every CRTC of the screen and record which one drives each
    /// configured output. The original ramp is captured the first time an
    /// output is met and kept from then on.
    fn discover(&mut self) -> Result<()> {
        self.crtcs.clear_ids();
        for crtc in self.screen.crtcs()? {
            for output in self.screen.crtc_outputs(crtc)? {
                let name = self.screen.output_name(output)?;
                debug!("Met output {name} on crtc {crtc}");
                let Some(state) = self.crtcs.lookup_mut(&name) else {
                    continue;
                };
                state.id = Some(crtc);
                if state.original_gamma.is_none() {
                    info!("Capturing original gamma of {name}");
                    state.original_gamma = Some(self.screen.crtc_gamma(crtc)?);
                }
            }
        }
        Ok(())
    }
}

impl<S: RandrScreen> BrightnessSetter for XrandrSetter<S> {
    fn set_brightness(&mut self, factor: Option<f64>) -> Result<()> {
        self.discover()?;

        let Self {
            screen,
            crtcs,
            cache,
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
            screen.set_crtc_gamma(id, ramp)?;
        }
        // One round trip for the whole batch.
        screen.flush()
    }
}
