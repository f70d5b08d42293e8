use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use crate::backlight::BacklightSource;
use crate::protocols::SetterMethod;

#[macro_use]
extern crate tracing;

mod backlight;
mod crtc;
mod daemon;
mod error;
mod gamma;
mod protocols;

#[derive(Parser)]
#[command(
    version,
    about = "Mirrors a sysfs backlight level onto external outputs as gamma-based software brightness",
    long_about = None
)]
struct Cli {
    /// Path of the backlight device, e.g. /sys/class/backlight/intel_backlight
    backlight_path: PathBuf,

    /// Output names to control, as reported by `xrandr -q` (e.g. DP-1 or HDMI-A-2)
    #[arg(required = true)]
    outputs: Vec<String>,

    /// Time in seconds between two updates. Lower values are more responsive
    /// at the cost of more wakeups
    #[arg(short, long, default_value_t = 1.0)]
    sleep_time: f64,

    /// Protocol used to apply the gamma tables
    #[arg(long, value_enum, default_value_t = SetterMethod::Xrandr)]
    setter_method: SetterMethod,

    /// X display to connect to, instead of $DISPLAY (xrandr method only)
    #[arg(long)]
    display: Option<String>,

    /// X screen number, instead of the display's default (xrandr method only)
    #[arg(long)]
    screen: Option<usize>,
}

fn setup_logs() {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let fmt_layer = fmt::layer().with_target(false);
    let filter_layer = EnvFilter::try_from_default_env().unwrap_or(EnvFilter::new(format!(
        "warn,{}=info",
        env!("CARGO_CRATE_NAME")
    )));

    if let Ok(journal_layer) = tracing_journald::layer() {
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .with(journal_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .init();
    }
}

fn main() -> anyhow::Result<()> {
    setup_logs();

    let cli = Cli::parse();
    let interval = Duration::try_from_secs_f64(cli.sleep_time)
        .context("--sleep-time must be a non-negative number of seconds")?;

    let term = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&term))
            .context("Failed to install signal handler")?;
    }

    let backlight = BacklightSource::new(&cli.backlight_path);
    let mut setter = protocols::connect(
        cli.setter_method,
        &cli.outputs,
        cli.display.as_deref(),
        cli.screen,
    )?;

    info!(
        "Translating {} onto {} output(s)",
        cli.backlight_path.display(),
        cli.outputs.len()
    );

    daemon::translate(setter.as_mut(), &backlight, interval, &term)
}
