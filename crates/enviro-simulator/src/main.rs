//! Host simulator for the enviro-rs air-quality monitor.
//!
//! Runs the real polling state machine, plot, LED bands and publisher against
//! synthetic hardware on a virtual clock, then saves the final plot as a PNG.
//!
//! ```text
//! RUST_LOG=info cargo run -p enviro-simulator -- [output.png] [simulated-seconds]
//! ```

mod hardware;

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics_simulator::{OutputSettingsBuilder, SimulatorDisplay};
use log::{error, info, warn};

use enviro_core::config::StationConfig;
use enviro_core::plot::{PaletteFrameBuffer, PlotBuffer};
use enviro_core::poller::SensorPoller;
use enviro_core::publisher::{
    HANDSHAKE_ATTEMPTS, HANDSHAKE_PAUSE_MS, Publisher, handshake,
};
use enviro_core::sensors::{
    BatteryMonitor, MICS6814Sensor, PMS5003Sensor, SensorReading, SensorSuite,
};
use enviro_core::station::Station;
use enviro_core::{Instant, Duration};

use hardware::{
    ConsoleLed, ConsolePin, LogTransport, SimClock, SimulatedAdapter, StdDelay, SyntheticAdc,
    SyntheticClimate, SyntheticLight, SyntheticParticulates, Waveform,
};

/// Pixel scale factor of the saved image.
const IMAGE_SCALE: u32 = 2;

/// Virtual time between scheduler ticks.
const TICK: Duration = Duration::from_ticks(100);

/// Long enough to scroll the plot and hit one calibration.
const DEFAULT_SIMULATED_SECS: u64 = 1900;

const DEFAULT_OUTPUT: &str = "enviro-plot.png";

fn build_suite(clock: &SimClock) -> Result<SensorSuite<'static>, String> {
    let adc = |center: f64, amplitude: f64, period_secs: f64| SyntheticAdc {
        clock: clock.clone(),
        waveform: Waveform {
            center,
            amplitude,
            period_secs,
        },
    };

    let gas = MICS6814Sensor::new(
        adc(20_000.0, 6_000.0, 210.0),
        adc(45_000.0, 8_000.0, 160.0),
        adc(30_000.0, 5_000.0, 320.0),
        ConsolePin("MICS6814 heater"),
    )
    .map_err(|e| e.to_string())?;

    Ok(SensorSuite::new()
        .with(SyntheticClimate {
            clock: clock.clone(),
        })
        .with(PMS5003Sensor::new(SyntheticParticulates::new(clock.clone())))
        .with(SyntheticLight {
            clock: clock.clone(),
        })
        .with(gas)
        .with(BatteryMonitor::new(adc(50_000.0, 2_000.0, 900.0))))
}

fn run(output: &str, simulated_secs: u64) -> Result<(), String> {
    let defaults = StationConfig {
        device_name: "EnviroSim",
        ..Default::default()
    };

    // Same path the firmware takes when loading its settings blob.
    let blob = defaults.to_bytes().map_err(|e| e.to_string())?;
    let config = StationConfig::from_bytes(&blob).map_err(|e| e.to_string())?;

    let plot = PlotBuffer::configure(&config.plot).map_err(|e| e.to_string())?;
    let panel = SimulatorDisplay::<Rgb565>::new(Size::new(
        u32::from(config.plot.width),
        u32::from(config.plot.height + config.plot.top_offset),
    ));
    let framebuffer = PaletteFrameBuffer::for_plot(panel, &plot, config.plot.top_offset);

    let publisher = if config.network.enabled {
        match handshake(
            &mut SimulatedAdapter,
            &mut StdDelay,
            HANDSHAKE_ATTEMPTS,
            HANDSHAKE_PAUSE_MS,
        ) {
            Ok(_) => Some(Publisher::new(
                LogTransport::new(config.network.broker, config.network.port),
                config.device_name,
            )),
            Err(e) => {
                warn!("Running offline: {}", e);
                None
            }
        }
    } else {
        None
    };

    let mut station = Station::new(&config, plot, framebuffer, ConsoleLed::default(), publisher)
        .map_err(|e| e.to_string())?;

    let clock = SimClock::default();
    let suite = build_suite(&clock)?;

    info!(
        "Simulating {} s at {} ms per tick",
        simulated_secs,
        TICK.to_millis()
    );

    {
        let mut poller = SensorPoller::new(
            suite,
            config.update_interval(),
            config.calibration_interval(),
            Instant::from_ticks(0),
        );
        poller.subscribe(|reading: &SensorReading| {
            if station.handle(reading) > 0 {
                warn!("Update {} had failing consumers", station.updates());
            }
        });

        let mut now = Instant::from_ticks(0);
        let end = Instant::from_ticks(simulated_secs * 1000);
        while now <= end {
            clock.set(now.ticks());
            poller.tick(now);
            now += TICK;
        }

        if let Some(latest) = poller.latest() {
            info!(
                "Last reading: {:.1} C, {:.0}% RH, PM2.5 {} ug/m3",
                latest.temperature, latest.humidity, latest.pm2_5
            );
        }
    }

    info!("{} updates delivered", station.updates());
    if let Err(e) = station.refresh_display() {
        warn!("Final refresh skipped: {}", e);
    }

    let panel = station.into_display().into_inner();
    let settings = OutputSettingsBuilder::new().scale(IMAGE_SCALE).build();
    panel
        .to_rgb_output_image(&settings)
        .save_png(output)
        .map_err(|e| e.to_string())?;

    info!("Plot saved to {}", output);
    Ok(())
}

fn main() {
    env_logger::init();
    info!("Starting enviro-rs simulator");

    let mut args = std::env::args().skip(1);
    let output = args.next().unwrap_or_else(|| DEFAULT_OUTPUT.to_owned());
    let simulated_secs = match args.next().map(|s| s.parse::<u64>()) {
        Some(Ok(secs)) => secs,
        Some(Err(e)) => {
            error!("Invalid simulated duration: {}", e);
            std::process::exit(2);
        }
        None => DEFAULT_SIMULATED_SECS,
    };

    if let Err(e) = run(&output, simulated_secs) {
        error!("Simulator failed: {}", e);
        std::process::exit(1);
    }

    info!("Simulator exiting");
}
