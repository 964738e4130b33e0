//! Synthetic hardware for running the station on a desktop.
//!
//! Every signal is a slow sinusoid of the shared virtual clock, so a run is
//! reproducible and exercises the real adapters (UART frame parsing, ADC
//! conversion) rather than bypassing them.

use std::cell::Cell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::RgbColor;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_io::{ErrorType as UartErrorType, Read};
use log::{debug, info};

use enviro_core::air_quality::{LedError, RgbLed};
use enviro_core::publisher::{
    FirmwareVersion, QoS, Transport, TransportError, WirelessAdapter,
};
use enviro_core::sensors::{
    AnalogChannel, BH1750Readings, BME680Readings, DEFAULT_SEA_LEVEL_HPA, Sensor, SensorError,
    altitude_from_pressure,
};

/// Virtual milliseconds since boot, shared by every synthetic device.
#[derive(Clone, Default)]
pub struct SimClock(Rc<Cell<u64>>);

impl SimClock {
    pub fn set(&self, millis: u64) {
        self.0.set(millis);
    }

    fn secs(&self) -> f64 {
        self.0.get() as f64 / 1000.0
    }
}

/// Temperature, humidity and pressure in place of the BME680.
pub struct SyntheticClimate {
    pub clock: SimClock,
}

impl Sensor for SyntheticClimate {
    type Readings = BME680Readings;
    const NAME: &'static str = "synthetic-climate";

    fn read(&mut self) -> Result<BME680Readings, SensorError> {
        let t = self.clock.secs();
        let temperature = 23.0 + 3.0 * (t / 120.0).sin() + 0.5 * (t / 37.0).cos();
        let humidity = 50.0 + 10.0 * (t / 180.0).sin() + 2.0 * (t / 23.0).cos();
        let pressure = 1005.0 + 6.0 * (t / 600.0).sin();

        Ok(BME680Readings {
            temperature_c: temperature as f32,
            humidity_percent: humidity as f32,
            pressure_hpa: pressure as f32,
            altitude_m: altitude_from_pressure(pressure as f32, DEFAULT_SEA_LEVEL_HPA),
        })
    }
}

/// Ambient light in place of the BH1750.
pub struct SyntheticLight {
    pub clock: SimClock,
}

impl Sensor for SyntheticLight {
    type Readings = BH1750Readings;
    const NAME: &'static str = "synthetic-light";

    fn read(&mut self) -> Result<BH1750Readings, SensorError> {
        let t = self.clock.secs();
        let lux = 300.0 + 250.0 * (t / 240.0).sin();
        Ok(BH1750Readings { lux: lux as f32 })
    }
}

/// UART stream that emits a valid PMS5003 frame whenever it runs dry.
pub struct SyntheticParticulates {
    clock: SimClock,
    pending: VecDeque<u8>,
}

impl SyntheticParticulates {
    pub fn new(clock: SimClock) -> Self {
        Self {
            clock,
            pending: VecDeque::new(),
        }
    }

    fn queue_frame(&mut self) {
        let t = self.clock.secs();
        // Swings through most of the air-quality bands over ten minutes.
        let pm2_5 = (35.0 + 33.0 * (t / 95.0).sin()).max(0.0);
        let pm1 = pm2_5 * 0.6;
        let pm10 = pm2_5 * 1.4 + 4.0 * (t / 17.0).cos().abs();

        let mut frame = [0u8; 32];
        frame[0] = 0x42;
        frame[1] = 0x4D;
        frame[2..4].copy_from_slice(&28u16.to_be_bytes());
        for (slot, value) in [pm1, pm2_5, pm10, pm1, pm2_5, pm10].iter().enumerate() {
            let offset = 4 + slot * 2;
            frame[offset..offset + 2].copy_from_slice(&(value.round() as u16).to_be_bytes());
        }
        let checksum = frame[..30]
            .iter()
            .fold(0u16, |acc, b| acc.wrapping_add(u16::from(*b)));
        frame[30..].copy_from_slice(&checksum.to_be_bytes());

        self.pending.extend(frame);
    }
}

impl UartErrorType for SyntheticParticulates {
    type Error = Infallible;
}

impl Read for SyntheticParticulates {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.pending.is_empty() {
            self.queue_frame();
        }
        let mut count = 0;
        for slot in buf.iter_mut() {
            match self.pending.pop_front() {
                Some(byte) => {
                    *slot = byte;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }
}

/// Waveform fed to a synthetic ADC channel.
#[derive(Clone, Copy)]
pub struct Waveform {
    pub center: f64,
    pub amplitude: f64,
    pub period_secs: f64,
}

/// 16-bit ADC channel sampling a [`Waveform`].
pub struct SyntheticAdc {
    pub clock: SimClock,
    pub waveform: Waveform,
}

impl AnalogChannel for SyntheticAdc {
    fn read_raw(&mut self) -> Result<u16, SensorError> {
        let w = self.waveform;
        let value = w.center + w.amplitude * (self.clock.secs() / w.period_secs).sin();
        Ok(value.clamp(0.0, f64::from(u16::MAX)) as u16)
    }
}

/// Heater enable line that only logs.
pub struct ConsolePin(pub &'static str);

impl PinErrorType for ConsolePin {
    type Error = Infallible;
}

impl OutputPin for ConsolePin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        debug!("{} low", self.0);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        debug!("{} high", self.0);
        Ok(())
    }
}

/// Air-quality LED that logs color changes.
#[derive(Default)]
pub struct ConsoleLed {
    current: Option<Rgb888>,
}

impl RgbLed for ConsoleLed {
    fn fill(&mut self, color: Rgb888) -> Result<(), LedError> {
        if self.current != Some(color) {
            info!(
                "LED -> #{:02X}{:02X}{:02X}",
                color.r(),
                color.g(),
                color.b()
            );
            self.current = Some(color);
        }
        Ok(())
    }
}

/// Wireless co-processor that always answers.
pub struct SimulatedAdapter;

impl WirelessAdapter for SimulatedAdapter {
    fn firmware_version(&mut self) -> Result<FirmwareVersion, TransportError> {
        let mut version = FirmwareVersion::new();
        version
            .push_str("simulated-1.0")
            .map_err(|_| TransportError::Connect {
                details: "firmware version too long",
            })?;
        Ok(version)
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Transport that prints every MQTT operation instead of sending it.
pub struct LogTransport {
    broker: String,
    port: u16,
    connected: bool,
}

impl LogTransport {
    pub fn new(broker: &str, port: u16) -> Self {
        Self {
            broker: broker.to_owned(),
            port,
            connected: false,
        }
    }
}

impl Transport for LogTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        debug!("MQTT connect {}:{}", self.broker, self.port);
        self.connected = true;
        Ok(())
    }

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
        qos: QoS,
    ) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::Publish {
                details: "not connected",
            });
        }
        info!(
            "MQTT {} [{:?}{}] {}",
            topic,
            qos,
            if retain { ", retained" } else { "" },
            String::from_utf8_lossy(payload)
        );
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        debug!("MQTT disconnect");
        self.connected = false;
        Ok(())
    }
}

/// Blocking delay on the host thread.
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}
