use embedded_hal::digital::OutputPin;
use log::{error, info};

use super::{AnalogChannel, Sensor, SensorError, SensorReading, SensorReadings};

/// Load resistor on each sensing channel of the breakout, in ohms.
const LOAD_RESISTANCE_OHM: f32 = 56_000.0;

pub struct MICS6814Readings {
    pub oxidising_ohm: f32,
    pub reducing_ohm: f32,
    pub nh3_ohm: f32,
}

impl SensorReadings for MICS6814Readings {
    fn apply(self, reading: &mut SensorReading) {
        reading.oxidising = self.oxidising_ohm;
        reading.reducing = self.reducing_ohm;
        reading.nh3 = self.nh3_ohm;
    }
}

/// Sensor resistance from a raw 16-bit ADC sample across the load resistor.
///
/// Rails (0 and full scale) have no defined resistance and read as 0.
pub fn gas_resistance_ohm(raw: u16) -> f32 {
    if raw == 0 {
        return 0.0;
    }
    let ratio = u16::MAX as f32 / raw as f32 - 1.0;
    if ratio <= 0.0 {
        return 0.0;
    }
    LOAD_RESISTANCE_OHM / ratio
}

/// Analog three-channel MICS6814 gas sensor with a heater enable pin.
pub struct MICS6814Sensor<A, P> {
    oxidising: A,
    reducing: A,
    nh3: A,
    enable: P,
}

impl<A: AnalogChannel, P: OutputPin> MICS6814Sensor<A, P> {
    /// Take ownership of the three ADC channels and switch the heater on.
    pub fn new(oxidising: A, reducing: A, nh3: A, mut enable: P) -> Result<Self, SensorError> {
        enable.set_high().map_err(|e| {
            error!("MICS6814 heater enable failed: {:?}", e);
            SensorError::InitializationFailed {
                sensor: "MICS6814",
                details: "Failed to drive the heater enable pin",
            }
        })?;
        info!("MICS6814: heater enabled");

        Ok(Self {
            oxidising,
            reducing,
            nh3,
            enable,
        })
    }

    /// Switch the heater off and hand the pin back.
    pub fn release(mut self) -> P {
        if let Err(e) = self.enable.set_low() {
            error!("MICS6814 heater disable failed: {:?}", e);
        }
        self.enable
    }
}

impl<A: AnalogChannel, P: OutputPin> Sensor for MICS6814Sensor<A, P> {
    type Readings = MICS6814Readings;
    const NAME: &'static str = "MICS6814";

    fn read(&mut self) -> Result<MICS6814Readings, SensorError> {
        Ok(MICS6814Readings {
            oxidising_ohm: gas_resistance_ohm(self.oxidising.read_raw()?),
            reducing_ohm: gas_resistance_ohm(self.reducing.read_raw()?),
            nh3_ohm: gas_resistance_ohm(self.nh3.read_raw()?),
        })
    }
}
