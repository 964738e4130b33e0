//! Sensor capability traits and the driver suite owned by the poller.
//!
//! Every physical sensor gets an adapter implementing [`Sensor`]. The adapter
//! returns its own typed readings, and those readings know which fields of the
//! shared [`SensorReading`] they populate. This keeps each driver ignorant of
//! the full record while still making it impossible to write a value into the
//! wrong field.

mod analog;
mod battery;
#[cfg(feature = "sensor-bh1750")]
mod bh1750;
#[cfg(feature = "sensor-bme680")]
mod bme680;
#[cfg(feature = "sensor-mics6814")]
mod mics6814;
#[cfg(feature = "sensor-pms5003")]
mod pms5003;
mod reading;
#[cfg(feature = "sensor-sgp30")]
mod sgp30;

use alloc::boxed::Box;
use alloc::vec::Vec;

use log::{debug, warn};
use thiserror_no_std::Error;

pub use analog::AnalogChannel;
pub use battery::{BatteryMonitor, BatteryReadings};
#[cfg(feature = "sensor-bh1750")]
pub use bh1750::{BH1750Readings, BH1750Sensor};
#[cfg(feature = "sensor-bme680")]
pub use self::bme680::{BME680Readings, BME680Sensor};
#[cfg(feature = "sensor-mics6814")]
pub use mics6814::{MICS6814Readings, MICS6814Sensor, gas_resistance_ohm};
#[cfg(feature = "sensor-pms5003")]
pub use pms5003::{PMS5003Readings, PMS5003Sensor};
pub use reading::{DEFAULT_SEA_LEVEL_HPA, SensorReading, altitude_from_pressure};
#[cfg(feature = "sensor-sgp30")]
pub use sgp30::{SGP30Baseline, SGP30Readings, SGP30Sensor};

/// Errors raised by individual sensor drivers.
///
/// The poller treats all of these as recoverable: the failing driver's
/// fields keep their previous value and the cycle continues.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor}: failed to {operation} ({details})")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
        details: &'static str,
    },
    #[error("{sensor}: initialization failed ({details})")]
    InitializationFailed {
        sensor: &'static str,
        details: &'static str,
    },
    #[error("{sensor}: timed out while trying to {operation}")]
    Timeout {
        sensor: &'static str,
        operation: &'static str,
    },
    #[error("{sensor}: checksum mismatch (expected {expected:#06x}, computed {computed:#06x})")]
    ChecksumMismatch {
        sensor: &'static str,
        expected: u16,
        computed: u16,
    },
    #[error("{sensor}: invalid frame ({details})")]
    InvalidFrame {
        sensor: &'static str,
        details: &'static str,
    },
}

/// Typed readings produced by a single sensor.
pub trait SensorReadings {
    /// Write these readings into the fields of the shared record they own.
    fn apply(self, reading: &mut SensorReading);
}

/// Capability interface for a physical sensor.
pub trait Sensor {
    /// The type of readings this sensor produces.
    type Readings: SensorReadings;

    /// Short name used in log output.
    const NAME: &'static str;

    /// Query the sensor once. Blocks for the duration of the bus transaction.
    fn read(&mut self) -> Result<Self::Readings, SensorError>;

    /// One-shot calibration hook run by the poller every calibration period.
    ///
    /// Sensors without a baseline have nothing to do.
    fn calibrate(&mut self) -> Result<(), SensorError> {
        Ok(())
    }
}

/// Object-safe view of a [`Sensor`] so heterogeneous drivers can share a suite.
pub trait PolledSensor {
    fn name(&self) -> &'static str;

    /// Read the sensor and write its readings into `reading`.
    ///
    /// On error `reading` is left untouched.
    fn read_into(&mut self, reading: &mut SensorReading) -> Result<(), SensorError>;

    fn run_calibration(&mut self) -> Result<(), SensorError>;
}

impl<S: Sensor> PolledSensor for S {
    fn name(&self) -> &'static str {
        S::NAME
    }

    fn read_into(&mut self, reading: &mut SensorReading) -> Result<(), SensorError> {
        let readings = self.read()?;
        readings.apply(reading);
        Ok(())
    }

    fn run_calibration(&mut self) -> Result<(), SensorError> {
        self.calibrate()
    }
}

/// Container for every attached sensor driver.
///
/// Owns the driver handles outright; the poller takes the suite by value so
/// nothing else can touch a bus while a cycle is running.
#[derive(Default)]
pub struct SensorSuite<'a> {
    sensors: Vec<Box<dyn PolledSensor + 'a>>,
}

impl<'a> SensorSuite<'a> {
    pub fn new() -> Self {
        Self {
            sensors: Vec::new(),
        }
    }

    /// Attach a sensor, builder style.
    pub fn with<S: PolledSensor + 'a>(mut self, sensor: S) -> Self {
        self.add(sensor);
        self
    }

    /// Attach a sensor. Sensors are queried in the order they were added.
    pub fn add<S: PolledSensor + 'a>(&mut self, sensor: S) {
        debug!("Attaching sensor {}", sensor.name());
        self.sensors.push(Box::new(sensor));
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Query every sensor once, in attach order.
    ///
    /// A failing sensor is logged and skipped; its fields in `into` keep
    /// whatever value they already held. Returns the number of failures.
    pub fn read_all(&mut self, into: &mut SensorReading) -> usize {
        let mut failures = 0;
        for sensor in self.sensors.iter_mut() {
            if let Err(e) = sensor.read_into(into) {
                warn!("Sensor {} read failed: {}", sensor.name(), e);
                failures += 1;
            }
        }
        failures
    }

    /// Run the calibration hook of every sensor. Returns the number of failures.
    pub fn calibrate_all(&mut self) -> usize {
        let mut failures = 0;
        for sensor in self.sensors.iter_mut() {
            if let Err(e) = sensor.run_calibration() {
                warn!("Sensor {} calibration failed: {}", sensor.name(), e);
                failures += 1;
            }
        }
        failures
    }
}

/// Sensirion CRC-8 (polynomial 0x31, init 0xFF) shared by the I2C gas sensors.
#[cfg(feature = "sensor-sgp30")]
pub(crate) fn sensirion_crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0xFF;
    for byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            };
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Lux(f32);

    impl SensorReadings for Lux {
        fn apply(self, reading: &mut SensorReading) {
            reading.light = self.0;
        }
    }

    struct FixedLight(f32);

    impl Sensor for FixedLight {
        type Readings = Lux;
        const NAME: &'static str = "fixed-light";

        fn read(&mut self) -> Result<Lux, SensorError> {
            Ok(Lux(self.0))
        }
    }

    struct Broken;

    impl Sensor for Broken {
        type Readings = Lux;
        const NAME: &'static str = "broken";

        fn read(&mut self) -> Result<Lux, SensorError> {
            Err(SensorError::ReadFailed {
                sensor: "broken",
                operation: "read",
                details: "no ack",
            })
        }

        fn calibrate(&mut self) -> Result<(), SensorError> {
            Err(SensorError::Timeout {
                sensor: "broken",
                operation: "calibrate",
            })
        }
    }

    #[test]
    fn test_read_all_skips_failures() {
        let mut suite = SensorSuite::new().with(Broken).with(FixedLight(321.0));
        let mut reading = SensorReading {
            light: 1.0,
            ..Default::default()
        };

        let failures = suite.read_all(&mut reading);

        assert_eq!(failures, 1);
        assert_eq!(reading.light, 321.0);
        assert_eq!(suite.len(), 2);
    }

    #[test]
    fn test_failed_read_leaves_fields_untouched() {
        let mut suite = SensorSuite::new().with(Broken);
        let mut reading = SensorReading {
            light: 42.0,
            ..Default::default()
        };

        suite.read_all(&mut reading);

        assert_eq!(reading.light, 42.0);
    }

    #[test]
    fn test_calibrate_all_counts_failures() {
        let mut suite = SensorSuite::new().with(FixedLight(1.0)).with(Broken);
        assert_eq!(suite.calibrate_all(), 1);
    }

    #[test]
    #[cfg(feature = "sensor-sgp30")]
    fn test_sensirion_crc8_reference_value() {
        // Reference value from the Sensirion datasheets.
        assert_eq!(sensirion_crc8(&[0xBE, 0xEF]), 0x92);
    }
}
